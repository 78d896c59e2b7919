//! NDJSON line codec.
//!
//! Used for both stdio links: host to adapter, and engine process to adapter.
//! Lines are `\n`-delimited UTF-8 with an upper bound on their length.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Maximum inbound line length: 16 MiB.
///
/// Prompts carry base64 images and embedded files, so the bound is generous.
pub const MAX_LINE_BYTES: usize = 16 * 1_048_576;

/// [`LinesCodec`] bounded by [`MAX_LINE_BYTES`], with errors mapped to
/// [`AppError`].
///
/// An over-long line yields [`AppError::Acp`]`("line too long: ...")`; the
/// codec then discards up to the next newline and keeps decoding.
///
/// ```rust,ignore
/// use tokio_util::codec::FramedRead;
/// use acp_adapter::acp::codec::AcpCodec;
///
/// let lines = FramedRead::new(tokio::io::stdin(), AcpCodec::new());
/// ```
#[derive(Debug)]
pub struct AcpCodec(LinesCodec);

impl AcpCodec {
    /// Codec with the [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_BYTES))
    }
}

impl Default for AcpCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for AcpCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode(src).map_err(map_codec_error)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode_eof(src).map_err(map_codec_error)
    }
}

impl Encoder<String> for AcpCodec {
    type Error = AppError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        self.0.encode(item, dst).map_err(map_codec_error)
    }
}

fn map_codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Acp(format!("line too long: exceeded {MAX_LINE_BYTES} bytes"))
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
