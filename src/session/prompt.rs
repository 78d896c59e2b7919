//! ACP prompt content → engine message content.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::acp::schema::{BlobResource, ContentBlock, EmbeddedResource, ResourceLink};
use crate::engine::MessageContent;
use crate::{AppError, Result};

/// Image types the engine's models accept inline.
pub const SUPPORTED_IMAGE_MIME_TYPES: [&str; 4] =
    ["image/gif", "image/jpeg", "image/png", "image/webp"];

const CONTEXT_BEGIN: &str = "\n[BEGIN USER PROVIDED ADDITIONAL CONTEXT]\n";
const CONTEXT_END: &str = "[END USER PROVIDED ADDITIONAL CONTEXT]\n";

/// Convert every prompt block; blobs that are not inline images are written
/// to `cache_dir`.
///
/// Audio blocks are dropped with a warning.
///
/// # Errors
///
/// Returns [`AppError::InvalidParams`] for undecodable blob data and
/// [`AppError::Io`] if a blob cannot be written.
pub fn convert_prompt(blocks: &[ContentBlock], cache_dir: &Path) -> Result<Vec<MessageContent>> {
    let mut content = Vec::with_capacity(blocks.len());
    for block in blocks {
        match block {
            ContentBlock::Text { text } => content.push(MessageContent::text(text.clone())),
            ContentBlock::Image {
                data, mime_type, ..
            } => content.push(MessageContent::Image {
                image_urls: vec![data_uri(mime_type, data)],
            }),
            ContentBlock::Audio { mime_type, .. } => {
                warn!(mime_type, "audio prompt content is not supported, dropping");
            }
            ContentBlock::ResourceLink(link) => content.push(MessageContent::text(link_text(link))),
            ContentBlock::Resource { resource } => content.push(embedded(resource, cache_dir)?),
        }
    }
    Ok(content)
}

/// The prompt text when `content` is exactly one text part.
#[must_use]
pub fn single_text(content: &[MessageContent]) -> Option<&str> {
    match content {
        [MessageContent::Text { text }] => Some(text),
        _ => None,
    }
}

fn data_uri(mime_type: &str, data: &str) -> String {
    format!("data:{mime_type};base64,{data}")
}

fn link_text(link: &ResourceLink) -> String {
    format!(
        "\n[BEGIN USER PROVIDED ADDITIONAL RESOURCE]\n\
         Type: resource_link\n\
         URI: {}\n\
         name: {}\n\
         mimeType: {}\n\
         size: {}\n\
         [END USER PROVIDED ADDITIONAL RESOURCE]\n",
        link.uri,
        link.name,
        link.mime_type.as_deref().unwrap_or("None"),
        link.size.map_or_else(|| "None".to_owned(), |size| size.to_string()),
    )
}

fn embedded(resource: &EmbeddedResource, cache_dir: &Path) -> Result<MessageContent> {
    match resource {
        EmbeddedResource::Text(text) => Ok(MessageContent::text(format!(
            "{CONTEXT_BEGIN}URI: {}\nmimeType: {}\nContent:\n{}\n{CONTEXT_END}",
            text.uri,
            text.mime_type.as_deref().unwrap_or("None"),
            text.text,
        ))),
        EmbeddedResource::Blob(blob) => blob_content(blob, cache_dir),
    }
}

fn blob_content(blob: &BlobResource, cache_dir: &Path) -> Result<MessageContent> {
    let mime_type = blob.mime_type.as_deref().unwrap_or_default();
    if SUPPORTED_IMAGE_MIME_TYPES.contains(&mime_type) {
        return Ok(MessageContent::Image {
            image_urls: vec![data_uri(mime_type, &blob.blob)],
        });
    }

    let bytes = STANDARD.decode(blob.blob.as_bytes()).map_err(|err| {
        AppError::InvalidParams(serde_json::json!({
            "reason": "Invalid base64 data in embedded resource",
            "uri": blob.uri,
            "details": err.to_string(),
        }))
    })?;

    fs::create_dir_all(cache_dir)?;
    let target = cache_dir.join(format!(
        "embedded_resource_{}{}",
        Uuid::new_v4().simple(),
        extension_for(mime_type)
    ));
    fs::write(&target, bytes)?;
    debug!(path = %target.display(), mime_type, "embedded blob written to cache");

    let description = if mime_type.starts_with("image/") {
        format!(
            "User provided image with unsupported format ({mime_type}).\nSupported formats: {}\n",
            SUPPORTED_IMAGE_MIME_TYPES.join(", ")
        )
    } else {
        "User provided binary context (non-image).\n".to_owned()
    };
    Ok(MessageContent::text(format!(
        "{CONTEXT_BEGIN}{description}Saved to file: {}\n{CONTEXT_END}",
        target.display()
    )))
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "application/pdf" => ".pdf",
        "application/json" => ".json",
        "application/zip" => ".zip",
        "application/gzip" => ".gz",
        "text/plain" => ".txt",
        "text/csv" => ".csv",
        "image/tiff" => ".tiff",
        "image/svg+xml" => ".svg",
        "image/bmp" => ".bmp",
        "audio/mpeg" => ".mp3",
        "audio/wav" => ".wav",
        _ => "",
    }
}
