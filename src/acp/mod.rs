//! Host side of the adapter: the Agent Client Protocol over stdio.
//!
//! - `codec`: NDJSON line framing.
//! - `rpc`: JSON-RPC 2.0 envelopes and error codes.
//! - `schema`: typed ACP requests, responses and session updates.
//! - `connection`: outbound [`Client`](connection::Client) with request/reply correlation.
//! - `server`: inbound loop and method dispatch.
//! - `writer`: the single task owning an output stream.
//! - `trace`: optional JSONL record of all traffic.

pub mod codec;
pub mod connection;
pub mod rpc;
pub mod schema;
pub mod server;
pub mod trace;
pub mod writer;
