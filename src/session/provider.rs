//! Where conversations come from.
//!
//! The [`SessionProvider`] trait separates the shared protocol handler
//! ([`AcpAgent`](super::agent::AcpAgent)) from how a conversation is hosted:
//! a local engine process with on-disk history, or a cloud sandbox.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use crate::acp::schema::{AuthMethod, McpServer, SessionInfo};
use crate::engine::{Conversation, EngineSink};
use crate::mode::AgentKind;
use crate::Result;

/// Boxed future returned by provider methods.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Everything a provider needs to construct one conversation.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Session identifier (canonical UUID text).
    pub session_id: String,
    /// Working directory requested by the host, if any.
    pub working_dir: Option<PathBuf>,
    /// MCP servers declared by the host.
    pub mcp_servers: Vec<McpServer>,
    /// Channel through which the conversation publishes engine output.
    pub sink: EngineSink,
    /// Whether token-level deltas should be produced.
    pub streaming: bool,
    /// The conversation is expected to exist already (resume or load).
    pub resume: bool,
}

/// Hosting backend for conversations.
///
/// Implementations keep whatever per-session resources they allocate
/// (workspaces, sandboxes) and release them in [`SessionProvider::release`].
pub trait SessionProvider: Send + Sync + 'static {
    /// Backend kind, used in logs.
    fn kind(&self) -> AgentKind;

    /// Authentication methods advertised in `initialize`.
    fn auth_methods(&self) -> Vec<AuthMethod>;

    /// Handle `authenticate`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidParams`](crate::AppError::InvalidParams) for
    /// an unsupported method.
    fn authenticate(&self, method_id: String) -> ProviderFuture<'_, ()>;

    /// Construct a new conversation or reopen a persisted one.
    ///
    /// # Errors
    ///
    /// Configuration problems are reported as
    /// [`AppError::InvalidParams`](crate::AppError::InvalidParams); missing
    /// credentials as [`AppError::AuthRequired`](crate::AppError::AuthRequired).
    fn create(&self, request: SessionRequest) -> ProviderFuture<'_, Arc<dyn Conversation>>;

    /// `true` when `session/load` may reopen a session that is not cached.
    fn loads_from_storage(&self) -> bool;

    /// Sessions known to the backend.
    ///
    /// # Errors
    ///
    /// Implementations usually degrade to an empty list rather than fail.
    fn list_sessions(&self, cwd: Option<String>) -> ProviderFuture<'_, Vec<SessionInfo>>;

    /// Release per-session resources after the conversation was closed.
    ///
    /// # Errors
    ///
    /// Cleanup failures are returned for logging; callers do not propagate them.
    fn release(&self, session_id: String) -> ProviderFuture<'_, ()>;
}
