//! Cloud sandbox backing one session.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use super::client::{CloudClient, SandboxInfo};
use crate::{AppError, Result};

/// Upper bound on waiting for a sandbox to report `RUNNING`.
pub const SANDBOX_READY_TIMEOUT: Duration = Duration::from_secs(300);

/// A running sandbox and the agent server inside it.
#[derive(Debug, Clone)]
pub struct CloudWorkspace {
    client: CloudClient,
    sandbox: SandboxInfo,
    keep_alive: bool,
}

impl CloudWorkspace {
    /// Start (or resume) a sandbox and wait until its agent server is up.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Cloud`] if the sandbox does not become ready within
    /// [`SANDBOX_READY_TIMEOUT`], or any control-plane error.
    pub async fn provision(
        client: CloudClient,
        sandbox_id: Option<&str>,
        keep_alive: bool,
        poll_interval: Duration,
    ) -> Result<Self> {
        match sandbox_id {
            Some(id) => info!(sandbox_id = id, "resuming cloud sandbox"),
            None => info!("creating cloud sandbox"),
        }
        let mut sandbox = client.start_sandbox(sandbox_id).await?;
        let deadline = Instant::now() + SANDBOX_READY_TIMEOUT;
        while !sandbox.is_ready() {
            if Instant::now() >= deadline {
                return Err(AppError::Cloud(format!(
                    "sandbox {} not ready after {}s (status {})",
                    sandbox.id,
                    SANDBOX_READY_TIMEOUT.as_secs(),
                    sandbox.status
                )));
            }
            tokio::time::sleep(poll_interval).await;
            sandbox = client.sandbox(&sandbox.id).await?;
        }
        info!(sandbox_id = sandbox.id.as_str(), "cloud sandbox ready");
        Ok(Self {
            client,
            sandbox,
            keep_alive,
        })
    }

    /// Sandbox identifier.
    #[must_use]
    pub fn sandbox_id(&self) -> &str {
        &self.sandbox.id
    }

    /// Agent server base URL.
    #[must_use]
    pub fn agent_server_url(&self) -> &str {
        self.sandbox.agent_server_url.as_deref().unwrap_or_default()
    }

    /// Key for `X-Session-API-Key`.
    #[must_use]
    pub fn session_api_key(&self) -> Option<&str> {
        self.sandbox.session_api_key.as_deref()
    }

    /// Delete the sandbox unless it is kept alive.
    ///
    /// # Errors
    ///
    /// Returns the control-plane error; callers log it.
    pub async fn cleanup(&self) -> Result<()> {
        if self.keep_alive {
            info!(sandbox_id = self.sandbox_id(), "keeping cloud sandbox alive");
            return Ok(());
        }
        if let Err(err) = self.client.delete_sandbox(self.sandbox_id()).await {
            warn!(sandbox_id = self.sandbox_id(), %err, "failed to delete cloud sandbox");
            return Err(err);
        }
        info!(sandbox_id = self.sandbox_id(), "cloud sandbox deleted");
        Ok(())
    }
}
