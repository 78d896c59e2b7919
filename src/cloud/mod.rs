//! Cloud hosting: control-plane client, sandbox workspaces, and the
//! conversation handle speaking to the agent server inside a sandbox.

pub mod client;
pub mod remote;
pub mod workspace;

pub use client::{CloudClient, SandboxInfo};
pub use remote::RemoteConversation;
pub use workspace::CloudWorkspace;
