//! Sessions: lifecycle, confirmation modes and turn execution.
//!
//! [`AcpAgent`] is the protocol handler. It keeps live sessions in a
//! [`SessionRegistry`], runs turns under the [`TaskSupervisor`] and obtains
//! conversations from a [`SessionProvider`]: [`LocalProvider`] or
//! [`CloudProvider`].

pub mod agent;
pub mod cloud;
pub mod commands;
pub mod confirmation;
pub mod local;
pub mod mcp;
pub mod prompt;
pub mod provider;
pub mod registry;
pub mod runner;
pub mod supervisor;

pub use agent::{AcpAgent, AgentSettings};
pub use cloud::CloudProvider;
pub use confirmation::ConfirmationMode;
pub use local::LocalProvider;
pub use provider::{SessionProvider, SessionRequest};
pub use registry::{Session, SessionRegistry};
pub use supervisor::TaskSupervisor;
