//! SupportChat client library
//!
//! This crate contains the ticket chat client: history loading, the live
//! channel, the message view reconciler and the host shell boundary.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod history;
pub mod live;
pub mod page;
pub mod reconciler;
pub mod session;
pub mod shell;
pub mod submitter;
pub mod telemetry;
pub mod tickets;

pub use config::{ClientConfig, ConfigError, LogFormat};
pub use error::{ClientError, ClientResult};
pub use page::{ChatPage, PageCommand, PageExit, ViewRenderer};
pub use reconciler::{Reconciler, ResyncMark, ViewModel, ViewMutation};
pub use session::{FileTokenStore, SessionContext, SessionTokens, Side, TokenStore};
pub use shell::{Route, Shell, TerminalShell};
