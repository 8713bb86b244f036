//! SupportChat Shared Types
//!
//! Wire and domain types shared between the chat client and its host shells.

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;
