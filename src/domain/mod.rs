//! Domain Layer
//!
//! Core business entity definitions

pub mod analysis;
pub mod chat;
pub mod guild;
pub mod harvest;
pub mod message;

pub use analysis::*;
pub use chat::ChatMessage;
pub use guild::*;
pub use harvest::*;
pub use message::*;
