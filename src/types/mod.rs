//! Type definitions

pub mod export;
pub mod import;
pub mod lead;
pub mod messages;

pub use export::*;
pub use import::*;
pub use lead::*;
pub use messages::*;
