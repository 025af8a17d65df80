//! # Runtime Module
//!
//! Process startup and shutdown for the External Secrets Controller.

pub mod initialization;
pub mod shutdown;

pub use initialization::*;
pub use shutdown::*;
