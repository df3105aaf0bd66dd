//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
pub mod email;
pub mod result;
mod run;

pub use account::{Account, FederatedId, RESERVED_USERNAME};
pub use run::Run;
