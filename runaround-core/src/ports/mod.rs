//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod cookie_store;
mod federated;
mod repository;

pub use cookie_store::CookieStore;
pub use federated::{AccountRegistration, FederatedRegistration, SocialSessionProvider};
pub use repository::AccountRepository;
