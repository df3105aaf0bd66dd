//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the AccountRepository port
//! - A request-scoped jar for the CookieStore port
//! - In-memory social provider stand-ins for SocialSessionProvider and
//!   FederatedRegistration

pub mod cookies;
pub mod demo;
pub mod duckdb;
