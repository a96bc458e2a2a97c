// tunely-api: Async Rust client for the Ngenic Tunes v3 cloud API

pub mod auth;
pub mod client;
pub mod error;
mod measurements;
pub mod models;
pub mod transport;
mod tunes;

pub use auth::Credential;
pub use client::{DEFAULT_API_URL, TunesClient};
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
