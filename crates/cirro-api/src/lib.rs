// cirro-api: Async Rust client for the Cirro cloud provider REST API.

pub mod client;
pub mod error;
pub mod transport;
pub mod types;

pub use client::{ApiClient, FILTER_HEADER};
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
pub use types::{ApiErrorItem, Page};
