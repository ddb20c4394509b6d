//! Remote dataset API.
//!
//! [`DatasetApi`] is the seam between the loader/store and the network. It
//! returns raw response bodies so callers can yield to the host between the
//! fetch and the decode; [`crate::wire`] turns the bodies into domain types.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use periplus_data::{DatasetApi, HttpDatasetApi, HttpDatasetApiConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpDatasetApiConfig::new("https://sites.example.org")
//!     .with_timeout(Duration::from_secs(10));
//! let api = HttpDatasetApi::with_config(config)?;
//! let listing = api.fetch_source_listing().await?;
//! # let _ = listing;
//! # Ok(())
//! # }
//! ```

mod http;

use async_trait::async_trait;

use crate::error::TransportError;

pub use http::{ApiBuildError, DEFAULT_USER_AGENT, HttpDatasetApi, HttpDatasetApiConfig};

/// Source of truth for source listings and per-source site pages.
#[async_trait]
pub trait DatasetApi: Send + Sync {
    /// Fetch the body of the source listing.
    async fn fetch_source_listing(&self) -> Result<String, TransportError>;

    /// Fetch the body of up to `limit` sites belonging to `source_id`.
    async fn fetch_sites(&self, source_id: &str, limit: usize) -> Result<String, TransportError>;
}
