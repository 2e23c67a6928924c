//! Remote package sources for pindep.
//!
//! A remote serves recipes and prebuilt binaries over HTTP. This crate defines
//! the `RemoteSource` seam used by the resolver, the `HttpRemote` client, the
//! `[[remotes]]` configuration entry, and transfer helpers that move binaries
//! between a remote and a local `PackageCache` with digest verification.

pub mod config;
pub mod http;
pub mod transfer;

pub use config::RemoteConfig;
pub use http::HttpRemote;
pub use transfer::{download_binary, upload_package, UploadResult};

use pindep_cache::{BinaryInfo, CacheError};
use pindep_schema::{PackageId, PackageRef, Recipe, RecipeError};
use thiserror::Error;

/// Protocol version sent as `X-Pindep-Protocol` header on all HTTP requests.
pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("remote recipe error: {0}")]
    Recipe(#[from] RecipeError),
    #[error("invalid remote response: {0}")]
    InvalidResponse(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("integrity failure for '{key}': expected {expected}, got {actual}")]
    IntegrityFailure {
        key: String,
        expected: String,
        actual: String,
    },
}

/// A binary as served by a remote: its metadata and the packed folder.
#[derive(Debug, Clone)]
pub struct RemoteBinary {
    pub info: BinaryInfo,
    pub archive: Vec<u8>,
}

/// A place recipes and binaries can be fetched from and uploaded to.
///
/// Fetches return `Ok(None)` when the remote does not have the item. Archives
/// are returned as served; use [`download_binary`] to verify and install them.
pub trait RemoteSource: Send + Sync {
    fn name(&self) -> &str;

    fn fetch_recipe(&self, reference: &PackageRef) -> Result<Option<Recipe>, RemoteError>;

    fn fetch_binary(
        &self,
        reference: &PackageRef,
        package_id: &PackageId,
    ) -> Result<Option<RemoteBinary>, RemoteError>;

    fn upload_recipe(&self, recipe: &Recipe) -> Result<(), RemoteError>;

    /// Upload a packed binary. `info.archive_digest` must describe `archive`.
    fn upload_binary(&self, info: &BinaryInfo, archive: &[u8]) -> Result<(), RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_version_is_one() {
        assert_eq!(PROTOCOL_VERSION, 1);
    }

    #[test]
    fn integrity_error_names_key() {
        let e = RemoteError::IntegrityFailure {
            key: "grpc/1.54.3".to_owned(),
            expected: "aa".to_owned(),
            actual: "bb".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("grpc/1.54.3"));
        assert!(msg.contains("aa"));
    }
}
