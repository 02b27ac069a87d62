//! Application initialization and resource setup.
//!
//! This module provides functions to initialize shared resources:
//! - Logger
//! - HTTP client for filter downloads
//! - Filter content directory
//! - Crypto provider for TLS
//!
//! All initialization functions return proper error types for error handling.

mod client;
mod logger;

use std::path::Path;

use rustls::crypto::{ring::default_provider, CryptoProvider};

use crate::error_handling::InitializationError;

// Re-export public API
pub use client::init_filter_client;
pub use logger::init_logger_with;

/// Initializes the crypto provider for TLS operations.
///
/// Configures the global crypto provider for `rustls`. This must be called before
/// any TLS listener is started.
pub fn init_crypto_provider() {
    // The return value is ignored because reinstalling the provider is harmless
    let _ = CryptoProvider::install_default(default_provider());
}

/// Creates the filter content directory if it does not exist yet.
///
/// # Errors
///
/// Returns `InitializationError::StorageError` if the directory cannot be created.
pub fn init_filters_dir(dir: &Path) -> Result<(), InitializationError> {
    std::fs::create_dir_all(dir)?;
    log::debug!("Filter content directory ready at {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_filters_dir_creates_nested_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("data").join("filters");
        init_filters_dir(&dir).unwrap();
        assert!(dir.is_dir());
        // Idempotent
        init_filters_dir(&dir).unwrap();
    }

    #[test]
    fn test_init_crypto_provider_is_idempotent() {
        init_crypto_provider();
        init_crypto_provider();
        assert!(CryptoProvider::get_default().is_some());
    }
}
