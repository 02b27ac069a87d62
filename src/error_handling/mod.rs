//! Error handling.
//!
//! This module provides the error types of the control plane. Errors are
//! categorized into:
//! - **Validation errors**: malformed URLs, timestamps, time units, duplicate or
//!   unknown filter URLs. Always surfaced to the caller, never fatal.
//! - **External-resource errors**: network fetches, filesystem writes, listener
//!   binds. Surfaced to the caller and logged; prior state stays intact.
//! - **Verification downgrades**: untrusted or self-signed certificates. These
//!   are not errors at all; they are reported as warnings inside a successful
//!   certificate report.
//! - **Background failures**: deferred listener shutdown errors, logged only.

mod types;

// Re-export public API
pub use types::{
    FetchError, FilterError, HistoryError, InitializationError, ListenerError, ProbeError,
    ReconfigureError, TlsPayloadError,
};
