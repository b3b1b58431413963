//! HTTP request handlers for all API endpoints.
//!
//! # Handler Modules
//!
//! - [`system`]: Health check and service catalog listing
//! - [`submissions`]: Multipart document submission
//! - [`storage`]: Stored-file inspection and root-folder diagnostics
//! - [`static_assets`]: Frontend asset serving
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which automatically converts to
//! appropriate HTTP status codes and JSON error responses.

pub mod static_assets;
pub mod storage;
pub mod submissions;
pub mod system;
