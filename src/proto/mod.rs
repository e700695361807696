//! RESP2 wire layer: frame types and the streaming codec.
//!
//! ## Modules
//!
//! - [`codec`] - Incremental encoder and decoder
//! - [`error`] - Error types shared across the crate
//! - [`frame`] - Frame types representing RESP data

#![warn(missing_docs)]

/// Encoder and decoder for the wire protocol.
pub mod codec;
/// Error types.
pub mod error;
/// Frame type definitions.
pub mod frame;
