//! Data transfer handling
//!
//! TODO: Implement transfer mechanisms
//! - Chunked transfer encoding
//! - Content-Length based transfer
//! - Streaming downloads
//! - Progress tracking
//! - Buffer management

pub mod chunked;
pub mod streaming;

// TODO: Implement transfer handlers
