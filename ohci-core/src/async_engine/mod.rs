//! Asynchronous transmit/receive DMA contexts: descriptor encoding and the
//! per-context state machine (§4.6).

pub mod context;
pub mod descriptor;

pub use context::{ContextKind, ContextState, DmaContext};
pub use descriptor::{build_output_descriptors, AtDescriptor, DescriptorCommand, PacketHeader, TCode};
