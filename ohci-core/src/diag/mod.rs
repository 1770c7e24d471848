//! Ambient diagnostics stack (§4.11): a ring-buffer `log::Log` backend.

pub mod ring_logger;

pub use ring_logger::RingLogger;
</content>
