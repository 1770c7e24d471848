//! Register facade, bus-reset recovery, Self-ID/topology, and the async
//! transaction core for an OHCI 1.1 IEEE 1394 host controller.
//!
//! `no_std` like the teacher's `network` crate: this core is meant to run
//! directly above a platform's interrupt/MMIO layer without assuming an
//! allocator-backed runtime beyond `alloc` itself.

#![no_std]

extern crate alloc;

pub mod async_engine;
pub mod busreset;
pub mod command;
pub mod config;
pub mod controller;
pub mod diag;
pub mod dispatch;
pub mod dma;
pub mod error;
pub mod reg;
pub mod romimage;
pub mod romscan;
pub mod selfid;
pub mod topology;
pub mod transaction;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use config::ControllerConfig;
pub use controller::ControllerCore;
pub use error::{CompletionStatus, OhciError};
