//! Per-context state machine and two-path submit (§4.6).

use crate::dma::{DescriptorRing, DmaError};
use crate::error::OhciError;
use crate::reg::{bits::context_control, RegisterIo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    AtRequest,
    AtResponse,
    ArRequest,
    ArResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Disabled,
    Armed,
    Running,
    Stopped,
    Dead,
}

/// One of the four OHCI DMA contexts (§4.6), owning its descriptor ring and
/// tracking the `Disabled → Armed → Running → Stopped → Armed/Dead` state
/// machine described in the spec.
pub struct DmaContext {
    kind: ContextKind,
    control_set_offset: u32,
    control_clear_offset: u32,
    command_ptr_offset: u32,
    ring: DescriptorRing,
    state: ContextState,
}

impl DmaContext {
    pub fn new(
        kind: ContextKind,
        control_set_offset: u32,
        control_clear_offset: u32,
        command_ptr_offset: u32,
        ring: DescriptorRing,
    ) -> Self {
        Self {
            kind,
            control_set_offset,
            control_clear_offset,
            command_ptr_offset,
            ring,
            state: ContextState::Disabled,
        }
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn ring(&self) -> &DescriptorRing {
        &self.ring
    }

    pub fn ring_mut(&mut self) -> &mut DescriptorRing {
        &mut self.ring
    }

    /// Arm the context: requires the link already be enabled by the caller
    /// (checked by the controller core, not here — this type has no
    /// visibility into HCControl). Writes a non-zero CommandPtr and sets
    /// `run=1`.
    pub fn start(&mut self, io: &dyn RegisterIo, command_ptr_bus_addr: u32) -> Result<(), OhciError> {
        if command_ptr_bus_addr == 0 {
            return Err(OhciError::BadArgument);
        }
        io.write(self.command_ptr_offset, command_ptr_bus_addr);
        io.write(self.control_set_offset, context_control::RUN);
        self.state = ContextState::Armed;
        Ok(())
    }

    /// Mark the context Running once the first descriptor has actually been
    /// fetched (observed via the first completion or explicit caller signal).
    pub fn mark_running(&mut self) {
        if self.state == ContextState::Armed {
            self.state = ContextState::Running;
        }
    }

    /// Clear `run` and poll `active` until it drops, bounded by
    /// `poll_iterations` (the caller translates the configured microsecond
    /// timeout into an iteration count for its own polling cadence).
    pub fn stop(&mut self, io: &dyn RegisterIo, poll_iterations: u32) -> Result<(), OhciError> {
        io.write(self.control_clear_offset, context_control::RUN);
        for _ in 0..poll_iterations {
            let status = io.read(self.control_set_offset);
            if status & context_control::ACTIVE == 0 {
                self.state = ContextState::Stopped;
                return Ok(());
            }
        }
        self.state = ContextState::Stopped;
        Err(OhciError::Timeout)
    }

    /// After a stop (e.g. at bus-reset), reset the ring's cursors in place,
    /// re-point CommandPtr at its base, and set `run` again.
    pub fn rearm(&mut self, io: &dyn RegisterIo, command_ptr_bus_addr: u32) -> Result<(), OhciError> {
        if command_ptr_bus_addr == 0 {
            return Err(OhciError::BadArgument);
        }
        self.ring.reset();
        io.write(self.command_ptr_offset, command_ptr_bus_addr);
        io.write(self.control_set_offset, context_control::RUN);
        self.state = ContextState::Armed;
        Ok(())
    }

    pub fn mark_dead(&mut self) {
        self.state = ContextState::Dead;
    }

    /// Submit one descriptor via the two-path protocol: first-arm (Armed)
    /// programs CommandPtr and sets `run`/`wake`; link+wake (Running) links
    /// the descriptor to the current chain's tail and only strobes `wake`.
    pub fn submit(
        &mut self,
        io: &dyn RegisterIo,
        descriptor_bytes: &[u8; crate::dma::DESCRIPTOR_SIZE],
    ) -> Result<u16, DmaError> {
        match self.state {
            ContextState::Armed => {
                let idx = self.ring.submit(descriptor_bytes)?;
                io.write(self.control_set_offset, context_control::RUN | context_control::WAKE);
                self.state = ContextState::Running;
                Ok(idx)
            }
            ContextState::Running => {
                let idx = self.ring.submit(descriptor_bytes)?;
                io.write(self.control_set_offset, context_control::WAKE);
                Ok(idx)
            }
            _ => Err(DmaError::RingFull),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;

    use super::*;
    use crate::reg::fake::FakeRegisterIo;
    use crate::reg::offsets;
    use alloc::vec;
    use alloc::vec::Vec;

    fn make_context() -> (DmaContext, Vec<u8>) {
        let mut mem = vec![0u8; 4 * crate::dma::DESCRIPTOR_SIZE];
        let ring = unsafe { DescriptorRing::new(mem.as_mut_ptr(), 0x8000, 4) };
        let ctx = DmaContext::new(
            ContextKind::AtRequest,
            offsets::AT_REQ_CONTEXT_CONTROL_SET,
            offsets::AT_REQ_CONTEXT_CONTROL_CLEAR,
            offsets::AT_REQ_COMMAND_PTR,
            ring,
        );
        (ctx, mem)
    }

    #[test]
    fn start_requires_nonzero_command_ptr() {
        let (mut ctx, _mem) = make_context();
        let io = FakeRegisterIo::new();
        assert_eq!(ctx.start(&io, 0), Err(OhciError::BadArgument));
    }

    #[test]
    fn first_arm_submit_sets_run_and_wake() {
        let (mut ctx, _mem) = make_context();
        let io = FakeRegisterIo::new();
        ctx.start(&io, 0x9000).unwrap();
        assert_eq!(ctx.state(), ContextState::Armed);

        let bytes = [0u8; crate::dma::DESCRIPTOR_SIZE];
        ctx.submit(&io, &bytes).unwrap();
        assert_eq!(ctx.state(), ContextState::Running);
        assert_eq!(
            io.latched(offsets::AT_REQ_CONTEXT_CONTROL_SET) & (context_control::RUN | context_control::WAKE),
            context_control::RUN | context_control::WAKE
        );
    }

    #[test]
    fn running_submit_only_strobes_wake() {
        let (mut ctx, _mem) = make_context();
        let io = FakeRegisterIo::new();
        ctx.start(&io, 0x9000).unwrap();
        let bytes = [0u8; crate::dma::DESCRIPTOR_SIZE];
        ctx.submit(&io, &bytes).unwrap();

        io.write(offsets::AT_REQ_CONTEXT_CONTROL_SET, 0); // reset fake's recorded value
        ctx.submit(&io, &bytes).unwrap();
        assert_eq!(io.latched(offsets::AT_REQ_CONTEXT_CONTROL_SET), context_control::WAKE);
    }

    #[test]
    fn stop_polls_active_and_times_out() {
        let (mut ctx, _mem) = make_context();
        let io = FakeRegisterIo::new();
        io.write(offsets::AT_REQ_CONTEXT_CONTROL_SET, context_control::ACTIVE);
        assert_eq!(ctx.stop(&io, 3), Err(OhciError::Timeout));
        assert_eq!(ctx.state(), ContextState::Stopped);
    }

    #[test]
    fn stop_succeeds_once_active_clears() {
        let (mut ctx, _mem) = make_context();
        let io = FakeRegisterIo::new();
        assert!(ctx.stop(&io, 3).is_ok());
    }

    #[test]
    fn rearm_resets_cursors_and_returns_to_armed() {
        let (mut ctx, _mem) = make_context();
        let io = FakeRegisterIo::new();
        ctx.start(&io, 0x9000).unwrap();
        let bytes = [0u8; crate::dma::DESCRIPTOR_SIZE];
        ctx.submit(&io, &bytes).unwrap();
        ctx.stop(&io, 3).ok();

        assert!(ctx.rearm(&io, 0x9000).is_ok());
        assert_eq!(ctx.state(), ContextState::Armed);
        assert_eq!(ctx.ring().available(), ctx.ring().queue_size() - 1);
    }

    #[test]
    fn rearm_rejects_a_null_command_ptr() {
        let (mut ctx, _mem) = make_context();
        let io = FakeRegisterIo::new();
        assert_eq!(ctx.rearm(&io, 0), Err(OhciError::BadArgument));
    }
}
</content>
