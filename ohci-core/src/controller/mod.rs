//! Controller core: construction, start sequence, interrupt fan-out, and
//! shutdown (§4, §5, §6). Owns every other component exclusively — the
//! single long-lived structure the Design Notes call for in place of the
//! source's shared-ownership singleton graph.
//!
//! # START SEQUENCE (§8 scenario 1, "clean cold-start")
//!
//! - Phase 1: soft reset, poll for completion
//! - Phase 2: bring up LPS, poll for completion
//! - Phase 3: bring up the PHY (read back register 1, force the bring-up
//!   gap count) through the blocking `PhyControl` indirect access
//! - Phase 4: arm the Self-ID buffer at a 2 KiB-aligned bus address
//! - Phase 5: assemble and program the Config ROM: `BusOptions`, then
//!   `ConfigROMheader`, then `ConfigROMmap`, in that order (§4.3 step 5)
//! - Phase 6: enable the link and mark the Bus Info Block valid atomically
//! - Phase 7: arm both AT contexts
//! - Phase 8: program the interrupt mask and enable delivery
//!
//! Every register write that matters is followed by a flushing readback
//! (`write_and_flush`); every poll is bounded.

extern crate alloc;

use crate::async_engine::{build_output_descriptors, AtDescriptor, ContextKind, DescriptorCommand, DmaContext, PacketHeader, TCode};
use crate::busreset::{BusResetAction, BusResetCoordinator, BusResetEvent, Guards};
use crate::command::{Command, CommandQueue};
use crate::config::ControllerConfig;
use crate::dispatch::{InterruptDispatcher, InterruptSnapshot};
use crate::dma::DescriptorRing;
use crate::error::{CompletionStatus, OhciError};
use crate::reg::bits::{bus_options, context_control, hc_control, int_mask, link_control};
use crate::reg::{offsets, PhyAccess, RegisterIo, ShadowMask};
use crate::romimage::ConfigRomImage;
use crate::romscan::ConfigRomScanner;
use crate::selfid::SelfIdCapture;
use crate::topology::TopologySnapshot;
use crate::transaction::speed::{SpeedPolicy, SpeedTier};
use crate::transaction::{next_retry_speed, TransactionKind, TransactionRecord, TransactionTracker};
use alloc::collections::VecDeque;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Stopped,
    Starting,
    Running,
    Quiescing,
    Failed,
}

/// Reason the shared status block was republished (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishReason {
    Boot,
    Interrupt,
    BusReset,
    AsyncActivity,
    Watchdog,
    Manual,
    Disconnect,
}

/// A slimmed view of the spec's 256-byte packed shared status block: the
/// fields external callers actually read (§3, §6). The wire-packed binary
/// form handed to user space is out of this core's scope; this is the data
/// that form is built from.
#[derive(Debug, Clone, Copy)]
pub struct SharedStatusBlock {
    pub sequence: u32,
    pub controller_state: ControllerState,
    pub bus_generation: u8,
    pub node_count: u16,
    pub reset_count: u32,
    pub reason: PublishReason,
}

/// Ties together the register facade, bus-reset coordinator, topology,
/// transaction tracker, command queue, ROM scanner, and interrupt
/// dispatcher. Construction only allocates software state; [`Self::start`]
/// is what touches hardware.
pub struct ControllerCore {
    config: ControllerConfig,
    state: ControllerState,
    int_mask_shadow: ShadowMask,
    hc_control_shadow: ShadowMask,
    link_control_shadow: ShadowMask,
    bus_reset: BusResetCoordinator,
    dispatcher: InterruptDispatcher,
    self_id: SelfIdCapture,
    topology: Option<TopologySnapshot>,
    transactions: TransactionTracker,
    speed_policy: SpeedPolicy,
    rom_scanner: ConfigRomScanner,
    command_queue: CommandQueue,
    /// The command whose transaction is currently in flight on the wire,
    /// paired with the handle [`TransactionTracker::submit`] allocated for
    /// it so a completion or timeout can be matched back to its callback.
    in_flight_command: Option<(u16, Command)>,
    /// `(tLabel, sourceNodeId)` pairs handed in by [`Self::post_response_header`]
    /// once real AR-Response decoding has identified them, drained the next
    /// time `handle_interrupt` sees an `rxPacket`-routed bit.
    response_queue: VecDeque<(u8, u16)>,
    at_request: Option<DmaContext>,
    at_response: Option<DmaContext>,
    /// The Config ROM image staged during [`Self::start`] (or rebuilt by
    /// `RestoreConfigRom` after a bus reset); `None` until Phase 5 completes.
    config_rom_image: Option<ConfigRomImage>,
    config_rom_bus_addr: u32,
    sequence: u32,
    reset_count: u32,
    /// Raw pointer into the Self-ID DMA buffer supplied at [`Self::start`].
    ///
    /// # Safety
    /// Mirrors [`crate::dma::DescriptorRing`]'s own raw-pointer contract:
    /// the caller must keep this DMA-coherent memory valid and unaliased
    /// for the controller's lifetime.
    self_id_buffer_ptr: *const u32,
    self_id_buffer_len: usize,
}

// Safety: the Self-ID buffer pointer and the Config ROM bus address are only
// read through `decode`/register writes, never mutated here, under the same
// single-work-queue discipline as the descriptor rings owned by the async
// contexts.
unsafe impl Send for ControllerCore {}

impl ControllerCore {
    pub fn new(config: ControllerConfig) -> Self {
        let self_id_capacity = config.self_id_buffer_quad_capacity;
        let rom_scanner = ConfigRomScanner::new(
            config.rom_scan_max_in_flight as u8,
            config.rom_scan_per_step_retries,
            config.irm_verification_enabled,
        );
        let max_delegate_retries = config.max_delegate_retries as u8;
        let mut speed_policy = SpeedPolicy::new();
        speed_policy.set_halve_packets(config.half_size_packets);
        Self {
            config,
            state: ControllerState::Stopped,
            int_mask_shadow: ShadowMask::new(offsets::INT_MASK_SET, offsets::INT_MASK_CLEAR),
            hc_control_shadow: ShadowMask::new(offsets::HC_CONTROL_SET, offsets::HC_CONTROL_CLEAR),
            link_control_shadow: ShadowMask::new(offsets::LINK_CONTROL_SET, offsets::LINK_CONTROL_CLEAR),
            bus_reset: BusResetCoordinator::new(max_delegate_retries),
            dispatcher: InterruptDispatcher::new(),
            self_id: SelfIdCapture::new(self_id_capacity),
            topology: None,
            transactions: TransactionTracker::new(),
            speed_policy,
            rom_scanner,
            command_queue: CommandQueue::new(),
            in_flight_command: None,
            response_queue: VecDeque::new(),
            at_request: None,
            at_response: None,
            config_rom_image: None,
            config_rom_bus_addr: 0,
            sequence: 0,
            reset_count: 0,
            self_id_buffer_ptr: core::ptr::null(),
            self_id_buffer_len: 0,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn topology(&self) -> Option<&TopologySnapshot> {
        self.topology.as_ref()
    }

    /// Bring the controller from `Stopped` to `Running`. Takes ownership of
    /// the two AT descriptor rings (the caller allocated them from the DMA
    /// pool) since `start` is the point their bus addresses get programmed.
    /// `config_rom_buffer` is where the assembled Config ROM image is
    /// written; it must outlive the controller the same way `self_id_buffer`
    /// does.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        &mut self,
        io: &dyn RegisterIo,
        self_id_buffer_bus_addr: u32,
        self_id_buffer: &[u32],
        config_rom_buffer_bus_addr: u32,
        config_rom_buffer: &mut [u32],
        at_request_ring: DescriptorRing,
        at_response_ring: DescriptorRing,
    ) -> Result<(), OhciError> {
        self.state = ControllerState::Starting;

        // Phase 1: soft reset.
        self.hc_control_shadow.set_bits(io, hc_control::SOFT_RESET);
        let mut reset_done = false;
        for _ in 0..10_000 {
            if io.read(offsets::HC_CONTROL) & hc_control::SOFT_RESET == 0 {
                reset_done = true;
                break;
            }
        }
        if !reset_done {
            self.state = ControllerState::Failed;
            return Err(OhciError::Timeout);
        }

        // Phase 2: LPS, polled bounded by the configured bring-up budget
        // rather than fired-and-forgotten (§8 scenario 1).
        self.hc_control_shadow.set_bits(io, hc_control::LPS | hc_control::POSTED_WRITE_ENABLE);
        let mut lps_ready = false;
        for _ in 0..self.config.lps_poll_timeout_us {
            if io.read(offsets::HC_CONTROL) & hc_control::LPS != 0 {
                lps_ready = true;
                break;
            }
        }
        if !lps_ready {
            self.state = ControllerState::Failed;
            return Err(OhciError::Timeout);
        }

        // Phase 3: PHY bring-up. Force the bring-up gap count (register 1,
        // all six gapCount bits) through the blocking indirect access; a
        // live bus reset overwrites this once a real topology gap count is
        // known (§8 scenario 1).
        let phy = PhyAccess::new(io);
        if phy.update_phy(1, 0x3F, 0x3F).is_err() {
            self.state = ControllerState::Failed;
            return Err(OhciError::Timeout);
        }

        // Phase 4: arm the Self-ID buffer.
        if (self_id_buffer_bus_addr as usize) % crate::selfid::MIN_BUFFER_BYTES != 0 {
            self.state = ControllerState::Failed;
            return Err(OhciError::BadArgument);
        }
        self.self_id.arm(io, self_id_buffer_bus_addr);
        self.self_id_buffer_ptr = self_id_buffer.as_ptr();
        self.self_id_buffer_len = self_id_buffer.len();

        // Phase 5: assemble and program the Config ROM this controller
        // exports, in the order BusOptions, ConfigROMheader, ConfigROMmap.
        let image = self.build_config_rom_image(io);
        if config_rom_buffer.len() < image.quadlet_len() {
            self.state = ControllerState::Failed;
            return Err(OhciError::BadArgument);
        }
        config_rom_buffer[..image.quadlet_len()].copy_from_slice(&image.quadlets);
        self.program_config_rom_registers(io, &image, config_rom_buffer_bus_addr);
        self.config_rom_bus_addr = config_rom_buffer_bus_addr;
        self.config_rom_image = Some(image);

        // Phase 6: link enable + BIB image valid, atomically in one strobe.
        self.hc_control_shadow.set_bits(io, hc_control::LINK_ENABLE | hc_control::BIB_IMAGE_VALID);
        self.link_control_shadow.set_bits(io, link_control::RCV_SELF_ID | link_control::RCV_PHY_PKT);

        // Phase 7: arm AT contexts (Armed, not yet Running — first submit
        // drives the first-arm path, §4.6).
        let mut at_request = DmaContext::new(
            ContextKind::AtRequest,
            offsets::AT_REQ_CONTEXT_CONTROL_SET,
            offsets::AT_REQ_CONTEXT_CONTROL_CLEAR,
            offsets::AT_REQ_COMMAND_PTR,
            at_request_ring,
        );
        let bus_base = at_request.ring().desc_bus_base() as u32;
        at_request.start(io, bus_base | 0x1)?;

        let mut at_response = DmaContext::new(
            ContextKind::AtResponse,
            offsets::AT_RESP_CONTEXT_CONTROL_SET,
            offsets::AT_RESP_CONTEXT_CONTROL_CLEAR,
            offsets::AT_RESP_COMMAND_PTR,
            at_response_ring,
        );
        let bus_base = at_response.ring().desc_bus_base() as u32;
        at_response.start(io, bus_base | 0x1)?;

        self.at_request = Some(at_request);
        self.at_response = Some(at_response);

        // Phase 8: interrupt mask + master enable.
        let mask = crate::reg::bits::BASE_INT_MASK | self.config.base_int_mask_extra;
        self.int_mask_shadow.set_bits(io, mask);
        self.int_mask_shadow.set_bits(io, int_mask::MASTER_INT_ENABLE);

        self.state = ControllerState::Running;
        Ok(())
    }

    /// Read back `GUIDHi`/`GUIDLo` and assemble the minimal image this
    /// controller exports, from the vendor/link-speed fields in
    /// [`ControllerConfig`].
    fn build_config_rom_image(&self, io: &dyn RegisterIo) -> ConfigRomImage {
        let guid_hi = io.read(offsets::GUID_HI);
        let guid_lo = io.read(offsets::GUID_LO);
        let bus_options_value = ((self.config.config_rom_max_rec as u32) << bus_options::MAX_REC_SHIFT)
            | (self.config.config_rom_link_speed as u32 & bus_options::LINK_SPD_MASK);
        ConfigRomImage::build(guid_hi, guid_lo, self.config.config_rom_vendor_id, bus_options_value)
    }

    fn program_config_rom_registers(&self, io: &dyn RegisterIo, image: &ConfigRomImage, buffer_bus_addr: u32) {
        io.write_and_flush(offsets::BUS_OPTIONS, image.bus_options);
        io.write_and_flush(offsets::CONFIG_ROM_HEADER, image.header);
        io.write_and_flush(offsets::CONFIG_ROM_MAP, buffer_bus_addr);
    }

    /// Enqueue a user command. Submission onto the AT-Request context happens
    /// immediately if nothing else is in flight; otherwise it waits for the
    /// command ahead of it to complete.
    pub fn submit_command(&mut self, io: &dyn RegisterIo, now_ns: u64, command: Command) {
        self.command_queue.enqueue(command);
        self.pump_command_queue(io, now_ns);
    }

    /// Feed one decoded AR-Response packet's routing fields in, queued for
    /// the next `rxPacket`-carrying [`Self::handle_interrupt`] call to match
    /// against the outstanding table (§4.7). Decoding the wire bytes
    /// themselves is the platform's receive-DMA glue, not this core's job —
    /// this mirrors the interrupt dispatcher's own post/drain pattern one
    /// layer up.
    pub fn post_response_header(&mut self, t_label: u8, source_node_id: u16) {
        self.response_queue.push_back((t_label, source_node_id));
    }

    /// Handle one interrupt snapshot: post it to the dispatcher, drain and
    /// route it, run the bus-reset FSM if relevant bits fired, and
    /// acknowledge everything the dispatcher itself owns.
    pub fn handle_interrupt(&mut self, io: &dyn RegisterIo, snapshot: InterruptSnapshot) {
        let timestamp_ns = snapshot.timestamp_ns;
        self.dispatcher.post(snapshot);
        let Some((_, routed)) = self.dispatcher.drain_one(self.int_mask_shadow.bits()) else { return };

        if routed.bus_reset_relevant != 0 {
            self.drive_bus_reset(io, routed.bus_reset_relevant);
        }

        if routed.tx_complete != 0 {
            if let Some(ctx) = self.at_request.as_mut() {
                ctx.mark_running();
                ctx.ring_mut().drain_completions();
            }
            if let Some(ctx) = self.at_response.as_mut() {
                ctx.ring_mut().drain_completions();
            }
        }

        if routed.rx_packet != 0 {
            self.drain_response_queue(io, timestamp_ns);
        }

        let ack_mask = routed.non_reset_ack_mask();
        if ack_mask != 0 {
            io.write(offsets::INT_EVENT_CLEAR, ack_mask);
        }
    }

    /// Match every queued response header against the outstanding table and
    /// complete the in-flight command if one of them closes it out.
    fn drain_response_queue(&mut self, io: &dyn RegisterIo, now_ns: u64) {
        let generation = self.topology.as_ref().map(|t| t.generation).unwrap_or(0);
        while let Some((t_label, source_node_id)) = self.response_queue.pop_front() {
            if let Some(record) = self.transactions.complete_response(t_label, source_node_id, generation) {
                self.complete_matching_command(io, now_ns, record, CompletionStatus::Complete);
            }
        }
    }

    fn complete_matching_command(
        &mut self,
        io: &dyn RegisterIo,
        now_ns: u64,
        record: TransactionRecord,
        status: CompletionStatus,
    ) {
        let matches = matches!(&self.in_flight_command, Some((handle, _)) if *handle == record.handle);
        if !matches {
            return;
        }
        let (_, command) = self.in_flight_command.take().unwrap();
        self.command_queue.complete_in_flight(command, status, Vec::new());
        self.pump_command_queue(io, now_ns);
    }

    fn drive_bus_reset(&mut self, io: &dyn RegisterIo, relevant_bits: u32) {
        use crate::reg::bits::int_event;

        let event = if relevant_bits & int_event::UNRECOVERABLE_ERROR != 0 {
            BusResetEvent::Unrecoverable
        } else if relevant_bits & int_event::REG_ACCESS_FAIL != 0 {
            BusResetEvent::RegFail
        } else if relevant_bits & int_event::BUS_RESET != 0 {
            BusResetEvent::IrqBusReset
        } else if relevant_bits & int_event::SELF_ID_COMPLETE != 0 {
            BusResetEvent::IrqSelfIdComplete
        } else if relevant_bits & int_event::SELF_ID_COMPLETE2 != 0 {
            BusResetEvent::IrqSelfIdComplete2
        } else {
            return;
        };

        let guards = Guards {
            at_inactive: self.at_contexts_inactive(io),
            rom_image_ready: self.config_rom_image.is_some(),
            node_id_valid: io.read(offsets::NODE_ID) & crate::reg::bits::node_id::ID_VALID != 0,
        };

        let actions = self.bus_reset.step(event, guards);
        self.apply_bus_reset_actions(io, &actions);
    }

    /// Re-check the bus-reset FSM's pending guards once per watchdog tick
    /// while it waits in a guard-gated state (§4.3: `QuiescingAt`,
    /// `RestoringConfigRom`, `Rearming` all advance on `TimeoutGuard`
    /// rather than on a fresh interrupt).
    pub fn poll_bus_reset_guards(&mut self, io: &dyn RegisterIo) {
        use crate::busreset::BusResetState;
        if !matches!(
            self.bus_reset.state(),
            BusResetState::QuiescingAt | BusResetState::RestoringConfigRom | BusResetState::Rearming
        ) {
            return;
        }
        let guards = Guards {
            at_inactive: self.at_contexts_inactive(io),
            rom_image_ready: self.config_rom_image.is_some(),
            node_id_valid: io.read(offsets::NODE_ID) & crate::reg::bits::node_id::ID_VALID != 0,
        };
        let actions = self.bus_reset.step(BusResetEvent::TimeoutGuard, guards);
        self.apply_bus_reset_actions(io, &actions);
    }

    fn at_contexts_inactive(&self, io: &dyn RegisterIo) -> bool {
        let req_active = io.read(offsets::AT_REQ_CONTEXT_CONTROL_SET) & context_control::ACTIVE != 0;
        let resp_active = io.read(offsets::AT_RESP_CONTEXT_CONTROL_SET) & context_control::ACTIVE != 0;
        !req_active && !resp_active
    }

    fn apply_bus_reset_actions(&mut self, io: &dyn RegisterIo, actions: &[BusResetAction]) {
        for action in actions {
            match action {
                BusResetAction::MaskBusReset => {
                    self.int_mask_shadow.clear_bits(io, crate::reg::bits::int_event::BUS_RESET)
                }
                BusResetAction::UnmaskBusReset => {
                    self.int_mask_shadow.set_bits(io, crate::reg::bits::int_event::BUS_RESET)
                }
                BusResetAction::ArmSelfIdBuffer => {
                    let addr = io.read(offsets::SELF_ID_BUFFER);
                    self.self_id.arm(io, addr);
                }
                BusResetAction::StopAtContexts => {
                    let timeout_iters = self.config.at_stop_poll_timeout_us;
                    if let Some(ctx) = self.at_request.as_mut() {
                        let _ = ctx.stop(io, timeout_iters);
                    }
                    if let Some(ctx) = self.at_response.as_mut() {
                        let _ = ctx.stop(io, timeout_iters);
                    }
                }
                BusResetAction::DrainAtCompletions => {
                    if let Some(ctx) = self.at_request.as_mut() {
                        ctx.ring_mut().drain_completions();
                    }
                    if let Some(ctx) = self.at_response.as_mut() {
                        ctx.ring_mut().drain_completions();
                    }
                }
                BusResetAction::RestoreConfigRom => {
                    if let Some(image) = self.config_rom_image.clone() {
                        self.program_config_rom_registers(io, &image, self.config_rom_bus_addr);
                    }
                }
                BusResetAction::ClearBusResetEvent => {
                    io.write(offsets::INT_EVENT_CLEAR, crate::reg::bits::int_event::BUS_RESET);
                }
                BusResetAction::DecodeSelfIdAndBuildTopology => {
                    if !self.self_id_buffer_ptr.is_null() {
                        let buffer = unsafe {
                            core::slice::from_raw_parts(self.self_id_buffer_ptr, self.self_id_buffer_len)
                        };
                        let result = self.self_id.decode(io, buffer);
                        if result.valid {
                            let node_id_reg = io.read(offsets::NODE_ID);
                            self.topology = Some(crate::topology::build(&result, node_id_reg));
                        }
                    }
                }
                BusResetAction::RearmAtContexts => {
                    if let Some(ctx) = self.at_request.as_mut() {
                        let addr = ctx.ring().desc_bus_base() as u32;
                        let _ = ctx.rearm(io, addr);
                    }
                    if let Some(ctx) = self.at_response.as_mut() {
                        let addr = ctx.ring().desc_bus_base() as u32;
                        let _ = ctx.rearm(io, addr);
                    }
                }
                BusResetAction::IssueDelegatePhyPacket => {
                    self.issue_delegate_phy_packet(io);
                }
                BusResetAction::CommitMetricsAndPublish => {
                    self.reset_count += 1;
                }
                BusResetAction::InvokeTopologyCallback => {
                    let remote_nodes: Vec<(u16, bool)> = match self.topology.as_ref() {
                        Some(snapshot) => snapshot
                            .nodes
                            .iter()
                            .filter(|n| snapshot.local_node_id != Some(n.node_id))
                            .map(|n| (n.node_id as u16, n.is_irm_candidate))
                            .collect(),
                        None => Vec::new(),
                    };
                    let generation = self.topology.as_ref().map(|t| t.generation).unwrap_or(self.reset_count as u8);
                    let cancelled = self.transactions.confirm_bus_generation(generation);
                    self.fail_in_flight_if_cancelled(&cancelled);
                    self.rom_scanner.begin(generation, &remote_nodes);
                    self.speed_policy.reset();
                }
                BusResetAction::RecordFailure => {
                    self.state = ControllerState::Failed;
                }
                BusResetAction::LogAbort => {}
            }
        }
    }

    /// A bus-reset generation rollover can cancel the very transaction the
    /// in-flight command is waiting on; surface that as a completion rather
    /// than leaving the command stuck until its deadline fires.
    fn fail_in_flight_if_cancelled(&mut self, cancelled: &[TransactionRecord]) {
        let matches = matches!(&self.in_flight_command, Some((handle, _))
            if cancelled.iter().any(|r| r.handle == *handle));
        if !matches {
            return;
        }
        let (_, command) = self.in_flight_command.take().unwrap();
        self.command_queue.complete_in_flight(command, CompletionStatus::BusReset, Vec::new());
    }

    /// Build and submit a two-quadlet PHY-configuration packet (IEEE 1394
    /// §4.3.4.2): `data1` is the bitwise complement of `data0`, the format
    /// hardware uses to validate the packet wasn't corrupted in transit.
    /// Targets the current topology's elected root with `R` (force-root)
    /// set and the bus's own gap count.
    fn issue_delegate_phy_packet(&mut self, io: &dyn RegisterIo) {
        let Some(topology) = self.topology.as_ref() else { return };
        let Some(target) = topology.root_node_id else { return };
        let data0 = ((target as u32) << 24) | (1 << 23) | ((topology.gap_count as u32 & 0x3F) << 16);
        let data1 = !data0;

        let mut desc = AtDescriptor::new(DescriptorCommand::OutputLast, 0, true, 8, data0);
        desc.branch_address = data1;
        if let Some(ctx) = self.at_request.as_mut() {
            let _ = ctx.submit(io, &desc.to_bytes());
        }
    }

    /// Watchdog tick (~1 ms cadence, §5): drains expired transaction
    /// deadlines, retries or fails whichever one belongs to the in-flight
    /// command, and pumps the next queued command if the latch is free.
    pub fn tick_watchdog(&mut self, io: &dyn RegisterIo, now_ns: u64) -> usize {
        let expired = self.transactions.poll_timeouts(now_ns);
        let count = expired.len();
        for record in expired {
            self.handle_transaction_timeout(io, now_ns, record);
        }
        self.pump_command_queue(io, now_ns);
        count
    }

    fn handle_transaction_timeout(&mut self, io: &dyn RegisterIo, now_ns: u64, record: TransactionRecord) {
        let matches = matches!(&self.in_flight_command, Some((handle, _)) if *handle == record.handle);
        if !matches {
            return;
        }
        let (_, command) = self.in_flight_command.take().unwrap();

        if record.retries_remaining == 0 {
            self.command_queue.complete_in_flight(command, CompletionStatus::Timeout, Vec::new());
            return;
        }

        let node_id = record.destination_node_id as u8;
        let current_speed = SpeedTier::from_code(record.speed);
        let _ = next_retry_speed(
            CompletionStatus::Timeout,
            record.retries_remaining,
            current_speed,
            &mut self.speed_policy,
            node_id,
        );
        self.dispatch_command(io, now_ns, command, record.retries_remaining - 1);
    }

    /// Pull the next queued command onto the wire if nothing is already in
    /// flight.
    fn pump_command_queue(&mut self, io: &dyn RegisterIo, now_ns: u64) {
        if self.in_flight_command.is_some() {
            return;
        }
        if let Some(command) = self.command_queue.execute_next() {
            let retries = self.config.transaction_max_retries;
            self.dispatch_command(io, now_ns, command, retries);
        }
    }

    /// Allocate a transaction, build its wire descriptors, and submit them
    /// on the AT-Request context. `retries_remaining` carries over from the
    /// prior attempt on a retry rather than always starting at the
    /// configured maximum.
    fn dispatch_command(&mut self, io: &dyn RegisterIo, now_ns: u64, command: Command, retries_remaining: u8) {
        // Block writes would need a separately DMA-mapped payload buffer
        // this queue doesn't own; only quadlet-sized operations (payload
        // folded into the header's final immediate quadlet) go out.
        if command.kind == TransactionKind::Write && command.payload.len() > 4 {
            self.command_queue.complete_in_flight(command, CompletionStatus::TypeError, Vec::new());
            return;
        }

        let generation = self.topology.as_ref().map(|t| t.generation).unwrap_or(0);
        let policy = self.speed_policy.for_node(command.destination_node_id as u8);
        let deadline_ns = now_ns + self.config.transaction_default_deadline_us * 1_000;

        let handle = match self.transactions.submit(
            command.kind,
            command.destination_node_id,
            command.address_hi,
            command.address_lo,
            policy.speed.code(),
            generation,
            deadline_ns,
            retries_remaining,
            true,
        ) {
            Ok(handle) => handle,
            Err(_) => {
                self.command_queue.complete_in_flight(command, CompletionStatus::TypeError, Vec::new());
                return;
            }
        };

        let t_label = self.transactions.record(handle).map(|r| r.t_label).unwrap_or(0);
        let t_code = match command.kind {
            TransactionKind::Read => TCode::ReadQuadlet,
            TransactionKind::Write => TCode::WriteQuadlet,
            TransactionKind::Lock => TCode::LockRequest,
            TransactionKind::Stream => TCode::Stream,
            TransactionKind::Phy => TCode::PhyPacket,
        };
        let header =
            PacketHeader { destination_id: command.destination_node_id, t_label, t_code, speed: policy.speed.code() };

        let mut descriptors =
            match build_output_descriptors(&header, command.address_hi, command.address_lo, &[], 0) {
                Ok(d) => d,
                Err(_) => {
                    self.transactions.cancel(handle);
                    self.command_queue.complete_in_flight(command, CompletionStatus::TypeError, Vec::new());
                    return;
                }
            };

        if !command.payload.is_empty() {
            // The header-only chain already marked its final descriptor
            // OutputLast carrying `address_lo`; demote it back to
            // OutputMore and append the payload quadlet as its own
            // OutputLast immediate descriptor, rather than clobbering the
            // address field that descriptor already holds.
            if let Some(last) = descriptors.last_mut() {
                last.control = (last.control & !(0xF << 28)) | ((DescriptorCommand::OutputMore as u32) << 28);
                last.control &= !(0b11 << 20);
            }
            let len = command.payload.len().min(4);
            let mut word = [0u8; 4];
            word[..len].copy_from_slice(&command.payload[..len]);
            let data_quad = u32::from_be_bytes(word);
            descriptors.push(AtDescriptor::new(DescriptorCommand::OutputLast, 0, true, 4, data_quad));
        }

        let mut submit_failed = false;
        for desc in &descriptors {
            match self.at_request.as_mut() {
                Some(ctx) if ctx.submit(io, &desc.to_bytes()).is_ok() => {}
                _ => submit_failed = true,
            }
        }

        if submit_failed {
            self.transactions.cancel(handle);
            self.command_queue.complete_in_flight(command, CompletionStatus::TypeError, Vec::new());
            return;
        }

        self.transactions.mark_in_flight(handle);
        self.in_flight_command = Some((handle, command));
    }

    pub fn publish_status(&mut self, reason: PublishReason) -> SharedStatusBlock {
        self.sequence = self.sequence.wrapping_add(1);
        SharedStatusBlock {
            sequence: self.sequence,
            controller_state: self.state,
            bus_generation: self.topology.as_ref().map(|t| t.generation).unwrap_or(0),
            node_count: self.topology.as_ref().map(|t| t.node_count as u16).unwrap_or(0),
            reset_count: self.reset_count,
            reason,
        }
    }

    /// Mask interrupts, stop both AT contexts, and mark `Quiescing` then
    /// `Stopped`. Idempotent: safe to call from any state.
    pub fn shutdown(&mut self, io: &dyn RegisterIo) {
        self.state = ControllerState::Quiescing;
        self.int_mask_shadow.clear_bits(io, int_mask::MASTER_INT_ENABLE);
        let timeout_iters = self.config.at_stop_poll_timeout_us;
        if let Some(ctx) = self.at_request.as_mut() {
            let _ = ctx.stop(io, timeout_iters);
        }
        if let Some(ctx) = self.at_response.as_mut() {
            let _ = ctx.stop(io, timeout_iters);
        }
        self.hc_control_shadow.clear_bits(io, hc_control::LINK_ENABLE);
        self.state = ControllerState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reg::fake::FakeRegisterIo;

    fn rings() -> (DescriptorRing, DescriptorRing, Vec<u8>, Vec<u8>) {
        let mut req_mem = alloc::vec![0u8; 4 * crate::dma::DESCRIPTOR_SIZE];
        let mut resp_mem = alloc::vec![0u8; 4 * crate::dma::DESCRIPTOR_SIZE];
        let req_ring = unsafe { DescriptorRing::new(req_mem.as_mut_ptr(), 0x10000, 4) };
        let resp_ring = unsafe { DescriptorRing::new(resp_mem.as_mut_ptr(), 0x20000, 4) };
        (req_ring, resp_ring, req_mem, resp_mem)
    }

    #[allow(clippy::too_many_arguments)]
    fn start_core(
        core: &mut ControllerCore,
        io: &FakeRegisterIo,
        self_id_buf: &[u32],
        rom_buf: &mut [u32],
        req_ring: DescriptorRing,
        resp_ring: DescriptorRing,
    ) -> Result<(), OhciError> {
        core.start(io, 0x8000, self_id_buf, 0x9000, rom_buf, req_ring, resp_ring)
    }

    #[test]
    fn cold_start_reaches_running() {
        let io = FakeRegisterIo::new();
        let mut core = ControllerCore::new(ControllerConfig::default());
        let (req_ring, resp_ring, _a, _b) = rings();
        let self_id_buf = alloc::vec![0u32; 64];
        let mut rom_buf = alloc::vec![0u32; 16];

        let result = start_core(&mut core, &io, &self_id_buf, &mut rom_buf, req_ring, resp_ring);
        assert!(result.is_ok());
        assert_eq!(core.state(), ControllerState::Running);
        assert!(io.latched(offsets::INT_MASK_SET) & int_mask::MASTER_INT_ENABLE != 0);
    }

    #[test]
    fn start_programs_the_config_rom_registers() {
        let io = FakeRegisterIo::new();
        let mut core = ControllerCore::new(ControllerConfig::default());
        let (req_ring, resp_ring, _a, _b) = rings();
        let self_id_buf = alloc::vec![0u32; 64];
        let mut rom_buf = alloc::vec![0u32; 16];

        start_core(&mut core, &io, &self_id_buf, &mut rom_buf, req_ring, resp_ring).unwrap();

        assert_eq!(io.latched(offsets::CONFIG_ROM_MAP), 0x9000);
        assert_ne!(io.latched(offsets::CONFIG_ROM_HEADER), 0);
        assert_eq!(rom_buf[1], crate::romscan::BIB_MAGIC);
    }

    #[test]
    fn start_rejects_misaligned_self_id_buffer() {
        let io = FakeRegisterIo::new();
        let mut core = ControllerCore::new(ControllerConfig::default());
        let (req_ring, resp_ring, _a, _b) = rings();
        let self_id_buf = alloc::vec![0u32; 64];
        let mut rom_buf = alloc::vec![0u32; 16];

        let result = core.start(&io, 0x801, &self_id_buf, 0x9000, &mut rom_buf, req_ring, resp_ring);
        assert_eq!(result, Err(OhciError::BadArgument));
        assert_eq!(core.state(), ControllerState::Failed);
    }

    #[test]
    fn bus_reset_interrupt_drives_the_fsm_and_masks_the_bit() {
        let io = FakeRegisterIo::new();
        let mut core = ControllerCore::new(ControllerConfig::default());
        let (req_ring, resp_ring, _a, _b) = rings();
        let self_id_buf = alloc::vec![0u32; 64];
        let mut rom_buf = alloc::vec![0u32; 16];
        start_core(&mut core, &io, &self_id_buf, &mut rom_buf, req_ring, resp_ring).unwrap();

        let snapshot = InterruptSnapshot {
            int_event: crate::reg::bits::int_event::BUS_RESET,
            int_mask: 0,
            iso_xmit_event: 0,
            iso_recv_event: 0,
            timestamp_ns: 0,
        };
        core.handle_interrupt(&io, snapshot);
        assert_eq!(core.bus_reset.state(), crate::busreset::BusResetState::WaitingSelfId);
    }

    #[test]
    fn full_bus_reset_recovery_builds_a_topology_snapshot() {
        use crate::reg::bits::{int_event, node_id, self_id_count};

        let io = FakeRegisterIo::new();
        let mut core = ControllerCore::new(ControllerConfig::default());
        let (req_ring, resp_ring, _a, _b) = rings();

        let header = (1u32 << self_id_count::GENERATION_SHIFT) | (2u32 << self_id_count::SIZE_SHIFT);
        let self_id_quad = 0b10u32 << 30 | (1 << 22); // tagged, link active, no ports
        let mut self_id_buf = alloc::vec![0u32; 64];
        self_id_buf[0] = header;
        self_id_buf[1] = self_id_quad;
        let mut rom_buf = alloc::vec![0u32; 16];

        start_core(&mut core, &io, &self_id_buf, &mut rom_buf, req_ring, resp_ring).unwrap();
        io.write(offsets::SELF_ID_COUNT, header);
        io.write(offsets::NODE_ID, node_id::ID_VALID);

        let bus_reset_snapshot = |bits: u32| InterruptSnapshot {
            int_event: bits,
            int_mask: 0,
            iso_xmit_event: 0,
            iso_recv_event: 0,
            timestamp_ns: 0,
        };
        core.handle_interrupt(&io, bus_reset_snapshot(int_event::BUS_RESET));
        core.handle_interrupt(&io, bus_reset_snapshot(int_event::SELF_ID_COMPLETE));
        core.handle_interrupt(&io, bus_reset_snapshot(int_event::SELF_ID_COMPLETE2));
        assert_eq!(core.bus_reset.state(), crate::busreset::BusResetState::QuiescingAt);

        core.poll_bus_reset_guards(&io); // -> RestoringConfigRom, re-writes the ROM registers
        assert_ne!(io.latched(offsets::CONFIG_ROM_MAP), 0);
        core.poll_bus_reset_guards(&io); // -> Rearming, decodes Self-ID + builds topology
        assert!(core.topology().is_some());
        assert_eq!(core.topology().unwrap().node_count, 1);

        core.poll_bus_reset_guards(&io); // -> Idle, publishes
        assert_eq!(core.bus_reset.state(), crate::busreset::BusResetState::Idle);
        assert_eq!(core.reset_count, 1);
    }

    #[test]
    fn shutdown_clears_master_enable_and_returns_to_stopped() {
        let io = FakeRegisterIo::new();
        let mut core = ControllerCore::new(ControllerConfig::default());
        let (req_ring, resp_ring, _a, _b) = rings();
        let self_id_buf = alloc::vec![0u32; 64];
        let mut rom_buf = alloc::vec![0u32; 16];
        start_core(&mut core, &io, &self_id_buf, &mut rom_buf, req_ring, resp_ring).unwrap();

        core.shutdown(&io);
        assert_eq!(core.state(), ControllerState::Stopped);
        assert_eq!(io.latched(offsets::INT_MASK_SET) & int_mask::MASTER_INT_ENABLE, 0);
    }

    #[test]
    fn publish_status_increments_sequence_every_call() {
        let mut core = ControllerCore::new(ControllerConfig::default());
        let a = core.publish_status(PublishReason::Boot);
        let b = core.publish_status(PublishReason::Watchdog);
        assert_eq!(b.sequence, a.sequence + 1);
    }

    fn test_command(node: u16) -> (Command, alloc::sync::Arc<core::sync::atomic::AtomicU32>) {
        use core::sync::atomic::{AtomicU32, Ordering};
        let observed = alloc::sync::Arc::new(AtomicU32::new(0));
        let observed_for_closure = observed.clone();
        let command = Command {
            kind: TransactionKind::Read,
            destination_node_id: node,
            address_hi: 0xFFFF,
            address_lo: 0xF000_0000,
            payload: alloc::vec::Vec::new(),
            on_complete: alloc::boxed::Box::new(move |status, _payload| {
                observed_for_closure.store(if status == CompletionStatus::Complete { 1 } else { 2 }, Ordering::SeqCst);
            }),
        };
        (command, observed)
    }

    #[test]
    fn submit_command_reaches_the_at_request_ring() {
        let io = FakeRegisterIo::new();
        let mut core = ControllerCore::new(ControllerConfig::default());
        let (req_ring, resp_ring, _a, _b) = rings();
        let self_id_buf = alloc::vec![0u32; 64];
        let mut rom_buf = alloc::vec![0u32; 16];
        start_core(&mut core, &io, &self_id_buf, &mut rom_buf, req_ring, resp_ring).unwrap();

        let (command, _observed) = test_command(2);
        core.submit_command(&io, 0, command);

        assert!(core.in_flight_command.is_some());
        assert_eq!(core.transactions.outstanding_count(), 1);
    }

    #[test]
    fn post_response_header_completes_the_in_flight_command() {
        let io = FakeRegisterIo::new();
        let mut core = ControllerCore::new(ControllerConfig::default());
        let (req_ring, resp_ring, _a, _b) = rings();
        let self_id_buf = alloc::vec![0u32; 64];
        let mut rom_buf = alloc::vec![0u32; 16];
        start_core(&mut core, &io, &self_id_buf, &mut rom_buf, req_ring, resp_ring).unwrap();

        let (command, observed) = test_command(3);
        core.submit_command(&io, 0, command);
        let t_label = core.in_flight_command.as_ref().unwrap().0;
        let t_label = core.transactions.record(t_label).unwrap().t_label;

        core.post_response_header(t_label, 3);
        let snapshot = InterruptSnapshot {
            int_event: crate::reg::bits::int_event::RS_PKT,
            int_mask: 0,
            iso_xmit_event: 0,
            iso_recv_event: 0,
            timestamp_ns: 0,
        };
        core.handle_interrupt(&io, snapshot);

        assert!(core.in_flight_command.is_none());
        assert_eq!(observed.load(core::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn tick_watchdog_times_out_and_completes_the_in_flight_command() {
        let io = FakeRegisterIo::new();
        let mut config = ControllerConfig::default();
        config.transaction_max_retries = 0;
        config.transaction_default_deadline_us = 1;
        let mut core = ControllerCore::new(config);
        let (req_ring, resp_ring, _a, _b) = rings();
        let self_id_buf = alloc::vec![0u32; 64];
        let mut rom_buf = alloc::vec![0u32; 16];
        start_core(&mut core, &io, &self_id_buf, &mut rom_buf, req_ring, resp_ring).unwrap();

        let (command, observed) = test_command(5);
        core.submit_command(&io, 0, command);

        core.tick_watchdog(&io, 1_000_000);
        assert!(core.in_flight_command.is_none());
        assert_eq!(observed.load(core::sync::atomic::Ordering::SeqCst), 2);
    }
}
