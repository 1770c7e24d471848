//! Bus-reset coordinator (§4.3): the deterministic FSM sequencing the
//! spec-ordered recovery steps between interrupt events.
//!
//! This type is a pure state machine — it decides what should happen next
//! and hands back a list of [`BusResetAction`]s for the controller core to
//! execute against the register facade, the Self-ID decoder, and the
//! topology builder. Keeping hardware access out of this module is what
//! makes the nine-state, seven-event transition table in §8's testable
//! properties checkable without a register fake.

extern crate alloc;

use crate::error::OhciError;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusResetState {
    Idle,
    Detecting,
    WaitingSelfId,
    QuiescingAt,
    RestoringConfigRom,
    ClearingBusReset,
    Rearming,
    Complete,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusResetEvent {
    IrqBusReset,
    IrqSelfIdComplete,
    IrqSelfIdComplete2,
    AsyncSynthReset,
    TimeoutGuard,
    Unrecoverable,
    RegFail,
}

/// Side effects the caller must perform after a `step` call, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusResetAction {
    MaskBusReset,
    UnmaskBusReset,
    ArmSelfIdBuffer,
    StopAtContexts,
    DrainAtCompletions,
    RestoreConfigRom,
    ClearBusResetEvent,
    DecodeSelfIdAndBuildTopology,
    RearmAtContexts,
    IssueDelegatePhyPacket,
    CommitMetricsAndPublish,
    InvokeTopologyCallback,
    RecordFailure,
    LogAbort,
}

/// Guard predicates the controller core evaluates against live hardware
/// state; the FSM only consumes their boolean results.
#[derive(Debug, Clone, Copy, Default)]
pub struct Guards {
    /// `G_ATInactive`: both AT contexts report `active == 0`.
    pub at_inactive: bool,
    /// `G_ROMImageReady`: the three-step ROM restoration has completed.
    pub rom_image_ready: bool,
    /// `G_NodeIDValid`: the NodeID register's IDValid bit is set.
    pub node_id_valid: bool,
}

pub struct BusResetCoordinator {
    state: BusResetState,
    self_id_complete1: bool,
    self_id_complete2: bool,
    delegate_retry_counter: u8,
    max_delegate_retries: u8,
    reset_count: u32,
    failure_reason: Option<OhciError>,
}

impl BusResetCoordinator {
    pub fn new(max_delegate_retries: u8) -> Self {
        Self {
            state: BusResetState::Idle,
            self_id_complete1: false,
            self_id_complete2: false,
            delegate_retry_counter: 0,
            max_delegate_retries,
            reset_count: 0,
            failure_reason: None,
        }
    }

    pub fn state(&self) -> BusResetState {
        self.state
    }

    pub fn reset_count(&self) -> u32 {
        self.reset_count
    }

    pub fn failure_reason(&self) -> Option<OhciError> {
        self.failure_reason
    }

    /// Gap count of 0 in the latest topology, or a node set that changed
    /// relative to the prior generation, bypass the delegate-retry cap
    /// (§4.3). Both call sites the source documents are honored here.
    pub fn reset_delegation_retry_counter(&mut self) {
        self.delegate_retry_counter = 0;
    }

    fn stage_delegate_retry(&mut self, actions: &mut Vec<BusResetAction>) {
        if self.delegate_retry_counter < self.max_delegate_retries {
            self.delegate_retry_counter += 1;
            actions.push(BusResetAction::IssueDelegatePhyPacket);
        }
    }

    /// Advance the FSM by one event. Terminal self-transitions (e.g. an
    /// `IrqBusReset` while already `Detecting`) are treated as re-detections
    /// and restart the WaitingSelfId pair tracking, matching real hardware
    /// where a second reset can race the first recovery.
    pub fn step(&mut self, event: BusResetEvent, guards: Guards) -> Vec<BusResetAction> {
        let mut actions = Vec::new();

        if matches!(event, BusResetEvent::Unrecoverable | BusResetEvent::RegFail) {
            self.failure_reason = Some(if event == BusResetEvent::Unrecoverable {
                OhciError::UnrecoverableError
            } else {
                OhciError::RegAccessFail
            });
            self.state = BusResetState::Error;
            actions.push(BusResetAction::RecordFailure);
            return actions;
        }

        if self.state == BusResetState::Error {
            // Refuses to leave Error without an explicit external reset
            // (not modeled as an event here — the controller core calls a
            // separate recovery entry point).
            return actions;
        }

        match (self.state, event) {
            (BusResetState::Idle, BusResetEvent::IrqBusReset) => {
                self.state = BusResetState::Detecting;
                self.reset_count += 1;
                actions.push(BusResetAction::MaskBusReset);
                // Detecting -> WaitingSelfId is unconditional (step 2).
                self.state = BusResetState::WaitingSelfId;
                self.self_id_complete1 = false;
                self.self_id_complete2 = false;
                actions.push(BusResetAction::ArmSelfIdBuffer);
            }

            (BusResetState::WaitingSelfId, BusResetEvent::IrqSelfIdComplete) => {
                self.self_id_complete1 = true;
                self.try_advance_past_waiting(&mut actions);
            }
            (BusResetState::WaitingSelfId, BusResetEvent::IrqSelfIdComplete2) => {
                self.self_id_complete2 = true;
                self.try_advance_past_waiting(&mut actions);
            }

            (BusResetState::QuiescingAt, BusResetEvent::TimeoutGuard) => {
                if guards.at_inactive {
                    self.enter_restoring_config_rom(&mut actions);
                } else {
                    self.abort_to_idle(&mut actions);
                }
            }

            (BusResetState::RestoringConfigRom, BusResetEvent::TimeoutGuard) => {
                if guards.rom_image_ready && guards.node_id_valid {
                    self.enter_clearing_bus_reset(&mut actions);
                } else {
                    self.abort_to_idle(&mut actions);
                }
            }

            (BusResetState::Rearming, _) => {
                self.state = BusResetState::Complete;
                actions.push(BusResetAction::CommitMetricsAndPublish);
                actions.push(BusResetAction::UnmaskBusReset);
                actions.push(BusResetAction::InvokeTopologyCallback);
                self.state = BusResetState::Idle;
            }

            // A bus reset observed while a recovery is already underway: the
            // reentrancy latch is the caller's responsibility (§4.3,
            // "Concurrency"); here we simply note it restarts Self-ID
            // accumulation once WaitingSelfId is reached again.
            (_, BusResetEvent::IrqBusReset) => {
                self.reset_count += 1;
            }

            (_, BusResetEvent::TimeoutGuard) => {
                self.abort_to_idle(&mut actions);
            }

            (_, BusResetEvent::AsyncSynthReset) => {
                // §9 Open Question: bus-reset packets on AR-Request are
                // purely informative and advance no FSM state on their own.
                actions.push(BusResetAction::LogAbort);
            }

            _ => {}
        }

        actions
    }

    fn try_advance_past_waiting(&mut self, actions: &mut Vec<BusResetAction>) {
        if self.self_id_complete1 && self.self_id_complete2 {
            self.state = BusResetState::QuiescingAt;
            actions.push(BusResetAction::StopAtContexts);
            actions.push(BusResetAction::DrainAtCompletions);
        }
    }

    fn enter_restoring_config_rom(&mut self, actions: &mut Vec<BusResetAction>) {
        self.state = BusResetState::RestoringConfigRom;
        actions.push(BusResetAction::RestoreConfigRom);
    }

    fn enter_clearing_bus_reset(&mut self, actions: &mut Vec<BusResetAction>) {
        self.state = BusResetState::ClearingBusReset;
        actions.push(BusResetAction::ClearBusResetEvent);
        self.enter_rearming(actions);
    }

    fn enter_rearming(&mut self, actions: &mut Vec<BusResetAction>) {
        self.state = BusResetState::Rearming;
        actions.push(BusResetAction::DecodeSelfIdAndBuildTopology);
        actions.push(BusResetAction::RearmAtContexts);
        self.stage_delegate_retry(actions);
    }

    fn abort_to_idle(&mut self, actions: &mut Vec<BusResetAction>) {
        self.state = BusResetState::Idle;
        actions.push(BusResetAction::UnmaskBusReset);
        actions.push(BusResetAction::LogAbort);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_guards() -> Guards {
        Guards { at_inactive: true, rom_image_ready: true, node_id_valid: true }
    }

    #[test]
    fn full_recovery_sequence_reaches_idle_via_complete() {
        let mut fsm = BusResetCoordinator::new(5);
        fsm.step(BusResetEvent::IrqBusReset, Guards::default());
        assert_eq!(fsm.state(), BusResetState::WaitingSelfId);

        let mut actions = fsm.step(BusResetEvent::IrqSelfIdComplete, Guards::default());
        assert!(actions.is_empty());
        assert_eq!(fsm.state(), BusResetState::WaitingSelfId);

        actions = fsm.step(BusResetEvent::IrqSelfIdComplete2, Guards::default());
        assert!(actions.contains(&BusResetAction::StopAtContexts));
        assert_eq!(fsm.state(), BusResetState::QuiescingAt);

        actions = fsm.step(BusResetEvent::TimeoutGuard, good_guards());
        assert!(actions.contains(&BusResetAction::RestoreConfigRom));
        assert_eq!(fsm.state(), BusResetState::RestoringConfigRom);

        actions = fsm.step(BusResetEvent::TimeoutGuard, good_guards());
        assert!(actions.contains(&BusResetAction::ClearBusResetEvent));
        assert!(actions.contains(&BusResetAction::DecodeSelfIdAndBuildTopology));
        assert_eq!(fsm.state(), BusResetState::Rearming);

        actions = fsm.step(BusResetEvent::TimeoutGuard, good_guards());
        assert!(actions.contains(&BusResetAction::CommitMetricsAndPublish));
        assert!(actions.contains(&BusResetAction::InvokeTopologyCallback));
        assert_eq!(fsm.state(), BusResetState::Idle);
        assert_eq!(fsm.reset_count(), 1);
    }

    #[test]
    fn timeout_guard_with_unmet_guards_aborts_to_idle() {
        let mut fsm = BusResetCoordinator::new(5);
        fsm.step(BusResetEvent::IrqBusReset, Guards::default());
        fsm.step(BusResetEvent::IrqSelfIdComplete, Guards::default());
        fsm.step(BusResetEvent::IrqSelfIdComplete2, Guards::default());
        assert_eq!(fsm.state(), BusResetState::QuiescingAt);

        let actions = fsm.step(BusResetEvent::TimeoutGuard, Guards::default());
        assert!(actions.contains(&BusResetAction::UnmaskBusReset));
        assert_eq!(fsm.state(), BusResetState::Idle);
    }

    #[test]
    fn unrecoverable_error_enters_error_and_sticks() {
        let mut fsm = BusResetCoordinator::new(5);
        let actions = fsm.step(BusResetEvent::Unrecoverable, Guards::default());
        assert!(actions.contains(&BusResetAction::RecordFailure));
        assert_eq!(fsm.state(), BusResetState::Error);
        assert_eq!(fsm.failure_reason(), Some(OhciError::UnrecoverableError));

        // Error refuses to leave without explicit external reset.
        let actions = fsm.step(BusResetEvent::IrqBusReset, good_guards());
        assert!(actions.is_empty());
        assert_eq!(fsm.state(), BusResetState::Error);
    }

    #[test]
    fn waiting_self_id_only_advances_once_both_halves_observed() {
        let mut fsm = BusResetCoordinator::new(5);
        fsm.step(BusResetEvent::IrqBusReset, Guards::default());
        fsm.step(BusResetEvent::IrqSelfIdComplete2, Guards::default());
        assert_eq!(fsm.state(), BusResetState::WaitingSelfId);
        fsm.step(BusResetEvent::IrqSelfIdComplete, Guards::default());
        assert_eq!(fsm.state(), BusResetState::QuiescingAt);
    }

    #[test]
    fn async_synth_reset_is_purely_diagnostic() {
        let mut fsm = BusResetCoordinator::new(5);
        fsm.step(BusResetEvent::IrqBusReset, Guards::default());
        let state_before = fsm.state();
        let actions = fsm.step(BusResetEvent::AsyncSynthReset, Guards::default());
        assert_eq!(actions, alloc::vec![BusResetAction::LogAbort]);
        assert_eq!(fsm.state(), state_before);
    }

    #[test]
    fn delegate_retry_budget_is_capped() {
        let mut fsm = BusResetCoordinator::new(1);
        let mut delegate_attempts = 0;
        for _ in 0..3 {
            fsm.step(BusResetEvent::IrqBusReset, Guards::default());
            fsm.step(BusResetEvent::IrqSelfIdComplete, Guards::default());
            fsm.step(BusResetEvent::IrqSelfIdComplete2, Guards::default());
            fsm.step(BusResetEvent::TimeoutGuard, good_guards());
            let rearm_actions = fsm.step(BusResetEvent::TimeoutGuard, good_guards());
            if rearm_actions.contains(&BusResetAction::IssueDelegatePhyPacket) {
                delegate_attempts += 1;
            }
            fsm.step(BusResetEvent::TimeoutGuard, good_guards());
        }
        assert_eq!(delegate_attempts, 1);
    }
}
