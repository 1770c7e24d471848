//! Transaction tracker and response router (§4.7): the outstanding-table
//! keyed by `(tLabel, nodeId, generation)`, a deadline-ordered queue, and
//! bus-reset cancellation.

pub mod speed;

extern crate alloc;

use crate::config::BackoffStrategy;
use crate::error::{CompletionStatus, OhciError};
use alloc::collections::{BTreeMap, BinaryHeap};
use core::cmp::Reverse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Read,
    Write,
    Lock,
    Stream,
    Phy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Pending,
    InFlight,
    AwaitingResponse,
    Complete,
    Cancelled,
    TimedOut,
}

/// One outstanding asynchronous transaction. Owned by the tracker while
/// in-flight; on completion ownership transfers to the caller via the
/// returned record.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub handle: u16,
    pub t_label: u8,
    pub destination_node_id: u16,
    pub kind: TransactionKind,
    pub address_hi: u16,
    pub address_lo: u32,
    pub speed: u8,
    pub retries_remaining: u8,
    pub generation_at_submit: u8,
    pub deadline_ns: u64,
    pub state: TransactionState,
    pub fail_on_reset: bool,
}

/// A key the outstanding table is indexed by — unique per the spec's
/// uniqueness invariant ("(tLabel, destinationNodeId, currentGeneration)
/// identifies at most one in-flight transaction").
type OutstandingKey = (u8, u16, u8);

pub struct RetryPolicy {
    pub max_retries: u8,
    pub base_backoff_us: u32,
    pub backoff_strategy: BackoffStrategy,
}

impl RetryPolicy {
    /// Backoff before the next retry attempt, given how many retries have
    /// already been consumed.
    pub fn backoff_us(&self, retries_consumed: u8) -> u32 {
        match self.backoff_strategy {
            BackoffStrategy::Fixed => self.base_backoff_us,
            BackoffStrategy::Exponential => {
                self.base_backoff_us.saturating_mul(1u32 << retries_consumed.min(16))
            }
        }
    }
}

pub struct TransactionTracker {
    outstanding: BTreeMap<OutstandingKey, u16>,
    records: BTreeMap<u16, TransactionRecord>,
    deadline_queue: BinaryHeap<Reverse<(u64, u16)>>,
    next_handle: u16,
}

impl TransactionTracker {
    pub fn new() -> Self {
        Self {
            outstanding: BTreeMap::new(),
            records: BTreeMap::new(),
            deadline_queue: BinaryHeap::new(),
            next_handle: 1,
        }
    }

    fn allocate_handle(&mut self) -> u16 {
        loop {
            let candidate = self.next_handle;
            self.next_handle = self.next_handle.wrapping_add(1);
            if self.next_handle == 0 {
                self.next_handle = 1;
            }
            if candidate != 0 && !self.records.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Find an unused t-label (0..63) for this destination at this
    /// generation.
    fn allocate_t_label(&self, destination_node_id: u16, generation: u8) -> Option<u8> {
        for candidate in 0u8..64 {
            if !self.outstanding.contains_key(&(candidate, destination_node_id, generation)) {
                return Some(candidate);
            }
        }
        None
    }

    /// Submit a new transaction. Rejects stale generations immediately with
    /// `BusReset` before any descriptor is posted (§7).
    #[allow(clippy::too_many_arguments)]
    pub fn submit(
        &mut self,
        kind: TransactionKind,
        destination_node_id: u16,
        address_hi: u16,
        address_lo: u32,
        speed: u8,
        current_generation: u8,
        deadline_ns: u64,
        max_retries: u8,
        fail_on_reset: bool,
    ) -> Result<u16, OhciError> {
        let t_label = self
            .allocate_t_label(destination_node_id, current_generation)
            .ok_or(OhciError::NotReady)?;
        let handle = self.allocate_handle();

        let record = TransactionRecord {
            handle,
            t_label,
            destination_node_id,
            kind,
            address_hi,
            address_lo,
            speed,
            retries_remaining: max_retries,
            generation_at_submit: current_generation,
            deadline_ns,
            state: TransactionState::Pending,
            fail_on_reset,
        };

        self.outstanding.insert((t_label, destination_node_id, current_generation), handle);
        self.deadline_queue.push(Reverse((deadline_ns, handle)));
        self.records.insert(handle, record);
        Ok(handle)
    }

    /// Look up an outstanding record by its submit-time handle, e.g. to read
    /// back the t-label [`Self::submit`] allocated before building the wire
    /// packet for it.
    pub fn record(&self, handle: u16) -> Option<&TransactionRecord> {
        self.records.get(&handle)
    }

    pub fn mark_in_flight(&mut self, handle: u16) {
        if let Some(record) = self.records.get_mut(&handle) {
            record.state = TransactionState::InFlight;
        }
    }

    pub fn mark_awaiting_response(&mut self, handle: u16) {
        if let Some(record) = self.records.get_mut(&handle) {
            record.state = TransactionState::AwaitingResponse;
        }
    }

    /// Match an incoming AR-Response packet to its outstanding transaction
    /// and complete it, returning the finished record. `None` on a miss
    /// (caller logs and drops, per §4.7).
    pub fn complete_response(
        &mut self,
        t_label: u8,
        source_node_id: u16,
        current_generation: u8,
    ) -> Option<TransactionRecord> {
        let key = (t_label, source_node_id, current_generation);
        let handle = self.outstanding.remove(&key)?;
        let mut record = self.records.remove(&handle)?;
        record.state = TransactionState::Complete;
        Some(record)
    }

    /// Drain every record whose deadline has passed as of `now_ns`,
    /// transitioning each to `TimedOut` and removing it from both tables.
    pub fn poll_timeouts(&mut self, now_ns: u64) -> alloc::vec::Vec<TransactionRecord> {
        let mut expired = alloc::vec::Vec::new();
        while let Some(&Reverse((deadline, handle))) = self.deadline_queue.peek() {
            if deadline > now_ns {
                break;
            }
            self.deadline_queue.pop();
            if let Some(mut record) = self.records.remove(&handle) {
                // The deadline entry may be stale (record already completed
                // via the response path); only act on records still present.
                self.outstanding.remove(&(
                    record.t_label,
                    record.destination_node_id,
                    record.generation_at_submit,
                ));
                record.state = TransactionState::TimedOut;
                expired.push(record);
            }
        }
        expired
    }

    /// Cancel every outstanding record whose submit generation no longer
    /// matches `new_generation` and that opted into `fail_on_reset`; refresh
    /// the generation of the rest so they remain valid under the new bus.
    pub fn confirm_bus_generation(&mut self, new_generation: u8) -> alloc::vec::Vec<TransactionRecord> {
        let mut cancelled = alloc::vec::Vec::new();
        let stale_keys: alloc::vec::Vec<OutstandingKey> = self
            .outstanding
            .keys()
            .filter(|(_, _, gen)| *gen != new_generation)
            .copied()
            .collect();

        for key in stale_keys {
            let (t_label, node_id, old_gen) = key;
            let Some(&handle) = self.outstanding.get(&key) else { continue };
            let fail_on_reset = self.records.get(&handle).map(|r| r.fail_on_reset).unwrap_or(false);

            self.outstanding.remove(&key);
            if fail_on_reset {
                if let Some(mut record) = self.records.remove(&handle) {
                    record.state = TransactionState::Cancelled;
                    cancelled.push(record);
                }
            } else if let Some(record) = self.records.get_mut(&handle) {
                record.generation_at_submit = new_generation;
                self.outstanding.insert((t_label, node_id, new_generation), handle);
            }
            let _ = old_gen;
        }
        cancelled
    }

    pub fn outstanding_count(&self) -> usize {
        self.records.len()
    }

    pub fn cancel(&mut self, handle: u16) -> Option<TransactionRecord> {
        let mut record = self.records.remove(&handle)?;
        self.outstanding.remove(&(record.t_label, record.destination_node_id, record.generation_at_submit));
        record.state = TransactionState::Cancelled;
        Some(record)
    }
}

impl Default for TransactionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Upgrade a transient completion into the next retry attempt, or `None` if
/// the retry budget (or permanence of the status) forecloses one.
pub fn next_retry_speed(
    status: CompletionStatus,
    retries_remaining: u8,
    current_speed: speed::SpeedTier,
    policy: &mut speed::SpeedPolicy,
    node_id: u8,
) -> Option<speed::SpeedTier> {
    if !status.is_transient() || retries_remaining == 0 {
        return None;
    }
    Some(policy.record_timeout(node_id, current_speed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_then_response_completes_the_record() {
        let mut tracker = TransactionTracker::new();
        let handle = tracker
            .submit(TransactionKind::Read, 1, 0xFFFF, 0xF000_0000, 0, 1, 1_000_000, 3, true)
            .unwrap();
        let record = tracker.complete_response(0, 1, 1).unwrap();
        assert_eq!(record.handle, handle);
        assert_eq!(record.state, TransactionState::Complete);
        assert_eq!(tracker.outstanding_count(), 0);
    }

    #[test]
    fn record_looks_up_the_allocated_t_label() {
        let mut tracker = TransactionTracker::new();
        let handle = tracker
            .submit(TransactionKind::Read, 1, 0xFFFF, 0xF000_0000, 0, 1, 1_000_000, 3, true)
            .unwrap();
        assert_eq!(tracker.record(handle).unwrap().t_label, 0);
    }

    #[test]
    fn response_miss_returns_none() {
        let mut tracker = TransactionTracker::new();
        assert!(tracker.complete_response(5, 9, 1).is_none());
    }

    #[test]
    fn two_submits_to_the_same_destination_get_distinct_t_labels() {
        let mut tracker = TransactionTracker::new();
        let h1 = tracker
            .submit(TransactionKind::Write, 2, 0, 0, 0, 1, 1_000, 1, true)
            .unwrap();
        let h2 = tracker
            .submit(TransactionKind::Write, 2, 0, 0, 0, 1, 1_000, 1, true)
            .unwrap();
        assert_ne!(h1, h2);
        assert_eq!(tracker.outstanding_count(), 2);
    }

    #[test]
    fn poll_timeouts_drains_expired_deadlines() {
        let mut tracker = TransactionTracker::new();
        tracker
            .submit(TransactionKind::Read, 3, 0, 0, 0, 1, 500, 2, true)
            .unwrap();
        let expired = tracker.poll_timeouts(1_000);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].state, TransactionState::TimedOut);
        assert_eq!(tracker.outstanding_count(), 0);
    }

    #[test]
    fn poll_timeouts_leaves_unexpired_records_alone() {
        let mut tracker = TransactionTracker::new();
        tracker
            .submit(TransactionKind::Read, 3, 0, 0, 0, 1, 10_000, 2, true)
            .unwrap();
        assert!(tracker.poll_timeouts(1_000).is_empty());
        assert_eq!(tracker.outstanding_count(), 1);
    }

    #[test]
    fn confirm_bus_generation_cancels_fail_on_reset_records() {
        let mut tracker = TransactionTracker::new();
        tracker
            .submit(TransactionKind::Read, 4, 0, 0, 0, 3, 1_000_000, 2, true)
            .unwrap();
        let cancelled = tracker.confirm_bus_generation(4);
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].state, TransactionState::Cancelled);
        assert_eq!(tracker.outstanding_count(), 0);
    }

    #[test]
    fn confirm_bus_generation_refreshes_records_that_tolerate_reset() {
        let mut tracker = TransactionTracker::new();
        let handle = tracker
            .submit(TransactionKind::Read, 4, 0, 0, 0, 3, 1_000_000, 2, false)
            .unwrap();
        let cancelled = tracker.confirm_bus_generation(4);
        assert!(cancelled.is_empty());
        assert_eq!(tracker.outstanding_count(), 1);
        // Record should now be reachable at the new generation.
        let record = tracker.complete_response(0, 4, 4).unwrap();
        assert_eq!(record.handle, handle);
    }

    #[test]
    fn retry_policy_exponential_backoff_doubles_each_attempt() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_backoff_us: 250,
            backoff_strategy: BackoffStrategy::Exponential,
        };
        assert_eq!(policy.backoff_us(0), 250);
        assert_eq!(policy.backoff_us(1), 500);
        assert_eq!(policy.backoff_us(2), 1000);
    }

    #[test]
    fn next_retry_speed_returns_none_for_permanent_status() {
        let mut speed_policy = speed::SpeedPolicy::new();
        let result = next_retry_speed(
            CompletionStatus::DataError,
            3,
            speed::SpeedTier::S400,
            &mut speed_policy,
            1,
        );
        assert!(result.is_none());
    }
}
