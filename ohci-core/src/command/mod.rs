//! Serialized command queue (§4.8): a FIFO plus a single `commandInFlight`
//! latch, guaranteeing sequential AT submission even across retries and
//! bus-reset-induced resubmissions.

extern crate alloc;

use crate::error::CompletionStatus;
use crate::transaction::TransactionKind;
use alloc::boxed::Box;
use alloc::collections::VecDeque;

/// One queued user request, not yet handed to the transaction tracker.
pub struct Command {
    pub kind: TransactionKind,
    pub destination_node_id: u16,
    pub address_hi: u16,
    pub address_lo: u32,
    pub payload: alloc::vec::Vec<u8>,
    pub on_complete: Box<dyn FnOnce(CompletionStatus, alloc::vec::Vec<u8>) + Send>,
}

/// Serializes command submission: `execute_next` only ever pulls a new
/// command once the in-flight latch has been cleared by a completion.
pub struct CommandQueue {
    pending: VecDeque<Command>,
    in_flight: bool,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self { pending: VecDeque::new(), in_flight: false }
    }

    pub fn enqueue(&mut self, command: Command) {
        self.pending.push_back(command);
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Pull the head command and mark the latch, if nothing is already
    /// in-flight. The caller is responsible for actually submitting it
    /// through the transaction tracker and descriptor builder; this type
    /// only enforces "one at a time".
    pub fn execute_next(&mut self) -> Option<Command> {
        if self.in_flight {
            return None;
        }
        let command = self.pending.pop_front()?;
        self.in_flight = true;
        Some(command)
    }

    /// Invoked once a submitted command's transaction reaches a terminal
    /// state (post-retries): runs the callback, clears the latch, and
    /// signals the caller to call `execute_next` again.
    pub fn complete_in_flight(
        &mut self,
        command: Command,
        status: CompletionStatus,
        response_payload: alloc::vec::Vec<u8>,
    ) {
        self.in_flight = false;
        (command.on_complete)(status, response_payload);
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};
    use alloc::sync::Arc;

    fn command(tag: u32, observed: Arc<AtomicU32>) -> Command {
        Command {
            kind: TransactionKind::Write,
            destination_node_id: 1,
            address_hi: 0xFFFF,
            address_lo: 0xF000_0000,
            payload: alloc::vec::Vec::new(),
            on_complete: Box::new(move |_status, _payload| {
                observed.store(tag, Ordering::SeqCst);
            }),
        }
    }

    #[test]
    fn only_one_command_is_in_flight_at_a_time() {
        let mut queue = CommandQueue::new();
        let observed = Arc::new(AtomicU32::new(0));
        queue.enqueue(command(1, observed.clone()));
        queue.enqueue(command(2, observed.clone()));

        let first = queue.execute_next().unwrap();
        assert!(queue.is_in_flight());
        assert!(queue.execute_next().is_none());

        queue.complete_in_flight(first, CompletionStatus::Complete, alloc::vec::Vec::new());
        assert_eq!(observed.load(Ordering::SeqCst), 1);
        assert!(!queue.is_in_flight());

        let second = queue.execute_next().unwrap();
        queue.complete_in_flight(second, CompletionStatus::Complete, alloc::vec::Vec::new());
        assert_eq!(observed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn execute_next_on_empty_queue_returns_none() {
        let mut queue = CommandQueue::new();
        assert!(queue.execute_next().is_none());
    }
}
