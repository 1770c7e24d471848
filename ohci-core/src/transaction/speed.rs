//! Per-node link speed policy (§4.7.1, supplemented from the original
//! driver's `SpeedPolicy`).

extern crate alloc;

use alloc::collections::BTreeMap;

/// IEEE 1394 §6.2.4.2 speed codes, ordered low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SpeedTier {
    S100,
    S200,
    S400,
    S800,
}

impl SpeedTier {
    pub fn code(self) -> u8 {
        match self {
            SpeedTier::S100 => 0,
            SpeedTier::S200 => 1,
            SpeedTier::S400 => 2,
            SpeedTier::S800 => 3,
        }
    }

    /// Inverse of [`Self::code`]; out-of-range codes floor to `S100` rather
    /// than panicking, since a malformed wire value shouldn't take down the
    /// retry path that calls this.
    pub fn from_code(code: u8) -> SpeedTier {
        match code {
            1 => SpeedTier::S200,
            2 => SpeedTier::S400,
            3 => SpeedTier::S800,
            _ => SpeedTier::S100,
        }
    }

    pub fn max_payload_bytes(self) -> u16 {
        match self {
            SpeedTier::S100 => 512,
            SpeedTier::S200 => 1024,
            SpeedTier::S400 => 2048,
            SpeedTier::S800 => 4096,
        }
    }

    /// One tier down, floored at S100 (the retry policy's fallback ladder).
    pub fn downgrade(self) -> SpeedTier {
        match self {
            SpeedTier::S800 => SpeedTier::S400,
            SpeedTier::S400 => SpeedTier::S200,
            SpeedTier::S200 | SpeedTier::S100 => SpeedTier::S100,
        }
    }
}

/// What a caller needs to build a transaction toward a given node: the speed
/// to use, the payload cap at that speed, and whether the global
/// flaky-topology escape hatch is halving it further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkPolicy {
    pub speed: SpeedTier,
    pub max_payload_bytes: u16,
    pub halve_packets: bool,
}

#[derive(Debug, Clone, Copy)]
struct NodeSpeedState {
    current_speed: SpeedTier,
    timeout_count: u8,
    success_count: u32,
}

impl Default for NodeSpeedState {
    fn default() -> Self {
        Self { current_speed: SpeedTier::S100, timeout_count: 0, success_count: 0 }
    }
}

/// Downgrade after this many *consecutive* timeouts at the current speed.
const DOWNGRADE_THRESHOLD: u8 = 2;

/// Per-node speed tracking, owned by the controller core and consulted by
/// the transaction tracker and ROM scanner alike. A node with no recorded
/// outcome defaults to S100 (the source's hardcoded-compatibility default);
/// once an outcome is recorded the policy governs — see DESIGN.md.
pub struct SpeedPolicy {
    per_node: BTreeMap<u8, NodeSpeedState>,
    halve_packets: bool,
}

impl SpeedPolicy {
    pub fn new() -> Self {
        Self { per_node: BTreeMap::new(), halve_packets: false }
    }

    pub fn set_halve_packets(&mut self, halve: bool) {
        self.halve_packets = halve;
    }

    pub fn for_node(&self, node_id: u8) -> LinkPolicy {
        let state = self.per_node.get(&node_id).copied().unwrap_or_default();
        let mut max_payload_bytes = state.current_speed.max_payload_bytes();
        if self.halve_packets {
            max_payload_bytes /= 2;
        }
        LinkPolicy { speed: state.current_speed, max_payload_bytes, halve_packets: self.halve_packets }
    }

    pub fn record_success(&mut self, node_id: u8, speed: SpeedTier) {
        let state = self.per_node.entry(node_id).or_default();
        state.current_speed = speed;
        state.timeout_count = 0;
        state.success_count += 1;
    }

    /// Returns the speed the node should be retried at next (unchanged until
    /// [`DOWNGRADE_THRESHOLD`] consecutive timeouts have accrued).
    pub fn record_timeout(&mut self, node_id: u8, speed: SpeedTier) -> SpeedTier {
        let state = self.per_node.entry(node_id).or_default();
        state.current_speed = speed;
        state.timeout_count += 1;
        if state.timeout_count >= DOWNGRADE_THRESHOLD {
            state.current_speed = speed.downgrade();
            state.timeout_count = 0;
        }
        state.current_speed
    }

    /// Clear all per-node state; node IDs are only meaningful within a bus
    /// generation, so this is called at every bus reset.
    pub fn reset(&mut self) {
        self.per_node.clear();
    }
}

impl Default for SpeedPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecorded_node_defaults_to_s100() {
        let policy = SpeedPolicy::new();
        assert_eq!(policy.for_node(5).speed, SpeedTier::S100);
    }

    #[test]
    fn two_consecutive_timeouts_downgrade_one_tier() {
        let mut policy = SpeedPolicy::new();
        policy.record_success(1, SpeedTier::S400);
        assert_eq!(policy.for_node(1).speed, SpeedTier::S400);

        let after_first = policy.record_timeout(1, SpeedTier::S400);
        assert_eq!(after_first, SpeedTier::S400);
        let after_second = policy.record_timeout(1, SpeedTier::S400);
        assert_eq!(after_second, SpeedTier::S200);
    }

    #[test]
    fn downgrade_floors_at_s100() {
        assert_eq!(SpeedTier::S100.downgrade(), SpeedTier::S100);
    }

    #[test]
    fn reset_clears_every_node() {
        let mut policy = SpeedPolicy::new();
        policy.record_success(3, SpeedTier::S800);
        policy.reset();
        assert_eq!(policy.for_node(3).speed, SpeedTier::S100);
    }

    #[test]
    fn halve_packets_halves_the_payload_cap() {
        let mut policy = SpeedPolicy::new();
        policy.record_success(2, SpeedTier::S400);
        policy.set_halve_packets(true);
        assert_eq!(policy.for_node(2).max_payload_bytes, 1024);
    }
}
