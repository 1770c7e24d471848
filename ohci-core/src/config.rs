//! Controller-wide configuration (§4.12).
//!
//! Generalizes the teacher's scattered `E1000eConfig` into the single seam
//! every component is built from, per the Design Notes' call to confine
//! configuration to an explicit structure passed by reference rather than
//! read from globals.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Extra bits OR'd into [`crate::reg::bits::BASE_INT_MASK`] at start.
    pub base_int_mask_extra: u32,
    /// Bound on the `active` poll when stopping an AT context (§4.6).
    pub at_stop_poll_timeout_us: u32,
    /// Quadlet capacity reserved for the Self-ID DMA buffer (§4.4).
    pub self_id_buffer_quad_capacity: usize,
    /// Maximum concurrent in-flight BIB reads during a ROM scan (§4.9).
    pub rom_scan_max_in_flight: usize,
    /// Retries allotted to each ROM-scan step before a speed downgrade.
    pub rom_scan_per_step_retries: u8,
    /// Retries allotted to a transaction before it completes permanently.
    pub transaction_max_retries: u8,
    pub transaction_base_backoff_us: u32,
    pub transaction_backoff_strategy: BackoffStrategy,
    /// Default deadline for a submitted transaction (§4.7).
    pub transaction_default_deadline_us: u64,
    /// Cap on root-delegation retry attempts (§4.3).
    pub max_delegate_retries: u32,
    /// Whether the ROM scanner performs the IRM lock/compare-swap
    /// verification step (§4.9).
    pub irm_verification_enabled: bool,
    /// Escape hatch: halve computed max payload sizes for flaky topologies
    /// (§4.7.1).
    pub half_size_packets: bool,
    /// `vendor_id` staged into the exported Config ROM's root directory
    /// (§4.3 step 5).
    pub config_rom_vendor_id: u32,
    /// `max_rec` field of the exported `BusOptions` quadlet; encodes the max
    /// payload this link can receive as `2^(max_rec + 1)` bytes.
    pub config_rom_max_rec: u8,
    /// `link_spd` field of the exported `BusOptions` quadlet (0 = S100 .. 2 = S400).
    pub config_rom_link_speed: u8,
    /// Bound on the `LPS` readback poll in Phase 2 of [`crate::controller::ControllerCore::start`].
    pub lps_poll_timeout_us: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_int_mask_extra: 0,
            at_stop_poll_timeout_us: 100_000,
            self_id_buffer_quad_capacity: 512, // 2 KiB / 4 bytes
            rom_scan_max_in_flight: 2,
            rom_scan_per_step_retries: 3,
            transaction_max_retries: 3,
            transaction_base_backoff_us: 250,
            transaction_backoff_strategy: BackoffStrategy::Exponential,
            transaction_default_deadline_us: 100_000,
            max_delegate_retries: 5,
            irm_verification_enabled: true,
            half_size_packets: false,
            config_rom_vendor_id: 0,
            config_rom_max_rec: 8, // 2^9 = 512-byte max payload
            config_rom_link_speed: 2, // S400
            lps_poll_timeout_us: 150_000, // OHCI bring-up budget is 150ms
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let cfg = ControllerConfig::default();
        assert_eq!(cfg.at_stop_poll_timeout_us, 100_000);
        assert_eq!(cfg.self_id_buffer_quad_capacity * 4, 2048);
        assert_eq!(cfg.rom_scan_max_in_flight, 2);
        assert_eq!(cfg.lps_poll_timeout_us, 150_000);
        assert_eq!(cfg.max_delegate_retries, 5);
        assert_eq!(cfg.transaction_default_deadline_us, 100_000);
    }
}
</content>
