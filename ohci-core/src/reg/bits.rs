//! Bit-field definitions for the OHCI registers defined in [`super::offsets`].

// ═══════════════════════════════════════════════════════════════════════════
// HCControl (OHCI §5.3)
// ═══════════════════════════════════════════════════════════════════════════

pub mod hc_control {
    pub const SOFT_RESET: u32 = 1 << 16;
    pub const LINK_ENABLE: u32 = 1 << 17;
    pub const POSTED_WRITE_ENABLE: u32 = 1 << 18;
    pub const LPS: u32 = 1 << 19;
    pub const CYCLE_MATCH_ENABLE: u32 = 1 << 20;
    /// OHCI §5.7.2: enable IEEE 1394a enhancements in the Link.
    pub const A_PHY_ENHANCE_ENABLE: u32 = 1 << 22;
    pub const PROGRAM_PHY_ENABLE: u32 = 1 << 23;
    pub const NO_BYTE_SWAP: u32 = 1 << 30;
    pub const BIB_IMAGE_VALID: u32 = 1 << 31;
}

/// LinkControl register bits (OHCI 1.1 §5.10, Table 5-17).
///
/// Accessed through two write-only strobes and one read view:
/// `LinkControlSet` (0x0E0) sets bits, `LinkControlClear` (0x0E4) clears
/// bits, and reads of 0x0E0 return the latched value.
///
/// Before setting `RCV_SELF_ID` the Self-ID buffer pointer register must
/// already hold a valid DMA address (OHCI warning).
pub mod link_control {
    /// Accept incoming Self-ID packets into the AR contexts.
    pub const RCV_SELF_ID: u32 = 1 << 9;
    /// Accept PHY packets (and Self-ID packets outside the Self-ID phase).
    pub const RCV_PHY_PKT: u32 = 1 << 10;
    /// Enable cycle-timer offset accumulation at 49.152 MHz / 2.
    pub const CYCLE_TIMER_ENABLE: u32 = 1 << 20;
    /// Generate cycle-start packets when root; must be 0 while `CYCLE_TOO_LONG`
    /// is latched in IntEvent.
    pub const CYCLE_MASTER: u32 = 1 << 21;
}

// ═══════════════════════════════════════════════════════════════════════════
// IntEvent / IntMask (OHCI §5.7)
// ═══════════════════════════════════════════════════════════════════════════

pub mod int_event {
    pub const REQ_TX_COMPLETE: u32 = 1 << 0;
    pub const RESP_TX_COMPLETE: u32 = 1 << 1;
    pub const AR_RQ: u32 = 1 << 2;
    pub const AR_RS: u32 = 1 << 3;
    pub const RQ_PKT: u32 = 1 << 4;
    pub const RS_PKT: u32 = 1 << 5;
    pub const ISOCH_TX: u32 = 1 << 6;
    pub const ISOCH_RX: u32 = 1 << 7;
    pub const POSTED_WRITE_ERR: u32 = 1 << 8;
    pub const LOCK_RESP_ERR: u32 = 1 << 9;
    pub const SELF_ID_COMPLETE2: u32 = 1 << 15;
    pub const SELF_ID_COMPLETE: u32 = 1 << 16;
    pub const BUS_RESET: u32 = 1 << 17;
    pub const REG_ACCESS_FAIL: u32 = 1 << 18;
    pub const PHY: u32 = 1 << 19;
    pub const CYCLE_SYNCH: u32 = 1 << 20;
    pub const CYCLE_64_SECONDS: u32 = 1 << 21;
    pub const CYCLE_LOST: u32 = 1 << 22;
    pub const CYCLE_INCONSISTENT: u32 = 1 << 23;
    pub const UNRECOVERABLE_ERROR: u32 = 1 << 24;
    pub const CYCLE_TOO_LONG: u32 = 1 << 25;
    pub const PHY_REG_RCVD: u32 = 1 << 26;
    pub const ACK_TARDY: u32 = 1 << 27;
    // Bits 10-14, 28 reserved.
    pub const SOFT_INTERRUPT: u32 = 1 << 29;
    pub const VENDOR_SPECIFIC: u32 = 1 << 30;
    // Bit 31 belongs to IntMask (MASTER_INT_ENABLE), not IntEvent.
}

pub mod int_mask {
    /// Master interrupt enable; must be set for any delivery regardless of
    /// which individual bits are unmasked.
    pub const MASTER_INT_ENABLE: u32 = 1 << 31;
}

/// Baseline interrupt mask for steady-state operation: every event the core
/// wants delivered once the controller is running. `MASTER_INT_ENABLE` is
/// set separately since it gates delivery rather than naming an event.
pub const BASE_INT_MASK: u32 = int_event::REQ_TX_COMPLETE
    | int_event::RESP_TX_COMPLETE
    | int_event::AR_RQ
    | int_event::AR_RS
    | int_event::RQ_PKT
    | int_event::RS_PKT
    | int_event::ISOCH_TX
    | int_event::ISOCH_RX
    | int_event::POSTED_WRITE_ERR
    | int_event::LOCK_RESP_ERR
    | int_event::SELF_ID_COMPLETE
    | int_event::SELF_ID_COMPLETE2
    | int_event::BUS_RESET
    | int_event::REG_ACCESS_FAIL
    | int_event::CYCLE_INCONSISTENT
    | int_event::UNRECOVERABLE_ERROR
    | int_event::CYCLE_TOO_LONG
    | int_event::PHY_REG_RCVD;

/// Bits routed to the bus-reset coordinator by the interrupt dispatcher (§4.2).
pub const BUS_RESET_RELEVANT_MASK: u32 = int_event::BUS_RESET
    | int_event::SELF_ID_COMPLETE
    | int_event::SELF_ID_COMPLETE2
    | int_event::UNRECOVERABLE_ERROR
    | int_event::REG_ACCESS_FAIL;

/// Bits that drive the async engine's TX-completion drain.
pub const TX_COMPLETE_MASK: u32 = int_event::REQ_TX_COMPLETE | int_event::RESP_TX_COMPLETE;

/// Bits that drive the async engine's RX poll.
pub const RX_PACKET_MASK: u32 = int_event::RQ_PKT | int_event::RS_PKT;

/// Bits routed to the diagnostic/error path.
pub const ERROR_MASK: u32 = int_event::POSTED_WRITE_ERR
    | int_event::UNRECOVERABLE_ERROR
    | int_event::REG_ACCESS_FAIL
    | int_event::CYCLE_TOO_LONG
    | int_event::CYCLE_INCONSISTENT;

// ═══════════════════════════════════════════════════════════════════════════
// BusOptions (IEEE 1394 bus_options quadlet, mirrored at OHCI BusOptions)
// ═══════════════════════════════════════════════════════════════════════════

pub mod bus_options {
    pub const IRMC: u32 = 1 << 31;
    pub const CMC: u32 = 1 << 30;
    pub const ISC: u32 = 1 << 29;
    pub const BMC: u32 = 1 << 28;
    pub const PMC: u32 = 1 << 27;
    pub const CYC_CLK_ACC_SHIFT: u32 = 16;
    pub const MAX_REC_SHIFT: u32 = 12;
    pub const GENERATION_SHIFT: u32 = 4;
    pub const LINK_SPD_MASK: u32 = 0x7;
}

// ═══════════════════════════════════════════════════════════════════════════
// SelfIDCount (OHCI §5.18)
// ═══════════════════════════════════════════════════════════════════════════

pub mod self_id_count {
    pub const ERROR: u32 = 0x8000_0000;
    pub const GENERATION_MASK: u32 = 0x00FF_0000;
    pub const GENERATION_SHIFT: u32 = 16;
    pub const SIZE_MASK: u32 = 0x0000_07FC;
    pub const SIZE_SHIFT: u32 = 2;
}

// ═══════════════════════════════════════════════════════════════════════════
// NodeID (OHCI §5.11)
// ═══════════════════════════════════════════════════════════════════════════

pub mod node_id {
    pub const NODE_NUMBER_MASK: u32 = 0x0000_003F;
    pub const BUS_NUMBER_MASK: u32 = 0x0000_FFC0;
    pub const ID_VALID: u32 = 1 << 31;
    pub const ROOT: u32 = 1 << 30;
}

// ═══════════════════════════════════════════════════════════════════════════
// DMA context control
// ═══════════════════════════════════════════════════════════════════════════

pub mod context_control {
    pub const RUN: u32 = 1 << 15;
    pub const WAKE: u32 = 1 << 12;
    pub const DEAD: u32 = 1 << 11;
    pub const ACTIVE: u32 = 1 << 10;
    /// Multi-channel mode for isochronous receive contexts (bit 28).
    pub const IR_MULTI_CHANNEL_MODE: u32 = 1 << 28;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_int_mask_covers_bus_reset_relevant_bits() {
        assert_eq!(BASE_INT_MASK & BUS_RESET_RELEVANT_MASK, BUS_RESET_RELEVANT_MASK);
    }

    #[test]
    fn base_int_mask_excludes_master_enable() {
        assert_eq!(BASE_INT_MASK & int_mask::MASTER_INT_ENABLE, 0);
    }

    #[test]
    fn self_id_count_fields_dont_overlap() {
        assert_eq!(
            self_id_count::ERROR & self_id_count::GENERATION_MASK & self_id_count::SIZE_MASK,
            0
        );
    }
}
</content>
