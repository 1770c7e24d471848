//! OHCI 1.1 register offsets (Table 5-1 and related chapters).
//!
//! Offsets are byte offsets from the BAR base. A handful of names alias the
//! same offset on purpose: the OHCI write-only strobe registers (`*Set`/
//! `*Clear`) share an address with the read view that returns the latched
//! value (e.g. `HC_CONTROL_SET == HC_CONTROL`).

// ═══════════════════════════════════════════════════════════════════════════
// GENERAL REGISTERS
// ═══════════════════════════════════════════════════════════════════════════

pub const VERSION: u32 = 0x000;
pub const GUID_ROM: u32 = 0x004;
pub const AT_RETRIES: u32 = 0x008;
pub const CSR_DATA: u32 = 0x00C;
pub const CSR_COMPARE_DATA: u32 = 0x010;
pub const CSR_CONTROL: u32 = 0x014;
pub const CONFIG_ROM_HEADER: u32 = 0x018;
pub const BUS_ID: u32 = 0x01C;
pub const BUS_OPTIONS: u32 = 0x020;
pub const GUID_HI: u32 = 0x024;
pub const GUID_LO: u32 = 0x028;
pub const CONFIG_ROM_MAP: u32 = 0x034;
pub const POSTED_WRITE_ADDRESS_LO: u32 = 0x038;
pub const POSTED_WRITE_ADDRESS_HI: u32 = 0x03C;
pub const VENDOR_ID: u32 = 0x040;

// ═══════════════════════════════════════════════════════════════════════════
// HOST CONTROLLER CONTROL (OHCI §5.3)
// ═══════════════════════════════════════════════════════════════════════════

pub const HC_CONTROL_SET: u32 = 0x050;
pub const HC_CONTROL_CLEAR: u32 = 0x054;
/// Read view: both 0x050/0x054 return the latched HCControl value.
pub const HC_CONTROL: u32 = 0x050;

pub const SELF_ID_BUFFER: u32 = 0x064;
pub const SELF_ID_COUNT: u32 = 0x068;

pub const IR_MULTI_CHAN_MASK_HI_SET: u32 = 0x070;
pub const IR_MULTI_CHAN_MASK_HI_CLEAR: u32 = 0x074;
pub const IR_MULTI_CHAN_MASK_LO_SET: u32 = 0x078;
pub const IR_MULTI_CHAN_MASK_LO_CLEAR: u32 = 0x07C;

// ═══════════════════════════════════════════════════════════════════════════
// INTERRUPT REGISTERS (OHCI §5.7)
// ═══════════════════════════════════════════════════════════════════════════

/// Read-only: current interrupt event status.
pub const INT_EVENT: u32 = 0x080;
pub const INT_EVENT_SET: u32 = 0x080;
pub const INT_EVENT_CLEAR: u32 = 0x084;
pub const INT_MASK_SET: u32 = 0x088;
pub const INT_MASK_CLEAR: u32 = 0x08C;

pub const ISO_XMIT_EVENT: u32 = 0x090;
pub const ISO_XMIT_INT_EVENT_SET: u32 = 0x090;
pub const ISO_XMIT_INT_EVENT_CLEAR: u32 = 0x094;
pub const ISO_XMIT_INT_MASK_SET: u32 = 0x098;
pub const ISO_XMIT_INT_MASK_CLEAR: u32 = 0x09C;

pub const ISO_RECV_EVENT: u32 = 0x0A0;
pub const ISO_RECV_INT_EVENT_SET: u32 = 0x0A0;
pub const ISO_RECV_INT_EVENT_CLEAR: u32 = 0x0A4;
pub const ISO_RECV_INT_MASK_SET: u32 = 0x0A8;
pub const ISO_RECV_INT_MASK_CLEAR: u32 = 0x0AC;

pub const INITIAL_BANDWIDTH_AVAILABLE: u32 = 0x0B0;
pub const INITIAL_CHANNELS_AVAILABLE_HI: u32 = 0x0B4;
pub const INITIAL_CHANNELS_AVAILABLE_LO: u32 = 0x0B8;

pub const FAIRNESS_CONTROL: u32 = 0x0DC;

// ═══════════════════════════════════════════════════════════════════════════
// LINK CONTROL (OHCI §5.14), NODE ID, PHY, CYCLE TIMER
// ═══════════════════════════════════════════════════════════════════════════

pub const LINK_CONTROL_SET: u32 = 0x0E0;
pub const LINK_CONTROL_CLEAR: u32 = 0x0E4;
/// Read view: returns the current latched LinkControl state.
pub const LINK_CONTROL: u32 = 0x0E0;

pub const NODE_ID: u32 = 0x0E8;
pub const PHY_CONTROL: u32 = 0x0EC;
pub const CYCLE_TIMER: u32 = 0x0F0;

pub const AS_REQ_FILTER_HI_SET: u32 = 0x100;
pub const AS_REQ_FILTER_HI_CLEAR: u32 = 0x104;
pub const AS_REQ_FILTER_LO_SET: u32 = 0x108;
pub const AS_REQ_FILTER_LO_CLEAR: u32 = 0x10C;

pub const PHY_REQ_FILTER_HI_SET: u32 = 0x110;
pub const PHY_REQ_FILTER_HI_CLEAR: u32 = 0x114;
pub const PHY_REQ_FILTER_LO_SET: u32 = 0x118;
pub const PHY_REQ_FILTER_LO_CLEAR: u32 = 0x11C;

pub const PHY_UPPER_BOUND: u32 = 0x120;

// ═══════════════════════════════════════════════════════════════════════════
// ASYNCHRONOUS DMA CONTEXTS
// ═══════════════════════════════════════════════════════════════════════════

pub const AT_REQ_CONTEXT_CONTROL_SET: u32 = 0x180;
pub const AT_REQ_CONTEXT_CONTROL_CLEAR: u32 = 0x184;
pub const AT_REQ_COMMAND_PTR: u32 = 0x18C;

pub const AT_RESP_CONTEXT_CONTROL_SET: u32 = 0x1A0;
pub const AT_RESP_CONTEXT_CONTROL_CLEAR: u32 = 0x1A4;
pub const AT_RESP_COMMAND_PTR: u32 = 0x1AC;

pub const AR_REQ_CONTEXT_CONTROL_SET: u32 = 0x1C0;
pub const AR_REQ_CONTEXT_CONTROL_CLEAR: u32 = 0x1C4;
pub const AR_REQ_COMMAND_PTR: u32 = 0x1CC;

pub const AR_RESP_CONTEXT_CONTROL_SET: u32 = 0x1E0;
pub const AR_RESP_CONTEXT_CONTROL_CLEAR: u32 = 0x1E4;
pub const AR_RESP_COMMAND_PTR: u32 = 0x1EC;

// ═══════════════════════════════════════════════════════════════════════════
// ISOCHRONOUS CONTEXTS (out of scope for transaction processing, offsets only)
// ═══════════════════════════════════════════════════════════════════════════

/// Isochronous transmit context `n` base (stride 16 bytes); `ContextControl`
/// read and `ContextControlSet` write share the base offset.
pub const fn iso_xmit_context_control_set(n: u32) -> u32 {
    0x200 + 16 * n
}
pub const fn iso_xmit_context_control_clear(n: u32) -> u32 {
    0x204 + 16 * n
}
pub const fn iso_xmit_command_ptr(n: u32) -> u32 {
    0x20C + 16 * n
}

/// Isochronous receive context `n` base (stride 32 bytes).
pub const fn iso_recv_context_control_set(n: u32) -> u32 {
    0x400 + 32 * n
}
pub const fn iso_recv_context_control_clear(n: u32) -> u32 {
    0x404 + 32 * n
}
pub const fn iso_recv_command_ptr(n: u32) -> u32 {
    0x40C + 32 * n
}
pub const fn iso_recv_context_match(n: u32) -> u32 {
    0x410 + 32 * n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strobe_pairs_share_the_read_offset() {
        assert_eq!(HC_CONTROL, HC_CONTROL_SET);
        assert_eq!(LINK_CONTROL, LINK_CONTROL_SET);
        assert_eq!(INT_EVENT, INT_EVENT_SET);
    }

    #[test]
    fn dma_context_strides_match_ohci_layout() {
        assert_eq!(AT_RESP_CONTEXT_CONTROL_SET - AT_REQ_CONTEXT_CONTROL_SET, 0x20);
        assert_eq!(AR_REQ_CONTEXT_CONTROL_SET - AT_RESP_CONTEXT_CONTROL_SET, 0x20);
        assert_eq!(AR_RESP_CONTEXT_CONTROL_SET - AR_REQ_CONTEXT_CONTROL_SET, 0x20);
    }

    #[test]
    fn iso_context_helpers_stride_correctly() {
        assert_eq!(iso_xmit_context_control_set(0), 0x200);
        assert_eq!(iso_xmit_context_control_set(1), 0x210);
        assert_eq!(iso_recv_context_control_set(0), 0x400);
        assert_eq!(iso_recv_context_control_set(2), 0x440);
    }
}
</content>
