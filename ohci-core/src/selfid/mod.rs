//! Self-ID buffer arming and decode with double-read generation validation
//! (§4.4).

extern crate alloc;

use crate::reg::{bits::self_id_count, offsets, RegisterIo};
use alloc::vec::Vec;

/// Bytes required for a 2 KiB-aligned Self-ID buffer, the OHCI minimum.
pub const MIN_BUFFER_BYTES: usize = 2048;

/// Tag field (top 2 bits of a quadlet) identifying a Self-ID packet.
const SELF_ID_TAG: u32 = 0b10;
const SELF_ID_TAG_SHIFT: u32 = 30;
const MORE_PACKETS_BIT: u32 = 1 << 23;
const SEQUENCE_SHIFT: u32 = 20;
const SEQUENCE_MASK: u32 = 0b111;

/// A decoded Self-ID packet: one base quadlet plus up to three extended
/// quadlets linked by the more-packets bit (§4.4).
#[derive(Debug, Clone)]
pub struct SelfIdPacket {
    pub base: u32,
    pub extended: Vec<u32>,
}

/// Result of a Self-ID buffer decode (§3 "Self-ID capture result").
#[derive(Debug, Clone)]
pub struct SelfIdResult {
    pub generation: u8,
    pub quads: Vec<u32>,
    pub packets: Vec<SelfIdPacket>,
    pub valid: bool,
    pub crc_error: bool,
    pub timed_out: bool,
}

impl SelfIdResult {
    fn invalid() -> Self {
        Self {
            generation: 0,
            quads: Vec::new(),
            packets: Vec::new(),
            valid: false,
            crc_error: false,
            timed_out: false,
        }
    }
}

/// Owns the Self-ID DMA buffer's bus address and decodes its contents.
///
/// The actual DMA-coherent allocation is the caller's responsibility (via
/// the DMA allocator, §3); this type only tracks the bus address that was
/// programmed into the hardware and provides the decode algorithm over a
/// caller-supplied quadlet slice (real hardware buffer, or a test fixture).
pub struct SelfIdCapture {
    quad_capacity: usize,
    armed_bus_addr: Option<u32>,
}

impl SelfIdCapture {
    pub fn new(quad_capacity: usize) -> Self {
        Self { quad_capacity, armed_bus_addr: None }
    }

    pub fn quad_capacity(&self) -> usize {
        self.quad_capacity
    }

    /// Program the 32-bit bus address of the Self-ID buffer into hardware.
    pub fn arm(&mut self, io: &dyn RegisterIo, bus_addr: u32) {
        io.write(offsets::SELF_ID_BUFFER, bus_addr);
        self.armed_bus_addr = Some(bus_addr);
    }

    pub fn disarm(&mut self, io: &dyn RegisterIo) {
        io.write(offsets::SELF_ID_BUFFER, 0);
        self.armed_bus_addr = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed_bus_addr.is_some()
    }

    /// Decode the buffer contents, performing the double-read generation
    /// validation the spec mandates: `register@T0`, the buffer-embedded
    /// generation, and `register@T1` must all agree before the payload is
    /// trusted. `read_self_id_count` and `read_buffer_first_quad` abstract
    /// the two hardware reads so this function is pure given its inputs.
    pub fn decode(
        &self,
        io: &dyn RegisterIo,
        buffer: &[u32],
    ) -> SelfIdResult {
        let count_t0 = io.read(offsets::SELF_ID_COUNT);
        if count_t0 & self_id_count::ERROR != 0 {
            let mut r = SelfIdResult::invalid();
            r.crc_error = true;
            return r;
        }

        let quad_count = ((count_t0 & self_id_count::SIZE_MASK) >> self_id_count::SIZE_SHIFT) as usize;
        let gen_t0 = ((count_t0 & self_id_count::GENERATION_MASK) >> self_id_count::GENERATION_SHIFT) as u8;

        if buffer.is_empty() || quad_count == 0 {
            let mut r = SelfIdResult::invalid();
            r.timed_out = true;
            return r;
        }

        let header = buffer[0];
        let gen_embedded = ((header & self_id_count::GENERATION_MASK) >> self_id_count::GENERATION_SHIFT) as u8;

        let count_t1 = io.read(offsets::SELF_ID_COUNT);
        let gen_t1 = ((count_t1 & self_id_count::GENERATION_MASK) >> self_id_count::GENERATION_SHIFT) as u8;

        if gen_t0 != gen_embedded || gen_embedded != gen_t1 {
            // Racing bus reset: caller must redrive the FSM, not consume this data.
            return SelfIdResult::invalid();
        }

        let available = quad_count.saturating_sub(1).min(buffer.len().saturating_sub(1));
        let quads: Vec<u32> = buffer[1..=available].to_vec();
        let packets = parse_packets(&quads);

        SelfIdResult {
            generation: gen_t1,
            quads,
            packets,
            valid: true,
            crc_error: false,
            timed_out: false,
        }
    }
}

/// Group raw Self-ID quadlets into packets: one base quadlet plus up to
/// three extended quadlets, linked by the more-packets bit and validated by
/// a strictly-incrementing 3-bit sequence number. Non-tagged quadlets are
/// skipped; sequences exceeding 4 quadlets are rejected (the malformed
/// packet and anything after it in that run is dropped).
fn parse_packets(quads: &[u32]) -> Vec<SelfIdPacket> {
    let mut packets = Vec::new();
    let mut i = 0;
    while i < quads.len() {
        let q = quads[i];
        if (q >> SELF_ID_TAG_SHIFT) & 0b11 != SELF_ID_TAG {
            i += 1;
            continue;
        }

        let mut packet = SelfIdPacket { base: q, extended: Vec::new() };
        let mut more = q & MORE_PACKETS_BIT != 0;
        let mut expected_seq = 0u32;
        i += 1;

        while more {
            if packet.extended.len() >= 3 {
                // Sequence too long; the packet is malformed.
                break;
            }
            let Some(&ext) = quads.get(i) else { break };
            if (ext >> SELF_ID_TAG_SHIFT) & 0b11 != SELF_ID_TAG {
                break;
            }
            let seq = (ext >> SEQUENCE_SHIFT) & SEQUENCE_MASK;
            if seq != expected_seq {
                break;
            }
            packet.extended.push(ext);
            more = ext & MORE_PACKETS_BIT != 0;
            expected_seq += 1;
            i += 1;
        }

        packets.push(packet);
    }
    packets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reg::fake::FakeRegisterIo;

    fn count_reg(generation: u8, quad_count: u32) -> u32 {
        ((generation as u32) << self_id_count::GENERATION_SHIFT) | (quad_count << self_id_count::SIZE_SHIFT)
    }

    #[test]
    fn decode_succeeds_when_all_three_generations_agree() {
        let io = FakeRegisterIo::new();
        io.write(offsets::SELF_ID_COUNT, count_reg(1, 2));

        let header = count_reg(1, 2);
        let self_id_a = (SELF_ID_TAG << SELF_ID_TAG_SHIFT) | 0x0000_0001;
        let buffer = [header, self_id_a];

        let cap = SelfIdCapture::new(512);
        let result = cap.decode(&io, &buffer);

        assert!(result.valid);
        assert_eq!(result.generation, 1);
        assert_eq!(result.packets.len(), 1);
    }

    #[test]
    fn decode_rejects_racing_generation() {
        let io = FakeRegisterIo::new();
        // Register reads T0 and T1 both return generation 2, but the buffer
        // header (captured "earlier") still shows generation 1.
        io.write(offsets::SELF_ID_COUNT, count_reg(2, 2));
        let header = count_reg(1, 2);
        let buffer = [header, 0];

        let cap = SelfIdCapture::new(512);
        let result = cap.decode(&io, &buffer);

        assert!(!result.valid);
    }

    #[test]
    fn decode_reports_hardware_error_bit() {
        let io = FakeRegisterIo::new();
        io.write(offsets::SELF_ID_COUNT, self_id_count::ERROR);

        let cap = SelfIdCapture::new(512);
        let result = cap.decode(&io, &[0u32; 4]);

        assert!(!result.valid);
        assert!(result.crc_error);
    }

    #[test]
    fn parse_packets_links_extended_quadlets_by_sequence() {
        let base = (SELF_ID_TAG << SELF_ID_TAG_SHIFT) | MORE_PACKETS_BIT;
        let ext0 = (SELF_ID_TAG << SELF_ID_TAG_SHIFT) | (0 << SEQUENCE_SHIFT) | MORE_PACKETS_BIT;
        let ext1 = (SELF_ID_TAG << SELF_ID_TAG_SHIFT) | (1 << SEQUENCE_SHIFT);
        let packets = parse_packets(&[base, ext0, ext1]);

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].extended.len(), 2);
    }

    #[test]
    fn parse_packets_skips_non_self_id_quadlets() {
        let junk = 0u32;
        let base = SELF_ID_TAG << SELF_ID_TAG_SHIFT;
        let packets = parse_packets(&[junk, base]);
        assert_eq!(packets.len(), 1);
    }
}
</content>
