//! OHCI descriptor and IEEE 1394 packet-header encoding (§4.6).
//!
//! Fixed-layout wire structures use `zerocopy` derives rather than
//! hand-rolled byte shifting, the same way the rest of the example pack
//! encodes packed hardware/wire structs (e.g. CrabEFI's UEFI protocol
//! structs, hubris's `drv-*-api` message types).

extern crate alloc;

use alloc::vec::Vec;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// OHCI `OUTPUT_MORE`/`OUTPUT_LAST` descriptor command codes (OHCI §3.1.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DescriptorCommand {
    OutputMore = 0x0,
    OutputLast = 0x1,
    InputMore = 0x2,
    InputLast = 0x3,
}

/// One 16-byte OHCI AT descriptor (`OUTPUT_MORE_Immediate` /
/// `OUTPUT_LAST_Immediate` shape used for packet headers).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct AtDescriptor {
    /// `[31:28] cmd, [27:20] key/status, [19:16] interrupt, [15:0] wait/branch`
    pub control: u32,
    pub data_address: u32,
    pub branch_address: u32,
    /// `[31:16] xferStatus, [15:0] timeStamp` once retired by hardware.
    pub status_and_timestamp: u32,
}

impl AtDescriptor {
    pub fn new(
        command: DescriptorCommand,
        key: u8,
        interrupt: bool,
        data_length: u16,
        data_address: u32,
    ) -> Self {
        let cmd_bits = (command as u32) << 28;
        let key_bits = (key as u32 & 0x7) << 24;
        let int_bits = if interrupt { 0b11 << 20 } else { 0 };
        let control = cmd_bits | key_bits | int_bits | data_length as u32;
        Self { control, data_address, branch_address: 0, status_and_timestamp: 0 }
    }

    pub fn set_branch(&mut self, branch_bus_addr: u32, zed: u8) {
        self.branch_address = (branch_bus_addr & !0xF) | (zed as u32 & 0xF);
    }

    pub fn xfer_status(&self) -> u16 {
        (self.status_and_timestamp >> 16) as u16
    }

    /// Native-endian wire bytes of this descriptor, ready for
    /// [`crate::dma::DescriptorRing::submit`]. Descriptors are read directly
    /// by the local OHCI controller in host-native format; only the IEEE
    /// 1394 packet bytes they carry as immediate data are subject to the
    /// wire byte-swap (`HCControl.noByteSwap`).
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out.copy_from_slice(self.as_bytes());
        out
    }
}

/// IEEE 1394 asynchronous packet header t-codes (§6.2) relevant to this
/// core's transaction types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TCode {
    WriteQuadlet = 0x0,
    WriteBlock = 0x1,
    WriteResponse = 0x2,
    ReadQuadlet = 0x4,
    ReadBlock = 0x5,
    ReadQuadletResponse = 0x6,
    ReadBlockResponse = 0x7,
    Cycle = 0x8,
    LockRequest = 0x9,
    Stream = 0xA,
    LockResponse = 0xB,
    PhyPacket = 0xE,
}

/// First two quadlets of an IEEE 1394 asynchronous request header.
pub struct PacketHeader {
    pub destination_id: u16,
    pub t_label: u8,
    pub t_code: TCode,
    pub speed: u8,
}

impl PacketHeader {
    /// Encode the first header quadlet: `destinationID:16, tLabel:6, rt:2,
    /// tCode:4, pri:4`.
    pub fn quadlet0(&self) -> u32 {
        ((self.destination_id as u32) << 16)
            | ((self.t_label as u32 & 0x3F) << 10)
            | ((self.t_code as u32 & 0xF) << 4)
    }

    /// First descriptor-control quadlet speed field (`spd` bits, OHCI
    /// §3.1.1), validated against the four IEEE 1394 §6.2 speed codes.
    pub fn validated_speed(&self) -> Result<u8, crate::error::OhciError> {
        if self.speed <= 3 {
            Ok(self.speed)
        } else {
            Err(crate::error::OhciError::BadArgument)
        }
    }

    /// The three header quadlets of a block read/write request: `quadlet0`
    /// plus the 48-bit destination offset split into its high 16 bits and
    /// low 32 bits (§6.2).
    pub fn header_quadlets(&self, address_hi: u16, address_lo: u32) -> [u32; 3] {
        [self.quadlet0(), address_hi as u32, address_lo]
    }
}

/// Payload bytes carried by one non-final `OUTPUT_MORE`/`OUTPUT_LAST`
/// descriptor before OHCI requires starting a new one (§4.6, §8).
pub const MAX_PAYLOAD_CHUNK_BYTES: usize = 512;

/// Build the `OUTPUT_MORE`/`OUTPUT_LAST` descriptor chain for one
/// asynchronous block request: two immediate-data descriptors carrying the
/// three header quadlets (two quadlets of immediate data per descriptor,
/// OHCI's own immediate-descriptor packing), followed by one descriptor per
/// [`MAX_PAYLOAD_CHUNK_BYTES`]-byte chunk of `payload`. The last descriptor
/// in the chain is always `OUTPUT_LAST` with its interrupt bits set; every
/// other descriptor is `OUTPUT_MORE`.
pub fn build_output_descriptors(
    header: &PacketHeader,
    address_hi: u16,
    address_lo: u32,
    payload: &[u8],
    payload_bus_addr: u32,
) -> Result<Vec<AtDescriptor>, crate::error::OhciError> {
    header.validated_speed()?;
    let [q0, q1, q2] = header.header_quadlets(address_hi, address_lo);

    let mut descriptors = Vec::new();
    let mut first = AtDescriptor::new(DescriptorCommand::OutputMore, 0, false, 8, q0);
    first.branch_address = q1;
    descriptors.push(first);
    descriptors.push(AtDescriptor::new(DescriptorCommand::OutputMore, 0, false, 4, q2));

    if payload.is_empty() {
        mark_last_as_output_last(&mut descriptors);
        return Ok(descriptors);
    }

    let chunks: Vec<&[u8]> = payload.chunks(MAX_PAYLOAD_CHUNK_BYTES).collect();
    let last_chunk_index = chunks.len() - 1;
    let mut offset = 0u32;
    for (i, chunk) in chunks.into_iter().enumerate() {
        let is_last = i == last_chunk_index;
        let command = if is_last { DescriptorCommand::OutputLast } else { DescriptorCommand::OutputMore };
        descriptors.push(AtDescriptor::new(command, 1, is_last, chunk.len() as u16, payload_bus_addr + offset));
        offset += chunk.len() as u32;
    }
    Ok(descriptors)
}

fn mark_last_as_output_last(descriptors: &mut [AtDescriptor]) {
    if let Some(last) = descriptors.last_mut() {
        last.control = (last.control & !(0xF << 28)) | ((DescriptorCommand::OutputLast as u32) << 28);
        last.control |= 0b11 << 20; // interrupt-always, matching AtDescriptor::new(interrupt=true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_encodes_command_and_length() {
        let desc = AtDescriptor::new(DescriptorCommand::OutputLast, 0, true, 8, 0x1000);
        assert_eq!(desc.control >> 28, DescriptorCommand::OutputLast as u32);
        assert_eq!(desc.control & 0xFFFF, 8);
    }

    #[test]
    fn branch_address_preserves_z_field() {
        let mut desc = AtDescriptor::new(DescriptorCommand::OutputMore, 0, false, 4, 0);
        desc.set_branch(0x2000, 2);
        assert_eq!(desc.branch_address & 0xF, 2);
        assert_eq!(desc.branch_address & !0xF, 0x2000);
    }

    #[test]
    fn xfer_status_reads_high_half() {
        let mut desc = AtDescriptor::new(DescriptorCommand::OutputLast, 0, false, 4, 0);
        desc.status_and_timestamp = 0x0011_0000;
        assert_eq!(desc.xfer_status(), 0x0011);
    }

    #[test]
    fn packet_header_rejects_invalid_speed() {
        let hdr = PacketHeader { destination_id: 1, t_label: 0, t_code: TCode::ReadQuadlet, speed: 7 };
        assert!(hdr.validated_speed().is_err());
    }

    #[test]
    fn packet_header_encodes_fields() {
        let hdr = PacketHeader { destination_id: 0xFFC1, t_label: 5, t_code: TCode::ReadQuadlet, speed: 0 };
        let q = hdr.quadlet0();
        assert_eq!(q >> 16, 0xFFC1);
        assert_eq!((q >> 10) & 0x3F, 5);
        assert_eq!((q >> 4) & 0xF, TCode::ReadQuadlet as u32);
    }

    #[test]
    fn header_quadlets_split_the_48_bit_offset() {
        let hdr = PacketHeader { destination_id: 1, t_label: 0, t_code: TCode::WriteBlock, speed: 0 };
        let quadlets = hdr.header_quadlets(0xFFFF, 0xD000_0000);
        assert_eq!(quadlets[0], hdr.quadlet0());
        assert_eq!(quadlets[1], 0xFFFF);
        assert_eq!(quadlets[2], 0xD000_0000);
    }

    #[test]
    fn empty_payload_yields_two_header_descriptors_last_marked_output_last() {
        let hdr = PacketHeader { destination_id: 1, t_label: 0, t_code: TCode::WriteQuadlet, speed: 0 };
        let descriptors = build_output_descriptors(&hdr, 0xFFFF, 0, &[], 0).unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[1].control >> 28, DescriptorCommand::OutputLast as u32);
    }

    #[test]
    fn payload_splits_at_the_512_byte_boundary() {
        let hdr = PacketHeader { destination_id: 1, t_label: 0, t_code: TCode::WriteBlock, speed: 0 };
        let payload = alloc::vec![0xAAu8; 600];
        let descriptors = build_output_descriptors(&hdr, 0, 0x1000, &payload, 0x9000).unwrap();

        // 2 header descriptors + 2 payload chunks (512 + 88 bytes).
        assert_eq!(descriptors.len(), 4);
        assert_eq!(descriptors[2].control >> 28, DescriptorCommand::OutputMore as u32);
        assert_eq!(descriptors[2].control & 0xFFFF, 512);
        assert_eq!(descriptors[3].control >> 28, DescriptorCommand::OutputLast as u32);
        assert_eq!(descriptors[3].control & 0xFFFF, 88);
        assert_eq!(descriptors[3].data_address, 0x9000 + 512);
    }

    #[test]
    fn build_output_descriptors_rejects_invalid_speed() {
        let hdr = PacketHeader { destination_id: 1, t_label: 0, t_code: TCode::WriteQuadlet, speed: 7 };
        assert!(build_output_descriptors(&hdr, 0, 0, &[], 0).is_err());
    }
}
</content>
