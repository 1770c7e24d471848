//! Configuration-ROM scanner (§4.9): a per-node FSM run under bounded
//! concurrency, one instance per bus generation.

extern crate alloc;

use crate::transaction::speed::SpeedTier;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

/// CSR-space offset of the Bus Info Block, relative to `0xFFFF_F0000000`.
pub const BIB_OFFSET: u32 = 0x400;
/// `"1394"` in ASCII, the expected contents of BIB quadlet 1.
pub const BIB_MAGIC: u32 = 0x3133_3934;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    ReadingBib,
    VerifyingIrmRead,
    VerifyingIrmLock,
    ReadingRootDir,
    ReadingDetails,
    Complete,
    Failed,
}

#[derive(Debug, Clone)]
pub struct BusInfoBlock {
    pub info_length: u8,
    pub crc_length: u8,
    pub bus_info_quad: u32,
    pub capabilities: u32,
    pub guid_hi: u32,
    pub guid_lo: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootDirectoryKeyType {
    Immediate,
    Offset,
    Leaf,
    Directory,
}

#[derive(Debug, Clone, Copy)]
pub struct RootDirectoryEntry {
    pub key_type: RootDirectoryKeyType,
    pub key_id: u8,
    pub value: u32,
}

#[derive(Debug, Clone)]
pub struct ConfigRom {
    pub generation: u8,
    pub node_id: u16,
    pub bib: BusInfoBlock,
    /// Total ROM length in bytes, `crc_length * 4` (§4.9).
    pub rom_size_bytes: u32,
    pub root_directory_entries: Vec<RootDirectoryEntry>,
    pub raw_quadlets: Vec<u32>,
    pub vendor_name: Option<String>,
    pub model_name: Option<String>,
}

/// Which text-descriptor leaf a `ReadingDetails` step resolved, so `advance`
/// knows which [`ConfigRom`] field to populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDescriptorRole {
    Vendor,
    Model,
}

/// Data a caller supplies alongside a [`StepOutcome::Success`] — the meaning
/// depends on which state the node is leaving.
#[derive(Debug, Clone)]
pub enum StepPayload {
    None,
    Bib(BusInfoBlock),
    RootDirectoryQuadlets(Vec<u32>),
    TextDescriptor { role: TextDescriptorRole, leaf_quadlets: Vec<u32> },
}

/// Parse a root directory's raw quadlets (header + entries, §IEEE 1212
/// directory encoding) into typed entries.
pub fn parse_root_directory(quadlets: &[u32]) -> Vec<RootDirectoryEntry> {
    let Some(&header) = quadlets.first() else { return Vec::new() };
    let length = (header >> 16) as usize;
    quadlets
        .iter()
        .skip(1)
        .take(length)
        .map(|&q| {
            let key_type = match (q >> 30) & 0b11 {
                0 => RootDirectoryKeyType::Immediate,
                1 => RootDirectoryKeyType::Offset,
                2 => RootDirectoryKeyType::Leaf,
                _ => RootDirectoryKeyType::Directory,
            };
            let key_id = ((q >> 24) & 0x3F) as u8;
            let value = q & 0x00FF_FFFF;
            RootDirectoryEntry { key_type, key_id, value }
        })
        .collect()
}

/// Parse a textual-descriptor leaf (header + specifier + language + packed
/// ASCII, §IEEE 1212.1) into its text, trimming trailing NUL padding.
pub fn parse_text_leaf(quadlets: &[u32]) -> Option<String> {
    if quadlets.len() < 3 {
        return None;
    }
    let header = quadlets[0];
    let length = (header >> 16) as usize; // quadlets following the header
    let end = (1 + length).min(quadlets.len());
    if end <= 3 {
        return None;
    }
    let mut bytes = Vec::with_capacity((end - 3) * 4);
    for &q in &quadlets[3..end] {
        bytes.extend_from_slice(&q.to_be_bytes());
    }
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    String::from_utf8(bytes).ok()
}

/// `romSize` in bytes for a Bus Info Block reporting `crc_length` (§4.9).
pub fn rom_size_bytes(crc_length: u8) -> u32 {
    crc_length as u32 * 4
}

#[derive(Debug, Clone)]
pub struct NodeScanState {
    pub node_id: u16,
    pub state: ScanState,
    pub current_speed: SpeedTier,
    pub retries_left: u8,
    pub is_irm_candidate: bool,
    pub bad_irm: bool,
    pub partial_bib: Option<BusInfoBlock>,
}

impl NodeScanState {
    fn new(node_id: u16, is_irm_candidate: bool, per_step_retries: u8) -> Self {
        Self {
            node_id,
            state: ScanState::Idle,
            current_speed: SpeedTier::S100,
            retries_left: per_step_retries,
            is_irm_candidate,
            bad_irm: false,
            partial_bib: None,
        }
    }
}

/// One (generation, node) ROM-read outcome, as reported by the caller's
/// transport layer to [`ConfigRomScanner::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Timeout,
    Busy,
}

/// Per-generation scan coordinator. Owns no I/O itself — `advance` is fed
/// step outcomes by the controller core's transaction layer and returns
/// which nodes are now ready for the next step, so the actual register
/// traffic stays outside this module.
pub struct ConfigRomScanner {
    generation: u8,
    max_in_flight: u8,
    per_step_retries: u8,
    irm_verification_enabled: bool,
    nodes: BTreeMap<u16, NodeScanState>,
    in_flight: u8,
    had_busy_nodes: bool,
    scan_complete_fired: bool,
    /// ROM store keyed by `(generation, nodeId)` (§3): every node's scan
    /// result lives here as it is assembled, surviving past the node's own
    /// `NodeScanState` reaching a terminal state.
    rom_store: BTreeMap<(u8, u16), ConfigRom>,
}

impl ConfigRomScanner {
    pub fn new(max_in_flight: u8, per_step_retries: u8, irm_verification_enabled: bool) -> Self {
        Self {
            generation: 0,
            max_in_flight,
            per_step_retries,
            irm_verification_enabled,
            nodes: BTreeMap::new(),
            in_flight: 0,
            had_busy_nodes: false,
            scan_complete_fired: false,
            rom_store: BTreeMap::new(),
        }
    }

    /// Start scanning a new generation: purge previous state, enumerate
    /// every remote active node as `Idle`. The ROM store is keyed by
    /// generation so a prior generation's results remain readable until the
    /// caller drops this scanner or explicitly prunes them.
    pub fn begin(&mut self, generation: u8, remote_nodes: &[(u16, bool)]) {
        self.generation = generation;
        self.nodes.clear();
        self.in_flight = 0;
        self.had_busy_nodes = false;
        self.scan_complete_fired = false;
        for &(node_id, is_irm_candidate) in remote_nodes {
            self.nodes.insert(node_id, NodeScanState::new(node_id, is_irm_candidate, self.per_step_retries));
        }
    }

    pub fn generation(&self) -> u8 {
        self.generation
    }

    pub fn node_state(&self, node_id: u16) -> Option<&NodeScanState> {
        self.nodes.get(&node_id)
    }

    /// Scan result for `node_id` at `generation`, once enough steps have
    /// completed to populate it. Present as soon as the BIB read lands, even
    /// before the root directory or text descriptors are read.
    pub fn rom_for(&self, generation: u8, node_id: u16) -> Option<&ConfigRom> {
        self.rom_store.get(&(generation, node_id))
    }

    /// Nodes that can start a new BIB read right now, bounded by
    /// `max_in_flight`. Marks them `ReadingBib` and bumps the in-flight
    /// counter as they're returned.
    pub fn schedule(&mut self) -> Vec<u16> {
        let mut started = Vec::new();
        let idle_ids: Vec<u16> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.state == ScanState::Idle)
            .map(|(id, _)| *id)
            .collect();

        for node_id in idle_ids {
            if self.in_flight >= self.max_in_flight {
                break;
            }
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.state = ScanState::ReadingBib;
                self.in_flight += 1;
                started.push(node_id);
            }
        }
        started
    }

    /// Advance one node's FSM given the outcome of its current step. On
    /// success, the caller also supplies `payload` — the meaning depends on
    /// the state being exited (BIB quadlets while `ReadingBib`, root
    /// directory quadlets while `ReadingRootDir`, a text-descriptor leaf
    /// while `ReadingDetails`).
    pub fn advance(&mut self, node_id: u16, outcome: StepOutcome, payload: StepPayload) {
        let Some(node) = self.nodes.get_mut(&node_id) else { return };

        match outcome {
            StepOutcome::Busy => {
                self.had_busy_nodes = true;
                return;
            }
            StepOutcome::Timeout => {
                if node.retries_left > 0 {
                    node.retries_left -= 1;
                } else if node.current_speed == SpeedTier::S100 {
                    node.state = ScanState::Failed;
                    self.in_flight = self.in_flight.saturating_sub(1);
                } else {
                    node.current_speed = node.current_speed.downgrade();
                    node.retries_left = self.per_step_retries;
                }
                return;
            }
            StepOutcome::Success => {}
        }

        let generation = self.generation;
        let entry = || ConfigRom {
            generation,
            node_id,
            bib: BusInfoBlock { info_length: 0, crc_length: 0, bus_info_quad: 0, capabilities: 0, guid_hi: 0, guid_lo: 0 },
            rom_size_bytes: 0,
            root_directory_entries: Vec::new(),
            raw_quadlets: Vec::new(),
            vendor_name: None,
            model_name: None,
        };

        node.state = match node.state {
            ScanState::ReadingBib => {
                if let StepPayload::Bib(bib) = payload {
                    node.partial_bib = Some(bib.clone());
                    let rom = self.rom_store.entry((generation, node_id)).or_insert_with(entry);
                    rom.rom_size_bytes = rom_size_bytes(bib.crc_length);
                    rom.bib = bib;
                }
                if node.is_irm_candidate && self.irm_verification_enabled {
                    ScanState::VerifyingIrmRead
                } else {
                    ScanState::ReadingRootDir
                }
            }
            ScanState::VerifyingIrmRead => ScanState::VerifyingIrmLock,
            ScanState::VerifyingIrmLock => ScanState::ReadingRootDir,
            ScanState::ReadingRootDir => {
                if let StepPayload::RootDirectoryQuadlets(quadlets) = payload {
                    let entries = parse_root_directory(&quadlets);
                    let rom = self.rom_store.entry((generation, node_id)).or_insert_with(entry);
                    rom.root_directory_entries = entries;
                    rom.raw_quadlets = quadlets;
                }
                ScanState::ReadingDetails
            }
            ScanState::ReadingDetails => {
                if let StepPayload::TextDescriptor { role, leaf_quadlets } = payload {
                    let text = parse_text_leaf(&leaf_quadlets);
                    let rom = self.rom_store.entry((generation, node_id)).or_insert_with(entry);
                    match role {
                        TextDescriptorRole::Vendor => rom.vendor_name = text,
                        TextDescriptorRole::Model => rom.model_name = text,
                    }
                }
                ScanState::Complete
            }
            other => other,
        };

        if node.state == ScanState::Complete || node.state == ScanState::Failed {
            self.in_flight = self.in_flight.saturating_sub(1);
        }
    }

    pub fn mark_irm_verification_failed(&mut self, node_id: u16) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.bad_irm = true;
            node.state = ScanState::ReadingRootDir;
        }
    }

    pub fn had_busy_nodes(&self) -> bool {
        self.had_busy_nodes
    }

    fn all_terminal(&self) -> bool {
        self.nodes.values().all(|n| matches!(n.state, ScanState::Complete | ScanState::Failed))
    }

    /// Matches the Apple-derived `fNumROMReads--` completion rule: fires
    /// exactly once per generation, only when every node is terminal and
    /// nothing is in flight. The caller must treat the returned `true` as
    /// the sole trigger for invoking the scan-complete callback; this
    /// method does not re-arm until `begin` starts a new generation, and the
    /// generation gate that guards re-entrant manual-read requests must only
    /// be cleared by the caller *after* that callback returns (§4.9,
    /// DESIGN.md) — this function only reports readiness, it never clears
    /// caller-owned state itself.
    pub fn scan_complete_ready(&mut self) -> bool {
        if self.scan_complete_fired {
            return false;
        }
        if self.in_flight == 0 && self.all_terminal() {
            self.scan_complete_fired = true;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bib() -> BusInfoBlock {
        BusInfoBlock { info_length: 4, crc_length: 4, bus_info_quad: BIB_MAGIC, capabilities: 0, guid_hi: 1, guid_lo: 2 }
    }

    #[test]
    fn zero_remote_nodes_completes_immediately() {
        let mut scanner = ConfigRomScanner::new(2, 3, true);
        scanner.begin(1, &[]);
        assert!(scanner.schedule().is_empty());
        assert!(scanner.scan_complete_ready());
    }

    #[test]
    fn scan_complete_fires_at_most_once_per_generation() {
        let mut scanner = ConfigRomScanner::new(2, 3, false);
        scanner.begin(1, &[(1, false)]);
        scanner.schedule();
        scanner.advance(1, StepOutcome::Success, StepPayload::Bib(bib())); // -> ReadingRootDir
        scanner.advance(1, StepOutcome::Success, StepPayload::None); // -> ReadingDetails
        scanner.advance(1, StepOutcome::Success, StepPayload::None); // -> Complete

        assert!(scanner.scan_complete_ready());
        assert!(!scanner.scan_complete_ready());
    }

    #[test]
    fn bounded_concurrency_respects_max_in_flight() {
        let mut scanner = ConfigRomScanner::new(2, 3, false);
        scanner.begin(1, &[(1, false), (2, false), (3, false)]);
        let started = scanner.schedule();
        assert_eq!(started.len(), 2);
        assert_eq!(scanner.schedule().len(), 0);
    }

    #[test]
    fn exhausted_retries_downgrade_speed_before_failing() {
        let mut scanner = ConfigRomScanner::new(2, 1, false);
        scanner.begin(1, &[(1, false)]);
        scanner.schedule();

        // First timeout consumes the retry budget (per_step_retries = 1).
        scanner.advance(1, StepOutcome::Timeout, StepPayload::None);
        assert_eq!(scanner.node_state(1).unwrap().state, ScanState::ReadingBib);

        // Second timeout exhausts it: downgrade from S100 floor -> Failed
        // immediately, since S100 has nowhere further to fall back to.
        scanner.advance(1, StepOutcome::Timeout, StepPayload::None);
        assert_eq!(scanner.node_state(1).unwrap().state, ScanState::Failed);
    }

    #[test]
    fn irm_candidate_routes_through_verification_when_enabled() {
        let mut scanner = ConfigRomScanner::new(2, 3, true);
        scanner.begin(1, &[(1, true)]);
        scanner.schedule();
        scanner.advance(1, StepOutcome::Success, StepPayload::Bib(bib()));
        assert_eq!(scanner.node_state(1).unwrap().state, ScanState::VerifyingIrmRead);
    }

    #[test]
    fn busy_outcome_sets_had_busy_nodes_without_advancing() {
        let mut scanner = ConfigRomScanner::new(2, 3, false);
        scanner.begin(1, &[(1, false)]);
        scanner.schedule();
        scanner.advance(1, StepOutcome::Busy, StepPayload::None);
        assert!(scanner.had_busy_nodes());
        assert_eq!(scanner.node_state(1).unwrap().state, ScanState::ReadingBib);
    }

    #[test]
    fn bib_success_populates_the_rom_store_with_rom_size() {
        let mut scanner = ConfigRomScanner::new(2, 3, false);
        scanner.begin(1, &[(1, false)]);
        scanner.schedule();
        scanner.advance(1, StepOutcome::Success, StepPayload::Bib(bib()));

        let rom = scanner.rom_for(1, 1).unwrap();
        assert_eq!(rom.bib.guid_hi, 1);
        assert_eq!(rom.rom_size_bytes, rom_size_bytes(4));
    }

    #[test]
    fn root_directory_quadlets_populate_typed_entries() {
        let mut scanner = ConfigRomScanner::new(2, 3, false);
        scanner.begin(1, &[(1, false)]);
        scanner.schedule();
        scanner.advance(1, StepOutcome::Success, StepPayload::Bib(bib()));

        // One entry: immediate key 0x03 (vendor_id) with value 0xABCDEF.
        let root_dir = alloc::vec![1u32 << 16, (0x03u32 << 24) | 0x00AB_CDEF];
        scanner.advance(1, StepOutcome::Success, StepPayload::RootDirectoryQuadlets(root_dir));

        let rom = scanner.rom_for(1, 1).unwrap();
        assert_eq!(rom.root_directory_entries.len(), 1);
        assert_eq!(rom.root_directory_entries[0].key_type, RootDirectoryKeyType::Immediate);
        assert_eq!(rom.root_directory_entries[0].value, 0x00AB_CDEF);
    }

    #[test]
    fn text_descriptor_leaf_populates_vendor_name() {
        let mut scanner = ConfigRomScanner::new(2, 3, false);
        scanner.begin(1, &[(1, false)]);
        scanner.schedule();
        scanner.advance(1, StepOutcome::Success, StepPayload::Bib(bib()));
        scanner.advance(1, StepOutcome::Success, StepPayload::RootDirectoryQuadlets(alloc::vec![0]));

        // header (length=2), specifier, language, then "ACME" packed.
        let leaf = alloc::vec![2u32 << 16, 0, 0, u32::from_be_bytes(*b"ACME")];
        scanner.advance(
            1,
            StepOutcome::Success,
            StepPayload::TextDescriptor { role: TextDescriptorRole::Vendor, leaf_quadlets: leaf },
        );

        let rom = scanner.rom_for(1, 1).unwrap();
        assert_eq!(rom.vendor_name.as_deref(), Some("ACME"));
        assert_eq!(scanner.node_state(1).unwrap().state, ScanState::Complete);
    }
}
