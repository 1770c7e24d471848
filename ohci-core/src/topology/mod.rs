//! Self-ID quadlets → node records → tree links → validated topology
//! snapshot (§4.5).

extern crate alloc;

use crate::reg::bits::node_id;
use crate::selfid::SelfIdResult;
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    NotPresent,
    NotActive,
    Parent,
    Child,
}

impl PortState {
    fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0b00 => PortState::NotPresent,
            0b01 => PortState::NotActive,
            0b10 => PortState::Parent,
            _ => PortState::Child,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopologyNode {
    pub node_id: u8,
    pub port_states: Vec<PortState>,
    pub parent_port: Option<u8>,
    pub child_node_ids: Vec<u8>,
    pub parent_node_ids: Vec<u8>,
    pub is_root: bool,
    pub is_irm_candidate: bool,
    pub link_active: bool,
    pub initiated_reset: bool,
    pub gap_count: u8,
    pub power_class: u8,
    pub max_speed_mbps: u16,
}

#[derive(Debug, Clone)]
pub struct TopologySnapshot {
    pub generation: u8,
    pub nodes: Vec<TopologyNode>,
    pub node_count: usize,
    pub root_node_id: Option<u8>,
    pub irm_node_id: Option<u8>,
    pub local_node_id: Option<u8>,
    pub bus_base16: u32,
    pub gap_count: u8,
    pub max_hops_from_root: u32,
    pub warnings: Vec<String>,
}

const SPEED_TABLE_MBPS: [u16; 4] = [100, 200, 400, 800];

fn decode_base_quadlet(node_id_value: u8, q: u32) -> TopologyNode {
    let link_active = (q >> 22) & 1 != 0;
    let contender = (q >> 11) & 1 != 0;
    let initiated_reset = (q >> 1) & 1 != 0;
    let gap_count = ((q >> 16) & 0x3F) as u8;
    let power_class = ((q >> 8) & 0x7) as u8;
    let speed_code = ((q >> 14) & 0x3) as usize;

    // Base quadlet carries ports 0..2 as 2-bit fields starting at bit 6.
    let mut port_states = Vec::with_capacity(3);
    for port in 0..3u32 {
        let shift = 6 - 2 * port;
        port_states.push(PortState::from_bits(q >> shift));
    }

    TopologyNode {
        node_id: node_id_value,
        port_states,
        parent_port: None,
        child_node_ids: Vec::new(),
        parent_node_ids: Vec::new(),
        is_root: false,
        is_irm_candidate: contender,
        link_active,
        initiated_reset,
        gap_count,
        power_class,
        max_speed_mbps: SPEED_TABLE_MBPS[speed_code],
    }
}

fn decode_extended_ports(node: &mut TopologyNode, extended: &[u32]) {
    // Extended quadlets carry 8 ports each, 2 bits per port, MSB-first.
    for ext in extended {
        for port in 0..8u32 {
            if node.port_states.len() >= 27 {
                break;
            }
            let shift = 30 - 2 * port;
            node.port_states.push(PortState::from_bits(ext >> shift));
        }
    }
}

/// Build a topology snapshot from a valid Self-ID capture result (§4.5).
pub fn build(selfid: &SelfIdResult, node_id_register: u32) -> TopologySnapshot {
    let mut warnings = Vec::new();
    let mut nodes: Vec<TopologyNode> = Vec::with_capacity(selfid.packets.len());

    for (idx, packet) in selfid.packets.iter().enumerate() {
        // Self-ID packets are emitted in descending phyID order by the bus;
        // node numbering increases as packets are consumed in arrival order.
        let mut node = decode_base_quadlet(idx as u8, packet.base);
        decode_extended_ports(&mut node, &packet.extended);
        nodes.push(node);
    }

    build_tree_links(&mut nodes, &mut warnings);

    let root_node_id = elect_root(&nodes);
    for node in nodes.iter_mut() {
        node.is_root = Some(node.node_id) == root_node_id;
    }
    let irm_node_id = nodes
        .iter()
        .filter(|n| n.is_irm_candidate)
        .map(|n| n.node_id)
        .max();
    let gap_count = nodes.iter().map(|n| n.gap_count).max().unwrap_or(0).min(63);

    let local_node_id = if node_id_register & node_id::ID_VALID != 0 {
        Some((node_id_register & node_id::NODE_NUMBER_MASK) as u8)
    } else {
        None
    };
    let bus_base16 = node_id_register & node_id::BUS_NUMBER_MASK;

    let max_hops_from_root = root_node_id
        .map(|root| bfs_max_hops(&nodes, root))
        .unwrap_or(0);

    let node_count = nodes.len();
    TopologySnapshot {
        generation: selfid.generation,
        nodes,
        node_count,
        root_node_id,
        irm_node_id,
        local_node_id,
        bus_base16,
        gap_count,
        max_hops_from_root,
        warnings,
    }
}

fn build_tree_links(nodes: &mut [TopologyNode], warnings: &mut Vec<String>) {
    // Self-ID packets arrive in an order where every node's Parent ports
    // refer to nodes already seen (lower index = higher phyID = processed
    // earlier in the arrival sequence); find, for every Parent port on node
    // A, the first still-unconnected Child port on an earlier node B.
    let mut edges = 0usize;
    for a_idx in 0..nodes.len() {
        let parent_port_count =
            nodes[a_idx].port_states.iter().filter(|p| **p == PortState::Parent).count();
        for _ in 0..parent_port_count {
            let mut linked = false;
            for b_idx in 0..nodes.len() {
                if b_idx == a_idx {
                    continue;
                }
                if let Some(port_idx) = nodes[b_idx]
                    .port_states
                    .iter()
                    .position(|p| *p == PortState::Child)
                {
                    if nodes[b_idx].parent_node_ids.is_empty()
                        || !nodes[b_idx].parent_node_ids.contains(&nodes[a_idx].node_id)
                    {
                        // Consume this Child port by marking it NotActive so
                        // it is not reused by a later Parent port.
                        nodes[b_idx].port_states[port_idx] = PortState::NotActive;
                        let a_id = nodes[a_idx].node_id;
                        let b_id = nodes[b_idx].node_id;
                        nodes[a_idx].child_node_ids.push(b_id);
                        nodes[b_idx].parent_node_ids.push(a_id);
                        nodes[b_idx].parent_port = Some(port_idx as u8);
                        linked = true;
                        edges += 1;
                        break;
                    }
                }
            }
            if !linked {
                warnings.push(format!("orphan Parent port on node {}", nodes[a_idx].node_id));
            }
        }
    }

    let expected = nodes.len().saturating_sub(1);
    if edges != expected {
        warnings.push(format!(
            "tree link count {edges} does not match expected {expected} for a connected bus"
        ));
    }
}

fn elect_root(nodes: &[TopologyNode]) -> Option<u8> {
    nodes
        .iter()
        .filter(|n| n.link_active && n.parent_node_ids.is_empty())
        .map(|n| n.node_id)
        .max()
}

fn bfs_max_hops(nodes: &[TopologyNode], root: u8) -> u32 {
    let mut visited = vec![false; nodes.len()];
    let mut frontier = vec![root];
    let mut hops = 0u32;
    let index_of = |id: u8| nodes.iter().position(|n| n.node_id == id);

    if let Some(i) = index_of(root) {
        visited[i] = true;
    }

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for id in &frontier {
            if let Some(i) = index_of(*id) {
                for child in &nodes[i].child_node_ids {
                    if let Some(ci) = index_of(*child) {
                        if !visited[ci] {
                            visited[ci] = true;
                            next.push(*child);
                        }
                    }
                }
            }
        }
        if next.is_empty() {
            break;
        }
        hops += 1;
        frontier = next;
    }
    hops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selfid::SelfIdPacket;

    fn packet(gap: u8, contender: bool, link_active: bool, parent_port: bool) -> SelfIdPacket {
        let mut q = 0u32;
        q |= (gap as u32) << 16;
        if contender {
            q |= 1 << 11;
        }
        if link_active {
            q |= 1 << 22;
        }
        // port 0 field at bits 6..7
        if parent_port {
            q |= 0b10 << 6; // Parent
        } else {
            q |= 0b11 << 6; // Child
        }
        SelfIdPacket { base: q, extended: Vec::new() }
    }

    #[test]
    fn two_node_bus_elects_root_and_links_reciprocally() {
        // node 0 (local) has a Child port facing node 1; node 1 has a
        // Parent port facing node 0 and is elected root (higher nodeId).
        let local = packet(0x3F, false, true, false);
        let remote = packet(0x3F, false, true, true);
        let selfid = SelfIdResult {
            generation: 1,
            quads: Vec::new(),
            packets: vec![local, remote],
            valid: true,
            crc_error: false,
            timed_out: false,
        };

        let snapshot = build(&selfid, node_id::ID_VALID);

        assert_eq!(snapshot.node_count, 2);
        assert_eq!(snapshot.root_node_id, Some(1));
        assert_eq!(snapshot.local_node_id, Some(0));
        assert_eq!(snapshot.max_hops_from_root, 1);
        assert!(snapshot.warnings.is_empty());
    }

    #[test]
    fn orphan_parent_port_produces_a_warning() {
        let only = packet(0x3F, false, true, true);
        let selfid = SelfIdResult {
            generation: 1,
            quads: Vec::new(),
            packets: vec![only],
            valid: true,
            crc_error: false,
            timed_out: false,
        };

        let snapshot = build(&selfid, node_id::ID_VALID);
        assert!(!snapshot.warnings.is_empty());
        assert!(snapshot.root_node_id.is_none() || snapshot.node_count == 1);
    }

    #[test]
    fn gap_count_is_clamped_and_takes_the_maximum() {
        let a = packet(0x10, false, true, false);
        let b = packet(0x3F, false, true, true);
        let selfid = SelfIdResult {
            generation: 1,
            quads: Vec::new(),
            packets: vec![a, b],
            valid: true,
            crc_error: false,
            timed_out: false,
        };
        let snapshot = build(&selfid, node_id::ID_VALID);
        assert_eq!(snapshot.gap_count, 0x3F);
    }
}
</content>
