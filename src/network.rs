//! The placement graph: cells and terminals (nodes), nets (edges) and the
//! pins wiring them together, plus the master models carrying typed edge
//! geometry. All entities live in dense arenas owned by [`Network`] and
//! reference each other by index; the arenas are built once per run by the
//! importer and only positions and orientations mutate afterwards.

use crate::arch::RailPower;
use crate::db::Orient;
use crate::geom::Rect;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Cell,
    Terminal,
}

/// A placeable cell or a fixed terminal. Positions are the lower-left corner
/// relative to the placement core's origin.
#[derive(Clone, Debug)]
pub struct Node {
    pub id: usize,
    pub name: String,
    pub kind: NodeKind,
    pub width: i32,
    pub height: i32,
    pub left: i32,
    pub bottom: i32,
    pub orig_left: i32,
    pub orig_bottom: i32,
    pub orient: Orient,
    pub fixed: bool,
    /// Master model index, cells only.
    pub master: Option<usize>,
    /// Region id; 0 is the default region.
    pub group: usize,
    pub top_power: RailPower,
    pub bottom_power: RailPower,
    /// Pin ids attached to this node.
    pub pins: Vec<usize>,
}

impl Node {
    pub fn right(&self) -> i32 {
        self.left + self.width
    }

    pub fn top(&self) -> i32 {
        self.bottom + self.height
    }

    pub fn is_movable(&self) -> bool {
        self.kind == NodeKind::Cell && !self.fixed
    }
}

/// A pin binds one node to one edge. The offset is relative to the node's
/// center, re-based at import time from the database's corner-origin
/// convention.
#[derive(Clone, Debug)]
pub struct Pin {
    pub id: usize,
    pub node: usize,
    pub edge: usize,
    pub offset_x: i32,
    pub offset_y: i32,
    pub width: i32,
    pub height: i32,
    /// Routing layer tag; carried through but unused downstream.
    pub layer: u32,
}

/// A net. Supply nets never enter the network.
#[derive(Clone, Debug)]
pub struct Edge {
    pub id: usize,
    pub name: String,
    pub pins: Vec<usize>,
}

/// A typed boundary-edge segment of a master.
#[derive(Clone, Copy, Debug)]
pub struct MasterEdge {
    pub edge_type: usize,
    pub rect: Rect,
}

/// Per-master placement geometry: the placement boundary and the typed edge
/// segments used for edge-to-edge spacing checks.
#[derive(Clone, Debug, Default)]
pub struct MasterModel {
    pub bbox: Rect,
    pub edges: Vec<MasterEdge>,
}

#[derive(Default)]
pub struct Network {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub pins: Vec<Pin>,
    pub masters: Vec<MasterModel>,
    pub blockages: Vec<Rect>,
}

impl Network {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn create_node(&mut self, name: String, kind: NodeKind) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node {
            id,
            name,
            kind,
            width: 0,
            height: 0,
            left: 0,
            bottom: 0,
            orig_left: 0,
            orig_bottom: 0,
            orient: Orient::R0,
            fixed: false,
            master: None,
            group: 0,
            top_power: RailPower::Unknown,
            bottom_power: RailPower::Unknown,
            pins: Vec::new(),
        });
        id
    }

    pub fn create_edge(&mut self, name: String) -> usize {
        let id = self.edges.len();
        self.edges.push(Edge {
            id,
            name,
            pins: Vec::new(),
        });
        id
    }

    pub fn create_pin(&mut self, node: usize, edge: usize) -> usize {
        let id = self.pins.len();
        self.pins.push(Pin {
            id,
            node,
            edge,
            offset_x: 0,
            offset_y: 0,
            width: 0,
            height: 0,
            layer: 0,
        });
        self.nodes[node].pins.push(id);
        self.edges[edge].pins.push(id);
        id
    }

    pub fn create_master(&mut self) -> usize {
        let id = self.masters.len();
        self.masters.push(MasterModel::default());
        id
    }

    pub fn create_blockage(&mut self, rect: Rect) {
        self.blockages.push(rect);
    }

    /// Absolute position of a pin at its node's current location.
    pub fn pin_position(&self, pin: usize) -> (i32, i32) {
        let pin = &self.pins[pin];
        let node = &self.nodes[pin.node];
        (
            node.left + node.width / 2 + pin.offset_x,
            node.bottom + node.height / 2 + pin.offset_y,
        )
    }

    /// Half-perimeter of one edge's pin bounding box.
    pub fn edge_hpwl(&self, edge: usize) -> i64 {
        let pins = &self.edges[edge].pins;
        if pins.len() < 2 {
            return 0;
        }
        let mut bbox = Rect::merge_init();
        for &p in pins {
            let (x, y) = self.pin_position(p);
            bbox.merge(&Rect::new(x, y, x, y));
        }
        bbox.dx() as i64 + bbox.dy() as i64
    }

    /// Half-perimeter wirelength over the whole network.
    pub fn hpwl(&self) -> i64 {
        (0..self.edges.len()).map(|e| self.edge_hpwl(e)).sum()
    }

    /// Sorted, deduplicated edge ids touching any of `nodes`.
    pub fn edges_of_nodes(&self, nodes: &[usize]) -> Vec<usize> {
        let mut edges: Vec<usize> = nodes
            .iter()
            .flat_map(|&n| self.nodes[n].pins.iter().map(|&p| self.pins[p].edge))
            .collect();
        edges.sort_unstable();
        edges.dedup();
        edges
    }

    pub fn hpwl_of_edges(&self, edges: &[usize]) -> i64 {
        edges.iter().map(|&e| self.edge_hpwl(e)).sum()
    }
}
