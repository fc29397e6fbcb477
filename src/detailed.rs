//! The live mutable state of the placement during optimization. Every
//! position change after legalization goes through [`DetailedMgr::try_move`]
//! or [`DetailedMgr::try_swap`], so legality holds after every individual
//! move, not just at pass boundaries.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::arch::Architecture;
use crate::drc::PlacementDrc;
use crate::geom::Rect;
use crate::grid::{Grid, SiteState};
use crate::network::Network;

pub struct DetailedMgr<'a> {
    pub arch: &'a Architecture,
    pub network: &'a mut Network,
    pub grid: &'a mut Grid,
    pub drc: &'a PlacementDrc,
    rng: StdRng,
    max_disp_x: Option<i32>,
    max_disp_y: Option<i32>,
    disallow_one_site_gaps: bool,
}

impl<'a> DetailedMgr<'a> {
    pub fn new(
        arch: &'a Architecture,
        network: &'a mut Network,
        grid: &'a mut Grid,
        drc: &'a PlacementDrc,
    ) -> Self {
        DetailedMgr {
            arch,
            network,
            grid,
            drc,
            rng: StdRng::seed_from_u64(1),
            max_disp_x: None,
            max_disp_y: None,
            disallow_one_site_gaps: false,
        }
    }

    /// The seed controls every randomized choice made through this manager.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Maximum |dx|, |dy| from each node's original position; `None` is
    /// unbounded.
    pub fn set_max_displacement(&mut self, dx: Option<i32>, dy: Option<i32>) {
        self.max_disp_x = dx;
        self.max_disp_y = dy;
    }

    pub fn set_disallow_one_site_gaps(&mut self, disallow: bool) {
        self.disallow_one_site_gaps = disallow;
    }

    pub fn max_displacement(&self) -> (Option<i32>, Option<i32>) {
        (self.max_disp_x, self.max_disp_y)
    }

    /// Paint fixed obstructions into the grid: blockages, fixed cells and
    /// terminals. Must run before any occupancy query.
    pub fn paint_fixed(&mut self) {
        for rect in &self.network.blockages {
            self.grid.block_rect(rect);
        }
        for node in &self.network.nodes {
            if !node.is_movable() {
                let rect = Rect::new(node.left, node.bottom, node.right(), node.top());
                self.grid.block_rect(&rect);
            }
        }
    }

    /// Number of grid levels a node spans.
    pub fn height_levels(&self, node: usize) -> usize {
        let h = self.network.nodes[node].height;
        (((h + self.grid.row_height - 1) / self.grid.row_height).max(1)) as usize
    }

    pub fn node_level(&self, node: usize) -> usize {
        self.grid
            .level_of_y(self.network.nodes[node].bottom)
            .unwrap_or(0)
    }

    pub fn node_site(&self, node: usize) -> i32 {
        self.grid.site_of_x(self.network.nodes[node].left)
    }

    /// Padded site span of a node placed at `site`, or `None` when padding
    /// pushes the span off the grid.
    fn padded_span(&self, node: usize, site: i32) -> Option<(usize, usize)> {
        let nd = &self.network.nodes[node];
        let (pad_l, pad_r) = self.arch.padding(node);
        let s0 = site - pad_l / self.grid.site_width;
        let s1 = site
            + self.grid.sites_for(nd.width) as i32
            + pad_r / self.grid.site_width;
        if s0 < 0 || s1 as usize > self.grid.num_sites {
            return None;
        }
        Some((s0 as usize, s1 as usize))
    }

    fn slot_clear(&self, level: usize, site: i32, owner: usize) -> bool {
        if site < 0 || site as usize >= self.grid.num_sites {
            return false;
        }
        match self.grid.get(level, site as usize) {
            SiteState::Free => true,
            SiteState::Occupied(n) => n == owner,
            SiteState::Blocked => false,
        }
    }

    /// Required minimum clearance between a node placed at `y` and a
    /// horizontal neighbor, from the facing typed boundary edges.
    fn required_edge_spacing(&self, node: usize, y: i32, neighbor: usize, neighbor_on_left: bool) -> i32 {
        let (m1, m2) = match (
            self.network.nodes[node].master,
            self.network.nodes[neighbor].master,
        ) {
            (Some(a), Some(b)) => (a, b),
            _ => return 0,
        };
        let ny = self.network.nodes[neighbor].bottom;
        let facing = |model: usize, left_side: bool| {
            let bbox = self.network.masters[model].bbox;
            let at = if left_side { bbox.xlo } else { bbox.xhi };
            self.network.masters[model]
                .edges
                .iter()
                .filter(move |e| e.rect.xlo == e.rect.xhi && e.rect.xlo == at)
        };
        // Mover's facing side vs the neighbor's opposite side.
        let mut required = 0;
        for e1 in facing(m1, neighbor_on_left) {
            for e2 in facing(m2, !neighbor_on_left) {
                let lo = (e1.rect.ylo + y).max(e2.rect.ylo + ny);
                let hi = (e1.rect.yhi + y).min(e2.rect.yhi + ny);
                if lo < hi {
                    required = required.max(self.drc.spacing(e1.edge_type, e2.edge_type));
                }
            }
        }
        required
    }

    fn edge_spacing_ok(&self, node: usize, level: usize, site: i32, levels: usize) -> bool {
        if !self.drc.has_cell_edge_spacing_table() {
            return true;
        }
        let (s0, s1) = match self.padded_span(node, site) {
            Some(span) => span,
            None => return false,
        };
        let x = self.grid.x_of_site(site);
        let y = self.grid.y_of_level(level);
        let width = self.network.nodes[node].width;
        for l in level..level + levels {
            // Nearest occupied slot to the left.
            let mut s = s0 as i32 - 1;
            while s >= 0 && self.slot_clear(l, s, node) {
                s -= 1;
            }
            if s >= 0 {
                if let SiteState::Occupied(m) = self.grid.get(l, s as usize) {
                    if m != node {
                        let required = self.required_edge_spacing(node, y, m, true);
                        if x - self.network.nodes[m].right() < required {
                            return false;
                        }
                    }
                }
            }
            // Nearest occupied slot to the right.
            let mut s = s1 as i32;
            while (s as usize) < self.grid.num_sites && self.slot_clear(l, s, node) {
                s += 1;
            }
            if (s as usize) < self.grid.num_sites {
                if let SiteState::Occupied(m) = self.grid.get(l, s as usize) {
                    if m != node {
                        let required = self.required_edge_spacing(node, y, m, false);
                        if self.network.nodes[m].left - (x + width) < required {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    /// Full acceptance check for placing `node` at (level, site): region,
    /// displacement bounds, power-rail parity for multi-row cells, padded
    /// overlap, the one-site-gap policy, and edge spacing.
    pub fn check_move(&self, node: usize, level: usize, site: i32) -> bool {
        let nd = &self.network.nodes[node];
        if !nd.is_movable() {
            return false;
        }
        let levels = self.height_levels(node);
        if level + levels > self.grid.num_levels {
            return false;
        }
        let x = self.grid.x_of_site(site);
        let y = self.grid.y_of_level(level);

        if let Some(dx) = self.max_disp_x {
            if (x - nd.orig_left).abs() > dx {
                return false;
            }
        }
        if let Some(dy) = self.max_disp_y {
            if (y - nd.orig_bottom).abs() > dy {
                return false;
            }
        }

        let footprint = Rect::new(x, y, x + nd.width, y + nd.height);
        if !self.arch.regions[nd.group].contains(&footprint) {
            return false;
        }

        if levels > 1 {
            let bottom = self.arch.level(level);
            let top = self.arch.level(level + levels - 1);
            if nd.bottom_power.conflicts(&bottom.bottom_power)
                || nd.top_power.conflicts(&top.top_power)
            {
                return false;
            }
        }

        let (s0, s1) = match self.padded_span(node, site) {
            Some(span) => span,
            None => return false,
        };
        if !self.grid.span_free(level..level + levels, s0..s1, &[node]) {
            return false;
        }

        if self.disallow_one_site_gaps {
            for l in level..level + levels {
                let left_isolated = self.slot_clear(l, s0 as i32 - 1, node)
                    && !self.slot_clear(l, s0 as i32 - 2, node);
                let right_isolated = self.slot_clear(l, s1 as i32, node)
                    && !self.slot_clear(l, s1 as i32 + 1, node);
                if left_isolated || right_isolated {
                    return false;
                }
            }
        }

        self.edge_spacing_ok(node, level, site, levels)
    }

    fn paint_node(&mut self, node: usize, level: usize, site: i32, state: SiteState) {
        let levels = self.height_levels(node);
        if let Some((s0, s1)) = self.padded_span(node, site) {
            self.grid.paint(level..level + levels, s0..s1, state);
        }
    }

    /// Unchecked placement; used by the legalizer to populate the grid.
    pub fn place(&mut self, node: usize, level: usize, site: i32) {
        self.paint_node(node, level, site, SiteState::Occupied(node));
        let x = self.grid.x_of_site(site);
        let y = self.grid.y_of_level(level);
        let levels = self.height_levels(node);
        let nd = &mut self.network.nodes[node];
        nd.left = x;
        nd.bottom = y;
        if levels == 1 {
            nd.orient = self.arch.level(level).orient;
        }
    }

    fn unplace(&mut self, node: usize) {
        let level = self.node_level(node);
        let site = self.node_site(node);
        self.paint_node(node, level, site, SiteState::Free);
    }

    /// Propose moving one node. Accepted moves are committed immediately;
    /// rejected moves have no effect.
    pub fn try_move(&mut self, node: usize, level: usize, site: i32) -> bool {
        if self.node_level(node) == level && self.node_site(node) == site {
            return self.network.nodes[node].is_movable();
        }
        if !self.check_move(node, level, site) {
            return false;
        }
        self.unplace(node);
        self.place(node, level, site);
        true
    }

    /// Propose exchanging the positions of two nodes.
    pub fn try_swap(&mut self, a: usize, b: usize) -> bool {
        if a == b {
            return false;
        }
        let (la, sa) = (self.node_level(a), self.node_site(a));
        let (lb, sb) = (self.node_level(b), self.node_site(b));
        self.unplace(a);
        self.unplace(b);
        if !self.check_move(a, lb, sb) {
            self.place(a, la, sa);
            self.place(b, lb, sb);
            return false;
        }
        self.place(a, lb, sb);
        if !self.check_move(b, la, sa) {
            self.unplace(a);
            self.place(a, la, sa);
            self.place(b, lb, sb);
            return false;
        }
        self.place(b, la, sa);
        true
    }
}
