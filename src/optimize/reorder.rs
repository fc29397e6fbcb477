//! Local reordering: walk each row left to right and trade neighboring
//! cells of equal footprint when doing so shortens their nets.

use itertools::Itertools;

use crate::detailed::DetailedMgr;

use super::{movable_nodes, swap_if_improving};

pub(super) fn run(mgr: &mut DetailedMgr) -> u64 {
    let mut accepted = 0u64;
    for level in 0..mgr.grid.num_levels {
        let row_nodes: Vec<usize> = movable_nodes(mgr)
            .into_iter()
            .filter(|&n| mgr.node_level(n) == level && mgr.height_levels(n) == 1)
            .sorted_by_key(|&n| mgr.node_site(n))
            .collect();
        for window in row_nodes.windows(2) {
            let (a, b) = (window[0], window[1]);
            // Only interchangeable footprints keep the packing intact.
            if mgr.network.nodes[a].width != mgr.network.nodes[b].width {
                continue;
            }
            if swap_if_improving(mgr, a, b) {
                accepted += 1;
            }
        }
    }
    accepted
}
