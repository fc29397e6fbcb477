//! Randomized improvement: generate random moves and swaps, keep the ones
//! that improve the objective. All randomness comes from the manager's
//! seeded generator, so a fixed seed reproduces the pass exactly.

use rand::Rng;

use crate::detailed::DetailedMgr;

use super::{move_if_improving, movable_nodes, swap_if_improving, Objective};

pub(super) fn run(mgr: &mut DetailedMgr, moves_per_cell: u32, objective: Objective) -> u64 {
    // HPWL is the only objective currently scored.
    match objective {
        Objective::Hpwl => {}
    }

    let nodes = movable_nodes(mgr);
    if nodes.is_empty() {
        return 0;
    }
    let (max_dx, max_dy) = mgr.max_displacement();
    let attempts = moves_per_cell as usize * nodes.len();

    let mut accepted = 0u64;
    for _ in 0..attempts {
        let node = nodes[mgr.rng_mut().gen_range(0..nodes.len())];
        if mgr.rng_mut().gen_bool(0.5) {
            let (level, site) = random_target(mgr, node, max_dx, max_dy);
            if mgr.check_move(node, level, site) && move_if_improving(mgr, node, level, site) {
                accepted += 1;
            }
        } else {
            let other = nodes[mgr.rng_mut().gen_range(0..nodes.len())];
            if other != node && swap_if_improving(mgr, node, other) {
                accepted += 1;
            }
        }
    }
    accepted
}

/// A uniformly random (level, site) inside the displacement window around
/// the node's original position, or anywhere on the grid when unbounded.
fn random_target(
    mgr: &mut DetailedMgr,
    node: usize,
    max_dx: Option<i32>,
    max_dy: Option<i32>,
) -> (usize, i32) {
    let levels = mgr.height_levels(node) as i32;
    let max_level = (mgr.grid.num_levels as i32 - levels).max(0);
    let (orig_left, orig_bottom) = {
        let nd = &mgr.network.nodes[node];
        (nd.orig_left, nd.orig_bottom)
    };

    let (lo_level, hi_level) = match max_dy {
        Some(dy) => {
            let center = (orig_bottom - mgr.grid.ymin) / mgr.grid.row_height;
            let span = dy / mgr.grid.row_height;
            ((center - span).clamp(0, max_level), (center + span).clamp(0, max_level))
        }
        None => (0, max_level),
    };
    let max_site = mgr.grid.num_sites as i32 - 1;
    let (lo_site, hi_site) = match max_dx {
        Some(dx) => {
            let center = (orig_left - mgr.grid.xmin) / mgr.grid.site_spacing;
            let span = dx / mgr.grid.site_spacing;
            ((center - span).clamp(0, max_site), (center + span).clamp(0, max_site))
        }
        None => (0, max_site),
    };

    let level = mgr.rng_mut().gen_range(lo_level..=hi_level) as usize;
    let site = mgr.rng_mut().gen_range(lo_site..=hi_site);
    (level, site)
}
