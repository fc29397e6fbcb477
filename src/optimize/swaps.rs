//! Global and vertical swap heuristics: pull each cell toward the optimal
//! region of its nets, swapping with the occupant when the target is taken.

use crate::detailed::DetailedMgr;
use crate::grid::SiteState;

use super::{move_if_improving, movable_nodes, optimal_center, swap_if_improving};

/// How far around the preferred site we look for an opening.
const SEARCH_SITES: i32 = 8;

pub(super) fn global_swap(mgr: &mut DetailedMgr) -> u64 {
    run(mgr, false)
}

pub(super) fn vertical_swap(mgr: &mut DetailedMgr) -> u64 {
    run(mgr, true)
}

fn run(mgr: &mut DetailedMgr, vertical_only: bool) -> u64 {
    let mut accepted = 0u64;
    for node in movable_nodes(mgr) {
        let (cx, cy) = match optimal_center(mgr, node) {
            Some(c) => c,
            None => continue,
        };
        let nd = &mgr.network.nodes[node];
        let want_left = cx - nd.width / 2;
        let want_bottom = cy - nd.height / 2;

        let cur_level = mgr.node_level(node) as i32;
        let levels = mgr.height_levels(node) as i32;
        let max_level = mgr.grid.num_levels as i32 - levels;
        let mut target_level = ((want_bottom - mgr.grid.ymin + mgr.grid.row_height / 2)
            / mgr.grid.row_height)
            .clamp(0, max_level.max(0));
        if vertical_only {
            // Single-row step toward the preferred row.
            target_level = cur_level + (target_level - cur_level).signum();
            if target_level < 0 || target_level > max_level {
                continue;
            }
        }
        let target_site = ((want_left - mgr.grid.xmin + mgr.grid.site_spacing / 2)
            / mgr.grid.site_spacing)
            .clamp(0, mgr.grid.num_sites as i32 - 1);

        if attempt(mgr, node, target_level as usize, target_site) {
            accepted += 1;
        }
    }
    accepted
}

/// Try the preferred slot and a few openings around it; when the preferred
/// slot is held by another cell, try trading places with it.
fn attempt(mgr: &mut DetailedMgr, node: usize, level: usize, site: i32) -> bool {
    for ds in 0..=SEARCH_SITES {
        for candidate in [site - ds, site + ds] {
            if candidate < 0 || candidate as usize >= mgr.grid.num_sites {
                continue;
            }
            if ds > 0 && candidate == site {
                continue;
            }
            if mgr.check_move(node, level, candidate)
                && move_if_improving(mgr, node, level, candidate)
            {
                return true;
            }
        }
    }
    if site >= 0 && (site as usize) < mgr.grid.num_sites {
        if let SiteState::Occupied(other) = mgr.grid.get(level, site as usize) {
            if other != node && mgr.network.nodes[other].is_movable() {
                return swap_if_improving(mgr, node, other);
            }
        }
    }
    false
}
