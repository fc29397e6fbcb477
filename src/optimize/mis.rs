//! Matching over sets of interchangeable cells: cells sharing a footprint
//! can trade places anywhere on the grid without disturbing their
//! neighbors, so pairs drawn from each set are tried against each other.

use std::collections::HashMap;

use rand::Rng;

use crate::detailed::DetailedMgr;

use super::{movable_nodes, swap_if_improving};

pub(super) fn run(mgr: &mut DetailedMgr) -> u64 {
    let mut groups: HashMap<(i32, usize), Vec<usize>> = HashMap::new();
    for node in movable_nodes(mgr) {
        let key = (mgr.network.nodes[node].width, mgr.height_levels(node));
        groups.entry(key).or_default().push(node);
    }
    // Deterministic iteration order; HashMap order is not.
    let mut keys: Vec<(i32, usize)> = groups.keys().copied().collect();
    keys.sort_unstable();

    let mut accepted = 0u64;
    for key in keys {
        let members = &groups[&key];
        if members.len() < 2 {
            continue;
        }
        // Sample as many candidate pairs as the set has members.
        for _ in 0..members.len() {
            let i = mgr.rng_mut().gen_range(0..members.len());
            let j = mgr.rng_mut().gen_range(0..members.len());
            if i == j {
                continue;
            }
            let (a, b) = (members[i], members[j]);
            if swap_if_improving(mgr, a, b) {
                accepted += 1;
            }
        }
    }
    accepted
}
