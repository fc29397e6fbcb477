//! The optimization engine: an ordered script of move-generating heuristic
//! passes run against the detailed manager. Pass configuration is a
//! statically-typed list of records; nothing is parsed from text at run
//! time. For a fixed seed the whole engine is deterministic.

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::detailed::DetailedMgr;

mod mis;
mod random;
mod reorder;
mod swaps;

/// Objective a randomized pass scores candidate moves against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Objective {
    Hpwl,
}

/// One step of the optimization script.
#[derive(Clone, Debug)]
pub enum Pass {
    /// Independent-set matching: swaps among interchangeable cells.
    MisMatching { passes: u32, budget: Duration },
    /// Move each cell toward the optimal region of its nets.
    GlobalSwap { passes: u32, budget: Duration },
    /// Like GlobalSwap, restricted to single-row vertical steps.
    VerticalSwap { passes: u32, budget: Duration },
    /// Local reordering of neighboring cells within a row.
    Reorder { passes: u32, budget: Duration },
    /// Random move/swap generation scored against the objective.
    RandomImprove {
        passes: u32,
        moves_per_cell: u32,
        objective: Objective,
        budget: Duration,
    },
    /// Turn on the single-site-gap policy for the remaining passes.
    DisallowOneSiteGaps,
}

/// The script the improvement flow runs by default.
pub fn default_script(disallow_one_site_gaps: bool) -> Vec<Pass> {
    let budget = Duration::from_secs(5);
    let mut script = vec![
        Pass::MisMatching { passes: 10, budget },
        Pass::GlobalSwap { passes: 10, budget },
        Pass::VerticalSwap { passes: 10, budget },
        Pass::Reorder { passes: 10, budget },
    ];
    if disallow_one_site_gaps {
        script.push(Pass::DisallowOneSiteGaps);
    }
    script.push(Pass::RandomImprove {
        passes: 5,
        moves_per_cell: 20,
        objective: Objective::Hpwl,
        budget,
    });
    script
}

pub struct Optimizer {
    script: Vec<Pass>,
}

impl Optimizer {
    pub fn new(script: Vec<Pass>) -> Self {
        Optimizer { script }
    }

    /// Run the whole script. Heuristic passes never fail; a pass that finds
    /// no improving moves leaves the state unchanged.
    pub fn improve(&self, mgr: &mut DetailedMgr) {
        let start = mgr.network.hpwl();
        info!("Detailed improvement starting at hpwl {}.", start);
        for pass in &self.script {
            match pass {
                Pass::MisMatching { passes, budget } => {
                    run_pass(mgr, "mis", *passes, *budget, mis::run);
                }
                Pass::GlobalSwap { passes, budget } => {
                    run_pass(mgr, "global swap", *passes, *budget, swaps::global_swap);
                }
                Pass::VerticalSwap { passes, budget } => {
                    run_pass(mgr, "vertical swap", *passes, *budget, swaps::vertical_swap);
                }
                Pass::Reorder { passes, budget } => {
                    run_pass(mgr, "reorder", *passes, *budget, reorder::run);
                }
                Pass::RandomImprove {
                    passes,
                    moves_per_cell,
                    objective,
                    budget,
                } => {
                    let moves = *moves_per_cell;
                    let objective = *objective;
                    run_pass(mgr, "random", *passes, *budget, |mgr| {
                        random::run(mgr, moves, objective)
                    });
                }
                Pass::DisallowOneSiteGaps => {
                    mgr.set_disallow_one_site_gaps(true);
                }
            }
        }
        let end = mgr.network.hpwl();
        info!("Detailed improvement finished at hpwl {}.", end);
    }
}

/// Repeat one heuristic until its pass count or time budget runs out, or it
/// stops improving. The first iteration always runs.
fn run_pass(
    mgr: &mut DetailedMgr,
    name: &str,
    passes: u32,
    budget: Duration,
    mut heuristic: impl FnMut(&mut DetailedMgr) -> u64,
) {
    let deadline = Instant::now() + budget;
    let mut last = mgr.network.hpwl();
    for p in 0..passes {
        let accepted = heuristic(mgr);
        let hpwl = mgr.network.hpwl();
        debug!(
            "Pass {} iteration {}: {} accepted moves, hpwl {}.",
            name, p, accepted, hpwl
        );
        if accepted == 0 || hpwl >= last {
            break;
        }
        last = hpwl;
        if Instant::now() >= deadline {
            break;
        }
    }
}

/// Preferred position of a node: the mean center of its connected edges'
/// bounding boxes, excluding the node's own pins. `None` when the node has
/// no connectivity to pull it anywhere.
fn optimal_center(mgr: &DetailedMgr, node: usize) -> Option<(i32, i32)> {
    let network = &*mgr.network;
    let edges = network.edges_of_nodes(&[node]);
    let mut sum_x: i64 = 0;
    let mut sum_y: i64 = 0;
    let mut count: i64 = 0;
    for e in edges {
        let mut bbox = crate::geom::Rect::merge_init();
        let mut pins = 0;
        for &p in &network.edges[e].pins {
            if network.pins[p].node == node {
                continue;
            }
            let (x, y) = network.pin_position(p);
            bbox.merge(&crate::geom::Rect::new(x, y, x, y));
            pins += 1;
        }
        if pins > 0 {
            sum_x += bbox.x_center() as i64;
            sum_y += bbox.y_center() as i64;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    Some(((sum_x / count) as i32, (sum_y / count) as i32))
}

/// Commit a move only when it improves the wirelength of the affected
/// edges; otherwise restore the previous position.
fn move_if_improving(mgr: &mut DetailedMgr, node: usize, level: usize, site: i32) -> bool {
    let old_level = mgr.node_level(node);
    let old_site = mgr.node_site(node);
    if (old_level, old_site) == (level, site) {
        return false;
    }
    let edges = mgr.network.edges_of_nodes(&[node]);
    let before = mgr.network.hpwl_of_edges(&edges);
    if !mgr.try_move(node, level, site) {
        return false;
    }
    let after = mgr.network.hpwl_of_edges(&edges);
    if after >= before {
        // The vacated slot can become invalid in the meantime, e.g. when the
        // single-site-gap policy now rejects it. The new position is legal,
        // so keep it in that case.
        return !mgr.try_move(node, old_level, old_site);
    }
    true
}

/// Commit a swap only when it improves the wirelength of the affected
/// edges; otherwise swap back.
fn swap_if_improving(mgr: &mut DetailedMgr, a: usize, b: usize) -> bool {
    let edges = mgr.network.edges_of_nodes(&[a, b]);
    let before = mgr.network.hpwl_of_edges(&edges);
    if !mgr.try_swap(a, b) {
        return false;
    }
    let after = mgr.network.hpwl_of_edges(&edges);
    if after >= before {
        // As with moves, keep the swapped state when the undo no longer
        // passes the legality checks; both placements are legal.
        return !mgr.try_swap(a, b);
    }
    true
}

fn movable_nodes(mgr: &DetailedMgr) -> Vec<usize> {
    mgr.network
        .nodes
        .iter()
        .filter(|n| n.is_movable())
        .map(|n| n.id)
        .collect()
}
