//! Initial legalization: snap every movable cell onto the site/row grid with
//! minimal shifts and populate the occupancy the detailed manager works
//! against. On an already-legal input this is a no-op and stays silent; a
//! warning here on legal input points at an importer or architecture defect
//! upstream.

use anyhow::{bail, Result};
use log::{info, warn};

use crate::detailed::DetailedMgr;

/// Abstract interface over legalizers, so the improvement flow does not care
/// which strategy produced the initial legal state.
pub trait Legalizer {
    fn legalize(&self, mgr: &mut DetailedMgr) -> Result<()>;
}

/// Shift-based legalizer: cells are processed in x order and pushed to the
/// nearest acceptable site, searching outward over rows when their own row
/// is full.
pub struct ShiftLegalizer;

impl Legalizer for ShiftLegalizer {
    fn legalize(&self, mgr: &mut DetailedMgr) -> Result<()> {
        mgr.paint_fixed();

        if mgr.grid.num_levels == 0 || mgr.grid.num_sites == 0 {
            bail!("No rows available for legalization.");
        }

        let mut order: Vec<usize> = mgr
            .network
            .nodes
            .iter()
            .filter(|n| n.is_movable())
            .map(|n| n.id)
            .collect();
        order.sort_by_key(|&n| {
            let nd = &mgr.network.nodes[n];
            (nd.left, nd.bottom, nd.id)
        });

        let num_levels = mgr.grid.num_levels as i32;
        let num_sites = mgr.grid.num_sites as i32;
        let mut shifted = 0usize;
        let mut total_disp: i64 = 0;

        for node in order {
            let (old_left, old_bottom) = {
                let nd = &mgr.network.nodes[node];
                (nd.left, nd.bottom)
            };
            let levels = mgr.height_levels(node) as i32;
            let desired_level = ((old_bottom - mgr.grid.ymin + mgr.grid.row_height / 2)
                / mgr.grid.row_height)
                .clamp(0, (num_levels - levels).max(0));
            let desired_site = ((old_left - mgr.grid.xmin + mgr.grid.site_spacing / 2)
                / mgr.grid.site_spacing)
                .clamp(0, num_sites - 1);

            let mut best: Option<(i64, usize, i32)> = None;
            for radius in 0..num_levels {
                for level in [desired_level - radius, desired_level + radius] {
                    if level < 0 || level + levels > num_levels {
                        continue;
                    }
                    if radius > 0 && level == desired_level {
                        continue;
                    }
                    if let Some(site) = nearest_site(mgr, node, level as usize, desired_site) {
                        let dx = (mgr.grid.x_of_site(site) - old_left).abs() as i64;
                        let dy = (mgr.grid.y_of_level(level as usize) - old_bottom).abs() as i64;
                        let cost = dx + dy;
                        if best.map(|(c, _, _)| cost < c).unwrap_or(true) {
                            best = Some((cost, level as usize, site));
                        }
                    }
                }
                if best.is_some() {
                    break;
                }
            }

            match best {
                Some((cost, level, site)) => {
                    mgr.place(node, level, site);
                    let nd = &mgr.network.nodes[node];
                    if nd.left != old_left || nd.bottom != old_bottom {
                        shifted += 1;
                        total_disp += cost;
                    }
                }
                None => bail!(
                    "Unable to legalize cell {}.",
                    mgr.network.nodes[node].name
                ),
            }
        }

        if shifted > 0 {
            warn!(
                "Legalization shifted {} cells (total displacement {}); \
                 the incoming placement was not legal.",
                shifted, total_disp
            );
        } else {
            info!("Legalization made no changes.");
        }
        Ok(())
    }
}

/// Nearest acceptable site to `desired` on one level, or `None` when the
/// level has no room for the cell.
fn nearest_site(mgr: &DetailedMgr, node: usize, level: usize, desired: i32) -> Option<i32> {
    let num_sites = mgr.grid.num_sites as i32;
    for ds in 0..num_sites {
        for site in [desired - ds, desired + ds] {
            if site < 0 || site >= num_sites {
                continue;
            }
            if ds > 0 && site == desired {
                continue;
            }
            if mgr.check_move(node, level, site) {
                return Some(site);
            }
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::import::import;
    use crate::testlib::small_db;

    #[test]
    fn legal_input_is_untouched() {
        let mut db = small_db();
        let mut imp = import(&mut db).expect("import");
        let before: Vec<(i32, i32)> = imp.network.nodes.iter().map(|n| (n.left, n.bottom)).collect();
        let mut mgr = DetailedMgr::new(&imp.arch, &mut imp.network, &mut imp.grid, &imp.drc);
        ShiftLegalizer.legalize(&mut mgr).expect("legalize");
        let after: Vec<(i32, i32)> = mgr.network.nodes.iter().map(|n| (n.left, n.bottom)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn overlapping_input_is_separated() {
        let mut db = small_db();
        // Pile two movable cells onto the same spot.
        let inv0 = db.instances.iter().position(|i| i.name == "inv0").unwrap();
        let inv1 = db.instances.iter().position(|i| i.name == "inv1").unwrap();
        db.instances[inv1].x = db.instances[inv0].x;
        db.instances[inv1].y = db.instances[inv0].y;

        let mut imp = import(&mut db).expect("import");
        let mut mgr = DetailedMgr::new(&imp.arch, &mut imp.network, &mut imp.grid, &imp.drc);
        ShiftLegalizer.legalize(&mut mgr).expect("legalize");
        crate::testlib::assert_legal(&mgr);
    }

    #[test]
    fn sites_are_aligned_to_pitch_not_width() {
        let mut db = small_db();
        // Rows whose site pitch exceeds the site width: legal X positions
        // are origin + i * spacing, so width multiples like 40 are not
        // acceptable sites.
        for row in &mut db.rows {
            row.site_spacing = 12;
        }

        let mut imp = import(&mut db).expect("import");
        let mut mgr = DetailedMgr::new(&imp.arch, &mut imp.network, &mut imp.grid, &imp.drc);
        ShiftLegalizer.legalize(&mut mgr).expect("legalize");
        for node in mgr.network.nodes.iter().filter(|n| n.is_movable()) {
            assert_eq!(
                (node.left - mgr.grid.xmin) % 12,
                0,
                "{} at x={} is off the 12-unit site pitch",
                node.name,
                node.left
            );
        }
        crate::testlib::assert_legal(&mgr);
    }

    #[test]
    fn misaligned_input_is_snapped_to_sites() {
        let mut db = small_db();
        let inv2 = db
            .instances
            .iter()
            .position(|i| i.name == "inv2")
            .unwrap();
        db.instances[inv2].x += 3;
        db.instances[inv2].y += 40;

        let mut imp = import(&mut db).expect("import");
        let mut mgr = DetailedMgr::new(&imp.arch, &mut imp.network, &mut imp.grid, &imp.drc);
        ShiftLegalizer.legalize(&mut mgr).expect("legalize");
        crate::testlib::assert_legal(&mgr);
    }
}
