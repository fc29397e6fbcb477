//! Shared fixtures for unit tests. `small_db` is a complete little block:
//! three single-height rows with alternating rails, a handful of inverters,
//! one double-height cell, a fixed cell, a hard blockage, a region group and
//! an edge-spacing table, so most legality rules have something to bite on.

use crate::db::{
    Database, DbBlockage, DbBTerm, DbGroup, DbInstance, DbITerm, DbMaster, DbMasterEdge,
    DbMTerm, DbNet, DbRow, DbSBox, EdgeSpacingTable, MTermBox, Orient, SigType, SiteClass,
};
use crate::detailed::DetailedMgr;
use crate::geom::{Rect, Side};
use crate::grid::SiteState;

const LAYER: &str = "M1";

fn mterm(name: &str, sig_type: SigType, boxes: &[Rect]) -> DbMTerm {
    DbMTerm {
        name: name.to_string(),
        sig_type,
        boxes: boxes
            .iter()
            .map(|&rect| MTermBox {
                layer: LAYER.to_string(),
                rect,
            })
            .collect(),
    }
}

fn rail(rect: Rect) -> DbSBox {
    DbSBox {
        layer: LAYER.to_string(),
        rect,
        via: false,
        horizontal: true,
        routed: true,
    }
}

fn row(origin_y: i32) -> DbRow {
    DbRow {
        site_name: "core".to_string(),
        site_class: SiteClass::Core,
        horizontal: true,
        origin_x: 0,
        origin_y,
        site_width: 10,
        site_spacing: 10,
        site_count: 100,
        site_height: 100,
        orient: Orient::R0,
        sym_x: true,
        sym_y: false,
        sym_r90: false,
    }
}

fn inst(name: &str, master: usize, x: i32, y: i32, fixed: bool, pad_right: i32) -> DbInstance {
    DbInstance {
        name: name.to_string(),
        master,
        x,
        y,
        orient: Orient::R0,
        fixed,
        pad_left: 0,
        pad_right,
    }
}

fn net(name: &str, iterms: &[(usize, usize)], bterms: &[usize]) -> DbNet {
    DbNet {
        name: name.to_string(),
        sig_type: SigType::Signal,
        special: false,
        iterms: iterms
            .iter()
            .map(|&(inst, mterm)| DbITerm { inst, mterm })
            .collect(),
        bterms: bterms.to_vec(),
        swires: Vec::new(),
    }
}

/// Mterm order on every master: A = 0, Z = 1, then the supplies.
const A: usize = 0;
const Z: usize = 1;

pub(crate) fn small_db() -> Database {
    let inv = DbMaster {
        name: "INV".to_string(),
        width: 20,
        height: 100,
        core_spacer: false,
        auto_placeable: true,
        mterms: vec![
            mterm("A", SigType::Signal, &[Rect::new(2, 40, 6, 60)]),
            mterm("Z", SigType::Signal, &[Rect::new(14, 40, 18, 60)]),
            mterm("VDD", SigType::Power, &[Rect::new(0, 95, 20, 105)]),
            mterm("VSS", SigType::Ground, &[Rect::new(0, -5, 20, 5)]),
        ],
        edge_types: vec![DbMasterEdge {
            edge_type: "A".to_string(),
            side: Side::Right,
            range_begin: None,
            range_end: None,
            cell_row: None,
            half_row: None,
        }],
    };
    // Double-height cell: ground rails on both boundaries, power through the
    // middle, so it only fits rows that start on a VSS rail.
    let tall = DbMaster {
        name: "TALL".to_string(),
        width: 20,
        height: 200,
        core_spacer: false,
        auto_placeable: true,
        mterms: vec![
            mterm("A", SigType::Signal, &[Rect::new(2, 90, 6, 110)]),
            mterm("Z", SigType::Signal, &[Rect::new(14, 90, 18, 110)]),
            mterm("VDD", SigType::Power, &[Rect::new(0, 95, 20, 105)]),
            mterm(
                "VSS",
                SigType::Ground,
                &[Rect::new(0, -5, 20, 5), Rect::new(0, 195, 20, 205)],
            ),
        ],
        edge_types: Vec::new(),
    };
    let fill = DbMaster {
        name: "FILL".to_string(),
        width: 10,
        height: 100,
        core_spacer: true,
        auto_placeable: true,
        mterms: Vec::new(),
        edge_types: Vec::new(),
    };
    let masters = vec![inv, tall, fill];
    const INV: usize = 0;
    const TALL: usize = 1;

    // Deliberately unsorted so importer ordering is observable.
    let instances = vec![
        inst("inv2", INV, 100, 100, false, 0),
        inst("inv0", INV, 0, 0, false, 0),
        inst("tall0", TALL, 200, 0, false, 0),
        inst("invfix", INV, 500, 0, true, 0),
        inst("inv1", INV, 40, 0, false, 1),
    ];
    const INV2: usize = 0;
    const INV0: usize = 1;
    const TALL0: usize = 2;
    const INVFIX: usize = 3;
    const INV1: usize = 4;

    let mut nets = vec![
        net("n1", &[(INV0, Z), (INV1, A)], &[]),
        net("n2", &[(INV1, Z), (INV2, A)], &[0]),
        net("n3", &[(INV2, Z), (TALL0, A)], &[]),
        net("n4", &[(TALL0, Z), (INVFIX, A)], &[]),
    ];
    nets.push(DbNet {
        name: "VDD".to_string(),
        sig_type: SigType::Power,
        special: true,
        iterms: Vec::new(),
        bterms: Vec::new(),
        swires: vec![rail(Rect::new(0, 95, 1000, 105)), rail(Rect::new(0, 295, 1000, 305))],
    });
    nets.push(DbNet {
        name: "VSS".to_string(),
        sig_type: SigType::Ground,
        special: true,
        iterms: Vec::new(),
        bterms: Vec::new(),
        swires: vec![rail(Rect::new(0, -5, 1000, 5)), rail(Rect::new(0, 195, 1000, 205))],
    });

    Database {
        core: Rect::new(0, 0, 1000, 300),
        masters,
        instances,
        nets,
        bterms: vec![DbBTerm {
            name: "out".to_string(),
            net: Some(1),
            rect: Rect::new(990, 140, 1000, 160),
        }],
        rows: vec![row(0), row(100), row(200)],
        groups: vec![DbGroup {
            name: "left".to_string(),
            region: Some(vec![Rect::new(0, 0, 400, 300)]),
            insts: vec![INV0],
        }],
        blockages: vec![
            DbBlockage {
                rect: Rect::new(700, 0, 750, 100),
                soft: false,
            },
            DbBlockage {
                rect: Rect::new(0, 0, 10, 10),
                soft: true,
            },
        ],
        edge_spacing: Some(EdgeSpacingTable {
            types: vec!["DEFAULT".to_string(), "A".to_string()],
            spacing: vec![vec![0, 0], vec![0, 40]],
        }),
    }
}

/// Assert the manager's state is a legal placement: every movable cell is
/// grid-aligned, inside its region, and the padded footprints agree with the
/// occupancy without overlapping each other.
pub(crate) fn assert_legal(mgr: &DetailedMgr) {
    let grid = &*mgr.grid;
    for node in &mgr.network.nodes {
        if !node.is_movable() {
            continue;
        }
        assert_eq!(
            (node.left - grid.xmin) % grid.site_spacing,
            0,
            "{} is not site aligned",
            node.name
        );
        assert_eq!(
            (node.bottom - grid.ymin) % grid.row_height,
            0,
            "{} is not row aligned",
            node.name
        );
        let footprint = Rect::new(node.left, node.bottom, node.right(), node.top());
        assert!(
            mgr.arch.regions[node.group].contains(&footprint),
            "{} escaped its region",
            node.name
        );

        let level = mgr.node_level(node.id);
        let site = mgr.node_site(node.id) as usize;
        let sites = grid.sites_for(node.width);
        let levels = mgr.height_levels(node.id);
        let (pad_left, pad_right) = mgr.arch.padding(node.id);
        let pad_left = (pad_left / grid.site_width) as usize;
        let pad_right = (pad_right / grid.site_width) as usize;
        assert!(site + sites <= grid.num_sites, "{} off grid", node.name);
        assert!(level + levels <= grid.num_levels, "{} off grid", node.name);
        for l in level..level + levels {
            // The padded span is painted with the owner, so padding sites
            // inside the grid must belong to this node as well.
            let s0 = site.saturating_sub(pad_left);
            let s1 = (site + sites + pad_right).min(grid.num_sites);
            for s in s0..s1 {
                assert_eq!(
                    grid.get(l, s),
                    SiteState::Occupied(node.id),
                    "occupancy for {} out of sync at ({}, {})",
                    node.name,
                    l,
                    s
                );
            }
        }
    }
}
