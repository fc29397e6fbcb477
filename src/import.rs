//! Builds the network, architecture and grid from the external database.
//! Entities are counted before allocation and the realized totals are
//! validated afterwards; a mismatch is an internal-consistency failure, not
//! a data problem, and aborts the run.

use std::collections::HashSet;

use anyhow::{bail, ensure, Result};
use log::{info, warn};

use crate::arch::{Architecture, RailPower, Row, SYMMETRY_ROT90, SYMMETRY_X, SYMMETRY_Y};
use crate::db::{mterm_bbox, Database, Orient, SigType, SiteClass};
use crate::drc::{PlacementDrc, DEFAULT_EDGE_TYPE};
use crate::geom::{boundary_segment, difference, Rect, Side, ALL_SIDES};
use crate::grid::Grid;
use crate::network::{MasterEdge, Network, NodeKind};

/// Rows excluded because their site height exceeds the design minimum,
/// grouped by offending height. Formatting is left to the log site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedRows {
    pub height: i32,
    pub sites: Vec<String>,
}

/// Everything one optimization run owns. The side tables map external
/// database ids to arena indices and are handed to the orchestrator as
/// read-only views; entities never hold them.
pub struct Imported {
    pub network: Network,
    pub arch: Architecture,
    pub grid: Grid,
    pub drc: PlacementDrc,
    pub node_of_inst: Vec<Option<usize>>,
    pub node_of_bterm: Vec<Option<usize>>,
    pub model_of_master: Vec<Option<usize>>,
    pub skipped_rows: Vec<SkippedRows>,
}

/// Per-master rail classification derived from its supply terminals.
struct MasterPower {
    top: RailPower,
    bottom: RailPower,
}

pub fn import(db: &mut Database) -> Result<Imported> {
    info!("Importing netlist into detailed improver.");

    let (master_powers, pwr_layers, gnd_layers) = setup_master_powers(db);
    let drc = PlacementDrc::new(db);

    let mut network = Network::new();
    let mut model_of_master: Vec<Option<usize>> = vec![None; db.masters.len()];
    let (node_of_inst, node_of_bterm) = create_network(
        db,
        &master_powers,
        &drc,
        &mut network,
        &mut model_of_master,
    )?;

    let mut arch = Architecture::new();
    let skipped_rows = create_architecture(db, &mut arch, &pwr_layers, &gnd_layers, &network);
    for skip in &skipped_rows {
        warn!(
            "Skipping rows with sites {:?}: site height {} exceeds the single-row height.",
            skip.sites, skip.height
        );
    }

    let grid = Grid::build(&arch);

    init_padding(db, &mut arch, &node_of_inst);
    setup_placement_groups(db, &mut arch, &mut network, &node_of_inst);

    Ok(Imported {
        network,
        arch,
        grid,
        drc,
        node_of_inst,
        node_of_bterm,
        model_of_master,
        skipped_rows,
    })
}

/// Classify each master's supply terminals to learn which layers carry each
/// supply and which rail sits on the master's geometric top and bottom. A
/// master with both supplies present gets a definite classification;
/// otherwise it is unknown on both boundaries.
fn setup_master_powers(
    db: &Database,
) -> (Vec<MasterPower>, HashSet<String>, HashSet<String>) {
    let mut pwr_layers = HashSet::new();
    let mut gnd_layers = HashSet::new();
    let mut powers = Vec::with_capacity(db.masters.len());
    for master in &db.masters {
        let mut max_pwr = i32::MIN;
        let mut min_pwr = i32::MAX;
        let mut max_gnd = i32::MIN;
        let mut min_gnd = i32::MAX;
        let mut has_vdd = false;
        let mut has_gnd = false;
        for mterm in &master.mterms {
            match mterm.sig_type {
                SigType::Power => {
                    has_vdd = true;
                    for b in &mterm.boxes {
                        let y = b.rect.y_center();
                        min_pwr = min_pwr.min(y);
                        max_pwr = max_pwr.max(y);
                        pwr_layers.insert(b.layer.clone());
                    }
                }
                SigType::Ground => {
                    has_gnd = true;
                    for b in &mterm.boxes {
                        let y = b.rect.y_center();
                        min_gnd = min_gnd.min(y);
                        max_gnd = max_gnd.max(y);
                        gnd_layers.insert(b.layer.clone());
                    }
                }
                _ => {}
            }
        }
        let (top, bottom) = if has_vdd && has_gnd {
            (
                if max_pwr > max_gnd {
                    RailPower::Vdd
                } else {
                    RailPower::Vss
                },
                if min_pwr < min_gnd {
                    RailPower::Vdd
                } else {
                    RailPower::Vss
                },
            )
        } else {
            (RailPower::Unknown, RailPower::Unknown)
        };
        powers.push(MasterPower { top, bottom });
    }
    (powers, pwr_layers, gnd_layers)
}

fn min_site_height(db: &Database) -> i32 {
    db.rows
        .iter()
        .filter(|r| r.site_class != SiteClass::Pad)
        .map(|r| r.site_height)
        .min()
        .unwrap_or(0)
}

/// Lazily build the placement model for a master: its boundary box and,
/// when a spacing table is configured, its typed edge segments plus the
/// DEFAULT-typed remainder of each side. Filler masters carry no edge
/// typing at all.
fn build_master(
    db: &Database,
    master_idx: usize,
    drc: &PlacementDrc,
    network: &mut Network,
    model_of_master: &mut [Option<usize>],
) -> Option<usize> {
    if let Some(model) = model_of_master[master_idx] {
        return Some(model);
    }
    let master = &db.masters[master_idx];
    let bbox = Rect::new(0, 0, master.width, master.height);

    if !drc.has_cell_edge_spacing_table() {
        let model = network.create_master();
        network.masters[model].bbox = bbox;
        model_of_master[master_idx] = Some(model);
        return Some(model);
    }
    if master.core_spacer {
        return None;
    }

    let model = network.create_master();
    network.masters[model].bbox = bbox;
    model_of_master[master_idx] = Some(model);

    let min_row_height = min_site_height(db);
    let num_rows = if min_row_height > 0 {
        ((master.height as f64 / min_row_height as f64).round() as i32).max(1)
    } else {
        1
    };

    let mut typed_segs: Vec<(Side, Vec<Rect>)> =
        ALL_SIDES.iter().map(|&s| (s, Vec::new())).collect();
    for edge in &master.edge_types {
        let mut edge_rect = boundary_segment(&bbox, edge.side);
        match edge.side {
            Side::Top | Side::Bottom => {
                if let (Some(begin), Some(end)) = (edge.range_begin, edge.range_end) {
                    let xlo = edge_rect.xlo;
                    edge_rect.xlo = xlo + begin;
                    edge_rect.xhi = xlo + end;
                }
            }
            Side::Left | Side::Right => {
                let row_height = edge_rect.dy() / num_rows;
                let half_row_height = row_height / 2;
                if let Some(cell_row) = edge.cell_row {
                    edge_rect.ylo += (cell_row - 1) * row_height;
                    edge_rect.yhi = edge_rect.yhi.min(edge_rect.ylo + row_height);
                } else if let Some(half_row) = edge.half_row {
                    edge_rect.ylo += (half_row - 1) * half_row_height;
                    edge_rect.yhi = edge_rect.yhi.min(edge_rect.ylo + half_row_height);
                }
            }
        }
        typed_segs
            .iter_mut()
            .find(|(s, _)| *s == edge.side)
            .map(|(_, v)| v.push(edge_rect));
        // Only edge types registered in the spacing table participate.
        if let Some(type_idx) = drc.edge_type_idx(&edge.edge_type) {
            network.masters[model].edges.push(MasterEdge {
                edge_type: type_idx,
                rect: edge_rect,
            });
        }
    }

    if let Some(default_idx) = drc.edge_type_idx(DEFAULT_EDGE_TYPE) {
        for (side, segs) in &typed_segs {
            let parent = boundary_segment(&bbox, *side);
            for seg in difference(&parent, segs) {
                network.masters[model].edges.push(MasterEdge {
                    edge_type: default_idx,
                    rect: seg,
                });
            }
        }
    }
    Some(model)
}

type SideTables = (Vec<Option<usize>>, Vec<Option<usize>>);

fn create_network(
    db: &mut Database,
    master_powers: &[MasterPower],
    drc: &PlacementDrc,
    network: &mut Network,
    model_of_master: &mut [Option<usize>],
) -> Result<SideTables> {
    let core = db.core;

    // Enumerate placeable instances sorted by name for determinism.
    let mut insts: Vec<usize> = (0..db.instances.len())
        .filter(|&i| db.masters[db.instances[i].master].auto_placeable)
        .collect();
    insts.sort_by(|&a, &b| db.instances[a].name.cmp(&db.instances[b].name));

    // Counting pass; the network is allocated to exact size.
    let n_nodes = insts.len();
    let mut n_edges = 0usize;
    let mut n_pins = 0usize;
    for net in &db.nets {
        if net.sig_type.is_supply() {
            continue;
        }
        n_edges += 1;
        n_pins += net
            .iterms
            .iter()
            .filter(|it| db.masters[db.instances[it.inst].master].auto_placeable)
            .count();
        n_pins += net.bterms.len();
    }
    let n_terminals = db
        .bterms
        .iter()
        .filter(|bt| {
            bt.net
                .map(|n| !db.nets[n].sig_type.is_supply())
                .unwrap_or(false)
        })
        .count();

    let mut n_blockages = 0usize;
    for blockage in &db.blockages {
        if !blockage.soft {
            let mut rect = blockage.rect;
            rect.xlo -= core.xlo;
            rect.xhi -= core.xlo;
            rect.ylo -= core.ylo;
            rect.yhi -= core.ylo;
            network.create_blockage(rect);
            n_blockages += 1;
        }
    }

    info!(
        "Creating network with {} cells, {} terminals, {} edges, {} pins, and {} blockages.",
        n_nodes, n_terminals, n_edges, n_pins, n_blockages
    );

    // Return movable instances to the reference orientation so subsequent
    // geometric reasoning is orientation-normalized. The lower-left corner
    // is preserved.
    for &i in &insts {
        if !db.instances[i].fixed {
            db.instances[i].orient = Orient::R0;
        }
    }

    let mut node_of_inst: Vec<Option<usize>> = vec![None; db.instances.len()];
    let mut node_of_bterm: Vec<Option<usize>> = vec![None; db.bterms.len()];

    let mut n = 0usize;
    for &i in &insts {
        let inst = &db.instances[i];
        let master = &db.masters[inst.master];
        let node = network.create_node(inst.name.clone(), NodeKind::Cell);
        node_of_inst[i] = Some(node);

        let model = build_master(db, db.instances[i].master, drc, network, model_of_master);
        let inst = &db.instances[i];
        let master_power = &master_powers[inst.master];
        let nd = &mut network.nodes[node];
        nd.master = model;
        nd.fixed = inst.fixed;
        nd.orient = Orient::R0;
        nd.width = master.width;
        nd.height = master.height;
        nd.orig_left = inst.x - core.xlo;
        nd.orig_bottom = inst.y - core.ylo;
        nd.left = nd.orig_left;
        nd.bottom = nd.orig_bottom;
        nd.top_power = master_power.top;
        nd.bottom_power = master_power.bottom;
        n += 1;
    }
    for (b, bterm) in db.bterms.iter().enumerate() {
        let eligible = bterm
            .net
            .map(|net| !db.nets[net].sig_type.is_supply())
            .unwrap_or(false);
        if !eligible {
            continue;
        }
        let node = network.create_node(bterm.name.clone(), NodeKind::Terminal);
        node_of_bterm[b] = Some(node);
        let nd = &mut network.nodes[node];
        nd.fixed = true;
        nd.orient = Orient::R0;
        nd.width = bterm.rect.dx();
        // Boundary terminals are treated as zero-height; the upstream
        // derivation of this value is ambiguous (see DESIGN.md).
        nd.height = 0;
        nd.orig_left = bterm.rect.xlo - core.xlo;
        nd.orig_bottom = bterm.rect.ylo - core.ylo;
        nd.left = nd.orig_left;
        nd.bottom = nd.orig_bottom;
        n += 1;
    }
    if n != n_nodes + n_terminals {
        bail!(
            "Unexpected total node count. Expected {}, but got {}",
            n_nodes + n_terminals,
            n
        );
    }

    // Wire up edges and pins.
    let mut e = 0usize;
    let mut p = 0usize;
    for net in &db.nets {
        if net.sig_type.is_supply() {
            continue;
        }
        let edge = network.create_edge(net.name.clone());

        for iterm in &net.iterms {
            let inst = &db.instances[iterm.inst];
            let master = &db.masters[inst.master];
            if !master.auto_placeable {
                continue;
            }
            let node = match node_of_inst[iterm.inst] {
                Some(node) => node,
                None => bail!("Could not find node for instance while connecting pins."),
            };
            ensure!(
                network.nodes[node].id == node && network.edges[edge].id == edge,
                "Improper node indexing while connecting pins."
            );
            let pin = network.create_pin(node, edge);
            // Offsets are re-based from the database's corner-origin
            // convention to the center-based convention used internally.
            let tr = mterm_bbox(&master.mterms[iterm.mterm]);
            let pr = &mut network.pins[pin];
            pr.offset_x = tr.x_center() - master.width / 2;
            pr.offset_y = tr.y_center() - master.height / 2;
            pr.width = tr.dx();
            pr.height = tr.dy();
            pr.layer = 0;
            p += 1;
        }
        for &bt in &net.bterms {
            let node = match node_of_bterm[bt] {
                Some(node) => node,
                None => bail!("Could not find node for terminal while connecting pins."),
            };
            ensure!(
                network.nodes[node].id == node && network.edges[edge].id == edge,
                "Improper terminal indexing while connecting pins."
            );
            // Boundary-terminal pins carry no offset or size.
            network.create_pin(node, edge);
            p += 1;
        }
        e += 1;
    }
    if e != n_edges {
        bail!("Unexpected total edge count. Expected {}, but got {}", n_edges, e);
    }
    if p != n_pins {
        bail!("Unexpected total pin count. Expected {}, but got {}", n_pins, p);
    }

    info!(
        "Network stats: inst {}, edges {}, pins {}",
        network.nodes.len(),
        network.edges.len(),
        network.pins.len()
    );
    Ok((node_of_inst, node_of_bterm))
}

fn create_architecture(
    db: &Database,
    arch: &mut Architecture,
    pwr_layers: &HashSet<String>,
    gnd_layers: &HashSet<String>,
    network: &Network,
) -> Vec<SkippedRows> {
    let core = db.core;
    let min_height = db
        .rows
        .iter()
        .filter(|r| r.site_class != SiteClass::Pad)
        .map(|r| r.site_height)
        .min()
        .unwrap_or(0);

    let mut skipped: Vec<SkippedRows> = Vec::new();
    for row in &db.rows {
        if row.site_class == SiteClass::Pad || !row.horizontal {
            continue;
        }
        if row.site_height > min_height {
            match skipped.iter_mut().find(|s| s.height == row.site_height) {
                Some(s) => {
                    if !s.sites.contains(&row.site_name) {
                        s.sites.push(row.site_name.clone());
                    }
                }
                None => skipped.push(SkippedRows {
                    height: row.site_height,
                    sites: vec![row.site_name.clone()],
                }),
            }
            continue;
        }
        let mut symmetry = 0u8;
        if row.sym_x {
            symmetry |= SYMMETRY_X;
        }
        if row.sym_y {
            symmetry |= SYMMETRY_Y;
        }
        if row.sym_r90 {
            symmetry |= SYMMETRY_ROT90;
        }
        arch.create_row(Row {
            origin_x: row.origin_x - core.xlo,
            bottom: row.origin_y - core.ylo,
            site_width: row.site_width,
            site_spacing: row.site_spacing,
            num_sites: row.site_count,
            height: row.site_height,
            orient: row.orient,
            symmetry,
            top_power: RailPower::Unknown,
            bottom_power: RailPower::Unknown,
        });
    }

    arch.compute_bounds();
    arch.clip_rows();
    arch.assign_row_power(db, pwr_layers, gnd_layers);
    arch.post_process(network);
    skipped
}

/// Derive per-node left/right padding in site widths from the database's
/// per-instance padding. Skipped entirely when no non-pad site exists.
fn init_padding(db: &Database, arch: &mut Architecture, node_of_inst: &[Option<usize>]) {
    let site_width = match db
        .rows
        .iter()
        .find(|r| r.site_class != SiteClass::Pad)
    {
        Some(row) => row.site_width,
        None => return,
    };
    arch.use_padding = true;
    for (i, inst) in db.instances.iter().enumerate() {
        if let Some(node) = node_of_inst[i] {
            arch.set_padding(node, inst.pad_left * site_width, inst.pad_right * site_width);
        }
    }
}

/// Create the default region plus one region per database group, with every
/// boundary rectangle clipped to the architecture bounds. The first region a
/// cell is assigned to wins.
fn setup_placement_groups(
    db: &Database,
    arch: &mut Architecture,
    network: &mut Network,
    node_of_inst: &[Option<usize>],
) {
    let bounds = Rect::new(arch.xmin, arch.ymin, arch.xmax, arch.ymax);
    arch.create_region(vec![bounds], bounds);

    for group in &db.groups {
        let rects = match &group.region {
            Some(rects) => rects,
            None => continue,
        };
        let mut clipped = Vec::with_capacity(rects.len());
        let mut boundary = Rect::merge_init();
        for rect in rects {
            let r = Rect::new(
                (rect.xlo - db.core.xlo).max(bounds.xlo),
                (rect.ylo - db.core.ylo).max(bounds.ylo),
                (rect.xhi - db.core.xlo).min(bounds.xhi),
                (rect.yhi - db.core.ylo).min(bounds.yhi),
            );
            boundary.merge(&r);
            clipped.push(r);
        }
        let region = arch.create_region(clipped, boundary);
        for &inst in &group.insts {
            if let Some(node) = node_of_inst[inst] {
                if network.nodes[node].group == 0 {
                    network.nodes[node].group = region;
                }
            }
        }
    }
    info!("Number of regions is {}", arch.regions.len());
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testlib::small_db;

    #[test]
    fn import_count_invariant() {
        let mut db = small_db();
        let imported = import(&mut db).expect("import");
        let placeable = db
            .instances
            .iter()
            .filter(|i| db.masters[i.master].auto_placeable)
            .count();
        let terminals = db
            .bterms
            .iter()
            .filter(|bt| {
                bt.net
                    .map(|n| !db.nets[n].sig_type.is_supply())
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(imported.network.nodes.len(), placeable + terminals);
        let n_edges = db
            .nets
            .iter()
            .filter(|n| !n.sig_type.is_supply())
            .count();
        assert_eq!(imported.network.edges.len(), n_edges);
    }

    #[test]
    fn import_is_deterministic_and_sorted_by_name() {
        let mut db = small_db();
        let imported = import(&mut db).expect("import");
        let names: Vec<&str> = imported
            .network
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Cell)
            .map(|n| n.name.as_str())
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn pin_offsets_are_center_based() {
        let mut db = small_db();
        let imported = import(&mut db).expect("import");
        // Every pin offset must fit within half the owning cell's bounding
        // box, which is only true for center-based offsets.
        for pin in &imported.network.pins {
            let node = &imported.network.nodes[pin.node];
            if node.kind == NodeKind::Cell {
                assert!(pin.offset_x.abs() <= node.width / 2 + 1);
                assert!(pin.offset_y.abs() <= node.height / 2 + 1);
            } else {
                assert_eq!((pin.offset_x, pin.offset_y), (0, 0));
            }
        }
    }

    #[test]
    fn oversized_rows_are_skipped_with_aggregated_warning() {
        let mut db = small_db();
        let mut tall = db.rows[0].clone();
        tall.site_name = "tall".into();
        tall.site_height = db.rows[0].site_height * 2;
        tall.origin_y = db.rows.iter().map(|r| r.origin_y).max().unwrap()
            + db.rows[0].site_height;
        db.rows.push(tall.clone());
        db.rows.push(tall.clone());

        let imported = import(&mut db).expect("import");
        assert_eq!(
            imported.skipped_rows,
            vec![SkippedRows {
                height: db.rows[0].site_height * 2,
                sites: vec!["tall".to_string()],
            }]
        );
        // Only the single-height rows survive.
        assert_eq!(imported.arch.rows.len(), db.rows.len() - 2);
    }

    #[test]
    fn pad_rows_do_not_affect_edge_row_subdivision() {
        use crate::db::DbMasterEdge;

        let mut db = small_db();
        // A short pad-class row must not shrink the row height that
        // LEFT/RIGHT edge declarations are subdivided against.
        let mut pad = db.rows[0].clone();
        pad.site_name = "io".into();
        pad.site_class = SiteClass::Pad;
        pad.site_height = 50;
        db.rows.push(pad);

        let tall = db
            .masters
            .iter()
            .position(|m| m.name == "TALL")
            .unwrap();
        db.masters[tall].edge_types.push(DbMasterEdge {
            edge_type: "A".into(),
            side: Side::Left,
            range_begin: None,
            range_end: None,
            cell_row: Some(1),
            half_row: None,
        });

        let imported = import(&mut db).expect("import");
        let node = imported
            .network
            .nodes
            .iter()
            .find(|n| n.name == "tall0")
            .expect("tall cell");
        let model = &imported.network.masters[node.master.expect("model")];
        let type_a = imported.drc.edge_type_idx("A").unwrap();
        let edge = model
            .edges
            .iter()
            .find(|e| e.edge_type == type_a && e.rect.xlo == 0)
            .expect("typed left edge");
        // First cell row of a double-height master on 100-unit core rows.
        assert_eq!((edge.rect.ylo, edge.rect.yhi), (0, 100));
    }

    #[test]
    fn multi_height_master_gets_definite_rails() {
        let mut db = small_db();
        let imported = import(&mut db).expect("import");
        let tall = imported
            .network
            .nodes
            .iter()
            .find(|n| n.name == "tall0")
            .expect("tall cell");
        assert_eq!(tall.bottom_power, RailPower::Vss);
        assert_eq!(tall.top_power, RailPower::Vss);
    }

    #[test]
    fn default_edge_segments_fill_untyped_sides() {
        let mut db = small_db();
        let imported = import(&mut db).expect("import");
        // Every master model must carry at least the four DEFAULT side
        // segments when the spacing table is configured.
        let default_idx = imported.drc.edge_type_idx(DEFAULT_EDGE_TYPE).unwrap();
        for model in &imported.network.masters {
            assert!(model
                .edges
                .iter()
                .any(|e| e.edge_type == default_idx));
        }
    }
}
