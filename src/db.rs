//! Data model of the external layout database, specified only at the
//! interface the importer and write-back consume. The binary serializes this
//! as JSON; inside one run it is read in full before legalization and
//! written in full afterwards.

use serde::{Deserialize, Serialize};

use crate::geom::{Rect, Side};

/// Signal classification of a net or a master terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigType {
    Signal,
    Clock,
    Power,
    Ground,
}

impl SigType {
    pub fn is_supply(&self) -> bool {
        matches!(self, SigType::Power | SigType::Ground)
    }
}

/// Placement orientation. R0 is the reference orientation; geometric
/// reasoning inside the optimizer is normalized to it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orient {
    #[default]
    R0,
    R180,
    MirrorX,
    MirrorY,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteClass {
    Core,
    Pad,
}

/// A rectangle of terminal geometry on a routing layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MTermBox {
    pub layer: String,
    pub rect: Rect,
}

/// A terminal of a master, with its signal type and physical geometry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DbMTerm {
    pub name: String,
    pub sig_type: SigType,
    pub boxes: Vec<MTermBox>,
}

/// A typed boundary edge declared on a master. TOP/BOTTOM edges may carry an
/// absolute X sub-range; LEFT/RIGHT edges may instead name a row or half-row
/// index subdividing the master's height.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DbMasterEdge {
    pub edge_type: String,
    pub side: Side,
    pub range_begin: Option<i32>,
    pub range_end: Option<i32>,
    pub cell_row: Option<i32>,
    pub half_row: Option<i32>,
}

/// A cell template.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DbMaster {
    pub name: String,
    pub width: i32,
    pub height: i32,
    /// Filler masters are excluded from edge typing.
    pub core_spacer: bool,
    /// Whether instances of this master may be moved by the placer at all.
    pub auto_placeable: bool,
    pub mterms: Vec<DbMTerm>,
    pub edge_types: Vec<DbMasterEdge>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DbInstance {
    pub name: String,
    pub master: usize,
    /// Lower-left corner, in absolute database coordinates.
    pub x: i32,
    pub y: i32,
    pub orient: Orient,
    pub fixed: bool,
    /// Required clearance in site widths on either side.
    pub pad_left: i32,
    pub pad_right: i32,
}

/// An instance terminal on a net.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DbITerm {
    pub inst: usize,
    pub mterm: usize,
}

/// A special-wire box, used to locate the power rails.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DbSBox {
    pub layer: String,
    pub rect: Rect,
    pub via: bool,
    pub horizontal: bool,
    pub routed: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DbNet {
    pub name: String,
    pub sig_type: SigType,
    pub special: bool,
    pub iterms: Vec<DbITerm>,
    pub bterms: Vec<usize>,
    pub swires: Vec<DbSBox>,
}

/// A boundary terminal of the block.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DbBTerm {
    pub name: String,
    pub net: Option<usize>,
    pub rect: Rect,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DbRow {
    pub site_name: String,
    pub site_class: SiteClass,
    pub horizontal: bool,
    pub origin_x: i32,
    pub origin_y: i32,
    pub site_width: i32,
    pub site_spacing: i32,
    pub site_count: i32,
    pub site_height: i32,
    pub orient: Orient,
    pub sym_x: bool,
    pub sym_y: bool,
    pub sym_r90: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DbGroup {
    pub name: String,
    /// Region boundary rectangles, absent for groups without a region.
    pub region: Option<Vec<Rect>>,
    pub insts: Vec<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DbBlockage {
    pub rect: Rect,
    pub soft: bool,
}

/// Pairwise minimum spacing between typed cell edges, indexed by edge type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeSpacingTable {
    pub types: Vec<String>,
    /// `spacing[a][b]` in layout units; symmetric.
    pub spacing: Vec<Vec<i32>>,
}

/// The block as the external database presents it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Database {
    pub core: Rect,
    pub masters: Vec<DbMaster>,
    pub instances: Vec<DbInstance>,
    pub nets: Vec<DbNet>,
    pub bterms: Vec<DbBTerm>,
    pub rows: Vec<DbRow>,
    pub groups: Vec<DbGroup>,
    pub blockages: Vec<DbBlockage>,
    pub edge_spacing: Option<EdgeSpacingTable>,
}

impl Database {
    /// Half-perimeter wirelength over all non-supply nets, evaluated from the
    /// database's own instance locations and terminal geometry.
    pub fn hpwl(&self) -> i64 {
        let mut total: i64 = 0;
        for net in &self.nets {
            if net.sig_type.is_supply() {
                continue;
            }
            let mut bbox = Rect::merge_init();
            let mut pins = 0usize;
            for iterm in &net.iterms {
                let inst = &self.instances[iterm.inst];
                let mterm = &self.masters[inst.master].mterms[iterm.mterm];
                let tr = mterm_bbox(mterm);
                let p = Rect::new(
                    inst.x + tr.x_center(),
                    inst.y + tr.y_center(),
                    inst.x + tr.x_center(),
                    inst.y + tr.y_center(),
                );
                bbox.merge(&p);
                pins += 1;
            }
            for &bt in &net.bterms {
                let r = self.bterms[bt].rect;
                let p = Rect::new(r.x_center(), r.y_center(), r.x_center(), r.y_center());
                bbox.merge(&p);
                pins += 1;
            }
            if pins > 1 {
                total += bbox.dx() as i64 + bbox.dy() as i64;
            }
        }
        total
    }

    /// Whether any auto-placeable master occupies a single site. Determines
    /// the one-site-gap policy of the optimization run.
    pub fn has_one_site_master(&self) -> bool {
        let site_width = self
            .rows
            .iter()
            .filter(|r| r.site_class != SiteClass::Pad)
            .map(|r| r.site_width)
            .min();
        match site_width {
            Some(w) => self
                .masters
                .iter()
                .any(|m| m.auto_placeable && m.width <= w),
            None => false,
        }
    }
}

/// Bounding box of a terminal's geometry, in master-relative coordinates.
pub fn mterm_bbox(mterm: &DbMTerm) -> Rect {
    let mut bbox = Rect::merge_init();
    for b in &mterm.boxes {
        bbox.merge(&b.rect);
    }
    bbox
}
