//! The placement architecture: rows of sites, placement regions, per-node
//! padding, and the derived per-level rail and orientation data the detailed
//! manager checks moves against.

use std::collections::HashSet;

use log::info;

use crate::db::{Database, Orient, SigType};
use crate::geom::Rect;
use crate::network::Network;

pub const SYMMETRY_X: u8 = 0x01;
pub const SYMMETRY_Y: u8 = 0x02;
pub const SYMMETRY_ROT90: u8 = 0x04;

/// Power rail classification of a row boundary or a cell boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RailPower {
    Vdd,
    Vss,
    Unknown,
}

impl RailPower {
    /// Unknown classifications never conflict.
    pub fn conflicts(&self, other: &RailPower) -> bool {
        !matches!(self, RailPower::Unknown)
            && !matches!(other, RailPower::Unknown)
            && self != other
    }
}

/// A horizontal strip of uniform-height sites.
#[derive(Clone, Debug)]
pub struct Row {
    pub origin_x: i32,
    pub bottom: i32,
    pub site_width: i32,
    pub site_spacing: i32,
    pub num_sites: i32,
    pub height: i32,
    pub orient: Orient,
    pub symmetry: u8,
    pub top_power: RailPower,
    pub bottom_power: RailPower,
}

impl Row {
    pub fn left(&self) -> i32 {
        self.origin_x
    }

    pub fn right(&self) -> i32 {
        self.origin_x + self.num_sites * self.site_spacing + (self.site_width - self.site_spacing)
    }

    pub fn top(&self) -> i32 {
        self.bottom + self.height
    }
}

/// A union of rectangles bounding where member cells may be placed. Region 0
/// is the default region spanning the whole core.
#[derive(Clone, Debug)]
pub struct Region {
    pub id: usize,
    pub rects: Vec<Rect>,
    pub boundary: Rect,
}

impl Region {
    /// Whether a cell footprint lies entirely inside the region.
    pub fn contains(&self, footprint: &Rect) -> bool {
        self.rects.iter().any(|r| r.contains(footprint))
    }
}

/// Derived per-level (row-of-sites) attributes, valid after `post_process`.
#[derive(Clone, Copy, Debug)]
pub struct LevelInfo {
    pub top_power: RailPower,
    pub bottom_power: RailPower,
    pub orient: Orient,
}

pub struct Architecture {
    pub rows: Vec<Row>,
    pub regions: Vec<Region>,
    pub xmin: i32,
    pub xmax: i32,
    pub ymin: i32,
    pub ymax: i32,
    pub use_padding: bool,
    /// Left/right clearance per node id, in layout units.
    padding: Vec<(i32, i32)>,
    levels: Vec<LevelInfo>,
}

impl Architecture {
    pub fn new() -> Self {
        Architecture {
            rows: Vec::new(),
            regions: Vec::new(),
            xmin: i32::MAX,
            xmax: i32::MIN,
            ymin: i32::MAX,
            ymax: i32::MIN,
            use_padding: false,
            padding: Vec::new(),
            levels: Vec::new(),
        }
    }

    pub fn create_row(&mut self, row: Row) -> usize {
        self.rows.push(row);
        self.rows.len() - 1
    }

    pub fn create_region(&mut self, rects: Vec<Rect>, boundary: Rect) -> usize {
        let id = self.regions.len();
        self.regions.push(Region {
            id,
            rects,
            boundary,
        });
        id
    }

    /// Global bounding box over all accepted rows.
    pub fn compute_bounds(&mut self) {
        self.xmin = i32::MAX;
        self.xmax = i32::MIN;
        self.ymin = i32::MAX;
        self.ymax = i32::MIN;
        for row in &self.rows {
            self.xmin = self.xmin.min(row.left());
            self.xmax = self.xmax.max(row.right());
            self.ymin = self.ymin.min(row.bottom);
            self.ymax = self.ymax.max(row.top());
        }
    }

    /// Clamp every row into the global bounding box: the origin is raised to
    /// the global minimum X and the site count reduced so the row's right
    /// edge stays inside the global maximum X.
    pub fn clip_rows(&mut self) {
        let (xmin, xmax) = (self.xmin, self.xmax);
        for row in &mut self.rows {
            if row.origin_x < xmin {
                row.origin_x = xmin;
            }
            let end_gap = row.site_width - row.site_spacing;
            if row.origin_x + row.num_sites * row.site_spacing + end_gap > xmax {
                row.num_sites = (xmax - end_gap - row.origin_x) / row.site_spacing;
            }
        }
    }

    /// Classify each row's top and bottom rail by scanning routed, non-via,
    /// horizontal special supply wires on layers known to carry that supply,
    /// and testing whether the row boundary falls within the wire's Y span.
    pub fn assign_row_power(
        &mut self,
        db: &Database,
        pwr_layers: &HashSet<String>,
        gnd_layers: &HashSet<String>,
    ) {
        for net in &db.nets {
            if !net.special {
                continue;
            }
            let power = match net.sig_type {
                SigType::Power => RailPower::Vdd,
                SigType::Ground => RailPower::Vss,
                _ => continue,
            };
            for sbox in &net.swires {
                if !sbox.routed || sbox.via || !sbox.horizontal {
                    continue;
                }
                let known = match power {
                    RailPower::Vdd => pwr_layers.contains(&sbox.layer),
                    RailPower::Vss => gnd_layers.contains(&sbox.layer),
                    RailPower::Unknown => false,
                };
                if !known {
                    continue;
                }
                let ylo = sbox.rect.ylo - db.core.ylo;
                let yhi = sbox.rect.yhi - db.core.ylo;
                for row in &mut self.rows {
                    if row.bottom >= ylo && row.bottom <= yhi {
                        row.bottom_power = power;
                    }
                    if row.top() >= ylo && row.top() <= yhi {
                        row.top_power = power;
                    }
                }
            }
        }
    }

    /// Finalize derived state once all rows and the network are known: order
    /// the rows, build the per-level rail/orientation table, and report the
    /// cell height mix.
    pub fn post_process(&mut self, network: &Network) {
        self.rows
            .sort_by_key(|r| (r.bottom, r.origin_x));

        let height = self.row_height();
        let num_levels = if height > 0 {
            ((self.ymax - self.ymin) / height) as usize
        } else {
            0
        };
        self.levels = vec![
            LevelInfo {
                top_power: RailPower::Unknown,
                bottom_power: RailPower::Unknown,
                orient: Orient::R0,
            };
            num_levels
        ];
        for row in &self.rows {
            let level = ((row.bottom - self.ymin) / height) as usize;
            if level < self.levels.len() {
                self.levels[level] = LevelInfo {
                    top_power: row.top_power,
                    bottom_power: row.bottom_power,
                    orient: row.orient,
                };
            }
        }

        let multi = network
            .nodes
            .iter()
            .filter(|n| n.is_movable() && n.height > height)
            .count();
        info!(
            "Architecture: {} rows, {} levels, {} multi-height movable cells.",
            self.rows.len(),
            num_levels,
            multi
        );
    }

    /// Uniform site height across all accepted rows.
    pub fn row_height(&self) -> i32 {
        self.rows.first().map(|r| r.height).unwrap_or(0)
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, level: usize) -> &LevelInfo {
        &self.levels[level]
    }

    pub fn set_padding(&mut self, node: usize, left: i32, right: i32) {
        if self.padding.len() <= node {
            self.padding.resize(node + 1, (0, 0));
        }
        self.padding[node] = (left, right);
    }

    /// Effective left/right clearance for a node; zero when padding is off.
    pub fn padding(&self, node: usize) -> (i32, i32) {
        if !self.use_padding {
            return (0, 0);
        }
        self.padding.get(node).copied().unwrap_or((0, 0))
    }
}
