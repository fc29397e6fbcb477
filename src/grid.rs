//! Site-indexed occupancy derived from the architecture. One slot per
//! (level, site); slots outside any row are blocked from the start, and the
//! legalizer paints fixed obstructions before any occupancy query is made.

use std::ops::Range;

use crate::arch::Architecture;
use crate::geom::Rect;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SiteState {
    Free,
    Blocked,
    Occupied(usize),
}

pub struct Grid {
    pub xmin: i32,
    pub ymin: i32,
    pub site_width: i32,
    /// Site pitch: successive sites sit `site_spacing` apart, which may
    /// exceed `site_width`.
    pub site_spacing: i32,
    pub row_height: i32,
    pub num_levels: usize,
    pub num_sites: usize,
    slots: Vec<SiteState>,
}

impl Grid {
    /// Build the grid to mirror the architecture's row/site geometry. Every
    /// site covered by a row starts free; everything else is blocked.
    pub fn build(arch: &Architecture) -> Self {
        let site_width = arch.rows.first().map(|r| r.site_width).unwrap_or(1).max(1);
        let site_spacing = arch
            .rows
            .first()
            .map(|r| r.site_spacing)
            .unwrap_or(1)
            .max(1);
        let row_height = arch.row_height().max(1);
        let num_levels = arch.num_levels();
        let num_sites = if arch.xmax > arch.xmin {
            ((arch.xmax - arch.xmin) / site_spacing) as usize
        } else {
            0
        };
        let mut grid = Grid {
            xmin: arch.xmin,
            ymin: arch.ymin,
            site_width,
            site_spacing,
            row_height,
            num_levels,
            num_sites,
            slots: vec![SiteState::Blocked; num_levels * num_sites],
        };
        for row in &arch.rows {
            let level = ((row.bottom - arch.ymin) / row_height) as usize;
            if level >= num_levels {
                continue;
            }
            let s0 = ((row.left() - arch.xmin) / site_spacing).max(0) as usize;
            let s1 = (s0 + row.num_sites.max(0) as usize).min(num_sites);
            for s in s0..s1 {
                grid.slots[level * num_sites + s] = SiteState::Free;
            }
        }
        grid
    }

    pub fn level_of_y(&self, y: i32) -> Option<usize> {
        if y < self.ymin {
            return None;
        }
        let level = ((y - self.ymin) / self.row_height) as usize;
        (level < self.num_levels).then(|| level)
    }

    pub fn y_of_level(&self, level: usize) -> i32 {
        self.ymin + level as i32 * self.row_height
    }

    pub fn site_of_x(&self, x: i32) -> i32 {
        (x - self.xmin) / self.site_spacing
    }

    pub fn x_of_site(&self, site: i32) -> i32 {
        self.xmin + site * self.site_spacing
    }

    /// Number of whole sites needed to cover `width` layout units.
    pub fn sites_for(&self, width: i32) -> usize {
        ((width + self.site_width - 1) / self.site_width) as usize
    }

    pub fn get(&self, level: usize, site: usize) -> SiteState {
        self.slots[level * self.num_sites + site]
    }

    pub fn paint(&mut self, levels: Range<usize>, sites: Range<usize>, state: SiteState) {
        for level in levels {
            for site in sites.clone() {
                self.slots[level * self.num_sites + site] = state;
            }
        }
    }

    /// Mark every slot a core-relative rectangle overlaps as blocked.
    pub fn block_rect(&mut self, rect: &Rect) {
        for level in 0..self.num_levels {
            for site in 0..self.num_sites {
                let slot = Rect::new(
                    self.x_of_site(site as i32),
                    self.y_of_level(level),
                    self.x_of_site(site as i32 + 1),
                    self.y_of_level(level + 1),
                );
                if rect.overlaps(&slot) {
                    self.slots[level * self.num_sites + site] = SiteState::Blocked;
                }
            }
        }
    }

    /// Whether every slot in the span is free, treating slots occupied by one
    /// of `ignore` as free. Spans reaching outside the grid are never free.
    pub fn span_free(&self, levels: Range<usize>, sites: Range<usize>, ignore: &[usize]) -> bool {
        if levels.end > self.num_levels || sites.end > self.num_sites {
            return false;
        }
        for level in levels {
            for site in sites.clone() {
                match self.get(level, site) {
                    SiteState::Free => {}
                    SiteState::Blocked => return false,
                    SiteState::Occupied(n) if ignore.contains(&n) => {}
                    SiteState::Occupied(_) => return false,
                }
            }
        }
        true
    }
}
