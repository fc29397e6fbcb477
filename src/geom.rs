//! Axis-aligned geometric primitives shared by the architecture and the
//! per-master edge-spacing calculations.

use serde::{Deserialize, Serialize};

/// Closed axis-aligned rectangle in layout units. Degenerate rectangles
/// (zero width or zero height) are used to represent boundary edges and
/// interval endpoints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub xlo: i32,
    pub ylo: i32,
    pub xhi: i32,
    pub yhi: i32,
}

impl Rect {
    pub fn new(xlo: i32, ylo: i32, xhi: i32, yhi: i32) -> Self {
        Rect { xlo, ylo, xhi, yhi }
    }

    /// Starting point for incremental merging; any merge replaces it.
    pub fn merge_init() -> Self {
        Rect {
            xlo: i32::MAX,
            ylo: i32::MAX,
            xhi: i32::MIN,
            yhi: i32::MIN,
        }
    }

    pub fn dx(&self) -> i32 {
        self.xhi - self.xlo
    }

    pub fn dy(&self) -> i32 {
        self.yhi - self.ylo
    }

    pub fn x_center(&self) -> i32 {
        (self.xlo + self.xhi) / 2
    }

    pub fn y_center(&self) -> i32 {
        (self.ylo + self.yhi) / 2
    }

    /// Boundary-inclusive intersection test, so touching rectangles count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.xlo <= other.xhi
            && other.xlo <= self.xhi
            && self.ylo <= other.yhi
            && other.ylo <= self.yhi
    }

    /// Strict interior overlap; shared boundaries do not count.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.xlo < other.xhi
            && other.xlo < self.xhi
            && self.ylo < other.yhi
            && other.ylo < self.yhi
    }

    pub fn contains(&self, other: &Rect) -> bool {
        self.xlo <= other.xlo
            && self.ylo <= other.ylo
            && self.xhi >= other.xhi
            && self.yhi >= other.yhi
    }

    pub fn merge(&mut self, other: &Rect) {
        self.xlo = self.xlo.min(other.xlo);
        self.ylo = self.ylo.min(other.ylo);
        self.xhi = self.xhi.max(other.xhi);
        self.yhi = self.yhi.max(other.yhi);
    }
}

/// One of the four sides of a bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

pub const ALL_SIDES: [Side; 4] = [Side::Left, Side::Right, Side::Top, Side::Bottom];

/// Returns the degenerate edge rectangle (zero width or zero height) for one
/// side of a bounding box.
pub fn boundary_segment(bbox: &Rect, side: Side) -> Rect {
    let mut segment = *bbox;
    match side {
        Side::Right => segment.xlo = bbox.xhi,
        Side::Left => segment.xhi = bbox.xlo,
        Side::Top => segment.ylo = bbox.yhi,
        Side::Bottom => segment.yhi = bbox.ylo,
    }
    segment
}

/// Computes the complement of `segs` within `parent`, where all rectangles
/// lie on the same axis-aligned interval. Segments are sorted along the
/// parent's axis and merged (touching counts as intersecting) before the
/// gaps are collected. An empty `segs` returns the parent unchanged; a fully
/// covered parent returns nothing.
pub fn difference(parent: &Rect, segs: &[Rect]) -> Vec<Rect> {
    if segs.is_empty() {
        return vec![*parent];
    }
    // A collapsed X extent means the interval runs vertically; everything
    // else is treated as horizontal.
    let horizontal = parent.xlo != parent.xhi;
    let start_of = |r: &Rect| if horizontal { r.xlo } else { r.ylo };
    let end_of = |r: &Rect| if horizontal { r.xhi } else { r.yhi };

    let mut sorted: Vec<Rect> = segs.to_vec();
    sorted.sort_by_key(|r| start_of(r));

    let mut merged: Vec<Rect> = Vec::with_capacity(sorted.len());
    for seg in sorted {
        match merged.last_mut() {
            Some(prev) if prev.intersects(&seg) => prev.merge(&seg),
            _ => merged.push(seg),
        }
    }

    let mut cursor = start_of(parent);
    let end = end_of(parent);
    let mut result = Vec::new();
    let emit = |from: i32, to: i32, result: &mut Vec<Rect>| {
        if horizontal {
            result.push(Rect::new(from, parent.ylo, to, parent.yhi));
        } else {
            result.push(Rect::new(parent.xlo, from, parent.xhi, to));
        }
    };
    for seg in &merged {
        if start_of(seg) > cursor {
            emit(cursor, start_of(seg), &mut result);
        }
        cursor = cursor.max(end_of(seg));
    }
    if cursor < end {
        emit(cursor, end, &mut result);
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn difference_of_empty_set_is_parent() {
        let parent = Rect::new(0, 0, 100, 10);
        assert_eq!(difference(&parent, &[]), vec![parent]);
    }

    #[test]
    fn difference_of_self_is_empty() {
        let parent = Rect::new(0, 0, 100, 10);
        assert_eq!(difference(&parent, &[parent]), vec![]);
    }

    #[test]
    fn difference_merges_overlapping_segments() {
        let parent = Rect::new(0, 0, 100, 10);
        let segs = [
            Rect::new(10, 0, 30, 10),
            Rect::new(20, 0, 40, 10),
            Rect::new(60, 0, 70, 10),
        ];
        assert_eq!(
            difference(&parent, &segs),
            vec![
                Rect::new(0, 0, 10, 10),
                Rect::new(40, 0, 60, 10),
                Rect::new(70, 0, 100, 10),
            ]
        );
    }

    #[test]
    fn difference_along_vertical_interval() {
        let parent = Rect::new(5, 0, 5, 100);
        let segs = [Rect::new(5, 20, 5, 50)];
        assert_eq!(
            difference(&parent, &segs),
            vec![Rect::new(5, 0, 5, 20), Rect::new(5, 50, 5, 100)]
        );
    }

    #[test]
    fn boundary_segments_are_degenerate() {
        let bbox = Rect::new(0, 0, 40, 100);
        assert_eq!(boundary_segment(&bbox, Side::Left), Rect::new(0, 0, 0, 100));
        assert_eq!(
            boundary_segment(&bbox, Side::Right),
            Rect::new(40, 0, 40, 100)
        );
        assert_eq!(boundary_segment(&bbox, Side::Top), Rect::new(0, 100, 40, 100));
        assert_eq!(boundary_segment(&bbox, Side::Bottom), Rect::new(0, 0, 40, 0));
    }
}
