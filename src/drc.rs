//! Placement DRC queries: registered cell edge types and the pairwise
//! minimum spacing between them.

use crate::db::{Database, EdgeSpacingTable};

pub const DEFAULT_EDGE_TYPE: &str = "DEFAULT";

/// Legality-rule engine bound to the technology of the block being placed.
/// Only edge-spacing rules are interpreted here; everything else the manager
/// enforces is geometric.
pub struct PlacementDrc {
    table: Option<EdgeSpacingTable>,
}

impl PlacementDrc {
    pub fn new(db: &Database) -> Self {
        PlacementDrc {
            table: db.edge_spacing.clone(),
        }
    }

    pub fn has_cell_edge_spacing_table(&self) -> bool {
        self.table.is_some()
    }

    /// Index of a registered edge type, or `None` when the type does not
    /// participate in the spacing table.
    pub fn edge_type_idx(&self, name: &str) -> Option<usize> {
        self.table
            .as_ref()
            .and_then(|t| t.types.iter().position(|ty| ty == name))
    }

    /// Required spacing between two typed edges, in layout units.
    pub fn spacing(&self, a: usize, b: usize) -> i32 {
        match &self.table {
            Some(t) => t.spacing[a][b],
            None => 0,
        }
    }
}
