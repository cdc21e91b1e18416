//! Element selection criteria.
//!
//! Grammar: `all[]` selects every element of the requested dimension; a bare
//! name selects the elements of that group; `or` joins alternatives.
//!
//! ```text
//! all[]
//! inlet
//! inlet or outlet or wall_2
//! ```

use crate::mesh_error::MeshCouplingError;
use std::fmt;

/// Parsed selection criterion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionCriterion {
    /// Every element of the requested dimension.
    All,
    /// Union of named groups, in the order written.
    Groups(Vec<String>),
}

impl SelectionCriterion {
    pub fn parse(criterion: &str) -> Result<Self, MeshCouplingError> {
        let invalid = |reason: &str| MeshCouplingError::InvalidSelection {
            criterion: criterion.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = criterion.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty criterion"));
        }

        let mut groups = Vec::new();
        let mut all = false;
        for term in trimmed.split(" or ").map(str::trim) {
            if term.is_empty() {
                return Err(invalid("dangling `or`"));
            }
            if term == "all[]" {
                all = true;
                continue;
            }
            if term.contains(char::is_whitespace) {
                return Err(invalid("group names cannot contain whitespace"));
            }
            if term.contains(['[', ']']) {
                return Err(invalid("only `all[]` may use brackets"));
            }
            if term == "or" {
                return Err(invalid("dangling `or`"));
            }
            groups.push(term.to_string());
        }

        Ok(if all {
            SelectionCriterion::All
        } else {
            SelectionCriterion::Groups(groups)
        })
    }

    pub fn is_all(&self) -> bool {
        matches!(self, SelectionCriterion::All)
    }
}

impl fmt::Display for SelectionCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionCriterion::All => f.write_str("all[]"),
            SelectionCriterion::Groups(groups) => f.write_str(&groups.join(" or ")),
        }
    }
}
