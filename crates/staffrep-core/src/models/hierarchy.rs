//! Staff rank hierarchy.
//!
//! The hierarchy is read-only configuration: an ordered list of chat
//! roles a staff member climbs through. Ranks must form a strict total
//! order, so ties are rejected when the hierarchy is built.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::StaffError;
use crate::models::request::RankDirection;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankDefinition {
    /// Chat role id bound to this rank.
    pub id: String,
    pub name: String,
    pub rank: i64,
}

/// Rank definitions sorted ascending by `rank`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "Vec<RankDefinition>", into = "Vec<RankDefinition>")]
pub struct Hierarchy {
    ranks: Vec<RankDefinition>,
}

impl Hierarchy {
    pub fn new(mut ranks: Vec<RankDefinition>) -> Result<Self, StaffError> {
        let mut seen_ranks = HashSet::new();
        let mut seen_ids = HashSet::new();
        for def in &ranks {
            if !seen_ranks.insert(def.rank) {
                return Err(StaffError::Config(format!(
                    "duplicate rank {} in staff hierarchy",
                    def.rank
                )));
            }
            if !seen_ids.insert(def.id.as_str()) {
                return Err(StaffError::Config(format!(
                    "role {} appears twice in staff hierarchy",
                    def.id
                )));
            }
        }
        ranks.sort_by_key(|def| def.rank);
        Ok(Self { ranks })
    }

    pub fn ranks(&self) -> &[RankDefinition] {
        &self.ranks
    }

    pub fn get(&self, index: usize) -> Option<&RankDefinition> {
        self.ranks.get(index)
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    /// Index of the rank a member currently holds.
    ///
    /// A member holding several hierarchy roles resolves to the lowest
    /// one. `None` means the member is not recognized staff.
    pub fn current_index<S: AsRef<str>>(&self, held_role_ids: &[S]) -> Option<usize> {
        self.ranks
            .iter()
            .position(|def| held_role_ids.iter().any(|id| id.as_ref() == def.id))
    }

    /// Index of the most senior rank a member holds, for display.
    pub fn highest_index<S: AsRef<str>>(&self, held_role_ids: &[S]) -> Option<usize> {
        self.ranks
            .iter()
            .rposition(|def| held_role_ids.iter().any(|id| id.as_ref() == def.id))
    }

    pub fn holds_any<S: AsRef<str>>(&self, held_role_ids: &[S]) -> bool {
        self.current_index(held_role_ids).is_some()
    }

    /// Neighbouring index in the given direction, if one exists.
    pub fn step(&self, index: usize, direction: RankDirection) -> Option<usize> {
        let next = match direction {
            RankDirection::Promote => index.checked_add(1)?,
            RankDirection::Demote => index.checked_sub(1)?,
        };
        (next < self.ranks.len()).then_some(next)
    }
}

impl TryFrom<Vec<RankDefinition>> for Hierarchy {
    type Error = StaffError;

    fn try_from(ranks: Vec<RankDefinition>) -> Result<Self, Self::Error> {
        Hierarchy::new(ranks)
    }
}

impl From<Hierarchy> for Vec<RankDefinition> {
    fn from(hierarchy: Hierarchy) -> Self {
        hierarchy.ranks
    }
}
