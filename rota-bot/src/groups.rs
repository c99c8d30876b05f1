//! Display name → duty group classification.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two alternating duty groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Group {
    A,
    B,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::A => write!(f, "A"),
            Group::B => write!(f, "B"),
        }
    }
}

/// Two disjoint sets of display names.
///
/// Matching is exact: no trimming, no case folding.
#[derive(Debug, Clone, Default)]
pub struct GroupTable {
    a: HashSet<String>,
    b: HashSet<String>,
}

impl GroupTable {
    /// Build a table, returning the names listed in both groups on overlap.
    pub fn new<A, B>(a: A, b: B) -> Result<Self, Vec<String>>
    where
        A: IntoIterator<Item = String>,
        B: IntoIterator<Item = String>,
    {
        let a: HashSet<String> = a.into_iter().collect();
        let b: HashSet<String> = b.into_iter().collect();
        let mut overlap: Vec<String> = a.intersection(&b).cloned().collect();
        if !overlap.is_empty() {
            overlap.sort();
            return Err(overlap);
        }
        Ok(Self { a, b })
    }

    /// `None` means unaffiliated.
    pub fn classify(&self, display_name: &str) -> Option<Group> {
        if self.a.contains(display_name) {
            Some(Group::A)
        } else if self.b.contains(display_name) {
            Some(Group::B)
        } else {
            None
        }
    }
}
