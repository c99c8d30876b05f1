//! The catalog of cleaning locations.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};

/// Locations left out during reduced-scope months.
#[derive(Debug, Clone, Default)]
pub struct ReducedScope {
    pub exclude: HashSet<String>,
    /// Calendar months (1–12) that are reduced-scope.
    pub months: HashSet<u32>,
}

/// Ordered location catalog with an optional month filter.
#[derive(Debug, Clone)]
pub struct LocationPool {
    catalog: Vec<String>,
    reduced: Option<ReducedScope>,
}

impl LocationPool {
    pub fn new(catalog: Vec<String>) -> Self {
        Self {
            catalog,
            reduced: None,
        }
    }

    pub fn with_reduced_scope(mut self, reduced: ReducedScope) -> Self {
        self.reduced = Some(reduced);
        self
    }

    pub fn catalog(&self) -> &[String] {
        &self.catalog
    }

    /// Locations in catalog order for the period containing `date`.
    ///
    /// Never empty for a non-empty catalog: a filter that would exclude
    /// every location is ignored.
    pub fn locations(&self, date: NaiveDate) -> Vec<String> {
        let Some(reduced) = &self.reduced else {
            return self.catalog.clone();
        };
        if !reduced.months.contains(&date.month()) {
            return self.catalog.clone();
        }
        let kept: Vec<String> = self
            .catalog
            .iter()
            .filter(|l| !reduced.exclude.contains(*l))
            .cloned()
            .collect();
        if kept.is_empty() {
            tracing::warn!("Reduced scope excludes every location, using full catalog");
            return self.catalog.clone();
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<String> {
        ["201", "203", "204", "205", "corridor", "sink"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn day(month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, 10).unwrap()
    }

    fn odd_months_without_shared_areas() -> ReducedScope {
        ReducedScope {
            exclude: ["corridor", "sink"].iter().map(|s| s.to_string()).collect(),
            months: [1, 3, 5, 7, 9, 11].into_iter().collect(),
        }
    }

    #[test]
    fn unfiltered_pool_returns_full_catalog() {
        let pool = LocationPool::new(catalog());
        assert_eq!(pool.locations(day(1)), catalog());
        assert_eq!(pool.locations(day(2)), catalog());
    }

    #[test]
    fn reduced_months_drop_excluded_locations_in_order() {
        let pool =
            LocationPool::new(catalog()).with_reduced_scope(odd_months_without_shared_areas());
        assert_eq!(pool.locations(day(3)), vec!["201", "203", "204", "205"]);
        assert_eq!(pool.locations(day(4)), catalog());
    }

    #[test]
    fn filter_never_empties_the_pool() {
        let reduced = ReducedScope {
            exclude: catalog().into_iter().collect(),
            months: (1..=12).collect(),
        };
        let pool = LocationPool::new(catalog()).with_reduced_scope(reduced);
        assert_eq!(pool.locations(day(6)), catalog());
    }
}
