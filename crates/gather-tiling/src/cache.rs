//! Memoized planning for callers that plan the same gather repeatedly.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::error::TilingResult;
use crate::limits::ResourceLimits;
use crate::plan::{TilingPlan, TilingPlanner};
use crate::shape::GatherRequest;

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Plans keyed by `(request, limits)`. Failed plans are not stored.
#[derive(Debug, Default)]
pub struct PlanCache {
    planner: TilingPlanner,
    entries: HashMap<(GatherRequest, ResourceLimits), TilingPlan>,
    stats: CacheStats,
}

impl PlanCache {
    #[must_use]
    pub fn new(planner: TilingPlanner) -> Self {
        Self { planner, entries: HashMap::new(), stats: CacheStats::default() }
    }

    #[must_use]
    pub const fn planner(&self) -> &TilingPlanner {
        &self.planner
    }

    /// Return the cached plan or compute and store it.
    pub fn get_or_plan(
        &mut self,
        request: &GatherRequest,
        limits: &ResourceLimits,
    ) -> TilingResult<TilingPlan> {
        match self.entries.entry((request.clone(), *limits)) {
            Entry::Occupied(entry) => {
                self.stats.hits += 1;
                Ok(entry.get().clone())
            }
            Entry::Vacant(entry) => {
                self.stats.misses += 1;
                let plan = self.planner.plan(request, limits)?;
                tracing::trace!(cached = self.stats.misses, "plan cached");
                Ok(entry.insert(plan).clone())
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every stored plan. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DataType;

    #[test]
    fn second_lookup_hits() {
        let mut cache = PlanCache::default();
        let req = GatherRequest::new(vec![64, 128], vec![32], DataType::F32, 0);
        let limits = ResourceLimits::default();
        let first = cache.get_or_plan(&req, &limits).unwrap();
        let second = cache.get_or_plan(&req, &limits).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn limits_are_part_of_the_key() {
        let mut cache = PlanCache::default();
        let req = GatherRequest::new(vec![64, 128], vec![32], DataType::F32, 0);
        cache.get_or_plan(&req, &ResourceLimits::default()).unwrap();
        let smaller = ResourceLimits::default().with_execution_units(8).unwrap();
        cache.get_or_plan(&req, &smaller).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn errors_are_not_cached() {
        let mut cache = PlanCache::default();
        let req = GatherRequest::new(vec![64, 128], vec![32], DataType::F32, 5);
        assert!(cache.get_or_plan(&req, &ResourceLimits::default()).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_keeps_counters() {
        let mut cache = PlanCache::default();
        let req = GatherRequest::new(vec![8, 8], vec![2], DataType::U8, 1);
        cache.get_or_plan(&req, &ResourceLimits::default()).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 1);
    }
}
