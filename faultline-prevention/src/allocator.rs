//! ## faultline-prevention::allocator
//! **Security rule priority allocation**
//!
//! Built fresh per start from a snapshot of the group's rules. Every
//! allocation picks the smallest free priority at or above the base and
//! reserves it at once, so addresses allocated in one pass never collide
//! with each other or with pre-existing rules.
//!
//! Concurrent starts against the same group can still pick the same
//! priority from their own snapshots; the cloud then rejects one create.

use std::collections::BTreeSet;

use faultline_core::AttackError;

#[derive(Debug, Clone)]
pub struct PriorityAllocator {
    base: u16,
    max: u16,
    used: BTreeSet<u16>,
}

impl PriorityAllocator {
    pub fn new(base: u16, max: u16, used: impl IntoIterator<Item = u16>) -> Self {
        Self {
            base,
            max,
            used: used.into_iter().collect(),
        }
    }

    /// Picks and reserves the next free priority.
    pub fn allocate(&mut self) -> Result<u16, AttackError> {
        let priority = (self.base..=self.max)
            .find(|p| !self.used.contains(p))
            .ok_or(AttackError::PriorityExhausted {
                base: self.base,
                max: self.max,
            })?;
        self.used.insert(priority);
        Ok(priority)
    }

    pub fn is_used(&self, priority: u16) -> bool {
        self.used.contains(&priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn skips_existing_rules() {
        let mut allocator = PriorityAllocator::new(100, 4096, [100, 102, 300]);
        assert_eq!(allocator.allocate().unwrap(), 101);
        assert_eq!(allocator.allocate().unwrap(), 103);
        assert_eq!(allocator.allocate().unwrap(), 104);
        assert!(allocator.is_used(101));
    }

    #[test]
    fn rules_below_base_do_not_matter() {
        let mut allocator = PriorityAllocator::new(100, 4096, [65000, 10, 99]);
        assert_eq!(allocator.allocate().unwrap(), 100);
    }

    #[test]
    fn reports_exhaustion() {
        let mut allocator = PriorityAllocator::new(100, 101, [100]);
        assert_eq!(allocator.allocate().unwrap(), 101);
        let err = allocator.allocate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "no free security rule priority between 100 and 101"
        );
    }

    proptest! {
        #[test]
        fn allocations_are_distinct_free_and_above_base(
            existing in proptest::collection::btree_set(90u16..200, 0..40),
            count in 1usize..30,
        ) {
            let mut allocator = PriorityAllocator::new(100, 4096, existing.iter().copied());
            let mut assigned = BTreeSet::new();
            for _ in 0..count {
                let priority = allocator.allocate().unwrap();
                prop_assert!(priority >= 100);
                prop_assert!(!existing.contains(&priority));
                prop_assert!(assigned.insert(priority));
            }
        }

        #[test]
        fn always_takes_the_smallest_gap(existing in proptest::collection::btree_set(100u16..120, 0..20)) {
            let mut allocator = PriorityAllocator::new(100, 4096, existing.iter().copied());
            let expected = (100u16..).find(|p| !existing.contains(p)).unwrap();
            prop_assert_eq!(allocator.allocate().unwrap(), expected);
        }
    }
}
