//! Claim registry for directory objects
//!
//! A claim is permanent for the lifetime of the registry: the first caller
//! to claim an id wins, every later caller loses. All decisions to expand,
//! queue or record an object go through [`VisitedRegistry::try_claim`].

use parking_lot::Mutex;
use std::collections::HashSet;

/// Concurrency-safe set of claimed object ids
///
/// Ids are compared exactly; no case folding is applied.
#[derive(Debug, Default)]
pub struct VisitedRegistry {
    claimed: Mutex<HashSet<String>>,
}

impl VisitedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`
    ///
    /// Returns true exactly once per id, for the first caller.
    pub fn try_claim(&self, id: &str) -> bool {
        let mut claimed = self.claimed.lock();
        if claimed.contains(id) {
            return false;
        }
        claimed.insert(id.to_string())
    }

    /// Number of claimed ids
    pub(crate) fn len(&self) -> usize {
        self.claimed.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_first_claim_wins() {
        let registry = VisitedRegistry::new();
        assert!(registry.try_claim("alice"));
        assert!(!registry.try_claim("alice"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ids_are_case_sensitive() {
        let registry = VisitedRegistry::new();
        assert!(registry.try_claim("Alice"));
        assert!(registry.try_claim("alice"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let registry = Arc::new(VisitedRegistry::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        if registry.try_claim(&format!("group-{i}")) {
                            winners.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::Relaxed), 100);
        assert_eq!(registry.len(), 100);
    }
}
