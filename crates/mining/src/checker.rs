//! Completion checker
//!
//! Decides whether a full mission (lander, site and payloads) forms a
//! "complete set" that earns the completion bonus.

use accrual_types::{AssetClass, UnitId};
use std::sync::Arc;

/// The composition of a full mission as seen by a completion checker.
#[derive(Debug, Clone, Copy)]
pub struct CompletionQuery<'a> {
    pub lander_class: &'a AssetClass,
    pub landers: &'a [UnitId],
    pub site_class: &'a AssetClass,
    pub sites: &'a [UnitId],
    pub payload_class: &'a AssetClass,
    pub payloads: &'a [UnitId],
}

pub trait CompletionChecker: Send + Sync {
    fn check(&self, query: &CompletionQuery<'_>) -> bool;
}

impl<F> CompletionChecker for F
where
    F: Fn(&CompletionQuery<'_>) -> bool + Send + Sync,
{
    fn check(&self, query: &CompletionQuery<'_>) -> bool {
        self(query)
    }
}

pub type SharedChecker = Arc<dyn CompletionChecker>;

/// Wrap a closure as a shared checker.
pub fn checker_fn<F>(check: F) -> SharedChecker
where
    F: Fn(&CompletionQuery<'_>) -> bool + Send + Sync + 'static,
{
    Arc::new(check)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_checkers() {
        let (lander, site, payload) = (
            AssetClass::new("landers"),
            AssetClass::new("sites"),
            AssetClass::new("payloads"),
        );
        let checker = checker_fn(|q| q.payloads.len() >= 2);
        let mut query = CompletionQuery {
            lander_class: &lander,
            landers: &[1],
            site_class: &site,
            sites: &[7],
            payload_class: &payload,
            payloads: &[3, 4],
        };
        assert!(checker.check(&query));
        query.payloads = &[3];
        assert!(!checker.check(&query));
    }
}
