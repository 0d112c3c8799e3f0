//! Failure display reset policy.
//!
//! A consumer that observed a rejected resource keeps showing that
//! failure until the identity of the current resource changes; a fresh
//! key request and an explicit clear both qualify. The policy never
//! retries anything; it only answers "should the failure still be
//! displayed", so a stale error cannot bleed into an unrelated request.

use crate::resource::ResourceId;

#[derive(Debug, Default)]
pub struct FailureReset {
    failed_on: Option<ResourceId>,
}

impl FailureReset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the consumer displayed a failure for this resource.
    pub fn record_failure(&mut self, id: ResourceId) {
        self.failed_on = Some(id);
    }

    /// Report whether the failure display should still show, clearing it
    /// when the observed identity differs from the one that failed.
    pub fn observe(&mut self, current: Option<ResourceId>) -> bool {
        match (self.failed_on, current) {
            (Some(failed), Some(id)) if failed == id => true,
            (Some(_), _) => {
                self.failed_on = None;
                false
            }
            (None, _) => false,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failed_on.is_some()
    }

    /// Explicit reset action.
    pub fn clear(&mut self) {
        self.failed_on = None;
    }
}
