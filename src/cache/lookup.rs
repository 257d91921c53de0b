//! Per-stage lookup outcome.

use crate::domain::CacheEntry;
use crate::error::{Error, Result};

/// Result of consulting one tier.
///
/// `Miss` and `Fault` both fall through to the next tier; they are kept
/// apart so faults are logged and counted on their own.
#[derive(Debug)]
pub enum TierLookup {
    Hit(CacheEntry),
    Miss,
    Fault(Error),
}

impl TierLookup {
    /// Metric label
    pub fn outcome(&self) -> &'static str {
        match self {
            TierLookup::Hit(_) => "hit",
            TierLookup::Miss => "miss",
            TierLookup::Fault(_) => "fault",
        }
    }
}

impl From<Result<Option<CacheEntry>>> for TierLookup {
    fn from(result: Result<Option<CacheEntry>>) -> Self {
        match result {
            Ok(Some(entry)) => TierLookup::Hit(entry),
            Ok(None) => TierLookup::Miss,
            Err(e) => TierLookup::Fault(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Provenance;
    use serde_json::json;

    #[test]
    fn test_from_result() {
        let entry = CacheEntry::from_record(json!({}), Provenance::FastTier).unwrap();

        let hit = TierLookup::from(Ok(Some(entry)));
        assert!(matches!(hit, TierLookup::Hit(_)));
        assert_eq!(hit.outcome(), "hit");

        assert_eq!(TierLookup::from(Ok(None)).outcome(), "miss");

        let fault = TierLookup::from(Err(Error::ObjectStore("timeout".into())));
        assert_eq!(fault.outcome(), "fault");
    }
}
