use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quotedesk_core::{OfferId, RevisionId};

/// Append-only lineage row: `revision_offer_id` was cloned from `original_offer_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionLink {
    pub id: RevisionId,
    pub original_offer_id: OfferId,
    pub revision_offer_id: OfferId,
    /// 1-based, strictly increasing per original offer.
    pub revision_number: u32,
    pub created_at: DateTime<Utc>,
}

impl RevisionLink {
    /// Next link for `original`, given the highest revision number recorded so far.
    pub fn next(
        original: OfferId,
        revision: OfferId,
        current_max: Option<u32>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RevisionId::new(),
            original_offer_id: original,
            revision_offer_id: revision,
            revision_number: current_max.unwrap_or(0) + 1,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_revision_is_number_one() {
        let link = RevisionLink::next(OfferId::new(), OfferId::new(), None, Utc::now());
        assert_eq!(link.revision_number, 1);
    }

    #[test]
    fn numbering_continues_from_current_max() {
        let link = RevisionLink::next(OfferId::new(), OfferId::new(), Some(4), Utc::now());
        assert_eq!(link.revision_number, 5);
    }
}
