//! Membership checks for the abroad and part-time job collections.

use std::sync::Arc;

use jobdup_core::{JobSegment, Listing, ListingKind, SegmentDirectory, StoreResult};

pub struct SegmentClassifier {
    segments: Arc<dyn SegmentDirectory>,
}

impl SegmentClassifier {
    pub fn new(segments: Arc<dyn SegmentDirectory>) -> Self {
        Self { segments }
    }

    pub async fn is_abroad(&self, listing: &Listing) -> StoreResult<bool> {
        self.member_of(JobSegment::Abroad, listing).await
    }

    pub async fn is_parttime(&self, listing: &Listing) -> StoreResult<bool> {
        self.member_of(JobSegment::Parttime, listing).await
    }

    /// Résumés are never part of a job collection and skip the lookup.
    async fn member_of(&self, segment: JobSegment, listing: &Listing) -> StoreResult<bool> {
        if listing.kind != ListingKind::Job {
            return Ok(false);
        }
        self.segments.in_segment(segment, listing.id).await
    }
}
