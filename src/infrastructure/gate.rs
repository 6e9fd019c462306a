//! Counting admission gates bounding in-flight work per pipeline stage.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::domain::CrawlStage;

/// At most `limit` operations of one kind run concurrently; further callers
/// wait until a slot frees. Release order is whatever the semaphore gives us,
/// no fairness beyond that is promised or needed.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyGate {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Wait for a slot. The permit releases the slot on drop.
    pub async fn admit(&self) -> OwnedSemaphorePermit {
        // The semaphore is never closed, so acquisition only fails on
        // program logic errors.
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("concurrency gate semaphore closed")
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// One gate per pipeline stage so a slow stage cannot starve another.
#[derive(Debug, Clone)]
pub struct StageGates {
    pub categories: ConcurrencyGate,
    pub listing: ConcurrencyGate,
    pub detail: ConcurrencyGate,
}

impl StageGates {
    pub fn new(categories: usize, listing: usize, detail: usize) -> Self {
        Self {
            categories: ConcurrencyGate::new(categories),
            listing: ConcurrencyGate::new(listing),
            detail: ConcurrencyGate::new(detail),
        }
    }

    /// Gate for the stage a fetch belongs to. Stages that issue no fetches
    /// of their own fall back to the detail gate.
    pub fn for_stage(&self, stage: CrawlStage) -> &ConcurrencyGate {
        match stage {
            CrawlStage::ResolvingCategories => &self.categories,
            CrawlStage::ListingProducts => &self.listing,
            _ => &self.detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;

    #[tokio::test]
    async fn gate_bounds_concurrent_holders() {
        let gate = ConcurrencyGate::new(2);
        let in_flight = StdArc::new(AtomicUsize::new(0));
        let peak = StdArc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            let in_flight = StdArc::clone(&in_flight);
            let peak = StdArc::clone(&peak);
            tasks.push(tokio::spawn(async move {
                let _permit = gate.admit().await;
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn zero_limit_is_clamped() {
        let gate = ConcurrencyGate::new(0);
        assert_eq!(gate.limit(), 1);
    }

    #[test]
    fn stage_mapping() {
        let gates = StageGates::new(1, 2, 3);
        assert_eq!(gates.for_stage(CrawlStage::ResolvingCategories).limit(), 1);
        assert_eq!(gates.for_stage(CrawlStage::ListingProducts).limit(), 2);
        assert_eq!(gates.for_stage(CrawlStage::ExtractingProducts).limit(), 3);
    }
}
