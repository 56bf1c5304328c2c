//! Cancellable queue of transform batches.

use std::collections::VecDeque;
use std::ops::Range;

use tokio_util::sync::CancellationToken;

/// Index ranges to process, in submission order.
///
/// Inputs at or under the streaming threshold become a single batch. Once
/// cancelled the queue yields nothing more.
#[derive(Debug)]
pub struct BatchQueue {
    pending: VecDeque<Range<usize>>,
    total_batches: usize,
    token: CancellationToken,
}

impl BatchQueue {
    pub fn plan(total: usize, batch_size: usize, streaming_threshold: usize) -> Self {
        let mut pending = VecDeque::new();
        if total <= streaming_threshold {
            pending.push_back(0..total);
        } else {
            let batch_size = batch_size.max(1);
            let mut start = 0;
            while start < total {
                let end = (start + batch_size).min(total);
                pending.push_back(start..end);
                start = end;
            }
        }

        Self {
            total_batches: pending.len(),
            pending,
            token: CancellationToken::new(),
        }
    }

    pub fn next_batch(&mut self) -> Option<Range<usize>> {
        if self.token.is_cancelled() {
            self.pending.clear();
            return None;
        }
        self.pending.pop_front()
    }

    pub fn cancel(&mut self) {
        self.token.cancel();
        self.pending.clear();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Handle that observes (and can trigger) cancellation from elsewhere.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn total_batches(&self) -> usize {
        self.total_batches
    }

    pub fn completed(&self) -> usize {
        self.total_batches - self.pending.len()
    }

    pub fn is_streaming(&self) -> bool {
        self.total_batches > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_input_is_one_batch() {
        let mut queue = BatchQueue::plan(1_000, 1_000, 1_000);
        assert_eq!(queue.total_batches(), 1);
        assert!(!queue.is_streaming());
        assert_eq!(queue.next_batch(), Some(0..1_000));
        assert_eq!(queue.next_batch(), None);
    }

    #[test]
    fn test_large_input_is_split_in_order() {
        let mut queue = BatchQueue::plan(2_500, 1_000, 1_000);
        assert_eq!(queue.total_batches(), 3);
        assert_eq!(queue.next_batch(), Some(0..1_000));
        assert_eq!(queue.next_batch(), Some(1_000..2_000));
        assert_eq!(queue.completed(), 2);
        assert_eq!(queue.next_batch(), Some(2_000..2_500));
        assert_eq!(queue.remaining(), 0);
    }

    #[test]
    fn test_cancel_through_token() {
        let mut queue = BatchQueue::plan(5_000, 1_000, 1_000);
        let token = queue.token();
        queue.next_batch();
        token.cancel();
        assert!(queue.is_cancelled());
        assert_eq!(queue.next_batch(), None);
        assert_eq!(queue.remaining(), 0);
    }
}
