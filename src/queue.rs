//! Delayed-task queue: a min-heap of pending work ordered by due time.
//!
//! Pure data structure with no locking of its own; the runner accesses it
//! only under the scheduler mutex. Ties on due time are broken by a
//! monotonically increasing sequence assigned at push, so equal-due tasks
//! pop in submission order.

use crate::types::Time;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

/// A unit of work owned by the queue until it executes exactly once.
pub(crate) type Task = Box<dyn FnOnce() + Send>;

/// A due entry handed to the worker, in pop order.
pub(crate) struct ReadyTask {
    /// Submission sequence, kept for panic reporting.
    pub seq: u64,
    /// The task body.
    pub task: Task,
}

/// Batch of due entries drained in one worker pass.
pub(crate) type ReadyBatch = SmallVec<[ReadyTask; 8]>;

struct QueueEntry {
    due: Time,
    seq: u64,
    task: Task,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest due first, FIFO on ties).
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A min-heap of tasks ordered by `(due, seq)` ascending.
#[derive(Default)]
pub(crate) struct DelayQueue {
    heap: BinaryHeap<QueueEntry>,
    next_seq: u64,
}

impl DelayQueue {
    /// Creates a new empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns true if no tasks are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pushes a task due at the given time and returns its sequence.
    pub fn push(&mut self, due: Time, task: Task) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueueEntry { due, seq, task });
        seq
    }

    /// Returns the earliest due time, if any.
    #[must_use]
    pub fn peek_due(&self) -> Option<Time> {
        self.heap.peek().map(|e| e.due)
    }

    /// Pops every task whose due time is `<= now`, in `(due, seq)` order.
    pub fn pop_due(&mut self, now: Time) -> ReadyBatch {
        let mut ready = ReadyBatch::new();
        while let Some(entry) = self.heap.peek() {
            if entry.due > now {
                break;
            }
            if let Some(entry) = self.heap.pop() {
                ready.push(ReadyTask {
                    seq: entry.seq,
                    task: entry.task,
                });
            } else {
                break;
            }
        }
        ready
    }
}

impl fmt::Debug for DelayQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayQueue")
            .field("len", &self.heap.len())
            .field("next_seq", &self.next_seq)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn noop() -> Task {
        Box::new(|| {})
    }

    #[test]
    fn empty_queue_has_no_due_time() {
        let queue = DelayQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.peek_due(), None);
    }

    #[test]
    fn push_orders_by_due_time() {
        let mut queue = DelayQueue::new();
        queue.push(Time::from_millis(200), noop());
        queue.push(Time::from_millis(100), noop());
        queue.push(Time::from_millis(150), noop());

        assert_eq!(queue.peek_due(), Some(Time::from_millis(100)));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn pop_due_returns_all_due_tasks() {
        let mut queue = DelayQueue::new();
        queue.push(Time::from_millis(100), noop());
        queue.push(Time::from_millis(200), noop());
        queue.push(Time::from_millis(50), noop());

        let ready = queue.pop_due(Time::from_millis(125));
        assert_eq!(ready.len(), 2);
        assert_eq!(queue.peek_due(), Some(Time::from_millis(200)));
    }

    #[test]
    fn equal_due_times_pop_in_submission_order() {
        let mut queue = DelayQueue::new();
        let due = Time::from_millis(10);
        let first = queue.push(due, noop());
        let second = queue.push(due, noop());
        let third = queue.push(due, noop());

        let ready = queue.pop_due(due);
        let seqs: Vec<u64> = ready.iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![first, second, third]);
    }

    #[test]
    fn sequence_is_monotonic() {
        let mut queue = DelayQueue::new();
        let a = queue.push(Time::from_millis(5), noop());
        let b = queue.push(Time::from_millis(1), noop());
        assert!(b > a);
    }

    proptest! {
        // Popping everything must yield non-decreasing (due, seq) pairs
        // regardless of push order.
        #[test]
        fn pop_order_is_sorted_by_due_then_seq(dues in proptest::collection::vec(0_u64..500, 1..64)) {
            let mut queue = DelayQueue::new();
            for due in &dues {
                queue.push(Time::from_millis(*due), noop());
            }

            let ready = queue.pop_due(Time::MAX);
            prop_assert_eq!(ready.len(), dues.len());

            let mut sorted: Vec<(u64, u64)> = dues
                .iter()
                .enumerate()
                .map(|(seq, due)| (*due, seq as u64))
                .collect();
            sorted.sort_unstable();
            let popped: Vec<(u64, u64)> = ready
                .iter()
                .map(|r| (dues[r.seq as usize], r.seq))
                .collect();
            prop_assert_eq!(popped, sorted);
        }
    }
}
