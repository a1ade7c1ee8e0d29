use crate::event::EventRecord;
use crossbeam_queue::ArrayQueue;

/// Bounded FIFO of pending records; overflow drops the oldest record.
#[derive(Debug)]
pub struct EventQueue {
    queue: ArrayQueue<EventRecord>,
    discarded: u64,
}

impl EventQueue {
    /// Creates an empty queue holding at most `max_buffer_size` records.
    pub fn new(max_buffer_size: usize) -> Self {
        assert!(max_buffer_size > 0, "event queue capacity must be > 0");
        Self {
            queue: ArrayQueue::new(max_buffer_size),
            discarded: 0,
        }
    }

    /// Appends `record`, returning the record displaced from the head when full.
    pub fn enqueue(&mut self, record: EventRecord) -> Option<EventRecord> {
        let displaced = self.queue.force_push(record);
        if displaced.is_some() {
            self.discarded += 1;
        }
        displaced
    }

    /// Removes up to `max` records from the head, oldest first.
    pub fn dequeue_batch(&mut self, max: usize) -> Vec<EventRecord> {
        let take = max.min(self.queue.len());
        let mut batch = Vec::with_capacity(take);
        while batch.len() < max {
            match self.queue.pop() {
                Some(record) => batch.push(record),
                None => break,
            }
        }
        batch
    }

    /// Returns and resets the number of records dropped since the last call.
    pub fn take_discarded(&mut self) -> u64 {
        std::mem::take(&mut self.discarded)
    }

    /// Records dropped since the counter was last taken.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Number of queued records.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Maximum number of records the queue holds.
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Returns true when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
