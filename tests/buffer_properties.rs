use std::collections::VecDeque;

use healthmon::{EventCounters, EventQueue, WebEvent};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Enqueue,
    Dequeue(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Enqueue),
        1 => (1usize..8).prop_map(Op::Dequeue),
    ]
}

proptest! {
    #[test]
    fn queue_matches_drop_oldest_model(
        capacity in 1usize..16,
        ops in proptest::collection::vec(op(), 0..200),
    ) {
        let counters = EventCounters::new();
        let mut queue = EventQueue::new(capacity);
        let mut model: VecDeque<u64> = VecDeque::new();
        let mut enqueued = 0u64;
        let mut flushed = 0u64;
        let mut discarded = 0u64;

        for step in ops {
            match step {
                Op::Enqueue => {
                    let record = counters.stamp(WebEvent::new(100_000, "prop"));
                    model.push_back(record.sequence());
                    enqueued += 1;
                    let displaced = queue.enqueue(record).map(|r| r.sequence());
                    let expected = if model.len() > capacity {
                        model.pop_front()
                    } else {
                        None
                    };
                    prop_assert_eq!(displaced, expected);
                    discarded += queue.take_discarded();
                }
                Op::Dequeue(max) => {
                    let batch: Vec<u64> =
                        queue.dequeue_batch(max).iter().map(|r| r.sequence()).collect();
                    let take = max.min(model.len());
                    let expected: Vec<u64> = model.drain(..take).collect();
                    prop_assert_eq!(&batch, &expected);
                    flushed += batch.len() as u64;
                }
            }
            prop_assert!(queue.len() <= capacity);
            prop_assert_eq!(queue.len(), model.len());
            prop_assert_eq!(discarded, enqueued - flushed - queue.len() as u64);
        }
    }
}
