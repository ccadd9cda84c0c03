use std::thread;

use dial_core::dispatch::{COMMAND_QUEUE_DEPTH, CommandEnqueueError, CommandQueueItem};
use volume_dial_firmware::SharedState;
use volume_dial_firmware::dispatch::CommandDispatchQueue;

fn numbered(index: usize) -> CommandQueueItem {
    CommandQueueItem::protocol(&format!("strip(5).gain += {index}")).unwrap()
}

#[test]
fn overflow_drops_newest_and_keeps_fifo() {
    let queue = CommandDispatchQueue::new();
    let mut rejected = 0;
    for index in 0..20 {
        match queue.push(numbered(index)) {
            Ok(()) => {}
            Err(CommandEnqueueError::QueueFull) => rejected += 1,
        }
    }
    assert_eq!(rejected, 4);
    assert_eq!(queue.dropped_count(), 4);

    let drained = queue.drain_all();
    assert_eq!(drained.len(), COMMAND_QUEUE_DEPTH);
    for (index, item) in drained.iter().enumerate() {
        assert_eq!(item, &numbered(index));
    }
    assert!(queue.drain_all().is_empty());
}

#[test]
fn producer_and_consumer_on_separate_threads() {
    static SHARED: SharedState = SharedState::new();
    const TOTAL: usize = 200;

    let producer = thread::spawn(|| {
        for index in 0..TOTAL {
            while SHARED.commands.push(numbered(index)).is_err() {
                thread::yield_now();
            }
        }
    });

    let mut received = Vec::with_capacity(TOTAL);
    while received.len() < TOTAL {
        let drained = SHARED.commands.drain_all();
        if drained.is_empty() {
            thread::yield_now();
        }
        received.extend(drained);
    }
    producer.join().unwrap();

    let expected: Vec<_> = (0..TOTAL).map(numbered).collect();
    assert_eq!(received, expected);
}
