//! Bounded command queue from the render context to the network context.
//!
//! Producers never block: a push onto a full queue drops the new item and
//! reports [`CommandEnqueueError::QueueFull`]. The network side drains
//! everything queued once per iteration, oldest first.

use dial_core::dispatch::{
    COMMAND_QUEUE_DEPTH, CommandEnqueueError, CommandQueueConsumer, CommandQueueItem,
    CommandQueueProducer,
};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use heapless::Vec;
use portable_atomic::{AtomicU32, Ordering};

/// Channel type backing the queue.
pub type CommandChannel = Channel<CriticalSectionRawMutex, CommandQueueItem, COMMAND_QUEUE_DEPTH>;

/// Items drained in one network iteration.
pub type DrainedCommands = Vec<CommandQueueItem, COMMAND_QUEUE_DEPTH>;

pub struct CommandDispatchQueue {
    channel: CommandChannel,
    dropped: AtomicU32,
}

impl CommandDispatchQueue {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Enqueues without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`CommandEnqueueError::QueueFull`] when the queue is at capacity;
    /// the item is discarded.
    pub fn push(&self, item: CommandQueueItem) -> Result<(), CommandEnqueueError> {
        match self.channel.try_send(item) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
                log_dropped(dropped);
                Err(CommandEnqueueError::QueueFull)
            }
        }
    }

    /// Takes every queued item in FIFO order.
    #[must_use]
    pub fn drain_all(&self) -> DrainedCommands {
        let mut drained = DrainedCommands::new();
        self.consumer().drain_into(&mut drained);
        drained
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channel.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Items discarded because the queue was full.
    #[must_use]
    pub fn dropped_count(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub const fn producer(&self) -> DispatchProducer<'_> {
        DispatchProducer { queue: self }
    }

    #[must_use]
    pub const fn consumer(&self) -> DispatchConsumer<'_> {
        DispatchConsumer { queue: self }
    }
}

impl Default for CommandDispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer handle implementing the core queue trait.
#[derive(Copy, Clone)]
pub struct DispatchProducer<'a> {
    queue: &'a CommandDispatchQueue,
}

impl CommandQueueProducer for DispatchProducer<'_> {
    fn try_enqueue(&mut self, item: CommandQueueItem) -> Result<(), CommandEnqueueError> {
        self.queue.push(item)
    }
}

/// Consumer handle implementing the core queue trait.
#[derive(Copy, Clone)]
pub struct DispatchConsumer<'a> {
    queue: &'a CommandDispatchQueue,
}

impl CommandQueueConsumer for DispatchConsumer<'_> {
    fn try_dequeue(&mut self) -> Option<CommandQueueItem> {
        self.queue.channel.try_receive().ok()
    }
}

#[cfg(target_os = "none")]
fn log_dropped(total: u32) {
    defmt::warn!("dispatch: queue full, dropped command (total={})", total);
}

#[cfg(not(target_os = "none"))]
fn log_dropped(total: u32) {
    println!("dispatch: queue full, dropped command (total={total})");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_order() {
        let queue = CommandDispatchQueue::new();
        queue.push(CommandQueueItem::destination(9)).unwrap();
        queue
            .push(CommandQueueItem::protocol("Command.Button[0].State = 1").unwrap())
            .unwrap();

        let drained = queue.drain_all();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0], CommandQueueItem::destination(9));
        assert_eq!(drained[1].payload.as_str(), "Command.Button[0].State = 1");
        assert!(queue.is_empty());
    }

    #[test]
    fn producer_handle_reports_full() {
        let queue = CommandDispatchQueue::new();
        let mut producer = queue.producer();
        for _ in 0..COMMAND_QUEUE_DEPTH {
            producer
                .try_enqueue(CommandQueueItem::diagnostic_serial(true))
                .unwrap();
        }
        assert_eq!(
            producer.try_enqueue(CommandQueueItem::diagnostic_serial(false)),
            Err(CommandEnqueueError::QueueFull)
        );
        assert_eq!(queue.dropped_count(), 1);
        assert_eq!(queue.len(), COMMAND_QUEUE_DEPTH);
    }
}
