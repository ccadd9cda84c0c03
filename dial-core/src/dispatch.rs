//! Cross-context command hand-off contracts.
//!
//! The render context produces [`CommandQueueItem`]s and the network context
//! consumes them. Producers never block: a full queue drops the newest item.

use core::fmt;
use core::fmt::Write as _;

use heapless::{String, Vec};

use crate::codec::MAX_COMMAND_LEN;

/// Depth of the render → network command queue.
pub const COMMAND_QUEUE_DEPTH: usize = 16;

/// Bounded command payload.
pub type Payload = String<MAX_COMMAND_LEN>;

/// What the network context should do with an item.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandKind {
    /// Retarget the mixer address; the payload is the new last octet.
    SetDestinationAddress,
    /// Encode the payload as a command frame and send it.
    SendProtocolCommand,
    /// Persist the diagnostic-serial flag; the payload is `0` or `1`.
    SetDiagnosticSerial,
}

/// One queued command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandQueueItem {
    pub kind: CommandKind,
    pub payload: Payload,
}

impl CommandQueueItem {
    /// Wraps mixer command text.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadTooLong`] if `text` exceeds the payload bound.
    pub fn protocol(text: &str) -> Result<Self, PayloadTooLong> {
        let mut payload = Payload::new();
        payload
            .push_str(text)
            .map_err(|_| PayloadTooLong(text.len()))?;
        Ok(Self {
            kind: CommandKind::SendProtocolCommand,
            payload,
        })
    }

    /// Requests a new destination octet.
    #[must_use]
    pub fn destination(octet: u8) -> Self {
        Self {
            kind: CommandKind::SetDestinationAddress,
            payload: small_payload(format_args!("{octet}")),
        }
    }

    /// Requests the diagnostic serial flag be stored.
    #[must_use]
    pub fn diagnostic_serial(enabled: bool) -> Self {
        Self {
            kind: CommandKind::SetDiagnosticSerial,
            payload: small_payload(format_args!("{}", u8::from(enabled))),
        }
    }
}

fn small_payload(args: fmt::Arguments<'_>) -> Payload {
    let mut payload = Payload::new();
    // A u8 always fits.
    let _ = payload.write_fmt(args);
    payload
}

/// Command text longer than [`MAX_COMMAND_LEN`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PayloadTooLong(pub usize);

impl fmt::Display for PayloadTooLong {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "payload of {} bytes exceeds {MAX_COMMAND_LEN}", self.0)
    }
}

/// Error surfaced when enqueueing fails.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandEnqueueError {
    /// Queue is at capacity; the submitted item was dropped.
    QueueFull,
}

impl fmt::Display for CommandEnqueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => f.write_str("command queue full"),
        }
    }
}

/// Producer side of the command queue.
pub trait CommandQueueProducer {
    /// Attempts to enqueue without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`CommandEnqueueError::QueueFull`] when the item was dropped.
    fn try_enqueue(&mut self, item: CommandQueueItem) -> Result<(), CommandEnqueueError>;
}

/// Consumer side of the command queue.
pub trait CommandQueueConsumer {
    /// Takes the oldest item, if any.
    fn try_dequeue(&mut self) -> Option<CommandQueueItem>;

    /// Moves everything currently queued into `out`, oldest first.
    ///
    /// Stops early if `out` fills; returns the number of items moved.
    fn drain_into<const N: usize>(&mut self, out: &mut Vec<CommandQueueItem, N>) -> usize {
        let mut moved = 0;
        while !out.is_full() {
            let Some(item) = self.try_dequeue() else {
                break;
            };
            if out.push(item).is_err() {
                break;
            }
            moved += 1;
        }
        moved
    }
}
