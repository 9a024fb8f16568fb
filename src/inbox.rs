//! Command inbox between the messenger task and the control loop.
//!
//! Uses an `embassy-sync` bounded channel so the messenger (its own
//! thread, blocking on the network) can hand raw payloads to the
//! synchronous control loop without heap allocation.  The control loop is
//! the only consumer, so the engine keeps a single writer.
//!
//! ```text
//! ┌──────────────┐  InboundMsg  ┌──────────────┐
//! │  Messenger   │─────────────▶│ Control Loop │
//! │  (thread)    │              │ (1 Hz tick)  │
//! └──────────────┘              └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;
use log::warn;

/// Largest accepted command payload.  A full 16-event `reconfigure` fits.
pub const MAX_PAYLOAD: usize = 1024;

/// Channel depth for inbound messages.
const INBOX_DEPTH: usize = 8;

/// One raw command payload, still undecoded.
pub struct InboundMsg {
    pub payload: Vec<u8, MAX_PAYLOAD>,
}

/// Why a payload never reached the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboxError {
    /// Payload larger than [`MAX_PAYLOAD`].
    TooLarge { len: usize },
    /// The control loop has fallen behind.
    Full,
}

impl core::fmt::Display for InboxError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TooLarge { len } => write!(f, "payload too large ({} > {} bytes)", len, MAX_PAYLOAD),
            Self::Full => write!(f, "inbox full"),
        }
    }
}

/// Bounded MPSC queue of inbound payloads.
pub struct Inbox {
    channel: Channel<CriticalSectionRawMutex, InboundMsg, INBOX_DEPTH>,
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Inbox {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Queue a payload without blocking.  A dropped payload is logged and
    /// reported to the caller; the sender may retry or give up.
    pub fn push(&self, payload: &[u8]) -> Result<(), InboxError> {
        let payload = Vec::from_slice(payload).map_err(|()| {
            let e = InboxError::TooLarge { len: payload.len() };
            warn!("Inbox: dropped, {}", e);
            e
        })?;
        self.channel.try_send(InboundMsg { payload }).map_err(|_| {
            warn!("Inbox: dropped, {}", InboxError::Full);
            InboxError::Full
        })
    }

    /// Hand every queued payload to `f`, oldest first.  Never blocks.
    /// Returns the number of payloads handled.
    pub fn drain(&self, mut f: impl FnMut(&[u8])) -> usize {
        let mut handled = 0;
        while let Ok(msg) = self.channel.try_receive() {
            f(&msg.payload);
            handled += 1;
        }
        handled
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

/// Inbox shared by the messenger thread and the control loop.
pub static INBOX: Inbox = Inbox::new();
