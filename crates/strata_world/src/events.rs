//! Block change notifications.
//!
//! Listeners run synchronously on the mutating thread after the write has
//! been applied. Long-running consumers (network sync, plugins) should hand
//! the change off through a [`ChannelListener`].

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::flags::SetBlockOptions;

/// A completed block write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockChange {
    /// World X.
    pub x: i32,
    /// World Y.
    pub y: i32,
    /// World Z.
    pub z: i32,
    /// Id before the write.
    pub old_id: u32,
    /// Id after the write.
    pub new_id: u32,
    /// Options the write was issued with.
    pub options: SetBlockOptions,
}

impl BlockChange {
    /// True if the change should be presented as a physics break.
    #[inline]
    #[must_use]
    pub const fn is_physics_break(&self) -> bool {
        self.options.contains(SetBlockOptions::PHYSICS_BREAK)
    }

    /// True if the new block should receive fresh extra state.
    #[inline]
    #[must_use]
    pub const fn wants_state_init(&self) -> bool {
        !self.options.contains(SetBlockOptions::SKIP_STATE_INIT)
    }
}

/// Receives block changes after they are applied.
pub trait BlockChangeListener: Send + Sync {
    /// Called once per applied change.
    fn on_block_changed(&self, change: &BlockChange);
}

impl<F> BlockChangeListener for F
where
    F: Fn(&BlockChange) + Send + Sync,
{
    fn on_block_changed(&self, change: &BlockChange) {
        self(change);
    }
}

/// Forwards changes over a crossbeam channel.
///
/// Sending never blocks: on a full channel the change is dropped and counted.
pub struct ChannelListener {
    sender: Sender<BlockChange>,
    dropped: std::sync::atomic::AtomicU64,
}

impl ChannelListener {
    /// Wraps an existing sender.
    #[must_use]
    pub const fn new(sender: Sender<BlockChange>) -> Self {
        Self {
            sender,
            dropped: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Creates a listener with a bounded channel.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, Receiver<BlockChange>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (Self::new(sender), receiver)
    }

    /// Creates a listener with an unbounded channel.
    #[must_use]
    pub fn unbounded() -> (Self, Receiver<BlockChange>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self::new(sender), receiver)
    }

    /// Changes dropped because the channel was full or closed.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(std::sync::atomic::Ordering::Relaxed)
    }
}

impl BlockChangeListener for ChannelListener {
    fn on_block_changed(&self, change: &BlockChange) {
        match self.sender.try_send(*change) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                tracing::trace!("change channel full, dropped ({}, {}, {})", change.x, change.y, change.z);
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        }
    }
}
