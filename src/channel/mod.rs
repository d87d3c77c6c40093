//! Named typed channels multiplexed over a single client connection (spec
//! §4.H): a bounded producer/consumer queue per channel, a state machine
//! that tracks handshake and teardown, and flow-control windows sized off
//! `crossbeam-channel`'s bounded capacity rather than a hand-rolled credit
//! counter.

use crate::id::Id;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    ClientData,
    Text,
}

/// One item traveling through a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelItem {
    Data(Vec<u8>),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Opening,
    Open,
    /// The flow-control window is full; producers must wait for the
    /// consumer to drain before sending again (spec §8 scenario S5).
    Blocked,
    Closing,
    Closed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel is closing or already closed")]
    Closed,
    #[error("channel's flow-control window is full")]
    WouldBlock,
    #[error("channel already has a different receiver registered")]
    ReceiverAlreadyRegistered,
}

type ReceiverCallback = Arc<dyn Fn(ChannelItem) + Send + Sync>;

/// A single named, typed channel (spec §4.H): a conduit between a
/// server-side producer and *exactly one* consumer. `owner` is the entity
/// the channel is opened on behalf of (typically a connected player), used
/// to disambiguate channels with the same name across distinct sessions.
pub struct Channel {
    pub name: String,
    pub kind: ChannelKind,
    pub subtype: String,
    pub owner: Id,
    state: Mutex<ChannelState>,
    sender: crossbeam_channel::Sender<ChannelItem>,
    receiver_queue: crossbeam_channel::Receiver<ChannelItem>,
    receiver: Mutex<Option<ReceiverCallback>>,
}

impl Channel {
    pub fn new(name: impl Into<String>, kind: ChannelKind, subtype: impl Into<String>, owner: Id, window: usize) -> Self {
        let (sender, receiver_queue) = crossbeam_channel::bounded(window.max(1));
        Self {
            name: name.into(),
            kind,
            subtype: subtype.into(),
            owner,
            state: Mutex::new(ChannelState::Opening),
            sender,
            receiver_queue,
            receiver: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    /// Completes the open handshake (spec §4.H). A no-op once past
    /// `Opening`.
    pub fn mark_open(&self) {
        let mut state = self.state.lock();
        if *state == ChannelState::Opening {
            *state = ChannelState::Open;
        }
    }

    /// Enqueues `item` and fans it out to every registered receiver. A
    /// channel with zero registered receivers still reports success — a
    /// dataless sink is a valid configuration (spec §9 open question,
    /// resolved in favor of "null receiver counts as delivered" rather
    /// than silently failing every send on a channel nobody is draining
    /// yet).
    pub fn send_item(&self, item: ChannelItem) -> Result<bool, ChannelError> {
        {
            let state = *self.state.lock();
            if matches!(state, ChannelState::Closing | ChannelState::Closed) {
                return Err(ChannelError::Closed);
            }
        }

        if self.sender.try_send(item).is_err() {
            *self.state.lock() = ChannelState::Blocked;
            return Err(ChannelError::WouldBlock);
        }

        self.drain_to_receivers();
        Ok(true)
    }

    /// Delivers every currently queued item to the registered receiver,
    /// then unblocks the channel if it was `Blocked`.
    fn drain_to_receivers(&self) {
        let receiver = self.receiver.lock();
        let Some(callback) = receiver.as_ref() else {
            return;
        };
        while let Ok(item) = self.receiver_queue.try_recv() {
            callback(item);
        }
        drop(receiver);

        let mut state = self.state.lock();
        if *state == ChannelState::Blocked {
            *state = ChannelState::Open;
        }
    }

    /// Registers the channel's single receiver (spec §4.H): allowed only
    /// when no receiver is set, or when re-registering the exact same
    /// callback (compared by pointer identity) a second time is a no-op.
    /// A second, *different* callback while one is already registered is
    /// rejected. Immediately flushes any backlog that accumulated before a
    /// receiver existed.
    pub fn register_receiver(&self, callback: ReceiverCallback) -> Result<(), ChannelError> {
        {
            let mut receiver = self.receiver.lock();
            match receiver.as_ref() {
                Some(existing) if !Arc::ptr_eq(existing, &callback) => {
                    return Err(ChannelError::ReceiverAlreadyRegistered);
                }
                _ => *receiver = Some(callback),
            }
        }
        self.mark_open();
        self.drain_to_receivers();
        Ok(())
    }

    /// Unregisters the channel's receiver, closing the channel (spec
    /// §4.H): there is no one left to observe further sends, so keeping it
    /// open only to buffer unread data is pointless.
    pub fn unregister_receiver(&self) {
        self.receiver.lock().take();
        self.internal_close();
    }

    /// Requests a graceful close (spec §4.G `ChannelRequestClose`): flushes
    /// whatever is left in the queue to any still-registered receivers,
    /// then closes.
    pub fn request_close(&self) {
        *self.state.lock() = ChannelState::Closing;
        self.drain_to_receivers();
        self.internal_close();
    }

    fn internal_close(&self) {
        *self.state.lock() = ChannelState::Closed;
    }

    pub fn receiver_count(&self) -> usize {
        if self.receiver.lock().is_some() {
            1
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn send_with_no_receiver_still_succeeds() {
        let channel = Channel::new("main", ChannelKind::Text, "", Id::new(1, 1), 4);
        assert_eq!(channel.send_item(ChannelItem::Text("hi".into())), Ok(true));
    }

    #[test]
    fn registering_a_receiver_flushes_backlog() {
        let channel = Channel::new("main", ChannelKind::Text, "", Id::new(1, 1), 4);
        channel.send_item(ChannelItem::Text("one".into())).unwrap();
        channel.send_item(ChannelItem::Text("two".into())).unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        channel.register_receiver(Arc::new(move |item| sink.lock().push(item))).unwrap();

        assert_eq!(
            *received.lock(),
            vec![ChannelItem::Text("one".into()), ChannelItem::Text("two".into())]
        );
    }

    #[test]
    fn registering_a_second_different_receiver_is_rejected() {
        let channel = Channel::new("main", ChannelKind::Text, "", Id::new(1, 1), 4);
        channel.register_receiver(Arc::new(|_| {})).unwrap();
        assert_eq!(
            channel.register_receiver(Arc::new(|_| {})),
            Err(ChannelError::ReceiverAlreadyRegistered)
        );
    }

    #[test]
    fn reregistering_the_same_receiver_is_allowed() {
        let channel = Channel::new("main", ChannelKind::Text, "", Id::new(1, 1), 4);
        let callback: ReceiverCallback = Arc::new(|_| {});
        channel.register_receiver(callback.clone()).unwrap();
        assert_eq!(channel.register_receiver(callback), Ok(()));
        assert_eq!(channel.receiver_count(), 1);
    }

    #[test]
    fn full_window_reports_would_block_until_drained() {
        let channel = Channel::new("main", ChannelKind::ClientData, "", Id::new(1, 1), 1);
        channel.send_item(ChannelItem::Data(vec![1])).unwrap();
        assert_eq!(
            channel.send_item(ChannelItem::Data(vec![2])),
            Err(ChannelError::WouldBlock)
        );
        assert_eq!(channel.state(), ChannelState::Blocked);

        let count = Arc::new(AtomicUsize::new(0));
        let sink = count.clone();
        channel
            .register_receiver(Arc::new(move |_| {
                sink.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(channel.state(), ChannelState::Open);

        assert_eq!(channel.send_item(ChannelItem::Data(vec![3])), Ok(true));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unregistering_the_receiver_closes_channel() {
        let channel = Channel::new("main", ChannelKind::Text, "", Id::new(1, 1), 4);
        channel.register_receiver(Arc::new(|_| {})).unwrap();
        assert_eq!(channel.state(), ChannelState::Open);
        channel.unregister_receiver();
        assert_eq!(channel.state(), ChannelState::Closed);
    }

    #[test]
    fn send_after_close_is_rejected() {
        let channel = Channel::new("main", ChannelKind::Text, "", Id::new(1, 1), 4);
        channel.request_close();
        assert_eq!(
            channel.send_item(ChannelItem::Text("late".into())),
            Err(ChannelError::Closed)
        );
    }
}
