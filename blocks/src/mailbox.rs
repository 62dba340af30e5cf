// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Mailbox
//!
//! Bounded, ordered queue between the producers of a block and its message loop. Any number of
//! senders may enqueue concurrently; exactly one receiver, owned by the loop, dequeues. Closing the
//! receiver stops further enqueues while the envelopes already accepted can still be drained.
//!

use crate::Envelope;

use tokio::sync::mpsc::{self, error::TrySendError};

/// Capacity used when neither the actor nor the system configuration override it.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1;

/// Mailbox sender side. Cloned into every `ActorRef`.
pub(crate) type MailboxSender<M> = mpsc::Sender<Envelope<M>>;

/// Non-owning sender side, used by a block to address itself without keeping its mailbox alive.
pub(crate) type WeakMailboxSender<M> = mpsc::WeakSender<Envelope<M>>;

/// Mailbox receiver side. Owned by the message loop.
pub(crate) type MailboxReceiver<M> = mpsc::Receiver<Envelope<M>>;

/// Creates a bounded mailbox. Callers validate `capacity` beforehand.
pub(crate) fn mailbox<M>(capacity: usize) -> (MailboxSender<M>, MailboxReceiver<M>) {
    mpsc::channel(capacity.max(1))
}

/// Envelope handed back by a non-blocking enqueue that could not be accepted.
#[derive(Debug)]
pub enum Rejected<M> {
    /// The mailbox has no free slot right now.
    Full(Envelope<M>),
    /// The block is stopping or stopped.
    Stopped(Envelope<M>),
}

impl<M> Rejected<M> {
    pub fn is_full(&self) -> bool {
        matches!(self, Rejected::Full(_))
    }

    pub fn into_envelope(self) -> Envelope<M> {
        match self {
            Rejected::Full(envelope) | Rejected::Stopped(envelope) => envelope,
        }
    }
}

impl<M> From<TrySendError<Envelope<M>>> for Rejected<M> {
    fn from(error: TrySendError<Envelope<M>>) -> Self {
        match error {
            TrySendError::Full(envelope) => Rejected::Full(envelope),
            TrySendError::Closed(envelope) => Rejected::Stopped(envelope),
        }
    }
}
