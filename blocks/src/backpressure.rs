// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Backpressure signal
//!
//! Observational notification raised when a producer finds a mailbox full and is about to wait.
//! The monitor is built by the actor system and handed to every actor reference. Raising it only
//! bumps a counter and publishes on a broadcast channel, so it never blocks and subscriber code
//! never runs on the producer's path.
//!

use crate::{
    sink::{Event, Sink, Subscriber},
    ActorPath,
};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Where the saturation was observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackpressureSource {
    /// A blocking submit found the mailbox full.
    Submit,
    /// A dispatch block found its whole pool saturated.
    Dispatch,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackpressureEvent {
    /// Actor whose mailbox, or pool, was saturated.
    pub path: ActorPath,
    pub source: BackpressureSource,
    /// Running count of raised signals, this one included.
    pub raised: u64,
}

impl Event for BackpressureEvent {}

/// Multi-subscriber backpressure notification point.
#[derive(Clone, Debug)]
pub struct BackpressureMonitor {
    sender: broadcast::Sender<BackpressureEvent>,
    raised: Arc<AtomicU64>,
}

impl BackpressureMonitor {
    /// Creates a monitor keeping at most `capacity` undelivered events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            raised: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Raises the signal. Never blocks.
    pub fn raise(&self, path: &ActorPath, source: BackpressureSource) {
        let raised = self.raised.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Backpressure on {} ({:?}).", path, source);
        // No subscriber is not an error.
        let _ = self.sender.send(BackpressureEvent {
            path: path.clone(),
            source,
            raised,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BackpressureEvent> {
        self.sender.subscribe()
    }

    /// Sink feeding `subscriber`, ready for `SystemRef::run_sink`.
    pub fn sink(
        &self,
        subscriber: impl Subscriber<BackpressureEvent>,
    ) -> Sink<BackpressureEvent> {
        Sink::new(self.subscribe(), subscriber)
    }

    /// Signals raised so far.
    pub fn raised(&self) -> u64 {
        self.raised.load(Ordering::Relaxed)
    }

    pub fn subscribers(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BackpressureMonitor {
    fn default() -> Self {
        Self::new(crate::system::DEFAULT_BACKPRESSURE_BUFFER)
    }
}
