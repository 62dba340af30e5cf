// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Event sink and subscriber pattern implementation.
//!
//! A `Sink` consumes a broadcast receiver in its own task and notifies a `Subscriber` of each
//! event. Producers only publish on the channel, so subscriber code never runs on their path; a
//! subscriber that panics is logged and the sink keeps running.

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::broadcast::{error::RecvError, Receiver as EventReceiver};

use tracing::{debug, error};

use std::{fmt::Debug, panic::AssertUnwindSafe};

/// Events published on a broadcast channel and consumed by sinks.
pub trait Event: Debug + Clone + Send + Sync + 'static {}

/// A sink that receives events and notifies a subscriber.
///
/// # Type Parameters
///
/// * `E` - The event type that this sink will process.
///
pub struct Sink<E: Event> {
    /// The subscriber that will be notified of events.
    subscriber: Box<dyn Subscriber<E>>,
    /// The broadcast receiver for events.
    event_receiver: EventReceiver<E>,
}

impl<E: Event> Sink<E> {
    /// Creates a new Sink with the given event receiver and subscriber.
    pub fn new(
        event_receiver: EventReceiver<E>,
        subscriber: impl Subscriber<E>,
    ) -> Self {
        Sink {
            subscriber: Box::new(subscriber),
            event_receiver,
        }
    }

    /// Runs the sink's event processing loop until the channel is closed. Should be spawned in a
    /// separate task.
    ///
    /// Lagged events are skipped.
    pub async fn run(&mut self) {
        loop {
            match self.event_receiver.recv().await {
                Ok(event) => {
                    debug!(
                        "Received event: {:?}. Notify to the subscriber.",
                        event
                    );
                    let notified =
                        AssertUnwindSafe(self.subscriber.notify(event.clone()))
                            .catch_unwind()
                            .await;
                    if notified.is_err() {
                        error!("Subscriber panicked handling event {:?}.", event);
                    }
                }
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Sink lagged behind, {} events skipped.", skipped);
                }
            }
        }
    }
}

/// Trait for types that process the events delivered by a [`Sink`].
///
/// # Type Parameters
///
/// * `E` - The event type this subscriber can process.
///
#[async_trait]
pub trait Subscriber<E: Event>: Send + Sync + 'static {
    /// Called when an event is received by the sink.
    async fn notify(&self, event: E);
}
