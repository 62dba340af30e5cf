// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Scheduler
//!
//! Delayed and periodic delivery. Every schedule is an independent task that sleeps and then
//! submits to the target, so it outlives the caller. A [`Cancelable`] calls a pending delivery off;
//! cancelling after the message was sent has no effect.
//!

use crate::{Actor, ActorPath, ActorRef};

use tokio::{select, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use std::time::Duration;

/// Handle of a scheduled delivery.
#[derive(Clone, Debug, Default)]
pub struct Cancelable {
    token: CancellationToken,
}

impl Cancelable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls the delivery off. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// Entry point for delayed deliveries.
pub struct Scheduler;

impl Scheduler {
    /// Submits `message` to `target` once `delay` has elapsed. The envelope carries `sender`.
    pub fn schedule_tell_once<A: Actor>(
        delay: Duration,
        target: ActorRef<A>,
        message: A::Message,
        sender: Option<ActorPath>,
    ) {
        tokio::spawn(async move {
            sleep(delay).await;
            if let Err(error) = target.submit(message, sender).await {
                debug!("Scheduled message was not delivered: {}", error);
            }
        });
    }

    /// Like [`Scheduler::schedule_tell_once`], returning a handle that calls the delivery off.
    pub fn schedule_tell_once_cancelable<A: Actor>(
        delay: Duration,
        target: ActorRef<A>,
        message: A::Message,
        sender: Option<ActorPath>,
    ) -> Cancelable {
        let cancelable = Cancelable::new();
        let token = cancelable.token();
        tokio::spawn(async move {
            select! {
                biased;
                _ = token.cancelled() => {}
                _ = sleep(delay) => {
                    if let Err(error) = target.submit(message, sender).await {
                        debug!("Scheduled message was not delivered: {}", error);
                    }
                }
            }
        });
        cancelable
    }

    /// Submits a clone of `message` after `initial_delay` and then every `interval`.
    ///
    /// Stops when cancelled, which never interrupts a delivery in flight, or when the target
    /// rejects a message because it stopped.
    pub fn schedule_tell_repeatedly<A>(
        initial_delay: Duration,
        interval: Duration,
        target: ActorRef<A>,
        message: A::Message,
        sender: Option<ActorPath>,
    ) -> Cancelable
    where
        A: Actor,
        A::Message: Clone,
    {
        let cancelable = Cancelable::new();
        let token = cancelable.token();
        tokio::spawn(async move {
            let mut delay = initial_delay;
            loop {
                select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = sleep(delay) => {}
                }
                if let Err(error) = target.submit(message.clone(), sender.clone()).await {
                    debug!(
                        "Repeated delivery to {} ends: {}",
                        target.path(),
                        error
                    );
                    break;
                }
                delay = interval;
            }
        });
        cancelable
    }
}
