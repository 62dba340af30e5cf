// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor runner
//!
//! Every actor is executed by its own `ActorRunner`, spawned as an independent tokio task. The
//! runner drives the actor through its lifecycle:
//!
//! - runs `pre_start` and reports the outcome to the creating call;
//! - dequeues one envelope at a time and awaits its handler before dequeuing the next, so at most
//!   one handler of the actor is ever in flight;
//! - closes the mailbox when the actor starts stopping and drains what was already accepted;
//! - runs `pre_stop`, reports that the loop exited and completes the stop sequence.
//!
//! A handler that returns an error or panics makes the actor fail-stop: the error is logged, the
//! actor enters the stopping state and the envelopes still queued are discarded.
//!

use crate::{
    actor::{Actor, ActorContext},
    cell::ActorCell,
    mailbox::MailboxReceiver,
    Envelope, Error, Receive,
};

use futures::FutureExt;
use tokio::{select, sync::oneshot, time};
use tracing::{debug, error};

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

/// Next thing the loop has to react to.
enum Signal<M> {
    /// The actor started stopping; close the mailbox.
    Close,
    Envelope(Envelope<M>),
    /// Mailbox closed and empty.
    Drained,
    /// No message within the idle timeout.
    Idle,
}

pub(crate) struct ActorRunner<A: Actor> {
    actor: A,
    cell: Arc<ActorCell>,
    receiver: MailboxReceiver<A::Message>,
    receive: Receive<A>,
    faulted: bool,
    closed: bool,
}

impl<A: Actor> ActorRunner<A> {
    pub(crate) fn new(
        actor: A,
        cell: Arc<ActorCell>,
        receiver: MailboxReceiver<A::Message>,
    ) -> Self {
        Self {
            actor,
            cell,
            receiver,
            receive: Receive::new(),
            faulted: false,
            closed: false,
        }
    }

    /// Runs the actor to termination. `started` receives whether `pre_start` succeeded.
    pub(crate) async fn run(
        mut self,
        mut ctx: ActorContext<A>,
        started: oneshot::Sender<bool>,
    ) {
        debug!("Starting actor {}.", self.cell.path());
        let start = AssertUnwindSafe(self.actor.pre_start(&mut ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(Error::Functional(panic_message(&*panic)))
            });

        let running = match start {
            Ok(()) => {
                ctx.apply_transition();
                self.receive = A::receive(ctx.behavior());
                let _ = started.send(true);
                self.run_loop(&mut ctx).await;
                true
            }
            Err(error) => {
                error!(
                    "Actor {} failed to start: {}",
                    self.cell.path(),
                    error
                );
                self.cell.begin_stop();
                let _ = started.send(false);
                false
            }
        };

        self.receiver.close();
        while self.receiver.try_recv().is_ok() {}

        if running {
            let stop = AssertUnwindSafe(self.actor.pre_stop(&mut ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(Error::Functional(panic_message(&*panic)))
                });
            if let Err(error) = stop {
                error!(
                    "Actor {} failed while stopping: {}",
                    self.cell.path(),
                    error
                );
            }
        }

        self.cell.mark_loop_exited();
        self.cell.clone().stop().await;
    }

    async fn run_loop(&mut self, ctx: &mut ActorContext<A>) {
        let closing = self.cell.closing();
        loop {
            let closed = self.closed;
            let idle = ctx.idle_timeout();
            let signal = select! {
                biased;
                _ = closing.cancelled(), if !closed => Signal::Close,
                signal = next_signal(&mut self.receiver, idle) => signal,
            };

            match signal {
                Signal::Close => {
                    self.receiver.close();
                    self.closed = true;
                }
                Signal::Idle => {
                    debug!(
                        "Actor {} has been idle for {:?}.",
                        self.cell.path(),
                        idle
                    );
                    self.cell.begin_stop();
                }
                Signal::Drained => break,
                Signal::Envelope(envelope) => {
                    if self.faulted {
                        debug!(
                            "Actor {} discards message #{} after a failure.",
                            self.cell.path(),
                            envelope.sequence()
                        );
                    } else {
                        self.dispatch(envelope, ctx).await;
                    }
                }
            }
        }
    }

    async fn dispatch(
        &mut self,
        envelope: Envelope<A::Message>,
        ctx: &mut ActorContext<A>,
    ) {
        let sequence = envelope.sequence();
        match self.receive.resolve(envelope.payload()) {
            Some(handler) => {
                let handling = handler(&mut self.actor, envelope, &mut *ctx);
                let outcome = AssertUnwindSafe(handling).catch_unwind().await;
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => self.fault(sequence, &error.to_string()),
                    Err(panic) => self.fault(sequence, &panic_message(&*panic)),
                }
            }
            None => self.actor.on_unhandled(envelope, ctx).await,
        }

        if ctx.apply_transition() {
            self.receive = A::receive(ctx.behavior());
        }
    }

    fn fault(&mut self, sequence: u64, reason: &str) {
        error!(
            "Actor {} failed handling message #{}: {}",
            self.cell.path(),
            sequence,
            reason
        );
        self.faulted = true;
        self.cell.begin_stop();
    }
}

async fn next_signal<M>(
    receiver: &mut MailboxReceiver<M>,
    idle: Option<Duration>,
) -> Signal<M> {
    match idle {
        Some(idle) => match time::timeout(idle, receiver.recv()).await {
            Ok(Some(envelope)) => Signal::Envelope(envelope),
            Ok(None) => Signal::Drained,
            Err(_) => Signal::Idle,
        },
        None => receiver
            .recv()
            .await
            .map_or(Signal::Drained, Signal::Envelope),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_owned()
    }
}
