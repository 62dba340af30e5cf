// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Dispatch block
//!
//! Fans a stream of messages out to a pool of homogeneous workers, created as children named
//! `worker-0`, `worker-1`, ... when the block starts. Each message is offered without blocking to
//! the worker at the cursor:
//!
//! - [`DispatchPolicy::RoundRobin`] moves the cursor after every attempt, failed or not;
//! - [`DispatchPolicy::SpillOver`] moves it only when the worker refuses, so a worker keeps
//!   receiving until its mailbox is full.
//!
//! When every worker refused for the configured number of full sweeps, the backpressure signal is
//! raised once and the message is delivered to the worker at the cursor, waiting for a free slot.
//!

use crate::{
    backpressure::BackpressureSource, Actor, ActorContext, ActorRef, Envelope,
    Error, Receive,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How a dispatch block moves its cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchPolicy {
    RoundRobin,
    SpillOver,
}

impl DispatchPolicy {
    fn advances_on_success(&self) -> bool {
        matches!(self, DispatchPolicy::RoundRobin)
    }
}

pub struct DispatchBlock<C: Actor> {
    policy: DispatchPolicy,
    pending: Vec<C>,
    workers: Vec<ActorRef<C>>,
    cursor: usize,
    sweep_rounds: Option<usize>,
    mailbox_capacity: Option<usize>,
}

impl<C: Actor> DispatchBlock<C> {
    /// # Errors
    ///
    /// [`Error::Config`] if `workers` is empty.
    pub fn new(policy: DispatchPolicy, workers: Vec<C>) -> Result<Self, Error> {
        if workers.is_empty() {
            return Err(Error::Config(
                "a dispatch block needs at least one worker".to_owned(),
            ));
        }
        Ok(Self {
            policy,
            pending: workers,
            workers: Vec::new(),
            cursor: 0,
            sweep_rounds: None,
            mailbox_capacity: None,
        })
    }

    pub fn round_robin(workers: Vec<C>) -> Result<Self, Error> {
        Self::new(DispatchPolicy::RoundRobin, workers)
    }

    pub fn spill_over(workers: Vec<C>) -> Result<Self, Error> {
        Self::new(DispatchPolicy::SpillOver, workers)
    }

    /// Overrides the number of full sweeps tried before blocking. Zero counts as one.
    pub fn with_sweep_rounds(mut self, rounds: usize) -> Self {
        self.sweep_rounds = Some(rounds);
        self
    }

    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = Some(capacity);
        self
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.workers.len().max(1);
    }

    fn current(&self, ctx: &ActorContext<Self>) -> Result<ActorRef<C>, Error> {
        self.workers
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| Error::Stopped(ctx.path().clone()))
    }

    async fn route(
        &mut self,
        envelope: Envelope<C::Message>,
        ctx: &mut ActorContext<Self>,
    ) -> Result<(), Error> {
        let rounds = self.sweep_rounds.unwrap_or(1).max(1);
        let mut envelope = envelope;

        for round in 0..rounds {
            if round > 0 {
                tokio::task::yield_now().await;
            }
            for _ in 0..self.workers.len() {
                match self.current(ctx)?.offer_envelope(envelope) {
                    Ok(()) => {
                        if self.policy.advances_on_success() {
                            self.advance();
                        }
                        return Ok(());
                    }
                    Err(rejected) => {
                        envelope = rejected.into_envelope();
                        self.advance();
                    }
                }
            }
        }

        let worker = self.current(ctx)?;
        warn!(
            "All {} workers of {} are saturated, waiting on {}.",
            self.workers.len(),
            ctx.path(),
            worker.path()
        );
        ctx.system()
            .backpressure()
            .raise(ctx.path(), BackpressureSource::Dispatch);
        worker.deliver(envelope).await?;
        if self.policy.advances_on_success() {
            self.advance();
        }
        Ok(())
    }
}

#[async_trait]
impl<C: Actor> Actor for DispatchBlock<C> {
    type Message = C::Message;
    type Behavior = ();

    fn receive(_behavior: &()) -> Receive<Self> {
        Receive::<Self>::new()
            .on_any(|block, envelope, ctx| Box::pin(block.route(envelope, ctx)))
    }

    fn mailbox_capacity(&self) -> Option<usize> {
        self.mailbox_capacity
    }

    async fn pre_start(
        &mut self,
        ctx: &mut ActorContext<Self>,
    ) -> Result<(), Error> {
        let rounds = self
            .sweep_rounds
            .unwrap_or(ctx.system().config().dispatch_sweep_rounds);
        self.sweep_rounds = Some(rounds.max(1));

        let pending = std::mem::take(&mut self.pending);
        for (index, worker) in pending.into_iter().enumerate() {
            let name = format!("worker-{}", index);
            let worker = ctx.child_of(move |_| worker, &name).await?;
            self.workers.push(worker);
        }
        debug!(
            "Dispatch block {} started {} workers ({:?}).",
            ctx.path(),
            self.workers.len(),
            self.policy
        );
        Ok(())
    }
}
