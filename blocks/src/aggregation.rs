// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Aggregation block
//!
//! Folds items into an [`Aggregator`] and flushes it `max_wait` after the item that opened the
//! current batch, or when the block stops. There is no count trigger: the aggregator decides what
//! a batch is by reporting, for each item, whether it opened a new one.
//!

use crate::{Actor, ActorContext, Cancelable, Envelope, Error, Message, Receive};

use async_trait::async_trait;
use tracing::debug;

use std::time::Duration;

/// Accumulation logic driven by an [`AggregationBlock`].
#[async_trait]
pub trait Aggregator: Send + 'static {
    type Item: Send + 'static;

    /// Folds `item` in. Returns `true` when the item opened a new, not yet flushed, batch.
    fn receive_one(&mut self, item: Self::Item) -> bool;

    /// Writes the current batch out and starts an empty one.
    async fn flush(&mut self) -> Result<(), Error>;
}

#[derive(Debug)]
pub enum AggregationMessage<I> {
    Item(I),
    /// Timer expiry for the batch of the given generation.
    Flush(u64),
}

impl<I: Send + 'static> Message for AggregationMessage<I> {}

pub struct AggregationBlock<G> {
    aggregator: G,
    max_wait: Duration,
    mailbox_capacity: Option<usize>,
    open: bool,
    generation: u64,
    timer: Option<Cancelable>,
}

impl<G: Aggregator> AggregationBlock<G> {
    /// # Errors
    ///
    /// [`Error::Config`] if `max_wait` is zero.
    pub fn new(aggregator: G, max_wait: Duration) -> Result<Self, Error> {
        if max_wait.is_zero() {
            return Err(Error::Config(
                "aggregation wait must be longer than zero".to_owned(),
            ));
        }
        Ok(Self {
            aggregator,
            max_wait,
            mailbox_capacity: None,
            open: false,
            generation: 0,
            timer: None,
        })
    }

    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = Some(capacity);
        self
    }

    async fn fold(
        &mut self,
        envelope: Envelope<AggregationMessage<G::Item>>,
        ctx: &mut ActorContext<Self>,
    ) -> Result<(), Error> {
        let AggregationMessage::Item(item) = envelope.into_payload() else {
            return Ok(());
        };
        if self.aggregator.receive_one(item) {
            self.open = true;
            if self.timer.is_none() {
                self.timer = Some(ctx.schedule_self_once_cancelable(
                    self.max_wait,
                    AggregationMessage::Flush(self.generation),
                )?);
            }
        }
        Ok(())
    }

    async fn expire(
        &mut self,
        envelope: Envelope<AggregationMessage<G::Item>>,
        ctx: &mut ActorContext<Self>,
    ) -> Result<(), Error> {
        match envelope.into_payload() {
            AggregationMessage::Flush(generation)
                if generation == self.generation && self.timer.is_some() =>
            {
                debug!("Aggregation {} waited {:?}.", ctx.path(), self.max_wait);
                self.flush().await
            }
            _ => Ok(()),
        }
    }

    async fn flush(&mut self) -> Result<(), Error> {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.generation += 1;
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.aggregator.flush().await
    }
}

#[async_trait]
impl<G: Aggregator> Actor for AggregationBlock<G> {
    type Message = AggregationMessage<G::Item>;
    type Behavior = ();

    fn receive(_behavior: &()) -> Receive<Self> {
        Receive::<Self>::new()
            .on(
                |msg| matches!(msg, AggregationMessage::Item(_)),
                |block, envelope, ctx| Box::pin(block.fold(envelope, ctx)),
            )
            .on(
                |msg| matches!(msg, AggregationMessage::Flush(_)),
                |block, envelope, ctx| Box::pin(block.expire(envelope, ctx)),
            )
    }

    fn mailbox_capacity(&self) -> Option<usize> {
        self.mailbox_capacity
    }

    async fn pre_stop(
        &mut self,
        _ctx: &mut ActorContext<Self>,
    ) -> Result<(), Error> {
        self.flush().await
    }
}
