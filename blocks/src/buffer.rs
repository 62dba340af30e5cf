// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Buffer block
//!
//! Accumulates items and writes them to a [`BatchSink`] as one batch when any of these happens:
//!
//! - the buffer holds `max_capacity` items;
//! - `max_wait` elapsed since the first item of the current batch;
//! - the block stops.
//!
//! A bulk insert larger than the capacity is written as full pages until less than a page is
//! left. The batches written, concatenated, are exactly the items received in arrival order.
//!

use crate::{
    Actor, ActorContext, ActorRef, Cancelable, Envelope, Error, Message, Receive,
};

use async_trait::async_trait;
use tracing::debug;

use std::time::Duration;

/// Destination of the batches written by a buffer.
#[async_trait]
pub trait BatchSink<T>: Send + Sync + 'static {
    async fn write(&self, batch: Vec<T>) -> Result<(), Error>;
}

/// Any actor whose message converts from a batch can be fed by a buffer.
#[async_trait]
impl<T, A> BatchSink<T> for ActorRef<A>
where
    T: Send + 'static,
    A: Actor,
    A::Message: From<Vec<T>>,
{
    async fn write(&self, batch: Vec<T>) -> Result<(), Error> {
        self.tell(A::Message::from(batch)).await
    }
}

#[derive(Debug)]
pub enum BufferMessage<T> {
    Item(T),
    /// Appended item by item, in order.
    Batch(Vec<T>),
    /// Timer expiry for the batch of the given generation.
    Flush(u64),
}

impl<T: Send + 'static> Message for BufferMessage<T> {}

pub struct BufferBlock<T, S> {
    sink: S,
    max_capacity: usize,
    max_wait: Duration,
    mailbox_capacity: Option<usize>,
    items: Vec<T>,
    generation: u64,
    timer: Option<Cancelable>,
}

impl<T, S> BufferBlock<T, S>
where
    T: Send + 'static,
    S: BatchSink<T>,
{
    /// # Errors
    ///
    /// [`Error::Config`] if `max_capacity` or `max_wait` is zero.
    pub fn new(
        sink: S,
        max_capacity: usize,
        max_wait: Duration,
    ) -> Result<Self, Error> {
        if max_capacity == 0 {
            return Err(Error::Config(
                "buffer capacity must be at least 1".to_owned(),
            ));
        }
        if max_wait.is_zero() {
            return Err(Error::Config(
                "buffer wait must be longer than zero".to_owned(),
            ));
        }
        Ok(Self {
            sink,
            max_capacity,
            max_wait,
            mailbox_capacity: None,
            items: Vec::with_capacity(max_capacity),
            generation: 0,
            timer: None,
        })
    }

    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = Some(capacity);
        self
    }

    async fn accept(
        &mut self,
        envelope: Envelope<BufferMessage<T>>,
        ctx: &mut ActorContext<Self>,
    ) -> Result<(), Error> {
        match envelope.into_payload() {
            BufferMessage::Item(item) => self.items.push(item),
            BufferMessage::Batch(items) => self.items.extend(items),
            // Timer ticks are routed to `expire`.
            BufferMessage::Flush(_) => return Ok(()),
        }

        while self.items.len() >= self.max_capacity {
            self.disarm();
            let rest = self.items.split_off(self.max_capacity);
            let page = std::mem::replace(&mut self.items, rest);
            debug!("Buffer {} is full, writing {} items.", ctx.path(), page.len());
            self.sink.write(page).await?;
        }

        if !self.items.is_empty() && self.timer.is_none() {
            self.timer = Some(ctx.schedule_self_once_cancelable(
                self.max_wait,
                BufferMessage::Flush(self.generation),
            )?);
        }
        Ok(())
    }

    async fn expire(
        &mut self,
        envelope: Envelope<BufferMessage<T>>,
        ctx: &mut ActorContext<Self>,
    ) -> Result<(), Error> {
        let BufferMessage::Flush(generation) = envelope.into_payload() else {
            return Ok(());
        };
        if generation != self.generation || self.timer.is_none() {
            debug!("Buffer {} ignores a stale timer.", ctx.path());
            return Ok(());
        }
        debug!(
            "Buffer {} waited {:?}, writing {} items.",
            ctx.path(),
            self.max_wait,
            self.items.len()
        );
        self.flush().await
    }

    async fn flush(&mut self) -> Result<(), Error> {
        self.disarm();
        if self.items.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.items);
        self.sink.write(batch).await
    }

    /// Cancels the armed timer; a tick already queued becomes stale.
    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.generation += 1;
    }
}

#[async_trait]
impl<T, S> Actor for BufferBlock<T, S>
where
    T: Send + 'static,
    S: BatchSink<T>,
{
    type Message = BufferMessage<T>;
    type Behavior = ();

    fn receive(_behavior: &()) -> Receive<Self> {
        Receive::<Self>::new()
            .on(
                |msg| matches!(msg, BufferMessage::Flush(_)),
                |block, envelope, ctx| Box::pin(block.expire(envelope, ctx)),
            )
            .on_any(|block, envelope, ctx| Box::pin(block.accept(envelope, ctx)))
    }

    fn mailbox_capacity(&self) -> Option<usize> {
        self.mailbox_capacity
    }

    async fn pre_stop(
        &mut self,
        ctx: &mut ActorContext<Self>,
    ) -> Result<(), Error> {
        if !self.items.is_empty() {
            debug!(
                "Buffer {} is stopping, writing {} items.",
                ctx.path(),
                self.items.len()
            );
        }
        self.flush().await
    }
}
