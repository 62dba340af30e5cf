// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Handler table
//!
//! A `Receive` is the handler set of one behavior: an ordered list of `(predicate, handler)` pairs
//! plus an optional wildcard. The loop picks the *first registered* entry whose predicate accepts
//! the message, not the most specific one, and falls back to the wildcard, then to
//! [`Actor::on_unhandled`].
//!
//! ```ignore
//! fn receive(behavior: &Mode) -> Receive<Self> {
//!     match behavior {
//!         Mode::Open => Receive::<Self>::new()
//!             .on(|msg| matches!(msg, Command::Deposit(_)), |account, envelope, ctx| {
//!                 Box::pin(account.deposit(envelope, ctx))
//!             })
//!             .on_any(|account, envelope, ctx| Box::pin(account.other(envelope, ctx))),
//!         Mode::Closed => Receive::<Self>::new(),
//!     }
//! }
//! ```
//!

use crate::{Actor, ActorContext, Envelope, Error};

use futures::future::BoxFuture;

use std::sync::Arc;

/// Future returned by a message handler.
pub type HandlerFuture<'a> = BoxFuture<'a, Result<(), Error>>;

type Matcher<M> = Box<dyn Fn(&M) -> bool + Send + Sync>;

pub(crate) type BoxedHandler<A> = Arc<
    dyn for<'a> Fn(
            &'a mut A,
            Envelope<<A as Actor>::Message>,
            &'a mut ActorContext<A>,
        ) -> HandlerFuture<'a>
        + Send
        + Sync,
>;

/// Ordered handler table of one behavior.
pub struct Receive<A: Actor> {
    entries: Vec<(Matcher<A::Message>, BoxedHandler<A>)>,
    fallback: Option<BoxedHandler<A>>,
}

impl<A: Actor> Receive<A> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            fallback: None,
        }
    }

    /// Registers `handler` for messages accepted by `matches`. Entries keep registration order.
    pub fn on<P, H>(mut self, matches: P, handler: H) -> Self
    where
        P: Fn(&A::Message) -> bool + Send + Sync + 'static,
        H: for<'a> Fn(
                &'a mut A,
                Envelope<A::Message>,
                &'a mut ActorContext<A>,
            ) -> HandlerFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.entries.push((Box::new(matches), Arc::new(handler)));
        self
    }

    /// Registers the wildcard handler, replacing a previous one.
    pub fn on_any<H>(mut self, handler: H) -> Self
    where
        H: for<'a> Fn(
                &'a mut A,
                Envelope<A::Message>,
                &'a mut ActorContext<A>,
            ) -> HandlerFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.fallback = Some(Arc::new(handler));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len() + usize::from(self.fallback.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the first entry accepting `message`; `entries.len()` stands for the wildcard.
    fn position(&self, message: &A::Message) -> Option<usize> {
        self.entries
            .iter()
            .position(|(matches, _)| matches(message))
            .or_else(|| self.fallback.as_ref().map(|_| self.entries.len()))
    }

    pub(crate) fn resolve(&self, message: &A::Message) -> Option<BoxedHandler<A>> {
        let index = self.position(message)?;
        match self.entries.get(index) {
            Some((_, handler)) => Some(handler.clone()),
            None => self.fallback.clone(),
        }
    }
}

impl<A: Actor> Default for Receive<A> {
    fn default() -> Self {
        Self::new()
    }
}
