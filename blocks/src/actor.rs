// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor
//!
//! The `actor` module provides the `Actor` trait together with the two capabilities every block
//! exposes: the *inbound* capability (`ActorRef`, used by producers to submit messages and to stop
//! the block) and the *construction* capability (`ActorContext`, used by the block itself to create
//! and look up children, switch behavior and stop itself).
//!

use crate::{
    backpressure::{BackpressureMonitor, BackpressureSource},
    cell::{ActorCell, Lookup},
    mailbox::{MailboxSender, Rejected, WeakMailboxSender},
    scheduler::{Cancelable, Scheduler},
    system::SystemRef,
    ActorPath, Envelope, Error, Receive,
};

use async_trait::async_trait;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use std::{fmt::Debug, sync::Arc, time::Duration};

/// Marker for the closed message type of an actor.
///
/// Every actor accepts exactly one message type, usually an enum whose variants are the
/// "message types" its handler table dispatches on.
///
/// ```ignore
/// #[derive(Debug)]
/// enum Command {
///     Deposit(u64),
///     Close,
/// }
///
/// impl Message for Command {}
/// ```
pub trait Message: Send + 'static {}

/// State tag of an actor's finite state machine.
///
/// Implemented for every type that satisfies the bounds, `()` included, so actors with a single
/// behavior need nothing beyond `type Behavior = ();`.
pub trait Behavior:
    Default + Clone + Debug + PartialEq + Send + Sync + 'static
{
}

impl<T> Behavior for T where
    T: Default + Clone + Debug + PartialEq + Send + Sync + 'static
{
}

/// The `Actor` trait is the main trait that a block implements.
///
/// An actor owns its state, processes the envelopes of its mailbox one at a time and may create
/// children. The handlers of the current behavior are produced by [`Actor::receive`]; switching
/// behavior with [`ActorContext::become_behavior`] replaces the whole table once the running
/// handler returns.
///
/// # Lifecycle
///
/// 1. `pre_start` runs before the first message. An error aborts the actor and makes the
///    creating call fail with [`Error::Start`].
/// 2. Messages are handled in FIFO order. A handler returning an error, or panicking, puts the
///    actor in the stopping state; envelopes still queued are drained and discarded.
/// 3. `pre_stop` runs once the mailbox is closed and drained.
///
/// # Examples
///
/// ```ignore
/// #[derive(Default)]
/// struct Counter {
///     total: u64,
/// }
///
/// #[async_trait]
/// impl Actor for Counter {
///     type Message = Command;
///     type Behavior = ();
///
///     fn receive(_behavior: &()) -> Receive<Self> {
///         Receive::<Self>::new().on(
///             |msg| matches!(msg, Command::Deposit(_)),
///             |counter, envelope, ctx| Box::pin(counter.deposit(envelope, ctx)),
///         )
///     }
/// }
/// ```
#[async_trait]
pub trait Actor: Send + Sized + 'static {
    /// The closed message type this actor accepts.
    type Message: Message;

    /// The state tag selecting the handler table. The loop starts with `Behavior::default()`.
    type Behavior: Behavior;

    /// Builds the handler table of `behavior`.
    fn receive(behavior: &Self::Behavior) -> Receive<Self>;

    /// Mailbox capacity of this actor. `None` uses the system default.
    fn mailbox_capacity(&self) -> Option<usize> {
        None
    }

    /// Called once before the first message is handled.
    async fn pre_start(
        &mut self,
        _ctx: &mut ActorContext<Self>,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Called once after the mailbox is closed and drained, before the actor is terminated.
    async fn pre_stop(
        &mut self,
        _ctx: &mut ActorContext<Self>,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Called for a message no handler of the current behavior accepts. Logs and discards it by
    /// default.
    async fn on_unhandled(
        &mut self,
        envelope: Envelope<Self::Message>,
        ctx: &mut ActorContext<Self>,
    ) {
        warn!(
            "Actor {} has no handler for message #{}, discarding it.",
            ctx.path(),
            envelope.sequence()
        );
    }
}

/// Inbound capability of an actor.
///
/// Cheap to clone. Every clone addresses the same instance; once that instance is terminated the
/// reference keeps rejecting messages, it never reaches a later instance with the same path.
pub struct ActorRef<A: Actor> {
    path: ActorPath,
    sender: MailboxSender<A::Message>,
    cell: Arc<ActorCell>,
    backpressure: BackpressureMonitor,
}

impl<A: Actor> ActorRef<A> {
    pub(crate) fn new(
        cell: Arc<ActorCell>,
        sender: MailboxSender<A::Message>,
        backpressure: BackpressureMonitor,
    ) -> Self {
        Self {
            path: cell.path().clone(),
            sender,
            cell,
            backpressure,
        }
    }

    pub(crate) fn downgrade(&self) -> WeakMailboxSender<A::Message> {
        self.sender.downgrade()
    }

    pub(crate) fn cell(&self) -> &Arc<ActorCell> {
        &self.cell
    }

    pub fn name(&self) -> String {
        self.path.key()
    }

    pub fn path(&self) -> &ActorPath {
        &self.path
    }

    pub fn parent(&self) -> ActorPath {
        self.path.parent()
    }

    pub fn is_stopping(&self) -> bool {
        self.cell.is_stopping()
    }

    pub fn is_terminated(&self) -> bool {
        self.cell.is_terminated()
    }

    /// Waits until the actor is terminated.
    pub async fn terminated(&self) {
        self.cell.terminated().await
    }

    /// Whether both references address the same instance.
    pub fn is_same_instance(&self, other: &ActorRef<A>) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// Non-blocking enqueue. Returns `false` when the mailbox is full or the actor is stopping.
    pub fn try_submit(
        &self,
        message: A::Message,
        sender: Option<ActorPath>,
    ) -> bool {
        self.offer(message, sender).is_ok()
    }

    /// Non-blocking enqueue handing the envelope back on failure.
    pub fn offer(
        &self,
        message: A::Message,
        sender: Option<ActorPath>,
    ) -> Result<(), Rejected<A::Message>> {
        self.offer_envelope(Envelope::new(message, sender))
    }

    /// Non-blocking enqueue of an already built envelope.
    pub fn offer_envelope(
        &self,
        envelope: Envelope<A::Message>,
    ) -> Result<(), Rejected<A::Message>> {
        if self.cell.is_stopping() {
            return Err(Rejected::Stopped(envelope));
        }
        self.sender.try_send(envelope).map_err(Rejected::from)
    }

    /// Enqueues `message`, waiting for a free slot when the mailbox is full.
    ///
    /// A full mailbox raises the backpressure signal once before waiting.
    ///
    /// # Errors
    ///
    /// [`Error::Stopped`] when the actor is already stopping, [`Error::Disposed`] when it is torn
    /// down while this call waits.
    pub async fn submit(
        &self,
        message: A::Message,
        sender: Option<ActorPath>,
    ) -> Result<(), Error> {
        self.submit_envelope(Envelope::new(message, sender)).await
    }

    pub(crate) async fn submit_envelope(
        &self,
        envelope: Envelope<A::Message>,
    ) -> Result<(), Error> {
        match self.offer_envelope(envelope) {
            Ok(()) => Ok(()),
            Err(Rejected::Stopped(_)) => Err(Error::Stopped(self.path.clone())),
            Err(Rejected::Full(envelope)) => {
                self.backpressure
                    .raise(&self.path, BackpressureSource::Submit);
                self.deliver(envelope).await
            }
        }
    }

    /// Blocking enqueue without raising the backpressure signal.
    pub(crate) async fn deliver(
        &self,
        envelope: Envelope<A::Message>,
    ) -> Result<(), Error> {
        self.sender
            .send(envelope)
            .await
            .map_err(|_| Error::Disposed(self.path.clone()))
    }

    /// Like [`ActorRef::submit`], failing with [`Error::Timeout`] once `timeout` elapses. The
    /// message is dropped on timeout.
    pub async fn submit_timeout(
        &self,
        message: A::Message,
        sender: Option<ActorPath>,
        timeout: Duration,
    ) -> Result<(), Error> {
        match time::timeout(timeout, self.submit(message, sender)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.path.clone())),
        }
    }

    /// Like [`ActorRef::submit`], failing with [`Error::Cancelled`] when `token` is cancelled
    /// first. The message is dropped on cancellation.
    pub async fn submit_cancellable(
        &self,
        message: A::Message,
        sender: Option<ActorPath>,
        token: &CancellationToken,
    ) -> Result<(), Error> {
        select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled(self.path.clone())),
            result = self.submit(message, sender) => result,
        }
    }

    /// Submits `message` without a sender.
    pub async fn tell(&self, message: A::Message) -> Result<(), Error> {
        self.submit(message, None).await
    }

    /// Stops the actor and its children, returning once everything is terminated.
    ///
    /// Idempotent; concurrent callers share one stop sequence. A handler must not await the stop
    /// of its own actor, it uses [`ActorContext::stop`] instead.
    pub async fn stop(&self) {
        self.cell.clone().stop().await
    }

    /// Like [`ActorRef::stop`] with a deadline at the call site. The stop sequence keeps running
    /// in the background after the deadline.
    pub async fn stop_timeout(&self, timeout: Duration) -> Result<(), Error> {
        let stop = tokio::spawn(self.cell.clone().stop());
        match time::timeout(timeout, stop).await {
            Ok(_) => Ok(()),
            Err(_) => {
                warn!(
                    "Actor {} did not terminate within {:?}.",
                    self.path, timeout
                );
                Err(Error::Timeout(self.path.clone()))
            }
        }
    }
}

impl<A: Actor> Clone for ActorRef<A> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            sender: self.sender.clone(),
            cell: self.cell.clone(),
            backpressure: self.backpressure.clone(),
        }
    }
}

impl<A: Actor> Debug for ActorRef<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRef")
            .field("path", &self.path)
            .field("stopping", &self.cell.is_stopping())
            .finish()
    }
}

/// Construction capability of an actor, handed to its hooks and handlers.
pub struct ActorContext<A: Actor> {
    cell: Arc<ActorCell>,
    system: SystemRef,
    myself: WeakMailboxSender<A::Message>,
    behavior: A::Behavior,
    next_behavior: Option<A::Behavior>,
    idle_timeout: Option<Duration>,
}

impl<A: Actor> ActorContext<A> {
    pub(crate) fn new(
        cell: Arc<ActorCell>,
        system: SystemRef,
        myself: WeakMailboxSender<A::Message>,
    ) -> Self {
        Self {
            cell,
            system,
            myself,
            behavior: A::Behavior::default(),
            next_behavior: None,
            idle_timeout: None,
        }
    }

    pub fn path(&self) -> &ActorPath {
        self.cell.path()
    }

    pub fn name(&self) -> String {
        self.cell.path().key()
    }

    pub fn parent(&self) -> ActorPath {
        self.cell.path().parent()
    }

    pub fn system(&self) -> &SystemRef {
        &self.system
    }

    /// Reference to this actor. `None` once no other reference keeps the mailbox open.
    pub fn reference(&self) -> Option<ActorRef<A>> {
        self.myself.upgrade().map(|sender| {
            ActorRef::new(
                self.cell.clone(),
                sender,
                self.system.backpressure().clone(),
            )
        })
    }

    /// Token cancelled when this actor starts stopping. Long running handlers observe it.
    pub fn cancellation(&self) -> CancellationToken {
        self.cell.cancellation()
    }

    pub fn is_stopping(&self) -> bool {
        self.cell.is_stopping()
    }

    /// Current behavior.
    pub fn behavior(&self) -> &A::Behavior {
        &self.behavior
    }

    /// Switches to `behavior` once the running handler returns. The handler table is rebuilt from
    /// [`Actor::receive`], never merged with the previous one.
    pub fn become_behavior(&mut self, behavior: A::Behavior) {
        self.next_behavior = Some(behavior);
    }

    /// Applies a pending behavior switch. Returns whether the behavior changed.
    pub(crate) fn apply_transition(&mut self) -> bool {
        match self.next_behavior.take() {
            Some(behavior) if behavior != self.behavior => {
                debug!(
                    "Actor {} becomes {:?}.",
                    self.cell.path(),
                    behavior
                );
                self.behavior = behavior;
                true
            }
            _ => false,
        }
    }

    /// Stops the actor after this much time without any message. `None` disables it.
    pub fn set_idle_timeout(&mut self, timeout: Option<Duration>) {
        self.idle_timeout = timeout;
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// Starts stopping this actor without waiting. Messages already queued are still handled.
    pub fn stop(&self) {
        self.cell.begin_stop();
    }

    /// Creates the child `name`, built by `factory` from the child's path.
    ///
    /// Returns once the child's `pre_start` has run.
    ///
    /// # Errors
    ///
    /// [`Error::Exists`] if a sibling already uses `name`, [`Error::Start`] if the child failed
    /// to start, [`Error::Stopped`] if this actor is stopping.
    pub async fn child_of<C, F>(
        &self,
        factory: F,
        name: &str,
    ) -> Result<ActorRef<C>, Error>
    where
        C: Actor,
        F: FnOnce(&ActorPath) -> C + Send,
    {
        self.system.spawn_actor(&self.cell, name, factory).await
    }

    /// Returns the live child `name`, creating it when absent. A child that is stopping is
    /// awaited to termination and replaced by a new instance.
    pub async fn get_or_add_child<C, F>(
        &self,
        name: &str,
        factory: F,
    ) -> Result<ActorRef<C>, Error>
    where
        C: Actor,
        F: FnOnce(&ActorPath) -> C + Send,
    {
        self.system.get_or_add_actor(&self.cell, name, factory).await
    }

    /// Live child `name`, if any.
    pub fn get_child<C: Actor>(&self, name: &str) -> Option<ActorRef<C>> {
        match self.cell.lookup_child::<ActorRef<C>>(name) {
            Ok(Lookup::Live(child)) => Some(child),
            _ => None,
        }
    }

    /// Detaches `child` from this actor's registry without stopping it.
    pub fn remove_child<C: Actor>(&self, child: &ActorRef<C>) -> bool {
        self.cell.remove_child_cell(&child.name(), child.cell())
    }

    /// Paths of the registered children.
    pub fn children(&self) -> Vec<ActorPath> {
        self.cell.children_paths()
    }

    /// Sends `message` to this actor after `delay`, with this actor as the sender.
    pub fn schedule_self_once_cancelable(
        &self,
        delay: Duration,
        message: A::Message,
    ) -> Result<Cancelable, Error> {
        let myself = self
            .reference()
            .ok_or_else(|| Error::Stopped(self.path().clone()))?;
        Ok(Scheduler::schedule_tell_once_cancelable(
            delay,
            myself,
            message,
            Some(self.path().clone()),
        ))
    }
}
