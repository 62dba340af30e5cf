// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor system
//!
//! The `system` module provides the `ActorSystem` type, responsible for creating the root
//! container (`/user`) under which top level blocks live, and for spawning every actor of the
//! tree. It also owns the configuration and the backpressure monitor injected into every actor
//! reference.
//!

use crate::{
    actor::{Actor, ActorContext, ActorRef},
    backpressure::BackpressureMonitor,
    cell::{ActorCell, ChildSlot, Lookup},
    mailbox::{mailbox, DEFAULT_MAILBOX_CAPACITY},
    runner::ActorRunner,
    sink::{Event, Sink},
    ActorPath, Error,
};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use tracing::{debug, error};

use std::sync::Arc;

/// Default number of undelivered backpressure events kept per subscriber.
pub const DEFAULT_BACKPRESSURE_BUFFER: usize = 1024;

/// Default number of full sweeps a dispatch block tries before blocking.
pub const DEFAULT_DISPATCH_SWEEP_ROUNDS: usize = 2;

/// Runtime configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Mailbox capacity of actors that do not override it.
    pub mailbox_capacity: usize,
    /// Backpressure events buffered per subscriber.
    pub backpressure_buffer: usize,
    /// Sweeps over the pool a dispatch block tries before blocking.
    pub dispatch_sweep_rounds: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            backpressure_buffer: DEFAULT_BACKPRESSURE_BUFFER,
            dispatch_sweep_rounds: DEFAULT_DISPATCH_SWEEP_ROUNDS,
        }
    }
}

impl SystemConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.mailbox_capacity == 0 {
            return Err(Error::Config(
                "mailbox capacity must be at least 1".to_owned(),
            ));
        }
        if self.backpressure_buffer == 0 {
            return Err(Error::Config(
                "backpressure buffer must be at least 1".to_owned(),
            ));
        }
        if self.dispatch_sweep_rounds == 0 {
            return Err(Error::Config(
                "dispatch sweep rounds must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Actor system.
///
pub struct ActorSystem {}

impl ActorSystem {
    /// Create a new actor system with the default configuration.
    ///
    /// Cancelling `token` stops every actor and then lets the `SystemRunner` return.
    ///
    /// # Returns
    ///
    /// Returns a tuple with the system reference and the system runner.
    pub fn create(token: CancellationToken) -> (SystemRef, SystemRunner) {
        Self::build(SystemConfig::default(), token)
    }

    /// Create a new actor system with `config`.
    ///
    /// # Error
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn with_config(
        config: SystemConfig,
        token: CancellationToken,
    ) -> Result<(SystemRef, SystemRunner), Error> {
        config.validate()?;
        Ok(Self::build(config, token))
    }

    fn build(
        config: SystemConfig,
        token: CancellationToken,
    ) -> (SystemRef, SystemRunner) {
        let (event_sender, event_receiver) = mpsc::channel(1);
        let system = SystemRef::new(config, event_sender, token);
        let runner = SystemRunner::new(event_receiver);
        (system, runner)
    }
}

/// System event.
///
#[derive(Debug, Clone)]
pub enum SystemEvent {
    /// Stop the actor system.
    StopSystem,
}

/// System reference.
///
#[derive(Clone)]
pub struct SystemRef {
    /// Root container of the top level actors.
    guardian: Arc<ActorCell>,

    config: Arc<SystemConfig>,

    backpressure: BackpressureMonitor,

    token: CancellationToken,
}

impl SystemRef {
    fn new(
        config: SystemConfig,
        event_sender: mpsc::Sender<SystemEvent>,
        token: CancellationToken,
    ) -> Self {
        let guardian = ActorCell::container(ActorPath::from("/user"));
        let backpressure = BackpressureMonitor::new(config.backpressure_buffer);

        let guardian_clone = guardian.clone();
        let token_clone = token.clone();
        tokio::spawn(async move {
            token_clone.cancelled().await;
            debug!("Stopping actor system...");
            guardian_clone.stop().await;
            let _ = event_sender.send(SystemEvent::StopSystem).await;
        });

        SystemRef {
            guardian,
            config: Arc::new(config),
            backpressure,
            token,
        }
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn backpressure(&self) -> &BackpressureMonitor {
        &self.backpressure
    }

    /// Launches a top level actor at `/user/{name}`.
    ///
    /// # Error
    ///
    /// Returns [`Error::Exists`] if another top level actor already uses `name`, and
    /// [`Error::Start`] if the actor failed to start.
    ///
    pub async fn child_of<A, F>(
        &self,
        factory: F,
        name: &str,
    ) -> Result<ActorRef<A>, Error>
    where
        A: Actor,
        F: FnOnce(&ActorPath) -> A + Send,
    {
        self.spawn_actor(&self.guardian, name, factory).await
    }

    /// Returns the live top level actor `name`, creating it when absent or replacing it once
    /// terminated when it is stopping.
    pub async fn get_or_add_child<A, F>(
        &self,
        name: &str,
        factory: F,
    ) -> Result<ActorRef<A>, Error>
    where
        A: Actor,
        F: FnOnce(&ActorPath) -> A + Send,
    {
        self.get_or_add_actor(&self.guardian, name, factory).await
    }

    /// Retrieves a live top level actor. If it does not exist, or has another type, `None` is
    /// returned instead.
    pub fn get_child<A: Actor>(&self, name: &str) -> Option<ActorRef<A>> {
        match self.guardian.lookup_child::<ActorRef<A>>(name) {
            Ok(Lookup::Live(actor)) => Some(actor),
            _ => None,
        }
    }

    /// Detaches a top level actor without stopping it.
    pub fn remove_child<A: Actor>(&self, actor: &ActorRef<A>) -> bool {
        self.guardian.remove_child_cell(&actor.name(), actor.cell())
    }

    /// Paths of the top level actors.
    pub fn children(&self) -> Vec<ActorPath> {
        self.guardian.children_paths()
    }

    pub fn stop_system(&self) {
        self.token.cancel();
    }

    /// Stops the system and waits until every actor is terminated.
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.guardian.terminated().await;
    }

    /// Run a sink. The sink will be run in a separate task.
    ///
    pub fn run_sink<E>(&self, mut sink: Sink<E>)
    where
        E: Event,
    {
        tokio::spawn(async move {
            sink.run().await;
        });
    }

    /// Creates, registers and starts the child `name` of `parent`.
    pub(crate) async fn spawn_actor<A, F>(
        &self,
        parent: &Arc<ActorCell>,
        name: &str,
        factory: F,
    ) -> Result<ActorRef<A>, Error>
    where
        A: Actor,
        F: FnOnce(&ActorPath) -> A + Send,
    {
        if name.is_empty() || name.contains('/') {
            return Err(Error::Config(format!("invalid actor name '{}'", name)));
        }
        if parent.is_stopping() {
            return Err(Error::Stopped(parent.path().clone()));
        }
        if parent.contains_child(name) {
            let path = parent.path() / name;
            error!("Actor '{}' already exists!", &path);
            return Err(Error::Exists(path));
        }

        let cell = ActorCell::child(parent, name);
        let actor = factory(cell.path());
        let capacity = actor
            .mailbox_capacity()
            .unwrap_or(self.config.mailbox_capacity);
        if capacity == 0 {
            return Err(Error::Config(format!(
                "mailbox capacity of {} must be at least 1",
                cell.path()
            )));
        }

        let (sender, receiver) = mailbox(capacity);
        let actor_ref =
            ActorRef::<A>::new(cell.clone(), sender, self.backpressure.clone());
        parent.register_child(name, ChildSlot::new(cell.clone(), actor_ref.clone()))?;

        let ctx = ActorContext::new(cell.clone(), self.clone(), actor_ref.downgrade());
        let runner = ActorRunner::new(actor, cell.clone(), receiver);
        let (started_sender, started_receiver) = oneshot::channel::<bool>();
        tokio::spawn(runner.run(ctx, started_sender));

        if started_receiver
            .await
            .map_err(|e| Error::Start(e.to_string()))?
        {
            debug!("Actor {} started.", cell.path());
            Ok(actor_ref)
        } else {
            cell.terminated().await;
            Err(Error::Start(format!("Runner can not init {}", cell.path())))
        }
    }

    pub(crate) async fn get_or_add_actor<A, F>(
        &self,
        parent: &Arc<ActorCell>,
        name: &str,
        factory: F,
    ) -> Result<ActorRef<A>, Error>
    where
        A: Actor,
        F: FnOnce(&ActorPath) -> A + Send,
    {
        loop {
            match parent.lookup_child::<ActorRef<A>>(name)? {
                Lookup::Live(actor) => return Ok(actor),
                Lookup::Stopping(cell) => {
                    debug!(
                        "Waiting for actor {} to terminate before replacing it.",
                        cell.path()
                    );
                    cell.terminated().await;
                }
                Lookup::Vacant => break,
            }
        }

        match self.spawn_actor(parent, name, factory).await {
            // Another caller created it in between.
            Err(Error::Exists(path)) => {
                match parent.lookup_child::<ActorRef<A>>(name)? {
                    Lookup::Live(actor) => Ok(actor),
                    _ => Err(Error::Exists(path)),
                }
            }
            result => result,
        }
    }
}

/// System runner.
pub struct SystemRunner {
    /// The event receiver.
    event_receiver: mpsc::Receiver<SystemEvent>,
}

impl SystemRunner {
    /// Create a new system runner.
    pub(crate) fn new(event_receiver: mpsc::Receiver<SystemEvent>) -> Self {
        Self { event_receiver }
    }

    /// Run the actor system until it is stopped.
    pub async fn run(&mut self) {
        debug!("Running actor system...");
        if let Some(SystemEvent::StopSystem) = self.event_receiver.recv().await {
            debug!("Actor system stopped.");
        }
    }
}
