// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Test harness shared by the integration tests: a capture block that reports everything it
//! receives to a probe, optionally held back by a gate.

#![allow(dead_code)]

use blocks::{
    Actor, ActorContext, ActorPath, ActorSystem, Envelope, Error, Message,
    Receive, SystemRef,
};

use async_trait::async_trait;
use tokio::{
    sync::{mpsc, Semaphore},
    time::timeout,
};
use tokio_util::sync::CancellationToken;

use std::{sync::Arc, time::Duration};

/// Upper bound for anything a test waits on.
pub const PATIENCE: Duration = Duration::from_secs(2);

// Defines capture message.
#[derive(Debug, Clone, PartialEq)]
pub enum Capture<T> {
    Item(T),
    Batch(Vec<T>),
}

// Implements message for capture message.
impl<T: Send + 'static> Message for Capture<T> {}

// A buffer feeding a capture block writes batches.
impl<T> From<Vec<T>> for Capture<T> {
    fn from(batch: Vec<T>) -> Self {
        Capture::Batch(batch)
    }
}

/// What the probe observed: who handled which payload, sent by whom.
#[derive(Debug, Clone, PartialEq)]
pub struct Captured<T> {
    pub actor: ActorPath,
    pub sender: Option<ActorPath>,
    pub payload: Capture<T>,
}

impl<T> Captured<T> {
    pub fn name(&self) -> String {
        self.actor.key()
    }

    pub fn into_batch(self) -> Vec<T> {
        match self.payload {
            Capture::Batch(batch) => batch,
            Capture::Item(item) => vec![item],
        }
    }
}

/// Receiving side of the capture blocks.
pub struct TestProbe<T> {
    receiver: mpsc::UnboundedReceiver<Captured<T>>,
}

impl<T> TestProbe<T> {
    pub async fn next(&mut self) -> Captured<T> {
        timeout(PATIENCE, self.receiver.recv())
            .await
            .expect("probe timed out")
            .expect("probe closed")
    }

    pub async fn next_batch(&mut self) -> Vec<T> {
        self.next().await.into_batch()
    }

    pub async fn take(&mut self, count: usize) -> Vec<Captured<T>> {
        let mut captured = Vec::with_capacity(count);
        for _ in 0..count {
            captured.push(self.next().await);
        }
        captured
    }

    /// Asserts that nothing is observed during `within`.
    pub async fn assert_silent(&mut self, within: Duration) {
        assert!(
            timeout(within, self.receiver.recv()).await.is_err(),
            "probe observed an unexpected message"
        );
    }

    /// Everything observed so far, without waiting.
    pub fn drain(&mut self) -> Vec<Captured<T>> {
        let mut captured = Vec::new();
        while let Ok(next) = self.receiver.try_recv() {
            captured.push(next);
        }
        captured
    }
}

pub fn probe<T>() -> (mpsc::UnboundedSender<Captured<T>>, TestProbe<T>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (sender, TestProbe { receiver })
}

// Defines capture block.
pub struct CaptureBlock<T> {
    probe: mpsc::UnboundedSender<Captured<T>>,
    gate: Option<Arc<Semaphore>>,
    mailbox_capacity: Option<usize>,
}

impl<T: Send + 'static> CaptureBlock<T> {
    pub fn new(probe: &mpsc::UnboundedSender<Captured<T>>) -> Self {
        Self {
            probe: probe.clone(),
            gate: None,
            mailbox_capacity: None,
        }
    }

    /// Every item waits for a permit of `gate` before it is reported.
    pub fn gated(
        probe: &mpsc::UnboundedSender<Captured<T>>,
        gate: &Arc<Semaphore>,
    ) -> Self {
        Self {
            gate: Some(gate.clone()),
            ..Self::new(probe)
        }
    }

    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = Some(capacity);
        self
    }

    async fn capture(
        &mut self,
        envelope: Envelope<Capture<T>>,
        ctx: &mut ActorContext<Self>,
    ) -> Result<(), Error> {
        let item = matches!(envelope.payload(), Capture::Item(_));
        if let (true, Some(gate)) = (item, self.gate.clone()) {
            gate.acquire()
                .await
                .map_err(|e| Error::Functional(e.to_string()))?
                .forget();
        }
        let (payload, sender) = envelope.into_parts();
        self.probe
            .send(Captured {
                actor: ctx.path().clone(),
                sender,
                payload,
            })
            .map_err(|e| Error::Functional(e.to_string()))
    }
}

// Implements actor for capture block.
#[async_trait]
impl<T: Send + 'static> Actor for CaptureBlock<T> {
    type Message = Capture<T>;
    type Behavior = ();

    fn receive(_behavior: &()) -> Receive<Self> {
        Receive::<Self>::new()
            .on_any(|block, envelope, ctx| Box::pin(block.capture(envelope, ctx)))
    }

    fn mailbox_capacity(&self) -> Option<usize> {
        self.mailbox_capacity
    }
}

/// Fresh system whose runner is already running.
pub fn create_system() -> SystemRef {
    let (system, mut runner) = ActorSystem::create(CancellationToken::new());
    tokio::spawn(async move {
        runner.run().await;
    });
    system
}

/// Installs a fmt subscriber honouring `RUST_LOG`, for debugging a single test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
