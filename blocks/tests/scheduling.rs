// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for delayed and periodic delivery.

mod common;

use blocks::{
    Actor, ActorContext, ActorPath, Envelope, Error, Message,
    Receive, Scheduler,
};
use common::{create_system, init_tracing, probe, Capture, CaptureBlock};

use async_trait::async_trait;
use tokio::{
    sync::mpsc,
    time::{sleep, Instant},
};

use std::time::Duration;

#[tokio::test]
async fn test_schedule_once() {
    init_tracing();
    let system = create_system();
    let (sender, mut probe) = probe::<u32>();
    let capture = system
        .child_of(|_| CaptureBlock::new(&sender), "capture")
        .await
        .unwrap();

    let start = Instant::now();
    Scheduler::schedule_tell_once(
        Duration::from_millis(50),
        capture.clone(),
        Capture::Item(7),
        None,
    );
    assert_eq!(probe.next_batch().await, vec![7]);
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn test_cancelled_before_firing() {
    init_tracing();
    let system = create_system();
    let (sender, mut probe) = probe::<u32>();
    let capture = system
        .child_of(|_| CaptureBlock::new(&sender), "capture")
        .await
        .unwrap();

    let cancelable = Scheduler::schedule_tell_once_cancelable(
        Duration::from_millis(50),
        capture.clone(),
        Capture::Item(1),
        None,
    );
    cancelable.cancel();
    assert!(cancelable.is_cancelled());
    probe.assert_silent(Duration::from_millis(150)).await;

    // Cancelling after delivery is a no-op.
    let cancelable = Scheduler::schedule_tell_once_cancelable(
        Duration::from_millis(10),
        capture.clone(),
        Capture::Item(2),
        None,
    );
    assert_eq!(probe.next_batch().await, vec![2]);
    cancelable.cancel();
}

#[tokio::test]
async fn test_schedule_repeatedly() {
    init_tracing();
    let system = create_system();
    let (sender, mut probe) = probe::<u32>();
    let capture = system
        .child_of(|_| CaptureBlock::new(&sender), "capture")
        .await
        .unwrap();

    let cancelable = Scheduler::schedule_tell_repeatedly(
        Duration::from_millis(10),
        Duration::from_millis(20),
        capture.clone(),
        Capture::Item(3),
        None,
    );
    for _ in 0..3 {
        assert_eq!(probe.next_batch().await, vec![3]);
    }
    cancelable.cancel();

    // A tick already in flight may still land.
    sleep(Duration::from_millis(30)).await;
    probe.drain();
    probe.assert_silent(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_repeated_delivery_ends_with_target() {
    init_tracing();
    let system = create_system();
    let (sender, mut probe) = probe::<u32>();
    let capture = system
        .child_of(|_| CaptureBlock::new(&sender), "capture")
        .await
        .unwrap();

    let cancelable = Scheduler::schedule_tell_repeatedly(
        Duration::from_millis(10),
        Duration::from_millis(10),
        capture.clone(),
        Capture::Item(4),
        None,
    );
    assert_eq!(probe.next_batch().await, vec![4]);
    capture.stop().await;
    sleep(Duration::from_millis(50)).await;
    probe.drain();
    assert!(!cancelable.is_cancelled());
    assert!(capture.is_terminated());
}

#[tokio::test]
async fn test_schedule_to_stopped_target() {
    let system = create_system();
    let (sender, mut probe) = probe::<u32>();
    let capture = system
        .child_of(|_| CaptureBlock::new(&sender), "capture")
        .await
        .unwrap();

    // The delivery is rejected when the delay elapses.
    capture.stop().await;
    Scheduler::schedule_tell_once(
        Duration::from_millis(5),
        capture,
        Capture::Item(9),
        None,
    );
    probe.assert_silent(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_scheduled_envelope_carries_sender() {
    let system = create_system();
    let (sender, mut probe) = probe::<u32>();
    let capture = system
        .child_of(|_| CaptureBlock::new(&sender), "capture")
        .await
        .unwrap();
    let origin = ActorPath::from("/user/origin");

    Scheduler::schedule_tell_once(
        Duration::from_millis(5),
        capture.clone(),
        Capture::Item(1),
        Some(origin.clone()),
    );
    assert_eq!(probe.next().await.sender, Some(origin.clone()));

    let _pending = Scheduler::schedule_tell_once_cancelable(
        Duration::from_millis(5),
        capture.clone(),
        Capture::Item(2),
        Some(origin.clone()),
    );
    assert_eq!(probe.next().await.sender, Some(origin.clone()));

    let repeated = Scheduler::schedule_tell_repeatedly(
        Duration::from_millis(5),
        Duration::from_millis(10),
        capture.clone(),
        Capture::Item(3),
        Some(origin.clone()),
    );
    for _ in 0..2 {
        assert_eq!(probe.next().await.sender, Some(origin.clone()));
    }
    repeated.cancel();

    Scheduler::schedule_tell_once(
        Duration::from_millis(5),
        capture.clone(),
        Capture::Item(4),
        None,
    );
    // Ticks of the repeated delivery already in flight may come first.
    loop {
        let captured = probe.next().await;
        if captured.payload == Capture::Item(4) {
            assert_eq!(captured.sender, None);
            break;
        }
    }
    capture.stop().await;
}

// Defines reminder actor, scheduling a message to itself on start.
pub struct Reminder {
    senders: mpsc::UnboundedSender<Option<ActorPath>>,
}

#[derive(Debug)]
pub struct Remind;

impl Message for Remind {}

impl Reminder {
    async fn remind(
        &mut self,
        envelope: Envelope<Remind>,
        _ctx: &mut ActorContext<Self>,
    ) -> Result<(), Error> {
        let _ = self.senders.send(envelope.sender().cloned());
        Ok(())
    }
}

#[async_trait]
impl Actor for Reminder {
    type Message = Remind;
    type Behavior = ();

    fn receive(_behavior: &()) -> Receive<Self> {
        Receive::<Self>::new()
            .on_any(|reminder, envelope, ctx| Box::pin(reminder.remind(envelope, ctx)))
    }

    async fn pre_start(
        &mut self,
        ctx: &mut ActorContext<Self>,
    ) -> Result<(), Error> {
        ctx.schedule_self_once_cancelable(Duration::from_millis(10), Remind)?;
        Ok(())
    }
}

#[tokio::test]
async fn test_self_schedule_is_sent_by_the_actor() {
    let system = create_system();
    let (senders, mut observed) = mpsc::unbounded_channel();
    let reminder = system
        .child_of(
            move |_| Reminder { senders },
            "reminder",
        )
        .await
        .unwrap();

    let sender = tokio::time::timeout(common::PATIENCE, observed.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sender, Some(ActorPath::from("/user/reminder")));
    reminder.stop().await;
}
