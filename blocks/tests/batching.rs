// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the buffer and aggregation blocks.

mod common;

use blocks::{
    AggregationBlock, AggregationMessage, Aggregator, BufferBlock,
    BufferMessage, Error,
};
use common::{create_system, probe, CaptureBlock};

use async_trait::async_trait;
use tokio::{
    sync::mpsc,
    time::{sleep, Instant},
};

use std::time::Duration;

const FOREVER: Duration = Duration::from_secs(60);

#[tokio::test]
async fn test_buffer_flushes_after_max_wait() {
    let system = create_system();
    let (sender, mut probe) = probe::<u32>();
    let capture = system
        .child_of(|_| CaptureBlock::new(&sender), "capture")
        .await
        .unwrap();
    let buffer = system
        .child_of(
            |_| {
                BufferBlock::<u32, _>::new(capture.clone(), 3, Duration::from_millis(100))
                    .unwrap()
            },
            "buffer",
        )
        .await
        .unwrap();

    let start = Instant::now();
    buffer.tell(BufferMessage::Item(1)).await.unwrap();
    buffer.tell(BufferMessage::Item(2)).await.unwrap();

    assert_eq!(probe.next_batch().await, vec![1, 2]);
    assert!(start.elapsed() >= Duration::from_millis(100));
    probe.assert_silent(Duration::from_millis(150)).await;
}

#[tokio::test]
async fn test_buffer_flushes_at_capacity() {
    let system = create_system();
    let (sender, mut probe) = probe::<u32>();
    let capture = system
        .child_of(|_| CaptureBlock::new(&sender), "capture")
        .await
        .unwrap();
    let buffer = system
        .child_of(
            |_| BufferBlock::<u32, _>::new(capture.clone(), 3, FOREVER).unwrap(),
            "buffer",
        )
        .await
        .unwrap();

    for item in 1..=7 {
        buffer.tell(BufferMessage::Item(item)).await.unwrap();
    }
    assert_eq!(probe.next_batch().await, vec![1, 2, 3]);
    assert_eq!(probe.next_batch().await, vec![4, 5, 6]);
    probe.assert_silent(Duration::from_millis(50)).await;

    // The remainder is written on stop.
    buffer.stop().await;
    assert_eq!(probe.next_batch().await, vec![7]);
}

#[tokio::test]
async fn test_buffer_pages_oversized_batches() {
    let system = create_system();
    let (sender, mut probe) = probe::<u32>();
    let capture = system
        .child_of(|_| CaptureBlock::new(&sender), "capture")
        .await
        .unwrap();
    let buffer = system
        .child_of(
            |_| BufferBlock::<u32, _>::new(capture.clone(), 3, FOREVER).unwrap(),
            "buffer",
        )
        .await
        .unwrap();

    buffer.tell(BufferMessage::Item(0)).await.unwrap();
    buffer
        .tell(BufferMessage::Batch((1..=8).collect()))
        .await
        .unwrap();
    assert_eq!(probe.next_batch().await, vec![0, 1, 2]);
    assert_eq!(probe.next_batch().await, vec![3, 4, 5]);
    assert_eq!(probe.next_batch().await, vec![6, 7, 8]);

    buffer.stop().await;
    probe.assert_silent(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_buffer_flushes_on_stop() {
    let system = create_system();
    let (sender, mut probe) = probe::<u32>();
    let capture = system
        .child_of(|_| CaptureBlock::new(&sender), "capture")
        .await
        .unwrap();
    let buffer = system
        .child_of(
            |_| BufferBlock::<u32, _>::new(capture.clone(), 10, FOREVER).unwrap(),
            "buffer",
        )
        .await
        .unwrap();

    buffer.tell(BufferMessage::Item(1)).await.unwrap();
    buffer.tell(BufferMessage::Item(2)).await.unwrap();
    buffer.stop().await;
    assert_eq!(probe.next_batch().await, vec![1, 2]);
}

#[tokio::test]
async fn test_buffer_preserves_every_item_in_order() {
    let system = create_system();
    let (sender, mut probe) = probe::<u32>();
    let capture = system
        .child_of(|_| CaptureBlock::new(&sender), "capture")
        .await
        .unwrap();
    let buffer = system
        .child_of(
            |_| {
                BufferBlock::<u32, _>::new(capture.clone(), 4, Duration::from_millis(15))
                    .unwrap()
                    .with_mailbox_capacity(8)
            },
            "buffer",
        )
        .await
        .unwrap();

    for item in 0..60u32 {
        if item % 7 == 0 {
            sleep(Duration::from_millis(20)).await;
        }
        if item % 5 == 0 {
            buffer
                .tell(BufferMessage::Batch(vec![item]))
                .await
                .unwrap();
        } else {
            buffer.tell(BufferMessage::Item(item)).await.unwrap();
        }
    }
    buffer.stop().await;
    // The writes of the buffer precede this point, stop the sink too.
    capture.stop().await;

    let batches: Vec<Vec<u32>> = probe
        .drain()
        .into_iter()
        .map(|captured| captured.into_batch())
        .collect();
    assert!(batches.iter().all(|batch| !batch.is_empty() && batch.len() <= 4));
    let items: Vec<u32> = batches.into_iter().flatten().collect();
    assert_eq!(items, (0..60).collect::<Vec<u32>>());
}

#[tokio::test]
async fn test_buffer_ignores_foreign_timer_ticks() {
    let system = create_system();
    let (sender, mut probe) = probe::<u32>();
    let capture = system
        .child_of(|_| CaptureBlock::new(&sender), "capture")
        .await
        .unwrap();
    let buffer = system
        .child_of(
            |_| BufferBlock::<u32, _>::new(capture.clone(), 3, FOREVER).unwrap(),
            "buffer",
        )
        .await
        .unwrap();

    buffer.tell(BufferMessage::Item(1)).await.unwrap();
    buffer.tell(BufferMessage::Flush(41)).await.unwrap();
    buffer.tell(BufferMessage::Flush(42)).await.unwrap();
    probe.assert_silent(Duration::from_millis(50)).await;

    // The ticks neither wrote the batch nor joined it.
    buffer.tell(BufferMessage::Item(2)).await.unwrap();
    buffer.tell(BufferMessage::Item(3)).await.unwrap();
    assert_eq!(probe.next_batch().await, vec![1, 2, 3]);
    buffer.stop().await;
    probe.assert_silent(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_buffer_rejects_invalid_parameters() {
    let system = create_system();
    let (sender, _probe) = probe::<u32>();
    let capture = system
        .child_of(|_| CaptureBlock::new(&sender), "capture")
        .await
        .unwrap();
    assert!(matches!(
        BufferBlock::<u32, _>::new(capture.clone(), 0, FOREVER),
        Err(Error::Config(_))
    ));
    let buffer = BufferBlock::<u32, _>::new(capture, 1, FOREVER)
        .unwrap()
        .with_mailbox_capacity(0);
    let result = system.child_of(move |_| buffer, "buffer").await;
    assert!(matches!(result, Err(Error::Config(_))));
}

// Defines summing aggregator, one batch per burst.
pub struct Summer {
    total: u64,
    count: usize,
    out: mpsc::UnboundedSender<(u64, usize)>,
}

#[async_trait]
impl Aggregator for Summer {
    type Item = u64;

    fn receive_one(&mut self, item: u64) -> bool {
        self.total += item;
        self.count += 1;
        self.count == 1
    }

    async fn flush(&mut self) -> Result<(), Error> {
        let _ = self.out.send((self.total, self.count));
        self.total = 0;
        self.count = 0;
        Ok(())
    }
}

#[tokio::test]
async fn test_aggregation_flushes_once_per_batch() {
    let system = create_system();
    let (out, mut sums) = mpsc::unbounded_channel();
    let summer = Summer {
        total: 0,
        count: 0,
        out,
    };
    let aggregation = system
        .child_of(
            move |_| {
                AggregationBlock::new(summer, Duration::from_millis(80))
                    .unwrap()
                    .with_mailbox_capacity(8)
            },
            "sum",
        )
        .await
        .unwrap();

    let start = Instant::now();
    for item in [1, 2, 3] {
        aggregation.tell(AggregationMessage::Item(item)).await.unwrap();
    }
    assert_eq!(sums.recv().await, Some((6, 3)));
    assert!(start.elapsed() >= Duration::from_millis(80));

    sleep(Duration::from_millis(150)).await;
    assert!(sums.try_recv().is_err());

    aggregation.tell(AggregationMessage::Item(4)).await.unwrap();
    assert_eq!(sums.recv().await, Some((4, 1)));
}

#[tokio::test]
async fn test_aggregation_flushes_on_stop() {
    let system = create_system();
    let (out, mut sums) = mpsc::unbounded_channel();
    let summer = Summer {
        total: 0,
        count: 0,
        out,
    };
    let aggregation = system
        .child_of(
            move |_| AggregationBlock::new(summer, FOREVER).unwrap(),
            "sum",
        )
        .await
        .unwrap();

    aggregation.tell(AggregationMessage::Item(5)).await.unwrap();
    aggregation.tell(AggregationMessage::Item(6)).await.unwrap();
    aggregation.stop().await;
    assert_eq!(sums.recv().await, Some((11, 2)));
    // Exactly one flush.
    assert_eq!(sums.recv().await, None);
}
