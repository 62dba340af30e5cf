// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Blocks
//!
//! An in-process actor runtime for building dataflow pipelines out of small, composable blocks.
//! Every block is an actor: it owns private state, receives messages through a bounded mailbox and
//! handles them one at a time on its own tokio task. Blocks form a tree; a parent owns its
//! children, and stopping a block stops its whole subtree.
//!
//! ## Core contract
//!
//! Every block, whether user defined or one of the ready-made blocks of this crate, is addressed
//! through an [`ActorRef`] that offers the same three operations:
//!
//! - [`ActorRef::try_submit`]: non-blocking, refused when the mailbox is full or the block stops;
//! - [`ActorRef::submit`]: waits for a free slot, raising the backpressure signal once if it has
//!   to wait;
//! - [`ActorRef::stop`]: idempotent, returns once the block and its children are terminated.
//!
//! ## Handlers and behaviors
//!
//! A block declares a closed message type and builds, for each of its behaviors, an ordered
//! [`Receive`] table of `(predicate, handler)` entries. The first registered entry accepting a
//! message handles it. Switching behavior ([`ActorContext::become_behavior`]) rebuilds the table
//! from scratch once the running handler returns.
//!
//! A handler that fails, by returning an error or by panicking, stops its block: the failure is
//! logged, the messages still queued are discarded and the sender is never notified.
//!
//! ## Ready-made blocks
//!
//! - [`BufferBlock`] batches items by count, by time and on stop;
//! - [`AggregationBlock`] folds items into an [`Aggregator`] flushed by time and on stop;
//! - [`DispatchBlock`] spreads messages over a pool of workers, round robin or spill over.
//!
//! ## Getting started
//!
//! ```ignore
//! let (system, mut runner) = ActorSystem::create(CancellationToken::new());
//! tokio::spawn(async move { runner.run().await });
//!
//! let store = system.child_of(|_| Store::default(), "store").await?;
//! let buffer = system
//!     .child_of(
//!         |_| BufferBlock::new(store.clone(), 100, Duration::from_millis(50)).unwrap(),
//!         "buffer",
//!     )
//!     .await?;
//! buffer.tell(BufferMessage::Item(record)).await?;
//!
//! system.shutdown().await;
//! ```
//!

mod actor;
mod aggregation;
mod backpressure;
mod buffer;
mod cell;
mod dispatch;
mod envelope;
mod error;
mod mailbox;
mod path;
mod receive;
mod runner;
mod scheduler;
mod sink;
mod system;

//
// Actor core
//

/// Core trait implemented by every block.
///
/// Declares the message type, the behavior tag and the handler table of each behavior, plus the
/// lifecycle hooks.
pub use actor::Actor;

/// Construction capability handed to hooks and handlers.
///
/// Creates and looks up children, switches behavior, sets the idle timeout and stops the block.
pub use actor::ActorContext;

/// Inbound capability of a block: submit, try-submit and stop.
pub use actor::ActorRef;

/// State tag of a block's behavior machine.
pub use actor::Behavior;

/// Marker trait for the closed message type of a block.
pub use actor::Message;

/// Message wrapper carrying the sender path and a diagnostic sequence number.
pub use envelope::Envelope;

/// Ordered handler table of one behavior.
pub use receive::{HandlerFuture, Receive};

//
// Mailbox
//

/// Envelope handed back by a refused non-blocking enqueue.
pub use mailbox::{Rejected, DEFAULT_MAILBOX_CAPACITY};

//
// Error handling and addressing
//

/// Error type of every fallible operation.
pub use error::Error;

/// Hierarchical address of a block.
pub use path::ActorPath;

//
// Scheduling
//

/// Delayed and periodic delivery, with [`Cancelable`] handles.
pub use scheduler::{Cancelable, Scheduler};

//
// Backpressure and events
//

/// Observational signal raised when a producer has to wait for a mailbox.
pub use backpressure::{BackpressureEvent, BackpressureMonitor, BackpressureSource};

/// Broadcast consumers running in their own task.
pub use sink::{Event, Sink, Subscriber};

//
// Blocks
//

pub use aggregation::{AggregationBlock, AggregationMessage, Aggregator};

pub use buffer::{BatchSink, BufferBlock, BufferMessage};

pub use dispatch::{DispatchBlock, DispatchPolicy};

//
// System Management
//

/// Entry point creating the root container and the system runner.
pub use system::ActorSystem;

/// Runtime configuration with its defaults.
pub use system::{
    SystemConfig, DEFAULT_BACKPRESSURE_BUFFER, DEFAULT_DISPATCH_SWEEP_ROUNDS,
};

/// System-level events for coordination and lifecycle management.
pub use system::SystemEvent;

/// Reference to the actor system: top level blocks, configuration, shutdown.
pub use system::SystemRef;

/// Runs until the system is stopped.
pub use system::SystemRunner;
