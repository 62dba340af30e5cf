// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Core library for the DataBlocks framework.
//! Provides the actor runtime and the ready-made blocks used to assemble in-process dataflow
//! pipelines: buffering, aggregation and dispatch over worker pools.

pub use blocks::{
    Actor, ActorContext, ActorPath, ActorRef, ActorSystem, AggregationBlock,
    AggregationMessage, Aggregator, BackpressureEvent, BackpressureMonitor,
    BackpressureSource, BatchSink, Behavior, BufferBlock, BufferMessage,
    Cancelable, DispatchBlock, DispatchPolicy, Envelope, Error as BlockError,
    Event, HandlerFuture, Message, Receive, Rejected, Scheduler, Sink,
    Subscriber, SystemConfig, SystemEvent, SystemRef, SystemRunner,
};
