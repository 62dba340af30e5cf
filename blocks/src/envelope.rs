// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Envelope
//!
//! Unit of transit between a producer and a block's mailbox: the payload, the optional path of the
//! sender and a process-wide sequence number assigned when the envelope is built. The sequence is
//! diagnostic only; it proves ordering in logs and tests and is never used to route.
//!

use crate::ActorPath;

use std::sync::atomic::{AtomicU64, Ordering};

static SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Immutable message wrapper carried by a mailbox.
#[derive(Debug)]
pub struct Envelope<M> {
    payload: M,
    sender: Option<ActorPath>,
    sequence: u64,
}

impl<M> Envelope<M> {
    /// Wraps `payload`, stamping it with the next sequence number.
    pub fn new(payload: M, sender: Option<ActorPath>) -> Self {
        Self {
            payload,
            sender,
            sequence: SEQUENCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn payload(&self) -> &M {
        &self.payload
    }

    pub fn sender(&self) -> Option<&ActorPath> {
        self.sender.as_ref()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn into_payload(self) -> M {
        self.payload
    }

    /// Splits the envelope into payload and sender, dropping the sequence number.
    pub fn into_parts(self) -> (M, Option<ActorPath>) {
        (self.payload, self.sender)
    }
}
