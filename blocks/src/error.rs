// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Errors module
//!

use crate::ActorPath;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for the data blocks runtime.
#[derive(Clone, Debug, Error, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// The actor is stopping or stopped and rejects new messages.
    #[error("Actor {0} is stopped and does not accept messages.")]
    Stopped(ActorPath),
    /// The actor was torn down while a sender waited for mailbox capacity.
    #[error("Actor {0} was disposed while a message waited for capacity.")]
    Disposed(ActorPath),
    /// A child with the same name is already registered.
    #[error("Actor {0} exist.")]
    Exists(ActorPath),
    /// A child exists under the name but with another actor type.
    #[error("Actor {0} is registered with a different type.")]
    Type(ActorPath),
    /// The actor could not be started.
    #[error("An error occurred while starting the actor: {0}.")]
    Start(String),
    /// A time-boxed operation did not complete in time.
    #[error("Operation on actor {0} timed out.")]
    Timeout(ActorPath),
    /// The caller cancelled a blocking submission.
    #[error("Submission to actor {0} was cancelled.")]
    Cancelled(ActorPath),
    /// Invalid runtime or block configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// Error raised by application code, typically from a handler.
    #[error("Error: {0}")]
    Functional(String),
}
