// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor cell
//!
//! Type-erased lifecycle state shared by a block, its references and its parent. The cell owns the
//! children registry (the parent holds its children strongly, a child only keeps a weak pointer
//! back) and runs the stop sequence:
//!
//! 1. mark stopping, close the mailbox and cancel the cooperative cancellation token;
//! 2. detach from the parent registry;
//! 3. wait until the message loop has drained the mailbox and exited;
//! 4. stop every child in parallel;
//! 5. mark terminated.
//!
//! The sequence is serialized by an async mutex, so concurrent callers run it once and all of them
//! return only when the block is terminated.
//!

use crate::{ActorPath, Error};

use futures::future::{join_all, BoxFuture, FutureExt};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use std::{
    any::Any,
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
};

/// Registry entry: the child's cell plus its typed reference, erased.
pub(crate) struct ChildSlot {
    cell: Arc<ActorCell>,
    reference: Box<dyn Any + Send + Sync>,
}

impl ChildSlot {
    pub(crate) fn new<R>(cell: Arc<ActorCell>, reference: R) -> Self
    where
        R: Any + Send + Sync,
    {
        Self {
            cell,
            reference: Box::new(reference),
        }
    }
}

/// Result of looking a child up by name.
pub(crate) enum Lookup<R> {
    Live(R),
    Stopping(Arc<ActorCell>),
    Vacant,
}

pub(crate) struct ActorCell {
    path: ActorPath,
    parent: Option<Weak<ActorCell>>,
    stopping: AtomicBool,
    /// Asks the loop to close its mailbox.
    closing: CancellationToken,
    /// Cooperative cancellation observed by handlers.
    cancellation: CancellationToken,
    loop_exited: CancellationToken,
    terminated: CancellationToken,
    stop_lock: AsyncMutex<()>,
    children: Mutex<BTreeMap<String, ChildSlot>>,
}

impl ActorCell {
    /// Cell of a root container. It has no message loop of its own.
    pub(crate) fn container(path: ActorPath) -> Arc<Self> {
        let cell = Self::build(path, None);
        cell.loop_exited.cancel();
        Arc::new(cell)
    }

    pub(crate) fn child(parent: &Arc<ActorCell>, name: &str) -> Arc<Self> {
        let path = &parent.path / name;
        Arc::new(Self::build(path, Some(Arc::downgrade(parent))))
    }

    fn build(path: ActorPath, parent: Option<Weak<ActorCell>>) -> Self {
        Self {
            path,
            parent,
            stopping: AtomicBool::new(false),
            closing: CancellationToken::new(),
            cancellation: CancellationToken::new(),
            loop_exited: CancellationToken::new(),
            terminated: CancellationToken::new(),
            stop_lock: AsyncMutex::new(()),
            children: Mutex::new(BTreeMap::new()),
        }
    }

    pub(crate) fn path(&self) -> &ActorPath {
        &self.path
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated.is_cancelled()
    }

    pub(crate) fn closing(&self) -> CancellationToken {
        self.closing.clone()
    }

    pub(crate) fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub(crate) async fn terminated(&self) {
        self.terminated.cancelled().await
    }

    /// Enters the stopping state without waiting for anything. Safe to call from the loop itself.
    pub(crate) fn begin_stop(&self) {
        if !self.stopping.swap(true, Ordering::SeqCst) {
            debug!("Actor {} is stopping.", self.path);
        }
        self.closing.cancel();
        self.cancellation.cancel();
    }

    pub(crate) fn mark_loop_exited(&self) {
        self.loop_exited.cancel();
    }

    /// Runs the stop sequence. Idempotent.
    pub(crate) fn stop(self: Arc<Self>) -> BoxFuture<'static, ()> {
        async move {
            let _guard = self.stop_lock.lock().await;
            if self.is_terminated() {
                return;
            }
            self.begin_stop();
            self.detach();
            self.loop_exited.cancelled().await;

            let children: Vec<Arc<ActorCell>> = self
                .lock_children()
                .drain_values()
                .collect();
            if !children.is_empty() {
                debug!(
                    "Stopping {} children of actor {}.",
                    children.len(),
                    self.path
                );
            }
            join_all(children.into_iter().map(|child| child.stop())).await;

            self.terminated.cancel();
            debug!("Actor {} is terminated.", self.path);
        }
        .boxed()
    }

    fn detach(&self) {
        if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
            parent.remove_child_cell(&self.path.key(), self);
        }
    }

    fn lock_children(&self) -> ChildrenGuard<'_> {
        ChildrenGuard(self.children.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Removes the registration `name` if it still points to `cell`.
    pub(crate) fn remove_child_cell(&self, name: &str, cell: &ActorCell) -> bool {
        let mut children = self.lock_children();
        let same = children
            .0
            .get(name)
            .is_some_and(|slot| std::ptr::eq(Arc::as_ptr(&slot.cell), cell));
        if same {
            children.0.remove(name);
            debug!("Actor {} detached from {}.", cell.path, self.path);
        }
        same
    }

    pub(crate) fn contains_child(&self, name: &str) -> bool {
        self.lock_children().0.contains_key(name)
    }

    pub(crate) fn register_child(
        &self,
        name: &str,
        slot: ChildSlot,
    ) -> Result<(), Error> {
        let mut children = self.lock_children();
        if self.is_stopping() {
            return Err(Error::Stopped(self.path.clone()));
        }
        if children.0.contains_key(name) {
            return Err(Error::Exists(&self.path / name));
        }
        children.0.insert(name.to_owned(), slot);
        Ok(())
    }

    pub(crate) fn lookup_child<R>(&self, name: &str) -> Result<Lookup<R>, Error>
    where
        R: Any + Clone,
    {
        let children = self.lock_children();
        let Some(slot) = children.0.get(name) else {
            return Ok(Lookup::Vacant);
        };
        if slot.cell.is_stopping() {
            return Ok(Lookup::Stopping(slot.cell.clone()));
        }
        slot.reference
            .downcast_ref::<R>()
            .cloned()
            .map(Lookup::Live)
            .ok_or_else(|| Error::Type(slot.cell.path.clone()))
    }

    pub(crate) fn children_paths(&self) -> Vec<ActorPath> {
        self.lock_children()
            .0
            .values()
            .map(|slot| slot.cell.path.clone())
            .collect()
    }
}

struct ChildrenGuard<'a>(MutexGuard<'a, BTreeMap<String, ChildSlot>>);

impl ChildrenGuard<'_> {
    fn drain_values(&mut self) -> impl Iterator<Item = Arc<ActorCell>> {
        std::mem::take(&mut *self.0)
            .into_values()
            .map(|slot| slot.cell)
    }
}
