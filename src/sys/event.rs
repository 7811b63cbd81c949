// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Wait lists
//!
//! Every synchronization object owns a [`WaitList`]: the threads currently blocked on it, kept
//! highest priority first, and in arrival order among threads of equal priority.  Each record
//! carries the typed context of the wait, so that the object can decide, when its state changes,
//! which waiters are now satisfied.
//!
//! The list never touches the object's own state (the flag bits, or the semaphore count).  Objects
//! either take the first waiter that can still be claimed ([`WaitList::signal_one`]), or visit all
//! of them with a [`WaitVisitor`] that decides, record by record, who leaves the list
//! ([`WaitList::walk`]).
//!
//! All methods must be called with the critical section held, which the owning object guarantees by
//! keeping its wait list inside a `critical_section::Mutex`.

use arrayvec::ArrayVec;

use crate::config::MAX_THREADS;
use crate::error::{Error, Result};
use crate::sys::sync::flag::FlagWait;
use crate::sys::thread::{Priority, ThreadId};

/// What a waiter is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WaitKind {
    /// Waiting for a pattern of bits on an event flag group.
    Flag(FlagWait),
    /// Waiting to take a semaphore.
    Semaphore,
}

/// A single blocked thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Waiter {
    pub(crate) thread: ThreadId,
    /// Priority when the thread blocked.  This determines the position in the list.
    pub(crate) priority: Priority,
    pub(crate) kind: WaitKind,
}

/// The verdict of a [`WaitVisitor`] on a single waiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Visit {
    /// Leave the waiter on the list.
    Keep,
    /// Take the waiter off the list.
    Remove,
}

/// Decides, for each waiter in turn, whether it leaves the list.
pub(crate) trait WaitVisitor {
    fn visit(&mut self, waiter: &Waiter) -> Visit;
}

/// The ordered set of threads blocked on one object.
#[derive(Debug)]
pub(crate) struct WaitList {
    waiters: ArrayVec<Waiter, MAX_THREADS>,
}

impl WaitList {
    pub(crate) const fn new() -> WaitList {
        WaitList {
            waiters: ArrayVec::new_const(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Add a waiter behind every waiter of the same or higher priority.
    pub(crate) fn insert(&mut self, waiter: Waiter) -> Result<()> {
        let pos = self
            .waiters
            .iter()
            .position(|w| w.priority < waiter.priority)
            .unwrap_or(self.waiters.len());
        self.waiters
            .try_insert(pos, waiter)
            .map_err(|_| Error::Overflow)
    }

    /// Remove waiters from the head of the list until `claim` accepts one.
    ///
    /// `claim` returns `None` for a waiter that can no longer be woken (its wait already ended by
    /// timeout).  Such records are dropped.  Returns the accepted waiter and the result of `claim`.
    pub(crate) fn signal_one<R>(
        &mut self,
        mut claim: impl FnMut(&Waiter) -> Option<R>,
    ) -> Option<(Waiter, R)> {
        while !self.waiters.is_empty() {
            let waiter = self.waiters.remove(0);
            if let Some(r) = claim(&waiter) {
                return Some((waiter, r));
            }
        }
        None
    }

    /// Visit every waiter once, in order, removing those the visitor rejects.
    pub(crate) fn walk<V: WaitVisitor>(&mut self, visitor: &mut V) {
        self.waiters
            .retain(|waiter| visitor.visit(waiter) == Visit::Keep);
    }

    /// Remove the record of a given thread, if it is present.
    pub(crate) fn remove(&mut self, thread: ThreadId) -> Option<Waiter> {
        let pos = self.waiters.iter().position(|w| w.thread == thread)?;
        Some(self.waiters.remove(pos))
    }
}
