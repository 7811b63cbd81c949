// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Kernel thread control blocks
//!
//! The primitives don't switch contexts themselves, but they do need to know a few things about
//! every thread: its priority, whether it is currently blocked, how long until its timeout, and why
//! it was resumed.  That bookkeeping lives in a [`ThreadControl`] per thread, kept in a fixed
//! [`ThreadTable`] owned by the [`Kernel`].
//!
//! A blocked thread is resumed by exactly one cause.  Both causes, a signal from a primitive and an
//! expired timeout, go through [`ThreadControl::resolve`], which only succeeds on a thread that is
//! still waiting.  Since it is only called inside the critical section, the second of two racing
//! causes always sees the thread as already claimed.
//!
//! [`Kernel`]: crate::Kernel

use core::fmt;

use crate::config::{HIGHEST_PRIORITY, MAX_THREADS};
use crate::error::{Error, Result};
use crate::time::{Tick, Timeout};

/// Identifies a kernel thread.  An index into the thread table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub(crate) u8);

impl ThreadId {
    /// The idle thread.  It always exists, and may never block.
    pub const IDLE: ThreadId = ThreadId(0);

    /// The index of this thread in the thread table.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread#{}", self.0)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread#{}", self.0)
    }
}

/// A thread priority.  Larger values are more urgent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Priority(pub u8);

impl Priority {
    /// The priority of the idle thread.
    pub const IDLE: Priority = Priority(0);

    /// The most urgent priority available.
    pub const HIGHEST: Priority = Priority(HIGHEST_PRIORITY);
}

/// Why a blocked thread was made ready again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Wakeup {
    /// A primitive signalled the thread.  Flag waits receive the bits that satisfied them here;
    /// semaphore waits receive zero.
    Signaled(u32),
    /// The timeout expired first.
    TimedOut,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ThreadState {
    Ready,
    /// Blocked on some object.  `remaining` is `None` for a wait without deadline.
    Waiting { remaining: Option<Tick> },
}

/// The kernel's view of a single thread.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ThreadControl {
    pub(crate) priority: Priority,
    state: ThreadState,
    /// Set when the thread leaves `Waiting`, taken by the thread when it runs again.
    wakeup: Option<Wakeup>,
}

impl ThreadControl {
    const fn new(priority: Priority) -> ThreadControl {
        ThreadControl {
            priority,
            state: ThreadState::Ready,
            wakeup: None,
        }
    }

    pub(crate) fn is_waiting(&self) -> bool {
        matches!(self.state, ThreadState::Waiting { .. })
    }

    /// Mark the thread blocked, with the given timeout.
    pub(crate) fn block(&mut self, timeout: Timeout) {
        self.state = ThreadState::Waiting {
            remaining: timeout.ticks(),
        };
        self.wakeup = None;
    }

    /// Claim a waiting thread for `cause`.  Returns false if something else already did.
    pub(crate) fn resolve(&mut self, cause: Wakeup) -> bool {
        if self.is_waiting() {
            self.state = ThreadState::Ready;
            self.wakeup = Some(cause);
            true
        } else {
            false
        }
    }

    /// Count down one tick.  Returns true if this tick expired the timeout.
    fn tick(&mut self) -> bool {
        if let ThreadState::Waiting { remaining: Some(ref mut left) } = self.state {
            *left = left.saturating_sub(1);
            if *left == 0 {
                return self.resolve(Wakeup::TimedOut);
            }
        }
        false
    }

    /// Take the resumption cause, once the thread is ready again.
    pub(crate) fn take_wakeup(&mut self) -> Option<Wakeup> {
        if self.is_waiting() {
            None
        } else {
            self.wakeup.take()
        }
    }
}

/// The fixed table of all threads known to the kernel.
pub(crate) struct ThreadTable {
    slots: [Option<ThreadControl>; MAX_THREADS],
}

impl ThreadTable {
    /// A table holding only the idle thread.
    pub(crate) const fn new() -> ThreadTable {
        let mut slots = [None; MAX_THREADS];
        slots[ThreadId::IDLE.index()] = Some(ThreadControl::new(Priority::IDLE));
        ThreadTable { slots }
    }

    /// Add a thread, returning its id.
    pub(crate) fn add(&mut self, priority: Priority) -> Result<ThreadId> {
        if priority > Priority::HIGHEST {
            return Err(Error::InvalidValue);
        }
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::InvalidValue)?;
        self.slots[index] = Some(ThreadControl::new(priority));
        Ok(ThreadId(index as u8))
    }

    pub(crate) fn get(&self, id: ThreadId) -> Result<&ThreadControl> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidValue)
    }

    pub(crate) fn get_mut(&mut self, id: ThreadId) -> Result<&mut ThreadControl> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(Error::InvalidValue)
    }

    /// Priority of a thread.  Unknown threads rank as idle.
    pub(crate) fn priority(&self, id: ThreadId) -> Priority {
        self.get(id).map(|t| t.priority).unwrap_or(Priority::IDLE)
    }

    /// Deliver one tick to every thread, calling `expired` for each one whose timeout ran out.
    pub(crate) fn tick(&mut self, mut expired: impl FnMut(ThreadId, Priority)) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(thread) = slot {
                if thread.tick() {
                    expired(ThreadId(index as u8), thread.priority);
                }
            }
        }
    }
}
