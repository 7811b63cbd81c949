// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Kernel Semaphore support
//!
//! A counting semaphore, with both an upper and a lower bound on the count.  Unlike some kernels,
//! calling [`give`] on a semaphore that is at its limit doesn't silently discard the unit: it fails
//! with [`Error::Overflow`] and leaves the count alone.
//!
//! When a thread is blocked in [`take`], [`give`] hands the unit straight to it.  The count is not
//! touched, and the hand-over happens in the same critical section that takes the thread off the
//! wait list, so a timeout expiring at the same moment cannot also claim the thread.
//!
//! [`give`]: Semaphore::give
//! [`take`]: Semaphore::take

use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::kernel::{Kernel, Port};
use crate::sys::critical::{self, CriticalGuard};
use crate::sys::event::{WaitKind, WaitList, Waiter};
use crate::sys::thread::{ThreadId, Wakeup};
use crate::time::Timeout;

/// The largest limit a semaphore can be created with.
pub const SEM_MAX_LIMIT: u32 = u32::MAX;

struct SemState {
    count: u32,
    limit: u32,
    waiters: WaitList,
}

/// A counting semaphore.
pub struct Semaphore {
    state: Mutex<RefCell<Option<SemState>>>,
}

impl Semaphore {
    /// A semaphore that has not been created yet.
    pub const fn new() -> Semaphore {
        Semaphore {
            state: Mutex::new(RefCell::new(None)),
        }
    }

    /// Create the semaphore with an initial count and a limit.
    ///
    /// Fails with [`Error::InvalidValue`] if `limit` is zero, or `count` is above it.  Creating a
    /// semaphore again resets it.  Threads still blocked on it are then never woken.
    pub fn create(&self, count: u32, limit: u32) -> Result<()> {
        if limit == 0 || count > limit {
            return Err(Error::InvalidValue);
        }
        let stranded = critical::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let stranded = state.as_ref().map_or(0, |old| old.waiters.len());
            *state = Some(SemState {
                count,
                limit,
                waiters: WaitList::new(),
            });
            stranded
        });
        if stranded > 0 {
            warn!("semaphore re-created with {stranded} waiting threads");
        }
        Ok(())
    }

    /// Take a semaphore.
    ///
    /// If the count is above zero, it is decremented.  Otherwise, unless `timeout` is [`NoWait`],
    /// the calling thread blocks until a [`give`] hands it a unit, or the timeout expires.
    ///
    /// The eligibility checks, and their order, are the same as for [`EventFlags::wait`].
    ///
    /// [`NoWait`]: crate::time::NoWait
    /// [`give`]: Semaphore::give
    /// [`EventFlags::wait`]: crate::EventFlags::wait
    pub fn take<P, T>(&self, kernel: &Kernel<P>, timeout: T) -> Result<()>
    where
        P: Port,
        T: Into<Timeout>,
    {
        let timeout: Timeout = timeout.into();

        let blocked = {
            let guard = CriticalGuard::enter();
            let cs = guard.token();
            let mut state = self.state.borrow_ref_mut(cs);
            let state = state.as_mut().ok_or(Error::NullTarget)?;
            let thread = kernel.check_wait(cs, timeout)?;

            if state.count > 0 {
                state.count -= 1;
                return Ok(());
            }
            if timeout.is_no_wait() {
                Err(Error::AgainLater)
            } else {
                let priority = kernel.block(cs, thread, timeout)?;
                let waiter = Waiter {
                    thread,
                    priority,
                    kind: WaitKind::Semaphore,
                };
                let inserted = state.waiters.insert(waiter);
                if inserted.is_err() {
                    kernel.unblock(cs, thread);
                }
                inserted.map(|()| thread)
            }
        };
        let thread = blocked.inspect_err(|e| debug!("semaphore take: {e}"))?;

        match kernel.suspend_until_woken(thread) {
            Wakeup::Signaled(_) => Ok(()),
            Wakeup::TimedOut => {
                self.forget(thread);
                Err(Error::Timeout)
            }
        }
    }

    /// Give a semaphore.
    ///
    /// If a thread is waiting, the most urgent one (the earliest among equals) receives the unit
    /// directly, and a reschedule is requested if it outranks the caller.  Otherwise the count is
    /// incremented, or, at the limit, [`Error::Overflow`] is returned.
    ///
    /// Never blocks, may be called from any context.
    pub fn give<P: Port>(&self, kernel: &Kernel<P>) -> Result<()> {
        let sched = critical::with(|cs| -> Result<bool> {
            let mut state = self.state.borrow_ref_mut(cs);
            let state = state.as_mut().ok_or(Error::NullTarget)?;
            let running = kernel.running_priority(cs);

            let woken = state
                .waiters
                .signal_one(|w| kernel.wake(cs, w.thread, Wakeup::Signaled(0)));
            match woken {
                Some((_, priority)) => Ok(priority > running),
                None if state.count < state.limit => {
                    state.count += 1;
                    Ok(false)
                }
                None => Err(Error::Overflow),
            }
        })
        .inspect_err(|e| debug!("semaphore give: {e}"))?;
        if sched {
            kernel.request_reschedule();
        }
        Ok(())
    }

    /// The current count.
    pub fn count(&self) -> Result<u32> {
        critical::with(|cs| {
            self.state
                .borrow_ref(cs)
                .as_ref()
                .map(|state| state.count)
                .ok_or(Error::NullTarget)
        })
    }

    /// The limit the semaphore was created with.
    pub fn limit(&self) -> Result<u32> {
        critical::with(|cs| {
            self.state
                .borrow_ref(cs)
                .as_ref()
                .map(|state| state.limit)
                .ok_or(Error::NullTarget)
        })
    }

    /// The number of threads blocked on this semaphore.
    pub fn waiting(&self) -> Result<usize> {
        critical::with(|cs| {
            self.state
                .borrow_ref(cs)
                .as_ref()
                .map(|state| state.waiters.len())
                .ok_or(Error::NullTarget)
        })
    }

    /// Drop the wait list record of a thread whose take timed out.
    fn forget(&self, thread: ThreadId) {
        critical::with(|cs| {
            if let Some(state) = self.state.borrow_ref_mut(cs).as_mut() {
                state.waiters.remove(thread);
            }
        });
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.count(), self.limit()) {
            (Ok(count), Ok(limit)) => write!(f, "sys::Semaphore {count}/{limit}"),
            _ => write!(f, "sys::Semaphore (not created)"),
        }
    }
}
