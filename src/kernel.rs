// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! The kernel context
//!
//! A [`Kernel`] bundles the platform [`Port`] with the state the primitives share: the thread
//! table, the scheduler lock, and the tick counter.  It is passed explicitly to every operation
//! that can block or wake a thread, so those side effects show up in the signatures.
//!
//! `Kernel::new` is `const`, so the usual arrangement is a single static:
//!
//! ```
//! use rtk_sync::{Kernel, port::host::HostPort};
//!
//! static KERNEL: Kernel<HostPort> = Kernel::new(HostPort::new());
//! ```
//!
//! ## Blocking
//!
//! A blocking call marks the running thread as waiting and records it on the object's wait list,
//! both inside one critical section.  It then leaves the section and asks the port to suspend the
//! thread.  The thread is made ready again either by a primitive ([`Kernel::wake`]) or by its
//! timeout running out ([`Kernel::tick`]).  Both of these happen inside the critical section and
//! only ever claim a thread that is still waiting, so exactly one of them wins.

use core::cell::RefCell;
use core::sync::atomic::Ordering;

use critical_section::{CriticalSection, Mutex};
use log::trace;

use crate::atomic::AtomicU32;
use crate::config::MAX_THREADS;
use crate::error::{Error, Result};
use crate::sys::critical;
use crate::sys::thread::{Priority, ThreadId, ThreadTable, Wakeup};
use crate::time::{Instant, Timeout};

/// The platform interface the kernel is built on.
///
/// A port provides the things this crate does not do itself: knowing which thread is running,
/// knowing whether an interrupt handler is running, switching away from a blocked thread, and
/// making a woken thread runnable.
pub trait Port: Sync {
    /// The thread currently running (or interrupted, when called from an interrupt handler).
    fn current(&self) -> ThreadId;

    /// How deeply interrupt handlers are nested.  Zero in thread context.
    fn interrupt_nesting(&self) -> u8;

    /// Switch away from `thread`, which has just blocked, until it is resumed.
    ///
    /// A [`resume`] of the same thread that happens before this call must not be lost.  Returning
    /// early is allowed; the kernel checks whether the thread really was woken and suspends again
    /// if not.
    ///
    /// [`resume`]: Port::resume
    fn suspend(&self, thread: ThreadId);

    /// Make `thread` runnable again.  Called with the critical section held.
    fn resume(&self, thread: ThreadId);

    /// A thread more urgent than the running one has become ready.
    ///
    /// This is a request, the port may switch immediately or at its next preemption point.
    fn request_reschedule(&self);
}

struct KernelState {
    threads: ThreadTable,
    sched_lock: u8,
}

/// The kernel context shared by all primitives.
pub struct Kernel<P: Port> {
    port: P,
    state: Mutex<RefCell<KernelState>>,
    ticks: AtomicU32,
}

impl<P: Port> Kernel<P> {
    /// Construct a kernel on the given port.  Only the idle thread exists.
    pub const fn new(port: P) -> Kernel<P> {
        Kernel {
            port,
            state: Mutex::new(RefCell::new(KernelState {
                threads: ThreadTable::new(),
                sched_lock: 0,
            })),
            ticks: AtomicU32::new(0),
        }
    }

    /// The underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Register a new thread with the given priority.
    ///
    /// Fails with [`Error::InvalidValue`] if the priority is above [`Priority::HIGHEST`], or all
    /// [`MAX_THREADS`] slots are in use.
    pub fn create_thread(&self, priority: Priority) -> Result<ThreadId> {
        let id = critical::with(|cs| self.state.borrow_ref_mut(cs).threads.add(priority))?;
        trace!("{id} created at priority {}", priority.0);
        Ok(id)
    }

    /// The running thread.
    pub fn current(&self) -> ThreadId {
        self.port.current()
    }

    /// Is this the idle thread?
    pub fn is_idle(&self, thread: ThreadId) -> bool {
        thread == ThreadId::IDLE
    }

    /// The priority of a thread.
    pub fn priority(&self, thread: ThreadId) -> Result<Priority> {
        critical::with(|cs| Ok(self.state.borrow_ref(cs).threads.get(thread)?.priority))
    }

    /// Change the priority of a thread.
    ///
    /// A reschedule is requested if the thread now outranks the running one.  Wait lists the thread
    /// is already queued on keep their order.
    pub fn set_priority(&self, thread: ThreadId, priority: Priority) -> Result<()> {
        if priority > Priority::HIGHEST {
            return Err(Error::InvalidValue);
        }
        let sched = critical::with(|cs| -> Result<bool> {
            let mut state = self.state.borrow_ref_mut(cs);
            let running = state.threads.priority(self.port.current());
            state.threads.get_mut(thread)?.priority = priority;
            Ok(priority > running)
        })?;
        if sched {
            self.port.request_reschedule();
        }
        Ok(())
    }

    /// Lock the scheduler.  Locks nest.
    ///
    /// Fails with [`Error::Overflow`], leaving the depth alone, if it is already at `u8::MAX`.
    pub fn sched_lock(&self) -> Result<()> {
        critical::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.sched_lock = state.sched_lock.checked_add(1).ok_or(Error::Overflow)?;
            Ok(())
        })
    }

    /// Undo one [`sched_lock`].  Unlocking to depth zero requests a reschedule.
    ///
    /// [`sched_lock`]: Kernel::sched_lock
    pub fn sched_unlock(&self) {
        let unlocked = critical::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            if state.sched_lock > 0 {
                state.sched_lock -= 1;
                state.sched_lock == 0
            } else {
                false
            }
        });
        if unlocked {
            self.port.request_reschedule();
        }
    }

    /// Current depth of the scheduler lock.
    pub fn sched_lock_depth(&self) -> u8 {
        critical::with(|cs| self.state.borrow_ref(cs).sched_lock)
    }

    /// Deliver one tick of the system clock.
    ///
    /// Every thread blocked with a deadline moves one tick closer to it.  Those that reach it are
    /// resumed with a timeout, unless a primitive already woke them.
    pub fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let sched = critical::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let running = state.threads.priority(self.port.current());
            let mut sched = false;
            state.threads.tick(|id, priority| {
                self.port.resume(id);
                sched |= priority > running;
            });
            sched
        });
        if sched {
            self.port.request_reschedule();
        }
    }

    /// Time since the kernel started, in ticks delivered through [`tick`].
    ///
    /// [`tick`]: Kernel::tick
    pub fn uptime(&self) -> Instant {
        Instant::from_ticks(self.ticks.load(Ordering::Relaxed))
    }

    pub(crate) fn request_reschedule(&self) {
        self.port.request_reschedule();
    }

    /// Priority of the running thread.
    pub(crate) fn running_priority(&self, cs: CriticalSection<'_>) -> Priority {
        self.state
            .borrow_ref(cs)
            .threads
            .priority(self.port.current())
    }

    /// Check that the running thread may call a blocking primitive, returning it if so.
    ///
    /// The checks are ordered: interrupt context first, then the scheduler lock.  The idle thread
    /// is only refused if it actually asks to wait.
    pub(crate) fn check_wait(&self, cs: CriticalSection<'_>, timeout: Timeout) -> Result<ThreadId> {
        if self.port.interrupt_nesting() > 0 {
            return Err(Error::InterruptContext);
        }
        if self.state.borrow_ref(cs).sched_lock > 0 {
            return Err(Error::SchedulerLocked);
        }
        let current = self.port.current();
        if self.is_idle(current) && !timeout.is_no_wait() {
            return Err(Error::IdleThreadBlocked);
        }
        Ok(current)
    }

    /// Mark `thread` as blocked, returning its priority.
    pub(crate) fn block(
        &self,
        cs: CriticalSection<'_>,
        thread: ThreadId,
        timeout: Timeout,
    ) -> Result<Priority> {
        let mut state = self.state.borrow_ref_mut(cs);
        let control = state.threads.get_mut(thread)?;
        control.block(timeout);
        Ok(control.priority)
    }

    /// Undo a [`block`] that never got as far as suspending.
    ///
    /// [`block`]: Kernel::block
    pub(crate) fn unblock(&self, cs: CriticalSection<'_>, thread: ThreadId) {
        if let Ok(control) = self.state.borrow_ref_mut(cs).threads.get_mut(thread) {
            if control.resolve(Wakeup::TimedOut) {
                control.take_wakeup();
            }
        }
    }

    /// Claim a waiting thread, recording why it woke, and make it runnable.
    ///
    /// Returns the priority of the thread, or `None` if it is no longer waiting (its timeout won).
    pub(crate) fn wake(
        &self,
        cs: CriticalSection<'_>,
        thread: ThreadId,
        cause: Wakeup,
    ) -> Option<Priority> {
        let mut state = self.state.borrow_ref_mut(cs);
        let control = state.threads.get_mut(thread).ok()?;
        if !control.resolve(cause) {
            return None;
        }
        let priority = control.priority;
        drop(state);
        self.port.resume(thread);
        Some(priority)
    }

    /// Suspend the calling thread until it has been woken, returning why.
    ///
    /// Block and wake transitions are logged here, outside the critical section.
    pub(crate) fn suspend_until_woken(&self, thread: ThreadId) -> Wakeup {
        trace!("{thread} blocked");
        loop {
            let wakeup = critical::with(|cs| {
                self.state
                    .borrow_ref_mut(cs)
                    .threads
                    .get_mut(thread)
                    .ok()
                    .and_then(|control| control.take_wakeup())
            });
            if let Some(wakeup) = wakeup {
                trace!("{thread} woken: {wakeup:?}");
                return wakeup;
            }
            self.port.suspend(thread);
        }
    }
}

// The thread table is sized for the wait lists as well.
const _: () = assert!(MAX_THREADS <= u8::MAX as usize);
