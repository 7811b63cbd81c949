// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Event flag groups
//!
//! An [`EventFlags`] holds a word of bits.  Threads wait for a pattern of those bits, either for
//! all of them ([`WaitMode::All`]) or for any one of them ([`WaitMode::Any`]).  Any context can
//! change the bits with [`EventFlags::set`], which wakes every waiter whose pattern is now
//! satisfied, handing each the bits that satisfied it.
//!
//! A waiter may ask for the bits that woke it to be cleared ([`WaitOptions::clear_on_exit`]).  The
//! clearing is done by `set`, once every waiter has been looked at, and it clears those bits for
//! everybody: a second waiter satisfied by the same bits, but which didn't ask for clearing, still
//! wakes, and still sees the bits cleared afterwards.  A `wait` that is satisfied immediately never
//! clears anything; only `set` modifies the bits.

use core::cell::RefCell;
use core::fmt;

use critical_section::{CriticalSection, Mutex};
use log::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::kernel::{Kernel, Port};
use crate::sys::critical::{self, CriticalGuard};
use crate::sys::event::{Visit, WaitKind, WaitList, WaitVisitor, Waiter};
use crate::sys::thread::{Priority, ThreadId, Wakeup};
use crate::time::Timeout;

/// The word of bits held by an [`EventFlags`].
pub type FlagBits = u32;

/// No bits.
pub const FLAG_NONE: FlagBits = 0;

/// Replace the bits of `old` selected by `mask` with the corresponding bits of `new`.
///
/// Bits outside `mask` keep their value from `old`.
#[inline]
pub const fn merge_bits(old: FlagBits, new: FlagBits, mask: FlagBits) -> FlagBits {
    old ^ ((old ^ new) & mask)
}

/// How a wanted pattern is matched against the flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitMode {
    /// Every wanted bit must be set.
    All,
    /// At least one wanted bit must be set.
    Any,
}

impl WaitMode {
    /// The bits of `wanted` that satisfy this mode against `flags`, or [`FLAG_NONE`].
    pub const fn test(self, flags: FlagBits, wanted: FlagBits) -> FlagBits {
        let r = flags & wanted;
        match self {
            WaitMode::All if r != wanted => FLAG_NONE,
            _ => r,
        }
    }
}

/// Options for [`EventFlags::wait`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitOptions {
    /// How the pattern is matched.
    pub mode: WaitMode,
    /// Clear the bits that wake this waiter.  Only applies when the waiter is woken by `set`.
    pub clear_on_exit: bool,
}

impl WaitOptions {
    /// Wait for all bits.
    pub const fn all() -> WaitOptions {
        WaitOptions {
            mode: WaitMode::All,
            clear_on_exit: false,
        }
    }

    /// Wait for any bit.
    pub const fn any() -> WaitOptions {
        WaitOptions {
            mode: WaitMode::Any,
            clear_on_exit: false,
        }
    }

    /// Also clear the bits that wake this waiter.
    pub const fn clear_on_exit(self) -> WaitOptions {
        WaitOptions {
            clear_on_exit: true,
            ..self
        }
    }
}

impl From<WaitMode> for WaitOptions {
    fn from(mode: WaitMode) -> WaitOptions {
        WaitOptions {
            mode,
            clear_on_exit: false,
        }
    }
}

/// The context a flag waiter leaves on the wait list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FlagWait {
    pub(crate) wanted: FlagBits,
    pub(crate) options: WaitOptions,
}

struct FlagState {
    flags: FlagBits,
    waiters: WaitList,
}

/// An event flag group.
pub struct EventFlags {
    state: Mutex<RefCell<Option<FlagState>>>,
}

impl EventFlags {
    /// A flag group that has not been created yet.
    pub const fn new() -> EventFlags {
        EventFlags {
            state: Mutex::new(RefCell::new(None)),
        }
    }

    /// Create the flag group, with the given initial bits.
    ///
    /// Creating a group again resets it.  Threads still blocked on it are then never woken.
    pub fn create(&self, flags: FlagBits) {
        let stranded = critical::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let stranded = state.as_ref().map_or(0, |old| old.waiters.len());
            *state = Some(FlagState {
                flags,
                waiters: WaitList::new(),
            });
            stranded
        });
        if stranded > 0 {
            warn!("flag group re-created with {stranded} waiting threads");
        }
    }

    /// Wait for a pattern of bits.
    ///
    /// Returns the bits of `wanted` that satisfied the wait.  If they are not set, and `timeout` is
    /// not [`NoWait`], the calling thread blocks until a [`set`] satisfies it, or the timeout
    /// expires.
    ///
    /// Errors, in the order they are checked:
    /// - [`Error::NullTarget`]: the group has not been created.
    /// - [`Error::InterruptContext`]: called from an interrupt handler.
    /// - [`Error::SchedulerLocked`]: called with the scheduler locked.
    /// - [`Error::IdleThreadBlocked`]: called from the idle thread with a timeout.
    /// - [`Error::AgainLater`]: not satisfied, and `timeout` is [`NoWait`].
    /// - [`Error::Timeout`]: not satisfied before the timeout expired.
    ///
    /// [`NoWait`]: crate::time::NoWait
    /// [`set`]: EventFlags::set
    pub fn wait<P, O, T>(
        &self,
        kernel: &Kernel<P>,
        options: O,
        wanted: FlagBits,
        timeout: T,
    ) -> Result<FlagBits>
    where
        P: Port,
        O: Into<WaitOptions>,
        T: Into<Timeout>,
    {
        let options: WaitOptions = options.into();
        let timeout: Timeout = timeout.into();

        let blocked = {
            let guard = CriticalGuard::enter();
            let cs = guard.token();
            let mut state = self.state.borrow_ref_mut(cs);
            let state = state.as_mut().ok_or(Error::NullTarget)?;
            let thread = kernel.check_wait(cs, timeout)?;

            let r = options.mode.test(state.flags, wanted);
            if r != FLAG_NONE {
                return Ok(r);
            }
            if timeout.is_no_wait() {
                Err(Error::AgainLater)
            } else {
                let priority = kernel.block(cs, thread, timeout)?;
                let waiter = Waiter {
                    thread,
                    priority,
                    kind: WaitKind::Flag(FlagWait { wanted, options }),
                };
                let inserted = state.waiters.insert(waiter);
                if inserted.is_err() {
                    kernel.unblock(cs, thread);
                }
                inserted.map(|()| thread)
            }
        };
        let thread = blocked.inspect_err(|e| match e {
            Error::AgainLater => debug!("flag wait {wanted:#x}: would block"),
            e => debug!("flag wait {wanted:#x}: {e}"),
        })?;

        match kernel.suspend_until_woken(thread) {
            Wakeup::Signaled(bits) => Ok(bits),
            Wakeup::TimedOut => {
                self.forget(thread);
                Err(Error::Timeout)
            }
        }
    }

    /// Set and clear bits, waking every waiter now satisfied.
    ///
    /// The bits selected by `mask` take their value from `bits`; the others are left alone.  Each
    /// waiter is then tested against the new value.  Those satisfied are woken, and receive the
    /// bits that satisfied them.  Finally, the bits that woke a waiter that asked for
    /// `clear_on_exit` are cleared.
    ///
    /// Never blocks, may be called from any context.  A reschedule is requested if a woken thread
    /// outranks the caller.
    pub fn set<P: Port>(&self, kernel: &Kernel<P>, bits: FlagBits, mask: FlagBits) -> Result<()> {
        let (flags, cleared, sched) = critical::with(|cs| -> Result<(FlagBits, FlagBits, bool)> {
            let mut state = self.state.borrow_ref_mut(cs);
            let state = state.as_mut().ok_or(Error::NullTarget)?;

            state.flags = merge_bits(state.flags, bits, mask);
            let mut walk = SetWalk {
                kernel,
                cs,
                flags: state.flags,
                running: kernel.running_priority(cs),
                clear: FLAG_NONE,
                sched: false,
            };
            state.waiters.walk(&mut walk);
            state.flags &= !walk.clear;
            Ok((state.flags, walk.clear, walk.sched))
        })?;
        trace!("flags now {flags:#x}, cleared {cleared:#x}");
        if sched {
            kernel.request_reschedule();
        }
        Ok(())
    }

    /// Clear the bits in `mask`.  The same as `set(kernel, 0, mask)`.
    pub fn clear<P: Port>(&self, kernel: &Kernel<P>, mask: FlagBits) -> Result<()> {
        self.set(kernel, FLAG_NONE, mask)
    }

    /// The current bits.
    pub fn get(&self) -> Result<FlagBits> {
        critical::with(|cs| {
            self.state
                .borrow_ref(cs)
                .as_ref()
                .map(|state| state.flags)
                .ok_or(Error::NullTarget)
        })
    }

    /// The number of threads blocked on this group.
    pub fn waiting(&self) -> Result<usize> {
        critical::with(|cs| {
            self.state
                .borrow_ref(cs)
                .as_ref()
                .map(|state| state.waiters.len())
                .ok_or(Error::NullTarget)
        })
    }

    /// Drop the wait list record of a thread whose wait timed out.
    fn forget(&self, thread: ThreadId) {
        critical::with(|cs| {
            if let Some(state) = self.state.borrow_ref_mut(cs).as_mut() {
                state.waiters.remove(thread);
            }
        });
    }
}

impl Default for EventFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Ok(flags) => write!(f, "sys::EventFlags {flags:#x}"),
            Err(_) => write!(f, "sys::EventFlags (not created)"),
        }
    }
}

/// Accumulates the outcome of one [`EventFlags::set`] while walking the waiters.
struct SetWalk<'a, P: Port> {
    kernel: &'a Kernel<P>,
    cs: CriticalSection<'a>,
    /// The flags after the update, before any clearing.
    flags: FlagBits,
    /// Priority of the caller of `set`.
    running: Priority,
    /// Bits that woke a waiter asking for them to be cleared.
    clear: FlagBits,
    /// A woken waiter outranks the caller.
    sched: bool,
}

impl<P: Port> WaitVisitor for SetWalk<'_, P> {
    fn visit(&mut self, waiter: &Waiter) -> Visit {
        let WaitKind::Flag(ctx) = waiter.kind else {
            return Visit::Keep;
        };
        let r = ctx.options.mode.test(self.flags, ctx.wanted);
        if r == FLAG_NONE {
            return Visit::Keep;
        }
        // A record whose thread already timed out is stale, and just dropped.
        if let Some(priority) = self.kernel.wake(self.cs, waiter.thread, Wakeup::Signaled(r)) {
            if ctx.options.clear_on_exit {
                self.clear |= r;
            }
            if priority > self.running {
                self.sched = true;
            }
        }
        Visit::Remove
    }
}
