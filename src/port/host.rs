// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Host port
//!
//! Runs kernel threads on std threads.  Each std thread that takes part calls [`HostPort::bind`]
//! with the id returned by [`Kernel::create_thread`]; a std thread that never binds runs as the
//! idle thread.  Suspending parks the std thread, resuming unparks it.
//!
//! Interrupt context is simulated per std thread with [`HostPort::enter_isr`].  There is no real
//! preemption, so reschedule requests are only counted, which lets tests check when they happen.
//!
//! ```
//! use rtk_sync::{Kernel, Priority, Semaphore, port::host::HostPort, time::Forever};
//!
//! let kernel = Kernel::new(HostPort::new());
//! let sem = Semaphore::new();
//! sem.create(0, 1).unwrap();
//!
//! let worker = kernel.create_thread(Priority(3)).unwrap();
//! std::thread::scope(|s| {
//!     s.spawn(|| {
//!         kernel.port().bind(worker);
//!         sem.take(&kernel, Forever).unwrap();
//!     });
//!     while sem.waiting().unwrap() == 0 {
//!         std::thread::yield_now();
//!     }
//!     sem.give(&kernel).unwrap();
//! });
//! ```
//!
//! [`Kernel::create_thread`]: crate::Kernel::create_thread

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread::Thread;

use crate::kernel::Port;
use crate::sys::thread::ThreadId;

std::thread_local! {
    static CURRENT: Cell<Option<ThreadId>> = const { Cell::new(None) };
    static ISR_NESTING: Cell<u8> = const { Cell::new(0) };
}

/// A mapping between kernel threads and the std threads running them.
///
/// Kept sorted by id, entries are added when a std thread binds.
struct ThreadMap {
    map: Vec<(ThreadId, Thread)>,
}

impl ThreadMap {
    const fn new() -> Self {
        Self { map: Vec::new() }
    }

    /// If this kernel thread has already been bound, the std thread is replaced.
    fn insert(&mut self, id: ThreadId, thread: Thread) {
        match self.map.binary_search_by(|(k, _)| k.cmp(&id)) {
            Ok(pos) => self.map[pos] = (id, thread),
            Err(pos) => self.map.insert(pos, (id, thread)),
        }
    }

    fn get(&self, id: ThreadId) -> Option<&Thread> {
        self.map
            .binary_search_by(|(k, _)| k.cmp(&id))
            .ok()
            .map(|pos| &self.map[pos].1)
    }
}

/// A [`Port`] built on std threads.
pub struct HostPort {
    threads: Mutex<ThreadMap>,
    reschedules: AtomicUsize,
}

impl HostPort {
    /// Construct a host port with no threads bound.
    pub const fn new() -> HostPort {
        HostPort {
            threads: Mutex::new(ThreadMap::new()),
            reschedules: AtomicUsize::new(0),
        }
    }

    /// Run the calling std thread as kernel thread `id`.
    pub fn bind(&self, id: ThreadId) {
        CURRENT.with(|c| c.set(Some(id)));
        self.threads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, std::thread::current());
    }

    /// Behave as an interrupt handler, on this std thread, until the guard is dropped.
    ///
    /// Nesting saturates at `u8::MAX`.  Guards entered past that level don't count, so dropping
    /// them doesn't either.
    pub fn enter_isr(&self) -> IsrGuard {
        let counted = ISR_NESTING.with(|n| match n.get().checked_add(1) {
            Some(depth) => {
                n.set(depth);
                true
            }
            None => false,
        });
        IsrGuard { counted }
    }

    /// How many reschedules have been requested so far.
    pub fn reschedule_count(&self) -> usize {
        self.reschedules.load(Ordering::SeqCst)
    }
}

impl Default for HostPort {
    fn default() -> Self {
        Self::new()
    }
}

impl Port for HostPort {
    fn current(&self) -> ThreadId {
        CURRENT.with(Cell::get).unwrap_or(ThreadId::IDLE)
    }

    fn interrupt_nesting(&self) -> u8 {
        ISR_NESTING.with(Cell::get)
    }

    fn suspend(&self, _thread: ThreadId) {
        // An unpark that came first makes this return immediately.
        std::thread::park();
    }

    fn resume(&self, thread: ThreadId) {
        let threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(t) = threads.get(thread) {
            t.unpark();
        }
    }

    fn request_reschedule(&self) {
        self.reschedules.fetch_add(1, Ordering::SeqCst);
    }
}

/// Simulated interrupt context, see [`HostPort::enter_isr`].
pub struct IsrGuard {
    counted: bool,
}

impl Drop for IsrGuard {
    fn drop(&mut self) {
        if self.counted {
            ISR_NESTING.with(|n| n.set(n.get() - 1));
        }
    }
}
