// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Kernel 'sys' module.
//!
//! This holds the low-level pieces the primitives are built from: the critical section, the thread
//! control blocks, the wait lists, and the primitives themselves in [`sync`].

use crate::time::{Tick, Timeout};

pub(crate) mod event;
pub mod sync;
pub mod thread;

/// Represents a timeout with an infinite delay.
///
/// Calls using this value will wait as long as necessary to perform the requested operation.
pub const K_FOREVER: Timeout = Timeout(Tick::MAX);

/// Represents a null timeout delay.
///
/// Calls using this value will not wait if the operation cannot be performed immediately.
pub const K_NO_WAIT: Timeout = Timeout(0);

pub mod critical {
    //! Scoped critical sections.
    //!
    //! All kernel state is protected by the critical section provided by the
    //! [`critical-section`](https://crates.io/crates/critical-section) crate.  The target (or the
    //! `std` feature on a host) supplies the implementation, which must allow nesting: an inner
    //! acquire while already inside the section only records that it was nested, and its release
    //! leaves the section held.
    //!
    //! [`CriticalGuard`] holds the section for its lifetime, so every exit from an operation,
    //! including early error returns through `?`, releases it.

    use core::marker::PhantomData;

    use critical_section::{CriticalSection, RestoreState};

    /// An RAII implementation of a held critical section.
    ///
    /// Guards may nest, and must be dropped in the reverse order they were entered, which scoping
    /// guarantees.
    pub struct CriticalGuard {
        restore: RestoreState,
        // Restoring interrupt state on another CPU or thread is meaningless, so mark !Send.
        _nosend: PhantomData<*mut ()>,
    }

    impl CriticalGuard {
        /// Enter the critical section.
        pub fn enter() -> CriticalGuard {
            // SAFETY: the matching release is in Drop, and guards cannot be sent elsewhere.
            let restore = unsafe { critical_section::acquire() };
            CriticalGuard {
                restore,
                _nosend: PhantomData,
            }
        }

        /// A token proving the section is held, for use with [`critical_section::Mutex`].
        pub fn token(&self) -> CriticalSection<'_> {
            // SAFETY: the section is held for as long as self is borrowed.
            unsafe { CriticalSection::new() }
        }
    }

    impl Drop for CriticalGuard {
        #[inline]
        fn drop(&mut self) {
            unsafe {
                critical_section::release(self.restore);
            }
        }
    }

    /// Run `f` inside the critical section.
    #[inline]
    pub fn with<R>(f: impl FnOnce(CriticalSection<'_>) -> R) -> R {
        let guard = CriticalGuard::enter();
        f(guard.token())
    }

}
