// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Real-time kernel synchronization primitives
//!
//! This crate provides the synchronization layer of a small preemptive, priority-based kernel:
//! event flag groups ([`EventFlags`]) and counting semaphores ([`Semaphore`]).  Both let threads
//! block until a condition becomes true, and let other threads, or interrupt handlers, satisfy that
//! condition.
//!
//! Everything that depends on the target (context switching, interrupt state, the scheduler) is
//! reached through the [`Port`] trait.  The [`Kernel`] handle wraps a port together with the
//! thread table and is passed explicitly to every operation that can block or wake a thread.
//!
//! With the `std` feature (the default), [`port::host::HostPort`] runs kernel threads on top of std
//! threads, which is how the test suite exercises the primitives.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod kernel;
pub mod logging;
pub mod port;
pub mod sys;
pub mod time;

pub use error::{Error, Result};
pub use kernel::{Kernel, Port};

pub use logging::set_logger;

pub use sys::sync::{EventFlags, FlagBits, Semaphore, WaitMode, WaitOptions};
pub use sys::thread::{Priority, ThreadId};

pub mod atomic {
    //! Re-export portable atomic.
    //!
    //! Small cores frequently lack atomic read-modify-write instructions.  The
    //! [`portable-atomic`](https://crates.io/crates/portable-atomic) crate either re-exports the
    //! types from core, or provides them through a critical section when the instructions aren't
    //! available.

    pub use portable_atomic::*;
}
