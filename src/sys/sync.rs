// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! # Kernel synchronization primitives.
//!
//! This module holds the two blocking primitives of the kernel:
//!
//! - [`EventFlags`]: a group of bits threads can wait on, for all or any of a pattern, optionally
//!   clearing the bits that woke them.
//! - [`Semaphore`]: a bounded counter with blocking `take` and direct-transfer `give`.
//!
//! # Kernel objects
//!
//! Both are meant to be declared as statics.  `new()` is `const`, and produces an object that has
//! not been created yet.  Every operation on such an object fails with [`NullTarget`] until its
//! `create` method has been called once:
//!
//! ```
//! use rtk_sync::{EventFlags, Semaphore};
//!
//! static READY: EventFlags = EventFlags::new();
//! static SLOTS: Semaphore = Semaphore::new();
//!
//! READY.create(0);
//! SLOTS.create(0, 4).unwrap();
//! ```
//!
//! Operations that can block or wake a thread take the [`Kernel`] as their first argument.  The
//! blocking ones, `wait` and `take`, may only be called from a thread, with the scheduler unlocked.
//! The signalling ones, `set` and `give`, never block and may be called from anywhere, including
//! interrupt handlers and the idle thread.
//!
//! [`NullTarget`]: crate::Error::NullTarget
//! [`Kernel`]: crate::Kernel

pub mod flag;
pub mod semaphore;

pub use flag::{merge_bits, EventFlags, FlagBits, WaitMode, WaitOptions, FLAG_NONE};
pub use semaphore::{Semaphore, SEM_MAX_LIMIT};
