// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Kernel build configuration.
//!
//! These values size the static tables of the kernel.  A wait list can never hold more records
//! than there are threads, so [`MAX_THREADS`] also bounds every wait list.

/// Number of thread control blocks, including the idle thread.
pub const MAX_THREADS: usize = 16;

/// The most urgent thread priority.  Priorities run from 0 (the idle thread) up to this value.
pub const HIGHEST_PRIORITY: u8 = 15;

/// Frequency of the system tick, delivered through [`Kernel::tick`].
///
/// [`Kernel::tick`]: crate::Kernel::tick
pub const SYS_CLOCK_TICKS_PER_SEC: u32 = 1000;
