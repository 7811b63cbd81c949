// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Ports
//!
//! Implementations of [`Port`] live here.  A target port wires the trait to its context switch
//! and interrupt controller.  The host port runs kernel threads as std threads, and is what the
//! test suite uses.
//!
//! [`Port`]: crate::Port

#[cfg(feature = "std")]
pub mod host;
