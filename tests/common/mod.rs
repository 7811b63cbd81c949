// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::time::{Duration, Instant};

use rtk_sync::port::host::HostPort;
use rtk_sync::Kernel;

/// Spin until `cond` holds.  Panics after a generous deadline, so a broken wakeup fails the test
/// rather than hanging it.
pub fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "condition never became true");
        std::thread::yield_now();
    }
}

/// A fresh kernel on the host port.
pub fn kernel() -> Kernel<HostPort> {
    Kernel::new(HostPort::new())
}

/// Deliver `n` ticks.
pub fn ticks(kernel: &Kernel<HostPort>, n: u32) {
    for _ in 0..n {
        kernel.tick();
    }
}
