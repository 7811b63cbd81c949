// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Time types
//!
//! The kernel measures time in ticks of the system clock, delivered through [`Kernel::tick`].
//! Blocking calls take anything that converts into a [`Timeout`]:
//!
//! - [`NoWait`]: do not block, fail with [`AgainLater`] instead.
//! - [`Forever`]: block until signalled, never time out.
//! - A [`Duration`], or a raw [`Tick`] count.
//!
//! [`Duration`] and [`Instant`] are [`fugit`] types fixed at the system tick rate, so conversions
//! to and from human units are done at compile time where possible.
//!
//! [`Kernel::tick`]: crate::Kernel::tick
//! [`AgainLater`]: crate::Error::AgainLater

use crate::config::SYS_CLOCK_TICKS_PER_SEC;

/// The system tick frequency, in Hz.
pub const SYS_FREQUENCY: u32 = SYS_CLOCK_TICKS_PER_SEC;

/// A count of system ticks.
pub type Tick = u32;

/// Duration appropriate for kernel calls.
pub type Duration = fugit::Duration<Tick, 1, SYS_FREQUENCY>;

/// An instant of kernel uptime.
pub type Instant = fugit::Instant<Tick, 1, SYS_FREQUENCY>;

/// How long a blocking call may wait.
///
/// The value is a tick count, with `0` meaning "don't wait", and `Tick::MAX` meaning "wait
/// forever".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeout(pub Tick);

impl Timeout {
    /// Is this a request not to block at all?
    pub const fn is_no_wait(self) -> bool {
        self.0 == 0
    }

    /// Is this a request to block with no deadline?
    pub const fn is_forever(self) -> bool {
        self.0 == Tick::MAX
    }

    /// The number of ticks before expiry, `None` for [`Forever`].
    pub const fn ticks(self) -> Option<Tick> {
        if self.is_forever() {
            None
        } else {
            Some(self.0)
        }
    }
}

impl From<Duration> for Timeout {
    fn from(value: Duration) -> Self {
        // A finite duration must never turn into the forever sentinel.
        Timeout(value.ticks().min(Tick::MAX - 1))
    }
}

impl From<Tick> for Timeout {
    fn from(value: Tick) -> Self {
        Timeout(value)
    }
}

/// A sentinel value that can be used as a [`Timeout`] that will wait forever.
#[derive(Clone, Copy, Debug)]
pub struct Forever;

impl From<Forever> for Timeout {
    fn from(_value: Forever) -> Timeout {
        crate::sys::K_FOREVER
    }
}

/// A sentinel value that can be used as a [`Timeout`] that will not wait.
#[derive(Clone, Copy, Debug)]
pub struct NoWait;

impl From<NoWait> for Timeout {
    fn from(_value: NoWait) -> Timeout {
        crate::sys::K_NO_WAIT
    }
}
