// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! # Kernel errors
//!
//! Every primitive reports its outcome as a [`Result`].  The error values are discrete statuses,
//! never panics, and are always detected before (or inside) the critical section of the
//! operation, so an error never leaves an object partially modified.
//!
//! Each error also has a stable numeric code, negative like an errno, for use across a C ABI.
//! [`to_result`] maps a code back.

use core::fmt;

/// A kernel error.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// The object has not been created.
    NullTarget,
    /// An argument is out of range (semaphore bounds, thread priority, thread table size).
    InvalidValue,
    /// A thread-only call was made from an interrupt handler.
    InterruptContext,
    /// A thread-only call was made with the scheduler locked.
    SchedulerLocked,
    /// The idle thread asked to block.
    IdleThreadBlocked,
    /// The operation would have to block, and no timeout was given.
    AgainLater,
    /// The timeout expired before the object was signalled.
    Timeout,
    /// A semaphore was given past its limit, or a wait list is full.
    Overflow,
}

impl Error {
    /// The numeric status code of this error.
    pub const fn code(self) -> i8 {
        match self {
            Error::NullTarget => -1,
            Error::InvalidValue => -2,
            Error::InterruptContext => -3,
            Error::SchedulerLocked => -4,
            Error::IdleThreadBlocked => -5,
            Error::AgainLater => -6,
            Error::Timeout => -7,
            Error::Overflow => -8,
        }
    }

    /// Lookup the error for a numeric status code.
    ///
    /// Returns `None` for success (`0`) and for codes that do not name an error.
    pub const fn from_code(code: i8) -> Option<Error> {
        match code {
            -1 => Some(Error::NullTarget),
            -2 => Some(Error::InvalidValue),
            -3 => Some(Error::InterruptContext),
            -4 => Some(Error::SchedulerLocked),
            -5 => Some(Error::IdleThreadBlocked),
            -6 => Some(Error::AgainLater),
            -7 => Some(Error::Timeout),
            -8 => Some(Error::Overflow),
            _ => None,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Error::NullTarget => "object not created",
            Error::InvalidValue => "invalid value",
            Error::InterruptContext => "called from interrupt",
            Error::SchedulerLocked => "scheduler locked",
            Error::IdleThreadBlocked => "idle thread cannot block",
            Error::AgainLater => "would block",
            Error::Timeout => "timed out",
            Error::Overflow => "overflow",
        }
    }
}

impl core::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kernel error {}: {}", self.code(), self.describe())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kernel error {}: {}", self.code(), self.describe())
    }
}

/// Wraps a value with a possible kernel error.
pub type Result<T> = core::result::Result<T, Error>;

/// Map a numeric status code into a Result.
///
/// Zero and positive codes are success.  Negative codes that don't name an error are reported as
/// [`Error::InvalidValue`].
#[inline(always)]
pub fn to_result(code: i8) -> Result<()> {
    if code >= 0 {
        Ok(())
    } else {
        Err(Error::from_code(code).unwrap_or(Error::InvalidValue))
    }
}

/// Map a Result back to its numeric status code.
#[inline(always)]
pub fn to_code(result: Result<()>) -> i8 {
    match result {
        Ok(()) => 0,
        Err(e) => e.code(),
    }
}
