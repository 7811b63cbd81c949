// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Logging to stderr
//!
//! This module implements a log handler (for the [`log`] crate) that writes messages to the host's
//! standard error.  Filtering is global, and set to Info.

use std::io::Write;

use log::{Log, Metadata, Record, SetLoggerError};

/// A simple log handler, built around stderr.
struct StderrLogger;

impl Log for StderrLogger {
    // Filtering is done by the global max level.
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    // Each message is written with a single call on the locked handle, so lines from different
    // threads don't interleave.
    fn log(&self, record: &Record<'_>) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}:{}: {}", record.level(), record.target(), record.args());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static STDERR_LOGGER: StderrLogger = StderrLogger;

/// Set the log handler to log messages to stderr.
///
/// # Safety
///
/// This is unsafe due to racy issues in the log framework on targets that do not support atomic
/// pointers.  As long as this is called by a single thread, before others start, it is safe to use.
pub unsafe fn set_logger() -> Result<(), SetLoggerError> {
    super::set_logger_internal(&STDERR_LOGGER)
}
