// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Logging
//!
//! All logging in this crate goes through the `log` crate.  The primitives log at `trace` level
//! when threads block, wake, and time out, at `debug` level for would-block and overflow outcomes,
//! and at `warn` level when an object is re-created while threads are still blocked on it.
//!
//! Where the messages end up is the application's choice.  On a target, the platform installs its
//! own logger.  With the `std` feature, [`set_logger`] installs a simple logger writing to stderr.

use log::SetLoggerError;

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        mod impl_std;
        pub use impl_std::set_logger;
    } else {
        /// No logging backend is available, provide an empty handler that does nothing.
        ///
        /// The platform is expected to install its own `log` implementation.
        ///
        /// # Safety
        ///
        /// Always safe, this is unsafe only to match the signature with a backend.
        pub unsafe fn set_logger() -> Result<(), SetLoggerError> {
            Ok(())
        }
    }
}

// Installs the backend at `Info`.  Targets without atomic pointers only have the racy entry points
// of the log crate, which is why `set_logger` is unsafe.
cfg_if::cfg_if! {
    if #[cfg(all(feature = "std", target_has_atomic = "ptr"))] {
        unsafe fn set_logger_internal(logger: &'static dyn log::Log) -> Result<(), SetLoggerError> {
            log::set_logger(logger)?;
            log::set_max_level(log::LevelFilter::Info);
            Ok(())
        }
    } else if #[cfg(feature = "std")] {
        unsafe fn set_logger_internal(logger: &'static dyn log::Log) -> Result<(), SetLoggerError> {
            log::set_logger_racy(logger)?;
            log::set_max_level_racy(log::LevelFilter::Info);
            Ok(())
        }
    }
}
