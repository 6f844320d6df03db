/*
 * Copyright (C) 2024 Nils Asmussen, Barkhausen Institut
 *
 * This file is part of M3 (Microkernel-based SysteM for Heterogeneous Manycores).
 *
 * M3 is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License version 2 as
 * published by the Free Software Foundation.
 *
 * M3 is distributed in the hope that it will be useful, but
 * WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
 * General Public License version 2 for more details.
 */

//! Contains the modules for logging

pub mod log;
mod logflags;

pub use self::logflags::LogFlags;

use std::env;

use crate::errors::{Code, VerboseError};

/// Macro for logging (includes a trailing newline)
///
/// The arguments are printed if $flag is enabled (see `$crate::io::LogFlags`).
///
/// # Examples
///
/// ```
/// use base::io::LogFlags;
/// base::log!(LogFlags::NvsDoms, "my log entry: {}, {}", 1, "test");
/// ```
#[macro_export]
macro_rules! log {
    ($flag:expr, $fmt:expr)                   => (
        $crate::log!(@log_impl $flag, concat!($fmt, "\n"))
    );

    ($flag:expr, $fmt:expr, $($arg:tt)*)      => (
        $crate::log!(@log_impl $flag, concat!($fmt, "\n"), $($arg)*)
    );

    (@log_impl $flag:expr, $($args:tt)*)    => ({
        if $crate::io::log::enabled($flag) {
            use ::std::fmt::Write;
            $crate::io::log::Log::get().write_fmt(format_args!($($args)*)).ok();
        }
    });
}

/// Initializes the I/O module
///
/// Sets the name that prefixes all log lines and enables the log flags given in the environment
/// variable `LOG`, if present (e.g., `LOG="Info|Warn|Error|NvsTick"`).
pub fn init(name: &str) -> Result<(), VerboseError> {
    log::init(name);

    if let Ok(flags) = env::var("LOG") {
        let flags = flags.parse::<LogFlags>().map_err(|e| {
            VerboseError::new(Code::InvArgs, format!("Invalid LOG flags '{}': {}", flags, e))
        })?;
        log::set_flags(flags);
    }
    Ok(())
}
