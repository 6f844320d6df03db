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

//! Contains the logger

use lazy_static::lazy_static;

use std::cmp;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::io::LogFlags;
use crate::time::TimeInstant;

const MAX_NAME_LEN: usize = 8;
const SUFFIX: &str = "\x1B[0m";

static FLAGS: AtomicU64 = AtomicU64::new(
    LogFlags::Info.bits() | LogFlags::Warn.bits() | LogFlags::Error.bits(),
);

lazy_static! {
    static ref LOG: Mutex<Log> = Mutex::new(Log::new());
}

/// A line-buffered logger that writes to stderr
///
/// Each line is prefixed with the (colored) name of the component and the number of microseconds
/// since the start of the process.
pub struct Log {
    buf: String,
    prefix: String,
}

impl Log {
    /// Returns the logger
    pub fn get() -> MutexGuard<'static, Log> {
        // the logger is always in a consistent state, even if a thread panicked while logging
        LOG.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn new() -> Self {
        let mut log = Log {
            buf: String::new(),
            prefix: String::new(),
        };
        log.init("");
        log
    }

    pub(crate) fn init(&mut self, name: &str) {
        let colors = ["31", "32", "33", "34", "35", "36"];
        let begin = match name.rfind('/') {
            Some(b) => b + 1,
            None => 0,
        };
        let short = &name[begin..];
        let len = cmp::min(short.len(), MAX_NAME_LEN);
        let color = short.bytes().fold(0usize, |h, b| h.wrapping_add(b as usize));

        self.prefix = format!(
            "\x1B[0;{}m[{:<8}@",
            colors[color % colors.len()],
            short.get(..len).unwrap_or(short)
        );
    }

    fn flush(&mut self) {
        let micros = (TimeInstant::now().as_nanos() / 1000) % 10_000_000_000;
        let line = format!(
            "{}{:11}] {}{}\n",
            self.prefix,
            micros,
            self.buf.trim_end_matches('\n'),
            SUFFIX
        );
        // there is nothing we can do if stderr is gone
        io::stderr().write_all(line.as_bytes()).ok();
        self.buf.clear();
    }
}

impl fmt::Write for Log {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for line in s.split_inclusive('\n') {
            self.buf.push_str(line);
            if line.ends_with('\n') {
                self.flush();
            }
        }
        Ok(())
    }
}

/// Returns true if all flags in `flags` are currently enabled
#[inline(always)]
pub fn enabled(flags: LogFlags) -> bool {
    LogFlags::from_bits_retain(FLAGS.load(Ordering::Relaxed)).contains(flags)
}

/// Returns the currently enabled log flags
pub fn flags() -> LogFlags {
    LogFlags::from_bits_retain(FLAGS.load(Ordering::Relaxed))
}

/// Sets the log flags to `flags`
pub fn set_flags(flags: LogFlags) {
    FLAGS.store(flags.bits(), Ordering::Relaxed);
}

/// Initializes the logger with given component name
pub fn init(name: &str) {
    Log::get().init(name);
}
