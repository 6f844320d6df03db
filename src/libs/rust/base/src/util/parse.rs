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

use crate::errors::{Code, Error};
use crate::time::TimeDuration;

/// Parses a time from the given string
///
/// The suffixes ns, µs, us, ms, and s can be used to denote nanoseconds, microseconds,
/// milliseconds and seconds.
pub fn time(s: &str) -> Result<TimeDuration, Error> {
    let (num, mul) = if let Some(n) = s.strip_suffix("ns") {
        (n, 1)
    }
    else if let Some(n) = s.strip_suffix("µs").or_else(|| s.strip_suffix("us")) {
        (n, 1_000)
    }
    else if let Some(n) = s.strip_suffix("ms") {
        (n, 1_000_000)
    }
    else if let Some(n) = s.strip_suffix('s') {
        (n, 1_000_000_000)
    }
    else {
        return Err(Error::new(Code::InvArgs));
    };
    let nanos = int(num)?
        .checked_mul(mul)
        .ok_or_else(|| Error::new(Code::InvArgs))?;
    Ok(TimeDuration::from_nanos(nanos))
}

/// Parses a u64 from the given string
pub fn int(s: &str) -> Result<u64, Error> {
    s.parse::<u64>().map_err(|_| Error::new(Code::InvArgs))
}

/// Parses a boolean ("true" or "false") from the given string
pub fn bool(s: &str) -> Result<bool, Error> {
    match s {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Ok(int(s)? == 1),
    }
}
