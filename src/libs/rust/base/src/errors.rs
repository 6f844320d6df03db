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

//! Contains the error handling types

use cfg_if::cfg_if;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde_repr::{Deserialize_repr, Serialize_repr};

use std::fmt;

/// The error codes
#[derive(
    Debug,
    PartialEq,
    Eq,
    Clone,
    Copy,
    IntoPrimitive,
    TryFromPrimitive,
    Serialize_repr,
    Deserialize_repr,
)]
#[repr(u32)]
pub enum Code {
    Success = 0,
    InvArgs,
    OutOfMem,
    Exists,
    NotFound,
    Busy,
    Timeout,
    Interrupted,
    NotSup,
    InvState,
    ThreadFail,
    Unspecified,
}

impl Default for Code {
    fn default() -> Self {
        Self::Success
    }
}

impl Code {
    /// Returns the negative errno value that corresponds to this code (0 for `Success`)
    pub fn errno(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::InvArgs | Self::InvState => -22, // EINVAL
            Self::OutOfMem => -12,                 // ENOMEM
            Self::Exists => -17,                   // EEXIST
            Self::NotFound => -2,                  // ENOENT
            Self::Busy => -16,                     // EBUSY
            Self::Timeout => -110,                 // ETIMEDOUT
            Self::Interrupted => -4,               // EINTR
            Self::NotSup => -95,                   // EOPNOTSUPP
            Self::ThreadFail => -11,               // EAGAIN
            Self::Unspecified => -5,               // EIO
        }
    }
}

// we only capture backtraces in debug mode, because errors are sometimes used for non-exceptional
// situations (e.g., timeouts) and the backtraces are typically only useful during development.

cfg_if! {
    if #[cfg(debug_assertions)] {
        use std::backtrace::Backtrace;
        use std::sync::Arc;

        /// The error struct that is passed around
        #[derive(Clone)]
        pub struct Error {
            code: Code,
            bt: Arc<Backtrace>,
        }

        impl Error {
            /// Creates a new object for given error code
            ///
            /// Note that this captures the backtrace if enabled via `RUST_BACKTRACE`
            #[inline(never)]
            pub fn new(code: Code) -> Self {
                Error {
                    code,
                    bt: Arc::new(Backtrace::capture()),
                }
            }

            /// Returns the error code
            pub fn code(&self) -> Code {
                self.code
            }

            /// Returns the backtrace to the location where the error occurred
            pub fn backtrace(&self) -> &Backtrace {
                &self.bt
            }

            fn debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:?}", self.code())?;
                if let std::backtrace::BacktraceStatus::Captured = self.bt.status() {
                    write!(f, " at:\n{}", self.bt)?;
                }
                Ok(())
            }
        }
    }
    else {
        /// The error struct that is passed around
        #[derive(Clone)]
        pub struct Error {
            code: Code,
        }

        impl Error {
            /// Creates a new object for given error code
            pub fn new(code: Code) -> Self {
                Error { code }
            }

            /// Returns the error code
            pub fn code(&self) -> Code {
                self.code
            }

            fn debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:?}", self.code())
            }
        }
    }
}

impl From<Error> for Code {
    fn from(err: Error) -> Self {
        err.code()
    }
}

impl From<Code> for Error {
    fn from(code: Code) -> Self {
        Self::new(code)
    }
}

impl From<Code> for Result<(), Error> {
    fn from(code: Code) -> Self {
        match code {
            Code::Success => Ok(()),
            e => Err(Error::new(e)),
        }
    }
}

impl<T> From<Result<T, Error>> for Code {
    fn from(res: Result<T, Error>) -> Self {
        match res {
            Ok(_) => Code::Success,
            Err(e) => e.code(),
        }
    }
}

impl From<u32> for Error {
    fn from(error: u32) -> Self {
        Self::new(Code::try_from(error).unwrap_or(Code::Unspecified))
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        self.code() == other.code()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug(f)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.code())
    }
}

impl std::error::Error for Error {
}

/// A verbose error type that contains an error message
#[derive(Clone)]
pub struct VerboseError {
    code: Code,
    msg: String,
}

impl VerboseError {
    /// Creates a new error with given error code and error message
    pub fn new(code: Code, msg: String) -> Self {
        Self { code, msg }
    }

    /// Returns the error code
    pub fn code(&self) -> Code {
        self.code
    }

    /// Returns the error message
    pub fn msg(&self) -> &String {
        &self.msg
    }

    fn debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.msg, self.code)
    }
}

impl From<Error> for VerboseError {
    fn from(e: Error) -> Self {
        Self::new(e.code(), String::default())
    }
}

impl fmt::Debug for VerboseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug(f)
    }
}

impl fmt::Display for VerboseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug(f)
    }
}

impl std::error::Error for VerboseError {
}
