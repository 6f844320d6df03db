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

use base::errors::{Code, Error, VerboseError};
use base::test::WvTester;
use base::{wv_assert, wv_assert_eq, wv_assert_err, wv_run_test};

pub fn run(t: &mut dyn WvTester) {
    wv_run_test!(t, raw_codes);
    wv_run_test!(t, results);
    wv_run_test!(t, errnos);
}

fn raw_codes(t: &mut dyn WvTester) {
    wv_assert_eq!(t, u32::from(Code::Exists), 3);
    wv_assert_eq!(t, Code::try_from(4u32).ok(), Some(Code::NotFound));
    wv_assert!(t, Code::try_from(1000u32).is_err());

    // unknown raw values turn into an unspecified error
    wv_assert_eq!(t, Error::from(u32::from(Code::Busy)).code(), Code::Busy);
    wv_assert_eq!(t, Error::from(1000u32).code(), Code::Unspecified);
    wv_assert_eq!(t, Error::from(u32::MAX).code(), Code::Unspecified);
}

fn results(t: &mut dyn WvTester) {
    wv_assert!(t, Result::<(), Error>::from(Code::Success).is_ok());
    wv_assert_err!(t, Result::<(), Error>::from(Code::Timeout), Code::Timeout);

    wv_assert_eq!(t, Code::from(Ok::<u32, Error>(5)), Code::Success);
    wv_assert_eq!(t, Code::from(Err::<u32, Error>(Error::new(Code::InvState))), Code::InvState);

    let verbose = VerboseError::from(Error::new(Code::OutOfMem));
    wv_assert_eq!(t, verbose.code(), Code::OutOfMem);
}

fn errnos(t: &mut dyn WvTester) {
    wv_assert_eq!(t, Code::Success.errno(), 0);
    wv_assert_eq!(t, Code::InvArgs.errno(), -22);
    wv_assert_eq!(t, Code::OutOfMem.errno(), -12);
    wv_assert_eq!(t, Code::Exists.errno(), -17);
    wv_assert_eq!(t, Code::Busy.errno(), -16);
    wv_assert_eq!(t, Code::Timeout.errno(), -110);
}
