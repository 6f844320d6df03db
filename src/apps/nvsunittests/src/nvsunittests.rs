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

mod tdomains;
mod terrors;
mod tfence;
mod trangemap;
mod trbtree;
mod trefcount;
mod trunlist;
mod tsched;
mod tsyncpt;
mod tworker;

use base::test::WvTester;
use base::wv_run_suite;

/// Runs all test suites
pub fn run(t: &mut dyn WvTester) {
    wv_run_suite!(t, terrors::run);
    wv_run_suite!(t, trbtree::run);
    wv_run_suite!(t, trangemap::run);
    wv_run_suite!(t, trefcount::run);
    wv_run_suite!(t, tworker::run);
    wv_run_suite!(t, tsyncpt::run);
    wv_run_suite!(t, tfence::run);
    wv_run_suite!(t, trunlist::run);
    wv_run_suite!(t, tdomains::run);
    wv_run_suite!(t, tsched::run);
}
