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

use base::test::DefaultWvTester;

use std::process;

fn main() {
    if let Err(e) = base::io::init("nvstests") {
        eprintln!("{}", e);
        process::exit(1);
    }

    let mut tester = DefaultWvTester::default();
    nvsunittests::run(&mut tester);
    println!("{}", tester);

    if tester.failures() > 0 {
        process::exit(1);
    }
}
