// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Implementation of the `bench-timer` binary. Everything interesting is in
//! [`pta_bench::timer::Timer`].

use std::{io, process::ExitCode};

use clap::Parser;
use pta_bench::timer::Timer;

fn main() -> Result<ExitCode, io::Error> {
    let timer = Timer::parse();
    timer.exec()
}
