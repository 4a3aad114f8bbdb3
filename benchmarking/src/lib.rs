// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Tools for benchmarking egglog against Soufflé on the cclyzer++ pointer
//! analysis.

#![deny(missing_docs)]
// configure clippy
#![deny(clippy::uninlined_format_args)]
#![allow(clippy::comparison_to_empty)]
// documentation-related lints (only checked when running rustdoc)
#![allow(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod engine;
pub mod error;
pub mod facts;
pub mod measurement;
pub mod plot;
pub mod report;
pub mod results;
pub mod run;
pub mod stats;
pub mod suite;
pub mod summary;
pub mod timer;
pub mod toolchain;
