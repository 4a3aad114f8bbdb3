// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Where the external tools live and how to build them.

use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread,
};

use crate::{
    error::{BenchError, Result},
    timer::{repo_root, shell_words, TIMER_BIN},
};

const DEFAULT_ROOT: &str = ".";
const DEFAULT_CCLYZERPP_DIR: &str = "cclyzerpp";
const DEFAULT_EGGLOG_DIR: &str = "egg-smol";
const DEFAULT_SOUFFLE: &str = "souffle";
const DEFAULT_SETUP_PROGRAM: &str = "datalog/benchmark_setup.project";
const DEFAULT_SOUFFLE_PROGRAM: &str = "mini-cclyzerpp/main.dl";
const DEFAULT_EGGLOG_PROGRAM: &str = "mini-cclyzerpp/main.egg";
const DEFAULT_BITCODE_DIR: &str = "benchmarks";
const DEFAULT_WORK_DIR: &str = "bench-data";

/// On-disk layout of the tool checkouts, analysis programs, and inputs.
///
/// Relative paths are interpreted relative to `root`.
#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Directory holding the tool checkouts and benchmark inputs
    #[arg(long, default_value = DEFAULT_ROOT)]
    pub root: PathBuf,
    /// cclyzer++ checkout (factgen-exe is built in its build/ directory)
    #[arg(long, default_value = DEFAULT_CCLYZERPP_DIR)]
    pub cclyzerpp_dir: PathBuf,
    /// egglog checkout (egg-smol is built in its target/release/ directory)
    #[arg(long, default_value = DEFAULT_EGGLOG_DIR)]
    pub egglog_dir: PathBuf,
    /// Soufflé executable; a bare name is looked up on PATH
    #[arg(long, default_value = DEFAULT_SOUFFLE)]
    pub souffle: PathBuf,
    /// Datalog program turning bitcode facts into benchmark input
    #[arg(long, default_value = DEFAULT_SETUP_PROGRAM)]
    pub setup_program: PathBuf,
    /// Datalog pointer analysis run by Soufflé
    #[arg(long, default_value = DEFAULT_SOUFFLE_PROGRAM)]
    pub souffle_program: PathBuf,
    /// egglog pointer analysis
    #[arg(long, default_value = DEFAULT_EGGLOG_PROGRAM)]
    pub egglog_program: PathBuf,
    /// Directory of <set>/<file>.bc inputs
    #[arg(long, default_value = DEFAULT_BITCODE_DIR)]
    pub bitcode_dir: PathBuf,
    /// Directory for generated facts, engine outputs, and logs
    #[arg(long, default_value = DEFAULT_WORK_DIR)]
    pub work_dir: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.into(),
            cclyzerpp_dir: DEFAULT_CCLYZERPP_DIR.into(),
            egglog_dir: DEFAULT_EGGLOG_DIR.into(),
            souffle: DEFAULT_SOUFFLE.into(),
            setup_program: DEFAULT_SETUP_PROGRAM.into(),
            souffle_program: DEFAULT_SOUFFLE_PROGRAM.into(),
            egglog_program: DEFAULT_EGGLOG_PROGRAM.into(),
            bitcode_dir: DEFAULT_BITCODE_DIR.into(),
            work_dir: DEFAULT_WORK_DIR.into(),
        }
    }
}

impl Layout {
    /// Resolve `path` against the root (absolute paths are kept as is).
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.root.join(path)
    }

    /// cclyzer++ source checkout.
    pub fn cclyzerpp_src(&self) -> PathBuf {
        self.resolve(&self.cclyzerpp_dir)
    }

    /// The compiled cclyzer++ fact generator.
    pub fn factgen_bin(&self) -> PathBuf {
        self.cclyzerpp_src().join("build/factgen-exe")
    }

    /// egglog source checkout.
    pub fn egglog_src(&self) -> PathBuf {
        self.resolve(&self.egglog_dir)
    }

    /// The compiled egglog binary.
    pub fn egglog_bin(&self) -> PathBuf {
        self.egglog_src().join("target/release/egg-smol")
    }

    /// The Soufflé executable. A bare command name is left for `PATH` lookup.
    pub fn souffle_bin(&self) -> PathBuf {
        if self.souffle.components().count() > 1 {
            self.resolve(&self.souffle)
        } else {
            self.souffle.clone()
        }
    }

    /// Directory of benchmark bitcode.
    pub fn bitcode_root(&self) -> PathBuf {
        self.resolve(&self.bitcode_dir)
    }

    /// Directory for everything the harness generates.
    pub fn work_root(&self) -> PathBuf {
        self.resolve(&self.work_dir)
    }
}

/// Run a build or generation step to completion, failing if it exits with a
/// non-zero status.
pub fn run_step(step: &str, cmd: &mut Command) -> Result<()> {
    let cmdline = shell_words(cmd.get_program(), cmd.get_args());
    match cmd.get_current_dir() {
        Some(dir) => log::info!("{step}: {cmdline} (in {})", dir.display()),
        None => log::info!("{step}: {cmdline}"),
    }
    let status = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|source| BenchError::Spawn {
            program: cmd.get_program().to_string_lossy().to_string(),
            source,
        })?;
    if !status.success() {
        return Err(BenchError::StepFailed {
            step: step.to_string(),
            status,
        });
    }
    Ok(())
}

/// Step name for every command that builds cclyzer++.
const BUILD_CCLYZERPP: &str = "build cclyzer++";

/// The cmake configure and build commands for `factgen-exe`.
fn cclyzerpp_commands(layout: &Layout) -> [Command; 2] {
    let src = layout.cclyzerpp_src();
    let mut configure = Command::new("cmake");
    configure
        .args(["-G", "Ninja", "-B", "build", "-S", "."])
        .current_dir(&src);
    let jobs = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let mut build = Command::new("cmake");
    build
        .args(["--build", "build", "-j"])
        .arg(jobs.to_string())
        .args(["--target", "factgen-exe"])
        .current_dir(&src);
    [configure, build]
}

/// Configure and build the cclyzer++ fact generator.
pub fn build_cclyzerpp(layout: &Layout) -> Result<()> {
    log::info!("building cclyzer++");
    for mut cmd in cclyzerpp_commands(layout) {
        run_step(BUILD_CCLYZERPP, &mut cmd)?;
    }
    Ok(())
}

/// Build egglog in release mode.
pub fn build_egglog(layout: &Layout) -> Result<()> {
    log::info!("building egglog");
    run_step(
        "build egglog",
        Command::new("cargo")
            .args(["build", "--release"])
            .current_dir(layout.egglog_src()),
    )
}

/// Build the `bench-timer` binary, which is an implicit dependency of every
/// engine run.
pub fn compile_timer_bin() -> Result<()> {
    run_step(
        "build bench-timer",
        Command::new("cargo")
            .args(["build", "--quiet", "--release", "--bin", TIMER_BIN])
            .current_dir(repo_root()),
    )
}

/// An external tool that must be built before it can be run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    /// cclyzer++ `factgen-exe`
    Factgen,
    /// `egg-smol`
    Egglog,
}

impl Tool {
    /// Where the tool is expected after building.
    pub fn path(&self, layout: &Layout) -> PathBuf {
        match self {
            Tool::Factgen => layout.factgen_bin(),
            Tool::Egglog => layout.egglog_bin(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Tool::Factgen => "factgen-exe",
            Tool::Egglog => "egglog",
        }
    }

    fn build_flag(&self) -> &'static str {
        match self {
            Tool::Factgen => "--build-cclyzerpp",
            Tool::Egglog => "--build-egglog",
        }
    }
}

/// Make sure `tool` has been built.
pub fn check_tool(layout: &Layout, tool: Tool) -> Result<()> {
    let path = tool.path(layout);
    if path.is_file() {
        Ok(())
    } else {
        Err(BenchError::ToolMissing {
            tool: tool.name(),
            path,
            hint: tool.build_flag(),
        })
    }
}
