// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Run an engine under a time limit and gather its wall-clock interval, CPU
//! time, and memory usage.
//!
//! The measurement happens in the separate `bench-timer` binary so that
//! `getrusage(RUSAGE_CHILDREN)` only sees the one engine process tree.
//! [`Timer`] doubles as the argument parser of that binary and as a builder
//! for running it from library code.

use std::{
    env,
    ffi::{OsStr, OsString},
    fmt::Display,
    fs::File,
    io,
    os::fd::{AsRawFd, IntoRawFd},
    path::{Path, PathBuf},
    process::{Command, ExitCode, Stdio},
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant, SystemTime},
};

use fork::Fork;
use nix::{
    errno::Errno,
    fcntl::{self, OFlag},
    sys::{
        resource::{getrusage, Usage, UsageWho},
        signal::{killpg, Signal},
        stat::Mode,
        time::TimeVal,
        wait::{waitpid, WaitStatus},
    },
    unistd::{dup2, getpgid, setsid, Pid},
};
use process_sync::{SharedCondvar, SharedMutex};

use crate::{
    error::{BenchError, Result},
    measurement::RunMeasurement,
};

/// Name of the helper binary.
pub const TIMER_BIN: &str = "bench-timer";

/// Exit code used when the time limit expires, matching `timeout(1)`.
pub const TIMEOUT_EXIT_CODE: u8 = 124;

/// Runs a program, optionally kills it after a time limit, and reports
/// resource usage statistics.
#[derive(clap::Parser, Debug, Clone)]
#[command(name = "bench-timer")]
pub struct Timer {
    /// Kill process after this much time
    #[arg(long, short)]
    pub time_limit: Option<humantime::Duration>,
    /// Output in JSON rather than a human-readable format
    #[arg(long)]
    pub json: bool,
    /// File to redirect the program's stdout to (discarded otherwise)
    #[arg(long)]
    pub stdout: Option<PathBuf>,
    /// File to redirect the program's stderr to (inherited otherwise)
    #[arg(long)]
    pub stderr: Option<PathBuf>,
    /// Program to run
    pub prog: OsString,
    /// Arguments to pass
    pub args: Vec<OsString>,
    /// Explicit path to the `bench-timer` binary (library use only)
    #[arg(skip)]
    pub helper: Option<PathBuf>,
}

/// Get the root of this workspace.
///
/// Only meaningful when running a binary compiled from a checkout.
pub fn repo_root() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")))
}

/// Locate a compiled `bench-timer`: next to the running executable first (the
/// usual case for an installed or `cargo run` binary), then in the workspace
/// target directory.
pub fn timer_bin() -> Result<PathBuf> {
    if let Ok(exe) = env::current_exe() {
        let sibling = exe.with_file_name(TIMER_BIN);
        if sibling.exists() {
            return Ok(sibling);
        }
    }
    let target = repo_root().join("target");
    ["release", "debug"]
        .iter()
        .map(|profile| target.join(profile).join(TIMER_BIN))
        .find(|path| path.exists())
        .ok_or(BenchError::TimerMissing)
}

/// Render a command line for logs and `*.command` files, quoting arguments
/// that would not survive a shell.
pub fn shell_words<I, S>(prog: &OsStr, args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmdline: Vec<String> = vec![prog.to_string_lossy().to_string()];
    for arg in args {
        let arg = arg.as_ref().to_string_lossy();
        if arg.is_empty() || arg.contains([' ', '"', '\'', '$']) {
            cmdline.push(format!("\"{}\"", arg.replace('"', "\\\"")));
        } else {
            cmdline.push(arg.to_string())
        }
    }
    cmdline.join(" ")
}

fn sync_err<E: Display>(err: E) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

#[derive(Debug, Clone)]
struct RawRunMeasurement {
    started_at: SystemTime,
    real_time: Duration,
    usage: Usage,
    timed_out: bool,
    status: Option<i32>,
}

fn time_val_to_duration(time: TimeVal) -> Duration {
    Duration::from_secs(time.tv_sec() as u64) + Duration::from_micros(time.tv_usec() as u64)
}

impl RawRunMeasurement {
    fn max_rss_bytes(&self) -> i64 {
        if cfg!(target_os = "macos") {
            // macOS reports maxrss in bytes
            self.usage.max_rss()
        } else {
            // on Linux maxrss is in KB
            self.usage.max_rss() * 1024
        }
    }

    fn into_measurement(self) -> RunMeasurement {
        RunMeasurement {
            started_at: self.started_at,
            finished_at: self.started_at + self.real_time,
            real_time: self.real_time,
            user_time: time_val_to_duration(self.usage.user_time()),
            sys_time: time_val_to_duration(self.usage.system_time()),
            max_mem_bytes: self.max_rss_bytes().max(0) as usize,
            timed_out: self.timed_out,
            exit_code: self.status,
        }
    }
}

impl Timer {
    fn watch_child(&self, child: i32, started_at: SystemTime) -> io::Result<RawRunMeasurement> {
        let child = Pid::from_raw(child);
        let start = Instant::now();
        let timeout = Arc::new(Mutex::new(false));
        if let Some(limit) = &self.time_limit {
            let limit: Duration = (*limit).into();
            let pgid = getpgid(Some(child))?;
            let timeout = timeout.clone();
            thread::spawn(move || {
                thread::sleep(limit);
                // hold the flag until we know whether the child was still
                // around to be killed
                let Ok(mut timeout) = timeout.lock() else {
                    return;
                };
                if let Err(err) = killpg(pgid, Signal::SIGTERM) {
                    // the group is gone: the child exited on its own
                    if err == Errno::EPERM || err == Errno::ESRCH {
                        return;
                    }
                    eprintln!("could not send SIGTERM: {err}");
                }
                *timeout = true;
                drop(timeout);
                thread::sleep(Duration::from_secs(1));
                _ = killpg(pgid, Signal::SIGKILL);
            });
        }

        let status = match waitpid(Some(child), None)? {
            WaitStatus::Exited(_, status) => Some(status),
            _ => None,
        };
        let real_time = start.elapsed();
        let timed_out = timeout.lock().map(|flag| *flag).unwrap_or(true);
        let usage = getrusage(UsageWho::RUSAGE_CHILDREN)?;
        Ok(RawRunMeasurement {
            started_at,
            real_time,
            usage,
            timed_out,
            status,
        })
    }

    fn redirect_child_output(&self) -> io::Result<()> {
        match &self.stdout {
            Some(path) => {
                let stdout = File::create(path)?.into_raw_fd();
                dup2(stdout, io::stdout().as_raw_fd())?;
            }
            None => {
                let null = fcntl::open("/dev/null", OFlag::O_WRONLY, Mode::empty())?;
                dup2(null, io::stdout().as_raw_fd())?;
            }
        }
        if let Some(path) = &self.stderr {
            let stderr = File::create(path)?.into_raw_fd();
            dup2(stderr, io::stderr().as_raw_fd())?;
        }
        Ok(())
    }

    /// Run the program with the arguments in `self`. This uses `fork` and
    /// `exec` directly and is thus only intended for running from the
    /// `bench-timer` binary, not from user code.
    pub fn exec(&self) -> io::Result<ExitCode> {
        let mut lock = SharedMutex::new().map_err(sync_err)?;
        let mut cvar = SharedCondvar::new().map_err(sync_err)?;
        // taken before forking so the child cannot signal before we wait
        lock.lock().map_err(sync_err)?;
        match fork::fork() {
            Ok(Fork::Parent(child)) => {
                cvar.wait(&mut lock).map_err(sync_err)?;
                lock.unlock().map_err(sync_err)?;
                let started_at = SystemTime::now();
                let raw = self.watch_child(child, started_at)?;
                let timed_out = raw.timed_out;
                let status = raw.status;
                let measurement = raw.into_measurement();
                if self.json {
                    println!("{}", measurement.to_json().map_err(sync_err)?);
                } else {
                    measurement.print();
                }
                // timed_out is set if and only if the watchdog fired, even
                // if the child exited in the meantime
                if timed_out {
                    return Ok(ExitCode::from(TIMEOUT_EXIT_CODE));
                }
                if let Some(code) = status {
                    return Ok(ExitCode::from(code as u8));
                }
                Ok(ExitCode::FAILURE)
            }
            Ok(Fork::Child) => {
                _ = setsid();
                lock.lock().map_err(sync_err)?;
                cvar.notify_one().map_err(sync_err)?;
                lock.unlock().map_err(sync_err)?;
                self.redirect_child_output()?;
                let mut command = exec::Command::new(&self.prog);
                command.args(&self.args);
                let err = command.exec();
                eprintln!("exec {} failed: {err}", self.prog.to_string_lossy());
                // mimic `timeout(1)`
                Ok(ExitCode::from(126))
            }
            Err(err) => {
                eprintln!("fork failed: {err}");
                // mimic `timeout(1)`
                Ok(ExitCode::from(125))
            }
        }
    }

    /// Create a new timing config for library use.
    pub fn new<S: AsRef<OsStr>>(prog: S) -> Self {
        Self {
            time_limit: None,
            json: true,
            stdout: None,
            stderr: None,
            prog: prog.as_ref().to_owned(),
            args: vec![],
            helper: None,
        }
    }

    /// Set the time limit of `self`.
    pub fn timeout(&mut self, limit: Duration) -> &mut Self {
        self.time_limit = Some(limit.into());
        self
    }

    /// Capture the program's stdout in `path`.
    pub fn stdout<P: AsRef<Path>>(&mut self, path: P) -> &mut Self {
        self.stdout = Some(path.as_ref().to_owned());
        self
    }

    /// Capture the program's stderr in `path`.
    pub fn stderr<P: AsRef<Path>>(&mut self, path: P) -> &mut Self {
        self.stderr = Some(path.as_ref().to_owned());
        self
    }

    /// Use the `bench-timer` binary at `path` rather than searching for one.
    pub fn helper<P: AsRef<Path>>(&mut self, path: P) -> &mut Self {
        self.helper = Some(path.as_ref().to_owned());
        self
    }

    /// Append an argument to `self`.
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Append multiple arguments to `self`.
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|s| s.as_ref().to_owned()));
        self
    }

    /// Get the command line to be run for debugging purposes (for example, to
    /// run manually).
    pub fn cmdline(&self) -> String {
        shell_words(&self.prog, &self.args)
    }

    /// Run a compiled `bench-timer` binary using the arguments in `self`.
    ///
    /// This must use the binary rather than running `exec()` directly in order
    /// to isolate resource usage measurement.
    pub fn run(&self) -> Result<RunMeasurement> {
        let helper = match &self.helper {
            Some(helper) => helper.clone(),
            None => timer_bin()?,
        };
        let mut cmd = Command::new(&helper);
        if let Some(limit) = &self.time_limit {
            cmd.arg("--time-limit");
            cmd.arg(format!("{}ms", limit.as_millis()));
        }
        cmd.arg("--json");
        if let Some(stdout) = &self.stdout {
            cmd.arg("--stdout").arg(stdout);
        }
        if let Some(stderr) = &self.stderr {
            cmd.arg("--stderr").arg(stderr);
        }
        cmd.arg("--");
        cmd.arg(&self.prog);
        cmd.args(&self.args);
        cmd.stdin(Stdio::null()).stderr(Stdio::inherit());
        let output = cmd.output().map_err(|source| BenchError::Spawn {
            program: helper.display().to_string(),
            source,
        })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        RunMeasurement::from_json(stdout.trim())
            .map_err(|err| BenchError::TimerOutput(format!("{err} in {:?}", stdout.trim())))
    }
}
