// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Benchmark egglog against Soufflé on the cclyzer++ pointer analysis and
//! report the results in a table and a bar chart.

use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser};
use glob::Pattern;
use itertools::Itertools;
use pta_bench::{
    engine::{Engine, COMPARISONS},
    error::Result,
    facts::{self, count_relation_files},
    plot, report,
    results::{load_records, ResultsCache, TrialRecord},
    run::{RunConfig, Runner},
    suite::{self, Benchmark},
    summary::{speedups, summarize},
    timer::timer_bin,
    toolchain::{self, check_tool, Layout, Tool},
};
use tabled::settings::Style;

const CHART_TITLE: &str = "Pointer analysis run time";

#[derive(Args, Debug, Clone, PartialEq, Eq)]
struct Selection {
    /// Glob pattern over set/file names of the benchmarks to use
    #[arg(short = 'F', long = "filter", default_value = "*")]
    name_glob: String,
}

impl Selection {
    fn benchmarks(&self) -> Result<Vec<Benchmark>> {
        let benches = suite::select(&self.name_glob)?;
        if benches.is_empty() {
            log::warn!("no benchmarks match {}", self.name_glob);
        }
        Ok(benches)
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
struct Output {
    /// Results cache to add trials to, or load them from
    #[arg(long, default_value = "results.csv")]
    results: PathBuf,
    /// SVG file to draw the bar chart to
    #[arg(long, default_value = "results.svg")]
    plot: PathBuf,
    /// Skip drawing the bar chart
    #[arg(long)]
    no_plot: bool,
    /// Print the aggregated results as JSON rather than a table
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
struct RunParams {
    #[command(flatten)]
    layout: Layout,
    #[command(flatten)]
    selection: Selection,
    #[command(flatten)]
    output: Output,
    /// Build the cclyzer++ fact generator before running
    #[arg(long)]
    build_cclyzerpp: bool,
    /// Build egglog before running
    #[arg(long)]
    build_egglog: bool,
    /// Regenerate the fact directories of the selected benchmarks
    #[arg(long)]
    gen_facts: bool,
    /// Time limit for each engine run
    #[arg(long, default_value = "600s")]
    time_limit: humantime::Duration,
    /// Repeat each engine run this number of times
    #[arg(short = 'R', long, default_value = "1")]
    repeat: usize,
    /// Engines to run
    #[arg(long, value_delimiter = ',', default_values_t = Engine::ALL)]
    engines: Vec<Engine>,
    /// Number of threads Soufflé may use
    #[arg(long, default_value = "1")]
    souffle_jobs: usize,
    /// Re-run the selected trials even if they are cached, replacing their
    /// records; other cached trials are kept
    #[arg(long)]
    fresh: bool,
    /// Record engine failures and continue with the next benchmark
    #[arg(long)]
    keep_going: bool,
    /// Save the command line, stdout, and stderr of every engine run
    #[arg(long)]
    keep_logs: bool,
}

#[derive(clap::Subcommand, Clone, Debug, PartialEq, Eq)]
enum Command {
    /// Optionally build the tools and generate facts, run every engine on the
    /// selected benchmarks, then report the results.
    ///
    /// Trials already in the results cache are not run again, so an
    /// interrupted session can be resumed by running the same command.
    Run(RunParams),
    /// Report cached results in a table and a bar chart without running
    /// anything.
    ///
    /// The table has one row per benchmark and one column per engine, giving
    /// the run time in seconds as _median_ ± _deviation_ over the successful
    /// trials, where the deviation is the maximal distance from the median to
    /// any trial. Below the table, each speedup is the harmonic mean over the
    /// benchmarks completed by both engines of `baseline time / candidate
    /// time`.
    Report {
        #[command(flatten)]
        selection: Selection,
        #[command(flatten)]
        output: Output,
    },
    /// List the selected benchmarks and which of their inputs are present.
    List {
        #[command(flatten)]
        layout: Layout,
        #[command(flatten)]
        selection: Selection,
    },
}

#[derive(clap::Parser, Debug)]
struct App {
    /// Command to run
    #[command(subcommand)]
    command: Command,
}

fn report_results(records: &[TrialRecord], output: &Output) -> Result<()> {
    let rows = summarize(records);
    let speedups = speedups(&rows, &COMPARISONS);
    if output.json {
        println!("{}", report::to_json(&rows, &speedups)?);
    } else {
        report::print_report(&rows, &speedups);
    }
    if output.no_plot {
        return Ok(());
    }
    if rows.is_empty() {
        log::warn!("no results to plot");
        return Ok(());
    }
    plot::draw_chart(&rows, &output.plot, CHART_TITLE)
}

fn run(params: &RunParams) -> Result<()> {
    let layout = &params.layout;
    let benches = params.selection.benchmarks()?;

    if params.build_cclyzerpp {
        toolchain::build_cclyzerpp(layout)?;
    }
    if params.build_egglog {
        toolchain::build_egglog(layout)?;
    }
    if params.gen_facts {
        check_tool(layout, Tool::Factgen)?;
        for bench in &benches {
            facts::generate(layout, bench)?;
        }
    }
    if params
        .engines
        .iter()
        .any(|e| matches!(e, Engine::Egglog | Engine::EgglogNaive))
    {
        check_tool(layout, Tool::Egglog)?;
    }

    // make sure `bench-timer` is available
    let timer = match timer_bin() {
        Ok(path) => path,
        Err(_) => {
            toolchain::compile_timer_bin()?;
            timer_bin()?
        }
    };
    let config = RunConfig {
        engines: params.engines.iter().copied().unique().collect(),
        time_limit: params.time_limit.into(),
        repeat: params.repeat,
        souffle_jobs: params.souffle_jobs,
        fresh: params.fresh,
        keep_going: params.keep_going,
        keep_logs: params.keep_logs,
        timer_bin: Some(timer),
    };
    let mut cache = ResultsCache::open(&params.output.results)?;
    Runner::new(layout, &config, &mut cache).run_all(&benches)?;

    let records = cache
        .records()
        .iter()
        .filter(|r| config.engines.contains(&r.engine) && benches.contains(&r.benchmark()))
        .cloned()
        .collect::<Vec<_>>();
    report_results(&records, &params.output)
}

fn report_cached(selection: &Selection, output: &Output) -> Result<()> {
    let pattern = Pattern::new(&selection.name_glob)?;
    let records = load_records(&output.results)?
        .into_iter()
        .filter(|r| pattern.matches(&r.benchmark().name()))
        .collect::<Vec<_>>();
    report_results(&records, output)
}

fn mark(present: bool) -> String {
    let mark = if present { "✓" } else { "-" };
    mark.to_string()
}

fn list(layout: &Layout, selection: &Selection) -> Result<()> {
    let mut rows = vec![["benchmark", "bitcode", "bc-facts", "benchmark-input"]
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()];
    for bench in selection.benchmarks()? {
        rows.push(vec![
            bench.name(),
            mark(bench.bitcode(layout).is_file()),
            mark(count_relation_files(&bench.bc_facts_dir(layout)) > 0),
            mark(facts::check(layout, &bench).is_ok()),
        ]);
    }
    let mut table = tabled::builder::Builder::from(rows).build();
    table.with(Style::rounded());
    println!("{table}");
    for tool in [Tool::Factgen, Tool::Egglog] {
        let path = tool.path(layout);
        println!("{} {}", mark(path.is_file()), path.display());
    }
    let souffle = layout.souffle_bin();
    if souffle.components().count() > 1 {
        println!("{} {}", mark(souffle.is_file()), souffle.display());
    } else {
        println!("  {} (from PATH)", souffle.display());
    }
    Ok(())
}

impl App {
    fn exec(&self) -> Result<()> {
        match &self.command {
            Command::Run(params) => run(params),
            Command::Report { selection, output } => report_cached(selection, output),
            Command::List { layout, selection } => list(layout, selection),
        }
    }
}

fn main() -> ExitCode {
    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    let app = App::parse();
    match app.exec() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
