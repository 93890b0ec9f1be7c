// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{Days, NaiveDate};
use clap::{Args as ClapArgs, Parser, Subcommand};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

mod backup;
mod collector;
mod config;
mod live;
mod logging;
mod pbs;
mod report;
mod store;
mod ui;
mod watch;

use collector::Collector;
use config::Config;
use live::LiveProber;
use logging::LogTarget;
use pbs::date::{now_local, parse_day};
use pbs::{PbsCli, SystemRunner};
use report::{QueryEngine, ReportRequest};
use store::{JobFilter, Period, Store};
use ui::{render_watch, WatchRows, WatchView};
use watch::{CancelToken, RefreshLoop};

#[derive(Parser, Debug)]
#[command(name = "pbsmon")]
#[command(about = "PBS Pro job history collector and usage reports")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Job database (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll pbsnodes and qstat once and store the result (run from cron)
    Collect {
        /// Keep the raw JSON output of every poll in this directory
        #[arg(long)]
        backup_dir: Option<PathBuf>,
    },
    /// Report job counts per user and machine
    Stats(StatsArgs),
    /// Show current jobs, refreshed periodically
    Watch(WatchArgs),
}

#[derive(ClapArgs, Debug)]
struct StatsArgs {
    /// Number of days to report, or `all` for the complete history
    #[arg(long, value_parser = parse_days, conflicts_with_all = ["from", "to"])]
    days: Option<Period>,

    /// First day to report (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date_arg)]
    from: Option<NaiveDate>,

    /// Last day to report, inclusive (YYYY-MM-DD, default today)
    #[arg(long, value_parser = parse_date_arg, requires = "from")]
    to: Option<NaiveDate>,

    /// Only jobs of this user
    #[arg(long)]
    user: Option<String>,

    /// Only jobs on this compute node
    #[arg(long)]
    machine: Option<String>,

    /// One row per job instead of per user and machine
    #[arg(long)]
    detail: bool,

    /// Ask qstat for the current jobs instead of reading the database
    #[arg(long)]
    live: bool,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(ClapArgs, Debug)]
struct WatchArgs {
    /// Refresh interval in seconds
    #[arg(short, long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Only jobs of this user
    #[arg(long)]
    user: Option<String>,

    /// Only jobs on this compute node
    #[arg(long)]
    machine: Option<String>,

    /// One row per job instead of per user and machine
    #[arg(long)]
    detail: bool,
}

fn parse_days(value: &str) -> Result<Period, String> {
    if value.eq_ignore_ascii_case("all") {
        return Ok(Period::AllTime);
    }
    value
        .parse::<u32>()
        .map(Period::LastDays)
        .map_err(|_| format!("expected a number of days or `all`, got `{value}`"))
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_day(value).ok_or_else(|| format!("expected YYYY-MM-DD, got `{value}`"))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let target = match &args.command {
        Command::Watch(_) => LogTarget::Discard,
        _ => LogTarget::Stderr,
    };
    logging::init(args.verbose, target);

    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(db) = args.db {
        config.db_path = db;
    }

    match args.command {
        Command::Collect { backup_dir } => {
            if backup_dir.is_some() {
                config.backup_dir = backup_dir;
            }
            run_collect(&config)
        }
        Command::Stats(stats) => run_stats(&config, stats),
        Command::Watch(watch) => run_watch(&config, watch),
    }
}

fn pbs_cli(config: &Config, timeout: Duration) -> Result<PbsCli> {
    let runner = SystemRunner::new(timeout).context("Failed to start command runtime")?;
    Ok(PbsCli::new(Box::new(runner), &config.pbsnodes, &config.qstat))
}

fn open_store(config: &Config) -> Result<Store> {
    Store::open(&config.db_path)
        .with_context(|| format!("Failed to open job database {}", config.db_path.display()))
}

fn run_collect(config: &Config) -> Result<()> {
    let mut store = open_store(config)?;
    let collector = Collector::new(
        pbs_cli(config, config.command_timeout())?,
        config.dedup_window(),
        config.backup_dir.clone(),
    );

    let report = collector.poll(&mut store).context("Poll failed")?;
    tracing::info!(
        db = %store.path().unwrap_or(&config.db_path).display(),
        nodes_total = store.count_nodes()?,
        jobs_total = store.count_jobs()?,
        "database updated"
    );

    if !report.is_complete() {
        let failed = if report.node_error.is_some() { "node" } else { "job" };
        bail!("Poll incomplete: {failed} query failed");
    }
    Ok(())
}

fn stats_period(stats: &StatsArgs) -> Period {
    match (stats.from, &stats.days) {
        (Some(from), _) => {
            let last = stats.to.unwrap_or_else(|| now_local().date());
            Period::Between {
                from,
                to: last.checked_add_days(Days::new(1)).unwrap_or(last),
            }
        }
        (None, Some(period)) => period.clone(),
        (None, None) => Period::default(),
    }
}

fn run_stats(config: &Config, stats: StatsArgs) -> Result<()> {
    let request = ReportRequest {
        filter: JobFilter {
            user: stats.user.clone(),
            machine: stats.machine.clone(),
            period: stats_period(&stats),
        },
        live: stats.live,
    };

    let store = if stats.live { None } else { Some(open_store(config)?) };
    let prober = LiveProber::new(pbs_cli(config, config.live_timeout())?);
    let engine = QueryEngine::new(store, prober);

    let output = if stats.detail {
        let jobs = engine.detail(&request)?;
        if stats.json {
            serde_json::to_string_pretty(&jobs)?
        } else {
            ui::render_detail(&engine.period_description(&request)?, &jobs)
        }
    } else {
        let summary = engine.summarize(&request)?;
        if stats.json {
            serde_json::to_string_pretty(&summary)?
        } else {
            ui::render_summary(&summary)
        }
    };
    println!("{}", output.trim_end());
    Ok(())
}

fn run_watch(config: &Config, watch: WatchArgs) -> Result<()> {
    let request = ReportRequest {
        filter: JobFilter {
            user: watch.user,
            machine: watch.machine,
            period: Period::default(),
        },
        live: true,
    };
    let engine = QueryEngine::new(None, LiveProber::new(pbs_cli(config, config.live_timeout())?));

    let refresh = RefreshLoop::new(Duration::from_secs(watch.interval), CancelToken::new());
    let cancel = refresh.cancel_token();
    if let Err(e) = cancel.cancel_on_ctrlc() {
        tracing::warn!(error = %e, "could not install signal handler");
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut terminal = restore_on_error(enter_screen(), leave_screen)?;

    let result = refresh.run_with(
        || -> Result<()> {
            let rows = if watch.detail {
                WatchRows::Detail(engine.detail(&request)?)
            } else {
                WatchRows::Summary(engine.summarize(&request)?)
            };
            let view = WatchView {
                rows,
                interval: Duration::from_secs(watch.interval),
                updated_at: now_local(),
            };
            terminal.draw(|f| render_watch(f, &view))?;
            Ok(())
        },
        |slice| wait_for_quit(slice, &cancel),
    );

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn enter_screen() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

/// Best-effort terminal restore after a failed setup
fn leave_screen() {
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
    let _ = disable_raw_mode();
}

/// Run `restore` if `result` is an error, then pass `result` on
fn restore_on_error<T>(result: Result<T>, restore: impl FnOnce()) -> Result<T> {
    if result.is_err() {
        restore();
    }
    result
}

/// Wait up to `slice` for input; `q` or Ctrl-C cancels the loop
fn wait_for_quit(slice: Duration, cancel: &CancelToken) -> Result<()> {
    if event::poll(slice)? {
        if let Event::Key(key) = event::read()? {
            let quit = key.kind == KeyEventKind::Press
                && matches!(
                    (key.code, key.modifiers),
                    (KeyCode::Char('q'), _) | (KeyCode::Esc, _) | (KeyCode::Char('c'), KeyModifiers::CONTROL)
                );
            if quit {
                cancel.cancel();
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(argv: &[&str]) -> StatsArgs {
        let mut full = vec!["pbsmon", "stats"];
        full.extend_from_slice(argv);
        match Args::try_parse_from(full).unwrap().command {
            Command::Stats(stats) => stats,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_days_argument() {
        assert_eq!(stats_period(&stats(&[])), Period::LastDays(7));
        assert_eq!(stats_period(&stats(&["--days", "30"])), Period::LastDays(30));
        assert_eq!(stats_period(&stats(&["--days", "all"])), Period::AllTime);
        assert!(Args::try_parse_from(["pbsmon", "stats", "--days", "week"]).is_err());
    }

    #[test]
    fn test_date_range_end_is_inclusive() {
        let period = stats_period(&stats(&["--from", "2024-09-01", "--to", "2024-09-07"]));
        assert_eq!(
            period,
            Period::Between {
                from: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
                to: NaiveDate::from_ymd_opt(2024, 9, 8).unwrap(),
            }
        );
    }

    #[test]
    fn test_conflicting_period_arguments() {
        assert!(Args::try_parse_from(["pbsmon", "stats", "--days", "3", "--from", "2024-09-01"]).is_err());
        assert!(Args::try_parse_from(["pbsmon", "stats", "--to", "2024-09-01"]).is_err());
        assert!(Args::try_parse_from(["pbsmon", "stats", "--from", "09/01/2024"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["pbsmon", "collect", "--db", "/tmp/pbs.db", "-v"]).unwrap();
        assert_eq!(args.db, Some(PathBuf::from("/tmp/pbs.db")));
        assert!(args.verbose);
        assert!(matches!(args.command, Command::Collect { backup_dir: None }));
    }

    #[test]
    fn test_failed_setup_restores_terminal() {
        let mut restored = false;
        let ok: Result<u32> = restore_on_error(Ok(3), || restored = true);
        assert_eq!(ok.unwrap(), 3);
        assert!(!restored);

        let failed: Result<u32> = restore_on_error(Err(anyhow::anyhow!("not a terminal")), || restored = true);
        assert_eq!(failed.unwrap_err().to_string(), "not a terminal");
        assert!(restored);
    }

    #[test]
    fn test_watch_interval_must_be_positive() {
        assert!(Args::try_parse_from(["pbsmon", "watch", "--interval", "0"]).is_err());
        let args = Args::try_parse_from(["pbsmon", "watch", "--detail"]).unwrap();
        let Command::Watch(watch) = args.command else {
            panic!("expected watch");
        };
        assert_eq!(watch.interval, 5);
        assert!(watch.detail);
    }
}
