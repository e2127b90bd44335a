use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;

use ikamon::cli::{Cli, ResolvedCli};
use ikamon::enrichment::geo::{DEFAULT_CAPACITY, GeoResolver};
use ikamon::error::IkamonError;
use ikamon::model::{ConnectionStatus, DashboardView};
use ikamon::output::{self, Countries};
use ikamon::poller::Poller;
use ikamon::source::{self, DEFAULT_TIMEOUT, HttpSource, IpApiGeo, NameProvider, SnapshotProvider};
use ikamon::state::Dashboard;
use ikamon::tui;

/// Global shutdown flag, set by signal handlers.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

const GEO_WORKERS: usize = 2;

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

fn install_signal_handlers() {
    unsafe {
        libc::signal(
            libc::SIGTERM,
            signal_handler as *const () as libc::sighandler_t,
        );
        libc::signal(
            libc::SIGINT,
            signal_handler as *const () as libc::sighandler_t,
        );
    }
}

fn exit_code(err: &IkamonError) -> i32 {
    match err {
        IkamonError::InvalidTarget { .. } => 2,
        IkamonError::Http(_) | IkamonError::Decode(_) | IkamonError::Unreachable(_) => 3,
        IkamonError::Tui(_) | IkamonError::Fatal(_) => 4,
        _ => 4,
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse().resolve();
    let is_tui = cli.is_monitor();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| run(cli)));

    // Snapshot mode never enters the alternate screen.
    if is_tui {
        let _ = crossterm::terminal::disable_raw_mode();
        let _ = crossterm::execute!(io::stdout(), crossterm::terminal::LeaveAlternateScreen);
    }

    match result {
        Ok(Ok(())) => std::process::exit(0),
        Ok(Err(e)) => {
            eprintln!("error: {e}");
            std::process::exit(exit_code(&e));
        }
        Err(_) => {
            eprintln!("error: fatal: unexpected panic");
            std::process::exit(4);
        }
    }
}

fn run(mut cli: ResolvedCli) -> Result<(), IkamonError> {
    install_signal_handlers();

    cli.target = source::validate_target(&cli.target)?;
    let interval = Duration::from_secs_f64(cli.interval);
    log::info!("target {}, interval {:?}", cli.target, interval);

    let geo = if cli.no_geo {
        None
    } else {
        let provider = Arc::new(IpApiGeo::new(DEFAULT_TIMEOUT)?);
        Some(GeoResolver::new(provider, GEO_WORKERS, DEFAULT_CAPACITY)?)
    };

    if cli.is_monitor() {
        run_monitor(&cli, interval, geo)
    } else {
        run_snapshot(&cli, interval, geo)
    }
}

fn run_monitor(
    cli: &ResolvedCli,
    interval: Duration,
    geo: Option<GeoResolver>,
) -> Result<(), IkamonError> {
    let http = Arc::new(HttpSource::new(DEFAULT_TIMEOUT)?);
    let mut poller = Poller::spawn(&cli.target, interval, http.clone(), http)?;

    let result = tui::run_tui(
        &poller,
        geo,
        interval,
        cli.mode,
        cli.no_color,
        &SHUTDOWN_REQUESTED,
    );

    SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
    poller.shutdown();
    result
}

/// Poll `ticks` times on the calling thread, then print one report.
fn run_snapshot(
    cli: &ResolvedCli,
    interval: Duration,
    geo: Option<GeoResolver>,
) -> Result<(), IkamonError> {
    let http = HttpSource::new(DEFAULT_TIMEOUT)?;
    let view = poll_sequentially(&http, &cli.target, cli.ticks, interval);

    if view.status != ConnectionStatus::Active {
        return Err(IkamonError::Unreachable(format!(
            "cannot connect to IkaGo ({})",
            cli.target
        )));
    }

    let countries = match geo {
        Some(mut geo) => resolve_countries(&mut geo, &view),
        None => Countries::new(),
    };

    let mut stdout = io::stdout().lock();
    output::write_report(&view, &countries, cli.mode, cli.format, &mut stdout)
}

fn poll_sequentially(
    http: &HttpSource,
    target: &str,
    ticks: u32,
    interval: Duration,
) -> Arc<DashboardView> {
    let mut dashboard = Dashboard::new(target);
    let mut view = dashboard.view();
    for i in 0..ticks.max(1) {
        if SHUTDOWN_REQUESTED.load(Ordering::Relaxed) {
            break;
        }
        let started = Instant::now();
        let names = http.fetch_names(target);
        let snapshot = http.fetch_snapshot(target);
        let (next, notice) = dashboard.tick(snapshot, Some(names));
        if let Some(notice) = notice {
            log::info!("{notice}");
        }
        view = next;

        if i + 1 < ticks {
            thread::sleep(interval.saturating_sub(started.elapsed()));
        }
    }
    view
}

fn resolve_countries(geo: &mut GeoResolver, view: &DashboardView) -> Countries {
    let rows = || view.local.iter().chain(view.remote.iter());
    for row in rows() {
        geo.lookup(&row.representative);
    }
    geo.wait_for_pending(DEFAULT_TIMEOUT);

    rows()
        .filter_map(|row| {
            geo.peek(&row.representative)
                .map(|code| (row.representative.clone(), code.to_string()))
        })
        .collect()
}
