//! rangescan command line entry point.

use chrono::{DateTime, Utc};
use colored::Colorize;
use rangescan::controller::{CancelSignal, RunController, TerminationReason};
use rangescan::input::{Config, Opts, ScanConfig};
use rangescan::log_sink::FileLogSink;
use rangescan::observer::{iso_timestamp, ConsoleObserver, JsonObserver, ScanObserver};
use rangescan::scanner::Scanner;
use rangescan::services::ServiceTable;
use rangescan::tui::BANNER;
use rangescan::{detail, funny_opening, output, warning};

use std::process::ExitCode;

#[cfg(unix)]
const DEFAULT_FILE_DESCRIPTORS_LIMIT: u64 = 8000;

/// Parses the arguments, runs the scan and maps the way it ended to the exit code.
#[allow(clippy::too_many_lines)]
fn main() -> ExitCode {
    env_logger::init();

    let mut opts: Opts = Opts::read();
    match Config::read(opts.config_path.clone()) {
        Ok(config) => opts.merge(&config),
        Err(e) => {
            warning!(
                format!("Ignoring configuration file: {e:#}"),
                opts.greppable,
                opts.accessible
            );
        }
    }
    log::debug!("Main() `opts` arguments are {opts:?}");

    let quiet = opts.greppable || opts.json;

    let config = match ScanConfig::from_opts(&opts) {
        Ok(config) => config,
        Err(e) => {
            warning!(format!("Invalid scan parameters: {e}"), false, opts.accessible);
            return ExitCode::FAILURE;
        }
    };

    let started_at = Utc::now();
    if !quiet && !opts.accessible && !opts.no_banner {
        print_opening(&opts, &config, &started_at);
    }

    #[cfg(unix)]
    warn_on_batch_size(&opts);

    let services = match &opts.services {
        Some(path) => match ServiceTable::load(path) {
            Ok(table) => table,
            Err(e) => {
                warning!(format!("{e:#}"), false, opts.accessible);
                return ExitCode::FAILURE;
            }
        },
        None => ServiceTable::builtin(),
    };
    log::debug!("{} service names loaded", services.len());

    let mut sink = if config.logging() {
        match FileLogSink::create(&opts.log_dir, opts.log_mode, &config, &started_at) {
            Ok(sink) => {
                detail!(
                    format!(
                        "Logging open ports to {} and closed ports to {}",
                        sink.open_path().display(),
                        sink.closed_path().display()
                    ),
                    quiet,
                    opts.accessible
                );
                Some(sink)
            }
            Err(e) => {
                warning!(
                    format!("Could not prepare log files in {}: {e}", opts.log_dir.display()),
                    false,
                    opts.accessible
                );
                return ExitCode::FAILURE;
            }
        }
    } else {
        None
    };

    let observer: Box<dyn ScanObserver> = if opts.json {
        Box::new(JsonObserver::new())
    } else {
        Box::new(ConsoleObserver::new(
            config.ports().len() as u64,
            opts.greppable,
            opts.accessible,
        ))
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            warning!(format!("Could not start the runtime: {e}"), false, opts.accessible);
            return ExitCode::FAILURE;
        }
    };

    let scanner = Scanner::new(config).with_services(services);
    let cancel = CancelSignal::new();
    let (greppable, accessible) = (quiet, opts.accessible);

    let summary = runtime.block_on(async {
        let handler = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warning!(
                    "Gracefully shutting down from SIGINT (Ctrl-C)",
                    greppable,
                    accessible
                );
                handler.cancel();
            }
        });

        let mut controller = RunController::new(&scanner, cancel.clone())
            .observer(&*observer)
            .started_at(started_at);
        if let Some(sink) = sink.as_mut() {
            controller = controller.log_sink(sink);
        }
        controller.run().await
    });

    match summary.termination {
        TerminationReason::Failed(_) => ExitCode::FAILURE,
        TerminationReason::Completed | TerminationReason::Cancelled => ExitCode::SUCCESS,
    }
}

/// Prints the opening banner and the parameters of the run.
fn print_opening(opts: &Opts, config: &ScanConfig, started_at: &DateTime<Utc>) {
    log::debug!("Printing opening");
    println!("{}", BANNER.bright_red().bold());
    let info = r"------------------------------------------------------------
: Every port of every host, one batch at a time.           :
: Results land in ./log when logging is turned on.         :
------------------------------------------------------------";
    println!("{}", info.bright_blue());
    funny_opening!();

    output!(format!("Start Time: {}", iso_timestamp(started_at)));
    output!(format!(
        "Hosts: {} - {} ({} in total)",
        config.start_host(),
        config.end_host(),
        config.host_count()
    ));
    output!(format!(
        "Ports: {} - {} ({} per host)",
        config.ports().start(),
        config.ports().end(),
        config.ports().len()
    ));
    output!(format!(
        "Timeout: {}ms, batch size: {}",
        config.timeout().as_millis(),
        config.batch_width()
    ));
    if config.logging() {
        output!(format!(
            "Logging to {} ({:?} mode)",
            opts.log_dir.display(),
            opts.log_mode
        ));
    }

    match &opts.config_path {
        Some(path) => detail!(format!("The config file is expected to be at {}", path.display())),
        None => {
            if let Ok(path) = rangescan::input::default_config_path() {
                detail!(format!("The config file is expected to be at {}", path.display()));
            }
        }
    }
    println!();
}

/// Raises the open file limit when asked to, and warns when the batch size
/// would need more descriptors than the soft limit allows. The batch size is
/// never changed on the user's behalf.
#[cfg(unix)]
fn warn_on_batch_size(opts: &Opts) {
    let soft = adjust_ulimit_size(opts);
    let batch_size = u64::from(opts.batch_size);

    if batch_size > soft {
        warning!(
            format!(
                "The batch size {batch_size} is higher than your open file limit of {soft}. \
                 Connections may fail with \"too many open files\"; lower the batch size \
                 or raise the limit with --ulimit."
            ),
            opts.greppable,
            opts.accessible
        );
    } else {
        log::debug!("Batch size {batch_size} fits the open file limit of {soft}");
    }
}

#[cfg(unix)]
fn adjust_ulimit_size(opts: &Opts) -> u64 {
    use rlimit::Resource;

    if let Some(limit) = opts.ulimit {
        if Resource::NOFILE.set(limit, limit).is_ok() {
            detail!(
                format!("Automatically increasing ulimit value to {limit}."),
                opts.greppable || opts.json,
                opts.accessible
            );
        } else {
            warning!("ERROR. Failed to set ulimit value.", opts.greppable, opts.accessible);
        }
    }

    match Resource::NOFILE.get() {
        Ok((soft, _)) => soft,
        Err(e) => {
            log::warn!("Could not read the open file limit: {e}");
            DEFAULT_FILE_DESCRIPTORS_LIMIT
        }
    }
}
