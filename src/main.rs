mod capture;
mod cli;
mod config;
mod frames;
mod interfaces;
mod stream;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process;
use std::time::Duration;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};

use crate::capture::binder::bind_interface;
use crate::cli::Args;
use crate::config::Settings;
use crate::frames::capture_frame::FRAME_CAPACITY;
use crate::interfaces::list_interfaces;
use crate::stream::inspect::inspect_records;
use crate::stream::runner::{spawn_capture, wait_finished, wait_stopped, RunError};
use crate::stream::Shutdown;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // stdout may carry the record stream, so logs always go to stderr
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    if args.list_interfaces {
        for name in list_interfaces() {
            println!("{name}");
        }
        return;
    }

    if let Some(path) = &args.inspect {
        inspect(path);
        return;
    }

    let settings = Settings::load(&args).unwrap_or_else(|err| fail(&err));

    let handle =
        bind_interface(&settings.interface, &settings.capture).unwrap_or_else(|err| fail(&err));

    let sink: Box<dyn Write + Send> = match &settings.output {
        Some(path) => Box::new(File::create(path).unwrap_or_else(|err| {
            fail(&format!("output: cannot create {}: {err}", path.display()))
        })),
        None => Box::new(io::stdout()),
    };

    tracing::info!(
        interface = handle.name(),
        index = handle.index(),
        output = ?settings.output,
        "streaming frames"
    );

    let shutdown = Shutdown::new();
    let sink = BufWriter::with_capacity(FRAME_CAPACITY + 4, sink);
    let mut done = spawn_capture(handle, sink, shutdown.clone())
        .unwrap_or_else(|err| fail(&format!("capture thread: {err}")));

    // a blocked receive wakes up within one receive timeout, the extra second covers the flush
    let grace = settings.capture.recv_timeout + Duration::from_secs(1);
    let finished = tokio::select! {
        outcome = wait_finished(&mut done) => Some(outcome),
        () = wait_for_termination() => None,
    };
    let outcome = match finished {
        Some(outcome) => outcome,
        None => {
            tracing::info!("termination requested, stopping capture");
            shutdown.trigger();
            tokio::select! {
                outcome = wait_stopped(&mut done, grace) => outcome,
                () = wait_for_termination() => Err(RunError::Interrupted),
            }
        }
    };

    match outcome {
        Ok(summary) => {
            tracing::info!(
                records = summary.records,
                payload_bytes = summary.payload_bytes,
                "capture stopped"
            );
        }
        Err(err) => fail(&err),
    }
}

/// Completes on SIGINT or SIGTERM.
async fn wait_for_termination() {
    let Ok(mut sigterm) = signal(SignalKind::terminate()) else {
        tracing::warn!("cannot install SIGTERM handler, only Ctrl-C will stop the capture");
        let _ = tokio::signal::ctrl_c().await;
        return;
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

fn inspect(path: &Path) {
    let file = File::open(path)
        .unwrap_or_else(|err| fail(&format!("inspect: cannot open {}: {err}", path.display())));
    let mut stdout = io::stdout().lock();
    match inspect_records(io::BufReader::new(file), &mut stdout, FRAME_CAPACITY) {
        Ok(summary) => tracing::info!(
            records = summary.records,
            payload_bytes = summary.payload_bytes,
            largest = summary.largest,
            "stream inspected"
        ),
        Err(err) => fail(&format!("inspect: {err}")),
    }
}

/// Prints a diagnostic and terminates with a non-zero status.
fn fail(err: &dyn std::fmt::Display) -> ! {
    eprintln!("error: {err}");
    process::exit(1);
}
