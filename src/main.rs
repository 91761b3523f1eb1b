use std::net::Ipv4Addr;
use std::process::ExitCode;

use clap::Parser;
use reactor_server::{Error, ServerBuilder, SignalListener, telemetry};
use tracing::error;

/// Readiness-driven TCP server answering every request with a canned response.
#[derive(Parser, Debug)]
#[command(name = "reactor-server", version)]
struct Args {
    /// Port to listen on.
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Number of worker threads.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    workers: u64,

    /// Address to bind to.
    #[arg(long, default_value_t = Ipv4Addr::UNSPECIFIED)]
    host: Ipv4Addr,

    /// Pending-connection backlog passed to listen(2).
    #[arg(long, default_value_t = 10)]
    backlog: i32,

    /// Largest number of bytes read per request.
    #[arg(long, default_value_t = 4096)]
    buffer_size: usize,

    /// Bound the task queue; the dispatcher waits while it is full.
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Requests served on one connection before it yields its worker.
    #[arg(long)]
    max_requests_per_turn: Option<usize>,

    /// Tracing filter directives; falls back to RUST_LOG, then "info".
    #[arg(long)]
    log_filter: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(err) = telemetry::initialise(args.log_filter.as_deref()) {
        eprintln!("reactor-server: {err}");
        return ExitCode::FAILURE;
    }

    match serve(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "server failed");
            eprintln!("reactor-server: {err}");
            ExitCode::FAILURE
        }
    }
}

fn serve(args: Args) -> Result<(), Error> {
    let mut builder = ServerBuilder::new()
        .host(args.host)
        .port(args.port)
        .workers(args.workers as usize)
        .backlog(args.backlog)
        .buffer_size(args.buffer_size);

    if let Some(capacity) = args.queue_capacity {
        builder = builder.queue_capacity(capacity);
    }
    if let Some(limit) = args.max_requests_per_turn {
        builder = builder.max_requests_per_turn(limit);
    }

    let server = builder.bind()?;
    let signals = SignalListener::install(server.stop_handle())?;

    let outcome = server.run();
    signals.close();
    outcome
}
