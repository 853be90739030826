//! reqcheck entry point: one request, optional assertions, one report line.

mod input;

use std::process::ExitCode;

use clap::Parser;

/// Run an HTTP request and check the response with assertions.
#[derive(Debug, Parser)]
#[command(name = "reqcheck", version)]
struct Args {
    /// Request descriptor as JSON: {method, url, headers?, params?, data?}
    #[arg(short, long)]
    request: Option<String>,

    /// Assertions to evaluate, one per line
    #[arg(short, long)]
    tests: Option<String>,

    /// Proxy to send the request through (host:port or URL)
    #[arg(short, long)]
    proxy: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries only the report
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();

    let args = Args::parse();

    let descriptor = match input::parse_request(args.request.as_deref()) {
        Ok(descriptor) => descriptor,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let assertions = input::parse_tests(args.tests.as_deref());

    let report = reqcheck_core::run(descriptor, assertions.as_deref(), args.proxy.as_deref()).await;
    tracing::debug!(success = report.result.is_success(), "request finished");
    println!("{}", report.render());
    ExitCode::SUCCESS
}
