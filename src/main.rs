use clap::error::ErrorKind;
use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::convert::Infallible;

use nagiosplugin::{Resource, Runner};
use tracing::info;
use tracing_log::{AsTrace as _, LogTracer};

mod probe;
mod stream;
mod verdict;

/// Checks the connection status of a Wowza incoming stream
#[derive(Parser)]
#[command(version, about)]
struct Args {
    #[command(flatten)]
    probe: probe::Config,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

fn init_logging(verbose: &Verbosity<WarnLevel>) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(verbose.log_level_filter().as_trace())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))?;

    LogTracer::init_with_filter(verbose.log_level_filter())?;

    Ok(())
}

/// Plugin resource for an argument parsing failure, none for help and version.
fn args_error(err: &clap::Error) -> Option<Resource> {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => None,
        _ => Some(verdict::unknown_resource(error_summary(err))),
    }
}

fn error_summary(err: &clap::Error) -> String {
    let rendered = err.render().to_string();
    let first_line = rendered.lines().next().unwrap_or_default();
    first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string()
}

async fn run(config: &probe::Config) -> Resource {
    let client = match probe::Client::new(config) {
        Ok(client) => client,
        Err(err) => return verdict::unknown_resource(format!("{err:#}")),
    };
    let result = client.probe().await;
    verdict::stream_resource(&config.stream.stream_name, &result)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => match args_error(&err) {
            Some(resource) => {
                let _ = err.print();
                Runner::<Infallible>::new().safe_run(|| Ok(resource)).print_and_exit()
            }
            None => err.exit(),
        },
    };

    if let Err(err) = init_logging(&args.verbose) {
        let resource = verdict::unknown_resource(format!("error initializing logging: {err:#}"));
        Runner::<Infallible>::new().safe_run(|| Ok(resource)).print_and_exit()
    }

    info!(
        host = args.probe.host,
        port = args.probe.port,
        stream = args.probe.stream.stream_name,
        timeout = %humantime::format_duration(args.probe.timeout),
        msg = "probing stream"
    );
    let resource = run(&args.probe).await;
    Runner::<Infallible>::new().safe_run(|| Ok(resource)).print_and_exit()
}
