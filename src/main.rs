use std::io;

use clap::{Command, CommandFactory, Parser};
use clap_complete::{generate, Generator};
use jobstruct::cli::args::{Cli, Commands};
use jobstruct::cli::commands::execute_command;
use jobstruct::cli::output;
use jobstruct::exitcode;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

fn main() {
    let cli = Cli::parse();

    if let Commands::Completion { shell } = cli.command {
        let mut cmd = Cli::command();
        eprintln!("Generating completion file for {shell:?}...");
        print_completions(shell, &mut cmd);
        std::process::exit(exitcode::OK);
    }

    setup_logging(cli.debug, cli.quiet);

    if let Err(e) = execute_command(&cli) {
        output::error(&e);
        std::process::exit(e.exit_code());
    }
}

fn setup_logging(verbosity: u8, quiet: bool) {
    tracing::debug!("INIT: Attempting logger init from main.rs");

    let filter = match (quiet, verbosity) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::WARN,
        (false, 1) => LevelFilter::INFO,
        (false, 2) => LevelFilter::DEBUG,
        (false, 3) => LevelFilter::TRACE,
        _ => {
            eprintln!("Don't be crazy, max is -d -d -d");
            LevelFilter::TRACE
        }
    };

    // HTTP stack internals are never interesting here
    let noisy_modules = ["reqwest", "hyper", "rustls", "h2"];
    let module_filter = filter_fn(move |metadata| {
        !noisy_modules
            .iter()
            .any(|name| metadata.target().starts_with(name))
    });

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .with_span_events(FmtSpan::CLOSE);

    let filtered_layer = fmt_layer.with_filter(filter).with_filter(module_filter);

    tracing_subscriber::registry().with(filtered_layer).init();

    match filter {
        LevelFilter::INFO => tracing::info!("Debug mode: info"),
        LevelFilter::DEBUG => tracing::debug!("Debug mode: debug"),
        LevelFilter::TRACE => tracing::debug!("Debug mode: trace"),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // https://docs.rs/clap/latest/clap/_derive/_tutorial/index.html#testing
    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn given_enrich_with_passes_when_parsing_then_fields_set() {
        let cli = Cli::try_parse_from(["jobstruct", "-dd", "enrich", "tax.json", "--passes", "3"]).unwrap();
        assert_eq!(cli.debug, 2);
        match cli.command {
            Commands::Enrich { input, output, passes } => {
                assert_eq!(input.unwrap().to_str(), Some("tax.json"));
                assert_eq!(output.to_str(), Some("-"));
                assert_eq!(passes, 3);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn given_zero_passes_when_parsing_then_rejected() {
        assert!(Cli::try_parse_from(["jobstruct", "enrich", "--passes", "0"]).is_err());
    }
}
