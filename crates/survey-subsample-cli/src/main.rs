use anyhow::Result;
use clap::ArgMatches;
use log::LevelFilter;

use survey_subsample_cli::cli::command;
use survey_subsample_cli::config::RunConfig;
use survey_subsample_cli::pipeline::run_pipeline;

fn main() -> Result<()> {
    let matches = command().get_matches();

    match matches.subcommand() {
        Some(("run", run_matches)) => handle_run(run_matches),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "error,survey_subsample=debug,survey_subsample_cli=debug"
    } else {
        "error,survey_subsample=info,survey_subsample_cli=info"
    };
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("SURVEY_SUBSAMPLE_LOG", default_filter))
        .init();
}

fn handle_run(matches: &ArgMatches) -> Result<()> {
    init_logging(matches.get_flag("verbose"));

    let config = RunConfig::from_arguments(matches)?;
    log::info!(
        "[survey-subsample] {} -> {}",
        config.infile.display(),
        config.outdir.display()
    );
    log::debug!(
        "configuration:\n{}",
        serde_json::to_string_pretty(&config).unwrap_or_default()
    );

    match run_pipeline(&config) {
        Ok(_) => Ok(()),
        Err(e) => {
            log::error!("Run failed: {:#}", e);
            std::process::exit(1)
        }
    }
}
