use std::path::PathBuf;

use clap::{Arg, ArgAction, Command, ValueHint};

/// Argument parser for the `survey-subsample` binary.
pub fn command() -> Command {
    Command::new("survey-subsample")
        .version(clap::crate_version!())
        .about("Find a compact subset of survey items that preserves diagnostic power")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about("Fit, rank and degrade models for every diagnosis in a survey table")
                .arg(
                    Arg::new("infile")
                        .help("Survey table (*.csv or *.tsv)")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("outdir")
                        .help("Directory the result tables and report are written to")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .help("JSON run configuration. Command-line flags override its values.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("number_of_questions")
                        .short('n')
                        .long("number-of-questions")
                        .help("Length of the per-diagnosis top-N lists used for ranking")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("random_state")
                        .long("random-state")
                        .help("Seed shared by the splitters and the ensembles")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("dx_threshold")
                        .short('t')
                        .long("dx-threshold")
                        .help("Minimum number of positive subjects for a diagnosis to be kept")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("n_threads")
                        .long("n-threads")
                        .help("Number of concurrent fits in the degradation sweep")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("features")
                        .long("features")
                        .help("Comma-separated survey item columns. Defaults to every non-diagnosis column.")
                        .value_delimiter(',')
                        .num_args(1..),
                )
                .arg(
                    Arg::new("diagnoses")
                        .long("diagnoses")
                        .help("Comma-separated diagnosis columns. Defaults to columns with the diagnosis prefix.")
                        .value_delimiter(',')
                        .num_args(1..),
                )
                .arg(
                    Arg::new("model_type")
                        .long("model-type")
                        .help("Override the ensemble family from the JSON config.")
                        .value_parser(["random_forest", "extra_trees"]),
                )
                .arg(
                    Arg::new("no_degrade")
                        .long("no-degrade")
                        .help("Skip the degradation sweep.")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("no_report")
                        .long("no-report")
                        .help("Disable HTML report generation.")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("verbose")
                        .short('v')
                        .long("verbose")
                        .help("Log per-fold progress.")
                        .action(ArgAction::SetTrue),
                ),
        )
}
