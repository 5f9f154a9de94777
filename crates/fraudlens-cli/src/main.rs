use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use fraudlens_classifiers::pipeline::PipelineConfig;
use fraudlens_cli::compare::{apply_overrides, load_pipeline_config, run_comparison, RunOverrides};

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("FRAUDLENS_LOG", "error,fraudlens=info"))
        .init();

    let matches = Command::new("fraudlens")
        .version(clap::crate_version!())
        .about("Compare fraud classifiers on labelled transaction tables")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about("Train, evaluate and explain the configured models")
                .arg(
                    Arg::new("dataset")
                        .help("Path to the transaction table (.csv, .tsv, .xlsx, .xls, .ods)")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("config")
                        .help("Path to a JSON run configuration")
                        .required(false)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .help("Random seed for the split and all seeded models")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("test_fraction")
                        .long("test-fraction")
                        .help("Fraction of rows held out for evaluation")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    Arg::new("label_column")
                        .long("label-column")
                        .help("Name of the 0/1 label column")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new()),
                )
                .arg(
                    Arg::new("report")
                        .short('o')
                        .long("report")
                        .help("Path of the HTML report. Overrides the configuration file.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("no_report")
                        .long("no-report")
                        .help("Disable HTML report generation.")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("report"),
                )
                .arg(
                    Arg::new("no_explain")
                        .long("no-explain")
                        .help("Skip feature attribution.")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("config").about("Print the default run configuration as JSON"))
        .get_matches();

    match matches.subcommand() {
        Some(("run", run_matches)) => handle_run(run_matches),
        Some(("config", _)) => {
            println!("{}", serde_json::to_string_pretty(&PipelineConfig::default())?);
            Ok(())
        }
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_run(matches: &ArgMatches) -> Result<()> {
    let config_path: Option<&PathBuf> = matches.get_one("config");
    let mut config = match load_pipeline_config(config_path.map(|p| p.as_path())) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {:#}", e);
            std::process::exit(1)
        }
    };

    let overrides = RunOverrides {
        dataset_path: matches.get_one::<PathBuf>("dataset").cloned(),
        seed: matches.get_one::<u64>("seed").copied(),
        test_fraction: matches.get_one::<f64>("test_fraction").copied(),
        label_column: matches.get_one::<String>("label_column").cloned(),
        report_path: matches.get_one::<PathBuf>("report").cloned(),
        no_report: matches.get_flag("no_report"),
        no_explain: matches.get_flag("no_explain"),
    };
    apply_overrides(&mut config, &overrides);
    log::info!("[fraudlens] Comparing models on {}", config.dataset_path);

    match run_comparison(&config) {
        Ok(_) => Ok(()),
        Err(e) => {
            log::error!("Run failed: {:#}", e);
            std::process::exit(1)
        }
    }
}
