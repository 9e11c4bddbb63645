use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mpwmerge::config::CheckConfig;
use mpwmerge::verify::{check_file, write_results};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Check a submitted layout for black-box cells, footprint, and PDK layers"
)]
pub struct Args {
    /// The layout to check.
    path: PathBuf,
    /// A TOML configuration file. Defaults apply if omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// The PDK layer-properties file.
    #[arg(short, long)]
    layer_table: Option<PathBuf>,
}

pub fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    let mut config = match args.config.as_deref().map(CheckConfig::from_toml_file) {
        Some(Ok(config)) => config,
        Some(Err(err)) => {
            eprintln!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
        None => CheckConfig::default(),
    };
    if args.layer_table.is_some() {
        config.layer_table = args.layer_table;
    }

    println!("Running submission checks for file {:?}", args.path);
    let output = check_file(&args.path, &config);
    output.log();
    if let Err(err) = write_results(&args.path, &output) {
        eprintln!("failed to write results database: {err}");
    }

    println!("{}", output.num_errors());
    if output.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
