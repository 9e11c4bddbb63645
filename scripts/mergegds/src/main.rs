use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mergegds::{load_config, merge, Overrides};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Pack submitted GDS layouts onto a shared multi-project-wafer canvas"
)]
pub struct Args {
    /// A TOML configuration file. Defaults apply if omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Directory of fixed infrastructure layouts.
    #[arg(long)]
    framework: Option<PathBuf>,
    /// Directory of submitted layouts.
    #[arg(long)]
    submissions: Option<PathBuf>,
    /// Name of the top cell of the merged layout.
    #[arg(long)]
    top_cell: Option<String>,
    /// The output directory.
    #[arg(short, long, default_value = "merge")]
    output: PathBuf,
}

pub fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    let overrides = Overrides {
        framework: args.framework,
        submissions: args.submissions,
        top_cell: args.top_cell,
    };
    let result = load_config(args.config.as_deref(), overrides)
        .and_then(|config| merge(config, &args.output));
    match result {
        Ok((merger, outputs)) => {
            log::info!("wrote {:?}", outputs.gds);
            println!(
                "placed {} designs, {} errors",
                merger.placements().len(),
                merger.num_errors()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("merge failed: {err}");
            ExitCode::FAILURE
        }
    }
}
