extern crate energy_demand;

use clap::Parser;
use energy_demand::output::FileOutput;
use energy_demand::run_scenario;
use std::fs::{create_dir_all, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Default, Debug)]
#[clap(author, version, about, long_about = None)]
struct EnergyDemandArgs {
    scenario_file: String,
    /// Directory results are written to; defaults to the directory of the scenario file.
    #[arg(long, short)]
    output_dir: Option<PathBuf>,
    /// Also write hourly fuel of every modelled day.
    #[arg(long, default_value_t = false)]
    hourly: bool,
}

fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = EnergyDemandArgs::parse();

    let scenario_path = Path::new(&args.scenario_file);
    let scenario_stem = scenario_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("scenario");
    let output_dir = match args.output_dir {
        Some(dir) => dir,
        None => scenario_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    create_dir_all(&output_dir)?;

    let output = FileOutput::new(output_dir.clone(), format!("{scenario_stem}__{{}}.csv"));
    let scenario = BufReader::new(File::open(scenario_path)?);
    let results = run_scenario(scenario, output, args.hourly)?;

    info!(
        "Wrote results of {} simulation years to {}",
        results.years.len(),
        output_dir.display()
    );
    Ok(())
}
