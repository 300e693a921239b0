#![allow(clippy::too_many_arguments)]

mod compare_floats;
pub mod core;
pub mod corpus;
pub mod errors;
mod external_conditions;
pub mod input;
pub mod output;
mod simulation_time;
mod statistics;


#[macro_use]
extern crate is_close;

pub use crate::corpus::RunResults;
use crate::corpus::Corpus;
pub use crate::errors::EnergyDemandError;
use crate::input::ingest_for_processing;
use crate::output::{write_results, Output};
use std::io::Read;
use tracing::info;

/// Run a scenario document and write its results.
pub fn run_scenario(
    input: impl Read,
    output: impl Output,
    include_hourly: bool,
) -> Result<RunResults, EnergyDemandError> {
    let input = ingest_for_processing(input)?;

    let corpus = Corpus::from_inputs(input)?;
    let results = corpus.run()?;

    write_results(&output, &results, include_hourly).map_err(EnergyDemandError::OutputFailure)?;
    info!(
        "Scenario finished for {} simulation years",
        results.years.len()
    );

    Ok(results)
}
