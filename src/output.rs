use crate::core::enduse::EnduseOutput;
use crate::core::fuel_types::FuelType;
use crate::core::units::HOURS_PER_DAY;
use crate::corpus::RunResults;
use anyhow::anyhow;
use csv::WriterBuilder;
use formatx::formatx;
use std::fmt::Debug;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use strum::IntoEnumIterator;

pub const ANNUAL_FUEL_KEY: &str = "annual_fuel";
pub const PEAK_DAY_FUEL_KEY: &str = "peak_day_fuel";
pub const HOURLY_FUEL_KEY: &str = "hourly_fuel";

pub trait Output: Debug {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write>;
    /// Whether this output can be considered a no-op and therefore that any code that only writes to the output can be skipped.
    fn is_noop(&self) -> bool {
        false
    }
}

#[derive(Debug)]
pub struct FileOutput {
    directory_path: PathBuf,
    file_template: String,
}

impl FileOutput {
    pub fn new(directory_path: PathBuf, file_template: String) -> Self {
        Self {
            directory_path,
            file_template,
        }
    }
}

impl Output for FileOutput {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write> {
        let file_name = formatx!(&self.file_template, location_key)
            .map_err(|err| anyhow!("Invalid output file template: {err:?}"))?;
        Ok(BufWriter::new(File::create(
            self.directory_path.join(file_name),
        )?))
    }
}

impl Output for &FileOutput {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write> {
        <FileOutput as Output>::writer_for_location_key(self, location_key)
    }
}

/// An output that goes to nowhere/ a "sink"/ /dev/null.
#[derive(Debug, Default)]
pub struct SinkOutput;

impl Output for SinkOutput {
    fn writer_for_location_key(&self, _location_key: &str) -> anyhow::Result<impl Write> {
        Ok(io::sink())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

fn key_columns(year: u32, output: &EnduseOutput) -> [String; 5] {
    [
        year.to_string(),
        output.region.clone(),
        output.submodel.to_string(),
        output.enduse.clone(),
        output.sector.clone().unwrap_or_default(),
    ]
}

/// Annual fuel in GWh of every year, region, submodel, enduse, sector and fueltype.
pub fn write_annual_fuel(output: &impl Output, results: &RunResults) -> anyhow::Result<()> {
    let mut writer = WriterBuilder::new()
        .flexible(false)
        .from_writer(output.writer_for_location_key(ANNUAL_FUEL_KEY)?);
    writer.write_record([
        "year", "region", "submodel", "enduse", "sector", "fueltype", "fuel_gwh",
    ])?;
    for year in &results.years {
        for enduse_output in &year.outputs {
            for (fueltype, fuel) in enduse_output.fuel_y.iter() {
                if fuel == 0. {
                    continue;
                }
                let mut record = key_columns(year.year, enduse_output).to_vec();
                record.push(fueltype.to_string());
                record.push(fuel.to_string());
                writer.write_record(&record)?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

fn hour_headers() -> Vec<String> {
    (0..HOURS_PER_DAY).map(|hour| format!("h{hour:02}")).collect()
}

/// Hourly fuel of the peak day of every enduse output.
pub fn write_peak_day_fuel(output: &impl Output, results: &RunResults) -> anyhow::Result<()> {
    let mut writer = WriterBuilder::new()
        .flexible(false)
        .from_writer(output.writer_for_location_key(PEAK_DAY_FUEL_KEY)?);
    let mut headers: Vec<String> = [
        "year", "region", "submodel", "enduse", "sector", "fueltype", "peak_day",
    ]
    .map(String::from)
    .to_vec();
    headers.extend(hour_headers());
    writer.write_record(&headers)?;

    for year in &results.years {
        for enduse_output in &year.outputs {
            for fueltype in FuelType::iter() {
                let peak_dh = &enduse_output.fuel_peak_dh[fueltype.index()];
                if peak_dh.iter().all(|value| *value == 0.) {
                    continue;
                }
                let mut record = key_columns(year.year, enduse_output).to_vec();
                record.push(fueltype.to_string());
                record.push(
                    enduse_output
                        .peak_day
                        .map(|day| day.to_string())
                        .unwrap_or_default(),
                );
                record.extend(peak_dh.iter().map(f64::to_string));
                writer.write_record(&record)?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

/// Hourly fuel of every modelled day, including uniform hourly fuel of flat-profile enduses.
pub fn write_hourly_fuel(output: &impl Output, results: &RunResults) -> anyhow::Result<()> {
    let mut writer = WriterBuilder::new()
        .flexible(false)
        .from_writer(output.writer_for_location_key(HOURLY_FUEL_KEY)?);
    let mut headers: Vec<String> = [
        "year", "region", "submodel", "enduse", "sector", "fueltype", "day",
    ]
    .map(String::from)
    .to_vec();
    headers.extend(hour_headers());
    writer.write_record(&headers)?;

    for year in &results.years {
        for enduse_output in &year.outputs {
            let fuel_yh = enduse_output.fuel_yh_or_flat(results.num_days);
            for fueltype in enduse_output.fuel_y.active_fueltypes() {
                for (day, hours) in fuel_yh.fueltype(fueltype).iter().enumerate() {
                    let mut record = key_columns(year.year, enduse_output).to_vec();
                    record.push(fueltype.to_string());
                    record.push(day.to_string());
                    record.extend(hours.iter().map(f64::to_string));
                    writer.write_record(&record)?;
                }
            }
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write the annual and peak-day results, and hourly results when asked for.
pub fn write_results(
    output: &impl Output,
    results: &RunResults,
    include_hourly: bool,
) -> anyhow::Result<()> {
    if output.is_noop() {
        return Ok(());
    }
    write_annual_fuel(output, results)?;
    write_peak_day_fuel(output, results)?;
    if include_hourly {
        write_hourly_fuel(output, results)?;
    }
    Ok(())
}
