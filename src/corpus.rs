//! Assembly of a whole scenario and its run over the simulation years.

use crate::core::disaggregation::{disaggregate, to_gwh, DisaggregationContext, RegionalFuel};
use crate::core::dwelling_stock::{DwellingStock, FloorAreaSource, ScenarioDwellingStock};
use crate::core::enduse::{
    sum_fuel_y, Enduse, EnduseInstance, EnduseOutput, RegionContext, ScenarioDriverSource,
    YearContext,
};
use crate::core::fuel_types::FuelVector;
use crate::core::load_profiles::{
    non_regional_lp_stock, regional_lp_stock, LoadProfileStock, RegionLoadProfiles,
};
use crate::core::sigmoid_fitting::ServiceDiffusion;
use crate::core::solvers::FitCriteria;
use crate::core::switches::{SubmodelTables, SwitchKey};
use crate::core::technologies::{TechnologyAssumptions, TechnologyStock};
use crate::errors::{ConfigurationError, EnergyDemandError};
use crate::external_conditions::{ClimateFactors, ExternalConditions};
use crate::input::{
    Assumptions, EnduseFuelInput, Input, LoadProfileInput, RegionInput, RunMode, ScenarioData,
    ScenarioDriver, Submodel, SubmodelInput, TechnologyInput, WeatherStationInput,
};
use crate::simulation_time::SimulationTime;
use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use tracing::{debug, info};

/// Drivers of enduses without configured scenario drivers.
const RESIDENTIAL_DEFAULT_DRIVERS: &[ScenarioDriver] = &[ScenarioDriver::Population];
const SERVICE_DEFAULT_DRIVERS: &[ScenarioDriver] = &[ScenarioDriver::FloorArea];
const INDUSTRY_DEFAULT_DRIVERS: &[ScenarioDriver] = &[ScenarioDriver::Gva];

/// Scenario-scoped data of one submodel.
#[derive(Debug)]
pub struct SubmodelCorpus {
    pub submodel: Submodel,
    pub tables: SubmodelTables,
    /// Regional base-year fuel in GWh.
    pub regional_fuel: RegionalFuel,
    /// Service share diffusion of every enduse and sector affected by switches.
    pub diffusions: IndexMap<SwitchKey, ServiceDiffusion>,
    drivers: SubmodelDrivers,
}

#[derive(Debug)]
enum SubmodelDrivers {
    Residential(ScenarioDwellingStock),
    /// One dwelling stock per service sector.
    Service(IndexMap<String, ScenarioDwellingStock>),
    Industry,
}

/// Annual and hourly demand of every region, enduse and sector in one simulation year.
#[derive(Clone, Debug)]
pub struct YearResults {
    pub year: u32,
    pub outputs: Vec<EnduseOutput>,
}

#[derive(Clone, Debug)]
pub struct RunResults {
    pub num_days: usize,
    pub years: Vec<YearResults>,
}

impl RunResults {
    /// Annual fuel summed over all regions, enduses and sectors of a year.
    pub fn total_fuel(&self, year: u32) -> Option<FuelVector> {
        self.years
            .iter()
            .find(|results| results.year == year)
            .map(|results| sum_fuel_y(&results.outputs))
    }
}

/// Year-scoped stocks of one region.
struct RegionYear {
    region: String,
    climate: ClimateFactors,
    technologies: TechnologyStock,
    regional_profiles: LoadProfileStock,
}

#[derive(Debug)]
pub struct Corpus {
    simulation_time: SimulationTime,
    mode: RunMode,
    regions: IndexMap<String, RegionInput>,
    weather_stations: IndexMap<String, WeatherStationInput>,
    scenario_data: ScenarioData,
    definitions: IndexMap<String, TechnologyInput>,
    assumptions: Assumptions,
    load_profiles: Vec<LoadProfileInput>,
    non_regional_profiles: LoadProfileStock,
    submodels: Vec<SubmodelCorpus>,
    enduse_technologies: IndexMap<String, IndexSet<String>>,
}

impl Corpus {
    pub fn from_inputs(input: Input) -> Result<Self, EnergyDemandError> {
        let simulation_time = input.simulation_time;
        let base_yr = simulation_time.base_year();
        let end_yr = simulation_time.end_year();
        let model_yeardays = simulation_time.model_yeardays();
        let years: Vec<u32> = simulation_time
            .iter()
            .map(|iteration| iteration.current_year)
            .collect();

        let definitions: IndexMap<String, TechnologyInput> = input
            .technologies
            .iter()
            .map(|technology| (technology.name.clone(), technology.clone()))
            .collect();

        let non_regional_profiles = non_regional_lp_stock(&input.load_profiles, &model_yeardays)?;

        // base-year degree days weight the disaggregation of heating and cooling fuel
        let mut hdd = IndexMap::new();
        let mut cdd = IndexMap::new();
        for (name, region) in &input.regions {
            let conditions = ExternalConditions::for_region(
                name,
                region,
                &input.weather_stations,
                &input.assumptions.base_temperatures,
                (base_yr, base_yr, end_yr),
                &model_yeardays,
            )?;
            let climate = conditions.climate_factors();
            hdd.insert(name.clone(), climate.hdd_by);
            cdd.insert(name.clone(), climate.cdd_by);
        }
        let region_names: Vec<String> = input.regions.keys().cloned().collect();
        let disaggregation_context = DisaggregationContext {
            base_yr,
            regions: region_names.clone(),
            data: &input.scenario_data,
            hdd,
            cdd,
            heating_enduses: &input.assumptions.heating_enduses,
            cooling_enduses: &input.assumptions.cooling_enduses,
        };

        let fit_criteria = FitCriteria::default();
        let mut submodels = vec![];
        let mut enduse_technologies: IndexMap<String, IndexSet<String>> = IndexMap::new();

        for (submodel, submodel_input) in input.submodels.iter() {
            let tables = SubmodelTables::new(submodel, submodel_input, &definitions, base_yr)?;
            for (enduse, technologies) in tables.enduse_technologies() {
                enduse_technologies
                    .entry(enduse)
                    .or_default()
                    .extend(technologies);
            }

            let regional_fuel = disaggregate(
                submodel,
                &submodel_input.national_fuel,
                submodel_input.unit,
                &submodel_input.employment_sectors,
                &disaggregation_context,
            )?;
            info!(
                "Disaggregated {submodel} fuel of {} enduses onto {} regions",
                submodel_input.national_fuel.len(),
                region_names.len()
            );

            let diffusions = fit_diffusions(
                submodel_input,
                &tables,
                &definitions,
                base_yr,
                &fit_criteria,
            )?;

            let drivers = submodel_drivers(
                submodel,
                submodel_input,
                &input.scenario_data,
                &input.assumptions,
                &region_names,
                &years,
            )?;

            submodels.push(SubmodelCorpus {
                submodel,
                tables,
                regional_fuel,
                diffusions,
                drivers,
            });
        }

        Ok(Self {
            simulation_time,
            mode: input.mode,
            regions: input.regions,
            weather_stations: input.weather_stations,
            scenario_data: input.scenario_data,
            definitions,
            assumptions: input.assumptions,
            load_profiles: input.load_profiles,
            non_regional_profiles,
            submodels,
            enduse_technologies,
        })
    }

    pub fn submodels(&self) -> &[SubmodelCorpus] {
        &self.submodels
    }

    /// Run every simulation year in order.
    pub fn run(&self) -> Result<RunResults, EnergyDemandError> {
        let mut years = Vec::with_capacity(self.simulation_time.total_steps());
        for iteration in self.simulation_time.iter() {
            if iteration.is_base_year() {
                info!("Running base year {}", iteration.current_year);
            } else {
                info!("Running simulation year {}", iteration.current_year);
            }
            years.push(self.run_year(iteration.current_year)?);
        }
        Ok(RunResults {
            num_days: self.simulation_time.num_modelled_days(),
            years,
        })
    }

    fn run_year(&self, curr_yr: u32) -> Result<YearResults, EnergyDemandError> {
        let base_yr = self.simulation_time.base_year();
        let end_yr = self.simulation_time.end_year();
        let model_yeardays = self.simulation_time.model_yeardays();
        let technology_assumptions = TechnologyAssumptions {
            heat_pump_cop_slope: self.assumptions.heat_pump_cop_slope,
            efficiency_diffusion: self.assumptions.efficiency_diffusion,
        };

        let region_names: Vec<(&String, &RegionInput)> = self.regions.iter().collect();
        let region_years = region_names
            .par_iter()
            .map(|(name, region)| -> Result<RegionYear, ConfigurationError> {
                let conditions = ExternalConditions::for_region(
                    name,
                    region,
                    &self.weather_stations,
                    &self.assumptions.base_temperatures,
                    (base_yr, curr_yr, end_yr),
                    &model_yeardays,
                )?;
                let technologies = TechnologyStock::new(
                    name,
                    &self.definitions,
                    &self.enduse_technologies,
                    &technology_assumptions,
                    base_yr,
                    curr_yr,
                    &conditions,
                )?;
                let regional_profiles = regional_lp_stock(
                    &self.load_profiles,
                    &conditions,
                    &technologies,
                    &self.assumptions.heating_enduses,
                    &self.assumptions.cooling_enduses,
                )?;
                debug!(
                    "Region '{name}' uses weather station '{}' in {curr_yr}",
                    conditions.weather_station
                );
                Ok(RegionYear {
                    region: name.to_string(),
                    climate: conditions.climate_factors(),
                    technologies,
                    regional_profiles,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let region_years: IndexMap<&str, &RegionYear> = region_years
            .iter()
            .map(|region_year| (region_year.region.as_str(), region_year))
            .collect();

        let year = YearContext {
            base_yr,
            curr_yr,
            end_yr,
            mode: self.mode,
            num_days: model_yeardays.len(),
            assumptions: &self.assumptions,
        };

        let mut jobs = vec![];
        for submodel in &self.submodels {
            for (key, fuel) in &submodel.regional_fuel {
                let Some(region_year) = region_years.get(key.region.as_str()) else {
                    continue;
                };
                let sector = key.sector.as_deref();
                let instance = EnduseInstance {
                    submodel: submodel.submodel,
                    enduse: &key.enduse,
                    sector,
                    fuel: *fuel,
                    fuel_tech_shares: submodel.tables.fuel_tech_shares.get(&key.enduse),
                    service_diffusion: submodel.diffusions.get(&SwitchKey {
                        enduse: key.enduse.clone(),
                        sector: key.sector.clone(),
                    }),
                    drivers: submodel.driver_source(
                        &self.scenario_data,
                        &self.assumptions,
                        &key.enduse,
                        sector,
                    ),
                };
                let region = RegionContext {
                    region: &region_year.region,
                    climate: region_year.climate,
                    technologies: &region_year.technologies,
                    load_profiles: RegionLoadProfiles {
                        non_regional: &self.non_regional_profiles,
                        regional: &region_year.regional_profiles,
                    },
                };
                jobs.push((instance, region));
            }
        }

        let outputs = jobs
            .into_par_iter()
            .map(|(instance, region)| Enduse::new(instance, year, region).calculate())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(YearResults {
            year: curr_yr,
            outputs,
        })
    }
}

impl SubmodelCorpus {
    fn driver_source<'a>(
        &'a self,
        data: &'a ScenarioData,
        assumptions: &'a Assumptions,
        enduse: &str,
        sector: Option<&str>,
    ) -> ScenarioDriverSource<'a> {
        match &self.drivers {
            SubmodelDrivers::Residential(stock) => ScenarioDriverSource::DwellingStock(stock),
            SubmodelDrivers::Service(stocks) => sector
                .and_then(|sector| stocks.get(sector))
                .map_or(ScenarioDriverSource::Unchanged, |stock| {
                    ScenarioDriverSource::DwellingStock(stock as &dyn DwellingStock)
                }),
            SubmodelDrivers::Industry => ScenarioDriverSource::External {
                data,
                drivers: assumptions
                    .scenario_drivers
                    .get(enduse)
                    .map_or(INDUSTRY_DEFAULT_DRIVERS, Vec::as_slice),
            },
        }
    }
}

fn submodel_drivers(
    submodel: Submodel,
    input: &SubmodelInput,
    data: &ScenarioData,
    assumptions: &Assumptions,
    regions: &[String],
    years: &[u32],
) -> Result<SubmodelDrivers, ConfigurationError> {
    Ok(match submodel {
        Submodel::Residential => SubmodelDrivers::Residential(ScenarioDwellingStock::new(
            data,
            &assumptions.scenario_drivers,
            RESIDENTIAL_DEFAULT_DRIVERS,
            FloorAreaSource::Residential,
            input.national_fuel.keys(),
            regions,
            years,
        )),
        Submodel::Service => {
            let sectors: IndexSet<&String> = input
                .national_fuel
                .values()
                .flat_map(|fuel| match fuel {
                    EnduseFuelInput::Total(_) => vec![],
                    EnduseFuelInput::BySector(sectors) => sectors.keys().collect(),
                })
                .collect();
            SubmodelDrivers::Service(
                sectors
                    .into_iter()
                    .map(|sector| {
                        (
                            sector.clone(),
                            ScenarioDwellingStock::new(
                                data,
                                &assumptions.scenario_drivers,
                                SERVICE_DEFAULT_DRIVERS,
                                FloorAreaSource::ServiceSector(sector),
                                input.national_fuel.keys(),
                                regions,
                                years,
                            ),
                        )
                    })
                    .collect(),
            )
        }
        Submodel::Industry => {
            // industry has no floor area data of its own
            for enduse in input.national_fuel.keys() {
                let drivers = assumptions.scenario_drivers.get(enduse);
                if drivers.is_some_and(|drivers| drivers.contains(&ScenarioDriver::FloorArea)) {
                    return Err(ConfigurationError::UnsupportedScenarioDriver {
                        submodel: submodel.to_string(),
                        enduse: enduse.clone(),
                        driver: ScenarioDriver::FloorArea,
                    });
                }
            }
            SubmodelDrivers::Industry
        }
    })
}

/// Fit the service diffusion of every enduse and sector with switches, from national fuel.
fn fit_diffusions(
    input: &SubmodelInput,
    tables: &SubmodelTables,
    definitions: &IndexMap<String, TechnologyInput>,
    base_yr: u32,
    criteria: &FitCriteria,
) -> Result<IndexMap<SwitchKey, ServiceDiffusion>, EnergyDemandError> {
    let mut diffusions = IndexMap::new();
    for (enduse, fuel_input) in &input.national_fuel {
        let Some(shares) = tables.fuel_tech_shares.get(enduse) else {
            continue;
        };
        let sectors: Vec<(Option<&String>, &FuelVector)> = match fuel_input {
            EnduseFuelInput::Total(fuel) => vec![(None, fuel)],
            EnduseFuelInput::BySector(sectors) => sectors
                .iter()
                .map(|(sector, fuel)| (Some(sector), fuel))
                .collect(),
        };
        for (sector, fuel) in sectors {
            let Some(switches) = tables.switches_for(enduse, sector.map(String::as_str)) else {
                continue;
            };
            let diffusion = ServiceDiffusion::fit(
                enduse,
                switches,
                &to_gwh(fuel, input.unit),
                shares,
                definitions,
                base_yr,
                criteria,
            )?;
            debug!(
                "Fitted service diffusion of {} technologies for '{enduse}'",
                diffusion.technologies().len()
            );
            diffusions.insert(
                SwitchKey {
                    enduse: enduse.clone(),
                    sector: sector.cloned(),
                },
                diffusion,
            );
        }
    }
    Ok(diffusions)
}
