use crate::core::diffusion::{DiffusionMethod, SigmoidShape};
use crate::core::fuel_types::{FuelType, FuelVector};
use crate::core::units::{DayHours, EnergyUnit};
use crate::simulation_time::SimulationTime;
use anyhow::anyhow;
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use serde_valid::Validate;
use std::fmt::{Display, Formatter};
use std::io::Read;

pub const DUMMY_TECH: &str = "dummy_tech";

pub fn ingest_for_processing(json: impl Read) -> Result<Input, anyhow::Error> {
    let input: Input = serde_json::from_reader(json)?;
    input
        .validate()
        .map_err(|errors| anyhow!("Scenario input failed validation: {errors}"))?;
    Ok(input)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Input {
    pub simulation_time: SimulationTime,
    #[serde(default)]
    pub mode: RunMode,
    pub regions: IndexMap<String, RegionInput>,
    pub weather_stations: IndexMap<String, WeatherStationInput>,
    pub scenario_data: ScenarioData,
    #[validate]
    pub technologies: Vec<TechnologyInput>,
    #[validate]
    pub submodels: SubmodelsInput,
    #[serde(default)]
    pub assumptions: Assumptions,
    pub load_profiles: Vec<LoadProfileInput>,
}

/// Whether demand is tracked per technology (unconstrained) or handed to a supply model as heat
/// per fueltype (constrained).
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Constrained,
    #[default]
    Unconstrained,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Submodel {
    Residential,
    Service,
    Industry,
}

impl Display for Submodel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Submodel::Residential => "residential",
                Submodel::Service => "service",
                Submodel::Industry => "industry",
            }
        )
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionInput {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeatherStationInput {
    pub latitude: f64,
    pub longitude: f64,
    /// Hourly air temperatures for each available year, starting at 1 January 00:00.
    pub temperatures: IndexMap<u32, Vec<f64>>,
}

type RegionalSeries = IndexMap<u32, IndexMap<String, f64>>;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioData {
    pub population: RegionalSeries,
    #[serde(default)]
    pub gva: RegionalSeries,
    /// Residential floor area in m2.
    #[serde(default)]
    pub floor_area: RegionalSeries,
    /// Service floor area in m2, per sector.
    #[serde(default)]
    pub service_floor_area: IndexMap<u32, IndexMap<String, IndexMap<String, f64>>>,
    /// Employment per region and employment sector.
    #[serde(default)]
    pub employment: IndexMap<String, IndexMap<String, f64>>,
}

impl ScenarioData {
    pub fn population(&self, year: u32, region: &str) -> Option<f64> {
        self.population.get(&year)?.get(region).copied()
    }

    pub fn gva(&self, year: u32, region: &str) -> Option<f64> {
        self.gva.get(&year)?.get(region).copied()
    }

    pub fn floor_area(&self, year: u32, region: &str) -> Option<f64> {
        self.floor_area.get(&year)?.get(region).copied()
    }

    pub fn service_floor_area(&self, year: u32, region: &str, sector: &str) -> Option<f64> {
        self.service_floor_area
            .get(&year)?
            .get(region)?
            .get(sector)
            .copied()
    }

    pub fn employment(&self, region: &str, employment_sector: &str) -> Option<f64> {
        self.employment.get(region)?.get(employment_sector).copied()
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TechType {
    Placeholder,
    HeatPump,
    Boiler,
    StorageHeater,
    Cooling,
    Hybrid,
    #[default]
    Other,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TechnologyInput {
    pub name: String,
    pub fueltype: FuelType,
    #[validate(exclusive_minimum = 0.0)]
    pub eff_by: f64,
    #[validate(exclusive_minimum = 0.0)]
    pub eff_ey: f64,
    pub year_eff_ey: u32,
    #[serde(default = "default_eff_achieved")]
    #[validate(minimum = 0.0)]
    #[validate(maximum = 1.0)]
    pub eff_achieved: f64,
    #[serde(default)]
    pub diff_method: DiffusionMethod,
    #[serde(default)]
    pub market_entry: Option<u32>,
    #[serde(default = "default_tech_max_share")]
    #[validate(minimum = 0.0)]
    #[validate(maximum = 1.0)]
    pub tech_max_share: f64,
    #[serde(default)]
    pub tech_type: TechType,
    #[serde(default)]
    pub description: Option<String>,
    /// Change of coefficient of performance per kelvin below the heating base temperature.
    #[serde(default)]
    pub cop_slope: Option<f64>,
    #[serde(default)]
    pub hybrid: Option<HybridInput>,
}

fn default_eff_achieved() -> f64 {
    1.
}

fn default_tech_max_share() -> f64 {
    1.
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HybridInput {
    pub tech_low_temp: String,
    pub tech_high_temp: String,
    /// Below this outdoor temperature the high temperature component serves all demand.
    pub switch_temperature: f64,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SubmodelsInput {
    #[serde(default)]
    #[validate]
    pub residential: Option<SubmodelInput>,
    #[serde(default)]
    #[validate]
    pub service: Option<SubmodelInput>,
    #[serde(default)]
    #[validate]
    pub industry: Option<SubmodelInput>,
}

impl SubmodelsInput {
    pub fn iter(&self) -> impl Iterator<Item = (Submodel, &SubmodelInput)> {
        [
            (Submodel::Residential, self.residential.as_ref()),
            (Submodel::Service, self.service.as_ref()),
            (Submodel::Industry, self.industry.as_ref()),
        ]
        .into_iter()
        .filter_map(|(submodel, input)| input.map(|input| (submodel, input)))
    }
}

/// Base-year fuel shares of technologies per enduse and fueltype.
pub type FuelTechSharesInput = IndexMap<String, IndexMap<FuelType, IndexMap<String, f64>>>;

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SubmodelInput {
    #[serde(default)]
    pub unit: EnergyUnit,
    /// National base-year fuel per enduse, optionally split by sector.
    pub national_fuel: IndexMap<String, EnduseFuelInput>,
    #[serde(default)]
    pub fuel_tech_shares: FuelTechSharesInput,
    #[serde(default)]
    #[validate]
    pub fuel_switches: Vec<FuelSwitch>,
    #[serde(default)]
    #[validate]
    pub service_switches: Vec<ServiceSwitch>,
    /// Mapping of industry sectors onto the employment sectors of the scenario data.
    #[serde(default)]
    pub employment_sectors: IndexMap<String, String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum EnduseFuelInput {
    Total(FuelVector),
    BySector(IndexMap<String, FuelVector>),
}

#[derive(Clone, Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct FuelSwitch {
    pub enduse: String,
    #[serde(default)]
    pub sector: Option<String>,
    pub fueltype_replace: FuelType,
    pub technology_install: String,
    pub switch_yr: u32,
    #[validate(minimum = 0.0)]
    #[validate(maximum = 1.0)]
    pub fuel_share_switched_ey: f64,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct ServiceSwitch {
    pub enduse: String,
    #[serde(default)]
    pub sector: Option<String>,
    pub technology_install: String,
    #[validate(minimum = 0.0)]
    #[validate(maximum = 1.0)]
    pub service_share_ey: f64,
    pub switch_yr: u32,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioDriver {
    Population,
    Gva,
    FloorArea,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Assumptions {
    /// Enduses scaled with heating degree days and given regional heating load profiles.
    #[serde(default)]
    pub heating_enduses: IndexSet<String>,
    /// Enduses scaled with cooling degree days and given regional cooling load profiles.
    #[serde(default)]
    pub cooling_enduses: IndexSet<String>,
    /// Enduses without a temporal shape; their hourly demand is never materialised.
    #[serde(default)]
    pub flat_profile_enduses: IndexSet<String>,
    #[serde(default)]
    pub base_temperatures: BaseTemperatures,
    #[serde(default)]
    pub smart_meters: Option<SmartMeterAssumptions>,
    #[serde(default)]
    pub enduse_overall_change: IndexMap<String, EnduseChange>,
    #[serde(default)]
    pub heat_recovery: IndexMap<String, HeatRecovery>,
    #[serde(default)]
    pub cooled_floorarea: Option<CooledFloorArea>,
    #[serde(default)]
    pub industry_adjustments: Vec<IndustryAdjustment>,
    #[serde(default)]
    pub demand_management: IndexMap<String, DemandManagement>,
    #[serde(default)]
    pub scenario_drivers: IndexMap<String, Vec<ScenarioDriver>>,
    /// Shape of sigmoid diffusions of technology efficiencies.
    #[serde(default)]
    pub efficiency_diffusion: SigmoidShape,
    /// COP change per kelvin below the heating base temperature for heat pumps.
    #[serde(default = "default_cop_slope")]
    pub heat_pump_cop_slope: f64,
}

fn default_cop_slope() -> f64 {
    -0.08
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BaseTemperatures {
    pub heating_by: f64,
    pub heating_ey: f64,
    pub cooling_by: f64,
    pub cooling_ey: f64,
    #[serde(default)]
    pub yr_until_changed: Option<u32>,
}

impl Default for BaseTemperatures {
    fn default() -> Self {
        Self {
            heating_by: 15.5,
            heating_ey: 15.5,
            cooling_by: 21.,
            cooling_ey: 21.,
            yr_until_changed: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmartMeterAssumptions {
    pub penetration_by: f64,
    pub penetration_ey: f64,
    #[serde(default)]
    pub yr_until_changed: Option<u32>,
    #[serde(default)]
    pub sigmoid: SigmoidShape,
    /// Fraction of fuel saved per enduse at full smart meter penetration.
    pub savings: IndexMap<String, f64>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EnduseChange {
    /// Overall change of fuel by the end year, e.g. -0.1 for a 10% reduction.
    pub change_ey: f64,
    #[serde(default)]
    pub yr_until_changed: Option<u32>,
    #[serde(default)]
    pub diff_method: DiffusionMethod,
    #[serde(default)]
    pub sigmoid: SigmoidShape,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HeatRecovery {
    /// Fraction of service recovered once fully diffused.
    pub recovered_ey: f64,
    #[serde(default)]
    pub yr_until_changed: Option<u32>,
    #[serde(default)]
    pub sigmoid: SigmoidShape,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CooledFloorArea {
    pub share_by: f64,
    pub share_ey: f64,
    #[serde(default)]
    pub yr_until_changed: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct IndustryAdjustment {
    pub enduse: String,
    #[serde(default)]
    pub sector: Option<String>,
    pub change_ey: f64,
    #[serde(default)]
    pub yr_until_changed: Option<u32>,
    #[serde(default)]
    pub diff_method: DiffusionMethod,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DemandManagement {
    /// Fraction of the gap between the daily load factor and 1.0 closed by the end year.
    pub load_factor_improvement_ey: f64,
    #[serde(default)]
    pub yr_until_changed: Option<u32>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadProfileInput {
    pub id: String,
    pub enduses: Vec<String>,
    /// Sectors the profile applies to; applies to every sector when empty.
    #[serde(default)]
    pub sectors: Vec<String>,
    #[serde(default = "default_profile_technologies")]
    pub technologies: Vec<String>,
    /// Daily shape derived from regional heating or cooling degree days.
    #[serde(default)]
    pub regional: bool,
    /// Shape of demand within a day.
    pub dh: DayHours,
    /// Share of annual demand per day of the year; flat when absent.
    #[serde(default)]
    pub yd: Option<Vec<f64>>,
    /// Shape of demand within the peak day; `dh` when absent.
    #[serde(default)]
    pub peak_dh: Option<DayHours>,
}

fn default_profile_technologies() -> Vec<String> {
    vec![DUMMY_TECH.to_string()]
}
