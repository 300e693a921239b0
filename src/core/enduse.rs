//! Annual and hourly fuel of one enduse of one region and sector in a simulation year.
//!
//! Regional base-year fuel passes through a fixed cascade of adjustments (climate, smart
//! meters, overall enduse change, scenario drivers, floor area and industry adjustments). Enduses
//! with technologies are then converted to energy service, diffused under switches, and
//! converted back to fuel with current-year efficiencies before being spread over the hours of
//! the modelled days.

use crate::compare_floats::{max_of_2, ratio_or_unity};
use crate::core::demand_management::{load_factor_improvement_cy, shape_load_factor};
use crate::core::diffusion::{diffuse_value, linear_diff, DiffusionMethod};
use crate::core::dwelling_stock::{driver_product, DwellingStock, FloorAreaSource};
use crate::core::fuel_types::{FuelType, FuelVector, FuelYh, NUM_FUELTYPES};
use crate::core::load_profiles::{LoadProfile, RegionLoadProfiles};
use crate::core::sigmoid_fitting::{ServiceDiffusion, NEGATIVE_SERVICE_TOLERANCE};
use crate::core::switches::{fuel_per_technology, EnduseFuelTechShares};
use crate::core::technologies::{FuelTypeSplit, TechnologyStock};
use crate::core::units::{DayHours, HOURS_PER_DAY};
use crate::errors::{CalculationError, EnergyDemandError};
use crate::external_conditions::ClimateFactors;
use crate::input::{Assumptions, RunMode, ScenarioData, ScenarioDriver, Submodel, DUMMY_TECH};
use crate::statistics::argmax;
use indexmap::IndexMap;
use tracing::{debug, warn};

/// Hourly fuel of the peak day for every fueltype.
pub type FuelPeakDh = [DayHours; NUM_FUELTYPES];

/// Settings shared by every enduse of a simulation year.
#[derive(Clone, Copy, Debug)]
pub struct YearContext<'a> {
    pub base_yr: u32,
    pub curr_yr: u32,
    pub end_yr: u32,
    pub mode: RunMode,
    pub num_days: usize,
    pub assumptions: &'a Assumptions,
}

/// Year-scoped stocks of one region.
#[derive(Clone, Copy, Debug)]
pub struct RegionContext<'a> {
    pub region: &'a str,
    pub climate: ClimateFactors,
    pub technologies: &'a TechnologyStock,
    pub load_profiles: RegionLoadProfiles<'a>,
}

/// Where the scenario driver of an enduse comes from.
#[derive(Clone, Copy)]
pub enum ScenarioDriverSource<'a> {
    DwellingStock(&'a dyn DwellingStock),
    External {
        data: &'a ScenarioData,
        drivers: &'a [ScenarioDriver],
    },
    Unchanged,
}

/// One enduse of one region and sector.
#[derive(Clone, Copy)]
pub struct EnduseInstance<'a> {
    pub submodel: Submodel,
    pub enduse: &'a str,
    pub sector: Option<&'a str>,
    /// Regional base-year fuel.
    pub fuel: FuelVector,
    /// Base-year fuel shares of the technologies; None for enduses without technologies.
    pub fuel_tech_shares: Option<&'a EnduseFuelTechShares>,
    pub service_diffusion: Option<&'a ServiceDiffusion>,
    pub drivers: ScenarioDriverSource<'a>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnduseOutput {
    pub region: String,
    pub submodel: Submodel,
    pub enduse: String,
    pub sector: Option<String>,
    pub fuel_y: FuelVector,
    /// Annual fuel of every technology in the current year.
    pub fuel_tech_y: IndexMap<String, f64>,
    /// Hourly fuel of the modelled days; None for enduses with a flat profile.
    pub fuel_yh: Option<FuelYh>,
    /// Modelled day with the highest demand.
    pub peak_day: Option<usize>,
    pub fuel_peak_dh: FuelPeakDh,
    pub flat_profile: bool,
}

impl EnduseOutput {
    /// Hourly fuel, synthesised as a uniform split of annual fuel for flat-profile enduses.
    pub fn fuel_yh_or_flat(&self, num_days: usize) -> FuelYh {
        match &self.fuel_yh {
            Some(fuel_yh) => fuel_yh.clone(),
            None => flat_fuel_yh(&self.fuel_y, num_days),
        }
    }
}

fn flat_fuel_yh(fuel_y: &FuelVector, num_days: usize) -> FuelYh {
    let mut fuel_yh = FuelYh::zeros(num_days);
    if num_days == 0 {
        return fuel_yh;
    }
    let flat = vec![[1. / (num_days * HOURS_PER_DAY) as f64; HOURS_PER_DAY]; num_days];
    for (fueltype, amount) in fuel_y.iter() {
        fuel_yh.add_distributed(fueltype, &flat, amount);
    }
    fuel_yh
}

/// Convert fuel per technology to energy service. Unconstrained service is valued at base-year
/// efficiencies so that it is comparable across simulation years.
pub fn fuel_to_service(
    enduse: &str,
    fuel_tech: &IndexMap<String, f64>,
    technologies: &TechnologyStock,
    mode: RunMode,
) -> Result<IndexMap<String, f64>, CalculationError> {
    fuel_tech
        .iter()
        .map(|(technology, fuel)| {
            let efficiency = match mode {
                RunMode::Unconstrained => technologies.get(enduse, technology)?.eff_by,
                RunMode::Constrained => 1.,
            };
            Ok((technology.clone(), fuel * efficiency))
        })
        .collect()
}

/// Convert energy service per technology back to fuel with current-year efficiencies.
pub fn service_to_fuel(
    enduse: &str,
    service_tech: &IndexMap<String, f64>,
    technologies: &TechnologyStock,
    mode: RunMode,
) -> Result<IndexMap<String, f64>, CalculationError> {
    service_tech
        .iter()
        .map(|(technology, service)| {
            let efficiency = match mode {
                RunMode::Unconstrained => technologies.get(enduse, technology)?.eff_cy,
                RunMode::Constrained => 1.,
            };
            Ok((technology.clone(), service / efficiency))
        })
        .collect()
}

/// Redistribute service across technologies by the change of their service shares under a
/// switch between the base year and `curr_yr`.
pub fn service_switch(
    service_tech: &IndexMap<String, f64>,
    diffusion: &ServiceDiffusion,
    curr_yr: u32,
) -> IndexMap<String, f64> {
    let total: f64 = service_tech.values().sum();
    if total <= 0. || diffusion.is_noop() {
        return service_tech.clone();
    }

    let shares_cy = diffusion.service_shares_cy(curr_yr);
    let mut clamped = 0.;
    let mut shares: IndexMap<String, f64> = service_tech
        .iter()
        .map(|(technology, service)| {
            let change = match (
                diffusion.technologies().get(technology),
                shares_cy.get(technology),
            ) {
                (Some(diffusion), Some(share_cy)) => share_cy - diffusion.share_by,
                _ => 0.,
            };
            let share = service / total + change;
            if share < 0. {
                clamped -= share;
            }
            (technology.clone(), max_of_2(share, 0.))
        })
        .collect();

    if clamped > NEGATIVE_SERVICE_TOLERANCE {
        warn!("Clamped {clamped} of negative service share after service switch");
    }
    let share_total: f64 = shares.values().sum();
    if share_total > 0. {
        shares
            .values_mut()
            .for_each(|share| *share = *share / share_total * total);
    }
    shares
}

/// How the fuel of a technology reaches the fueltypes.
#[derive(Clone, Copy)]
enum FuelRoute<'a> {
    Single(FuelType),
    Hourly(&'a [(FuelType, Vec<DayHours>)]),
}

impl FuelRoute<'_> {
    fn distribute(&self, fuel_yh: &mut FuelYh, yh: &[DayHours], amount: f64) {
        match self {
            FuelRoute::Single(fueltype) => fuel_yh.add_distributed(*fueltype, yh, amount),
            FuelRoute::Hourly(shares) => {
                for (fueltype, share_yh) in shares.iter() {
                    let shaped: Vec<DayHours> = yh
                        .iter()
                        .zip(share_yh)
                        .map(|(day, share_day)| std::array::from_fn(|h| day[h] * share_day[h]))
                        .collect();
                    fuel_yh.add_distributed(*fueltype, &shaped, amount);
                }
            }
        }
    }

    fn add_peak_day(&self, peak_dh: &mut FuelPeakDh, peak_day: usize, day_fuel: &DayHours) {
        match self {
            FuelRoute::Single(fueltype) => {
                for (hour, value) in peak_dh[fueltype.index()].iter_mut().enumerate() {
                    *value += day_fuel[hour];
                }
            }
            FuelRoute::Hourly(shares) => {
                for (fueltype, share_yh) in shares.iter() {
                    let Some(share_day) = share_yh.get(peak_day) else {
                        continue;
                    };
                    for (hour, value) in peak_dh[fueltype.index()].iter_mut().enumerate() {
                        *value += day_fuel[hour] * share_day[hour];
                    }
                }
            }
        }
    }

    /// Annual share of each fueltype when no load profile weights the hours.
    fn annual_shares(&self) -> Vec<(FuelType, f64)> {
        match self {
            FuelRoute::Single(fueltype) => vec![(*fueltype, 1.)],
            FuelRoute::Hourly(shares) => shares
                .iter()
                .map(|(fueltype, share_yh)| {
                    let hours = (share_yh.len() * HOURS_PER_DAY).max(1) as f64;
                    (*fueltype, share_yh.iter().flatten().sum::<f64>() / hours)
                })
                .collect(),
        }
    }
}

/// Technology fuel ready to be spread over the year.
struct TechFuel<'a> {
    amount: f64,
    route: FuelRoute<'a>,
    profile: Option<&'a LoadProfile>,
    temperature_dependent: bool,
}

pub struct Enduse<'a> {
    instance: EnduseInstance<'a>,
    year: YearContext<'a>,
    region: RegionContext<'a>,
    fuel: FuelVector,
}

impl<'a> Enduse<'a> {
    pub fn new(
        instance: EnduseInstance<'a>,
        year: YearContext<'a>,
        region: RegionContext<'a>,
    ) -> Self {
        Self {
            fuel: instance.fuel,
            instance,
            year,
            region,
        }
    }

    fn is_flat_profile(&self) -> bool {
        self.year
            .assumptions
            .flat_profile_enduses
            .contains(self.instance.enduse)
    }

    fn years_until(&self, yr_until_changed: Option<u32>) -> u32 {
        yr_until_changed.unwrap_or(self.year.end_yr)
    }

    /// Run the full cascade.
    pub fn calculate(mut self) -> Result<EnduseOutput, EnergyDemandError> {
        if self.fuel.total() == 0. {
            return Ok(self.zero_output());
        }

        self.apply_climate();
        self.apply_smart_meter();
        self.apply_enduse_change();
        self.apply_scenario_drivers();
        self.apply_cooled_floorarea();
        self.apply_industry_adjustment();

        let (fuel_tech_y, tech_fuel) = match self.instance.fuel_tech_shares {
            Some(shares) => self.technology_fuel(shares)?,
            None => self.dummy_tech_fuel()?,
        };

        if self.is_flat_profile() {
            return Ok(self.flat_output(fuel_tech_y, &tech_fuel));
        }
        self.hourly_output(fuel_tech_y, &tech_fuel)
    }

    fn apply_climate(&mut self) {
        let assumptions = self.year.assumptions;
        let enduse = self.instance.enduse;
        let factor = if assumptions.heating_enduses.contains(enduse) {
            self.region.climate.heating_factor()
        } else if assumptions.cooling_enduses.contains(enduse) {
            self.region.climate.cooling_factor()
        } else {
            return;
        };
        self.fuel = self.fuel.scaled(factor);
    }

    fn apply_smart_meter(&mut self) {
        let Some(smart_meters) = &self.year.assumptions.smart_meters else {
            return;
        };
        let Some(savings) = smart_meters.savings.get(self.instance.enduse) else {
            return;
        };
        let penetration_cy = diffuse_value(
            DiffusionMethod::Sigmoid,
            self.year.base_yr,
            self.year.curr_yr,
            self.years_until(smart_meters.yr_until_changed),
            smart_meters.penetration_by,
            smart_meters.penetration_ey,
            smart_meters.sigmoid,
        );
        let saved_fraction = (penetration_cy - smart_meters.penetration_by) * savings;
        self.fuel = self.fuel.scaled(1. - saved_fraction);
    }

    fn apply_enduse_change(&mut self) {
        let Some(change) = self
            .year
            .assumptions
            .enduse_overall_change
            .get(self.instance.enduse)
        else {
            return;
        };
        let change_cy = diffuse_value(
            change.diff_method,
            self.year.base_yr,
            self.year.curr_yr,
            self.years_until(change.yr_until_changed),
            0.,
            change.change_ey,
            change.sigmoid,
        );
        self.fuel = self.fuel.scaled(1. + change_cy);
    }

    /// Ratio of the current-year to the base-year scenario driver; 1 when unknown or zero.
    pub fn scenario_driver_factor(&self) -> f64 {
        let region = self.region.region;
        let (base_yr, curr_yr) = (self.year.base_yr, self.year.curr_yr);
        let (by, cy) = match self.instance.drivers {
            ScenarioDriverSource::DwellingStock(stock) => (
                stock.driver_value(region, base_yr, self.instance.enduse),
                stock.driver_value(region, curr_yr, self.instance.enduse),
            ),
            // floor area drivers are rejected for external sources when the corpus is built
            ScenarioDriverSource::External { data, drivers } => (
                driver_product(data, drivers, FloorAreaSource::Residential, region, base_yr),
                driver_product(data, drivers, FloorAreaSource::Residential, region, curr_yr),
            ),
            ScenarioDriverSource::Unchanged => return 1.,
        };
        match (by, cy) {
            (Some(by), Some(cy)) => ratio_or_unity(cy, by),
            _ => {
                debug!(
                    "No scenario driver for '{}' in region '{region}', fuel left unscaled",
                    self.instance.enduse
                );
                1.
            }
        }
    }

    fn apply_scenario_drivers(&mut self) {
        let factor = self.scenario_driver_factor();
        self.fuel = self.fuel.scaled(factor);
    }

    fn apply_cooled_floorarea(&mut self) {
        let assumptions = self.year.assumptions;
        if self.instance.submodel != Submodel::Service
            || !assumptions.cooling_enduses.contains(self.instance.enduse)
        {
            return;
        }
        let Some(cooled) = &assumptions.cooled_floorarea else {
            return;
        };
        let share_cy = linear_diff(
            self.year.base_yr,
            self.year.curr_yr,
            cooled.share_by,
            cooled.share_ey,
            self.years_until(cooled.yr_until_changed)
                .saturating_sub(self.year.base_yr),
        );
        self.fuel = self.fuel.scaled(ratio_or_unity(share_cy, cooled.share_by));
    }

    fn apply_industry_adjustment(&mut self) {
        if self.instance.submodel != Submodel::Industry {
            return;
        }
        let year = self.year;
        let factor: f64 = year
            .assumptions
            .industry_adjustments
            .iter()
            .filter(|adjustment| {
                adjustment.enduse == self.instance.enduse
                    && adjustment
                        .sector
                        .as_deref()
                        .map_or(true, |sector| Some(sector) == self.instance.sector)
            })
            .map(|adjustment| {
                1. + diffuse_value(
                    adjustment.diff_method,
                    year.base_yr,
                    year.curr_yr,
                    self.years_until(adjustment.yr_until_changed),
                    0.,
                    adjustment.change_ey,
                    Default::default(),
                )
            })
            .product();
        self.fuel = self.fuel.scaled(factor);
    }

    fn heat_recovery_factor(&self) -> f64 {
        let Some(recovery) = self.year.assumptions.heat_recovery.get(self.instance.enduse) else {
            return 1.;
        };
        let recovered_cy = diffuse_value(
            DiffusionMethod::Sigmoid,
            self.year.base_yr,
            self.year.curr_yr,
            self.years_until(recovery.yr_until_changed),
            0.,
            recovery.recovered_ey,
            recovery.sigmoid,
        );
        1. - recovered_cy
    }

    fn load_profile(&self, technology: &str) -> Result<&'a LoadProfile, EnergyDemandError> {
        let stock = self.region.load_profiles.stock_for(self.instance.enduse);
        Ok(stock.get_profile(self.instance.enduse, self.instance.sector, technology)?)
    }

    /// Fuel per technology of an enduse with technologies.
    fn technology_fuel(
        &self,
        shares: &EnduseFuelTechShares,
    ) -> Result<(IndexMap<String, f64>, Vec<TechFuel<'a>>), EnergyDemandError> {
        let enduse = self.instance.enduse;
        let technologies = self.region.technologies;
        let mode = self.year.mode;

        let fuel_tech_by = fuel_per_technology(&self.fuel, shares);
        let mut service_tech = fuel_to_service(enduse, &fuel_tech_by, technologies, mode)?;

        let recovery = self.heat_recovery_factor();
        service_tech.values_mut().for_each(|service| *service *= recovery);

        // Switches apply in both run modes; fuel switches act through the same service
        // diffusion and would otherwise never reach unconstrained runs.
        if let Some(diffusion) = self.instance.service_diffusion {
            if self.year.curr_yr != self.year.base_yr {
                service_tech = service_switch(&service_tech, diffusion, self.year.curr_yr);
            }
        }

        let fuel_tech_cy = service_to_fuel(enduse, &service_tech, technologies, mode)?;
        let flat_profile = self.is_flat_profile();

        let mut fuel_tech_y = IndexMap::new();
        let mut tech_fuel = vec![];
        for (name, amount) in fuel_tech_cy {
            if amount == 0. {
                continue;
            }
            let technology = technologies.get(enduse, &name)?;
            let route = match (mode, &technology.fueltype_split) {
                (RunMode::Constrained, _) => FuelRoute::Single(FuelType::Heat),
                (RunMode::Unconstrained, FuelTypeSplit::Single(fueltype)) => {
                    FuelRoute::Single(*fueltype)
                }
                (RunMode::Unconstrained, FuelTypeSplit::Hourly(shares)) => {
                    FuelRoute::Hourly(shares.as_slice())
                }
            };
            let profile = if flat_profile {
                None
            } else {
                Some(self.load_profile(&name)?)
            };
            tech_fuel.push(TechFuel {
                amount,
                route,
                profile,
                temperature_dependent: technology.is_temperature_dependent(),
            });
            fuel_tech_y.insert(name, amount);
        }

        Ok((fuel_tech_y, tech_fuel))
    }

    /// Fuel of an enduse without technologies, spread with the enduse's own profile.
    fn dummy_tech_fuel(
        &self,
    ) -> Result<(IndexMap<String, f64>, Vec<TechFuel<'a>>), EnergyDemandError> {
        let profile = if self.is_flat_profile() {
            None
        } else {
            let profile = self.load_profile(DUMMY_TECH).map_err(|_| {
                CalculationError::EnduseWithoutProfile {
                    region: self.region.region.to_string(),
                    enduse: self.instance.enduse.to_string(),
                }
            })?;
            Some(profile)
        };

        let tech_fuel = self
            .fuel
            .iter()
            .filter(|(_, amount)| *amount != 0.)
            .map(|(fueltype, amount)| TechFuel {
                amount,
                route: FuelRoute::Single(fueltype),
                profile,
                temperature_dependent: false,
            })
            .collect();

        Ok((
            IndexMap::from([(DUMMY_TECH.to_string(), self.fuel.total())]),
            tech_fuel,
        ))
    }

    fn output(
        &self,
        fuel_y: FuelVector,
        fuel_tech_y: IndexMap<String, f64>,
        fuel_yh: Option<FuelYh>,
        peak_day: Option<usize>,
        fuel_peak_dh: FuelPeakDh,
    ) -> EnduseOutput {
        EnduseOutput {
            region: self.region.region.to_string(),
            submodel: self.instance.submodel,
            enduse: self.instance.enduse.to_string(),
            sector: self.instance.sector.map(str::to_string),
            fuel_y,
            fuel_tech_y,
            fuel_yh,
            peak_day,
            fuel_peak_dh,
            flat_profile: self.is_flat_profile(),
        }
    }

    fn zero_output(&self) -> EnduseOutput {
        let fuel_yh = (!self.is_flat_profile()).then(|| FuelYh::zeros(self.year.num_days));
        self.output(
            FuelVector::zeros(),
            IndexMap::new(),
            fuel_yh,
            None,
            [[0.; HOURS_PER_DAY]; NUM_FUELTYPES],
        )
    }

    fn flat_output(
        &self,
        fuel_tech_y: IndexMap<String, f64>,
        tech_fuel: &[TechFuel],
    ) -> EnduseOutput {
        let mut fuel_y = FuelVector::zeros();
        for tech in tech_fuel {
            for (fueltype, share) in tech.route.annual_shares() {
                fuel_y[fueltype] += tech.amount * share;
            }
        }

        let hours = (self.year.num_days.max(1) * HOURS_PER_DAY) as f64;
        let fuel_peak_dh =
            std::array::from_fn(|idx| [fuel_y.values()[idx] / hours; HOURS_PER_DAY]);
        self.output(fuel_y, fuel_tech_y, None, None, fuel_peak_dh)
    }

    fn hourly_output(
        &self,
        fuel_tech_y: IndexMap<String, f64>,
        tech_fuel: &[TechFuel],
    ) -> Result<EnduseOutput, EnergyDemandError> {
        let mut fuel_yh = FuelYh::zeros(self.year.num_days);
        for tech in tech_fuel {
            if let Some(profile) = tech.profile {
                tech.route.distribute(&mut fuel_yh, &profile.yh, tech.amount);
            }
        }

        let peak_day = argmax(&fuel_yh.daily_totals_all_fueltypes());
        let mut fuel_peak_dh = [[0.; HOURS_PER_DAY]; NUM_FUELTYPES];
        if let Some(peak_day) = peak_day {
            for tech in tech_fuel {
                let Some(profile) = tech.profile else {
                    continue;
                };
                let day_fuel: DayHours = if tech.temperature_dependent {
                    profile.yh[peak_day].map(|share| share * tech.amount)
                } else {
                    profile
                        .peak_dh
                        .map(|share| share * profile.peak_yd_factor * tech.amount)
                };
                tech.route.add_peak_day(&mut fuel_peak_dh, peak_day, &day_fuel);
            }
        }

        let mut peak_day = peak_day;
        if let Some(demand_management) = self
            .year
            .assumptions
            .demand_management
            .get(self.instance.enduse)
        {
            let improvement = load_factor_improvement_cy(
                demand_management,
                self.year.base_yr,
                self.year.curr_yr,
                self.year.end_yr,
            );
            if improvement > 0. {
                shape_load_factor(&mut fuel_yh, improvement);
                peak_day = argmax(&fuel_yh.daily_totals_all_fueltypes());
                if let Some(peak_day) = peak_day {
                    fuel_peak_dh = fuel_yh.day(peak_day);
                }
            }
        }

        Ok(self.output(
            fuel_yh.annual(),
            fuel_tech_y,
            Some(fuel_yh),
            peak_day,
            fuel_peak_dh,
        ))
    }
}

/// Annual fuel of every fueltype summed over several enduse outputs.
pub fn sum_fuel_y<'b>(outputs: impl IntoIterator<Item = &'b EnduseOutput>) -> FuelVector {
    let mut total = FuelVector::zeros();
    for output in outputs {
        total += output.fuel_y;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diffusion::SigmoidShape;
    use crate::core::load_profiles::{LoadProfileStock, RegionLoadProfiles};
    use crate::core::solvers::FitCriteria;
    use crate::core::switches::{complete_with_placeholders, EnduseSwitches};
    use crate::core::technologies::TechnologyAssumptions;
    use crate::external_conditions::{ExternalConditions, YearBaseTemperatures};
    use crate::input::{
        DemandManagement, ServiceSwitch, SmartMeterAssumptions, TechType, TechnologyInput,
    };
    use approx::assert_relative_eq;
    use indexmap::IndexSet;
    use pretty_assertions::assert_eq;
    use rstest::*;

    const ENDUSE: &str = "rs_space_heating";
    const NUM_DAYS: usize = 2;

    fn technology(name: &str, fueltype: FuelType, eff_by: f64, eff_ey: f64) -> TechnologyInput {
        TechnologyInput {
            name: name.to_string(),
            fueltype,
            eff_by,
            eff_ey,
            year_eff_ey: 2050,
            eff_achieved: 1.,
            diff_method: DiffusionMethod::Linear,
            market_entry: None,
            tech_max_share: 1.,
            tech_type: TechType::Boiler,
            description: None,
            cop_slope: None,
            hybrid: None,
        }
    }

    fn definitions() -> IndexMap<String, TechnologyInput> {
        [
            technology("boiler_gas", FuelType::Gas, 0.8, 0.9),
            technology("storage_heater", FuelType::Electricity, 1., 1.),
        ]
        .into_iter()
        .map(|definition| (definition.name.clone(), definition))
        .collect()
    }

    fn conditions() -> ExternalConditions {
        let temperatures = vec![[5.; HOURS_PER_DAY], [0.; HOURS_PER_DAY]];
        let base_temperatures = YearBaseTemperatures {
            heating: 15.5,
            cooling: 21.,
        };
        ExternalConditions {
            region: "region_a".to_string(),
            weather_station: "station".to_string(),
            temperatures_by: temperatures.clone(),
            temperatures_cy: temperatures,
            base_temperatures_by: base_temperatures,
            base_temperatures_cy: base_temperatures,
        }
    }

    fn fuel_tech_shares() -> EnduseFuelTechShares {
        let mut shares = IndexMap::from([
            (
                FuelType::Gas,
                IndexMap::from([("boiler_gas".to_string(), 1.)]),
            ),
            (
                FuelType::Electricity,
                IndexMap::from([("storage_heater".to_string(), 1.)]),
            ),
        ]);
        complete_with_placeholders(&mut shares);
        shares
    }

    fn peak_dh() -> DayHours {
        let mut dh = [1.; HOURS_PER_DAY];
        dh[7] = 4.;
        dh
    }

    struct Fixture {
        assumptions: Assumptions,
        technologies: TechnologyStock,
        non_regional: LoadProfileStock,
        regional: LoadProfileStock,
        shares: EnduseFuelTechShares,
    }

    impl Fixture {
        fn new(curr_yr: u32) -> Self {
            let shares = fuel_tech_shares();
            let enduse_technologies = IndexMap::from([(
                ENDUSE.to_string(),
                shares
                    .values()
                    .flat_map(|technologies| technologies.keys().cloned())
                    .collect::<IndexSet<_>>(),
            )]);
            let technologies = TechnologyStock::new(
                "region_a",
                &definitions(),
                &enduse_technologies,
                &TechnologyAssumptions {
                    heat_pump_cop_slope: -0.08,
                    efficiency_diffusion: SigmoidShape::default(),
                },
                2015,
                curr_yr,
                &conditions(),
            )
            .unwrap();

            let mut dh = [1.; HOURS_PER_DAY];
            dh[18] = 3.;
            let mut non_regional = LoadProfileStock::new("non_regional_lp_stock");
            non_regional.add_profile(
                LoadProfile::from_shapes("heating", &[1., 3.], &dh, Some(&peak_dh())).unwrap(),
                &[DUMMY_TECH.to_string()],
                &[ENDUSE.to_string(), "rs_lighting".to_string()],
                &[],
            );

            Self {
                assumptions: Assumptions {
                    heating_enduses: IndexSet::from([ENDUSE.to_string()]),
                    ..Default::default()
                },
                technologies,
                non_regional,
                regional: LoadProfileStock::new("regional_lp_stock"),
                shares,
            }
        }

        fn run(
            &self,
            instance: EnduseInstance<'_>,
            curr_yr: u32,
            mode: RunMode,
            climate: ClimateFactors,
        ) -> Result<EnduseOutput, EnergyDemandError> {
            let year = YearContext {
                base_yr: 2015,
                curr_yr,
                end_yr: 2050,
                mode,
                num_days: NUM_DAYS,
                assumptions: &self.assumptions,
            };
            let region = RegionContext {
                region: "region_a",
                climate,
                technologies: &self.technologies,
                load_profiles: RegionLoadProfiles {
                    non_regional: &self.non_regional,
                    regional: &self.regional,
                },
            };
            Enduse::new(instance, year, region).calculate()
        }

        fn instance(&self, fuel: FuelVector) -> EnduseInstance<'_> {
            EnduseInstance {
                submodel: Submodel::Residential,
                enduse: ENDUSE,
                sector: None,
                fuel,
                fuel_tech_shares: Some(&self.shares),
                service_diffusion: None,
                drivers: ScenarioDriverSource::Unchanged,
            }
        }
    }

    fn unchanged_climate() -> ClimateFactors {
        ClimateFactors {
            hdd_by: 100.,
            hdd_cy: 100.,
            cdd_by: 0.,
            cdd_cy: 0.,
        }
    }

    #[rstest]
    fn boiler_fuel_follows_efficiency_and_profile() {
        let fixture = Fixture::new(2050);
        let fuel = FuelVector::single(FuelType::Gas, 1000.);

        let output = fixture
            .run(
                fixture.instance(fuel),
                2050,
                RunMode::Unconstrained,
                unchanged_climate(),
            )
            .unwrap();

        let expected = 1000. * 0.8 / 0.9;
        assert_relative_eq!(output.fuel_y[FuelType::Gas], expected, max_relative = 1e-12);
        assert_relative_eq!(output.fuel_tech_y["boiler_gas"], expected, max_relative = 1e-12);
        let fuel_yh = output.fuel_yh.as_ref().unwrap();
        assert_relative_eq!(
            fuel_yh.annual_total(FuelType::Gas),
            expected,
            max_relative = 1e-12
        );

        // second day carries three quarters of the demand
        assert_eq!(output.peak_day, Some(1));
        let profile = fixture
            .non_regional
            .get_profile(ENDUSE, None, "boiler_gas")
            .unwrap();
        let peak = output.fuel_peak_dh[FuelType::Gas.index()];
        for hour in 0..HOURS_PER_DAY {
            assert_relative_eq!(
                peak[hour],
                expected * profile.peak_yd_factor * profile.peak_dh[hour],
                max_relative = 1e-12
            );
        }
        let peak_hour_value = peak.iter().copied().fold(f64::MIN, f64::max);
        assert_eq!(peak_hour_value, peak[7]);
    }

    #[rstest]
    fn zero_fuel_short_circuits() {
        let fixture = Fixture::new(2030);
        let output = fixture
            .run(
                fixture.instance(FuelVector::zeros()),
                2030,
                RunMode::Unconstrained,
                unchanged_climate(),
            )
            .unwrap();

        assert_eq!(output.fuel_y, FuelVector::zeros());
        assert_eq!(output.fuel_yh, Some(FuelYh::zeros(NUM_DAYS)));
        assert_eq!(output.peak_day, None);
    }

    #[rstest]
    fn fuel_service_round_trip_is_identity_for_constant_efficiency() {
        let fixture = Fixture::new(2030);
        let fuel_tech = IndexMap::from([("storage_heater".to_string(), 123.4)]);

        let service = fuel_to_service(
            ENDUSE,
            &fuel_tech,
            &fixture.technologies,
            RunMode::Unconstrained,
        )
        .unwrap();
        let fuel = service_to_fuel(ENDUSE, &service, &fixture.technologies, RunMode::Unconstrained)
            .unwrap();

        assert_eq!(fuel, fuel_tech);
    }

    #[rstest]
    fn heating_fuel_scales_with_degree_days() {
        let fixture = Fixture::new(2015);
        let climate = ClimateFactors {
            hdd_by: 100.,
            hdd_cy: 80.,
            ..unchanged_climate()
        };

        let output = fixture
            .run(
                fixture.instance(FuelVector::single(FuelType::Electricity, 100.)),
                2015,
                RunMode::Unconstrained,
                climate,
            )
            .unwrap();

        assert_relative_eq!(output.fuel_y[FuelType::Electricity], 80., max_relative = 1e-12);
    }

    #[rstest]
    fn constrained_mode_hands_over_heat() {
        let fixture = Fixture::new(2050);
        let mut fuel = FuelVector::single(FuelType::Gas, 600.);
        fuel[FuelType::Electricity] = 400.;

        let output = fixture
            .run(
                fixture.instance(fuel),
                2050,
                RunMode::Constrained,
                unchanged_climate(),
            )
            .unwrap();

        assert_relative_eq!(output.fuel_y[FuelType::Heat], 1000., max_relative = 1e-12);
        assert_eq!(output.fuel_y[FuelType::Gas], 0.);
        assert_eq!(output.fuel_y[FuelType::Electricity], 0.);
    }

    #[rstest]
    fn flat_profile_enduse_synthesises_hours_on_request() {
        let mut fixture = Fixture::new(2015);
        fixture.assumptions.flat_profile_enduses = IndexSet::from([ENDUSE.to_string()]);

        let output = fixture
            .run(
                fixture.instance(FuelVector::single(FuelType::Electricity, 480.)),
                2015,
                RunMode::Unconstrained,
                unchanged_climate(),
            )
            .unwrap();

        assert!(output.flat_profile);
        assert_eq!(output.fuel_yh, None);
        let fuel_yh = output.fuel_yh_or_flat(NUM_DAYS);
        assert_relative_eq!(fuel_yh.fueltype(FuelType::Electricity)[1][5], 10.);
        assert_relative_eq!(fuel_yh.annual_total(FuelType::Electricity), 480.);
    }

    #[rstest]
    fn dummy_tech_enduse_requires_profile() {
        let fixture = Fixture::new(2015);
        let mut instance = fixture.instance(FuelVector::single(FuelType::Gas, 10.));
        instance.enduse = "rs_cooking";
        instance.fuel_tech_shares = None;

        let result = fixture.run(instance, 2015, RunMode::Unconstrained, unchanged_climate());
        assert!(matches!(
            result,
            Err(EnergyDemandError::FailureInCalculation(
                CalculationError::EnduseWithoutProfile { .. }
            ))
        ));

        instance.enduse = "rs_lighting";
        let output = fixture
            .run(instance, 2015, RunMode::Unconstrained, unchanged_climate())
            .unwrap();
        assert_relative_eq!(output.fuel_y[FuelType::Gas], 10., max_relative = 1e-12);
        assert_eq!(output.fuel_tech_y[DUMMY_TECH], 10.);
    }

    #[rstest]
    fn demand_management_shaves_peak_without_losing_energy() {
        let mut fixture = Fixture::new(2015);
        let fuel = FuelVector::single(FuelType::Electricity, 1000.);
        let unmanaged = fixture
            .run(
                fixture.instance(fuel),
                2030,
                RunMode::Unconstrained,
                unchanged_climate(),
            )
            .unwrap();

        fixture.assumptions.demand_management = IndexMap::from([(
            ENDUSE.to_string(),
            DemandManagement {
                load_factor_improvement_ey: 0.5,
                yr_until_changed: None,
            },
        )]);
        let managed = fixture
            .run(
                fixture.instance(fuel),
                2030,
                RunMode::Unconstrained,
                unchanged_climate(),
            )
            .unwrap();

        assert_relative_eq!(
            managed.fuel_y[FuelType::Electricity],
            unmanaged.fuel_y[FuelType::Electricity],
            max_relative = 1e-12
        );
        let peak_hour = |output: &EnduseOutput| {
            output.fuel_yh.as_ref().unwrap().fueltype(FuelType::Electricity)[1]
                .iter()
                .copied()
                .fold(f64::MIN, f64::max)
        };
        assert!(peak_hour(&managed) < peak_hour(&unmanaged));
        assert_eq!(
            managed.fuel_peak_dh,
            managed.fuel_yh.as_ref().unwrap().day(1)
        );
    }

    #[rstest]
    fn smart_meters_save_fuel() {
        let mut fixture = Fixture::new(2050);
        fixture.assumptions.smart_meters = Some(SmartMeterAssumptions {
            penetration_by: 0.1,
            penetration_ey: 0.9,
            yr_until_changed: None,
            sigmoid: SigmoidShape::default(),
            savings: IndexMap::from([(ENDUSE.to_string(), 0.05)]),
        });

        let output = fixture
            .run(
                fixture.instance(FuelVector::single(FuelType::Electricity, 1000.)),
                2050,
                RunMode::Unconstrained,
                unchanged_climate(),
            )
            .unwrap();

        assert_relative_eq!(
            output.fuel_y[FuelType::Electricity],
            1000. * (1. - 0.8 * 0.05),
            max_relative = 1e-12
        );
    }

    #[rstest]
    fn unchanged_service_shares_are_not_switched() {
        let fixture = Fixture::new(2030);
        let switch = ServiceSwitch {
            enduse: ENDUSE.to_string(),
            sector: None,
            technology_install: "boiler_gas".to_string(),
            service_share_ey: 0.4,
            switch_yr: 2050,
        };
        let mut fuel = FuelVector::single(FuelType::Gas, 500.);
        fuel[FuelType::Electricity] = 600.;
        let diffusion = ServiceDiffusion::fit(
            ENDUSE,
            &EnduseSwitches::Service(vec![switch]),
            &fuel,
            &fixture.shares,
            &definitions(),
            2015,
            &FitCriteria::default(),
        )
        .unwrap();
        assert!(diffusion.is_noop());

        let service_tech = IndexMap::from([
            ("boiler_gas".to_string(), 400.),
            ("storage_heater".to_string(), 600.),
        ]);
        for year in [2020, 2040, 2060] {
            let switched = service_switch(&service_tech, &diffusion, year);
            assert_relative_eq!(switched["boiler_gas"], 400., max_relative = 1e-9);
            assert_relative_eq!(switched["storage_heater"], 600., max_relative = 1e-9);
        }
    }

    #[rstest]
    fn service_switch_moves_service_between_technologies() {
        let fixture = Fixture::new(2050);
        let switch = ServiceSwitch {
            enduse: ENDUSE.to_string(),
            sector: None,
            technology_install: "storage_heater".to_string(),
            service_share_ey: 0.8,
            switch_yr: 2050,
        };
        let mut fuel = FuelVector::single(FuelType::Gas, 500.);
        fuel[FuelType::Electricity] = 600.;
        let diffusion = ServiceDiffusion::fit(
            ENDUSE,
            &EnduseSwitches::Service(vec![switch]),
            &fuel,
            &fixture.shares,
            &definitions(),
            2015,
            &FitCriteria::default(),
        )
        .unwrap();

        let mut instance = fixture.instance(fuel);
        instance.service_diffusion = Some(&diffusion);
        let output = fixture
            .run(instance, 2050, RunMode::Unconstrained, unchanged_climate())
            .unwrap();

        // 1000 units of service, 800 of which delivered by storage heaters in 2050
        assert_relative_eq!(
            output.fuel_tech_y["storage_heater"],
            800.,
            max_relative = 1e-9
        );
        assert_relative_eq!(output.fuel_tech_y["boiler_gas"], 200. / 0.9, max_relative = 1e-9);
    }
}
