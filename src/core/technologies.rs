//! Technologies of a region in one simulation year, with their base-year and current-year
//! efficiencies.

use crate::compare_floats::max_of_2;
use crate::core::diffusion::{diffuse_value, SigmoidShape};
use crate::core::fuel_types::FuelType;
use crate::core::units::{DayHours, HOURS_PER_DAY};
use crate::errors::{CalculationError, ConfigurationError};
use crate::external_conditions::{heating_degree_hours, ExternalConditions};
use crate::input::{TechType, TechnologyInput};
use indexmap::{IndexMap, IndexSet};
use std::str::FromStr;

const PLACEHOLDER_PREFIX: &str = "placeholder_";
/// Heat pumps never perform worse than direct electric heating.
const MIN_HEAT_PUMP_COP: f64 = 1.;

pub fn placeholder_tech_name(fueltype: FuelType) -> String {
    format!("{PLACEHOLDER_PREFIX}{fueltype}")
}

pub fn placeholder_fueltype(technology: &str) -> Option<FuelType> {
    technology
        .strip_prefix(PLACEHOLDER_PREFIX)
        .and_then(|fueltype| FuelType::from_str(fueltype).ok())
}

/// How the fuel of a technology is split across fueltypes.
#[derive(Clone, Debug, PartialEq)]
pub enum FuelTypeSplit {
    Single(FuelType),
    /// Share of the technology's fuel going to each fueltype in every hour. Shares of an hour
    /// sum to 1.
    Hourly(Vec<(FuelType, Vec<DayHours>)>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Technology {
    pub name: String,
    pub fueltype: FuelType,
    pub tech_type: TechType,
    pub eff_by: f64,
    pub eff_cy: f64,
    pub tech_max_share: f64,
    pub market_entry: Option<u32>,
    /// Hourly efficiency in the current year of temperature dependent technologies.
    pub eff_cy_yh: Option<Vec<DayHours>>,
    pub fueltype_split: FuelTypeSplit,
}

impl Technology {
    fn placeholder(name: &str, fueltype: FuelType) -> Self {
        Self {
            name: name.to_string(),
            fueltype,
            tech_type: TechType::Placeholder,
            eff_by: 1.,
            eff_cy: 1.,
            tech_max_share: 1.,
            market_entry: None,
            eff_cy_yh: None,
            fueltype_split: FuelTypeSplit::Single(fueltype),
        }
    }

    /// Technologies whose efficiency, and therefore load shape, depends on outdoor temperature.
    pub fn is_temperature_dependent(&self) -> bool {
        matches!(self.tech_type, TechType::HeatPump | TechType::Hybrid)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TechAttribute {
    EffBy,
    EffCy,
    FueltypeInt,
    TechType,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TechAttributeValue {
    Float(f64),
    Int(usize),
    TechType(TechType),
}

/// Settings shared by all technologies of a stock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TechnologyAssumptions {
    pub heat_pump_cop_slope: f64,
    pub efficiency_diffusion: SigmoidShape,
}

#[derive(Clone, Debug)]
pub struct TechnologyStock {
    region: String,
    technologies: IndexMap<String, Technology>,
    enduse_technologies: IndexMap<String, IndexSet<String>>,
}

impl TechnologyStock {
    /// Build the stock of the technologies used by `enduse_technologies` in a region and year.
    pub fn new(
        region: &str,
        definitions: &IndexMap<String, TechnologyInput>,
        enduse_technologies: &IndexMap<String, IndexSet<String>>,
        assumptions: &TechnologyAssumptions,
        base_yr: u32,
        curr_yr: u32,
        conditions: &ExternalConditions,
    ) -> Result<Self, ConfigurationError> {
        let mut technologies: IndexMap<String, Technology> = Default::default();

        for (enduse, names) in enduse_technologies {
            for name in names {
                if technologies.contains_key(name) {
                    continue;
                }
                let technology = match placeholder_fueltype(name) {
                    Some(fueltype) => Technology::placeholder(name, fueltype),
                    None => {
                        let definition = definitions.get(name).ok_or_else(|| {
                            ConfigurationError::UnknownTechnology {
                                enduse: enduse.clone(),
                                technology: name.clone(),
                            }
                        })?;
                        build_technology(
                            definition,
                            definitions,
                            assumptions,
                            base_yr,
                            curr_yr,
                            conditions,
                        )?
                    }
                };
                technologies.insert(name.clone(), technology);
            }
        }

        Ok(Self {
            region: region.to_string(),
            technologies,
            enduse_technologies: enduse_technologies.clone(),
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn get(&self, enduse: &str, technology: &str) -> Result<&Technology, CalculationError> {
        self.enduse_technologies
            .get(enduse)
            .filter(|names| names.contains(technology))
            .and_then(|_| self.technologies.get(technology))
            .ok_or_else(|| CalculationError::TechnologyNotInStock {
                region: self.region.clone(),
                enduse: enduse.to_string(),
                technology: technology.to_string(),
            })
    }

    pub fn get_attr(
        &self,
        enduse: &str,
        technology: &str,
        attribute: TechAttribute,
    ) -> Result<TechAttributeValue, CalculationError> {
        let technology = self.get(enduse, technology)?;
        Ok(match attribute {
            TechAttribute::EffBy => TechAttributeValue::Float(technology.eff_by),
            TechAttribute::EffCy => TechAttributeValue::Float(technology.eff_cy),
            TechAttribute::FueltypeInt => TechAttributeValue::Int(technology.fueltype.index()),
            TechAttribute::TechType => TechAttributeValue::TechType(technology.tech_type),
        })
    }

    /// Technology of the stock regardless of the enduses using it.
    pub fn technology(&self, technology: &str) -> Option<&Technology> {
        self.technologies.get(technology)
    }
}

/// Current-year efficiency of a technology diffusing from its base-year to its end-year
/// efficiency, of which only the achieved fraction materialises.
pub fn efficiency_cy(
    definition: &TechnologyInput,
    base_yr: u32,
    curr_yr: u32,
    sigmoid: SigmoidShape,
) -> f64 {
    let theoretical = diffuse_value(
        definition.diff_method,
        base_yr,
        curr_yr,
        definition.year_eff_ey,
        definition.eff_by,
        definition.eff_ey,
        sigmoid,
    );
    definition.eff_by + definition.eff_achieved * (theoretical - definition.eff_by)
}

/// Hourly coefficient of performance of a heat pump with nameplate efficiency `intercept`.
pub fn heat_pump_cop_yh(
    temperatures: &[DayHours],
    t_base_heating: f64,
    intercept: f64,
    slope: f64,
) -> Vec<DayHours> {
    temperatures
        .iter()
        .map(|day| {
            day.map(|temperature| {
                let temp_diff = max_of_2(t_base_heating - temperature, 0.);
                max_of_2(intercept + slope * temp_diff, MIN_HEAT_PUMP_COP)
            })
        })
        .collect()
}

/// Average of hourly values weighted with heating degree hours. Without any heating degree
/// hours the plain mean is returned.
fn heating_weighted_average(values: &[DayHours], weights: &[DayHours]) -> f64 {
    let total_weight: f64 = weights.iter().flatten().sum();
    if total_weight == 0. {
        let count = (values.len() * HOURS_PER_DAY) as f64;
        return values.iter().flatten().sum::<f64>() / count;
    }
    values
        .iter()
        .flatten()
        .zip(weights.iter().flatten())
        .map(|(value, weight)| value * weight)
        .sum::<f64>()
        / total_weight
}

fn build_technology(
    definition: &TechnologyInput,
    definitions: &IndexMap<String, TechnologyInput>,
    assumptions: &TechnologyAssumptions,
    base_yr: u32,
    curr_yr: u32,
    conditions: &ExternalConditions,
) -> Result<Technology, ConfigurationError> {
    let mut technology = Technology {
        name: definition.name.clone(),
        fueltype: definition.fueltype,
        tech_type: definition.tech_type,
        eff_by: definition.eff_by,
        eff_cy: efficiency_cy(
            definition,
            base_yr,
            curr_yr,
            assumptions.efficiency_diffusion,
        ),
        tech_max_share: definition.tech_max_share,
        market_entry: definition.market_entry,
        eff_cy_yh: None,
        fueltype_split: FuelTypeSplit::Single(definition.fueltype),
    };

    match definition.tech_type {
        TechType::Placeholder => {
            technology.eff_by = 1.;
            technology.eff_cy = 1.;
        }
        TechType::HeatPump => {
            let profile = HeatPumpProfile::new(
                definition,
                assumptions,
                base_yr,
                curr_yr,
                conditions,
            );
            technology.eff_by = profile.eff_by;
            technology.eff_cy = profile.eff_cy;
            technology.eff_cy_yh = Some(profile.eff_cy_yh);
        }
        TechType::Hybrid => {
            let hybrid = HybridProfile::new(
                definition,
                definitions,
                assumptions,
                base_yr,
                curr_yr,
                conditions,
            )?;
            technology.eff_by = hybrid.eff_by;
            technology.eff_cy = hybrid.eff_cy;
            technology.eff_cy_yh = Some(hybrid.eff_cy_yh);
            technology.fueltype_split = hybrid.fueltype_split;
        }
        _ => {}
    }

    Ok(technology)
}

struct HeatPumpProfile {
    eff_by: f64,
    eff_cy: f64,
    eff_by_yh: Vec<DayHours>,
    eff_cy_yh: Vec<DayHours>,
}

impl HeatPumpProfile {
    fn new(
        definition: &TechnologyInput,
        assumptions: &TechnologyAssumptions,
        base_yr: u32,
        curr_yr: u32,
        conditions: &ExternalConditions,
    ) -> Self {
        let slope = definition
            .cop_slope
            .unwrap_or(assumptions.heat_pump_cop_slope);
        // the nameplate efficiency diffuses, the temperature dependency is applied on top
        let intercept_cy = efficiency_cy(
            definition,
            base_yr,
            curr_yr,
            assumptions.efficiency_diffusion,
        );
        let t_base_by = conditions.base_temperatures_by.heating;
        let t_base_cy = conditions.base_temperatures_cy.heating;

        let eff_by_yh = heat_pump_cop_yh(
            &conditions.temperatures_by,
            t_base_by,
            definition.eff_by,
            slope,
        );
        let eff_cy_yh =
            heat_pump_cop_yh(&conditions.temperatures_cy, t_base_cy, intercept_cy, slope);

        let eff_by = heating_weighted_average(
            &eff_by_yh,
            &heating_degree_hours(&conditions.temperatures_by, t_base_by),
        );
        let eff_cy = heating_weighted_average(
            &eff_cy_yh,
            &heating_degree_hours(&conditions.temperatures_cy, t_base_cy),
        );

        Self {
            eff_by,
            eff_cy,
            eff_by_yh,
            eff_cy_yh,
        }
    }
}

/// Hourly efficiency of a component technology of a hybrid.
fn component_efficiency_yh(
    component: &TechnologyInput,
    assumptions: &TechnologyAssumptions,
    base_yr: u32,
    curr_yr: u32,
    conditions: &ExternalConditions,
) -> (Vec<DayHours>, Vec<DayHours>) {
    match component.tech_type {
        TechType::HeatPump => {
            let profile =
                HeatPumpProfile::new(component, assumptions, base_yr, curr_yr, conditions);
            (profile.eff_by_yh, profile.eff_cy_yh)
        }
        _ => {
            let num_days = conditions.temperatures_cy.len();
            let eff_cy =
                efficiency_cy(component, base_yr, curr_yr, assumptions.efficiency_diffusion);
            (
                vec![[component.eff_by; HOURS_PER_DAY]; num_days],
                vec![[eff_cy; HOURS_PER_DAY]; num_days],
            )
        }
    }
}

struct HybridProfile {
    eff_by: f64,
    eff_cy: f64,
    eff_cy_yh: Vec<DayHours>,
    fueltype_split: FuelTypeSplit,
}

impl HybridProfile {
    fn new(
        definition: &TechnologyInput,
        definitions: &IndexMap<String, TechnologyInput>,
        assumptions: &TechnologyAssumptions,
        base_yr: u32,
        curr_yr: u32,
        conditions: &ExternalConditions,
    ) -> Result<Self, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidHybridTechnology {
            technology: definition.name.clone(),
            reason,
        };
        let hybrid = definition
            .hybrid
            .as_ref()
            .ok_or_else(|| invalid("no hybrid components given".to_string()))?;
        let component = |name: &str| {
            definitions
                .get(name)
                .filter(|component| component.tech_type != TechType::Hybrid)
                .ok_or_else(|| {
                    invalid(format!("component '{name}' is not a non-hybrid technology"))
                })
        };
        let low = component(&hybrid.tech_low_temp)?;
        let high = component(&hybrid.tech_high_temp)?;

        let (low_by_yh, low_cy_yh) =
            component_efficiency_yh(low, assumptions, base_yr, curr_yr, conditions);
        let (high_by_yh, high_cy_yh) =
            component_efficiency_yh(high, assumptions, base_yr, curr_yr, conditions);

        let low_active = |temperatures: &[DayHours]| -> Vec<[bool; HOURS_PER_DAY]> {
            temperatures
                .iter()
                .map(|day| day.map(|temperature| temperature >= hybrid.switch_temperature))
                .collect()
        };
        let low_active_by = low_active(&conditions.temperatures_by);
        let low_active_cy = low_active(&conditions.temperatures_cy);

        let eff_by = Self::service_weighted_efficiency(
            &low_active_by,
            &low_by_yh,
            &high_by_yh,
            &heating_degree_hours(
                &conditions.temperatures_by,
                conditions.base_temperatures_by.heating,
            ),
        );
        let eff_cy = Self::service_weighted_efficiency(
            &low_active_cy,
            &low_cy_yh,
            &high_cy_yh,
            &heating_degree_hours(
                &conditions.temperatures_cy,
                conditions.base_temperatures_cy.heating,
            ),
        );

        let eff_cy_yh: Vec<DayHours> = low_active_cy
            .iter()
            .zip(low_cy_yh.iter().zip(&high_cy_yh))
            .map(|(active, (low_day, high_day))| {
                std::array::from_fn(|h| if active[h] { low_day[h] } else { high_day[h] })
            })
            .collect();

        let fueltype_split = if low.fueltype == high.fueltype {
            FuelTypeSplit::Single(low.fueltype)
        } else {
            let indicator = |use_low: bool| -> Vec<DayHours> {
                low_active_cy
                    .iter()
                    .map(|day| day.map(|active| if active == use_low { 1. } else { 0. }))
                    .collect()
            };
            FuelTypeSplit::Hourly(vec![
                (low.fueltype, indicator(true)),
                (high.fueltype, indicator(false)),
            ])
        };

        Ok(Self {
            eff_by,
            eff_cy,
            eff_cy_yh,
            fueltype_split,
        })
    }

    /// Service delivered divided by fuel used, with heating degree hours as service weights.
    fn service_weighted_efficiency(
        low_active: &[[bool; HOURS_PER_DAY]],
        low_eff: &[DayHours],
        high_eff: &[DayHours],
        degree_hours: &[DayHours],
    ) -> f64 {
        let total_weight: f64 = degree_hours.iter().flatten().sum();
        let uniform = total_weight == 0.;

        let mut service = 0.;
        let mut fuel = 0.;
        for (day, active_day) in low_active.iter().enumerate() {
            for (hour, &active) in active_day.iter().enumerate() {
                let weight = if uniform { 1. } else { degree_hours[day][hour] };
                let eff = if active {
                    low_eff[day][hour]
                } else {
                    high_eff[day][hour]
                };
                service += weight;
                fuel += weight / eff;
            }
        }

        if fuel == 0. {
            1.
        } else {
            service / fuel
        }
    }
}
