//! Disaggregation of national base-year fuel onto regions.
//!
//! Regions without floor area data are served first with a population based weighting, the
//! remaining fuel is then split across regions with floor area data. Industry fuel follows
//! sector employment where a mapping onto employment sectors exists.

use crate::core::fuel_types::FuelVector;
use crate::core::units::EnergyUnit;
use crate::errors::{ConfigurationError, EnergyDemandError, InvariantViolation};
use crate::input::{EnduseFuelInput, ScenarioData, Submodel};
use indexmap::{IndexMap, IndexSet};
use tracing::warn;

/// Relative tolerance within which regional fuel must add up to national fuel.
pub const CONSERVATION_TOLERANCE: f64 = 1e-3;

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RegionEnduseSectorKey {
    pub region: String,
    pub enduse: String,
    pub sector: Option<String>,
}

pub type RegionalFuel = IndexMap<RegionEnduseSectorKey, FuelVector>;

/// Regional data used to weight national fuel.
#[derive(Clone, Debug)]
pub struct DisaggregationContext<'a> {
    pub base_yr: u32,
    pub regions: Vec<String>,
    pub data: &'a ScenarioData,
    /// Annual base-year heating degree days per region.
    pub hdd: IndexMap<String, f64>,
    /// Annual base-year cooling degree days per region.
    pub cdd: IndexMap<String, f64>,
    pub heating_enduses: &'a IndexSet<String>,
    pub cooling_enduses: &'a IndexSet<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EnduseClass {
    Heating,
    Cooling,
    Lighting,
    Other,
}

impl DisaggregationContext<'_> {
    fn classify(&self, enduse: &str) -> EnduseClass {
        if self.heating_enduses.contains(enduse) {
            EnduseClass::Heating
        } else if self.cooling_enduses.contains(enduse) {
            EnduseClass::Cooling
        } else if enduse.contains("lighting") {
            EnduseClass::Lighting
        } else {
            EnduseClass::Other
        }
    }

    fn population(&self, region: &str) -> Result<f64, ConfigurationError> {
        self.data
            .population(self.base_yr, region)
            .ok_or_else(|| ConfigurationError::MissingScenarioData {
                data: "population".to_string(),
                region: region.to_string(),
                year: self.base_yr,
            })
    }

    fn climate_weight(&self, class: EnduseClass, region: &str) -> f64 {
        match class {
            EnduseClass::Heating => self.hdd.get(region).copied().unwrap_or_default(),
            EnduseClass::Cooling => self.cdd.get(region).copied().unwrap_or_default(),
            _ => 1.,
        }
    }

    fn floor_area(&self, submodel: Submodel, region: &str, sector: Option<&str>) -> Option<f64> {
        match (submodel, sector) {
            (Submodel::Residential, _) => self.data.floor_area(self.base_yr, region),
            (Submodel::Service, Some(sector)) => {
                self.data.service_floor_area(self.base_yr, region, sector)
            }
            _ => None,
        }
    }

    /// Weight of a region without floor area data.
    fn population_weight(
        &self,
        class: EnduseClass,
        region: &str,
    ) -> Result<f64, ConfigurationError> {
        Ok(self.population(region)? * self.climate_weight(class, region))
    }

    /// Weight of a region with floor area data.
    fn floor_area_weight(
        &self,
        class: EnduseClass,
        region: &str,
        floor_area: f64,
    ) -> Result<f64, ConfigurationError> {
        Ok(match class {
            EnduseClass::Heating | EnduseClass::Cooling => {
                floor_area * self.climate_weight(class, region)
            }
            EnduseClass::Lighting => floor_area,
            EnduseClass::Other => self.population(region)?,
        })
    }

    fn employment_weight(
        &self,
        class: EnduseClass,
        region: &str,
        employment_sector: &str,
    ) -> Result<f64, ConfigurationError> {
        let employment = self
            .data
            .employment(region, employment_sector)
            .ok_or_else(|| ConfigurationError::MissingScenarioData {
                data: format!("employment of sector '{employment_sector}'"),
                region: region.to_string(),
                year: self.base_yr,
            })?;
        Ok(employment * self.climate_weight(class, region))
    }
}

/// Share of every region in `weights`, equal shares if no region carries any weight.
fn weight_shares(
    weights: &IndexMap<String, f64>,
    total: f64,
    enduse: &str,
) -> IndexMap<String, f64> {
    if total > 0. {
        return weights
            .iter()
            .map(|(region, weight)| (region.clone(), weight / total))
            .collect();
    }
    warn!("No regional weights for '{enduse}', splitting its fuel equally across regions");
    let equal = 1. / weights.len().max(1) as f64;
    weights
        .keys()
        .map(|region| (region.clone(), equal))
        .collect()
}

/// Split the national fuel of one enduse and sector across regions.
pub fn disaggregate_enduse(
    submodel: Submodel,
    enduse: &str,
    sector: Option<&str>,
    national: &FuelVector,
    employment_sector: Option<&str>,
    context: &DisaggregationContext<'_>,
) -> Result<IndexMap<String, FuelVector>, EnergyDemandError> {
    let class = context.classify(enduse);

    let mut pass_1_weights: IndexMap<String, f64> = IndexMap::new();
    let mut pass_2_weights: IndexMap<String, f64> = IndexMap::new();
    for region in &context.regions {
        if let (Submodel::Industry, Some(employment_sector)) = (submodel, employment_sector) {
            pass_1_weights.insert(
                region.clone(),
                context.employment_weight(class, region, employment_sector)?,
            );
            continue;
        }
        match context.floor_area(submodel, region, sector) {
            Some(floor_area) => {
                pass_2_weights.insert(
                    region.clone(),
                    context.floor_area_weight(class, region, floor_area)?,
                );
            }
            None => {
                pass_1_weights.insert(region.clone(), context.population_weight(class, region)?);
            }
        }
    }

    let mut regional: IndexMap<String, FuelVector> = IndexMap::new();

    // pass 1 shares are taken against the population weights of all regions
    let mut all_regions_weight = pass_1_weights.values().sum::<f64>();
    for region in pass_2_weights.keys() {
        all_regions_weight += match submodel {
            Submodel::Industry => 0.,
            _ => context.population_weight(class, region)?,
        };
    }
    let mut allocated = FuelVector::zeros();
    if !pass_1_weights.is_empty() {
        let shares = if pass_2_weights.is_empty() {
            weight_shares(&pass_1_weights, all_regions_weight, enduse)
        } else if all_regions_weight > 0. {
            pass_1_weights
                .iter()
                .map(|(region, weight)| (region.clone(), weight / all_regions_weight))
                .collect()
        } else {
            let equal = 1. / context.regions.len() as f64;
            pass_1_weights
                .keys()
                .map(|region| (region.clone(), equal))
                .collect()
        };
        for (region, share) in shares {
            let fuel = national.scaled(share);
            allocated += fuel;
            regional.insert(region, fuel);
        }
    }

    if !pass_2_weights.is_empty() {
        let mut remaining = *national;
        for (fueltype, value) in allocated.iter() {
            remaining[fueltype] -= value;
        }
        let total: f64 = pass_2_weights.values().sum();
        for (region, share) in weight_shares(&pass_2_weights, total, enduse) {
            regional.insert(region, remaining.scaled(share));
        }
    }

    check_conservation(enduse, sector, national, regional.values())?;

    // keep the order of the configured regions
    Ok(context
        .regions
        .iter()
        .filter_map(|region| {
            regional
                .get(region)
                .map(|fuel| (region.clone(), *fuel))
        })
        .collect())
}

/// Regional fuel must add up to national fuel for every fueltype.
pub fn check_conservation<'a>(
    enduse: &str,
    sector: Option<&str>,
    national: &FuelVector,
    regional: impl IntoIterator<Item = &'a FuelVector>,
) -> Result<(), InvariantViolation> {
    let mut total = FuelVector::zeros();
    for fuel in regional {
        total += *fuel;
    }
    for (fueltype, national_fuel) in national.iter() {
        let regional_fuel = total[fueltype];
        if !is_close!(
            regional_fuel,
            national_fuel,
            rel_tol = CONSERVATION_TOLERANCE,
            abs_tol = 1e-9
        ) {
            return Err(InvariantViolation::FuelNotConserved {
                enduse: enduse.to_string(),
                sector: sector.map(str::to_string),
                national: national_fuel,
                regional: regional_fuel,
            });
        }
    }
    Ok(())
}

/// Regional base-year fuel of every enduse and sector of a submodel, in GWh.
pub fn disaggregate(
    submodel: Submodel,
    national_fuel: &IndexMap<String, EnduseFuelInput>,
    unit: EnergyUnit,
    employment_sectors: &IndexMap<String, String>,
    context: &DisaggregationContext<'_>,
) -> Result<RegionalFuel, EnergyDemandError> {
    let mut regional_fuel = RegionalFuel::new();

    for (enduse, fuel_input) in national_fuel {
        let sectors: Vec<(Option<&str>, &FuelVector)> = match fuel_input {
            EnduseFuelInput::Total(fuel) => vec![(None, fuel)],
            EnduseFuelInput::BySector(sectors) => sectors
                .iter()
                .map(|(sector, fuel)| (Some(sector.as_str()), fuel))
                .collect(),
        };

        for (sector, fuel) in sectors {
            let national = to_gwh(fuel, unit);
            let employment_sector = sector
                .and_then(|sector| employment_sectors.get(sector))
                .map(String::as_str);
            let regions = disaggregate_enduse(
                submodel,
                enduse,
                sector,
                &national,
                employment_sector,
                context,
            )?;
            for (region, fuel) in regions {
                regional_fuel.insert(
                    RegionEnduseSectorKey {
                        region,
                        enduse: enduse.clone(),
                        sector: sector.map(str::to_string),
                    },
                    fuel,
                );
            }
        }
    }

    Ok(regional_fuel)
}

pub fn to_gwh(fuel: &FuelVector, unit: EnergyUnit) -> FuelVector {
    FuelVector::new(fuel.values().map(|value| unit.to_gwh(value)))
}
