//! Scenario drivers scaling the fuel of enduses between the base year and a simulation year.

use crate::input::{ScenarioData, ScenarioDriver};
use indexmap::IndexMap;

/// Source of the scenario driver value of an enduse in a region and year.
pub trait DwellingStock: Send + Sync {
    fn driver_value(&self, region: &str, year: u32, enduse: &str) -> Option<f64>;
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct DwellingKey {
    region: String,
    year: u32,
}

/// Floor area used by the floor area driver.
#[derive(Clone, Copy, Debug)]
pub enum FloorAreaSource<'a> {
    Residential,
    ServiceSector(&'a str),
}

/// Product of the scenario drivers of every enduse, precomputed per region and year.
#[derive(Clone, Debug, Default)]
pub struct ScenarioDwellingStock {
    drivers: IndexMap<DwellingKey, IndexMap<String, f64>>,
}

impl ScenarioDwellingStock {
    /// Stock for the given enduses, regions and years. Enduses without configured drivers use
    /// `default_drivers`; combinations with missing scenario data have no driver value.
    pub fn new<'a>(
        data: &ScenarioData,
        scenario_drivers: &IndexMap<String, Vec<ScenarioDriver>>,
        default_drivers: &[ScenarioDriver],
        floor_area: FloorAreaSource<'_>,
        enduses: impl IntoIterator<Item = &'a String> + Clone,
        regions: impl IntoIterator<Item = &'a String>,
        years: &[u32],
    ) -> Self {
        let mut drivers = IndexMap::new();
        for region in regions {
            for &year in years {
                let values = enduses
                    .clone()
                    .into_iter()
                    .filter_map(|enduse| {
                        let enduse_drivers = scenario_drivers
                            .get(enduse)
                            .map_or(default_drivers, Vec::as_slice);
                        driver_product(data, enduse_drivers, floor_area, region, year)
                            .map(|value| (enduse.clone(), value))
                    })
                    .collect();
                drivers.insert(
                    DwellingKey {
                        region: region.clone(),
                        year,
                    },
                    values,
                );
            }
        }
        Self { drivers }
    }
}

impl DwellingStock for ScenarioDwellingStock {
    fn driver_value(&self, region: &str, year: u32, enduse: &str) -> Option<f64> {
        self.drivers
            .get(&DwellingKey {
                region: region.to_string(),
                year,
            })?
            .get(enduse)
            .copied()
    }
}

/// Product of the values of the given drivers. None if any value is missing.
pub fn driver_product(
    data: &ScenarioData,
    drivers: &[ScenarioDriver],
    floor_area: FloorAreaSource<'_>,
    region: &str,
    year: u32,
) -> Option<f64> {
    drivers.iter().try_fold(1., |product, driver| {
        let value = match driver {
            ScenarioDriver::Population => data.population(year, region),
            ScenarioDriver::Gva => data.gva(year, region),
            ScenarioDriver::FloorArea => match floor_area {
                FloorAreaSource::Residential => data.floor_area(year, region),
                FloorAreaSource::ServiceSector(sector) => {
                    data.service_floor_area(year, region, sector)
                }
            },
        }?;
        Some(product * value)
    })
}
