//! Weather per region: mapping of regions onto weather stations, temperatures of the modelled
//! days and the heating/cooling degree days derived from them.

use crate::compare_floats::{max_of_2, ratio_or_unity};
use crate::core::diffusion::linear_diff;
use crate::core::units::{daily_means, fold_to_day_hours, select_modelled_days, DayHours};
use crate::errors::ConfigurationError;
use crate::input::{BaseTemperatures, RegionInput, WeatherStationInput};
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use tracing::debug;

const EARTH_RADIUS_KM: f64 = 6371.;

/// Great-circle distance between two coordinates in km.
pub fn haversine_distance(lat_1: f64, lon_1: f64, lat_2: f64, lon_2: f64) -> f64 {
    let (phi_1, phi_2) = (lat_1.to_radians(), lat_2.to_radians());
    let delta_phi = (lat_2 - lat_1).to_radians();
    let delta_lambda = (lon_2 - lon_1).to_radians();

    let a = (delta_phi / 2.).sin().powi(2)
        + phi_1.cos() * phi_2.cos() * (delta_lambda / 2.).sin().powi(2);

    2. * EARTH_RADIUS_KM * a.sqrt().atan2((1. - a).sqrt())
}

pub fn closest_weather_station<'a>(
    region: &RegionInput,
    stations: &'a IndexMap<String, WeatherStationInput>,
) -> Option<&'a str> {
    stations
        .iter()
        .min_by_key(|(_, station)| {
            OrderedFloat(haversine_distance(
                region.latitude,
                region.longitude,
                station.latitude,
                station.longitude,
            ))
        })
        .map(|(name, _)| name.as_str())
}

/// Heating and cooling base temperatures of one simulation year.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YearBaseTemperatures {
    pub heating: f64,
    pub cooling: f64,
}

impl YearBaseTemperatures {
    pub fn for_year(
        assumptions: &BaseTemperatures,
        base_yr: u32,
        curr_yr: u32,
        end_yr: u32,
    ) -> Self {
        let duration = assumptions
            .yr_until_changed
            .unwrap_or(end_yr)
            .saturating_sub(base_yr);
        Self {
            heating: linear_diff(
                base_yr,
                curr_yr,
                assumptions.heating_by,
                assumptions.heating_ey,
                duration,
            ),
            cooling: linear_diff(
                base_yr,
                curr_yr,
                assumptions.cooling_by,
                assumptions.cooling_ey,
                duration,
            ),
        }
    }
}

pub fn heating_degree_days(temperatures: &[DayHours], t_base: f64) -> Vec<f64> {
    temperatures
        .iter()
        .map(|day| max_of_2(t_base - daily_mean(day), 0.))
        .collect()
}

pub fn cooling_degree_days(temperatures: &[DayHours], t_base: f64) -> Vec<f64> {
    temperatures
        .iter()
        .map(|day| max_of_2(daily_mean(day) - t_base, 0.))
        .collect()
}

/// Heating degrees of every hour, used to weight hourly heating demand.
pub fn heating_degree_hours(temperatures: &[DayHours], t_base: f64) -> Vec<DayHours> {
    temperatures
        .iter()
        .map(|day| day.map(|temperature| max_of_2(t_base - temperature, 0.)))
        .collect()
}

fn daily_mean(day: &DayHours) -> f64 {
    daily_means(day)[0]
}

/// Temperatures of the modelled days of a region for the base and the current year.
#[derive(Clone, Debug)]
pub struct ExternalConditions {
    pub region: String,
    pub weather_station: String,
    pub temperatures_by: Vec<DayHours>,
    pub temperatures_cy: Vec<DayHours>,
    pub base_temperatures_by: YearBaseTemperatures,
    pub base_temperatures_cy: YearBaseTemperatures,
}

impl ExternalConditions {
    pub fn for_region(
        region_name: &str,
        region: &RegionInput,
        stations: &IndexMap<String, WeatherStationInput>,
        base_temperatures: &BaseTemperatures,
        years: (u32, u32, u32),
        model_yeardays: &[usize],
    ) -> Result<Self, ConfigurationError> {
        let (base_yr, curr_yr, end_yr) = years;
        let station_name = closest_weather_station(region, stations).ok_or_else(|| {
            ConfigurationError::NoWeatherStation {
                region: region_name.to_string(),
            }
        })?;
        let station = &stations[station_name];

        let hourly_by =
            station
                .temperatures
                .get(&base_yr)
                .ok_or_else(|| ConfigurationError::MissingScenarioData {
                    data: format!("temperatures of weather station '{station_name}'"),
                    region: region_name.to_string(),
                    year: base_yr,
                })?;
        let hourly_cy = match station.temperatures.get(&curr_yr) {
            Some(temperatures) => temperatures,
            None => {
                debug!(
                    "No {curr_yr} temperatures at station '{station_name}', using base year temperatures for region '{region_name}'"
                );
                hourly_by
            }
        };

        let temperatures_by = select_modelled_days(&fold_to_day_hours(hourly_by), model_yeardays);
        let temperatures_cy = select_modelled_days(&fold_to_day_hours(hourly_cy), model_yeardays);
        if temperatures_by.len() != model_yeardays.len()
            || temperatures_cy.len() != model_yeardays.len()
        {
            return Err(ConfigurationError::MissingScenarioData {
                data: format!("temperatures of all modelled days at station '{station_name}'"),
                region: region_name.to_string(),
                year: curr_yr,
            });
        }

        Ok(Self {
            region: region_name.to_string(),
            weather_station: station_name.to_string(),
            temperatures_by,
            temperatures_cy,
            base_temperatures_by: YearBaseTemperatures::for_year(
                base_temperatures,
                base_yr,
                base_yr,
                end_yr,
            ),
            base_temperatures_cy: YearBaseTemperatures::for_year(
                base_temperatures,
                base_yr,
                curr_yr,
                end_yr,
            ),
        })
    }

    pub fn hdd_by(&self) -> Vec<f64> {
        heating_degree_days(&self.temperatures_by, self.base_temperatures_by.heating)
    }

    pub fn hdd_cy(&self) -> Vec<f64> {
        heating_degree_days(&self.temperatures_cy, self.base_temperatures_cy.heating)
    }

    pub fn cdd_by(&self) -> Vec<f64> {
        cooling_degree_days(&self.temperatures_by, self.base_temperatures_by.cooling)
    }

    pub fn cdd_cy(&self) -> Vec<f64> {
        cooling_degree_days(&self.temperatures_cy, self.base_temperatures_cy.cooling)
    }

    pub fn climate_factors(&self) -> ClimateFactors {
        ClimateFactors {
            hdd_by: self.hdd_by().iter().sum(),
            hdd_cy: self.hdd_cy().iter().sum(),
            cdd_by: self.cdd_by().iter().sum(),
            cdd_cy: self.cdd_cy().iter().sum(),
        }
    }
}

/// Annual degree days of the base and current year.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClimateFactors {
    pub hdd_by: f64,
    pub hdd_cy: f64,
    pub cdd_by: f64,
    pub cdd_cy: f64,
}

impl ClimateFactors {
    pub fn heating_factor(&self) -> f64 {
        ratio_or_unity(self.hdd_cy, self.hdd_by)
    }

    pub fn cooling_factor(&self) -> f64 {
        ratio_or_unity(self.cdd_cy, self.cdd_by)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn stations() -> IndexMap<String, WeatherStationInput> {
        IndexMap::from([
            (
                "edinburgh".to_string(),
                WeatherStationInput {
                    latitude: 55.95,
                    longitude: -3.19,
                    temperatures: IndexMap::from([(2015, vec![5.; 48])]),
                },
            ),
            (
                "london".to_string(),
                WeatherStationInput {
                    latitude: 51.51,
                    longitude: -0.13,
                    temperatures: IndexMap::from([
                        (2015, vec![10.; 48]),
                        (2020, [vec![12.; 24], vec![25.; 24]].concat()),
                    ]),
                },
            ),
        ])
    }

    #[fixture]
    fn reading() -> RegionInput {
        RegionInput {
            latitude: 51.45,
            longitude: -0.97,
        }
    }

    #[rstest]
    fn should_calculate_great_circle_distance() {
        // London to Paris
        assert_relative_eq!(
            haversine_distance(51.5074, -0.1278, 48.8566, 2.3522),
            343.5,
            max_relative = 1e-2
        );
        assert_eq!(haversine_distance(50., 1., 50., 1.), 0.);
    }

    #[rstest]
    fn should_map_region_to_closest_station(
        stations: IndexMap<String, WeatherStationInput>,
        reading: RegionInput,
    ) {
        assert_eq!(closest_weather_station(&reading, &stations), Some("london"));
        assert_eq!(closest_weather_station(&reading, &IndexMap::new()), None);
    }

    #[rstest]
    fn should_calculate_degree_days() {
        let temperatures = vec![[10.; 24], [20.; 24], [25.; 24]];

        assert_eq!(heating_degree_days(&temperatures, 15.5), vec![5.5, 0., 0.]);
        assert_eq!(cooling_degree_days(&temperatures, 21.), vec![0., 0., 4.]);
        assert_eq!(heating_degree_hours(&temperatures, 15.5)[0][3], 5.5);
    }

    #[rstest]
    fn should_build_conditions_with_fallback_to_base_year(
        stations: IndexMap<String, WeatherStationInput>,
        reading: RegionInput,
    ) {
        let conditions = ExternalConditions::for_region(
            "reading",
            &reading,
            &stations,
            &BaseTemperatures::default(),
            (2015, 2020, 2050),
            &[0, 1],
        )
        .unwrap();

        assert_eq!(conditions.weather_station, "london");
        assert_eq!(conditions.temperatures_cy[1][0], 25.);

        let factors = conditions.climate_factors();
        assert_relative_eq!(factors.hdd_by, 11.);
        assert_relative_eq!(factors.hdd_cy, 3.5);
        assert_relative_eq!(factors.heating_factor(), 3.5 / 11.);
        assert_relative_eq!(factors.cdd_cy, 4.);
        // no cooling in the base year means no change
        assert_eq!(factors.cooling_factor(), 1.);

        let unchanged = ExternalConditions::for_region(
            "reading",
            &reading,
            &stations,
            &BaseTemperatures::default(),
            (2015, 2030, 2050),
            &[0, 1],
        )
        .unwrap();
        assert_eq!(unchanged.climate_factors().heating_factor(), 1.);
    }

    #[rstest]
    fn should_diffuse_base_temperatures() {
        let assumptions = BaseTemperatures {
            heating_by: 15.5,
            heating_ey: 14.5,
            cooling_by: 21.,
            cooling_ey: 21.,
            yr_until_changed: Some(2025),
        };
        let cy = YearBaseTemperatures::for_year(&assumptions, 2015, 2020, 2050);

        assert_relative_eq!(cy.heating, 15.);
        assert_relative_eq!(cy.cooling, 21.);
    }

    #[rstest]
    fn should_fail_without_base_year_temperatures(reading: RegionInput) {
        let stations = IndexMap::from([(
            "london".to_string(),
            WeatherStationInput {
                latitude: 51.51,
                longitude: -0.13,
                temperatures: IndexMap::new(),
            },
        )]);

        assert!(matches!(
            ExternalConditions::for_region(
                "reading",
                &reading,
                &stations,
                &BaseTemperatures::default(),
                (2015, 2015, 2050),
                &[0],
            ),
            Err(ConfigurationError::MissingScenarioData { .. })
        ));
    }
}
