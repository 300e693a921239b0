//! Temporal shapes used to spread annual fuel over the days and hours of the modelled year.

use crate::core::technologies::TechnologyStock;
use crate::core::units::{DayHours, DAYS_PER_YEAR, HOURS_PER_DAY};
use crate::errors::ConfigurationError;
use crate::external_conditions::ExternalConditions;
use crate::input::{LoadProfileInput, DUMMY_TECH};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use tracing::debug;

/// Shape of one load profile over the modelled days.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadProfile {
    pub id: String,
    /// Share of annual demand per modelled day; sums to 1.
    pub yd: Vec<f64>,
    /// Share of annual demand per hour of every modelled day; sums to 1.
    pub yh: Vec<DayHours>,
    /// Share of annual demand falling on the peak day.
    pub peak_yd_factor: f64,
    /// Share of the peak day's demand per hour; sums to 1.
    pub peak_dh: DayHours,
}

/// Scale non-negative values so that they sum to 1. None if they cannot be normalised.
pub fn normalise(values: &[f64]) -> Option<Vec<f64>> {
    let total: f64 = values.iter().sum();
    if !total.is_finite() || total <= 0. || values.iter().any(|value| *value < 0.) {
        return None;
    }
    Some(values.iter().map(|value| value / total).collect())
}

fn normalise_day(id: &str, values: &DayHours, name: &str) -> Result<DayHours, ConfigurationError> {
    let normalised = normalise(values).ok_or_else(|| ConfigurationError::InvalidLoadProfile {
        id: id.to_string(),
        reason: format!("{name} shape must be non-negative with a positive sum"),
    })?;
    Ok(std::array::from_fn(|hour| normalised[hour]))
}

impl LoadProfile {
    /// Profile with a daily shape over the modelled days and the same shape within every day.
    pub fn from_shapes(
        id: &str,
        yd: &[f64],
        dh: &DayHours,
        peak_dh: Option<&DayHours>,
    ) -> Result<Self, ConfigurationError> {
        let yd = normalise(yd).ok_or_else(|| ConfigurationError::InvalidLoadProfile {
            id: id.to_string(),
            reason: "daily shape must be non-negative with a positive sum".to_string(),
        })?;
        let dh = normalise_day(id, dh, "hourly")?;
        let peak_dh = match peak_dh {
            Some(peak_dh) => normalise_day(id, peak_dh, "peak day")?,
            None => dh,
        };
        let yh = yd
            .iter()
            .map(|day_share| dh.map(|hour_share| day_share * hour_share))
            .collect();

        Ok(Self {
            id: id.to_string(),
            peak_yd_factor: yd.iter().copied().fold(0., f64::max),
            yd,
            yh,
            peak_dh,
        })
    }

    /// Profile from hourly values of every modelled day. The peak day shape is that of the day
    /// with the largest share.
    pub fn from_yh(id: &str, yh: &[DayHours]) -> Result<Self, ConfigurationError> {
        let flat = yh.iter().flatten().copied().collect_vec();
        let normalised = normalise(&flat).ok_or_else(|| ConfigurationError::InvalidLoadProfile {
            id: id.to_string(),
            reason: "hourly shape must be non-negative with a positive sum".to_string(),
        })?;
        let yh: Vec<DayHours> = normalised
            .chunks(HOURS_PER_DAY)
            .map(|day| std::array::from_fn(|hour| day[hour]))
            .collect();
        let yd = yh.iter().map(|day| day.iter().sum::<f64>()).collect_vec();
        let (peak_day, peak_yd_factor) = yd
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0.), |best, (day, share)| {
                if share > best.1 {
                    (day, share)
                } else {
                    best
                }
            });
        let peak_dh = normalise_day(id, &yh[peak_day], "peak day")?;

        Ok(Self {
            id: id.to_string(),
            yd,
            yh,
            peak_yd_factor,
            peak_dh,
        })
    }

    pub fn num_days(&self) -> usize {
        self.yd.len()
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct ProfileKey {
    enduse: String,
    sector: Option<String>,
    technology: String,
}

/// Registry of load profiles keyed by enduse, sector and technology.
#[derive(Clone, Debug, Default)]
pub struct LoadProfileStock {
    name: String,
    profiles: Vec<LoadProfile>,
    index: IndexMap<ProfileKey, usize>,
    enduses_in_stock: IndexSet<String>,
}

impl LoadProfileStock {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a profile for every combination of the given technologies, enduses and sectors.
    /// A profile without sectors applies to all sectors of its enduses.
    pub fn add_profile(
        &mut self,
        profile: LoadProfile,
        technologies: &[String],
        enduses: &[String],
        sectors: &[String],
    ) {
        let position = self.profiles.len();
        self.profiles.push(profile);

        let sectors = if sectors.is_empty() {
            vec![None]
        } else {
            sectors.iter().cloned().map(Some).collect()
        };
        for ((technology, enduse), sector) in technologies
            .iter()
            .cartesian_product(enduses)
            .cartesian_product(sectors)
        {
            self.enduses_in_stock.insert(enduse.clone());
            self.index.insert(
                ProfileKey {
                    enduse: enduse.clone(),
                    sector,
                    technology: technology.clone(),
                },
                position,
            );
        }
    }

    /// Profile of a technology, falling back to the sector-wide profile and then to the enduse
    /// profile registered for `dummy_tech`.
    pub fn get_profile(
        &self,
        enduse: &str,
        sector: Option<&str>,
        technology: &str,
    ) -> Result<&LoadProfile, ConfigurationError> {
        let mut candidates = vec![];
        for technology in [technology, DUMMY_TECH] {
            if let Some(sector) = sector {
                candidates.push((Some(sector), technology));
            }
            candidates.push((None, technology));
        }

        candidates
            .into_iter()
            .find_map(|(sector, technology)| {
                self.index.get(&ProfileKey {
                    enduse: enduse.to_string(),
                    sector: sector.map(str::to_string),
                    technology: technology.to_string(),
                })
            })
            .map(|&position| &self.profiles[position])
            .ok_or_else(|| ConfigurationError::MissingLoadProfile {
                enduse: enduse.to_string(),
                sector: sector.map(str::to_string),
                technology: technology.to_string(),
            })
    }

    pub fn enduses_in_stock(&self) -> &IndexSet<String> {
        &self.enduses_in_stock
    }

    pub fn contains_enduse(&self, enduse: &str) -> bool {
        self.enduses_in_stock.contains(enduse)
    }
}

/// Daily shape of a profile input over the modelled days; flat when none is given.
fn modelled_yd(
    profile: &LoadProfileInput,
    model_yeardays: &[usize],
) -> Result<Vec<f64>, ConfigurationError> {
    match &profile.yd {
        None => Ok(vec![1.; model_yeardays.len()]),
        Some(yd) if yd.len() == DAYS_PER_YEAR => model_yeardays
            .iter()
            .map(|&day| {
                yd.get(day)
                    .copied()
                    .ok_or_else(|| ConfigurationError::InvalidLoadProfile {
                        id: profile.id.clone(),
                        reason: format!("no daily share for yearday {day}"),
                    })
            })
            .collect(),
        Some(yd) if yd.len() == model_yeardays.len() => Ok(yd.clone()),
        Some(yd) => Err(ConfigurationError::InvalidLoadProfile {
            id: profile.id.clone(),
            reason: format!(
                "daily shape has {} values, expected {DAYS_PER_YEAR} or {}",
                yd.len(),
                model_yeardays.len()
            ),
        }),
    }
}

/// Stock of the profiles shared by all regions.
pub fn non_regional_lp_stock(
    profiles: &[LoadProfileInput],
    model_yeardays: &[usize],
) -> Result<LoadProfileStock, ConfigurationError> {
    let mut stock = LoadProfileStock::new("non_regional_lp_stock");
    for profile in profiles.iter().filter(|profile| !profile.regional) {
        let yd = modelled_yd(profile, model_yeardays)?;
        stock.add_profile(
            LoadProfile::from_shapes(&profile.id, &yd, &profile.dh, profile.peak_dh.as_ref())?,
            &profile.technologies,
            &profile.enduses,
            &profile.sectors,
        );
    }
    Ok(stock)
}

/// Stock of the heating and cooling profiles of one region, whose daily shapes follow the
/// region's degree days of the current year. Temperature dependent technologies get their own
/// shape, with demand in each hour raised by the inverse of their hourly efficiency.
pub fn regional_lp_stock(
    profiles: &[LoadProfileInput],
    conditions: &ExternalConditions,
    technologies: &TechnologyStock,
    heating_enduses: &IndexSet<String>,
    cooling_enduses: &IndexSet<String>,
) -> Result<LoadProfileStock, ConfigurationError> {
    let mut stock = LoadProfileStock::new("regional_lp_stock");
    let hdd = conditions.hdd_cy();
    let cdd = conditions.cdd_cy();

    for profile in profiles.iter().filter(|profile| profile.regional) {
        let degree_days = if profile
            .enduses
            .iter()
            .any(|enduse| heating_enduses.contains(enduse))
        {
            &hdd
        } else if profile
            .enduses
            .iter()
            .any(|enduse| cooling_enduses.contains(enduse))
        {
            &cdd
        } else {
            return Err(ConfigurationError::InvalidLoadProfile {
                id: profile.id.clone(),
                reason: "regional profiles are only defined for heating or cooling enduses"
                    .to_string(),
            });
        };

        let yd = if degree_days.iter().sum::<f64>() > 0. {
            degree_days.clone()
        } else {
            debug!(
                "No degree days in region '{}', using a flat daily shape for profile '{}'",
                conditions.region, profile.id
            );
            vec![1.; degree_days.len()]
        };
        let base_profile =
            LoadProfile::from_shapes(&profile.id, &yd, &profile.dh, profile.peak_dh.as_ref())?;

        let (temperature_dependent, other): (Vec<_>, Vec<_>) =
            profile.technologies.iter().cloned().partition(|name| {
                technologies
                    .technology(name)
                    .is_some_and(|technology| technology.eff_cy_yh.is_some())
            });

        for name in temperature_dependent {
            let Some(eff_yh) = technologies
                .technology(&name)
                .and_then(|technology| technology.eff_cy_yh.as_ref())
            else {
                continue;
            };
            let fuel_yh: Vec<DayHours> = base_profile
                .yh
                .iter()
                .zip(eff_yh)
                .map(|(service_day, eff_day)| {
                    std::array::from_fn(|hour| service_day[hour] / eff_day[hour])
                })
                .collect();
            stock.add_profile(
                LoadProfile::from_yh(&format!("{}_{name}", profile.id), &fuel_yh)?,
                &[name],
                &profile.enduses,
                &profile.sectors,
            );
        }
        if !other.is_empty() {
            stock.add_profile(base_profile, &other, &profile.enduses, &profile.sectors);
        }
    }

    Ok(stock)
}

/// The regional and non-regional load profiles available to the enduses of a region.
#[derive(Clone, Copy, Debug)]
pub struct RegionLoadProfiles<'a> {
    pub non_regional: &'a LoadProfileStock,
    pub regional: &'a LoadProfileStock,
}

impl<'a> RegionLoadProfiles<'a> {
    /// Stock holding the profiles of an enduse: the non-regional stock if it knows the enduse,
    /// otherwise the regional one.
    pub fn stock_for(&self, enduse: &str) -> &'a LoadProfileStock {
        if self.non_regional.contains_enduse(enduse) {
            self.non_regional
        } else {
            self.regional
        }
    }
}
