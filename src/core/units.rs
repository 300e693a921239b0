use serde::Deserialize;

pub const HOURS_PER_DAY: usize = 24;
pub const DAYS_PER_YEAR: usize = 365;
pub const GWH_PER_KTOE: f64 = 11.63;

/// Values of a quantity for every hour of every modelled day.
pub type DayHours = [f64; HOURS_PER_DAY];

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum EnergyUnit {
    #[default]
    Gwh,
    Ktoe,
}

impl EnergyUnit {
    pub fn to_gwh(&self, value: f64) -> f64 {
        match self {
            EnergyUnit::Gwh => value,
            EnergyUnit::Ktoe => value * GWH_PER_KTOE,
        }
    }
}

pub fn daily_means(hourly_values: &[f64]) -> Vec<f64> {
    hourly_values
        .chunks(HOURS_PER_DAY)
        .map(|day| day.iter().sum::<f64>() / day.len() as f64)
        .collect()
}

/// Fold a flat hourly series into rows of 24 hours. Missing trailing hours are zero.
pub fn fold_to_day_hours(hourly_values: &[f64]) -> Vec<DayHours> {
    hourly_values
        .chunks(HOURS_PER_DAY)
        .map(|day| {
            let mut hours = [0.; HOURS_PER_DAY];
            hours[..day.len()].copy_from_slice(day);
            hours
        })
        .collect()
}

/// Select the rows of a full-year day/hour array that belong to the modelled days.
pub fn select_modelled_days(full_year: &[DayHours], model_yeardays: &[usize]) -> Vec<DayHours> {
    model_yeardays
        .iter()
        .filter_map(|&yearday| full_year.get(yearday).copied())
        .collect()
}
