//! Peak shaving by improving the daily load factor of hourly demand.

use crate::core::diffusion::linear_diff;
use crate::core::fuel_types::{FuelType, FuelYh};
use crate::core::units::{DayHours, HOURS_PER_DAY};
use crate::input::DemandManagement;
use crate::statistics::daily_load_factor;
use strum::IntoEnumIterator;

/// Fraction of the gap between the load factor and 1.0 closed in `curr_yr`.
pub fn load_factor_improvement_cy(
    demand_management: &DemandManagement,
    base_yr: u32,
    curr_yr: u32,
    end_yr: u32,
) -> f64 {
    let duration = demand_management
        .yr_until_changed
        .unwrap_or(end_yr)
        .saturating_sub(base_yr);
    linear_diff(
        base_yr,
        curr_yr,
        0.,
        demand_management.load_factor_improvement_ey,
        duration,
    )
}

/// Reshape one day towards the improved load factor without changing its total.
///
/// Demand above the new peak is cut and moved to the hours below it, in proportion to their
/// headroom.
pub fn shave_day(day: &DayHours, improvement: f64) -> DayHours {
    let Some(load_factor) = daily_load_factor(day) else {
        return *day;
    };
    if improvement <= 0. || load_factor >= 1. {
        return *day;
    }

    let improved_load_factor = load_factor + (1. - load_factor) * improvement.min(1.);
    let mean = day.iter().sum::<f64>() / HOURS_PER_DAY as f64;
    let new_peak = mean / improved_load_factor;

    let excess: f64 = day.iter().map(|value| (value - new_peak).max(0.)).sum();
    let headroom: f64 = day.iter().map(|value| (new_peak - value).max(0.)).sum();
    if excess <= 0. || headroom <= 0. {
        return *day;
    }

    day.map(|value| {
        if value >= new_peak {
            new_peak
        } else {
            value + excess * (new_peak - value) / headroom
        }
    })
}

/// Shave the peaks of every day and fueltype.
pub fn shape_load_factor(fuel_yh: &mut FuelYh, improvement: f64) {
    if improvement <= 0. {
        return;
    }
    for fueltype in FuelType::iter() {
        for day in fuel_yh.fueltype_mut(fueltype) {
            *day = shave_day(day, improvement);
        }
    }
}
