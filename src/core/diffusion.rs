//! Interpolation of a quantity between its base-year and end-year value, either linearly or
//! along an S-shaped (logistic) diffusion curve.

use serde::Deserialize;

/// Calendar year subtracted from years before they are placed on a fitted sigmoid curve.
pub const SIGMOID_EPOCH_YEAR: u32 = 2000;

/// Half-width of the x axis onto which the diffusion period is mapped by [`sigmoid_diffusion`].
const SIGMOID_AXIS_HALF_WIDTH: f64 = 6.;

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DiffusionMethod {
    #[default]
    Linear,
    Sigmoid,
}

/// Shape of a generic sigmoid diffusion, expressed on the normalised diffusion axis.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SigmoidShape {
    #[serde(default)]
    pub midpoint: f64,
    #[serde(default = "default_steepness")]
    pub steepness: f64,
}

fn default_steepness() -> f64 {
    1.
}

impl Default for SigmoidShape {
    fn default() -> Self {
        Self {
            midpoint: 0.,
            steepness: default_steepness(),
        }
    }
}

/// Translate a calendar year onto the x axis of fitted sigmoid curves.
pub fn translate_year(year: u32) -> f64 {
    year as f64 - SIGMOID_EPOCH_YEAR as f64
}

/// Value in `curr_yr` of a quantity changing linearly from `by_value` in `base_yr` to
/// `ey_value`, which is reached `duration_yrs` years after the base year and held thereafter.
pub fn linear_diff(
    base_yr: u32,
    curr_yr: u32,
    by_value: f64,
    ey_value: f64,
    duration_yrs: u32,
) -> f64 {
    if curr_yr <= base_yr || by_value == ey_value {
        return by_value;
    }
    if duration_yrs == 0 {
        return ey_value;
    }

    let elapsed = (curr_yr - base_yr).min(duration_yrs) as f64;
    by_value + (ey_value - by_value) * elapsed / duration_yrs as f64
}

/// Fraction in [0, 1] of the total diffusion completed by `curr_yr`.
///
/// The period from `base_yr` to `end_yr` is mapped onto [-6, 6] and evaluated on a logistic
/// curve with the given midpoint and steepness. The base year is exactly 0 and years from the
/// end year onwards are exactly 1.
pub fn sigmoid_diffusion(
    base_yr: u32,
    curr_yr: u32,
    end_yr: u32,
    midpoint: f64,
    steepness: f64,
) -> f64 {
    if curr_yr <= base_yr {
        return 0.;
    }
    if curr_yr >= end_yr {
        return 1.;
    }

    let progress = (curr_yr - base_yr) as f64 / (end_yr - base_yr) as f64;
    let x = -SIGMOID_AXIS_HALF_WIDTH + 2. * SIGMOID_AXIS_HALF_WIDTH * progress;

    1. / (1. + (-steepness * (x - midpoint)).exp())
}

/// Logistic function with asymptote `l`, midpoint `x0` and steepness `k`.
pub fn sigmoid_function(x: f64, l: f64, x0: f64, k: f64) -> f64 {
    l / (1. + (-k * (x - x0)).exp())
}

/// Interpolate between a base-year and end-year value with the given diffusion method.
pub fn diffuse_value(
    method: DiffusionMethod,
    base_yr: u32,
    curr_yr: u32,
    end_yr: u32,
    by_value: f64,
    ey_value: f64,
    sigmoid: SigmoidShape,
) -> f64 {
    match method {
        DiffusionMethod::Linear => linear_diff(
            base_yr,
            curr_yr,
            by_value,
            ey_value,
            end_yr.saturating_sub(base_yr),
        ),
        DiffusionMethod::Sigmoid => {
            let fraction = sigmoid_diffusion(
                base_yr,
                curr_yr,
                end_yr,
                sigmoid.midpoint,
                sigmoid.steepness,
            );
            by_value + fraction * (ey_value - by_value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    #[case(2015, 1.)]
    #[case(2020, 1.5)]
    #[case(2025, 2.)]
    #[case(2040, 2.)]
    fn test_linear_diff(#[case] curr_yr: u32, #[case] expected: f64) {
        assert_relative_eq!(linear_diff(2015, curr_yr, 1., 2., 10), expected);
    }

    #[rstest]
    fn linear_diff_with_zero_duration_jumps_to_end_value() {
        assert_eq!(linear_diff(2015, 2015, 1., 2., 0), 1.);
        assert_eq!(linear_diff(2015, 2016, 1., 2., 0), 2.);
    }

    #[rstest]
    fn sigmoid_diffusion_is_bounded_by_base_and_end_year() {
        assert_eq!(sigmoid_diffusion(2015, 2015, 2050, 0., 1.), 0.);
        assert_eq!(sigmoid_diffusion(2015, 2050, 2050, 0., 1.), 1.);
        assert_eq!(sigmoid_diffusion(2015, 2060, 2050, 0., 1.), 1.);

        // first and last simulated years before the end sit close to the asymptotes
        assert!(sigmoid_diffusion(2015, 2016, 2050, 0., 1.) < 0.01);
        assert!(sigmoid_diffusion(2015, 2049, 2050, 0., 1.) > 0.99);
    }

    #[rstest]
    fn sigmoid_diffusion_is_half_way_at_midpoint() {
        assert_relative_eq!(sigmoid_diffusion(2010, 2030, 2050, 0., 1.), 0.5);
    }

    #[rstest]
    fn sigmoid_diffusion_is_monotonic() {
        let values: Vec<f64> = (2015..=2050)
            .map(|year| sigmoid_diffusion(2015, year, 2050, 0., 1.))
            .collect();
        assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[rstest]
    fn test_sigmoid_function() {
        assert_relative_eq!(sigmoid_function(40., 1., 40., 0.1), 0.5);
        assert_relative_eq!(sigmoid_function(40., 0.6, 40., 0.1), 0.3);
        assert!(sigmoid_function(1000., 0.8, 40., 0.1) <= 0.8);
    }

    #[rstest]
    fn test_translate_year() {
        assert_eq!(translate_year(2060), 60.);
    }

    #[rstest]
    fn test_diffuse_value() {
        let shape = SigmoidShape::default();
        assert_relative_eq!(
            diffuse_value(DiffusionMethod::Linear, 2015, 2020, 2025, 0., 10., shape),
            5.
        );
        assert_relative_eq!(
            diffuse_value(DiffusionMethod::Sigmoid, 2015, 2025, 2025, 0., 10., shape),
            10.
        );
        assert_relative_eq!(
            diffuse_value(DiffusionMethod::Sigmoid, 2010, 2030, 2050, 2., 4., shape),
            3.
        );
    }
}
