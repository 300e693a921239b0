//! Least-squares fitting of logistic diffusion curves.

use crate::core::diffusion::sigmoid_function;
use argmin::core::{CostFunction, Error as ArgminError, Executor, State};
use argmin::solver::neldermead::NelderMead;
use tracing::{debug, error, warn};

/// Starting values tried in turn for both midpoint and steepness.
const CANDIDATE_START_VALUES: [f64; 20] = [
    0.001, 0.01, 0.1, 1., 2., 3., 5., 10., 20., 30., 40., 50., 60., 70., 80., 90., 100., 200.,
    400., 500.,
];
const MAX_ITERATIONS: u64 = 2_000;
const SIMPLEX_SD_TOLERANCE: f64 = 1e-14;
/// Relative deviation from the target point above which a fit is reported.
pub const FIT_TOLERANCE: f64 = 0.01;

/// Bounds within which fitted parameters are plausible.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitCriteria {
    /// Upper bound of both midpoint and steepness.
    pub fit_crit_a: f64,
    /// Lower bound of the midpoint.
    pub fit_crit_b: f64,
}

impl Default for FitCriteria {
    fn default() -> Self {
        Self {
            fit_crit_a: 200.,
            fit_crit_b: 0.019,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SigmoidFit {
    pub midpoint: f64,
    pub steepness: f64,
    /// Whether the fit satisfied the criteria from one of the candidate starts.
    pub converged: bool,
}

struct SigmoidLeastSquares {
    xdata: [f64; 2],
    ydata: [f64; 2],
    l_value: f64,
}

impl CostFunction for SigmoidLeastSquares {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, ArgminError> {
        let (midpoint, steepness) = (param[0], param[1]);
        Ok(self
            .xdata
            .iter()
            .zip(self.ydata)
            .map(|(&x, y)| (sigmoid_function(x, self.l_value, midpoint, steepness) - y).powi(2))
            .sum())
    }
}

fn minimise_from(
    xdata: [f64; 2],
    ydata: [f64; 2],
    l_value: f64,
    start: (f64, f64),
) -> anyhow::Result<(f64, f64)> {
    let problem = SigmoidLeastSquares {
        xdata,
        ydata,
        l_value,
    };
    let (midpoint, steepness) = start;
    let simplex = vec![
        vec![midpoint, steepness],
        vec![midpoint * 1.05 + 0.5, steepness],
        vec![midpoint, steepness * 1.2 + 0.01],
    ];
    let solver = NelderMead::new(simplex)
        .with_sd_tolerance(SIMPLEX_SD_TOLERANCE)
        .map_err(|e| anyhow::anyhow!(e))?;

    let result = Executor::new(problem, solver)
        .configure(|state| state.max_iters(MAX_ITERATIONS))
        .run()
        .map_err(|e| anyhow::anyhow!(e))?;

    let best = result
        .state()
        .get_best_param()
        .ok_or_else(|| anyhow::anyhow!("Nelder-Mead finished without a best parameter"))?;

    Ok((best[0], best[1]))
}

fn satisfies_criteria(fit: (f64, f64), start: (f64, f64), criteria: &FitCriteria) -> bool {
    let (midpoint, steepness) = fit;
    midpoint.is_finite()
        && steepness.is_finite()
        && midpoint > criteria.fit_crit_b
        && midpoint < criteria.fit_crit_a
        && steepness > 0.
        && steepness < criteria.fit_crit_a
        && midpoint != start.0
        && steepness != start.1
}

/// Fit midpoint and steepness of a logistic curve with asymptote `l_value` through two points.
///
/// Candidate starting parameters are tried in turn until a fit satisfies `criteria`. When all
/// candidates are exhausted the best-effort fit of the last attempt is returned with
/// `converged == false`.
pub fn fit_sigmoid_two_points(
    xdata: [f64; 2],
    ydata: [f64; 2],
    l_value: f64,
    criteria: &FitCriteria,
) -> SigmoidFit {
    let mut best_effort: Option<(f64, f64, f64)> = None;

    let heuristic_start = (
        (xdata[0] + xdata[1]) / 2. + 2.5,
        2. / (xdata[1] - xdata[0]).abs().max(1.),
    );
    let starts = std::iter::once(heuristic_start)
        .chain(CANDIDATE_START_VALUES.iter().map(|&value| (value, value)));

    for start in starts {
        let fit = match minimise_from(xdata, ydata, l_value, start) {
            Ok(fit) => fit,
            Err(e) => {
                debug!("Sigmoid fit from start {start:?} failed: {e}");
                continue;
            }
        };

        if satisfies_criteria(fit, start, criteria) {
            return SigmoidFit {
                midpoint: fit.0,
                steepness: fit.1,
                converged: true,
            };
        }

        let cost = SigmoidLeastSquares {
            xdata,
            ydata,
            l_value,
        }
        .cost(&vec![fit.0, fit.1])
        .unwrap_or(f64::INFINITY);
        if fit.0.is_finite()
            && fit.1.is_finite()
            && best_effort.map_or(true, |(_, _, best_cost)| cost < best_cost)
        {
            best_effort = Some((fit.0, fit.1, cost));
        }
    }

    error!(
        "Sigmoid fit through {xdata:?}/{ydata:?} with L={l_value} did not converge from any candidate start"
    );
    let (midpoint, steepness) = best_effort.map_or((0., 0.), |(m, s, _)| (m, s));
    SigmoidFit {
        midpoint,
        steepness,
        converged: false,
    }
}

/// Whether the fitted curve reproduces the target point within [`FIT_TOLERANCE`]. A warning is
/// logged when it does not.
pub fn verify_sigmoid_fit(fit: &SigmoidFit, l_value: f64, target: (f64, f64)) -> bool {
    let (x, y) = target;
    let modelled = sigmoid_function(x, l_value, fit.midpoint, fit.steepness);
    let deviation = if y == 0. {
        modelled.abs()
    } else {
        ((modelled - y) / y).abs()
    };

    if deviation > FIT_TOLERANCE {
        warn!(
            "Fitted sigmoid gives {modelled} at x={x} instead of {y} (deviation {:.2}%)",
            deviation * 100.
        );
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::*;

    #[rstest]
    fn should_fit_curve_through_two_points() {
        let fit = fit_sigmoid_two_points([20., 60.], [0.1, 0.9], 1., &FitCriteria::default());

        assert!(fit.converged);
        assert_relative_eq!(fit.midpoint, 40., max_relative = 1e-3);
        assert_relative_eq!(fit.steepness, 9f64.ln() / 20., max_relative = 1e-3);
        assert_relative_eq!(
            sigmoid_function(60., 1., fit.midpoint, fit.steepness),
            0.9,
            max_relative = 0.01
        );
        assert!(verify_sigmoid_fit(&fit, 1., (60., 0.9)));
    }

    #[rstest]
    fn should_fit_curve_with_asymptote_below_one() {
        let fit = fit_sigmoid_two_points([15., 50.], [0.001, 0.5], 0.6, &FitCriteria::default());

        assert!(fit.converged);
        assert!(verify_sigmoid_fit(&fit, 0.6, (50., 0.5)));
        assert!(sigmoid_function(15., 0.6, fit.midpoint, fit.steepness) < 0.01);
    }

    #[rstest]
    fn should_report_fit_missing_target() {
        let fit = SigmoidFit {
            midpoint: 40.,
            steepness: 0.1,
            converged: true,
        };
        assert!(!verify_sigmoid_fit(&fit, 1., (60., 0.99)));
    }

    #[rstest]
    fn should_reject_fit_equal_to_start() {
        let criteria = FitCriteria::default();
        assert!(!satisfies_criteria((5., 0.2), (5., 1.), &criteria));
        assert!(!satisfies_criteria((40., -0.1), (1., 1.), &criteria));
        assert!(!satisfies_criteria((250., 0.1), (1., 1.), &criteria));
        assert!(satisfies_criteria((40., 0.1), (1., 1.), &criteria));
    }
}
