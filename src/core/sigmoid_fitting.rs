//! Diffusion of technology service shares under fuel and service switches.
//!
//! Switches are turned into a target service share per technology for the switch year. The
//! growth of every technology gaining share is described by a sigmoid curve fitted through its
//! base-year and target share; technologies losing share give up service in proportion to their
//! total loss.

use crate::compare_floats::{max_of_2, min_of_2};
use crate::core::diffusion::{sigmoid_function, translate_year};
use crate::core::fuel_types::{FuelType, FuelVector};
use crate::core::solvers::{fit_sigmoid_two_points, verify_sigmoid_fit, FitCriteria};
use crate::core::switches::{fueltype_of, EnduseFuelTechShares, EnduseSwitches};
use crate::errors::{ConfigurationError, EnergyDemandError, InvariantViolation};
use crate::input::{FuelSwitch, ServiceSwitch, TechnologyInput};
use indexmap::IndexMap;
use itertools::Itertools;
use tracing::{debug, warn};

/// Shares closer than this are considered unchanged.
const SHARE_TOLERANCE: f64 = 1e-6;
/// Smallest share placed on a sigmoid curve; a curve cannot start at zero.
const MIN_SHARE_FIT: f64 = 0.001;
/// Fraction of the asymptote below which the target share of a fit is kept.
const MAX_FRACTION_OF_L: f64 = 1. - 0.001;
/// Negative service shares of at most this size are rounding noise and clamped to zero.
pub const NEGATIVE_SERVICE_TOLERANCE: f64 = 1e-6;

/// Technologies of an enduse grouped by the direction of their service share change.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TechFutureService {
    pub increasing: Vec<String>,
    pub decreasing: Vec<String>,
    pub constant: Vec<String>,
}

pub fn get_tech_future_service(
    service_by_p: &IndexMap<String, f64>,
    service_ey_p: &IndexMap<String, f64>,
) -> TechFutureService {
    let mut future = TechFutureService::default();
    for (technology, share_by) in service_by_p {
        let share_ey = service_ey_p.get(technology).copied().unwrap_or(*share_by);
        let group = if share_ey > share_by + SHARE_TOLERANCE {
            &mut future.increasing
        } else if share_ey < share_by - SHARE_TOLERANCE {
            &mut future.decreasing
        } else {
            &mut future.constant
        };
        group.push(technology.clone());
    }
    future
}

/// Base-year service share of every technology of an enduse, with service valued at the
/// technologies' base-year efficiencies.
pub fn service_shares_by(
    fuel: &FuelVector,
    shares: &EnduseFuelTechShares,
    definitions: &IndexMap<String, TechnologyInput>,
) -> IndexMap<String, f64> {
    let mut service: IndexMap<String, f64> = IndexMap::new();
    for (fueltype, technologies) in shares {
        for (technology, share) in technologies {
            let eff_by = definitions
                .get(technology)
                .map_or(1., |definition| definition.eff_by);
            *service.entry(technology.clone()).or_default() += fuel[*fueltype] * share * eff_by;
        }
    }

    let total: f64 = service.values().sum();
    if total > 0. {
        service.values_mut().for_each(|value| *value /= total);
    }
    service
}

fn fueltype_service_shares(
    service_p: &IndexMap<String, f64>,
    definitions: &IndexMap<String, TechnologyInput>,
) -> IndexMap<FuelType, f64> {
    let mut shares = IndexMap::new();
    for (technology, share) in service_p {
        if let Some(fueltype) = fueltype_of(technology, definitions) {
            *shares.entry(fueltype).or_default() += share;
        }
    }
    shares
}

/// Fraction of the replaced fueltype moved by a fuel switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchFraction {
    /// The share switched by the switch year.
    Target,
    /// The whole fueltype, giving the maximum service a technology could reach.
    Maximal,
}

/// Service shares after fuel switches.
///
/// Each switch takes the switched fraction of the replaced fueltype's service from the
/// technologies of that fueltype, in proportion to their service, and hands it to the installed
/// technology.
pub fn calc_service_fuel_switched(
    enduse: &str,
    service_by_p: &IndexMap<String, f64>,
    fuel_switches: &[FuelSwitch],
    definitions: &IndexMap<String, TechnologyInput>,
    fraction: SwitchFraction,
) -> Result<IndexMap<String, f64>, InvariantViolation> {
    let mut service_p = service_by_p.clone();

    for switch in fuel_switches {
        let switched_fraction = match fraction {
            SwitchFraction::Target => switch.fuel_share_switched_ey,
            SwitchFraction::Maximal => 1.,
        };
        for (technology, share_by) in service_by_p {
            if technology == &switch.technology_install
                || fueltype_of(technology, definitions) != Some(switch.fueltype_replace)
            {
                continue;
            }
            let switched = share_by * switched_fraction;
            *service_p.entry(technology.clone()).or_default() -= switched;
            *service_p
                .entry(switch.technology_install.clone())
                .or_default() += switched;
        }
    }

    for (technology, service) in service_p.iter_mut() {
        if *service < -NEGATIVE_SERVICE_TOLERANCE {
            return Err(InvariantViolation::NegativeService {
                enduse: enduse.to_string(),
                technology: technology.clone(),
                service: *service,
            });
        }
        *service = max_of_2(*service, 0.);
    }
    Ok(service_p)
}

/// Maximum service share (sigmoid asymptote L) of each technology installed by switches.
///
/// Under fuel switches this is the share reached when the entire replaced fueltypes are
/// switched, limited by the technology's maximum share. Under service switches it is the
/// maximum share itself.
pub fn tech_l_sigmoid(
    enduse: &str,
    service_by_p: &IndexMap<String, f64>,
    switches: &EnduseSwitches,
    definitions: &IndexMap<String, TechnologyInput>,
) -> Result<IndexMap<String, f64>, InvariantViolation> {
    let max_share = |technology: &str| {
        definitions
            .get(technology)
            .map_or(1., |definition| definition.tech_max_share)
    };

    let mut l_values = IndexMap::new();
    for technology in switches.installed_technologies() {
        let l_value = match switches {
            EnduseSwitches::Fuel(fuel_switches) => {
                // a maximal switch moves the whole fueltype, so each fueltype is replaced once
                let own_switches: Vec<FuelSwitch> = fuel_switches
                    .iter()
                    .filter(|switch| switch.technology_install == technology)
                    .unique_by(|switch| switch.fueltype_replace)
                    .cloned()
                    .collect();
                let maximal = calc_service_fuel_switched(
                    enduse,
                    service_by_p,
                    &own_switches,
                    definitions,
                    SwitchFraction::Maximal,
                )?;
                min_of_2(
                    maximal.get(technology).copied().unwrap_or_default(),
                    max_share(technology),
                )
            }
            EnduseSwitches::Service(_) => max_share(technology),
        };
        l_values.insert(technology.to_string(), l_value);
    }
    Ok(l_values)
}

/// Target service shares under service switches. Technologies without a switch share the
/// remaining service in proportion to their base-year shares.
pub fn service_switch_shares_ey(
    enduse: &str,
    service_by_p: &IndexMap<String, f64>,
    service_switches: &[ServiceSwitch],
) -> Result<IndexMap<String, f64>, ConfigurationError> {
    let specified: IndexMap<&str, f64> = service_switches
        .iter()
        .map(|switch| (switch.technology_install.as_str(), switch.service_share_ey))
        .collect();
    let remaining = 1. - specified.values().sum::<f64>();
    let unspecified_by: f64 = service_by_p
        .iter()
        .filter(|(technology, _)| !specified.contains_key(technology.as_str()))
        .map(|(_, share)| share)
        .sum();

    if unspecified_by <= 0. && remaining > SHARE_TOLERANCE {
        return Err(ConfigurationError::InconsistentServiceSwitch {
            enduse: enduse.to_string(),
            reason: format!(
                "a service share of {remaining} is left to technologies without base year service"
            ),
        });
    }

    let mut service_ey_p: IndexMap<String, f64> = service_by_p
        .iter()
        .map(|(technology, share_by)| {
            let share_ey = match specified.get(technology.as_str()) {
                Some(share) => *share,
                None if unspecified_by > 0. => share_by * max_of_2(remaining, 0.) / unspecified_by,
                None => 0.,
            };
            (technology.clone(), share_ey)
        })
        .collect();
    for (technology, share) in &specified {
        service_ey_p
            .entry(technology.to_string())
            .or_insert(*share);
    }
    Ok(service_ey_p)
}

/// Parameters of a fitted service share diffusion curve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SigmoidParameters {
    pub midpoint: f64,
    pub steepness: f64,
    pub l_parameter: f64,
}

/// Fit a sigmoid curve for every technology gaining service share, through its share at market
/// entry (or the base year) and its target share in the switch year.
#[allow(clippy::too_many_arguments)]
pub fn tech_sigmoid_parameters(
    enduse: &str,
    base_yr: u32,
    increasing: &[String],
    service_by_p: &IndexMap<String, f64>,
    service_ey_p: &IndexMap<String, f64>,
    l_values: &IndexMap<String, f64>,
    switch_yrs: &IndexMap<String, u32>,
    definitions: &IndexMap<String, TechnologyInput>,
    criteria: &FitCriteria,
) -> Result<IndexMap<String, SigmoidParameters>, ConfigurationError> {
    let mut parameters = IndexMap::new();

    for technology in increasing {
        let share_ey = service_ey_p.get(technology).copied().unwrap_or_default();
        let share_by = service_by_p.get(technology).copied().unwrap_or_default();
        let l_value = l_values.get(technology).copied().unwrap_or(1.);
        let switch_yr = switch_yrs.get(technology).copied().unwrap_or(base_yr);

        if share_ey > l_value + SHARE_TOLERANCE {
            return Err(ConfigurationError::ServiceShareAboveMaximum {
                enduse: enduse.to_string(),
                technology: technology.clone(),
                share: share_ey,
                max_share: l_value,
            });
        }

        let start_yr = definitions
            .get(technology)
            .and_then(|definition| definition.market_entry)
            .map_or(base_yr, |market_entry| max_of_2(market_entry, base_yr));
        if start_yr >= switch_yr {
            return Err(ConfigurationError::InconsistentServiceSwitch {
                enduse: enduse.to_string(),
                reason: format!(
                    "technology '{technology}' enters the market in {start_yr}, not before its switch year {switch_yr}"
                ),
            });
        }

        let y_ey = if share_ey >= l_value * MAX_FRACTION_OF_L {
            l_value * MAX_FRACTION_OF_L
        } else {
            share_ey
        };
        let mut y_by = max_of_2(share_by, MIN_SHARE_FIT);
        if y_by >= y_ey {
            y_by = y_ey / 2.;
        }

        let xdata = [translate_year(start_yr), translate_year(switch_yr)];
        let ydata = [y_by, y_ey];
        let fit = fit_sigmoid_two_points(xdata, ydata, l_value, criteria);
        verify_sigmoid_fit(&fit, l_value, (xdata[1], ydata[1]));
        debug!(
            "Sigmoid of '{technology}' in '{enduse}': midpoint {}, steepness {}, L {l_value}",
            fit.midpoint, fit.steepness
        );

        parameters.insert(
            technology.clone(),
            SigmoidParameters {
                midpoint: fit.midpoint,
                steepness: fit.steepness,
                l_parameter: l_value,
            },
        );
    }

    Ok(parameters)
}

/// Service share path of one technology under a switch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TechDiffusion {
    pub share_by: f64,
    pub share_ey: f64,
    pub switch_yr: u32,
    /// Fitted curve of technologies gaining share.
    pub sigmoid: Option<SigmoidParameters>,
}

/// Service share diffusion of all technologies of one enduse and sector.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceDiffusion {
    base_yr: u32,
    technologies: IndexMap<String, TechDiffusion>,
}

impl ServiceDiffusion {
    /// Derive target shares from the switches and fit the diffusion curves, based on the
    /// national base-year fuel of the enduse and sector.
    pub fn fit(
        enduse: &str,
        switches: &EnduseSwitches,
        fuel_by: &FuelVector,
        shares: &EnduseFuelTechShares,
        definitions: &IndexMap<String, TechnologyInput>,
        base_yr: u32,
        criteria: &FitCriteria,
    ) -> Result<Self, EnergyDemandError> {
        let service_by_p = service_shares_by(fuel_by, shares, definitions);

        let (service_ey_p, switch_yrs, enduse_switch_yr) = match switches {
            EnduseSwitches::Fuel(fuel_switches) => {
                let service_ey_p = calc_service_fuel_switched(
                    enduse,
                    &service_by_p,
                    fuel_switches,
                    definitions,
                    SwitchFraction::Target,
                )?;
                let mut switch_yrs: IndexMap<String, u32> = IndexMap::new();
                for switch in fuel_switches {
                    let year = switch_yrs
                        .entry(switch.technology_install.clone())
                        .or_insert(switch.switch_yr);
                    *year = max_of_2(*year, switch.switch_yr);
                }
                let enduse_switch_yr = fuel_switches
                    .iter()
                    .map(|switch| switch.switch_yr)
                    .max()
                    .unwrap_or(base_yr);
                (service_ey_p, switch_yrs, enduse_switch_yr)
            }
            EnduseSwitches::Service(service_switches) => {
                let service_ey_p =
                    service_switch_shares_ey(enduse, &service_by_p, service_switches)?;
                let switch_yrs = service_switches
                    .iter()
                    .map(|switch| (switch.technology_install.clone(), switch.switch_yr))
                    .collect();
                let enduse_switch_yr = service_switches
                    .iter()
                    .map(|switch| switch.switch_yr)
                    .max()
                    .unwrap_or(base_yr);
                (service_ey_p, switch_yrs, enduse_switch_yr)
            }
        };

        for (fueltype, share) in fueltype_service_shares(&service_ey_p, definitions) {
            debug!("Service share of {fueltype} in '{enduse}' after switches: {share}");
        }

        let future = get_tech_future_service(&service_by_p, &service_ey_p);
        let mut l_values = tech_l_sigmoid(enduse, &service_by_p, switches, definitions)?;
        let mut switch_yrs = switch_yrs;
        for technology in &future.increasing {
            // technologies growing only to fill the gap left by others
            l_values.entry(technology.clone()).or_insert_with(|| {
                definitions
                    .get(technology)
                    .map_or(1., |definition| definition.tech_max_share)
            });
            switch_yrs
                .entry(technology.clone())
                .or_insert(enduse_switch_yr);
        }

        let mut sigmoids = tech_sigmoid_parameters(
            enduse,
            base_yr,
            &future.increasing,
            &service_by_p,
            &service_ey_p,
            &l_values,
            &switch_yrs,
            definitions,
            criteria,
        )?;

        let technologies = service_by_p
            .iter()
            .map(|(technology, share_by)| {
                (
                    technology.clone(),
                    TechDiffusion {
                        share_by: *share_by,
                        share_ey: service_ey_p.get(technology).copied().unwrap_or(*share_by),
                        switch_yr: switch_yrs
                            .get(technology)
                            .copied()
                            .unwrap_or(enduse_switch_yr),
                        sigmoid: sigmoids.shift_remove(technology),
                    },
                )
            })
            .collect();

        Ok(Self {
            base_yr,
            technologies,
        })
    }

    pub fn technologies(&self) -> &IndexMap<String, TechDiffusion> {
        &self.technologies
    }

    /// Whether no technology changes its service share.
    pub fn is_noop(&self) -> bool {
        self.technologies
            .values()
            .all(|diffusion| (diffusion.share_ey - diffusion.share_by).abs() <= SHARE_TOLERANCE)
    }

    /// National service share of every technology in `curr_yr`.
    pub fn service_shares_cy(&self, curr_yr: u32) -> IndexMap<String, f64> {
        if curr_yr <= self.base_yr {
            return self.shares_by();
        }

        let mut shares_cy = IndexMap::new();
        let mut total_increase = 0.;
        let mut decrease_weight = 0.;

        for (technology, diffusion) in &self.technologies {
            let share = if diffusion.share_ey > diffusion.share_by + SHARE_TOLERANCE {
                let share = if curr_yr >= diffusion.switch_yr {
                    diffusion.share_ey
                } else {
                    let on_curve = diffusion.sigmoid.map_or(diffusion.share_by, |sigmoid| {
                        sigmoid_function(
                            translate_year(curr_yr),
                            sigmoid.l_parameter,
                            sigmoid.midpoint,
                            sigmoid.steepness,
                        )
                    });
                    on_curve.clamp(diffusion.share_by, diffusion.share_ey)
                };
                total_increase += share - diffusion.share_by;
                share
            } else {
                if diffusion.share_ey < diffusion.share_by - SHARE_TOLERANCE {
                    decrease_weight += diffusion.share_by - diffusion.share_ey;
                }
                diffusion.share_by
            };
            shares_cy.insert(technology.clone(), share);
        }

        if decrease_weight > 0. {
            for (technology, diffusion) in &self.technologies {
                if diffusion.share_ey < diffusion.share_by - SHARE_TOLERANCE {
                    let loss = total_increase * (diffusion.share_by - diffusion.share_ey)
                        / decrease_weight;
                    shares_cy[technology] = diffusion.share_by - loss;
                }
            }
        } else if total_increase > SHARE_TOLERANCE {
            warn!("Service share gained by technologies is not taken from any technology");
        }

        shares_cy
    }

    fn shares_by(&self) -> IndexMap<String, f64> {
        self.technologies
            .iter()
            .map(|(technology, diffusion)| (technology.clone(), diffusion.share_by))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::switches::complete_with_placeholders;
    use crate::input::TechType;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn technology(name: &str, fueltype: FuelType, eff_by: f64) -> TechnologyInput {
        TechnologyInput {
            name: name.to_string(),
            fueltype,
            eff_by,
            eff_ey: eff_by,
            year_eff_ey: 2050,
            eff_achieved: 1.,
            diff_method: Default::default(),
            market_entry: None,
            tech_max_share: 1.,
            tech_type: TechType::Boiler,
            description: None,
            cop_slope: None,
            hybrid: None,
        }
    }

    #[fixture]
    fn definitions() -> IndexMap<String, TechnologyInput> {
        [
            technology("boiler_gas", FuelType::Gas, 1.),
            technology("fire_gas", FuelType::Gas, 1.),
            technology("boiler_oil", FuelType::Oil, 1.),
            technology("heat_pump", FuelType::Electricity, 1.),
        ]
        .into_iter()
        .map(|definition| (definition.name.clone(), definition))
        .collect()
    }

    fn shares(values: &[(&str, f64)]) -> IndexMap<String, f64> {
        values
            .iter()
            .map(|(technology, share)| (technology.to_string(), *share))
            .collect()
    }

    fn fuel_switch(fueltype_replace: FuelType, share: f64) -> FuelSwitch {
        FuelSwitch {
            enduse: "rs_space_heating".to_string(),
            sector: None,
            fueltype_replace,
            technology_install: "heat_pump".to_string(),
            switch_yr: 2050,
            fuel_share_switched_ey: share,
        }
    }

    #[rstest]
    fn should_partition_technologies_by_future_service() {
        let future = get_tech_future_service(
            &shares(&[("a", 0.5), ("b", 0.3), ("c", 0.2)]),
            &shares(&[("a", 0.7), ("b", 0.1), ("c", 0.2)]),
        );

        assert_eq!(future.increasing, vec!["a".to_string()]);
        assert_eq!(future.decreasing, vec!["b".to_string()]);
        assert_eq!(future.constant, vec!["c".to_string()]);
    }

    #[rstest]
    fn should_move_switched_service_proportionally(
        definitions: IndexMap<String, TechnologyInput>,
    ) {
        let service_by_p = shares(&[
            ("boiler_gas", 0.45),
            ("fire_gas", 0.15),
            ("boiler_oil", 0.4),
            ("heat_pump", 0.),
        ]);

        let switched = calc_service_fuel_switched(
            "rs_space_heating",
            &service_by_p,
            &[fuel_switch(FuelType::Gas, 0.5)],
            &definitions,
            SwitchFraction::Target,
        )
        .unwrap();

        assert_relative_eq!(switched["boiler_gas"], 0.225);
        assert_relative_eq!(switched["fire_gas"], 0.075);
        assert_relative_eq!(switched["boiler_oil"], 0.4);
        assert_relative_eq!(switched["heat_pump"], 0.3);
        assert_relative_eq!(switched.values().sum::<f64>(), 1.);
    }

    #[rstest]
    fn should_never_produce_negative_service(definitions: IndexMap<String, TechnologyInput>) {
        let service_by_p = shares(&[("boiler_gas", 0.6), ("boiler_oil", 0.4), ("heat_pump", 0.)]);
        let switches = [
            fuel_switch(FuelType::Gas, 0.7),
            fuel_switch(FuelType::Gas, 0.3),
            fuel_switch(FuelType::Oil, 1.),
        ];

        let switched = calc_service_fuel_switched(
            "rs_space_heating",
            &service_by_p,
            &switches,
            &definitions,
            SwitchFraction::Target,
        )
        .unwrap();

        assert!(switched.values().all(|service| *service >= 0.));
        assert_relative_eq!(switched["heat_pump"], 1.);

        let overlapping = [fuel_switch(FuelType::Gas, 0.8), fuel_switch(FuelType::Gas, 0.8)];
        assert!(matches!(
            calc_service_fuel_switched(
                "rs_space_heating",
                &service_by_p,
                &overlapping,
                &definitions,
                SwitchFraction::Target,
            ),
            Err(InvariantViolation::NegativeService { .. })
        ));
    }

    #[rstest]
    fn should_limit_l_to_eligible_fueltype_and_max_share(
        mut definitions: IndexMap<String, TechnologyInput>,
    ) {
        let service_by_p = shares(&[("boiler_gas", 0.6), ("boiler_oil", 0.3), ("heat_pump", 0.1)]);
        let switches = EnduseSwitches::Fuel(vec![fuel_switch(FuelType::Gas, 0.5)]);

        let l_values =
            tech_l_sigmoid("rs_space_heating", &service_by_p, &switches, &definitions).unwrap();
        assert_relative_eq!(l_values["heat_pump"], 0.7);

        definitions["heat_pump"].tech_max_share = 0.5;
        let l_values =
            tech_l_sigmoid("rs_space_heating", &service_by_p, &switches, &definitions).unwrap();
        assert_relative_eq!(l_values["heat_pump"], 0.5);
    }

    #[rstest]
    fn should_count_each_replaced_fueltype_once_in_l(
        definitions: IndexMap<String, TechnologyInput>,
    ) {
        let service_by_p = shares(&[("boiler_gas", 0.6), ("boiler_oil", 0.3), ("heat_pump", 0.1)]);
        let switches = EnduseSwitches::Fuel(vec![
            fuel_switch(FuelType::Gas, 0.3),
            fuel_switch(FuelType::Gas, 0.3),
            fuel_switch(FuelType::Oil, 0.2),
        ]);

        let l_values =
            tech_l_sigmoid("rs_space_heating", &service_by_p, &switches, &definitions).unwrap();
        assert_relative_eq!(l_values["heat_pump"], 1.);
    }

    #[rstest]
    fn should_fill_remaining_service_proportionally() {
        let service_by_p = shares(&[("a", 0.6), ("b", 0.3), ("c", 0.1)]);
        let switch = ServiceSwitch {
            enduse: "rs_lighting".to_string(),
            sector: None,
            technology_install: "c".to_string(),
            service_share_ey: 0.55,
            switch_yr: 2050,
        };

        let service_ey_p =
            service_switch_shares_ey("rs_lighting", &service_by_p, &[switch]).unwrap();

        assert_relative_eq!(service_ey_p["a"], 0.3);
        assert_relative_eq!(service_ey_p["b"], 0.15);
        assert_relative_eq!(service_ey_p["c"], 0.55);
    }

    #[rstest]
    fn fitted_curve_reproduces_target_share(definitions: IndexMap<String, TechnologyInput>) {
        let parameters = tech_sigmoid_parameters(
            "rs_space_heating",
            2020,
            &["heat_pump".to_string()],
            &shares(&[("heat_pump", 0.1)]),
            &shares(&[("heat_pump", 0.9)]),
            &shares(&[("heat_pump", 1.)]),
            &IndexMap::from([("heat_pump".to_string(), 2060)]),
            &definitions,
            &FitCriteria::default(),
        )
        .unwrap();

        let sigmoid = parameters["heat_pump"];
        let at = |year| {
            sigmoid_function(
                translate_year(year),
                sigmoid.l_parameter,
                sigmoid.midpoint,
                sigmoid.steepness,
            )
        };
        assert_relative_eq!(at(2060), 0.9, max_relative = 0.01);
        assert_relative_eq!(at(2020), 0.1, max_relative = 0.01);
    }

    #[rstest]
    fn should_reject_market_entry_after_switch_year(
        mut definitions: IndexMap<String, TechnologyInput>,
    ) {
        definitions["heat_pump"].market_entry = Some(2055);

        let result = tech_sigmoid_parameters(
            "rs_space_heating",
            2015,
            &["heat_pump".to_string()],
            &shares(&[("heat_pump", 0.)]),
            &shares(&[("heat_pump", 0.5)]),
            &shares(&[("heat_pump", 1.)]),
            &IndexMap::from([("heat_pump".to_string(), 2050)]),
            &definitions,
            &FitCriteria::default(),
        );
        assert!(matches!(
            result,
            Err(ConfigurationError::InconsistentServiceSwitch { .. })
        ));
    }

    #[fixture]
    fn fuel_tech_shares() -> EnduseFuelTechShares {
        let mut shares = IndexMap::from([
            (
                FuelType::Gas,
                IndexMap::from([("boiler_gas".to_string(), 1.)]),
            ),
            (
                FuelType::Electricity,
                IndexMap::from([("heat_pump".to_string(), 0.)]),
            ),
        ]);
        complete_with_placeholders(&mut shares);
        shares
    }

    #[rstest]
    fn fuel_switch_diffuses_towards_target_shares(
        definitions: IndexMap<String, TechnologyInput>,
        fuel_tech_shares: EnduseFuelTechShares,
    ) {
        let diffusion = ServiceDiffusion::fit(
            "rs_space_heating",
            &EnduseSwitches::Fuel(vec![fuel_switch(FuelType::Gas, 0.6)]),
            &FuelVector::single(FuelType::Gas, 1000.),
            &fuel_tech_shares,
            &definitions,
            2015,
            &FitCriteria::default(),
        )
        .unwrap();
        assert!(!diffusion.is_noop());
        assert!(diffusion.technologies()["heat_pump"].sigmoid.is_some());

        let shares_by = diffusion.service_shares_cy(2015);
        assert_relative_eq!(shares_by["boiler_gas"], 1.);

        let mut previous = 0.;
        for year in [2020, 2030, 2040, 2049] {
            let shares_cy = diffusion.service_shares_cy(year);
            let heat_pump = shares_cy["heat_pump"];
            assert!(heat_pump >= previous, "{year}: {heat_pump}");
            assert_relative_eq!(shares_cy.values().sum::<f64>(), 1., max_relative = 1e-9);
            previous = heat_pump;
        }

        let shares_ey = diffusion.service_shares_cy(2050);
        assert_relative_eq!(shares_ey["heat_pump"], 0.6);
        assert_relative_eq!(shares_ey["boiler_gas"], 0.4);
    }

    #[rstest]
    fn repeated_switches_of_one_fueltype_add_up(
        definitions: IndexMap<String, TechnologyInput>,
        fuel_tech_shares: EnduseFuelTechShares,
    ) {
        let diffusion = ServiceDiffusion::fit(
            "rs_space_heating",
            &EnduseSwitches::Fuel(vec![
                fuel_switch(FuelType::Gas, 0.3),
                fuel_switch(FuelType::Gas, 0.3),
            ]),
            &FuelVector::single(FuelType::Gas, 1000.),
            &fuel_tech_shares,
            &definitions,
            2015,
            &FitCriteria::default(),
        )
        .unwrap();

        let heat_pump = diffusion.technologies()["heat_pump"];
        assert_relative_eq!(heat_pump.share_ey, 0.6);
        assert_relative_eq!(heat_pump.sigmoid.unwrap().l_parameter, 1.);

        let shares_ey = diffusion.service_shares_cy(2050);
        assert_relative_eq!(shares_ey["heat_pump"], 0.6);
        assert_relative_eq!(shares_ey["boiler_gas"], 0.4);
    }

    #[rstest]
    fn service_switch_to_unchanged_shares_is_noop(
        definitions: IndexMap<String, TechnologyInput>,
        fuel_tech_shares: EnduseFuelTechShares,
    ) {
        let switch = ServiceSwitch {
            enduse: "rs_space_heating".to_string(),
            sector: None,
            technology_install: "boiler_gas".to_string(),
            service_share_ey: 1.,
            switch_yr: 2050,
        };
        let diffusion = ServiceDiffusion::fit(
            "rs_space_heating",
            &EnduseSwitches::Service(vec![switch]),
            &FuelVector::single(FuelType::Gas, 1000.),
            &fuel_tech_shares,
            &definitions,
            2015,
            &FitCriteria::default(),
        )
        .unwrap();

        assert!(diffusion.is_noop());
        for year in [2015, 2030, 2050, 2060] {
            assert_eq!(diffusion.service_shares_cy(year)["boiler_gas"], 1.);
        }
    }
}
