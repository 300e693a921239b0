//! Base-year fuel shares of technologies and the fuel and service switches changing them.

use crate::core::fuel_types::{FuelType, FuelVector};
use crate::core::technologies::{placeholder_fueltype, placeholder_tech_name};
use crate::errors::ConfigurationError;
use crate::input::{FuelSwitch, ServiceSwitch, Submodel, SubmodelInput, TechnologyInput};
use indexmap::{IndexMap, IndexSet};
use strum::IntoEnumIterator;

/// Tolerance within which the fuel shares of a fueltype must sum to 1.
pub const FUEL_SHARE_TOLERANCE: f64 = 1e-5;

/// Fuel share of every technology within each fueltype of one enduse.
pub type EnduseFuelTechShares = IndexMap<FuelType, IndexMap<String, f64>>;

/// Enduse and optional sector a switch applies to. A switch without a sector applies to all
/// sectors of its enduse.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SwitchKey {
    pub enduse: String,
    pub sector: Option<String>,
}

/// The switches of one enduse and sector. Fuel and service switches never apply together.
#[derive(Clone, Debug, PartialEq)]
pub enum EnduseSwitches {
    Fuel(Vec<FuelSwitch>),
    Service(Vec<ServiceSwitch>),
}

impl EnduseSwitches {
    pub fn installed_technologies(&self) -> IndexSet<&str> {
        match self {
            EnduseSwitches::Fuel(switches) => switches
                .iter()
                .map(|switch| switch.technology_install.as_str())
                .collect(),
            EnduseSwitches::Service(switches) => switches
                .iter()
                .map(|switch| switch.technology_install.as_str())
                .collect(),
        }
    }
}

/// Fuel-tech share tables and switches of one submodel, checked for consistency.
#[derive(Clone, Debug, Default)]
pub struct SubmodelTables {
    pub fuel_tech_shares: IndexMap<String, EnduseFuelTechShares>,
    pub switches: IndexMap<SwitchKey, EnduseSwitches>,
}

impl SubmodelTables {
    pub fn new(
        submodel: Submodel,
        input: &SubmodelInput,
        definitions: &IndexMap<String, TechnologyInput>,
        base_yr: u32,
    ) -> Result<Self, ConfigurationError> {
        let switches = group_switches(submodel, input, definitions, base_yr)?;
        let mut fuel_tech_shares = IndexMap::new();

        for (enduse, shares) in &input.fuel_tech_shares {
            if !input.national_fuel.contains_key(enduse) {
                return Err(ConfigurationError::UnknownEnduse {
                    submodel: submodel.to_string(),
                    enduse: enduse.clone(),
                });
            }
            validate_fuel_tech_shares(enduse, shares, definitions)?;
            fuel_tech_shares.insert(enduse.clone(), shares.clone());
        }

        // installed technologies join the share table of their fueltype with a zero share
        for (key, enduse_switches) in &switches {
            let shares = fuel_tech_shares.entry(key.enduse.clone()).or_default();
            for technology in enduse_switches.installed_technologies() {
                let fueltype = fueltype_of(technology, definitions).ok_or_else(|| {
                    ConfigurationError::UnknownTechnology {
                        enduse: key.enduse.clone(),
                        technology: technology.to_string(),
                    }
                })?;
                shares
                    .entry(fueltype)
                    .or_default()
                    .entry(technology.to_string())
                    .or_insert(0.);
            }
        }

        for shares in fuel_tech_shares.values_mut() {
            complete_with_placeholders(shares);
        }

        Ok(Self {
            fuel_tech_shares,
            switches,
        })
    }

    /// Technologies of every enduse that runs with technologies.
    pub fn enduse_technologies(&self) -> IndexMap<String, IndexSet<String>> {
        self.fuel_tech_shares
            .iter()
            .map(|(enduse, shares)| {
                (
                    enduse.clone(),
                    shares
                        .values()
                        .flat_map(|technologies| technologies.keys().cloned())
                        .collect(),
                )
            })
            .collect()
    }

    /// Switches applying to an enduse in a sector; sector-specific switches take precedence.
    pub fn switches_for(&self, enduse: &str, sector: Option<&str>) -> Option<&EnduseSwitches> {
        let key = |sector: Option<&str>| SwitchKey {
            enduse: enduse.to_string(),
            sector: sector.map(str::to_string),
        };
        sector
            .and_then(|sector| self.switches.get(&key(Some(sector))))
            .or_else(|| self.switches.get(&key(None)))
    }
}

pub fn fueltype_of(
    technology: &str,
    definitions: &IndexMap<String, TechnologyInput>,
) -> Option<FuelType> {
    definitions
        .get(technology)
        .map(|definition| definition.fueltype)
        .or_else(|| placeholder_fueltype(technology))
}

fn validate_fuel_tech_shares(
    enduse: &str,
    shares: &EnduseFuelTechShares,
    definitions: &IndexMap<String, TechnologyInput>,
) -> Result<(), ConfigurationError> {
    for (fueltype, technologies) in shares {
        for technology in technologies.keys() {
            if fueltype_of(technology, definitions).is_none() {
                return Err(ConfigurationError::UnknownTechnology {
                    enduse: enduse.to_string(),
                    technology: technology.clone(),
                });
            }
        }
        let total: f64 = technologies.values().sum();
        if !technologies.is_empty() && (total - 1.).abs() > FUEL_SHARE_TOLERANCE {
            return Err(ConfigurationError::FuelTechSharesNotNormalised {
                enduse: enduse.to_string(),
                fueltype: *fueltype,
                total,
            });
        }
    }
    Ok(())
}

/// Give every fueltype without a configured technology a placeholder technology, so that all
/// fuel of a technology enduse is carried by some technology.
pub fn complete_with_placeholders(shares: &mut EnduseFuelTechShares) {
    for fueltype in FuelType::iter() {
        let technologies = shares.entry(fueltype).or_default();
        if technologies.values().sum::<f64>() == 0. {
            technologies.insert(placeholder_tech_name(fueltype), 1.);
        }
    }
    shares.sort_keys();
}

fn group_switches(
    submodel: Submodel,
    input: &SubmodelInput,
    definitions: &IndexMap<String, TechnologyInput>,
    base_yr: u32,
) -> Result<IndexMap<SwitchKey, EnduseSwitches>, ConfigurationError> {
    let check_common = |enduse: &str, technology: &str, switch_yr: u32| {
        if !input.national_fuel.contains_key(enduse) {
            return Err(ConfigurationError::UnknownEnduse {
                submodel: submodel.to_string(),
                enduse: enduse.to_string(),
            });
        }
        if !definitions.contains_key(technology) {
            return Err(ConfigurationError::UnknownTechnology {
                enduse: enduse.to_string(),
                technology: technology.to_string(),
            });
        }
        if switch_yr <= base_yr {
            return Err(ConfigurationError::SwitchYearNotAfterBaseYear {
                enduse: enduse.to_string(),
                switch_yr,
                base_yr,
            });
        }
        Ok(())
    };

    let mut switches: IndexMap<SwitchKey, EnduseSwitches> = IndexMap::new();

    for switch in &input.fuel_switches {
        check_common(&switch.enduse, &switch.technology_install, switch.switch_yr)?;
        let key = SwitchKey {
            enduse: switch.enduse.clone(),
            sector: switch.sector.clone(),
        };
        if let EnduseSwitches::Fuel(fuel_switches) = switches
            .entry(key)
            .or_insert_with(|| EnduseSwitches::Fuel(vec![]))
        {
            fuel_switches.push(switch.clone());
        }
    }

    for switch in &input.service_switches {
        check_common(&switch.enduse, &switch.technology_install, switch.switch_yr)?;
        let max_share = definitions[&switch.technology_install].tech_max_share;
        if switch.service_share_ey > max_share {
            return Err(ConfigurationError::ServiceShareAboveMaximum {
                enduse: switch.enduse.clone(),
                technology: switch.technology_install.clone(),
                share: switch.service_share_ey,
                max_share,
            });
        }
        let key = SwitchKey {
            enduse: switch.enduse.clone(),
            sector: switch.sector.clone(),
        };
        match switches
            .entry(key.clone())
            .or_insert_with(|| EnduseSwitches::Service(vec![]))
        {
            EnduseSwitches::Service(service_switches) => service_switches.push(switch.clone()),
            EnduseSwitches::Fuel(_) => {
                return Err(ConfigurationError::MixedSwitchKinds {
                    enduse: key.enduse,
                    sector: key.sector,
                })
            }
        }
    }

    // a sector-wide switch of one kind and a sector-specific one of the other kind collide too
    for (key, enduse_switches) in &switches {
        if key.sector.is_none() {
            continue;
        }
        let wildcard = SwitchKey {
            enduse: key.enduse.clone(),
            sector: None,
        };
        if let Some(other) = switches.get(&wildcard) {
            if std::mem::discriminant(other) != std::mem::discriminant(enduse_switches) {
                return Err(ConfigurationError::MixedSwitchKinds {
                    enduse: key.enduse.clone(),
                    sector: key.sector.clone(),
                });
            }
        }
    }

    for (key, enduse_switches) in &switches {
        match enduse_switches {
            EnduseSwitches::Fuel(fuel_switches) => {
                let mut replaced: IndexMap<FuelType, f64> = IndexMap::new();
                for switch in fuel_switches {
                    *replaced.entry(switch.fueltype_replace).or_default() +=
                        switch.fuel_share_switched_ey;
                }
                if let Some((fueltype, total)) =
                    replaced.into_iter().find(|(_, total)| *total > 1. + FUEL_SHARE_TOLERANCE)
                {
                    return Err(ConfigurationError::FuelSwitchSharesExceedOne {
                        enduse: key.enduse.clone(),
                        fueltype,
                        total,
                    });
                }
            }
            EnduseSwitches::Service(service_switches) => {
                let mut seen = IndexSet::new();
                for switch in service_switches {
                    if !seen.insert(switch.technology_install.as_str()) {
                        return Err(ConfigurationError::InconsistentServiceSwitch {
                            enduse: key.enduse.clone(),
                            reason: format!(
                                "technology '{}' is switched more than once",
                                switch.technology_install
                            ),
                        });
                    }
                }
                let total: f64 = service_switches
                    .iter()
                    .map(|switch| switch.service_share_ey)
                    .sum();
                if total > 1. + FUEL_SHARE_TOLERANCE {
                    return Err(ConfigurationError::ServiceSharesExceedOne {
                        enduse: key.enduse.clone(),
                        total,
                    });
                }
            }
        }
    }

    Ok(switches)
}

/// Fuel of an enduse carried by each of its technologies in the base year.
pub fn fuel_per_technology(
    fuel: &FuelVector,
    shares: &EnduseFuelTechShares,
) -> IndexMap<String, f64> {
    let mut fuel_tech = IndexMap::new();
    for (fueltype, technologies) in shares {
        for (technology, share) in technologies {
            *fuel_tech.entry(technology.clone()).or_insert(0.) += fuel[*fueltype] * share;
        }
    }
    fuel_tech
}
