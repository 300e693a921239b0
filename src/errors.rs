use crate::core::fuel_types::FuelType;
use crate::input::ScenarioDriver;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnergyDemandError {
    #[error("Scenario input was considered invalid due to error: {0}")]
    InvalidInput(#[from] anyhow::Error),
    #[error("Scenario configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Error identified during energy demand calculation: {0}")]
    FailureInCalculation(#[from] CalculationError),
    #[error("Invariant violated during energy demand calculation: {0}")]
    InvariantViolation(#[from] InvariantViolation),
    #[error("Failed to write results: {0}")]
    OutputFailure(#[source] anyhow::Error),
}

/// Bad scenario input. These are fatal at load time.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("Enduse '{enduse}' is not defined for the {submodel} submodel")]
    UnknownEnduse { submodel: String, enduse: String },
    #[error("Technology '{technology}' used by enduse '{enduse}' is not defined")]
    UnknownTechnology { enduse: String, technology: String },
    #[error("Fuel switches of enduse '{enduse}' replace {total} of fueltype {fueltype}, which is more than 1.0")]
    FuelSwitchSharesExceedOne {
        enduse: String,
        fueltype: FuelType,
        total: f64,
    },
    #[error("Service switch of enduse '{enduse}' targets a share of {share} for technology '{technology}' above its maximum of {max_share}")]
    ServiceShareAboveMaximum {
        enduse: String,
        technology: String,
        share: f64,
        max_share: f64,
    },
    #[error("Service switches of enduse '{enduse}' target shares summing to {total}, which is more than 1.0")]
    ServiceSharesExceedOne { enduse: String, total: f64 },
    #[error("Service switches of enduse '{enduse}' cannot be satisfied: {reason}")]
    InconsistentServiceSwitch { enduse: String, reason: String },
    #[error("Fuel shares of technologies of enduse '{enduse}' for fueltype {fueltype} sum to {total} instead of 1.0")]
    FuelTechSharesNotNormalised {
        enduse: String,
        fueltype: FuelType,
        total: f64,
    },
    #[error("Enduse '{enduse}' (sector {sector:?}) has both fuel switches and service switches defined")]
    MixedSwitchKinds {
        enduse: String,
        sector: Option<String>,
    },
    #[error("Switch of enduse '{enduse}' is realised in {switch_yr}, which is not after the base year {base_yr}")]
    SwitchYearNotAfterBaseYear {
        enduse: String,
        switch_yr: u32,
        base_yr: u32,
    },
    #[error("Load profile '{id}' is invalid: {reason}")]
    InvalidLoadProfile { id: String, reason: String },
    #[error("No load profile defined for enduse '{enduse}', sector {sector:?}, technology '{technology}'")]
    MissingLoadProfile {
        enduse: String,
        sector: Option<String>,
        technology: String,
    },
    #[error("Hybrid technology '{technology}' is invalid: {reason}")]
    InvalidHybridTechnology { technology: String, reason: String },
    #[error("Missing {data} for region '{region}' in {year}")]
    MissingScenarioData {
        data: String,
        region: String,
        year: u32,
    },
    #[error("Scenario driver {driver:?} of enduse '{enduse}' is not available in the {submodel} submodel")]
    UnsupportedScenarioDriver {
        submodel: String,
        enduse: String,
        driver: ScenarioDriver,
    },
    #[error("No weather station available to serve region '{region}'")]
    NoWeatherStation { region: String },
}

/// Failures of a single enduse calculation for which no valid output can be produced.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CalculationError {
    #[error("Enduse '{enduse}' in region '{region}' has fuel but neither technologies nor a load profile")]
    EnduseWithoutProfile { region: String, enduse: String },
    #[error("Technology '{technology}' of enduse '{enduse}' is missing from the technology stock of region '{region}'")]
    TechnologyNotInStock {
        region: String,
        enduse: String,
        technology: String,
    },
}

/// A broken invariant signals a logic defect rather than data noise.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum InvariantViolation {
    #[error("Disaggregated fuel of enduse '{enduse}' (sector {sector:?}) sums to {regional} across regions but the national total is {national}")]
    FuelNotConserved {
        enduse: String,
        sector: Option<String>,
        national: f64,
        regional: f64,
    },
    #[error("Service of technology '{technology}' in enduse '{enduse}' became {service} after fuel switching")]
    NegativeService {
        enduse: String,
        technology: String,
        service: f64,
    },
}
