use crate::core::units::{DayHours, HOURS_PER_DAY};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::ops::{AddAssign, Index, IndexMut};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

pub const NUM_FUELTYPES: usize = 8;

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FuelType {
    SolidFuel,
    Gas,
    Electricity,
    Oil,
    Biomass,
    Hydrogen,
    Heat,
    HeatSold,
}

impl FuelType {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        FuelType::iter().nth(index)
    }
}

/// Annual fuel, one scalar per fueltype.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "FuelVectorInput")]
pub struct FuelVector([f64; NUM_FUELTYPES]);

/// Fuel can be given either positionally or keyed by fueltype name.
#[derive(Deserialize)]
#[serde(untagged)]
enum FuelVectorInput {
    Positional([f64; NUM_FUELTYPES]),
    Keyed(IndexMap<FuelType, f64>),
}

impl From<FuelVectorInput> for FuelVector {
    fn from(value: FuelVectorInput) -> Self {
        match value {
            FuelVectorInput::Positional(values) => FuelVector(values),
            FuelVectorInput::Keyed(map) => {
                let mut vector = FuelVector::zeros();
                for (fueltype, value) in map {
                    vector[fueltype] = value;
                }
                vector
            }
        }
    }
}

impl FuelVector {
    pub fn new(values: [f64; NUM_FUELTYPES]) -> Self {
        Self(values)
    }

    pub fn zeros() -> Self {
        Self([0.; NUM_FUELTYPES])
    }

    pub fn single(fueltype: FuelType, value: f64) -> Self {
        let mut vector = Self::zeros();
        vector[fueltype] = value;
        vector
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn values(&self) -> &[f64; NUM_FUELTYPES] {
        &self.0
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self(self.0.map(|value| value * factor))
    }

    pub fn iter(&self) -> impl Iterator<Item = (FuelType, f64)> + '_ {
        FuelType::iter().map(|fueltype| (fueltype, self[fueltype]))
    }

    /// Fueltypes carrying a non-zero amount of fuel.
    pub fn active_fueltypes(&self) -> impl Iterator<Item = FuelType> + '_ {
        self.iter()
            .filter(|(_, value)| *value != 0.)
            .map(|(fueltype, _)| fueltype)
    }
}

impl Index<FuelType> for FuelVector {
    type Output = f64;

    fn index(&self, fueltype: FuelType) -> &Self::Output {
        &self.0[fueltype.index()]
    }
}

impl IndexMut<FuelType> for FuelVector {
    fn index_mut(&mut self, fueltype: FuelType) -> &mut Self::Output {
        &mut self.0[fueltype.index()]
    }
}

impl AddAssign for FuelVector {
    fn add_assign(&mut self, rhs: Self) {
        for (value, other) in self.0.iter_mut().zip(rhs.0) {
            *value += other;
        }
    }
}

/// Hourly fuel for every modelled day, held separately for each fueltype.
#[derive(Clone, Debug, PartialEq)]
pub struct FuelYh {
    values: [Vec<DayHours>; NUM_FUELTYPES],
}

impl FuelYh {
    pub fn zeros(num_days: usize) -> Self {
        Self {
            values: std::array::from_fn(|_| vec![[0.; HOURS_PER_DAY]; num_days]),
        }
    }

    pub fn num_days(&self) -> usize {
        self.values[0].len()
    }

    pub fn fueltype(&self, fueltype: FuelType) -> &[DayHours] {
        &self.values[fueltype.index()]
    }

    pub fn fueltype_mut(&mut self, fueltype: FuelType) -> &mut [DayHours] {
        &mut self.values[fueltype.index()]
    }

    /// Add `amount` distributed over the year by `shape` to a fueltype.
    pub fn add_distributed(&mut self, fueltype: FuelType, shape: &[DayHours], amount: f64) {
        for (day, shape_day) in self.values[fueltype.index()].iter_mut().zip(shape) {
            for (hour, share) in day.iter_mut().zip(shape_day) {
                *hour += share * amount;
            }
        }
    }

    pub fn annual_total(&self, fueltype: FuelType) -> f64 {
        self.fueltype(fueltype)
            .iter()
            .map(|day| day.iter().sum::<f64>())
            .sum()
    }

    pub fn annual(&self) -> FuelVector {
        let mut annual = FuelVector::zeros();
        for fueltype in FuelType::iter() {
            annual[fueltype] = self.annual_total(fueltype);
        }
        annual
    }

    /// Total of each day summed over every fueltype.
    pub fn daily_totals_all_fueltypes(&self) -> Vec<f64> {
        (0..self.num_days())
            .map(|day| {
                self.values
                    .iter()
                    .map(|fueltype_values| fueltype_values[day].iter().sum::<f64>())
                    .sum()
            })
            .collect()
    }

    /// The 24 hourly values of one day for every fueltype.
    pub fn day(&self, day: usize) -> [DayHours; NUM_FUELTYPES] {
        std::array::from_fn(|fueltype_idx| self.values[fueltype_idx][day])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::str::FromStr;

    #[rstest]
    fn should_have_one_slot_per_fueltype() {
        assert_eq!(FuelType::iter().count(), NUM_FUELTYPES);
        assert_eq!(FuelType::from_index(1), Some(FuelType::Gas));
        assert_eq!(FuelType::from_index(NUM_FUELTYPES), None);
    }

    #[rstest]
    #[case("solid_fuel", FuelType::SolidFuel)]
    #[case("heat_sold", FuelType::HeatSold)]
    #[case("electricity", FuelType::Electricity)]
    fn should_parse_fueltype_names(#[case] name: &str, #[case] expected: FuelType) {
        assert_eq!(FuelType::from_str(name).unwrap(), expected);
        assert_eq!(expected.to_string(), name);
    }

    #[rstest]
    fn should_deserialize_keyed_and_positional_fuel() {
        let keyed: FuelVector = serde_json::from_str(r#"{"gas": 10.0, "oil": 2.5}"#).unwrap();
        let positional: FuelVector =
            serde_json::from_str("[0.0, 10.0, 0.0, 2.5, 0.0, 0.0, 0.0, 0.0]").unwrap();

        assert_eq!(keyed, positional);
        assert_eq!(keyed.total(), 12.5);
        assert_eq!(
            keyed.active_fueltypes().collect::<Vec<_>>(),
            vec![FuelType::Gas, FuelType::Oil]
        );
    }

    #[rstest]
    fn should_distribute_fuel_over_days() {
        let mut fuel_yh = FuelYh::zeros(2);
        let shape = vec![[0.5 / 24.; HOURS_PER_DAY], [0.5 / 24.; HOURS_PER_DAY]];
        fuel_yh.add_distributed(FuelType::Electricity, &shape, 48.);

        assert_relative_eq!(fuel_yh.annual_total(FuelType::Electricity), 48.);
        assert_relative_eq!(fuel_yh.fueltype(FuelType::Electricity)[1][3], 1.);
        assert_eq!(fuel_yh.annual().total(), fuel_yh.annual_total(FuelType::Electricity));
        assert_relative_eq!(fuel_yh.daily_totals_all_fueltypes()[0], 24.);
    }
}
