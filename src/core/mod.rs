pub mod demand_management;
pub mod diffusion;
pub mod disaggregation;
pub mod dwelling_stock;
pub mod enduse;
pub mod fuel_types;
pub mod load_profiles;
pub mod sigmoid_fitting;
pub(crate) mod solvers;
pub mod switches;
pub mod technologies;
pub mod units;
