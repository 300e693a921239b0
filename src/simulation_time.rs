use crate::core::units::DAYS_PER_YEAR;
use serde::Deserialize;

/// Simulated years run from the base year to the end year in steps of whole years.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationTime {
    #[serde(rename(deserialize = "base_yr"))]
    base_year: u32,
    #[serde(rename(deserialize = "end_yr"))]
    end_year: u32,
    #[serde(default = "default_step")]
    step: u32,
    /// Days of the year (0-based) that are modelled; all days when absent.
    #[serde(default)]
    model_yeardays: Option<Vec<usize>>,
}

fn default_step() -> u32 {
    1
}

impl SimulationTime {
    pub fn new(base_year: u32, end_year: u32, step: u32) -> Self {
        Self {
            base_year,
            end_year,
            step,
            model_yeardays: None,
        }
    }

    pub fn with_model_yeardays(mut self, model_yeardays: Vec<usize>) -> Self {
        self.model_yeardays = Some(model_yeardays);
        self
    }

    pub fn base_year(&self) -> u32 {
        self.base_year
    }

    pub fn end_year(&self) -> u32 {
        self.end_year
    }

    pub fn model_yeardays(&self) -> Vec<usize> {
        match &self.model_yeardays {
            Some(days) => days.clone(),
            None => (0..DAYS_PER_YEAR).collect(),
        }
    }

    pub fn num_modelled_days(&self) -> usize {
        self.model_yeardays
            .as_ref()
            .map_or(DAYS_PER_YEAR, |days| days.len())
    }

    pub fn total_steps(&self) -> usize {
        self.iter().count()
    }

    pub fn iter(&self) -> SimulationYearIterator {
        SimulationYearIterator {
            current_index: 0,
            next_year: Some(self.base_year),
            simulation_time: self.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SimulationYearIterator {
    current_index: usize,
    next_year: Option<u32>,
    simulation_time: SimulationTime,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationYearIteration {
    pub index: usize,
    pub base_year: u32,
    pub current_year: u32,
    pub end_year: u32,
}

impl SimulationYearIteration {
    pub fn is_base_year(&self) -> bool {
        self.current_year == self.base_year
    }
}

impl Iterator for SimulationYearIterator {
    type Item = SimulationYearIteration;

    fn next(&mut self) -> Option<Self::Item> {
        let year = self.next_year?;
        let time = &self.simulation_time;
        if year > time.end_year {
            self.next_year = None;
            return None;
        }

        let iteration = SimulationYearIteration {
            index: self.current_index,
            base_year: time.base_year,
            current_year: year,
            end_year: time.end_year,
        };

        self.current_index += 1;
        // the end year is always simulated, even when the step overshoots it
        self.next_year = if year == time.end_year {
            None
        } else {
            Some((year + time.step.max(1)).min(time.end_year))
        };

        Some(iteration)
    }
}
