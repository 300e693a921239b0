/// A simple statistics module with helpers for daily load shapes.
use crate::core::units::DayHours;
use ordered_float::OrderedFloat;
use statrs::statistics::Statistics;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.;
    }
    values.iter().mean()
}

/// Index of the largest value; the first index wins ties.
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .rev()
        .max_by_key(|(_, value)| OrderedFloat(**value))
        .map(|(idx, _)| idx)
}

/// Load factor of a day: mean hourly demand divided by peak hourly demand.
/// Days without demand have no load factor.
pub fn daily_load_factor(day: &DayHours) -> Option<f64> {
    let peak = day.iter().copied().fold(f64::MIN, f64::max);
    if peak <= 0. {
        return None;
    }
    Some(mean(day) / peak)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::units::HOURS_PER_DAY;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn peaky_day() -> DayHours {
        let mut day = [1.; HOURS_PER_DAY];
        day[18] = 4.;
        day
    }

    #[rstest]
    fn test_mean() {
        assert_relative_eq!(mean(&[1., 2., 3., 6.]), 3.);
        assert_eq!(mean(&[]), 0.);
    }

    #[rstest]
    fn test_argmax_takes_first_of_equal_values() {
        assert_eq!(argmax(&[1., 5., 2., 5.]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[rstest]
    fn test_daily_load_factor(peaky_day: DayHours) {
        assert_relative_eq!(daily_load_factor(&peaky_day).unwrap(), (27. / 24.) / 4.);
        assert_eq!(daily_load_factor(&[0.; HOURS_PER_DAY]), None);
        assert_relative_eq!(daily_load_factor(&[2.; HOURS_PER_DAY]).unwrap(), 1.);
    }
}
