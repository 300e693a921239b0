use tracing::{debug, warn};

pub fn min_of_2<T: PartialOrd + Copy>(first: T, second: T) -> T {
    if first < second {
        first
    } else {
        second
    }
}

pub fn max_of_2<T: PartialOrd + Copy>(first: T, second: T) -> T {
    if first > second {
        first
    } else {
        second
    }
}

/// Ratio of two values where a zero denominator means "no change".
pub(crate) fn ratio_or_unity(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0. {
        if numerator == 0. {
            debug!("Ratio 0/0 treated as no change");
        } else {
            warn!("Ratio {numerator}/{denominator} has a zero denominator, using 1 instead");
        }
        1.
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    #[rstest]
    pub fn should_calc_2_as_min_of_2_and_4_ints() {
        assert_eq!(min_of_2(2, 4), 2);
    }

    #[rstest]
    pub fn should_calc_4_as_max_of_4_and_2_floats() {
        assert_eq!(max_of_2(4., 2.), 4.);
    }

    /// Collects formatted log lines written by a subscriber.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn logs_of(action: impl FnOnce()) -> String {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, action);
        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[rstest]
    fn should_treat_zero_denominator_as_no_change() {
        assert_eq!(ratio_or_unity(5., 0.), 1.);
        assert_eq!(ratio_or_unity(0., 0.), 1.);
        assert_eq!(ratio_or_unity(5., 2.), 2.5);
    }

    #[rstest]
    fn should_warn_about_zero_denominator() {
        let logs = logs_of(|| {
            ratio_or_unity(5., 0.);
        });
        assert!(logs.contains("WARN"), "{logs}");
        assert!(logs.contains("Ratio 5/0 has a zero denominator"), "{logs}");

        let logs = logs_of(|| {
            ratio_or_unity(5., 2.);
        });
        assert_eq!(logs, "");
    }
}
