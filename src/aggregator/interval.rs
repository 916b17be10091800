use std::time::Duration;

/// How often samples of a single aircraft are written to storage, scaled by
/// altitude. Low flying aircraft manoeuvre and are recorded densely, cruising
/// ones barely move on the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersistInterval {
    pub min: Duration,
    pub max: Duration,
    pub low_altitude: i32,
    pub high_altitude: i32,
}

impl Default for PersistInterval {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(5),
            max: Duration::from_secs(30),
            low_altitude: 5_000,
            high_altitude: 30_000,
        }
    }
}

impl PersistInterval {
    pub fn for_altitude(&self, altitude: Option<i32>) -> Duration {
        let Some(altitude) = altitude else {
            return self.min;
        };
        if altitude <= self.low_altitude {
            return self.min;
        }
        if altitude >= self.high_altitude {
            return self.max;
        }

        let fraction = f64::from(altitude - self.low_altitude)
            / f64::from(self.high_altitude - self.low_altitude);
        self.min + self.max.saturating_sub(self.min).mul_f64(fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_altitude_uses_minimum() {
        let interval = PersistInterval::default();
        assert_eq!(interval.for_altitude(None), interval.min);
    }

    #[test]
    fn clamps_at_thresholds() {
        let interval = PersistInterval::default();

        assert_eq!(interval.for_altitude(Some(interval.low_altitude)), interval.min);
        assert_eq!(interval.for_altitude(Some(-500)), interval.min);
        assert_eq!(interval.for_altitude(Some(interval.high_altitude)), interval.max);
        assert_eq!(interval.for_altitude(Some(45_000)), interval.max);
    }

    #[test]
    fn interpolates_between_thresholds() {
        let interval = PersistInterval {
            min: Duration::from_secs(10),
            max: Duration::from_secs(20),
            low_altitude: 1_000,
            high_altitude: 3_000,
        };

        assert_eq!(interval.for_altitude(Some(2_000)), Duration::from_secs(15));
        assert_eq!(interval.for_altitude(Some(1_500)), Duration::from_millis(12_500));

        let just_above = interval.for_altitude(Some(1_001));
        assert!(just_above > interval.min && just_above < interval.max);
    }
}
