use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Source of the current time. Broker and scheduler code take `&dyn Clock`
/// instead of calling `Utc::now()` directly so tests can drive time by hand.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct SimulatedClock {
    t: Mutex<DateTime<Utc>>,
}

impl SimulatedClock {
    pub fn new(t: DateTime<Utc>) -> Self {
        SimulatedClock { t: Mutex::new(t) }
    }

    pub fn set_time(&self, t: DateTime<Utc>) {
        *self.t.lock().unwrap() = t;
    }

    pub fn advance_time(&self, d: Duration) {
        let mut t = self.t.lock().unwrap();
        *t = *t + d;
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.t.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn simulated_clock_holds_time_until_advanced() {
        let start = Utc.ymd(2021, 1, 1).and_hms(0, 0, 0);
        let clock = SimulatedClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance_time(Duration::seconds(30));
        assert_eq!(clock.now(), start + Duration::seconds(30));

        let later = Utc.ymd(2021, 6, 1).and_hms(12, 0, 0);
        clock.set_time(later);
        assert_eq!(clock.now(), later);
    }
}
