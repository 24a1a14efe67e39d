use chrono::Local;

/// Format used for issue timestamps in memory, the ledger, and the audit log.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of the timestamps stamped onto issue and return events.
pub trait Clock: Send + Sync {
    fn now(&self) -> String;
}

/// Local wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> String {
        Local::now().format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Always reports the same instant. Handy for tests that compare ledger lines.
#[derive(Debug, Clone)]
pub struct FixedClock(String);

impl FixedClock {
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self(timestamp.into())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_uses_timestamp_format() {
        let now = SystemClock.now();
        assert!(chrono::NaiveDateTime::parse_from_str(&now, TIMESTAMP_FORMAT).is_ok());
    }
}
