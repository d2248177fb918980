//! Mockable wall clock behind the `now` and `utcnow` dependencies.

use chrono::{DateTime, Local, Utc};

/// Fixed readings, when set, replace the real clock.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Clock {
    now: Option<DateTime<Local>>,
    utcnow: Option<DateTime<Utc>>,
}

impl Clock {
    pub fn set_now(&mut self, now: DateTime<Local>) {
        self.now = Some(now);
    }

    pub fn set_utcnow(&mut self, utcnow: DateTime<Utc>) {
        self.utcnow = Some(utcnow);
    }

    pub fn reset_now(&mut self) {
        self.now = None;
    }

    pub fn reset_utcnow(&mut self) {
        self.utcnow = None;
    }

    pub fn now(&self) -> DateTime<Local> {
        self.now.unwrap_or_else(Local::now)
    }

    pub fn utcnow(&self) -> DateTime<Utc> {
        self.utcnow.unwrap_or_else(Utc::now)
    }

    pub fn is_mocked(&self) -> bool {
        self.now.is_some() || self.utcnow.is_some()
    }
}
