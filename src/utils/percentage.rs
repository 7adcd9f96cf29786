use std::{fmt::Display, ops::Deref, time::Duration};

/// Share of a whole, `0..=100`. Formatting honours precision, so `{:.2}` prints `66.67%`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match f.precision() {
            Some(precision) => write!(f, "{:.*}%", precision, self.0),
            None => write!(f, "{}%", self.0),
        }
    }
}

impl Percentage {
    pub fn new_opt(value: f64) -> Option<Percentage> {
        if value < 0. || value.is_nan() {
            None
        } else {
            Some(Percentage(value))
        }
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Returns `None` when `whole` is zero.
pub fn duration_percentage(value: Duration, whole: Duration) -> Option<Percentage> {
    if whole.is_zero() {
        return None;
    }
    Percentage::new_opt(value.as_secs_f64() / whole.as_secs_f64() * 100.)
}
