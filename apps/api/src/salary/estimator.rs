//! Salary Estimator: a display range around a location median, shifted up for
//! senior titles.

use serde::Serialize;

/// Half-width of the base range around the median.
pub const RANGE_PCT: f64 = 0.2;

/// Floors at or above this value drop rows whose estimate falls short.
pub const STRICT_FLOOR: i64 = 100_000;

const LEADERSHIP_MARKERS: &[&str] = &["principal", "staff", "lead ", "lead-", "head of", "director"];
const SENIOR_MARKERS: &[&str] = &["senior", "sr ", "sr.", "expert"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeniorityBucket {
    Standard,
    Senior,
    Leadership,
}

impl SeniorityBucket {
    /// Leadership markers win over senior ones.
    pub fn from_title(title: &str) -> Self {
        let lowered = title.to_lowercase();
        if LEADERSHIP_MARKERS.iter().any(|m| lowered.contains(m)) {
            SeniorityBucket::Leadership
        } else if SENIOR_MARKERS.iter().any(|m| lowered.contains(m)) {
            SeniorityBucket::Senior
        } else {
            SeniorityBucket::Standard
        }
    }

    pub fn factor(self) -> f64 {
        match self {
            SeniorityBucket::Standard => 1.0,
            SeniorityBucket::Senior => 1.05,
            SeniorityBucket::Leadership => 1.10,
        }
    }
}

/// Range snapped to the 10k grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalaryRange {
    pub low: i64,
    pub high: i64,
    pub low_display: String,
    pub high_display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalaryEstimate {
    pub low: i64,
    pub high: i64,
    pub low_display: String,
    pub high_display: String,
    /// `"{low}–{high}"` with an en dash.
    pub display: String,
    /// Present only when a seniority uplift applied.
    pub uplift: Option<f64>,
}

/// `median ± pct`, low rounded down and high rounded up to the 10k grid.
/// Returns `None` for a non-positive or non-finite median.
pub fn salary_range_around(median: f64, pct: f64) -> Option<SalaryRange> {
    if !median.is_finite() || median <= 0.0 {
        return None;
    }
    let low = floor_to_grid(median * (1.0 - pct));
    let high = ceil_to_grid(median * (1.0 + pct));
    Some(SalaryRange {
        low,
        high,
        low_display: compact_salary(low as f64),
        high_display: compact_salary(high as f64),
    })
}

fn floor_to_grid(value: f64) -> i64 {
    if value < 1000.0 {
        return value as i64;
    }
    let thousands = (value / 1000.0).floor() as i64;
    let snapped = (thousands / 10) * 10;
    let snapped = if snapped <= 0 { thousands.max(1) } else { snapped };
    snapped * 1000
}

fn ceil_to_grid(value: f64) -> i64 {
    if value < 1000.0 {
        return value as i64;
    }
    let thousands = ((value + 999.0) / 1000.0).floor() as i64;
    let snapped = ((thousands + 9) / 10) * 10;
    let snapped = if snapped <= 0 { thousands.max(1) } else { snapped };
    snapped * 1000
}

/// Human-readable magnitude: `950`, `110k`, `1.2M`, `2M`.
///
/// Thousands are rounded to the nearest 10k; halves round to even.
pub fn compact_salary(value: f64) -> String {
    if value < 1000.0 {
        return format!("{}", value.round_ties_even() as i64);
    }
    let thousands = (value / 1000.0).round_ties_even() as i64;
    if thousands < 1000 {
        let mut rounded = ((thousands as f64 / 10.0).round_ties_even() * 10.0) as i64;
        if rounded <= 0 {
            rounded = thousands.max(1);
        }
        return format!("{rounded}k");
    }
    let millions = (value / 1_000_000.0 * 10.0).round_ties_even() / 10.0;
    if millions.fract() == 0.0 {
        format!("{}M", millions as i64)
    } else {
        format!("{millions}M")
    }
}

/// Estimate for one job. `None` when there is no usable median.
pub fn estimate(median: Option<f64>, title: &str) -> Option<SalaryEstimate> {
    let median = median?;
    let base = salary_range_around(median, RANGE_PCT)?;
    let factor = SeniorityBucket::from_title(title).factor();

    if factor <= 1.0 {
        return Some(SalaryEstimate {
            low: base.low,
            high: base.high,
            display: format!("{}\u{2013}{}", base.low_display, base.high_display),
            low_display: base.low_display,
            high_display: base.high_display,
            uplift: None,
        });
    }

    // The uplift shifts both bounds; the shifted values are compacted but not
    // snapped back to the grid.
    let amount = median * (factor - 1.0);
    let low = base.low as f64 + amount;
    let high = base.high as f64 + amount;
    let low_display = compact_salary(low);
    let high_display = compact_salary(high);
    Some(SalaryEstimate {
        low: low as i64,
        high: high as i64,
        display: format!("{low_display}\u{2013}{high_display}"),
        low_display,
        high_display,
        uplift: Some(factor),
    })
}

/// Whether a row survives the salary floor. Only floors of 100k and above
/// filter; the basis is the estimated high end, else the raw median, and a row
/// with neither is dropped. The comparison is inclusive.
pub fn passes_salary_floor(
    floor: Option<i64>,
    median: Option<f64>,
    estimate: Option<&SalaryEstimate>,
) -> bool {
    let Some(floor) = floor.filter(|f| *f >= STRICT_FLOOR) else {
        return true;
    };
    let basis = estimate.map(|e| e.high as f64).or(median);
    basis.is_some_and(|b| b >= floor as f64)
}
