//! Mines a habit's completion history to estimate its best time of day
//! and to propose frequency adjustments. Pure functions over
//! `&Habit` — no repository access, mirroring the kernel's separation
//! of domain state from runtime policy.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};
use orbita_kernel::domain::habit::{Frequency, Habit, PreferredTime};
use orbita_kernel::domain::DomainEvent;
use orbita_kernel::error::KernelResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    Morning,
    Afternoon,
    Evening,
    Night,
    Anytime,
}

impl TimeWindow {
    fn of_hour(hour: u32) -> TimeWindow {
        match hour {
            6..=11 => TimeWindow::Morning,
            12..=16 => TimeWindow::Afternoon,
            17..=20 => TimeWindow::Evening,
            _ => TimeWindow::Night,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OptimalTimeEstimate {
    pub window: TimeWindow,
    pub confidence: f64,
    pub most_frequent_hour: Option<u32>,
}

const CONFIDENCE_THRESHOLD: f64 = 0.60;

/// Winning window by completion count, confidence as winning/total, and
/// the most-frequent hour-of-day. Confidence below 0.60 (or zero
/// completions) collapses the window to `Anytime` with confidence 0,
/// though `most_frequent_hour` is still reported when data exists.
pub fn estimate_optimal_time(habit: &Habit) -> OptimalTimeEstimate {
    let total = habit.completions.len();
    if total == 0 {
        return OptimalTimeEstimate {
            window: TimeWindow::Anytime,
            confidence: 0.0,
            most_frequent_hour: None,
        };
    }

    let mut window_counts = [0usize; 4]; // morning, afternoon, evening, night
    let mut hour_counts = [0usize; 24];
    for completion in &habit.completions {
        let hour = completion.completed_at.hour();
        hour_counts[hour as usize] += 1;
        let idx = match TimeWindow::of_hour(hour) {
            TimeWindow::Morning => 0,
            TimeWindow::Afternoon => 1,
            TimeWindow::Evening => 2,
            TimeWindow::Night | TimeWindow::Anytime => 3,
        };
        window_counts[idx] += 1;
    }

    let (winning_idx, winning_count) = window_counts
        .iter()
        .enumerate()
        .max_by_key(|&(_, count)| *count)
        .map(|(i, c)| (i, *c))
        .unwrap();
    let confidence = winning_count as f64 / total as f64;

    let most_frequent_hour = hour_counts
        .iter()
        .enumerate()
        .max_by_key(|&(_, count)| *count)
        .filter(|&(_, count)| *count > 0)
        .map(|(hour, _)| hour as u32);

    if confidence < CONFIDENCE_THRESHOLD {
        return OptimalTimeEstimate {
            window: TimeWindow::Anytime,
            confidence: 0.0,
            most_frequent_hour,
        };
    }

    let window = match winning_idx {
        0 => TimeWindow::Morning,
        1 => TimeWindow::Afternoon,
        2 => TimeWindow::Evening,
        _ => TimeWindow::Night,
    };
    OptimalTimeEstimate {
        window,
        confidence,
        most_frequent_hour,
    }
}

/// The instant on `date` this habit should start: the most-frequent
/// completion hour if any completions exist, otherwise the
/// `preferredTime` default hour.
pub fn suggested_start_instant(habit: &Habit, date: NaiveDate) -> DateTime<Utc> {
    let hour = if habit.completions.is_empty() {
        habit.preferred_time.default_hour()
    } else {
        estimate_optimal_time(habit)
            .most_frequent_hour
            .unwrap_or_else(|| habit.preferred_time.default_hour())
    };
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::from_hms_opt(hour, 0, 0).unwrap()))
}

/// Monday-indexed day-of-week completion counts that fall below half
/// the weekly average. Empty when fewer than 7 completions exist.
pub fn weak_days(habit: &Habit) -> Vec<chrono::Weekday> {
    if habit.completions.len() < 7 {
        return Vec::new();
    }
    let mut counts = [0usize; 7];
    for completion in &habit.completions {
        counts[completion.completed_at.weekday().num_days_from_monday() as usize] += 1;
    }
    let avg = counts.iter().sum::<usize>() as f64 / 7.0;
    counts
        .iter()
        .enumerate()
        .filter(|&(_, &c)| (c as f64) < 0.5 * avg)
        .map(|(i, _)| weekday_from_monday_index(i))
        .collect()
}

fn weekday_from_monday_index(i: usize) -> chrono::Weekday {
    use chrono::Weekday::*;
    [Mon, Tue, Wed, Thu, Fri, Sat, Sun][i]
}

/// Adjusts `habit`'s frequency based on its completion ratio over a
/// trailing `window_days`-day window ending at `end` (default 14 per
/// SPEC_FULL.md §C). Emits `HabitFrequencyChanged` only when the ratio
/// crosses a threshold and actually changes `timesPerWeek`; returns
/// `Ok(None)` for a no-op adjustment.
pub fn adjust_adaptive_frequency(
    habit: &mut Habit,
    caller: uuid::Uuid,
    end: NaiveDate,
    window_days: i64,
    now: DateTime<Utc>,
) -> KernelResult<Option<DomainEvent>> {
    let start = end - chrono::Duration::days(window_days - 1);
    let completions = habit
        .completions
        .iter()
        .filter(|c| {
            let day = c.completed_at.date_naive();
            day >= start && day <= end
        })
        .count();

    let target = match habit.frequency {
        Frequency::Custom => {
            habit.times_per_week as i64 * ((window_days + 6) / 7)
        }
        _ => {
            let mut count = 0i64;
            let mut day = start;
            while day <= end {
                if habit.is_due_on(day) {
                    count += 1;
                }
                day = day.succ_opt().unwrap();
            }
            count
        }
    };

    if target == 0 {
        return Ok(None);
    }
    let ratio = completions as f64 / target as f64;

    let new_times_per_week = if ratio >= 0.85 && habit.times_per_week < 7 {
        Some(habit.times_per_week + 1)
    } else if ratio <= 0.40 && habit.times_per_week > 1 {
        Some(habit.times_per_week - 1)
    } else {
        None
    };

    match new_times_per_week {
        Some(new_value) => Ok(Some(habit.apply_frequency_change(caller, new_value, now)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};
    use uuid::Uuid;

    fn habit_with_completions(hours: &[u32]) -> Habit {
        let owner = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let (mut habit, _) = Habit::create(
            owner,
            "Meditate",
            None,
            Frequency::Daily,
            7,
            15,
            PreferredTime::Morning,
            now,
        )
        .unwrap();
        for (i, &hour) in hours.iter().enumerate() {
            let day = now + chrono::Duration::days(i as i64);
            let at = Utc
                .with_ymd_and_hms(day.year(), day.month(), day.day(), hour, 0, 0)
                .unwrap();
            habit.log_completion(owner, at, None, at).unwrap();
        }
        habit
    }

    #[test]
    fn estimates_morning_window_from_spec_scenario_five() {
        let habit = habit_with_completions(&[9, 9, 9, 9, 9, 9, 8, 10, 9, 9]);
        let estimate = estimate_optimal_time(&habit);
        assert_eq!(estimate.window, TimeWindow::Morning);
        assert!((estimate.confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(estimate.most_frequent_hour, Some(9));
    }

    #[test]
    fn suggested_start_uses_most_frequent_hour() {
        let habit = habit_with_completions(&[9, 9, 9, 9, 9, 9, 8, 10, 9, 9]);
        let start = suggested_start_instant(&habit, NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap());
    }

    #[test]
    fn low_confidence_reports_anytime() {
        let habit = habit_with_completions(&[9, 14, 19, 22, 9]);
        let estimate = estimate_optimal_time(&habit);
        assert_eq!(estimate.window, TimeWindow::Anytime);
        assert_eq!(estimate.confidence, 0.0);
    }

    #[test]
    fn weak_days_empty_below_seven_completions() {
        let habit = habit_with_completions(&[9, 9, 9]);
        assert!(weak_days(&habit).is_empty());
    }
}
