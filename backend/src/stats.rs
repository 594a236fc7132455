//! Completion statistics over trailing day windows.
//!
//! Everything here is pure: callers pass "today" explicitly through the `_at`
//! variants, and the plain variants read the local calendar date once per call.
//! Days before a habit was created count as not completed.

use std::collections::HashSet;

use chrono::{Days, Local, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

use crate::models::habit::Habit;
use crate::models::habit_log::HabitLog;

/// Windows shown on the statistics cards.
pub const STAT_WINDOWS: [u32; 3] = [7, 30, 90];

/// Largest window the API accepts.
pub const MAX_WINDOW_DAYS: u32 = 366;

pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// The `days` calendar dates ending today, oldest first.
pub fn date_range(days: u32) -> Vec<NaiveDate> {
    date_range_at(local_today(), days)
}

pub fn date_range_at(today: NaiveDate, days: u32) -> Vec<NaiveDate> {
    (0..days)
        .rev()
        .filter_map(|offset| today.checked_sub_days(Days::new(u64::from(offset))))
        .collect()
}

/// Percentage of the last `days` days on which `habit_id` was logged, rounded half up.
pub fn completion_rate(habit_id: Uuid, logs: &[HabitLog], days: u32) -> u8 {
    completion_rate_at(local_today(), habit_id, logs, days)
}

pub fn completion_rate_at(today: NaiveDate, habit_id: Uuid, logs: &[HabitLog], days: u32) -> u8 {
    if days == 0 {
        return 0;
    }
    let completed = completed_days_at(today, habit_id, logs, days);
    rounded_percent(completed, days)
}

fn completed_days_at(today: NaiveDate, habit_id: Uuid, logs: &[HabitLog], days: u32) -> u32 {
    let logged: HashSet<NaiveDate> = logs
        .iter()
        .filter(|log| log.habit_id == habit_id)
        .map(|log| log.logged_date)
        .collect();

    date_range_at(today, days)
        .iter()
        .filter(|date| logged.contains(date))
        .count() as u32
}

fn rounded_percent(completed: u32, days: u32) -> u8 {
    let (completed, days) = (u64::from(completed), u64::from(days));
    // floor(100 * c / d + 1/2) without floats
    let percent = (200 * completed + days) / (2 * days);
    percent.min(100) as u8
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowRate {
    pub days: u32,
    pub completed: u32,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitStats {
    pub habit_id: Uuid,
    pub name: String,
    pub windows: Vec<WindowRate>,
}

pub fn window_rate_at(today: NaiveDate, habit_id: Uuid, logs: &[HabitLog], days: u32) -> WindowRate {
    let completed = if days == 0 {
        0
    } else {
        completed_days_at(today, habit_id, logs, days)
    };
    WindowRate {
        days,
        completed,
        percent: completion_rate_at(today, habit_id, logs, days),
    }
}

pub fn habit_stats_at(today: NaiveDate, habit: &Habit, logs: &[HabitLog]) -> HabitStats {
    HabitStats {
        habit_id: habit.id,
        name: habit.name.clone(),
        windows: STAT_WINDOWS
            .iter()
            .map(|&days| window_rate_at(today, habit.id, logs, days))
            .collect(),
    }
}

/// One card per habit, in the order the habits are given.
pub fn summarize_at(today: NaiveDate, habits: &[Habit], logs: &[HabitLog]) -> Vec<HabitStats> {
    habits
        .iter()
        .map(|habit| habit_stats_at(today, habit, logs))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn log(habit_id: Uuid, date: NaiveDate) -> HabitLog {
        HabitLog {
            id: Uuid::new_v4(),
            habit_id,
            user_id: Uuid::nil(),
            logged_date: date,
            created_at: Utc::now(),
        }
    }

    #[rstest]
    #[case(1)]
    #[case(7)]
    #[case(30)]
    #[case(90)]
    fn date_range_has_exact_length_and_ends_today(#[case] days: u32) {
        let today = day(2026, 3, 2);
        let range = date_range_at(today, days);

        assert_eq!(range.len(), days as usize);
        assert_eq!(range.last(), Some(&today));
        assert!(range.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(range.windows(2).all(|pair| pair[0].succ_opt() == Some(pair[1])));
    }

    #[test]
    fn date_range_crosses_month_and_leap_day() {
        let range = date_range_at(day(2028, 3, 1), 3);
        assert_eq!(range, vec![day(2028, 2, 28), day(2028, 2, 29), day(2028, 3, 1)]);
        assert_eq!(range[1].to_string(), "2028-02-29");
    }

    #[test]
    fn date_range_uses_local_today() {
        let range = date_range(7);
        assert_eq!(range.len(), 7);
        assert!(*range.last().unwrap() >= local_today() - Days::new(1));
    }

    #[rstest]
    #[case(7)]
    #[case(30)]
    #[case(90)]
    fn empty_logs_give_zero(#[case] days: u32) {
        assert_eq!(completion_rate_at(day(2026, 5, 5), Uuid::new_v4(), &[], days), 0);
    }

    #[rstest]
    #[case(7)]
    #[case(30)]
    #[case(90)]
    fn every_day_logged_gives_hundred(#[case] days: u32) {
        let today = day(2026, 5, 5);
        let habit = Uuid::new_v4();
        let logs: Vec<HabitLog> = date_range_at(today, days)
            .into_iter()
            .map(|date| log(habit, date))
            .collect();

        assert_eq!(completion_rate_at(today, habit, &logs, days), 100);
    }

    #[test]
    fn two_of_seven_rounds_to_twenty_nine() {
        let today = day(2026, 10, 17);
        let habit = Uuid::new_v4();
        let logs = vec![log(habit, today), log(habit, today - Days::new(1))];

        assert_eq!(completion_rate_at(today, habit, &logs, 7), 29);
    }

    #[rstest]
    #[case(1, 8, 13)]
    #[case(1, 3, 33)]
    #[case(2, 3, 67)]
    #[case(1, 90, 1)]
    #[case(15, 30, 50)]
    fn rounds_half_up(#[case] completed: u32, #[case] days: u32, #[case] expected: u8) {
        assert_eq!(rounded_percent(completed, days), expected);
    }

    #[test]
    fn ignores_other_habits_and_dates_outside_window() {
        let today = day(2026, 6, 30);
        let habit = Uuid::new_v4();
        let logs = vec![
            log(habit, today),
            log(Uuid::new_v4(), today - Days::new(1)),
            log(habit, today - Days::new(7)),
            log(habit, today + Days::new(1)),
        ];

        assert_eq!(completion_rate_at(today, habit, &logs, 7), 14);
    }

    #[test]
    fn duplicate_logs_for_a_day_count_once() {
        let today = day(2026, 6, 30);
        let habit = Uuid::new_v4();
        let logs = vec![log(habit, today), log(habit, today)];

        assert_eq!(completion_rate_at(today, habit, &logs, 7), 14);
    }

    #[test]
    fn zero_days_is_zero() {
        assert_eq!(completion_rate_at(day(2026, 1, 1), Uuid::new_v4(), &[], 0), 0);
    }

    #[test]
    fn summary_covers_every_window_in_habit_order() {
        let today = day(2026, 4, 10);
        let habits: Vec<Habit> = ["Read", "Run"]
            .iter()
            .map(|name| Habit {
                id: Uuid::new_v4(),
                user_id: Uuid::nil(),
                name: name.to_string(),
                description: None,
                created_at: Utc::now(),
            })
            .collect();
        let logs = vec![log(habits[1].id, today)];

        let summary = summarize_at(today, &habits, &logs);

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].name, "Read");
        let days: Vec<u32> = summary[1].windows.iter().map(|w| w.days).collect();
        assert_eq!(days, STAT_WINDOWS.to_vec());
        assert_eq!(summary[1].windows[0].completed, 1);
        assert_eq!(summary[1].windows[0].percent, 14);
        assert_eq!(summary[1].windows[1].percent, 3);
        assert_eq!(summary[1].windows[2].percent, 1);
    }
}
