//! Health score formulas and streak bookkeeping.
//!
//! Two score formulas exist: the daily score stored in
//! `currentStats.healthScore`, and a goals-aware variant that also rewards
//! vitamins. Their positive components top out at 90 and 100 respectively.

use crate::models::{Goals, Streaks, TodayLog};

/// Daily health score in `0..=100`.
///
/// The positive components sum to at most 90 (breakfast 25, water 25,
/// lunch and dinner 25, sleep 15).
pub fn calculate_health_score(log: &TodayLog) -> u8 {
    let breakfast = if log.breakfast { 25.0 } else { 0.0 };
    let water = (log.water_glasses / 8.0 * 25.0).min(25.0);
    let meals = (u8::from(log.lunch) + u8::from(log.dinner)) as f64 * 12.5;
    let sleep = (log.sleep_hours / 8.0 * 15.0).min(15.0);
    let fast_food_penalty = log.fast_food as f64 * 10.0;
    let stress_penalty = ((log.stress_level as f64 - 5.0) * 3.0).max(0.0);

    clamp_score(breakfast + water + meals + sleep - fast_food_penalty - stress_penalty)
}

/// Goals-aware score: adds up to 15 points for vitamins, weighs sleep at 10,
/// penalizes fast food 8 per item and ignores stress. A zero sleep entry is
/// read as 7 hours.
pub fn calculate_goal_health_score(log: &TodayLog) -> u8 {
    let breakfast = if log.breakfast { 25.0 } else { 0.0 };
    let water = (log.water_glasses / 8.0 * 25.0).min(25.0);
    let vitamins = (log.vitamins.len() as f64 / 3.0 * 15.0).min(15.0);
    let meals = ((u8::from(log.lunch) + u8::from(log.dinner)) as f64 * 12.5).min(25.0);
    let sleep_hours = if log.sleep_hours > 0.0 { log.sleep_hours } else { 7.0 };
    let sleep = (sleep_hours / 8.0 * 10.0).min(10.0);
    let fast_food_penalty = log.fast_food as f64 * 8.0;

    clamp_score(breakfast + water + vitamins + meals + sleep - fast_food_penalty)
}

fn clamp_score(raw: f64) -> u8 {
    raw.clamp(0.0, 100.0).round() as u8
}

/// Advance streak counters for conditions that `after` reaches and `before`
/// had not. Each streak therefore moves at most once per day.
pub fn update_streaks(streaks: &mut Streaks, before: &TodayLog, after: &TodayLog, goals: &Goals) {
    let reached = |met: fn(&TodayLog, &Goals) -> bool| met(after, goals) && !met(before, goals);

    if reached(|log, goals| log.water_glasses >= goals.water_goal) {
        streaks.water_streak += 1;
    }
    if reached(|log, _| log.breakfast) {
        streaks.breakfast_streak += 1;
    }
    if reached(|log, _| log.meal_kinds_logged() >= 3) {
        streaks.meal_streak += 1;
    }
    if reached(|log, _| log.breakfast && log.lunch && log.dinner && log.fast_food == 0) {
        streaks.healthy_eating_streak += 1;
    }
}
