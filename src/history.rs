//! Queries and aggregate statistics over the per-day meal history.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{MealEntry, MealHistory, MealType};

/// A meal together with the day it was logged under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatedMeal {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub entry: MealEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealTypeCounts {
    pub breakfast: usize,
    pub lunch: usize,
    pub dinner: usize,
    pub snacks: usize,
}

impl MealTypeCounts {
    fn bump(&mut self, meal_type: MealType) {
        match meal_type {
            MealType::Breakfast => self.breakfast += 1,
            MealType::Lunch => self.lunch += 1,
            MealType::Dinner => self.dinner += 1,
            MealType::Snacks => self.snacks += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealStatistics {
    pub total_meals: usize,
    pub total_calories: f64,
    pub total_protein: f64,
    pub healthy_meals: usize,
    pub unhealthy_meals: usize,
    pub meal_types: MealTypeCounts,
    pub avg_calories_per_day: f64,
    /// Five most logged meal names, most frequent first
    pub popular_meals: Vec<NameCount>,
    /// Three most used non-empty locations
    pub frequent_locations: Vec<NameCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionTotals {
    pub calories: f64,
    pub protein: f64,
    pub healthy_meals: usize,
    pub total_meals: usize,
}

pub fn meals_for_date(history: &MealHistory, date: NaiveDate) -> &[MealEntry] {
    history.get(&date).map(Vec::as_slice).unwrap_or(&[])
}

/// Every meal logged between `start` and `end` inclusive, oldest day first.
pub fn meals_for_range(history: &MealHistory, start: NaiveDate, end: NaiveDate) -> Vec<DatedMeal> {
    if start > end {
        return Vec::new();
    }
    history
        .range(start..=end)
        .flat_map(|(date, meals)| {
            meals.iter().map(move |entry| DatedMeal {
                date: *date,
                entry: entry.clone(),
            })
        })
        .collect()
}

/// Meals of `meal_type` logged in the `days` days before `today` or today
/// itself, oldest first.
pub fn meals_by_type(
    history: &MealHistory,
    meal_type: MealType,
    today: NaiveDate,
    days: u32,
) -> Vec<DatedMeal> {
    let mut meals = meals_for_range(history, window_start(today, days), today);
    meals.retain(|meal| meal.entry.meal_type == meal_type);
    meals
}

pub fn has_meal_type(meals: &[MealEntry], meal_type: MealType) -> bool {
    meals.iter().any(|meal| meal.meal_type == meal_type)
}

fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(days as u64))
        .unwrap_or(NaiveDate::MIN)
}

/// Statistics over the `days` days before `today` plus today itself.
/// The per-day calorie average divides by `days`.
pub fn meal_statistics(history: &MealHistory, today: NaiveDate, days: u32) -> MealStatistics {
    let meals = meals_for_range(history, window_start(today, days), today);

    let mut stats = MealStatistics {
        total_meals: meals.len(),
        ..MealStatistics::default()
    };
    let mut names = Vec::new();
    let mut locations = Vec::new();

    for DatedMeal { entry, .. } in &meals {
        stats.total_calories += entry.calories;
        stats.total_protein += entry.protein;
        if entry.healthy {
            stats.healthy_meals += 1;
        } else {
            stats.unhealthy_meals += 1;
        }
        stats.meal_types.bump(entry.meal_type);
        tally(&mut names, &entry.meal);
        if !entry.location.is_empty() {
            tally(&mut locations, &entry.location);
        }
    }

    if days > 0 {
        stats.avg_calories_per_day = (stats.total_calories / days as f64).round();
    }
    stats.popular_meals = top(names, 5);
    stats.frequent_locations = top(locations, 3);
    stats
}

pub fn nutrition_totals(meals: &[MealEntry]) -> NutritionTotals {
    meals.iter().fold(NutritionTotals::default(), |mut totals, meal| {
        totals.calories += meal.calories;
        totals.protein += meal.protein;
        totals.total_meals += 1;
        if meal.healthy {
            totals.healthy_meals += 1;
        }
        totals
    })
}

fn tally(counts: &mut Vec<NameCount>, name: &str) {
    match counts.iter_mut().find(|c| c.name == name) {
        Some(existing) => existing.count += 1,
        None => counts.push(NameCount {
            name: name.to_string(),
            count: 1,
        }),
    }
}

/// Highest counts first; ties keep first-seen order.
fn top(mut counts: Vec<NameCount>, n: usize) -> Vec<NameCount> {
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(n);
    counts
}
