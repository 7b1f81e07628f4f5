//! Validated user snapshot and the deep analysis every tip generator reads.

use chrono::{DateTime, Datelike, Local, Timelike, Weekday};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{UserData, WeeklyData, WeeklyField};

/// The projection of the user aggregate the analysis works from. Every field
/// has a declared default, so the analysis never sees missing data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeUserData {
    pub profile: SafeProfile,
    pub today_log: SafeTodayLog,
    pub current_stats: SafeStats,
    pub weekly_data: WeeklyData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SafeProfile {
    pub age: f64,
    pub weight: f64,
    pub height: f64,
    pub activity_level: String,
    pub dietary_preferences: Vec<String>,
    pub health_goals: Vec<String>,
    pub course: String,
    pub college: String,
}

impl Default for SafeProfile {
    fn default() -> Self {
        Self {
            age: 20.0,
            weight: 65.0,
            height: 170.0,
            activity_level: "moderate".to_string(),
            dietary_preferences: Vec::new(),
            health_goals: Vec::new(),
            course: "Student".to_string(),
            college: "College".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SafeTodayLog {
    pub breakfast: bool,
    pub lunch: bool,
    pub dinner: bool,
    pub water_glasses: f64,
    pub study_hours: f64,
    pub sleep_hours: f64,
    pub stress_level: f64,
    pub energy_level: f64,
    pub fast_food: f64,
}

impl Default for SafeTodayLog {
    fn default() -> Self {
        Self {
            breakfast: false,
            lunch: false,
            dinner: false,
            water_glasses: 0.0,
            study_hours: 0.0,
            sleep_hours: 7.0,
            stress_level: 5.0,
            energy_level: 5.0,
            fast_food: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SafeStats {
    pub health_score: f64,
}

impl Default for SafeStats {
    fn default() -> Self {
        Self { health_score: 65.0 }
    }
}

/// Project arbitrary JSON onto [`SafeUserData`]. Null, missing and ill-typed
/// fields take their defaults; this never fails.
pub fn validate_user_data(raw: &Value) -> SafeUserData {
    SafeUserData {
        profile: lenient_section(raw.get("profile")),
        today_log: lenient_section(raw.get("todayLog")),
        current_stats: lenient_section(raw.get("currentStats")),
        weekly_data: lenient_section(raw.get("weeklyData")),
    }
}

/// Deserialize `raw` field by field on top of `T::default()`, skipping any
/// field whose value does not fit.
fn lenient_section<T>(raw: Option<&Value>) -> T
where
    T: Serialize + DeserializeOwned + Default,
{
    let fallback = T::default();
    let Some(Value::Object(fields)) = raw else {
        return fallback;
    };
    let Ok(mut merged) = serde_json::to_value(&fallback) else {
        return fallback;
    };

    for (key, value) in fields {
        if value.is_null() {
            continue;
        }
        let mut candidate = merged.clone();
        candidate[key.as_str()] = value.clone();
        if serde_json::from_value::<T>(candidate.clone()).is_ok() {
            merged = candidate;
        }
    }

    serde_json::from_value(merged).unwrap_or(fallback)
}

impl From<&UserData> for SafeUserData {
    fn from(data: &UserData) -> Self {
        let profile = &data.profile;
        let log = &data.today_log;
        Self {
            profile: SafeProfile {
                age: profile.age as f64,
                weight: profile.weight,
                height: profile.height,
                activity_level: profile.activity_level.clone(),
                dietary_preferences: profile.dietary_preferences.clone(),
                health_goals: profile.health_goals.clone(),
                course: profile.course.clone(),
                college: profile.college.clone(),
            },
            today_log: SafeTodayLog {
                breakfast: log.breakfast,
                lunch: log.lunch,
                dinner: log.dinner,
                water_glasses: log.water_glasses,
                study_hours: log.study_hours,
                sleep_hours: log.sleep_hours,
                stress_level: log.stress_level as f64,
                energy_level: log.energy_level as f64,
                fast_food: log.fast_food as f64,
            },
            current_stats: SafeStats {
                health_score: data.current_stats.health_score as f64,
            },
            weekly_data: data.weekly_data.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentState {
    pub hour: u32,
    pub weekday: Weekday,
    pub time_of_day: TimeOfDay,
    pub health_score: f64,
    pub trend: Trend,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patterns {
    pub missed_breakfast: bool,
    pub dehydrated: bool,
    pub long_study_session: bool,
    pub high_stress: bool,
    pub low_energy: bool,
    pub fast_food_pattern: bool,
    pub sleep_deprived: bool,
    pub weekend_pattern: bool,
    pub exam_period: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Risks {
    pub burnout: bool,
    pub nutrition_deficit: bool,
    pub cognitive_decline: bool,
    pub metabolic_stress: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunities {
    pub energy_boost: bool,
    pub stress_reduction: bool,
    pub performance_optimization: bool,
    pub habit_building: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyAverages {
    pub health_score: f64,
    pub water: f64,
    pub stress: f64,
    pub study: f64,
}

/// Percentages and 0-10 scales summarizing the user's state. Attached to
/// rule-based tips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub hydration_efficiency: f64,
    pub nutrition_consistency: f64,
    pub stress_management: f64,
    pub academic_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub current: CurrentState,
    pub patterns: Patterns,
    pub risks: Risks,
    pub opportunities: Opportunities,
    pub weekly_avg: WeeklyAverages,
    pub metrics: Metrics,
}

pub fn perform_deep_analysis(data: &SafeUserData, now: DateTime<Local>) -> Analysis {
    let log = &data.today_log;
    let hour = now.hour();
    let weekday = now.weekday();

    let weekly_avg = WeeklyAverages {
        health_score: weekly_average(&data.weekly_data, WeeklyField::HealthScore),
        water: weekly_average(&data.weekly_data, WeeklyField::WaterGlasses),
        stress: weekly_average(&data.weekly_data, WeeklyField::StressLevel),
        study: weekly_average(&data.weekly_data, WeeklyField::StudyHours),
    };

    let expected_water = if hour > 12 { hour as f64 / 2.0 } else { 2.0 };
    let long_study_session = log.study_hours > 6.0;
    let high_stress = log.stress_level > 7.0;
    let patterns = Patterns {
        missed_breakfast: !log.breakfast && hour > 10,
        dehydrated: log.water_glasses < expected_water,
        long_study_session,
        high_stress,
        low_energy: log.energy_level < 5.0,
        fast_food_pattern: log.fast_food > 1.0,
        sleep_deprived: log.sleep_hours < 7.0,
        weekend_pattern: matches!(weekday, Weekday::Sat | Weekday::Sun),
        exam_period: high_stress && long_study_session,
    };

    let risks = Risks {
        burnout: patterns.long_study_session && patterns.high_stress && patterns.sleep_deprived,
        nutrition_deficit: patterns.missed_breakfast && patterns.fast_food_pattern,
        cognitive_decline: patterns.dehydrated && patterns.low_energy,
        metabolic_stress: patterns.fast_food_pattern && patterns.high_stress,
    };

    let opportunities = Opportunities {
        energy_boost: !patterns.dehydrated && log.breakfast,
        stress_reduction: log.sleep_hours >= 7.0 && !patterns.fast_food_pattern,
        performance_optimization: data.current_stats.health_score > 70.0,
        habit_building: true,
    };

    let metrics = Metrics {
        hydration_efficiency: (log.water_glasses / 8.0 * 100.0).min(100.0),
        nutrition_consistency: weekly_avg.health_score,
        stress_management: (10.0 - weekly_avg.stress).max(0.0),
        academic_balance: (weekly_avg.study / 8.0 * 100.0).min(100.0),
    };

    Analysis {
        current: CurrentState {
            hour,
            weekday,
            time_of_day: TimeOfDay::from_hour(hour),
            health_score: data.current_stats.health_score,
            trend: calculate_trend(&data.weekly_data, WeeklyField::HealthScore),
        },
        patterns,
        risks,
        opportunities,
        weekly_avg,
        metrics,
    }
}

/// Compare the mean of the last three nonzero values with the mean of the
/// earlier ones. Differences under 0.1 count as stable.
pub fn calculate_trend(weekly: &WeeklyData, field: WeeklyField) -> Trend {
    let values: Vec<f64> = weekly
        .series(field)
        .into_iter()
        .filter(|value| *value > 0.0)
        .collect();
    if values.len() < 2 {
        return Trend::Stable;
    }

    let split = values.len().saturating_sub(3);
    let (earlier, recent) = values.split_at(split);
    let difference = mean(recent) - mean(earlier);

    if difference.abs() < 0.1 {
        Trend::Stable
    } else if difference > 0.0 {
        Trend::Improving
    } else {
        Trend::Declining
    }
}

/// Rounded mean of `field` over the present days, or the field's default
/// when the week is empty.
pub fn weekly_average(weekly: &WeeklyData, field: WeeklyField) -> f64 {
    let values = weekly.series(field);
    if values.is_empty() {
        return field.default_average();
    }
    mean(&values).round()
}

/// Mean of `values`; an empty slice averages to zero.
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len().max(1) as f64
}
