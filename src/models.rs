use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Local, NaiveDate, Utc, Weekday};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// The single per-user aggregate persisted in the user partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserData {
    pub profile: Profile,
    pub current_stats: CurrentStats,
    pub today_log: TodayLog,
    pub weekly_data: WeeklyData,
    pub streaks: Streaks,
    pub goals: Goals,
    pub preferences: Preferences,
    pub challenges: Vec<Challenge>,
}

impl UserData {
    /// Build the aggregate handed to a user with no persisted data: a fresh
    /// log stamped with `now`'s calendar day and a randomized demo week.
    pub fn synthesize(now: DateTime<Local>) -> Self {
        Self {
            today_log: TodayLog::fresh(now.date_naive()),
            weekly_data: WeeklyData::synthesize(&mut rand::thread_rng()),
            challenges: Challenge::defaults(now.with_timezone(&Utc)),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub name: String,
    pub age: u32,
    /// Weight in kg
    pub weight: f64,
    /// Height in cm
    pub height: f64,
    pub activity_level: String,
    pub dietary_preferences: Vec<String>,
    pub allergies: Vec<String>,
    pub health_goals: Vec<String>,
    pub course: String,
    pub college: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: "Student".to_string(),
            age: 20,
            weight: 65.0,
            height: 170.0,
            activity_level: "moderate".to_string(),
            dietary_preferences: Vec::new(),
            allergies: Vec::new(),
            health_goals: vec!["Better Focus".to_string(), "More Energy".to_string()],
            course: "Your Course".to_string(),
            college: "Your College".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurrentStats {
    /// Derived 0-100 score, recomputed on every logged activity
    pub health_score: u8,
    pub streak: u32,
    pub total_challenges_completed: u32,
    pub spots_explored: u32,
    pub budget_spent: f64,
    pub budget_limit: f64,
}

impl Default for CurrentStats {
    fn default() -> Self {
        Self {
            health_score: 65,
            streak: 3,
            total_challenges_completed: 2,
            spots_explored: 1,
            budget_spent: 120.0,
            budget_limit: 300.0,
        }
    }
}

/// The in-progress log for a single calendar day.
///
/// `date` must match the current day before any mutation; the store resets
/// a stale log with [`TodayLog::fresh`] first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TodayLog {
    pub date: NaiveDate,
    pub breakfast: bool,
    pub lunch: bool,
    pub dinner: bool,
    pub snacks: u32,
    /// Glasses of water; fractional when logged through water entries
    pub water_glasses: f64,
    pub fast_food: u32,
    pub study_hours: f64,
    pub sleep_hours: f64,
    /// 0-10
    pub stress_level: u8,
    /// 0-10
    pub energy_level: u8,
    pub vitamins: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
}

impl Default for TodayLog {
    fn default() -> Self {
        Self::fresh(NaiveDate::default())
    }
}

impl TodayLog {
    /// An empty log for `date`. Stress and energy start at the neutral 5.
    pub fn fresh(date: NaiveDate) -> Self {
        Self {
            date,
            breakfast: false,
            lunch: false,
            dinner: false,
            snacks: 0,
            water_glasses: 0.0,
            fast_food: 0,
            study_hours: 0.0,
            sleep_hours: 0.0,
            stress_level: 5,
            energy_level: 5,
            vitamins: Vec::new(),
            mood: None,
        }
    }

    /// Number of distinct meal kinds logged today (breakfast, lunch, dinner, snacks).
    pub fn meal_kinds_logged(&self) -> u32 {
        [self.breakfast, self.lunch, self.dinner, self.snacks > 0]
            .iter()
            .filter(|logged| **logged)
            .count() as u32
    }
}

/// A per-day snapshot used only for weekly averages and trend analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailySnapshot {
    pub health_score: u32,
    pub water_glasses: f64,
    pub meals: u32,
    pub calories: u32,
    /// Protein (g)
    pub protein: u32,
    pub fast_food: u32,
    pub study_hours: f64,
    pub stress_level: u32,
}

impl DailySnapshot {
    pub fn value(&self, field: WeeklyField) -> f64 {
        match field {
            WeeklyField::HealthScore => self.health_score as f64,
            WeeklyField::WaterGlasses => self.water_glasses,
            WeeklyField::Meals => self.meals as f64,
            WeeklyField::Calories => self.calories as f64,
            WeeklyField::Protein => self.protein as f64,
            WeeklyField::FastFood => self.fast_food as f64,
            WeeklyField::StudyHours => self.study_hours,
            WeeklyField::StressLevel => self.stress_level as f64,
        }
    }
}

/// Snapshot fields that weekly statistics can be computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeeklyField {
    HealthScore,
    WaterGlasses,
    Meals,
    Calories,
    Protein,
    FastFood,
    StudyHours,
    StressLevel,
}

impl WeeklyField {
    /// Average substituted when no weekly data is available.
    pub fn default_average(self) -> f64 {
        match self {
            WeeklyField::HealthScore => 65.0,
            WeeklyField::WaterGlasses => 6.0,
            WeeklyField::StressLevel => 5.0,
            WeeklyField::StudyHours => 6.0,
            WeeklyField::Calories => 2000.0,
            WeeklyField::Protein => 60.0,
            WeeklyField::Meals | WeeklyField::FastFood => 0.0,
        }
    }
}

/// Weekday name → snapshot, always iterated Monday through Sunday.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monday: Option<DailySnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tuesday: Option<DailySnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wednesday: Option<DailySnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thursday: Option<DailySnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friday: Option<DailySnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturday: Option<DailySnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sunday: Option<DailySnapshot>,
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

impl WeeklyData {
    /// Randomized but plausible demo history for a new account.
    pub fn synthesize<R: Rng>(rng: &mut R) -> Self {
        let mut week = Self::default();
        for day in WEEK {
            week.set(
                day,
                DailySnapshot {
                    health_score: rng.gen_range(60..90),
                    water_glasses: rng.gen_range(5..9) as f64,
                    meals: rng.gen_range(2..4),
                    calories: rng.gen_range(1800..2400),
                    protein: rng.gen_range(60..100),
                    fast_food: rng.gen_range(0..3),
                    study_hours: rng.gen_range(4..10) as f64,
                    stress_level: rng.gen_range(3..9),
                },
            );
        }
        week
    }

    pub fn get(&self, day: Weekday) -> Option<&DailySnapshot> {
        self.slot(day).as_ref()
    }

    pub fn set(&mut self, day: Weekday, snapshot: DailySnapshot) {
        *self.slot_mut(day) = Some(snapshot);
    }

    /// Present days in Monday→Sunday order.
    pub fn days(&self) -> impl Iterator<Item = (Weekday, &DailySnapshot)> + '_ {
        WEEK.iter()
            .filter_map(move |day| self.get(*day).map(|snapshot| (*day, snapshot)))
    }

    pub fn is_empty(&self) -> bool {
        self.days().next().is_none()
    }

    /// The series of one field over the present days, in week order.
    pub fn series(&self, field: WeeklyField) -> Vec<f64> {
        self.days().map(|(_, snapshot)| snapshot.value(field)).collect()
    }

    fn slot(&self, day: Weekday) -> &Option<DailySnapshot> {
        match day {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }

    fn slot_mut(&mut self, day: Weekday) -> &mut Option<DailySnapshot> {
        match day {
            Weekday::Mon => &mut self.monday,
            Weekday::Tue => &mut self.tuesday,
            Weekday::Wed => &mut self.wednesday,
            Weekday::Thu => &mut self.thursday,
            Weekday::Fri => &mut self.friday,
            Weekday::Sat => &mut self.saturday,
            Weekday::Sun => &mut self.sunday,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Streaks {
    pub water_streak: u32,
    pub breakfast_streak: u32,
    pub meal_streak: u32,
    pub healthy_eating_streak: u32,
}

impl Default for Streaks {
    fn default() -> Self {
        Self {
            water_streak: 3,
            breakfast_streak: 2,
            meal_streak: 0,
            healthy_eating_streak: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Goals {
    /// Glasses per day
    pub water_goal: f64,
    pub calorie_goal: u32,
    /// Protein (g)
    pub protein_goal: u32,
    pub steps_goal: u32,
}

impl Default for Goals {
    fn default() -> Self {
        Self {
            water_goal: 8.0,
            calorie_goal: 2000,
            protein_goal: 60,
            steps_goal: 8000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub notifications: bool,
    pub ai_tips: bool,
    pub theme: String,
    pub language: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            notifications: true,
            ai_tips: true,
            theme: "light".to_string(),
            language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub progress: u32,
    pub target: u32,
    pub points: u32,
    pub active: bool,
    pub start_date: DateTime<Utc>,
}

impl Challenge {
    /// The starter challenges every new account is enrolled in.
    pub fn defaults(start: DateTime<Utc>) -> Vec<Challenge> {
        let challenge = |id: &str, title: &str, description: &str, kind: &str, progress, target, points| {
            Challenge {
                id: id.to_string(),
                title: title.to_string(),
                description: description.to_string(),
                kind: kind.to_string(),
                progress,
                target,
                points,
                active: true,
                start_date: start,
            }
        };

        vec![
            challenge(
                "breakfast_7day",
                "7-Day Breakfast Challenge",
                "Don't skip breakfast for 7 consecutive days",
                "habit",
                3,
                7,
                100,
            ),
            challenge(
                "hydration_daily",
                "Daily Hydration Goal",
                "Drink 8 glasses of water every day",
                "daily",
                3,
                8,
                50,
            ),
            challenge(
                "spot_explorer",
                "Healthy Spot Explorer",
                "Try 5 different healthy spots this month",
                "exploration",
                1,
                5,
                150,
            ),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snacks,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snacks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snacks => "snacks",
        }
    }

    /// Calories assumed for a one-tap quick log.
    pub fn quick_log_calories(&self) -> f64 {
        match self {
            MealType::Breakfast => 300.0,
            MealType::Lunch => 500.0,
            MealType::Dinner => 450.0,
            MealType::Snacks => 150.0,
        }
    }

    /// Protein (g) assumed for a one-tap quick log.
    pub fn quick_log_protein(&self) -> f64 {
        match self {
            MealType::Breakfast => 15.0,
            MealType::Lunch => 25.0,
            MealType::Dinner => 20.0,
            MealType::Snacks => 5.0,
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A meal as submitted by the caller, before the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMealEntry {
    pub meal_type: MealType,
    pub meal: String,
    pub calories: f64,
    /// Protein (g)
    pub protein: f64,
    pub healthy: bool,
    pub location: String,
    pub source: String,
}

impl NewMealEntry {
    /// A quick-log entry with the default calories and protein for `meal_type`.
    pub fn quick(meal_type: MealType, location: &str) -> Self {
        Self {
            meal_type,
            meal: format!("Quick {} entry", meal_type),
            calories: meal_type.quick_log_calories(),
            protein: meal_type.quick_log_protein(),
            healthy: true,
            location: location.to_string(),
            source: "dashboard-quick-log".to_string(),
        }
    }
}

/// An immutable meal log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealEntry {
    pub id: String,
    pub meal_type: MealType,
    pub meal: String,
    pub calories: f64,
    pub protein: f64,
    pub healthy: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaterKind {
    Sip,
    Glass,
    Bottle,
}

impl WaterKind {
    pub fn from_amount(amount: f64) -> Self {
        if amount >= 2.0 {
            WaterKind::Bottle
        } else if amount >= 1.0 {
            WaterKind::Glass
        } else {
            WaterKind::Sip
        }
    }
}

/// An immutable water intake entry. `amount` is in glasses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterEntry {
    pub id: String,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: WaterKind,
}

pub type MealHistory = BTreeMap<NaiveDate, Vec<MealEntry>>;
pub type WaterHistory = BTreeMap<NaiveDate, Vec<WaterEntry>>;

/// A discrete user action applied to today's log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activity {
    Water,
    Meal(MealType),
    Snack,
    FastFood,
    Study(f64),
    Sleep(f64),
    Stress(u8),
    Energy(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
    Meal,
    Water,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    #[serde(rename = "type")]
    pub kind: ReminderKind,
    pub priority: Priority,
    pub message: String,
    pub action: String,
}

/// Read-only snapshot of every partition, for download features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    pub user: UserData,
    pub meals: MealHistory,
    pub water: WaterHistory,
    pub export_date: DateTime<Utc>,
}
