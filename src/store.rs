use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, Timelike, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::{FileStore, KeyValueStore};
use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::history::{self, MealStatistics, NutritionTotals};
use crate::models::*;
use crate::scoring::{calculate_health_score, update_streaks};

pub const USER_KEY: &str = "nutribridge_user";
pub const MEALS_KEY: &str = "nutribridge_meals";
pub const WATER_KEY: &str = "nutribridge_water";

/// Upper bound for water glasses reached through single-glass logging.
pub const MAX_WATER_GLASSES: f64 = 15.0;

/// The local data store backing every tracking screen.
///
/// Public methods never fail: read and write errors are logged and replaced
/// by a safe default (the synthesized aggregate, an empty list, `None`).
pub struct DataStore {
    backend: Box<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl DataStore {
    /// Wrap `backend`, persisting a default aggregate if none exists yet.
    pub fn new(backend: impl KeyValueStore + 'static, clock: Arc<dyn Clock>) -> Self {
        let store = Self {
            backend: Box::new(backend),
            clock,
        };
        store.initialize();
        store
    }

    /// Open the on-disk store described by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let backend = FileStore::open(&config.data_dir)?;
        Ok(Self::new(backend, Arc::new(SystemClock)))
    }

    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    fn initialize(&self) {
        match self.backend.read(USER_KEY) {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!("no user data found, persisting defaults");
                self.save_user_data(UserData::synthesize(self.clock.now()));
            }
            Err(e) => warn!(error = %e, "could not check for existing user data"),
        }
    }

    fn load_user_data(&self) -> Result<Option<UserData>> {
        let Some(raw) = self.backend.read(USER_KEY)? else {
            return Ok(None);
        };
        let data = serde_json::from_str(&raw).context("parsing user data")?;
        Ok(Some(data))
    }

    fn load_partition<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        match self.backend.read(key)? {
            Some(raw) => serde_json::from_str(&raw).with_context(|| format!("parsing {}", key)),
            None => Ok(T::default()),
        }
    }

    /// Serialize and store `value`, refusing documents that would not parse
    /// back (non-finite floats serialize as `null`).
    fn write_json<T: Serialize + DeserializeOwned>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        serde_json::from_str::<T>(&raw)
            .with_context(|| format!("refusing to write unreadable {}", key))?;
        self.backend.write(key, &raw)
    }

    /// The persisted aggregate, or a freshly synthesized default when nothing
    /// is stored or the stored document cannot be parsed.
    pub fn get_user_data(&self) -> UserData {
        match self.load_user_data() {
            Ok(Some(data)) => data,
            Ok(None) => UserData::synthesize(self.clock.now()),
            Err(e) => {
                warn!(error = %e, "failed to load user data, using defaults");
                UserData::synthesize(self.clock.now())
            }
        }
    }

    /// Persist the aggregate. Returns `None` when the write fails (for
    /// example when the storage quota is exceeded).
    pub fn save_user_data(&self, data: UserData) -> Option<UserData> {
        match self.write_json(USER_KEY, &data) {
            Ok(()) => Some(data),
            Err(e) => {
                warn!(error = %e, "failed to save user data");
                None
            }
        }
    }

    /// Recursively merge `partial` into the stored aggregate and persist it.
    ///
    /// Nested objects merge key by key with incoming values winning; arrays
    /// and scalars are replaced outright.
    pub fn update_user_data(&self, partial: Value) -> Option<UserData> {
        match self.merged_user_data(partial) {
            Ok(merged) => self.save_user_data(merged),
            Err(e) => {
                warn!(error = %e, "rejected user data update");
                None
            }
        }
    }

    fn merged_user_data(&self, partial: Value) -> Result<UserData> {
        let mut current = serde_json::to_value(self.get_user_data())?;
        deep_merge(&mut current, partial);
        serde_json::from_value(current).context("merged user data no longer matches the schema")
    }

    /// Apply `mutate` to today's log after the day-rollover check, then
    /// recompute the health score and streaks and persist.
    fn mutate_today(&self, mutate: impl FnOnce(&mut TodayLog)) -> Option<UserData> {
        let today = self.today();
        let mut data = self.get_user_data();

        if data.today_log.date != today {
            debug!(stale = %data.today_log.date, %today, "day rolled over, resetting today's log");
            data.today_log = TodayLog::fresh(today);
        }

        let before = data.today_log.clone();
        mutate(&mut data.today_log);
        data.current_stats.health_score = calculate_health_score(&data.today_log);
        update_streaks(&mut data.streaks, &before, &data.today_log, &data.goals);

        self.save_user_data(data)
    }

    /// Record a discrete activity against today's log.
    pub fn log_activity(&self, activity: Activity) -> Option<UserData> {
        debug!(?activity, "logging activity");
        self.mutate_today(|log| match activity {
            Activity::Water => {
                log.water_glasses = (log.water_glasses + 1.0).min(MAX_WATER_GLASSES);
            }
            Activity::Meal(MealType::Breakfast) => log.breakfast = true,
            Activity::Meal(MealType::Lunch) => log.lunch = true,
            Activity::Meal(MealType::Dinner) => log.dinner = true,
            Activity::Meal(MealType::Snacks) | Activity::Snack => log.snacks += 1,
            Activity::FastFood => log.fast_food += 1,
            Activity::Study(hours) => log.study_hours = non_negative(hours),
            Activity::Sleep(hours) => log.sleep_hours = non_negative(hours),
            Activity::Stress(level) => log.stress_level = level.min(10),
            Activity::Energy(level) => log.energy_level = level.min(10),
        })
    }

    /// Append a meal under today's date and return the day's meals in
    /// logging order.
    pub fn log_meal_entry(&self, entry: NewMealEntry) -> Vec<MealEntry> {
        match self.append_meal(entry) {
            Ok(day) => day,
            Err(e) => {
                warn!(error = %e, "failed to log meal entry");
                Vec::new()
            }
        }
    }

    fn append_meal(&self, entry: NewMealEntry) -> Result<Vec<MealEntry>> {
        let now = self.clock.now();
        let mut meals: MealHistory = self.load_partition(MEALS_KEY)?;
        let day = meals.entry(now.date_naive()).or_default();
        day.push(MealEntry {
            id: generate_id(),
            meal_type: entry.meal_type,
            meal: entry.meal,
            calories: non_negative(entry.calories),
            protein: non_negative(entry.protein),
            healthy: entry.healthy,
            timestamp: now.with_timezone(&Utc),
            location: entry.location,
            source: entry.source,
        });
        let day = day.clone();
        self.write_json(MEALS_KEY, &meals)?;
        Ok(day)
    }

    /// Undo the most recent meal of `meal_type` logged today by replacing
    /// today's list wholesale. Returns the remaining meals.
    pub fn remove_last_meal(&self, meal_type: MealType) -> Vec<MealEntry> {
        let today = self.today();
        let result = self.load_partition::<MealHistory>(MEALS_KEY).and_then(|mut meals| {
            let mut day = meals.remove(&today).unwrap_or_default();
            if let Some(index) = day.iter().rposition(|m| m.meal_type == meal_type) {
                day.remove(index);
            }
            meals.insert(today, day.clone());
            self.write_json(MEALS_KEY, &meals)?;
            Ok(day)
        });

        match result {
            Ok(day) => day,
            Err(e) => {
                warn!(error = %e, %meal_type, "failed to remove meal entry");
                Vec::new()
            }
        }
    }

    pub fn meal_history(&self) -> MealHistory {
        self.load_partition(MEALS_KEY).unwrap_or_else(|e| {
            warn!(error = %e, "failed to load meal history");
            MealHistory::new()
        })
    }

    pub fn todays_meals(&self) -> Vec<MealEntry> {
        history::meals_for_date(&self.meal_history(), self.today()).to_vec()
    }

    pub fn today_nutrition(&self) -> NutritionTotals {
        history::nutrition_totals(&self.todays_meals())
    }

    /// Meals of `meal_type` from the last `days` days, today included.
    pub fn meals_by_type(&self, meal_type: MealType, days: u32) -> Vec<history::DatedMeal> {
        history::meals_by_type(&self.meal_history(), meal_type, self.today(), days)
    }

    pub fn has_meal_type_today(&self, meal_type: MealType) -> bool {
        history::has_meal_type(&self.todays_meals(), meal_type)
    }

    /// Meal statistics over the last `days` days, today included.
    pub fn meal_statistics(&self, days: u32) -> MealStatistics {
        history::meal_statistics(&self.meal_history(), self.today(), days)
    }

    /// Log water drunk now. See [`DataStore::log_water_intake_at`].
    pub fn log_water_intake(&self, amount: f64) -> Vec<WaterEntry> {
        self.log_water_intake_at(amount, self.clock.now())
    }

    /// Append a water entry under `timestamp`'s day and return that day's
    /// entries. When the day is today, its total becomes today's
    /// `waterGlasses`.
    pub fn log_water_intake_at(&self, amount: f64, timestamp: DateTime<Local>) -> Vec<WaterEntry> {
        if !amount.is_finite() || amount <= 0.0 {
            warn!(amount, "ignoring non-positive water amount");
            return self
                .water_history()
                .remove(&timestamp.date_naive())
                .unwrap_or_default();
        }

        match self.append_water(amount, timestamp) {
            Ok(day) => {
                if timestamp.date_naive() == self.today() {
                    let total: f64 = day.iter().map(|entry| entry.amount).sum();
                    self.mutate_today(|log| log.water_glasses = total);
                }
                day
            }
            Err(e) => {
                warn!(error = %e, "failed to log water intake");
                Vec::new()
            }
        }
    }

    fn append_water(&self, amount: f64, timestamp: DateTime<Local>) -> Result<Vec<WaterEntry>> {
        let mut water: WaterHistory = self.load_partition(WATER_KEY)?;
        let day = water.entry(timestamp.date_naive()).or_default();
        day.push(WaterEntry {
            id: generate_id(),
            amount,
            timestamp: timestamp.with_timezone(&Utc),
            kind: WaterKind::from_amount(amount),
        });
        let day = day.clone();
        self.write_json(WATER_KEY, &water)?;
        Ok(day)
    }

    pub fn water_history(&self) -> WaterHistory {
        self.load_partition(WATER_KEY).unwrap_or_else(|e| {
            warn!(error = %e, "failed to load water history");
            WaterHistory::new()
        })
    }

    /// Up to two reminders derived from the current hour and today's log.
    pub fn get_smart_reminders(&self) -> Vec<Reminder> {
        let now = self.clock.now();
        let data = self.get_user_data();
        let log = if data.today_log.date == now.date_naive() {
            data.today_log
        } else {
            TodayLog::fresh(now.date_naive())
        };
        smart_reminders(now.hour(), &log, &data.goals)
    }

    pub fn export_data(&self) -> ExportSnapshot {
        ExportSnapshot {
            user: self.get_user_data(),
            meals: self.meal_history(),
            water: self.water_history(),
            export_date: self.clock.now().with_timezone(&Utc),
        }
    }

    /// Remove every partition and re-create the default aggregate.
    pub fn clear_all_data(&self) -> bool {
        let result = [USER_KEY, MEALS_KEY, WATER_KEY]
            .iter()
            .try_for_each(|key| self.backend.remove(key));

        match result {
            Ok(()) => {
                self.initialize();
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to clear data");
                false
            }
        }
    }

    /// True when the user partition can be read and parsed.
    pub fn is_healthy(&self) -> bool {
        matches!(self.load_user_data(), Ok(Some(_)))
    }
}

/// Merge `incoming` into `target`: objects merge recursively, anything else
/// replaces the existing value.
pub fn deep_merge(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match target.get_mut(&key) {
                    Some(existing) if value.is_object() => deep_merge(existing, value),
                    _ => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, incoming) => *target = incoming,
    }
}

fn smart_reminders(hour: u32, log: &TodayLog, goals: &Goals) -> Vec<Reminder> {
    let mut reminders = Vec::new();

    if (7..=10).contains(&hour) && !log.breakfast {
        reminders.push(Reminder {
            kind: ReminderKind::Meal,
            priority: Priority::High,
            message: "Time for breakfast! Your brain needs fuel for the day.".to_string(),
            action: "Log Breakfast".to_string(),
        });
    }

    if log.water_glasses < 4.0 && hour > 10 {
        let behind = (goals.water_goal - log.water_glasses).max(0.0);
        reminders.push(Reminder {
            kind: ReminderKind::Water,
            priority: Priority::Medium,
            message: format!(
                "You're {} glasses behind your hydration goal.",
                format_glasses(behind)
            ),
            action: "Log Water".to_string(),
        });
    }

    reminders
}

fn format_glasses(glasses: f64) -> String {
    if glasses.fract() == 0.0 {
        format!("{:.0}", glasses)
    } else {
        format!("{:.1}", glasses)
    }
}

/// Clamp user-entered quantities to finite values of at least zero.
fn non_negative(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
