use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use serde_json::{json, Value};

use nutribridge::advisor::{HealthAdvisor, Mode};
use nutribridge::backend::{FileStore, MemoryStore};
use nutribridge::client::TextGenerator;
use nutribridge::clock::FixedClock;
use nutribridge::config::AdvisorConfig;
use nutribridge::error::TipsError;
use nutribridge::models::{Activity, MealType, NewMealEntry, ReminderKind, WaterKind};
use nutribridge::store::DataStore;
use nutribridge::tips::Confidence;

fn at(day: u32, hour: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
}

fn memory_store(now: DateTime<Local>) -> (DataStore, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(now));
    let store = DataStore::new(MemoryStore::new(), clock.clone());
    (store, clock)
}

type Respond = dyn Fn(&str, &str) -> (u64, Result<String, TipsError>) + Send + Sync;

/// Replies through `respond(model, prompt)`, which also picks a delay in
/// milliseconds. Records the model of every call.
struct FakeGenerator {
    calls: Mutex<Vec<String>>,
    respond: Box<Respond>,
}

impl FakeGenerator {
    fn new(
        respond: impl Fn(&str, &str) -> (u64, Result<String, TipsError>) + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, TipsError> {
        self.calls.lock().unwrap().push(model.to_string());
        let (delay, result) = (self.respond)(model, prompt);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        result
    }
}

fn fenced_reply(motivation: &str) -> String {
    let body = json!({
        "immediateActions": ["Drink water", "Eat a banana", "Stretch", "Nap"],
        "weeklyHabits": ["Prep oats", "Walk daily"],
        "mealRecommendation": {
            "meal": "Paneer wrap",
            "reason": "Protein before the lab",
            "benefits": "Steady energy"
        },
        "studyInsight": "Hydration helps recall",
        "motivation": motivation,
        "healthScoreAnalysis": "Good base"
    });
    format!("Here are your tips:\n```json\n{}\n```", serde_json::to_string_pretty(&body).unwrap())
}

fn advisor_with(generator: Arc<FakeGenerator>) -> HealthAdvisor {
    HealthAdvisor::new(
        Some(generator as Arc<dyn TextGenerator>),
        &AdvisorConfig::default().with_api_key("test-key"),
        Arc::new(FixedClock::new(at(10, 15))),
    )
}

fn burned_out_student() -> Value {
    json!({
        "profile": {"course": "Engineering"},
        "todayLog": {
            "breakfast": true,
            "waterGlasses": 8,
            "studyHours": 9,
            "stressLevel": 9,
            "sleepHours": 5,
            "energyLevel": 6
        },
        "currentStats": {"healthScore": 58}
    })
}

#[test]
fn new_store_persists_a_default_aggregate() {
    let (store, _) = memory_store(at(10, 9));
    assert!(store.is_healthy());

    let user = store.get_user_data();
    assert_eq!(user.today_log.date, at(10, 9).date_naive());
    assert_eq!(user.today_log.water_glasses, 0.0);
    assert_eq!(user.weekly_data.days().count(), 7);
    assert_eq!(user.challenges.len(), 3);
    assert_eq!(user.profile.age, 20);
}

#[test]
fn logging_after_midnight_starts_a_fresh_day() {
    let (store, clock) = memory_store(at(10, 20));
    for _ in 0..3 {
        store.log_activity(Activity::Water);
    }
    store.log_activity(Activity::Meal(MealType::Breakfast));
    assert_eq!(store.get_user_data().today_log.water_glasses, 3.0);

    clock.advance(chrono::Duration::hours(12));
    let user = store.log_activity(Activity::Water).expect("log should persist");

    assert_eq!(user.today_log.date, at(11, 8).date_naive());
    assert_eq!(user.today_log.water_glasses, 1.0);
    assert!(!user.today_log.breakfast);
}

#[test]
fn full_day_scores_ninety_and_water_caps_at_fifteen() {
    let (store, _) = memory_store(at(10, 20));
    for meal in [MealType::Breakfast, MealType::Lunch, MealType::Dinner] {
        store.log_activity(Activity::Meal(meal));
    }
    store.log_activity(Activity::Sleep(8.0));
    for _ in 0..8 {
        store.log_activity(Activity::Water);
    }
    assert_eq!(store.get_user_data().current_stats.health_score, 90);

    for _ in 0..20 {
        store.log_activity(Activity::Water);
    }
    let user = store.log_activity(Activity::Stress(14)).unwrap();
    assert_eq!(user.today_log.water_glasses, 15.0);
    assert_eq!(user.today_log.stress_level, 10);
    // Stress 10 costs 15 points.
    assert_eq!(user.current_stats.health_score, 75);
}

#[test]
fn streaks_count_once_per_day() {
    let (store, _) = memory_store(at(10, 9));
    let before = store.get_user_data().streaks;

    store.log_activity(Activity::Meal(MealType::Breakfast));
    let user = store.log_activity(Activity::Meal(MealType::Breakfast)).unwrap();

    assert_eq!(user.streaks.breakfast_streak, before.breakfast_streak + 1);
}

#[test]
fn partial_update_merges_into_nested_sections() {
    let (store, _) = memory_store(at(10, 9));

    let user = store
        .update_user_data(json!({"profile": {"name": "Asha", "healthGoals": ["Sleep"]}}))
        .expect("update should persist");

    assert_eq!(user.profile.name, "Asha");
    assert_eq!(user.profile.health_goals, vec!["Sleep".to_string()]);
    assert_eq!(user.profile.age, 20);
    assert_eq!(user.goals.water_goal, 8.0);
    assert_eq!(store.get_user_data(), user);
}

#[test]
fn ill_typed_update_is_rejected() {
    let (store, _) = memory_store(at(10, 9));
    let before = store.get_user_data();

    assert!(store
        .update_user_data(json!({"currentStats": {"healthScore": "great"}}))
        .is_none());
    assert_eq!(store.get_user_data(), before);
}

#[test]
fn quota_exceeded_degrades_to_defaults() {
    let clock = Arc::new(FixedClock::new(at(10, 9)));
    let store = DataStore::new(MemoryStore::with_quota(64), clock);

    assert!(!store.is_healthy());
    let user = store.get_user_data();
    assert_eq!(user.profile.name, "Student");
    assert!(store.save_user_data(user).is_none());
    assert!(store.log_activity(Activity::Water).is_none());
}

#[test]
fn meals_append_in_order_with_unique_ids() {
    let (store, _) = memory_store(at(10, 13));
    store.log_meal_entry(NewMealEntry::quick(MealType::Breakfast, "Home"));
    store.log_meal_entry(NewMealEntry::quick(MealType::Lunch, "Canteen"));
    let day = store.log_meal_entry(NewMealEntry::quick(MealType::Breakfast, "Cafe"));

    let kinds: Vec<MealType> = day.iter().map(|m| m.meal_type).collect();
    assert_eq!(kinds, vec![MealType::Breakfast, MealType::Lunch, MealType::Breakfast]);
    let ids: HashSet<&str> = day.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(store.todays_meals(), day);
    assert_eq!(store.today_nutrition().calories, 1100.0);

    let remaining = store.remove_last_meal(MealType::Breakfast);
    assert_eq!(remaining.len(), 2);
    assert_eq!(remaining[0].location, "Home");
    assert_eq!(remaining[1].meal_type, MealType::Lunch);

    let stats = store.meal_statistics(7);
    assert_eq!(stats.total_meals, 2);
    assert_eq!(stats.meal_types.lunch, 1);
}

#[test]
fn non_finite_meal_values_do_not_corrupt_history() {
    let (store, _) = memory_store(at(10, 13));
    store.log_meal_entry(NewMealEntry::quick(MealType::Breakfast, "Home"));

    let mut lunch = NewMealEntry::quick(MealType::Lunch, "Canteen");
    lunch.calories = f64::INFINITY;
    lunch.protein = f64::NAN;
    let day = store.log_meal_entry(lunch);
    assert_eq!(day.len(), 2);
    assert_eq!(day[1].calories, 0.0);
    assert_eq!(day[1].protein, 0.0);

    let day = store.log_meal_entry(NewMealEntry::quick(MealType::Dinner, "Home"));
    assert_eq!(day.len(), 3);
    assert_eq!(store.meal_history().len(), 1);
    assert!(store.has_meal_type_today(MealType::Lunch));
    assert!(!store.has_meal_type_today(MealType::Snacks));
}

#[test]
fn non_finite_hours_keep_the_stored_profile() {
    let (store, _) = memory_store(at(10, 22));
    store.update_user_data(json!({"profile": {"name": "Asha"}}));

    let user = store.log_activity(Activity::Sleep(f64::INFINITY)).unwrap();
    assert_eq!(user.today_log.sleep_hours, 0.0);
    let user = store.log_activity(Activity::Study(f64::NEG_INFINITY)).unwrap();
    assert_eq!(user.today_log.study_hours, 0.0);

    // A caller-built aggregate that cannot round-trip is refused outright.
    let mut broken = store.get_user_data();
    broken.today_log.sleep_hours = f64::INFINITY;
    assert!(store.save_user_data(broken).is_none());

    assert!(store.is_healthy());
    assert_eq!(store.get_user_data().profile.name, "Asha");
}

#[test]
fn meals_by_type_reads_back_across_days() {
    let (store, clock) = memory_store(at(9, 13));
    store.log_meal_entry(NewMealEntry::quick(MealType::Lunch, "Canteen"));
    clock.set(at(10, 13));
    store.log_meal_entry(NewMealEntry::quick(MealType::Lunch, "Home"));
    store.log_meal_entry(NewMealEntry::quick(MealType::Dinner, "Home"));

    let lunches = store.meals_by_type(MealType::Lunch, 7);
    let locations: Vec<&str> = lunches.iter().map(|m| m.entry.location.as_str()).collect();
    assert_eq!(locations, vec!["Canteen", "Home"]);
    assert_eq!(store.meals_by_type(MealType::Lunch, 0).len(), 1);
}

#[test]
fn water_entries_drive_todays_total() {
    let (store, clock) = memory_store(at(10, 9));
    store.log_water_intake(0.5);
    store.log_water_intake(1.0);
    let day = store.log_water_intake(2.0);

    let kinds: Vec<WaterKind> = day.iter().map(|w| w.kind).collect();
    assert_eq!(kinds, vec![WaterKind::Sip, WaterKind::Glass, WaterKind::Bottle]);
    assert_eq!(store.get_user_data().today_log.water_glasses, 3.5);

    // A backfilled entry for yesterday leaves today's total alone.
    let yesterday = store.log_water_intake_at(1.0, at(9, 18));
    assert_eq!(yesterday.len(), 1);
    assert_eq!(store.get_user_data().today_log.water_glasses, 3.5);

    assert_eq!(store.log_water_intake(-1.0).len(), 3);

    clock.set(at(11, 9));
    assert_eq!(store.log_water_intake(1.0).len(), 1);
    assert_eq!(store.get_user_data().today_log.water_glasses, 1.0);
}

#[test]
fn reminders_follow_the_clock() {
    let (store, clock) = memory_store(at(10, 8));
    let reminders = store.get_smart_reminders();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].kind, ReminderKind::Meal);

    store.log_activity(Activity::Meal(MealType::Breakfast));
    assert!(store.get_smart_reminders().is_empty());

    clock.set(at(10, 13));
    store.log_water_intake(1.0);
    let reminders = store.get_smart_reminders();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].message, "You're 7 glasses behind your hydration goal.");
}

#[test]
fn export_then_clear() {
    let (store, _) = memory_store(at(10, 12));
    store.log_meal_entry(NewMealEntry::quick(MealType::Lunch, "Canteen"));
    store.log_water_intake(1.0);

    let export = store.export_data();
    assert_eq!(export.meals.values().map(Vec::len).sum::<usize>(), 1);
    assert_eq!(export.water.len(), 1);
    assert_eq!(export.user.today_log.water_glasses, 1.0);

    assert!(store.clear_all_data());
    assert!(store.meal_history().is_empty());
    assert!(store.water_history().is_empty());
    assert!(store.is_healthy());
    assert_eq!(store.get_user_data().today_log.water_glasses, 0.0);
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(FixedClock::new(at(10, 12)));

    {
        let store = DataStore::new(FileStore::open(dir.path()).unwrap(), clock.clone());
        store.log_activity(Activity::Water);
        store.log_meal_entry(NewMealEntry::quick(MealType::Lunch, "Canteen"));
    }

    let store = DataStore::new(FileStore::open(dir.path()).unwrap(), clock);
    assert_eq!(store.get_user_data().today_log.water_glasses, 1.0);
    assert_eq!(store.todays_meals().len(), 1);
    assert!(dir.path().join("nutribridge_user.json").exists());
}

#[tokio::test]
async fn demo_tips_put_burnout_first() {
    let advisor = HealthAdvisor::new(
        None,
        &AdvisorConfig::default(),
        Arc::new(FixedClock::new(at(10, 15))),
    );
    let tips = advisor.get_personalized_health_tips(&burned_out_student()).await;

    assert_eq!(tips.confidence, Confidence::Demo);
    assert!(tips.immediate_actions[0].contains("burnout"));
    assert!(tips.immediate_actions.len() <= 3);
    assert_eq!(tips.weekly_habits.len(), 2);
    assert!(tips.health_score_analysis.starts_with("Your 58% score shows potential"));
    assert_eq!(advisor.status().mode, Mode::Demo);
}

#[tokio::test]
async fn tips_for_stored_user() {
    let (store, _) = memory_store(at(10, 9));
    let advisor = HealthAdvisor::new(
        None,
        &AdvisorConfig::default(),
        Arc::new(FixedClock::new(at(10, 9))),
    );
    let tips = advisor.tips_for_user(&store.get_user_data()).await;
    assert_eq!(tips.confidence, Confidence::Demo);
    assert!(tips.analysis_metrics.is_some());
}

#[tokio::test]
async fn generated_tips_are_parsed_and_capped() {
    let generator = FakeGenerator::new(|_, _| (0, Ok(fenced_reply("Keep going"))));
    let advisor = advisor_with(generator.clone());

    let tips = advisor.get_personalized_health_tips(&burned_out_student()).await;
    assert_eq!(tips.confidence, Confidence::Ai);
    assert_eq!(tips.motivation, "Keep going");
    assert_eq!(tips.immediate_actions.len(), 3);
    assert!(tips.analysis_metrics.is_none());
    assert_eq!(generator.calls(), vec!["gemini-1.5-flash".to_string()]);
}

#[tokio::test]
async fn unusable_reply_falls_back_to_rules() {
    let generator = FakeGenerator::new(|_, _| (0, Ok("I cannot help with that.".to_string())));
    let advisor = advisor_with(generator.clone());

    let tips = advisor.get_personalized_health_tips(&burned_out_student()).await;
    assert_eq!(tips.confidence, Confidence::Demo);
    assert!(tips.immediate_actions[0].contains("burnout"));
    assert_eq!(generator.calls().len(), 1);
}

#[tokio::test]
async fn missing_model_retries_once_on_alternate() {
    let generator = FakeGenerator::new(|model, _| {
        if model == "gemini-1.5-flash" {
            (0, Err(TipsError::ModelNotFound(model.to_string())))
        } else {
            (0, Ok(fenced_reply("From the alternate")))
        }
    });
    let advisor = advisor_with(generator.clone());

    let tips = advisor.get_personalized_health_tips(&json!({})).await;
    assert_eq!(tips.motivation, "From the alternate");
    assert_eq!(
        generator.calls(),
        vec!["gemini-1.5-flash".to_string(), "gemini-1.5-pro".to_string()]
    );
    assert_eq!(advisor.status().model, "gemini-1.5-pro");
}

#[tokio::test]
async fn other_failures_do_not_retry() {
    let generator = FakeGenerator::new(|_, _| {
        (
            0,
            Err(TipsError::Status {
                status: 500,
                body: "internal".to_string(),
            }),
        )
    });
    let advisor = advisor_with(generator.clone());

    let tips = advisor.get_personalized_health_tips(&json!({})).await;
    assert_eq!(tips.confidence, Confidence::Demo);
    assert_eq!(generator.calls().len(), 1);
}

#[tokio::test]
async fn alternate_failure_falls_back() {
    let generator =
        FakeGenerator::new(|model, _| (0, Err(TipsError::ModelNotFound(model.to_string()))));
    let advisor = advisor_with(generator.clone());

    let tips = advisor.get_personalized_health_tips(&json!({})).await;
    assert_eq!(tips.confidence, Confidence::Demo);
    assert_eq!(generator.calls().len(), 2);
    assert_eq!(advisor.status().model, "gemini-1.5-flash");
}

#[tokio::test]
async fn superseded_request_is_never_published() {
    let generator = FakeGenerator::new(|_, prompt| {
        if prompt.contains("Academic: First student") {
            (300, Ok(fenced_reply("first")))
        } else {
            (0, Ok(fenced_reply("second")))
        }
    });
    let advisor = advisor_with(generator);
    let mut updates = advisor.subscribe();

    let first = advisor.request_tips(json!({"profile": {"course": "First"}}));
    let second = advisor.request_tips(json!({"profile": {"course": "Second"}}));
    assert!(second > first);

    let update = tokio::time::timeout(Duration::from_secs(2), updates.wait_for(|u| u.is_some()))
        .await
        .expect("tips should arrive")
        .expect("advisor alive")
        .clone()
        .unwrap();
    assert_eq!(update.request_id, second);
    assert_eq!(update.tips.motivation, "second");

    tokio::time::sleep(Duration::from_millis(500)).await;
    let latest = advisor.latest().unwrap();
    assert_eq!(latest.request_id, second);
    assert_eq!(latest.tips.motivation, "second");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_publish_the_newest() {
    let generator = FakeGenerator::new(|_, _| (10, Ok(fenced_reply("done"))));
    let advisor = Arc::new(advisor_with(generator));
    let mut updates = advisor.subscribe();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let advisor = Arc::clone(&advisor);
            tokio::spawn(async move {
                advisor.request_tips(json!({"profile": {"course": format!("Course {}", i)}}))
            })
        })
        .collect();
    let mut newest = 0;
    for handle in handles {
        newest = newest.max(handle.await.unwrap());
    }
    assert_eq!(newest, 16);

    tokio::time::timeout(
        Duration::from_secs(2),
        updates.wait_for(|u| u.as_ref().is_some_and(|u| u.request_id == newest)),
    )
    .await
    .expect("newest tips should arrive")
    .expect("advisor alive");
}
