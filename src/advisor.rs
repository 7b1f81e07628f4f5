//! Personalized health tips: generated when a text generator is configured,
//! rule-based otherwise, with request fencing for screens that re-request
//! tips while an earlier request is still running.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::analysis::{perform_deep_analysis, validate_user_data, SafeUserData};
use crate::client::{GeminiClient, TextGenerator};
use crate::clock::{Clock, SystemClock};
use crate::config::AdvisorConfig;
use crate::error::TipsError;
use crate::models::UserData;
use crate::tips::{build_prompt, fallback_tips, parse_tips_response, HealthTips};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Demo,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisorStatus {
    pub mode: Mode,
    pub model: String,
    pub configured: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ConnectionStatus {
    Demo,
    Connected { model: String },
    Error { message: String },
}

/// Tips published for a fenced request.
#[derive(Debug, Clone, PartialEq)]
pub struct TipsUpdate {
    pub request_id: u64,
    pub tips: HealthTips,
}

struct Inner {
    generator: Option<Arc<dyn TextGenerator>>,
    clock: Arc<dyn Clock>,
    model: Mutex<String>,
    alternate_model: Option<String>,
    latest_request: AtomicU64,
    updates: watch::Sender<Option<TipsUpdate>>,
}

pub struct HealthAdvisor {
    inner: Arc<Inner>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
}

impl HealthAdvisor {
    /// `generator: None` runs in demo mode.
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        config: &AdvisorConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (updates, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                generator,
                clock,
                model: Mutex::new(config.model.clone()),
                alternate_model: config.alternate_model.clone(),
                latest_request: AtomicU64::new(0),
                updates,
            }),
            in_flight: Mutex::new(None),
        }
    }

    /// Gemini-backed advisor when the config carries an API key, demo
    /// otherwise.
    pub fn from_config(config: &AdvisorConfig) -> Result<Self, TipsError> {
        let generator = GeminiClient::from_config(config)?
            .map(|client| Arc::new(client) as Arc<dyn TextGenerator>);
        match &generator {
            Some(_) => info!(model = %config.model, "tips advisor using generated content"),
            None => info!("tips advisor running in demo mode"),
        }
        Ok(Self::new(generator, config, Arc::new(SystemClock)))
    }

    pub fn demo() -> Self {
        Self::new(None, &AdvisorConfig::default(), Arc::new(SystemClock))
    }

    /// Tips for arbitrary (possibly partial or malformed) user JSON.
    pub async fn get_personalized_health_tips(&self, raw: &Value) -> HealthTips {
        self.inner.tips_for(validate_user_data(raw)).await
    }

    pub async fn tips_for_user(&self, data: &UserData) -> HealthTips {
        self.inner.tips_for(SafeUserData::from(data)).await
    }

    /// Start a fenced request and return its id. Any earlier request still
    /// running is aborted, and only the newest request's tips are published.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn request_tips(&self, raw: Value) -> u64 {
        // Ids are issued under the lock so the installed task is always the newest.
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        let id = self.inner.latest_request.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);

        let task = tokio::spawn(async move {
            let tips = inner.tips_for(validate_user_data(&raw)).await;
            inner.publish(id, tips);
        });

        if let Some(previous) = in_flight.replace(task) {
            previous.abort();
        }
        id
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<TipsUpdate>> {
        self.inner.updates.subscribe()
    }

    /// The most recently published tips, if any.
    pub fn latest(&self) -> Option<TipsUpdate> {
        self.inner.updates.borrow().clone()
    }

    pub fn status(&self) -> AdvisorStatus {
        let configured = self.inner.generator.is_some();
        AdvisorStatus {
            mode: if configured { Mode::Ai } else { Mode::Demo },
            model: self.inner.current_model(),
            configured,
        }
    }

    pub async fn test_connection(&self) -> ConnectionStatus {
        let Some(generator) = &self.inner.generator else {
            return ConnectionStatus::Demo;
        };
        let model = self.inner.current_model();
        match generator.generate(&model, "Test connection").await {
            Ok(_) => ConnectionStatus::Connected { model },
            Err(e) => ConnectionStatus::Error {
                message: e.to_string(),
            },
        }
    }
}

impl Drop for HealthAdvisor {
    fn drop(&mut self) {
        let in_flight = self.in_flight.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(task) = in_flight.take() {
            task.abort();
        }
    }
}

impl Inner {
    fn current_model(&self) -> String {
        self.model.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_model(&self, model: &str) {
        *self.model.lock().unwrap_or_else(|e| e.into_inner()) = model.to_string();
    }

    async fn tips_for(&self, data: SafeUserData) -> HealthTips {
        let analysis = perform_deep_analysis(&data, self.clock.now());
        let Some(generator) = &self.generator else {
            debug!("demo mode, using rule-based tips");
            return fallback_tips(&analysis);
        };

        let prompt = build_prompt(&data);
        let model = self.current_model();
        let error = match ask(generator.as_ref(), &model, &prompt).await {
            Ok(tips) => return tips,
            Err(e) => e,
        };

        let alternate = self
            .alternate_model
            .as_deref()
            .filter(|alternate| error.is_model_not_found() && *alternate != model);
        let Some(alternate) = alternate else {
            warn!(error = %error, "generated tips unavailable, using rule-based tips");
            return fallback_tips(&analysis);
        };

        warn!(%model, %alternate, "model not found, trying alternate model");
        match ask(generator.as_ref(), alternate, &prompt).await {
            Ok(tips) => {
                self.set_model(alternate);
                tips
            }
            Err(e) => {
                warn!(error = %e, "alternate model failed, using rule-based tips");
                fallback_tips(&analysis)
            }
        }
    }

    /// Publish `tips` unless a newer request has been started or already
    /// published.
    fn publish(&self, id: u64, tips: HealthTips) {
        let published = self.updates.send_if_modified(|current| {
            let newest = self.latest_request.load(Ordering::SeqCst) == id
                && current.as_ref().map_or(true, |update| update.request_id < id);
            if newest {
                *current = Some(TipsUpdate {
                    request_id: id,
                    tips,
                });
            }
            newest
        });
        if !published {
            debug!(request_id = id, "discarding superseded tips");
        }
    }
}

async fn ask(generator: &dyn TextGenerator, model: &str, prompt: &str) -> Result<HealthTips, TipsError> {
    let text = generator.generate(model, prompt).await?;
    parse_tips_response(&text)
}
