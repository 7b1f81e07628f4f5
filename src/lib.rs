pub mod advisor;
pub mod analysis;
pub mod backend;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod models;
pub mod rules;
pub mod scoring;
pub mod store;
pub mod tips;

pub use advisor::HealthAdvisor;
pub use client::{GeminiClient, TextGenerator};
pub use config::{AdvisorConfig, StoreConfig};
pub use error::TipsError;
pub use store::DataStore;
