//! Core library for the `forecast-digest` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The Open-Meteo hourly forecast provider, behind a retrying, caching HTTP client
//! - Rendering of the trailing hourly window as an annotated text table
//! - Delivery of that text to a Telegram channel
//!
//! It is used by `forecast-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod notifier;
pub mod pipeline;
pub mod provider;
pub mod report;

pub use config::{Config, ForecastConfig, HttpPolicy, LocationConfig, TelegramConfig};
pub use error::{DigestError, Result};
pub use model::{DeliveryResult, ForecastRequest, HourlySeries, OutboundMessage, ReportRow};
pub use notifier::{Notifier, TelegramNotifier};
pub use pipeline::{WeatherFetcher, run_once};
pub use provider::{ForecastProvider, provider_from_config};
pub use report::Report;
