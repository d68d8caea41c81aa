#![warn(missing_docs)]
//! Core services for a Telegram football bot.
//!
//! This crate wraps a sports-data API and a hosted user backend behind typed
//! clients, with local rate limiting, retries with exponential backoff, and
//! TTL response caching shared by every consumer.

/// The service for managing user accounts, points and referrals.
pub mod account;
/// The client for the hosted backend holding users and preferences.
pub mod backend;
/// A TTL cache with oldest-insertion eviction.
pub mod cache;
/// The configuration for the application.
pub mod config;
/// The client for the sports-data API.
pub mod football;
/// A token-bucket rate limiter with independent time windows.
pub mod limiter;
/// The typed records exchanged with the sports-data API.
pub mod models;
/// Retry with exponential backoff for transient failures.
pub mod retry;

use std::sync::Arc;

use chrono::Utc;

use crate::{
    account::{AccountService, DefaultAccountService},
    backend::{DataStore, SupabaseStore},
    config::Config,
    football::{ApiFootballClient, FootballApi},
};

/// The shared services of the application, wired once at startup and handed
/// to every consumer.
pub struct AppContext {
    /// Client for the sports-data API.
    pub football: Arc<dyn FootballApi>,
    /// Account operations on top of the backend.
    pub accounts: Arc<dyn AccountService>,
    /// Raw backend access for consumers the account layer does not cover.
    pub store: Arc<dyn DataStore>,
}

impl AppContext {
    /// Wires the application services from the configuration.
    pub fn from_config(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let football = Arc::new(ApiFootballClient::new(config)?);
        let store: Arc<dyn DataStore> = Arc::new(SupabaseStore::new(config)?);
        let accounts = Arc::new(DefaultAccountService::new(store.clone()));
        Ok(Self { football, accounts, store })
    }
}

/// Runs the application: wires the services and prints today's fixtures.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let context = AppContext::from_config(&config)?;

    let today = Utc::now().format("%Y-%m-%d").to_string();
    let matches = context.football.fixtures_by_date(&today, None, None).await?;
    tracing::info!("{} matches scheduled on {today}", matches.len());
    for m in matches.iter().take(10) {
        tracing::info!("{}", m.summary());
    }

    Ok(())
}
