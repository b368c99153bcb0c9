//! HTTP API: Telegram webhook, health probes and admin endpoints

pub mod admin;
mod auth;
pub mod health;
pub mod rate_limit;
pub mod webhooks;

use std::sync::{Arc, Mutex};

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::assistant::Assistant;
use crate::db::DbPool;
use crate::scheduler::Scheduler;
use crate::telegram::UpdateDedup;
use crate::Result;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub db: DbPool,
    pub assistant: Arc<Assistant>,
    /// Absent when jobs are disabled
    pub scheduler: Option<Scheduler>,
    /// Bearer key for admin routes; open when unset
    pub api_key: Option<String>,
    /// Expected `x-telegram-bot-api-secret-token`
    pub webhook_secret: Option<String>,
    pub dedup: Arc<Mutex<UpdateDedup>>,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    db: DbPool,
    assistant: Arc<Assistant>,
    scheduler: Option<Scheduler>,
    api_key: Option<String>,
    webhook_secret: Option<String>,
    rate_limit_rpm: Option<u32>,
    port: u16,
}

impl ApiServerBuilder {
    #[must_use]
    pub const fn new(db: DbPool, assistant: Arc<Assistant>) -> Self {
        Self {
            db,
            assistant,
            scheduler: None,
            api_key: None,
            webhook_secret: None,
            rate_limit_rpm: None,
            port: 8000,
        }
    }

    #[must_use]
    pub fn scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    #[must_use]
    pub fn api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty());
        self
    }

    #[must_use]
    pub fn webhook_secret(mut self, secret: Option<String>) -> Self {
        self.webhook_secret = secret.filter(|s| !s.is_empty());
        self
    }

    /// Limit webhook requests per minute; 0 disables the limit
    #[must_use]
    pub const fn rate_limit(mut self, requests_per_minute: u32) -> Self {
        self.rate_limit_rpm = if requests_per_minute == 0 {
            None
        } else {
            Some(requests_per_minute)
        };
        self
    }

    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn build(self) -> ApiServer {
        let state = Arc::new(ApiState {
            db: self.db,
            assistant: self.assistant,
            scheduler: self.scheduler,
            api_key: self.api_key,
            webhook_secret: self.webhook_secret,
            dedup: Arc::new(Mutex::new(UpdateDedup::default())),
            rate_limiter: self.rate_limit_rpm.map(rate_limit::create_limiter),
        });

        ApiServer {
            state,
            port: self.port,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    #[must_use]
    pub fn state(&self) -> &Arc<ApiState> {
        &self.state
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .merge(webhooks::router(self.state.clone()))
            .nest("/admin", admin::router(self.state.clone()))
            .merge(health::router(self.state.clone()))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        if self.state.api_key.is_none() {
            tracing::warn!("COMMAND_ADMIN_API_KEY not set, admin routes are open");
        }
        if self.state.webhook_secret.is_none() {
            tracing::warn!("TELEGRAM_WEBHOOK_SECRET not set, webhook accepts any caller");
        }

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
