//! Circula Library Circulation Engine
//!
//! A Rust server for library circulation: book inventory, the loan state
//! machine (request, approve, reject, return, renew), fine computation and
//! overdue reminders, exposed over a REST JSON API.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
