//! Prediction dashboard
//!
//! Serves upcoming predictions and past-game evaluation as HTML pages and
//! JSON. Database and model work runs on the blocking pool.

pub mod render;

use crate::predict::{HistoryReport, Predictor, UpcomingPrediction, MAX_WINDOW_DAYS};
use crate::{Config, DashboardConfig, HoopsError, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Local;
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone)]
pub struct AppState {
    predictor: Arc<Mutex<Predictor>>,
    dashboard: DashboardConfig,
}

impl AppState {
    pub fn new(predictor: Predictor, dashboard: DashboardConfig) -> Self {
        AppState {
            predictor: Arc::new(Mutex::new(predictor)),
            dashboard,
        }
    }

    /// Run `f` against the predictor on the blocking pool. The predictor is
    /// only read, so a guard left by a panicked request is taken over.
    async fn with_predictor<T, F>(&self, f: F) -> std::result::Result<T, AppError>
    where
        F: FnOnce(&Predictor) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let predictor = Arc::clone(&self.predictor);
        let joined = tokio::task::spawn_blocking(move || {
            let guard = predictor.lock().unwrap_or_else(PoisonError::into_inner);
            f(&*guard)
        })
        .await;
        match joined {
            Ok(result) => result.map_err(AppError),
            Err(e) => Err(AppError(HoopsError::Model(format!("worker failed: {}", e)))),
        }
    }
}

/// Error response for a failed request
#[derive(Debug)]
pub struct AppError(HoopsError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        log::error!("Request failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub days: Option<i64>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/history", get(history))
        .route("/api/upcoming", get(api_upcoming))
        .route("/api/history", get(api_history))
        .route("/health", get(health))
        .with_state(state)
}

async fn upcoming(state: &AppState) -> std::result::Result<Vec<UpcomingPrediction>, AppError> {
    let days = state.dashboard.upcoming_days;
    let today = Local::now().date_naive();
    state
        .with_predictor(move |p| p.predict_upcoming(today, days))
        .await
}

async fn past_games(
    state: &AppState,
    params: HistoryParams,
) -> std::result::Result<HistoryReport, AppError> {
    let days = params
        .days
        .unwrap_or(state.dashboard.history_days)
        .clamp(0, MAX_WINDOW_DAYS);
    let today = Local::now().date_naive();
    state
        .with_predictor(move |p| p.evaluate_history(today, days))
        .await
}

async fn index(State(state): State<AppState>) -> std::result::Result<Html<String>, AppError> {
    let predictions = upcoming(&state).await?;
    Ok(Html(render::upcoming_page(&predictions)))
}

async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> std::result::Result<Html<String>, AppError> {
    let report = past_games(&state, params).await?;
    Ok(Html(render::history_page(&report)))
}

async fn api_upcoming(
    State(state): State<AppState>,
) -> std::result::Result<Json<Vec<UpcomingPrediction>>, AppError> {
    Ok(Json(upcoming(&state).await?))
}

async fn api_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> std::result::Result<Json<HistoryReport>, AppError> {
    Ok(Json(past_games(&state, params).await?))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let trained_at = state
        .with_predictor(|p| Ok(p.bundle().trained_at.to_rfc3339()))
        .await
        .ok();
    let status = if trained_at.is_some() { "ok" } else { "degraded" };
    let code = if trained_at.is_some() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(json!({
            "service": "hoops",
            "version": env!("CARGO_PKG_VERSION"),
            "status": status,
            "model_trained_at": trained_at,
        })),
    )
}

/// Load the model and database, then serve the dashboard until interrupted
pub fn serve(config: &Config, bind: &str) -> Result<()> {
    let predictor = Predictor::from_config(config)?;
    let state = AppState::new(predictor, config.dashboard.clone());
    let app = router(state);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(bind).await?;
        log::info!("Dashboard listening on http://{}", listener.local_addr()?);
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                log::info!("Shutting down dashboard");
            })
            .await?;
        Ok::<(), HoopsError>(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::form::tests::alternating_season;
    use crate::training::trainer::tests::{quick_config, synthetic_dataset};
    use crate::training::Trainer;
    use crate::FeatureConfig;

    fn state() -> AppState {
        let bundle = Trainer::new(&quick_config())
            .train(&synthetic_dataset(60))
            .unwrap();
        let predictor = Predictor::new(bundle, alternating_season(), FeatureConfig::default());
        AppState::new(predictor, DashboardConfig::default())
    }

    #[tokio::test]
    async fn test_health() {
        let (code, Json(body)) = health(State(state())).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["model_trained_at"].is_string());
    }

    #[tokio::test]
    async fn test_index_without_schedule() {
        let Html(page) = index(State(state())).await.unwrap();
        assert!(page.contains("No upcoming games"));
    }

    #[tokio::test]
    async fn test_history_days_override() {
        let params = HistoryParams { days: Some(3) };
        let Json(report) = api_history(State(state()), Query(params)).await.unwrap();
        assert_eq!((report.end - report.start).num_days(), 3);

        let Html(page) = history(State(state()), Query(HistoryParams::default()))
            .await
            .unwrap();
        assert!(page.contains("Prediction History"));
    }

    #[tokio::test]
    async fn test_history_days_clamped() {
        let state = state();
        let params = HistoryParams {
            days: Some(i64::MAX / 2),
        };
        let Json(report) = api_history(State(state.clone()), Query(params))
            .await
            .unwrap();
        assert_eq!((report.end - report.start).num_days(), MAX_WINDOW_DAYS);

        let (code, _) = health(State(state.clone())).await;
        assert_eq!(code, StatusCode::OK);
        let params = HistoryParams { days: Some(-5) };
        let Json(report) = api_history(State(state), Query(params)).await.unwrap();
        assert_eq!(report.start, report.end);
    }

    #[tokio::test]
    async fn test_panicked_request_does_not_lock_out_later_ones() {
        let state = state();
        let result = state
            .with_predictor(|_| -> Result<()> { panic!("request blew up") })
            .await;
        assert!(result.is_err());

        let (code, Json(body)) = health(State(state.clone())).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        let params = HistoryParams { days: Some(3) };
        assert!(api_history(State(state), Query(params)).await.is_ok());
    }

    #[tokio::test]
    async fn test_api_upcoming_empty() {
        let Json(predictions) = api_upcoming(State(state())).await.unwrap();
        assert!(predictions.is_empty());
    }
}
