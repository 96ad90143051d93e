//! Counters plus limiter and token store occupancy.
//! Used by: server.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::ratelimit::LimiterStats;
use crate::state::AppState;
use crate::telemetry::MetricsSnapshot;

#[derive(Serialize)]
pub struct MetricsView {
    pub counters: MetricsSnapshot,
    pub origin_limiter: LimiterStats,
    pub identity_limiter: LimiterStats,
    pub reset_tokens: usize,
}

pub async fn metrics(State(state): State<AppState>) -> Json<MetricsView> {
    Json(MetricsView {
        counters: state.metrics.snapshot(),
        origin_limiter: state.guard.origin().stats(),
        identity_limiter: state.guard.identity().stats(),
        reset_tokens: state.tokens.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::harness;

    #[tokio::test]
    async fn reports_occupancy() {
        let h = harness();
        assert!(h.state.guard.check("10.0.0.1", "alice").is_ok());
        assert!(h.state.tokens.issue("alice", "alice@example.com").is_ok());

        let Json(view) = metrics(State(h.state.clone())).await;
        assert_eq!(view.origin_limiter.tracked, 1);
        assert_eq!(view.identity_limiter.tracked, 1);
        assert!(!view.identity_limiter.is_full);
        assert_eq!(view.reset_tokens, 1);
    }

    #[tokio::test]
    async fn json_shape() -> Result<(), serde_json::Error> {
        let h = harness();
        let Json(view) = metrics(State(h.state.clone())).await;
        let value = serde_json::to_value(&view)?;
        assert_eq!(value["counters"]["resets_completed"], 0);
        assert_eq!(value["origin_limiter"]["capacity"], 50_000);
        assert_eq!(value["identity_limiter"]["is_full"], false);
        Ok(())
    }
}
