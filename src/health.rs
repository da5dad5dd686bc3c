use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;
use crate::utils::{CircuitBreaker, CircuitState};

// ============================================================================
// Health Check - aggregate status of the service and its dependencies
// ============================================================================
//
// - database: reachable (Postgres) or in-memory
// - one entry per circuit breaker guarding an external system
// - notification dead-letter queue: degraded while messages wait there
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, HealthStatus::Unhealthy(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    #[serde(flatten)]
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ComponentHealth {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    pub overall_status: HealthStatus,
    pub components: Vec<ComponentHealth>,
    pub check_time: DateTime<Utc>,
}

/// Probe every component the running service depends on
pub async fn check(state: &AppState) -> SystemHealth {
    let mut components = Vec::new();

    components.push(match &state.database {
        Some(db) if db.ping().await => ComponentHealth::new("database", HealthStatus::Healthy),
        Some(_) => ComponentHealth::new(
            "database",
            HealthStatus::Unhealthy("postgres did not answer".to_string()),
        ),
        None => ComponentHealth::new("database", HealthStatus::Healthy).with_details("in-memory"),
    });

    for breaker in [
        state.dispatcher.breaker(),
        state.currency.breaker(),
        state.checkout.breaker(),
    ] {
        components.push(breaker_health(breaker, state).await);
    }

    let dead_letters = state.dispatcher.dead_letters().len();
    components.push(if dead_letters == 0 {
        ComponentHealth::new("notification_dlq", HealthStatus::Healthy)
    } else {
        ComponentHealth::new(
            "notification_dlq",
            HealthStatus::Degraded(format!("{} undelivered notifications", dead_letters)),
        )
    });

    SystemHealth {
        overall_status: overall(&components),
        components,
        check_time: Utc::now(),
    }
}

async fn breaker_health(breaker: &CircuitBreaker, state: &AppState) -> ComponentHealth {
    let circuit = breaker.get_state().await;
    state.metrics.update_circuit_breaker_state(breaker.name(), circuit);

    let status = match circuit {
        CircuitState::Closed => HealthStatus::Healthy,
        CircuitState::HalfOpen => HealthStatus::Degraded("circuit half-open".to_string()),
        CircuitState::Open => HealthStatus::Degraded("circuit open".to_string()),
    };
    ComponentHealth::new(breaker.name(), status)
}

/// Unhealthy wins over degraded; any degraded component degrades the whole
fn overall(components: &[ComponentHealth]) -> HealthStatus {
    let unhealthy: Vec<&str> = components
        .iter()
        .filter(|c| c.status.is_unhealthy())
        .map(|c| c.name.as_str())
        .collect();
    if !unhealthy.is_empty() {
        return HealthStatus::Unhealthy(format!("unhealthy: {}", unhealthy.join(", ")));
    }

    let degraded: Vec<&str> = components
        .iter()
        .filter(|c| !c.status.is_healthy())
        .map(|c| c.name.as_str())
        .collect();
    if !degraded.is_empty() {
        return HealthStatus::Degraded(format!("degraded: {}", degraded.join(", ")));
    }

    HealthStatus::Healthy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_prefers_worst_status() {
        let components = vec![
            ComponentHealth::new("a", HealthStatus::Healthy),
            ComponentHealth::new("b", HealthStatus::Degraded("slow".into())),
        ];
        assert!(matches!(overall(&components), HealthStatus::Degraded(_)));

        let mut with_down = components.clone();
        with_down.push(ComponentHealth::new("c", HealthStatus::Unhealthy("down".into())));
        assert_eq!(overall(&with_down), HealthStatus::Unhealthy("unhealthy: c".to_string()));

        assert_eq!(overall(&components[..1]), HealthStatus::Healthy);
    }

    #[test]
    fn test_component_serializes_flat() {
        let json = serde_json::to_value(
            ComponentHealth::new("notification_dlq", HealthStatus::Degraded("2 waiting".into())),
        )
        .unwrap();
        assert_eq!(json["name"], "notification_dlq");
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["reason"], "2 waiting");
    }
}
