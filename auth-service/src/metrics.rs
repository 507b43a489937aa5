use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct AuthMetrics {
    registry: Registry,
    token_checks: IntCounterVec,
    authorization_decisions: IntCounterVec,
    session_events: IntCounterVec,
}

impl AuthMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let token_checks = IntCounterVec::new(
            Opts::new(
                "auth_token_checks_total",
                "Count of presented tokens grouped by kind and outcome",
            ),
            &["kind", "outcome"],
        )?;
        registry.register(Box::new(token_checks.clone()))?;

        let authorization_decisions = IntCounterVec::new(
            Opts::new(
                "auth_authorization_decisions_total",
                "Count of role and ownership checks grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(authorization_decisions.clone()))?;

        let session_events = IntCounterVec::new(
            Opts::new("auth_session_events_total", "Count of session lifecycle events"),
            &["event"],
        )?;
        registry.register(Box::new(session_events.clone()))?;

        Ok(Self {
            registry,
            token_checks,
            authorization_decisions,
            session_events,
        })
    }

    pub fn token_check(&self, kind: &str, outcome: &str) {
        self.token_checks.with_label_values(&[kind, outcome]).inc();
    }

    pub fn authorization_decision(&self, outcome: &str) {
        self.authorization_decisions
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn session_event(&self, event: &str) {
        self.session_events.with_label_values(&[event]).inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
