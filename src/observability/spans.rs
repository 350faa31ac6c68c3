//! Structured span definitions for tracing.

use std::time::Instant;

use tracing::{Level, Span, field, span};
use uuid::Uuid;

/// Tracing configuration.
#[derive(Clone, Debug, Default)]
pub struct TracingConfig {
    pub service_name: Option<String>,
    pub enabled: bool,
    pub level: TracingLevel,
    /// Overrides `level` with an `EnvFilter` directive string.
    pub filter: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TracingLevel {
    #[default]
    Info,
    Debug,
    Trace,
}

impl TracingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TracingLevel::Info => "info",
            TracingLevel::Debug => "debug",
            TracingLevel::Trace => "trace",
        }
    }
}

impl TracingConfig {
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn level(mut self, level: TracingLevel) -> Self {
        self.level = level;
        self
    }

    pub fn filter(mut self, directives: impl Into<String>) -> Self {
        self.filter = Some(directives.into());
        self
    }

    pub fn directives(&self) -> String {
        self.filter
            .clone()
            .unwrap_or_else(|| format!("session_client={}", self.level.as_str()))
    }
}

/// Span covering one logical `send`, including a possible replay.
pub struct RequestSpan {
    span: Span,
    start: Instant,
}

impl RequestSpan {
    pub fn new(method: &str, path: &str) -> Self {
        let span = span!(
            Level::INFO,
            "http.request",
            request_id = %Uuid::new_v4(),
            method = method,
            path = path,
            status = field::Empty,
            attempts = field::Empty,
            latency_ms = field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
        }
    }

    pub fn record_status(&self, status: u16) {
        self.span.record("status", status);
    }

    pub fn finish(self, attempts: u8) {
        self.span.record("attempts", attempts);
        self.span
            .record("latency_ms", self.start.elapsed().as_millis() as u64);
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

/// Span covering one renewal cycle.
pub fn refresh_span(cycle: u64) -> Span {
    span!(
        Level::INFO,
        "auth.refresh",
        cycle = cycle,
        outcome = field::Empty,
        latency_ms = field::Empty,
    )
}
