use std::fmt;
use std::time::Instant;
use tracing::{error, info, warn, Level};

/// Where a crossing is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Entry,
    Call,
    External,
    Done,
    Conflict,
    Fail,
}

impl Stage {
    fn label(self) -> &'static str {
        match self {
            Stage::Entry => "ENTRY",
            Stage::Call => "CALL",
            Stage::External => "EXT→",
            Stage::Done => "←DONE",
            Stage::Conflict => "CONFLICT",
            Stage::Fail => "←FAIL",
        }
    }

    fn level(self) -> Level {
        match self {
            Stage::Fail => Level::ERROR,
            Stage::Conflict => Level::WARN,
            _ => Level::INFO,
        }
    }
}

/// BoundaryLogger - one line per crossing between layers
///
/// Every line reads `[trace_id] [caller→callee] operation [STAGE] detail`, with
/// the same parts attached as structured fields for the JSON formatter.
#[derive(Clone, Default)]
pub struct BoundaryLogger;

impl BoundaryLogger {
    pub fn new() -> Self {
        Self
    }

    fn emit(&self, trace_id: &str, from: &str, to: &str, operation: &str, stage: Stage, detail: fmt::Arguments<'_>) {
        let flow = format!("{}→{}", from, to);
        let stage_label = stage.label();
        let level = stage.level();
        if level == Level::ERROR {
            error!(
                trace_id = %trace_id, flow = %flow, operation = %operation, stage = stage_label,
                "[{}] [{}] {} [{}] {}", trace_id, flow, operation, stage_label, detail
            );
        } else if level == Level::WARN {
            warn!(
                trace_id = %trace_id, flow = %flow, operation = %operation, stage = stage_label,
                "[{}] [{}] {} [{}] {}", trace_id, flow, operation, stage_label, detail
            );
        } else {
            info!(
                trace_id = %trace_id, flow = %flow, operation = %operation, stage = stage_label,
                "[{}] [{}] {} [{}] {}", trace_id, flow, operation, stage_label, detail
            );
        }
    }

    /// e.g. [API→Handler] POST /command [ENTRY] subscribe
    pub fn api_entry(&self, trace_id: &str, method: &str, path: &str, verb: &str) {
        self.emit(trace_id, "API", "Handler", &format!("{} {}", method, path), Stage::Entry, format_args!("{}", verb));
    }

    pub fn api_exit(&self, trace_id: &str, method: &str, path: &str, duration_ms: f64, status: u16) {
        self.emit(
            trace_id,
            "API",
            "Handler",
            &format!("{} {}", method, path),
            Stage::Done,
            format_args!("{:.2}ms status={}", duration_ms, status),
        );
    }

    pub fn service_entry<T: fmt::Debug>(&self, trace_id: &str, from: &str, service: &str, method: &str, params: &T) {
        self.emit(trace_id, from, service, method, Stage::Entry, format_args!("params={:?}", params));
    }

    pub fn service_exit(&self, trace_id: &str, from: &str, service: &str, method: &str, duration_ms: f64) {
        self.emit(trace_id, from, service, method, Stage::Done, format_args!("{:.2}ms", duration_ms));
    }

    pub fn service_error<E: fmt::Display>(&self, trace_id: &str, from: &str, service: &str, method: &str, error: &E) {
        self.emit(trace_id, from, service, method, Stage::Fail, format_args!("error={}", error));
    }

    /// e.g. [SubscriptionService→KvStore] compare_and_set [CALL] key=subscriptions
    pub fn repo_call(&self, trace_id: &str, from: &str, repo: &str, method: &str, key: &str) {
        self.emit(trace_id, from, repo, method, Stage::Call, format_args!("key={}", key));
    }

    pub fn repo_done(&self, trace_id: &str, from: &str, repo: &str, method: &str, duration_ms: f64) {
        self.emit(trace_id, from, repo, method, Stage::Done, format_args!("{:.2}ms", duration_ms));
    }

    pub fn repo_error<E: fmt::Display>(&self, trace_id: &str, from: &str, repo: &str, method: &str, key: &str, error: &E) {
        self.emit(trace_id, from, repo, method, Stage::Fail, format_args!("key={} error={}", key, error));
    }

    /// Lost compare-and-set race, about to re-read and retry
    pub fn repo_conflict(&self, trace_id: &str, from: &str, key: &str, attempt: u32, max_attempts: u32) {
        self.emit(
            trace_id,
            from,
            "KvStore",
            "compare_and_set",
            Stage::Conflict,
            format_args!("key={} attempt {}/{}", key, attempt, max_attempts),
        );
    }

    /// e.g. [Dispatcher→Mattermost] create_post [EXT→]
    pub fn external_call(&self, trace_id: &str, from: &str, system: &str, operation: &str) {
        self.emit(trace_id, from, system, operation, Stage::External, format_args!(""));
    }

    pub fn external_done(&self, trace_id: &str, from: &str, system: &str, operation: &str, duration_ms: f64) {
        self.emit(trace_id, from, system, operation, Stage::Done, format_args!("{:.2}ms", duration_ms));
    }

    pub fn external_error<E: fmt::Display>(&self, trace_id: &str, from: &str, system: &str, operation: &str, error: &E) {
        self.emit(trace_id, from, system, operation, Stage::Fail, format_args!("error={}", error));
    }
}

pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed milliseconds
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}
