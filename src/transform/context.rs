//! Auxiliary context
//!
//! Named external capabilities that transform steps can request by name.
//! Utilities are registered once at startup; steps never reach into global
//! state, they only see what the pipeline explicitly bound for them.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::error::StepError;

/// Name under which the date/time utility is registered.
pub const CLOCK: &str = "clock";

/// An opaque capability injectable into the pipeline.
///
/// Utilities expose a small method surface invoked dynamically, so steps
/// stay decoupled from the concrete implementation behind a name.
pub trait Utility: Send + Sync {
    fn call(&self, method: &str, args: &[Value]) -> Result<Value, StepError>;
}

/// Registry mapping utility name to capability.
#[derive(Default)]
pub struct AuxContext {
    utilities: HashMap<String, Arc<dyn Utility>>,
}

impl AuxContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, utility: Arc<dyn Utility>) {
        self.utilities.insert(name.into(), utility);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Utility>> {
        self.utilities.get(name).map(Arc::clone)
    }
}

/// Wall-clock date/time utility backed by chrono.
///
/// Methods:
/// - `now`: current UTC time as an RFC 3339 string
/// - `format`: current UTC time rendered with a strftime pattern (first arg)
pub struct Clock;

impl Utility for Clock {
    fn call(&self, method: &str, args: &[Value]) -> Result<Value, StepError> {
        render_instant(Utc::now(), method, args)
    }
}

/// Deterministic clock pinned to one instant. Lets time-stamping steps be
/// exercised in tests with byte-identical output.
#[cfg(test)]
pub struct FixedClock {
    instant: DateTime<Utc>,
}

#[cfg(test)]
impl FixedClock {
    pub const fn new(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }
}

#[cfg(test)]
impl Utility for FixedClock {
    fn call(&self, method: &str, args: &[Value]) -> Result<Value, StepError> {
        render_instant(self.instant, method, args)
    }
}

fn render_instant(
    instant: DateTime<Utc>,
    method: &str,
    args: &[Value],
) -> Result<Value, StepError> {
    match method {
        "now" => Ok(Value::String(
            instant.to_rfc3339_opts(SecondsFormat::Secs, true),
        )),
        "format" => {
            let pattern = args
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| StepError::BadArgument("format expects a pattern string".into()))?;
            Ok(Value::String(instant.format(pattern).to_string()))
        }
        other => Err(StepError::UnknownUtilityMethod {
            utility: CLOCK.to_string(),
            method: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap())
    }

    #[test]
    fn test_clock_now_is_rfc3339() {
        let value = Clock.call("now", &[]).unwrap();
        let text = value.as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(text).is_ok());
    }

    #[test]
    fn test_fixed_clock_is_deterministic() {
        let clock = fixed();
        assert_eq!(
            clock.call("now", &[]).unwrap(),
            json!("2024-05-01T12:30:00Z")
        );
        assert_eq!(
            clock.call("format", &[json!("%Y-%m-%d")]).unwrap(),
            json!("2024-05-01")
        );
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let err = fixed().call("tomorrow", &[]).unwrap_err();
        assert!(matches!(err, StepError::UnknownUtilityMethod { .. }));
    }

    #[test]
    fn test_format_requires_pattern() {
        let err = fixed().call("format", &[]).unwrap_err();
        assert!(matches!(err, StepError::BadArgument(_)));
    }

    #[test]
    fn test_context_resolves_registered_names() {
        let mut ctx = AuxContext::new();
        ctx.register(CLOCK, Arc::new(fixed()));
        assert!(ctx.resolve(CLOCK).is_some());
        assert!(ctx.resolve("moment").is_none());
    }
}
