//! Transform pipeline
//!
//! Applies a declared, ordered list of pure transform steps to a composite
//! object built from the dataset collections. Utility names are resolved
//! against the auxiliary context when the pipeline is defined, so a missing
//! utility aborts startup instead of surfacing per-request.

use serde_json::Value;
use std::sync::Arc;

use super::context::{AuxContext, Utility};
use super::error::{StepError, TransformError};
use super::steps::TransformStep;

/// Utilities resolved for one pipeline run, keyed by the name steps use.
///
/// Binding order follows the declared injection order.
#[derive(Default)]
pub struct BoundUtilities {
    entries: Vec<(String, Arc<dyn Utility>)>,
}

impl BoundUtilities {
    fn bind(context: &AuxContext, names: &[String]) -> Result<Self, TransformError> {
        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let utility = context
                .resolve(name)
                .ok_or_else(|| TransformError::UnresolvedUtility(name.clone()))?;
            entries.push((name.clone(), utility));
        }
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Result<&dyn Utility, StepError> {
        self.entries
            .iter()
            .find(|(bound_name, _)| bound_name == name)
            .map(|(_, utility)| utility.as_ref())
            .ok_or_else(|| StepError::UtilityNotBound(name.to_string()))
    }
}

/// A pipeline run in progress over one composite object.
///
/// The handle owns its current value; steps only ever see it by shared
/// reference and produce a replacement, so the collections the composite
/// was built from are never mutated.
pub struct PipelineHandle {
    current: Value,
    utilities: BoundUtilities,
}

impl PipelineHandle {
    /// Begin a pipeline over the given composite object.
    pub fn select(composite: Value) -> Result<Self, TransformError> {
        if !composite.is_object() {
            return Err(TransformError::NotAMapping);
        }
        Ok(Self {
            current: composite,
            utilities: BoundUtilities::default(),
        })
    }

    /// Resolve the named utilities and make them available to steps.
    pub fn inject(mut self, context: &AuxContext, names: &[String]) -> Result<Self, TransformError> {
        self.utilities = BoundUtilities::bind(context, names)?;
        Ok(self)
    }

    /// Apply each step in declaration order, threading the output of step
    /// *i* as the input of step *i+1*. The first failing step aborts the
    /// run; no partial result is returned.
    pub fn transform_with(
        mut self,
        steps: &[Arc<dyn TransformStep>],
    ) -> Result<Self, TransformError> {
        for step in steps {
            self.current =
                step.apply(&self.current, &self.utilities)
                    .map_err(|source| TransformError::StepFailed {
                        step: step.name().to_string(),
                        source,
                    })?;
        }
        Ok(self)
    }

    /// Terminate the pipeline and return the final value.
    pub fn root(self) -> Value {
        self.current
    }
}

impl std::fmt::Debug for PipelineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

/// A pipeline definition validated at startup.
///
/// Holds the step list, the injected-utility names and the auxiliary
/// context. Construction resolves every utility name once, so requests can
/// only fail inside a step.
pub struct Pipeline {
    context: AuxContext,
    inject: Vec<String>,
    steps: Vec<Arc<dyn TransformStep>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("inject", &self.inject)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        context: AuxContext,
        inject: Vec<String>,
        steps: Vec<Arc<dyn TransformStep>>,
    ) -> Result<Self, TransformError> {
        // Surface configuration mistakes now, not on the first request
        BoundUtilities::bind(&context, &inject)?;
        Ok(Self {
            context,
            inject,
            steps,
        })
    }

    pub fn run(&self, composite: Value) -> Result<Value, TransformError> {
        Ok(PipelineHandle::select(composite)?
            .inject(&self.context, &self.inject)?
            .transform_with(&self.steps)?
            .root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::context::{FixedClock, CLOCK};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    struct Rename;

    impl TransformStep for Rename {
        fn name(&self) -> &'static str {
            "rename"
        }

        fn apply(&self, input: &Value, _utilities: &BoundUtilities) -> Result<Value, StepError> {
            let mut out = input.clone();
            let object = out.as_object_mut().expect("object input");
            if let Some(value) = object.remove("a") {
                object.insert("b".to_string(), value);
            }
            Ok(out)
        }
    }

    struct CountKeys;

    impl TransformStep for CountKeys {
        fn name(&self) -> &'static str {
            "count_keys"
        }

        fn apply(&self, input: &Value, _utilities: &BoundUtilities) -> Result<Value, StepError> {
            let mut out = input.clone();
            let count = out.as_object().map_or(0, serde_json::Map::len);
            out.as_object_mut()
                .expect("object input")
                .insert("key_count".to_string(), json!(count));
            Ok(out)
        }
    }

    struct Failing;

    impl TransformStep for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn apply(&self, _input: &Value, _utilities: &BoundUtilities) -> Result<Value, StepError> {
            Err(StepError::UnexpectedShape("boom".to_string()))
        }
    }

    fn clock_context() -> AuxContext {
        let mut ctx = AuxContext::new();
        ctx.register(
            CLOCK,
            Arc::new(FixedClock::new(
                Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            )),
        );
        ctx
    }

    #[test]
    fn test_select_rejects_non_mapping() {
        assert!(matches!(
            PipelineHandle::select(json!([1, 2])),
            Err(TransformError::NotAMapping)
        ));
        assert!(matches!(
            PipelineHandle::select(Value::Null),
            Err(TransformError::NotAMapping)
        ));
    }

    #[test]
    fn test_zero_steps_returns_composite_unchanged() {
        let composite = json!({"users": [{"id": 1}], "posts": []});
        let result = PipelineHandle::select(composite.clone())
            .unwrap()
            .transform_with(&[])
            .unwrap()
            .root();
        assert_eq!(result, composite);
    }

    #[test]
    fn test_steps_thread_in_declaration_order() {
        // rename moves "a" to "b", count_keys then sees the renamed object
        let steps: Vec<Arc<dyn TransformStep>> = vec![Arc::new(Rename), Arc::new(CountKeys)];
        let result = PipelineHandle::select(json!({"a": 1}))
            .unwrap()
            .transform_with(&steps)
            .unwrap()
            .root();
        assert_eq!(result, json!({"b": 1, "key_count": 1}));
    }

    #[test]
    fn test_step_failure_carries_step_name() {
        let steps: Vec<Arc<dyn TransformStep>> = vec![Arc::new(Rename), Arc::new(Failing)];
        let err = PipelineHandle::select(json!({"a": 1}))
            .unwrap()
            .transform_with(&steps)
            .unwrap_err();
        match err {
            TransformError::StepFailed { step, .. } => assert_eq!(step, "failing"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_inject_unknown_utility_fails() {
        let err = PipelineHandle::select(json!({}))
            .unwrap()
            .inject(&clock_context(), &["moment".to_string()])
            .unwrap_err();
        assert!(matches!(err, TransformError::UnresolvedUtility(name) if name == "moment"));
    }

    #[test]
    fn test_pipeline_validates_utilities_at_definition_time() {
        let err = Pipeline::new(clock_context(), vec!["moment".to_string()], vec![]).unwrap_err();
        assert!(matches!(err, TransformError::UnresolvedUtility(_)));
    }

    #[test]
    fn test_pipeline_run_is_deterministic() {
        let pipeline = Pipeline::new(
            clock_context(),
            vec![CLOCK.to_string()],
            vec![Arc::new(CountKeys)],
        )
        .unwrap();

        let composite = json!({"users": [], "posts": []});
        let first = pipeline.run(composite.clone()).unwrap();
        let second = pipeline.run(composite).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
