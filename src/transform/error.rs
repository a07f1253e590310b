use thiserror::Error;

/// Pipeline-level failures.
///
/// `UnresolvedUtility` is a configuration error: it is raised while building
/// the pipeline at startup, never while serving a request. `StepFailed` is
/// the only variant the HTTP layer ever sees at runtime.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("pipeline input must be a non-null JSON object")]
    NotAMapping,

    #[error("unresolved utility: {0}")]
    UnresolvedUtility(String),

    #[error("transform step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: StepError,
    },
}

/// Failures raised from inside a single transform step or utility call.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("utility '{0}' is not bound for this pipeline")]
    UtilityNotBound(String),

    #[error("utility '{utility}' has no method '{method}'")]
    UnknownUtilityMethod { utility: String, method: String },

    #[error("bad utility argument: {0}")]
    BadArgument(String),

    #[error("unexpected input shape: {0}")]
    UnexpectedShape(String),
}
