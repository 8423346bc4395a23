use crate::CorrelationId;

/// Stable wire-facing error taxonomy for client/transport failures.
///
/// Transient network conditions are distinguished from structural ones so the
/// circuit breaker and the caller can treat them differently.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("could not reach provider endpoint: {message}")]
    NetworkError { message: String },

    #[error("provider returned HTTP {status}")]
    ApiError { status: u16, body: String },

    #[error("request timed out")]
    Timeout,

    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("provider `{provider}` is not configured (missing {env_var})")]
    ProviderNotConfigured { provider: String, env_var: String },
}

impl ClientError {
    /// Stable wire name, matching the exhaustive list in the external interfaces contract.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NetworkError { .. } => "network_error",
            Self::ApiError { .. } => "api_error",
            Self::Timeout => "timeout",
            Self::CircuitOpen => "circuit_open",
            Self::ProviderNotConfigured { .. } => "provider_not_configured",
        }
    }

    /// Whether this outcome should count as a failure against the circuit breaker.
    ///
    /// `CircuitOpen` never counts (it is the breaker acting, not a new failure).
    /// `ApiError` only counts when the status is a server error; 4xx is structural,
    /// not a sign the provider is degraded.
    pub fn counts_as_breaker_failure(&self) -> bool {
        match self {
            Self::NetworkError { .. } | Self::Timeout => true,
            Self::ApiError { status, .. } => *status >= 500,
            Self::CircuitOpen | Self::ProviderNotConfigured { .. } => false,
        }
    }
}

/// Error raised while formatting a prompt or parsing a response in a [`ChatAdapter`](crate::ChatAdapter).
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("input `{field}` missing from example")]
    MissingInput { field: String },

    #[error("could not parse response into signature outputs: {reason}")]
    ParseFailed { reason: String, raw_response: String },
}

/// Error raised by [`Executor::forward`](crate::Executor::forward).
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Top-level error returned by [`Optimizer::compile`](crate::Optimizer::compile).
///
/// Every variant carries the run's [`CorrelationId`] so a caller can correlate a failed
/// `compile` with the `tracing` spans it emitted.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("student program is invalid: {reason}")]
    InvalidStudentProgram {
        reason: String,
        correlation_id: CorrelationId,
    },

    #[error("teacher program is invalid: {reason}")]
    InvalidTeacherProgram {
        reason: String,
        correlation_id: CorrelationId,
    },

    #[error("training set is empty or invalid")]
    InvalidOrEmptyTrainset { correlation_id: CorrelationId },

    #[error("metric function is invalid: {reason}")]
    InvalidMetricFunction {
        reason: String,
        correlation_id: CorrelationId,
    },

    #[error("no successful trajectories were produced in the optimization budget")]
    NoSuccessfulBootstrapCandidates { correlation_id: CorrelationId },
}

impl CompileError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidStudentProgram { .. } => "invalid_student_program",
            Self::InvalidTeacherProgram { .. } => "invalid_teacher_program",
            Self::InvalidOrEmptyTrainset { .. } => "invalid_or_empty_trainset",
            Self::InvalidMetricFunction { .. } => "invalid_metric_function",
            Self::NoSuccessfulBootstrapCandidates { .. } => "no_successful_bootstrap_candidates",
        }
    }

    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            Self::InvalidStudentProgram { correlation_id, .. }
            | Self::InvalidTeacherProgram { correlation_id, .. }
            | Self::InvalidOrEmptyTrainset { correlation_id }
            | Self::InvalidMetricFunction { correlation_id, .. }
            | Self::NoSuccessfulBootstrapCandidates { correlation_id } => *correlation_id,
        }
    }
}
