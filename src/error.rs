use http::StatusCode;
use thiserror::Error;
use tracing::error;

/// Startup-time configuration problems.  Any of these is fatal: the server never binds.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("{name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
    #[error("turn deadline of {deadline_millis}ms must be shorter than the {gather_timeout_secs}s gather timeout")]
    DeadlineTooLong {
        deadline_millis: u64,
        gather_timeout_secs: u16,
    },
    #[error("failed to set up google credentials: {0}")]
    Credentials(String),
}

/// Failure modes of the completion service; all of them mean "no reply this turn".
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed to reach OpenAI: {0}")]
    Network(String),
    #[error("completion request was rate limited")]
    RateLimited,
    #[error("completion service returned {status}")]
    Upstream { status: StatusCode },
    #[error("completion response was malformed: {0}")]
    Malformed(String),
}

impl CompletionError {
    pub fn is_transient(&self) -> bool {
        match self {
            CompletionError::Network(_) | CompletionError::RateLimited => true,
            CompletionError::Upstream { status } => status.is_server_error(),
            CompletionError::Malformed(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    /// The engine gave up for reasons unrelated to the text (auth, network, quota, 5xx).
    #[error("speech synthesis canceled by engine: {reason}")]
    EngineCanceled { reason: String },
    /// The engine refused the text itself.
    #[error("speech synthesis rejected input: {reason}")]
    InputRejected { reason: String },
    #[error("speech synthesis returned no audio")]
    EmptyAudio,
}

impl SynthesisError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            SynthesisError::EngineCanceled { .. } | SynthesisError::EmptyAudio => "engine_canceled",
            SynthesisError::InputRejected { .. } => "input_rejected",
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to acquire storage credentials: {0}")]
    Auth(String),
    #[error("upload request failed: {0}")]
    Network(String),
    #[error("storage rejected upload with {status}")]
    Rejected { status: StatusCode },
    #[error("invalid storage url: {0}")]
    Url(String),
}

impl PublishError {
    pub fn is_transient(&self) -> bool {
        match self {
            PublishError::Network(_) => true,
            PublishError::Rejected { status } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            PublishError::Auth(_) | PublishError::Url(_) => false,
        }
    }
}

/// Anything that aborts a dialogue turn.  The controller turns every variant into a re-prompt.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("turn exceeded its {0}ms deadline")]
    DeadlineExceeded(u128),
}

pub fn handle_error(e: impl std::error::Error) {
    error!("ERROR: {e}")
}
