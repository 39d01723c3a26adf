use crate::config::ConfigError;
use ant_dom::DomError;
use ant_vdom::ComponentId;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Failure reported by a render function
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct RenderError {
    pub message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Mount target '{0}' not found")]
    MountTargetNotFound(String),

    #[error("Component {0:?} is not mounted")]
    NotMounted(ComponentId),

    #[error("Component {0:?} is already mounted")]
    AlreadyMounted(ComponentId),

    #[error("Component {0:?} is not registered")]
    UnknownComponent(ComponentId),

    #[error("The application owning this component was dropped")]
    Detached,

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

impl RuntimeError {
    /// Collapse into the error type the patcher understands
    pub fn into_dom_error(self) -> DomError {
        match self {
            RuntimeError::Dom(err) => err,
            other => DomError::component(other.to_string()),
        }
    }
}
