use thiserror::Error;

/// Failures reported by the underlying wire client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("{message}")]
    Command { message: String },

    #[error("Connection closed")]
    Closed,
}

impl WireError {
    pub fn command(message: impl Into<String>) -> Self {
        WireError::Command {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        WireError::Connection {
            message: message.into(),
        }
    }

    /// True when the server rejected `ROLE` as an unknown command.
    ///
    /// Older servers reply `ERR unknown command 'ROLE'`, newer ones quote with
    /// backticks and append the arguments.
    pub fn is_unknown_command(&self) -> bool {
        match self {
            WireError::Command { message } => {
                let lower = message.to_ascii_lowercase();
                lower.starts_with("err unknown command")
                    && (lower.contains("'role'") || lower.contains("`role`"))
            }
            _ => false,
        }
    }
}

/// Errors raised by the topology engine.
#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("No tokio runtime available to drive connections")]
    NoRuntime,

    #[error("Role query against {id} failed: {source}")]
    RoleQuery {
        id: String,
        #[source]
        source: WireError,
    },
}

pub type Result<T> = std::result::Result<T, TopologyError>;
