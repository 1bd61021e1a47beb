use thiserror::Error;

/// Stage of a transfer session that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    Connect,
    Login,
    Store,
    Quit,
}

impl std::fmt::Display for TransferStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            TransferStage::Connect => "connect",
            TransferStage::Login => "login",
            TransferStage::Store => "store",
            TransferStage::Quit => "quit",
        };
        f.write_str(stage)
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network interface error: {0}")]
    Interface(String),

    #[error("Service discovery error: {0}")]
    Discovery(String),

    #[error("there is no droplocal service available")]
    NoPeers,

    #[error("Address resolution error: {0}")]
    Resolve(String),

    #[error("Transfer {stage} failed: {message}")]
    Transfer {
        stage: TransferStage,
        message: String,
    },

    #[error("Server error: {0}")]
    Server(String),

    #[error("Input error: {0}")]
    Input(String),
}

impl AppError {
    pub fn transfer(stage: TransferStage, message: impl Into<String>) -> Self {
        AppError::Transfer {
            stage,
            message: message.into(),
        }
    }
}

impl From<mdns_sd::Error> for AppError {
    fn from(e: mdns_sd::Error) -> Self {
        AppError::Discovery(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
