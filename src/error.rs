use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("System error: {0}")]
    System(String),
}

/// 配置文件错误 - 本地恢复，由调用方决定重试或中止
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: String },

    #[error("Invalid config file: {path}, error: {error}")]
    Parse { path: String, error: String },

    #[error("Failed to write config file: {path}, error: {error}")]
    Write { path: String, error: String },
}

/// 进程生命周期错误 - 带可读消息的类型化失败，不自动重试
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Worker is already running")]
    AlreadyRunning,

    #[error("Worker is not running")]
    NotRunning,

    #[error("Failed to launch worker: {error}")]
    Launch { error: String },

    #[error("Error stopping worker: {error}")]
    Stop { error: String },
}
