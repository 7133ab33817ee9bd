use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("config: {0}")]
    Config(String),

    #[error("create durable log ({}): {source}", path.display())]
    LogCreate { path: PathBuf, source: std::io::Error },

    #[error("durable logger queue closed")]
    LoggerGone,

    #[error("task: {0}")]
    Task(#[from] tokio::task::JoinError),
}
