#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("input '{device}': {detail}")]
    Input { device: String, detail: String },

    #[error("{0}")]
    Pipeline(#[from] pipeline::PipelineError),
}
