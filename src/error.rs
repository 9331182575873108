pub type SumiResult<T> = Result<T, SumiError>;

#[derive(thiserror::Error, Debug)]
pub enum SumiError {
    #[error("invalid scene: {0}")]
    Scene(String),

    #[error("invalid options: {0}")]
    Options(String),

    #[error("asset error: {0}")]
    Asset(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SumiError {
    pub fn scene(msg: impl Into<String>) -> Self {
        Self::Scene(msg.into())
    }

    pub fn options(msg: impl Into<String>) -> Self {
        Self::Options(msg.into())
    }

    pub fn asset(msg: impl Into<String>) -> Self {
        Self::Asset(msg.into())
    }
}
