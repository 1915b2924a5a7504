use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// The font directory is missing or does not hold the expected family.
    #[error("fonts unavailable: {0}")]
    Fonts(String),

    #[error("failed to render document: {0}")]
    Render(String),
}

impl From<genpdf::error::Error> for ReportError {
    fn from(err: genpdf::error::Error) -> Self {
        ReportError::Render(err.to_string())
    }
}
