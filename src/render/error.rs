//! Page renderer errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    /// A bundled template is missing or is not valid UTF-8
    #[error("Template not available: {0}")]
    Missing(String),

    #[error("Template error: {0}")]
    TemplateError(String),
}
