use thiserror::Error;

#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Template not found: {0}")]
    TemplateNotFoundError(String),

    #[error("Template '{template}' is malformed: {reason}")]
    TemplateMalformedError { template: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInputError(String),

    #[error("Text overlay was not produced: {0}")]
    OverlayGenerationError(String),

    #[error("Image processing error: {0}")]
    ImageProcessingError(String),

    #[error("No scenes produced for template '{0}'")]
    NoScenesProducedError(String),

    #[error("Missing text overlay for section {section}: {reason}")]
    MissingOverlayError { section: usize, reason: String },

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Video generation error: {0}")]
    VideoGenerationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("FFmpeg error: {0}")]
    FfmpegError(String),
}

impl VideoError {
    pub fn malformed(template: impl Into<String>, reason: impl Into<String>) -> Self {
        VideoError::TemplateMalformedError {
            template: template.into(),
            reason: reason.into(),
        }
    }
}

impl From<image::ImageError> for VideoError {
    fn from(e: image::ImageError) -> Self {
        VideoError::ImageProcessingError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VideoError>;
