/// Error taxonomy of the emotion service.
///
/// Only construction errors ever reach a caller. Everything raised while
/// handling a single utterance is logged and turned into a suppressed reaction.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmotionError {
    /// `[emotion] enabled = false`.
    #[error("emotion service disabled in config")]
    Disabled,

    /// Out-of-range threshold, negative cooldown, unknown provider.
    #[error("invalid emotion config: {0}")]
    Config(String),

    /// API key environment variable missing or empty.
    #[error("{0} environment variable not set")]
    MissingCredential(String),

    /// No JSON object could be extracted from the model output.
    #[error("failed to parse model response as JSON: {0}")]
    Parse(String),

    /// Network or API failure during classification or dispatch.
    #[error("remote call failed: {0}")]
    Remote(#[from] anyhow::Error),
}

impl EmotionError {
    /// Config-level failures mean "no service", not "crash".
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Disabled | Self::Config(_))
    }
}
