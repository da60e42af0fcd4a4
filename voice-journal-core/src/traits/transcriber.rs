use crate::models::artifact::AudioArtifact;
use crate::models::error::JournalError;

/// Speech-to-text provider.
///
/// Called synchronously once per saved recording. A failure never blocks
/// saving: the entry is persisted with an empty transcript.
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, artifact: &AudioArtifact) -> Result<String, JournalError>;

    fn name(&self) -> &str;
}

/// Returns the same text for every artifact. Stands in until a real
/// provider is plugged in.
pub struct StaticTranscriber {
    text: String,
}

impl StaticTranscriber {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Transcriber for StaticTranscriber {
    fn transcribe(&self, _artifact: &AudioArtifact) -> Result<String, JournalError> {
        Ok(self.text.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}
