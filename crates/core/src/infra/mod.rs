pub mod http;
pub mod metrics;
pub mod notes;
pub mod transcription;
