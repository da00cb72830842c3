//! Report export: CSV of raw entries, a PDF compliance report, a spoken
//! narration of a summary and the optional TTS client that voices it.

mod csv;
mod narration;
mod pdf;
mod tts;

pub use self::csv::*;
pub use narration::*;
pub use pdf::*;
pub use tts::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("PDF generation failed: {0}")]
    Pdf(String),

    #[error("Cannot reach TTS provider at {0}")]
    TtsConnection(String),

    #[error("TTS provider returned {status}: {body}")]
    TtsProvider { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}
