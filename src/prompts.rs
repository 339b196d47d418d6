//! Prompts for VLM-based text recognition.
//!
//! The identity-document check only needs to know *how much* readable text
//! the upload carries, so the prompt asks for a plain verbatim transcript
//! and nothing else. Any commentary the model adds would inflate the
//! character count and let a blurry scan through.
//!
//! Callers can override the prompt via
//! [`crate::config::GatePassConfig::system_prompt`].

/// Default system prompt for transcribing a document image.
pub const DEFAULT_TRANSCRIPTION_PROMPT: &str = r#"You are an OCR engine. Transcribe every piece of printed or handwritten text visible in the image.

Rules:
1. Output ONLY the text you can actually read, in natural reading order.
2. Do NOT describe the image, guess at unreadable characters, or add commentary.
3. Do NOT wrap the output in code fences or add headings.
4. If no text is legible, output nothing at all."#;

/// User-turn text accompanying the image.
pub const TRANSCRIPTION_REQUEST: &str = "Transcribe the text in this image.";
