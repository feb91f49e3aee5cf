pub mod content_guard;
pub mod gemini;
pub mod pdf;
pub mod text_decode;
