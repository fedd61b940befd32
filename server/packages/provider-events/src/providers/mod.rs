pub mod claude;
pub mod gemini;
