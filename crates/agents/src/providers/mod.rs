pub mod gemini;

pub use gemini::{GeminiModelInfo, GeminiProvider};
