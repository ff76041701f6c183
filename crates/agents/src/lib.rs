//! Generative-AI backend access: the [`AiGateway`] trait and its Gemini
//! implementation.

pub mod error;
pub mod model;
pub mod providers;

pub use {
    error::{Error, Result},
    model::{AiGateway, DEFAULT_IMAGE_PROMPT, ImageInput},
    providers::{GeminiModelInfo, GeminiProvider},
};
