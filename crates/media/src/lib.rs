//! Image handling for vision requests: format detection, validation and
//! downscaling to sizes the model APIs accept.

pub mod error;
pub mod image_ops;

pub use {
    error::{Error, Result},
    image_ops::{ImageMetadata, OptimizedImage, get_image_metadata, prepare_for_vision},
};
