//! Wire types and request encoders for the external collaborators.

pub mod cloudinary;
pub mod error_shapes;
pub mod gemini;
pub mod meshy;
pub mod photai;
pub mod stability;
