pub mod analyze;
pub mod climate;
pub(crate) mod common;
pub mod convert;
pub mod health;
pub mod outputs;
pub(crate) mod prompts;
pub mod reconstruct;
