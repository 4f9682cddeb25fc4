pub(crate) mod api;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod report;
pub mod routing;
pub mod state;
pub mod transport;

mod util;
