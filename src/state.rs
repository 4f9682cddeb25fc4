mod outputs;
mod request_id;

use crate::config::AppConfig;
use crate::error::RelayError;
use crate::routing::normalize_base_path;
use crate::transport::HttpTransport;

pub use outputs::{OutputStore, StoredOutput};
use request_id::RequestIdGenerator;

/// Public path prefix, below `server.base_path`, that stored outputs are served under.
pub const OUTPUTS_ROUTE_PREFIX: &str = "/outputs";

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub transport: HttpTransport,
    pub outputs: OutputStore,
    request_ids: RequestIdGenerator,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, transport: HttpTransport, outputs: OutputStore) -> Self {
        Self {
            config,
            transport,
            outputs,
            request_ids: RequestIdGenerator::new(),
        }
    }

    /// Build the state from config alone: HTTP client plus the output
    /// directory named in `server.outputs_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] when the HTTP client cannot be built and
    /// [`RelayError::Storage`] when the outputs directory cannot be created.
    pub fn from_config(config: AppConfig) -> Result<Self, RelayError> {
        let transport = HttpTransport::new(&config.server)?;
        let url_prefix = format!(
            "{}{OUTPUTS_ROUTE_PREFIX}",
            normalize_base_path(&config.server.base_path)
        );
        let outputs = OutputStore::open(&config.server.outputs_dir, url_prefix)?;
        Ok(Self::new(config, transport, outputs))
    }

    pub fn next_request_seq(&self) -> u64 {
        self.request_ids.next_seq()
    }

    #[must_use]
    pub fn request_uuid(&self, request_seq: u64) -> uuid::Uuid {
        self.request_ids.request_uuid(request_seq)
    }
}
