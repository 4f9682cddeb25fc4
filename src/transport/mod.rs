mod http_transport;
mod retry_policy;

pub use http_transport::{read_success_body, read_success_json, HttpTransport};
