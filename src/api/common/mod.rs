//! Shared helpers reused across relay handlers.

mod io;
mod upload;

pub(crate) use io::{
    api_key_headers, bearer_headers, generate_text, read_json_body, respond, service,
};
pub(crate) use upload::{read_upload, UploadedImage};
