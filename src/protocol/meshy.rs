//! Meshy `image-to-3d` task API wire types.

use serde::{Deserialize, Serialize};

use crate::config::MeshyConfig;

/// Body for creating an image-to-3D task.
#[derive(Debug, Clone, Serialize)]
pub struct MeshyCreateTask<'a> {
    pub image_url: &'a str,
    pub enable_pbr: bool,
    pub should_remesh: bool,
    pub should_texture: bool,
}

impl<'a> MeshyCreateTask<'a> {
    #[must_use]
    pub fn new(image_url: &'a str, config: &MeshyConfig) -> Self {
        Self {
            image_url,
            enable_pbr: config.enable_pbr,
            should_remesh: config.should_remesh,
            should_texture: config.should_texture,
        }
    }
}

/// Meshy answers a task creation with `{"result": "<task id>"}`.
#[derive(Debug, Clone, Deserialize)]
pub struct MeshyCreateTaskResponse {
    pub result: String,
}

const TASK_ID_MAX_LEN: usize = 128;

/// Task ids are appended to the upstream URL path, so only a conservative
/// character set is accepted.
#[must_use]
pub fn is_valid_task_id(task_id: &str) -> bool {
    !task_id.is_empty()
        && task_id.len() <= TASK_ID_MAX_LEN
        && task_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
