// src/core/instance.rs

//! Loads or creates the node's permanent identity.
//!
//! The identity is a single hyphen-less UUID stored in `<data_dir>/instance`.
//! Its absence marks the first run of the node.

use crate::core::MasterError;
use crate::core::protocol::NodeInstance;
use std::path::{Path, PathBuf};
use tracing::info;

const INSTANCE_FILE_NAME: &str = "instance";

#[derive(Debug, Clone)]
pub struct InstanceMetadata {
    pub instance: NodeInstance,
    /// True when no identity existed on disk and a new one was created.
    pub is_first_run: bool,
    pub path: PathBuf,
}

impl InstanceMetadata {
    pub fn load_or_create(data_dir: impl AsRef<Path>) -> Result<Self, MasterError> {
        let data_dir = data_dir.as_ref();
        let path = data_dir.join(INSTANCE_FILE_NAME);
        let instance_seqno = chrono::Utc::now().timestamp_micros().max(0) as u64;

        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            let uuid = contents.trim().to_string();
            if !is_valid_uuid(&uuid) {
                return Err(MasterError::IllegalState(format!(
                    "instance file '{}' does not contain a valid uuid",
                    path.display()
                )));
            }
            info!("Loaded instance identity {} from {}", uuid, path.display());
            return Ok(Self {
                instance: NodeInstance {
                    permanent_uuid: uuid,
                    instance_seqno,
                },
                is_first_run: false,
                path,
            });
        }

        std::fs::create_dir_all(data_dir)?;
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        std::fs::write(&path, format!("{uuid}\n"))?;
        info!("Created new instance identity {} at {}", uuid, path.display());
        Ok(Self {
            instance: NodeInstance {
                permanent_uuid: uuid,
                instance_seqno,
            },
            is_first_run: true,
            path,
        })
    }

    pub fn uuid(&self) -> &str {
        &self.instance.permanent_uuid
    }
}

fn is_valid_uuid(s: &str) -> bool {
    s.len() == 32 && s.chars().all(|c| c.is_ascii_hexdigit())
}
