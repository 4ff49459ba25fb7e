//! Cloud-drive client seam
//!
//! The cloud-drive backend talks to the remote service through `DriveClient`:
//! a node tree of folders and files addressed by opaque handles. A vendor SDK
//! adapter implements this trait; `MockDrive` is the in-memory implementation
//! used by tests and local runs.

use crate::error::{VaultError, VaultResult};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct DriveNode {
    pub handle: String,
    /// Containing folder; `None` at the drive root
    pub parent: Option<String>,
    pub name: String,
    pub is_folder: bool,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait DriveClient: Send + Sync {
    /// Children of `parent`, or of the drive root when `None`
    async fn children(&self, parent: Option<&str>) -> VaultResult<Vec<DriveNode>>;

    async fn create_folder(&self, parent: Option<&str>, name: &str) -> VaultResult<DriveNode>;

    /// Resolves only once the remote side reports the upload complete
    async fn upload(&self, folder: &str, name: &str, data: Bytes) -> VaultResult<DriveNode>;

    /// Look up one node by handle
    async fn node(&self, handle: &str) -> VaultResult<DriveNode>;

    async fn download(&self, handle: &str) -> VaultResult<Bytes>;

    /// Public link for a completed file
    async fn export_link(&self, handle: &str) -> VaultResult<String>;

    /// Remove a node and everything below it
    async fn delete(&self, handle: &str) -> VaultResult<()>;

    async fn move_node(&self, handle: &str, new_parent: Option<&str>, new_name: &str) -> VaultResult<()>;
}

struct MockNode {
    node: DriveNode,
    data: Option<Bytes>,
}

#[derive(Default)]
struct DriveState {
    nodes: HashMap<String, MockNode>,
    next_handle: u64,
}

impl DriveState {
    fn allocate(&mut self) -> String {
        self.next_handle += 1;
        format!("node{}", self.next_handle)
    }

    fn require_folder(&self, handle: &str) -> VaultResult<()> {
        match self.nodes.get(handle) {
            Some(node) if node.node.is_folder => Ok(()),
            Some(_) => Err(VaultError::invalid(format!("Drive node {} is not a folder", handle))),
            None => Err(VaultError::not_found(format!("drive node {}", handle))),
        }
    }

    fn insert(&mut self, parent: Option<&str>, name: &str, data: Option<Bytes>) -> DriveNode {
        let handle = self.allocate();
        let node = DriveNode {
            handle: handle.clone(),
            parent: parent.map(str::to_string),
            name: name.to_string(),
            is_folder: data.is_none(),
            size: data.as_ref().map(|d| d.len() as u64).unwrap_or(0),
            created_at: Utc::now(),
        };
        self.nodes.insert(
            handle,
            MockNode {
                node: node.clone(),
                data,
            },
        );
        node
    }
}

/// In-memory DriveClient
#[derive(Default)]
pub struct MockDrive {
    state: Mutex<DriveState>,
}

impl MockDrive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of nodes, folders included
    pub fn node_count(&self) -> usize {
        self.state.lock().unwrap().nodes.len()
    }
}

#[async_trait]
impl DriveClient for MockDrive {
    async fn children(&self, parent: Option<&str>) -> VaultResult<Vec<DriveNode>> {
        let state = self.state.lock().unwrap();
        if let Some(parent) = parent {
            state.require_folder(parent)?;
        }
        let mut children: Vec<DriveNode> = state
            .nodes
            .values()
            .filter(|n| n.node.parent.as_deref() == parent)
            .map(|n| n.node.clone())
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name).then(a.handle.cmp(&b.handle)));
        Ok(children)
    }

    async fn create_folder(&self, parent: Option<&str>, name: &str) -> VaultResult<DriveNode> {
        let mut state = self.state.lock().unwrap();
        if let Some(parent) = parent {
            state.require_folder(parent)?;
        }
        Ok(state.insert(parent, name, None))
    }

    async fn upload(&self, folder: &str, name: &str, data: Bytes) -> VaultResult<DriveNode> {
        let mut state = self.state.lock().unwrap();
        state.require_folder(folder)?;
        Ok(state.insert(Some(folder), name, Some(data)))
    }

    async fn node(&self, handle: &str) -> VaultResult<DriveNode> {
        let state = self.state.lock().unwrap();
        state
            .nodes
            .get(handle)
            .map(|n| n.node.clone())
            .ok_or_else(|| VaultError::not_found(format!("drive node {}", handle)))
    }

    async fn download(&self, handle: &str) -> VaultResult<Bytes> {
        let state = self.state.lock().unwrap();
        state
            .nodes
            .get(handle)
            .and_then(|n| n.data.clone())
            .ok_or_else(|| VaultError::not_found(format!("drive node {}", handle)))
    }

    async fn export_link(&self, handle: &str) -> VaultResult<String> {
        let state = self.state.lock().unwrap();
        if !state.nodes.contains_key(handle) {
            return Err(VaultError::not_found(format!("drive node {}", handle)));
        }
        Ok(format!("https://drive.invalid/file/{}", handle))
    }

    async fn delete(&self, handle: &str) -> VaultResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.nodes.contains_key(handle) {
            return Err(VaultError::not_found(format!("drive node {}", handle)));
        }
        let mut pending = vec![handle.to_string()];
        while let Some(current) = pending.pop() {
            pending.extend(
                state
                    .nodes
                    .iter()
                    .filter(|(_, n)| n.node.parent.as_deref() == Some(current.as_str()))
                    .map(|(h, _)| h.clone()),
            );
            state.nodes.remove(&current);
        }
        Ok(())
    }

    async fn move_node(&self, handle: &str, new_parent: Option<&str>, new_name: &str) -> VaultResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(parent) = new_parent {
            state.require_folder(parent)?;
        }
        let node = state
            .nodes
            .get_mut(handle)
            .ok_or_else(|| VaultError::not_found(format!("drive node {}", handle)))?;
        node.node.parent = new_parent.map(str::to_string);
        node.node.name = new_name.to_string();
        Ok(())
    }
}
