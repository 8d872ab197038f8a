//! Reference counts for open paths.
//!
//! Opening `/a/b/file` pins `/a/b/file`, `/a/b`, `/a` and `/`. A pinned path
//! cannot be deleted or renamed until every handle beneath it is closed.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{FsError, FsResult};
use crate::node::NodeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub inode: u64,
    pub kind: NodeKind,
}

#[derive(Debug)]
struct Pin {
    refs: usize,
    leaf_refs: usize,
    target: Option<Target>,
}

#[derive(Debug, Default)]
pub struct OpenHandles {
    pins: HashMap<String, Pin>,
}

impl OpenHandles {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins `path` and all of its ancestors. `path` must be canonical.
    pub fn open(&mut self, path: &str, target: Target) -> String {
        for (depth, ancestor) in lineage(path).into_iter().enumerate() {
            let pin = self.pins.entry(ancestor.to_string()).or_insert(Pin {
                refs: 0,
                leaf_refs: 0,
                target: None,
            });
            pin.refs += 1;
            if depth == 0 {
                pin.leaf_refs += 1;
                pin.target = Some(target);
            }
        }
        debug!(path, "opened handle");
        path.to_string()
    }

    pub fn close(&mut self, handle: &str) -> FsResult<()> {
        match self.pins.get_mut(handle) {
            Some(pin) if pin.leaf_refs > 0 => pin.leaf_refs -= 1,
            _ => {
                return Err(FsError::invalid(format!("{handle} is not an open handle")));
            }
        }
        for ancestor in lineage(handle) {
            if let Some(pin) = self.pins.get_mut(ancestor) {
                pin.refs -= 1;
                if pin.refs == 0 {
                    self.pins.remove(ancestor);
                }
            }
        }
        debug!(handle, "closed handle");
        Ok(())
    }

    /// What `handle` was opened on.
    pub fn target(&self, handle: &str) -> FsResult<Target> {
        self.pins
            .get(handle)
            .filter(|pin| pin.leaf_refs > 0)
            .and_then(|pin| pin.target)
            .ok_or_else(|| FsError::invalid(format!("{handle} is not an open handle")))
    }

    #[must_use]
    pub fn is_busy(&self, path: &str) -> bool {
        self.pins.contains_key(path)
    }

    pub fn ensure_idle(&self, path: &str) -> FsResult<()> {
        if self.is_busy(path) {
            warn!(path, "refused: path is open");
            return Err(FsError::ResourceBusy(path.to_string()));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Paths with at least one handle opened directly on them, sorted.
    #[must_use]
    pub fn open_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self
            .pins
            .iter()
            .filter(|(_, pin)| pin.leaf_refs > 0)
            .map(|(path, _)| path.as_str())
            .collect();
        paths.sort_unstable();
        paths
    }
}

/// `path` followed by each ancestor up to `/`.
fn lineage(path: &str) -> Vec<&str> {
    let mut out = vec![path];
    let mut current = path;
    while current != "/" {
        current = match current.rfind('/') {
            Some(0) | None => "/",
            Some(idx) => &current[..idx],
        };
        out.push(current);
    }
    out
}
