#[cfg(test)]
mod registry_tests;

use std::collections::BTreeMap;

use tracing::info;

use crate::config::{DiskConfig, validate_name};
use crate::disk::{Disk, DiskReport};
use crate::error::{FsError, FsResult};
use crate::manager::DiskManager;
use crate::storage::medium::Medium;

/// Every open disk, keyed by its name.
pub struct DiskRegistry<M: Medium> {
    disks: BTreeMap<String, DiskManager<M>>,
}

impl<M: Medium> Default for DiskRegistry<M> {
    fn default() -> Self {
        Self {
            disks: BTreeMap::new(),
        }
    }
}

impl<M: Medium> DiskRegistry<M> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Formats `medium` as a new disk and registers it.
    pub fn create_disk(
        &mut self,
        medium: M,
        config: DiskConfig,
        name: &str,
    ) -> FsResult<&mut DiskManager<M>> {
        self.ensure_vacant(name)?;
        let manager = DiskManager::new(Disk::create(medium, config, name)?)?;
        Ok(self.insert(manager))
    }

    /// Registers an already formatted image under the name it carries.
    pub fn open_disk(&mut self, medium: M) -> FsResult<&mut DiskManager<M>> {
        let disk = Disk::open(medium)?;
        self.ensure_vacant(disk.name())?;
        Ok(self.insert(DiskManager::new(disk)?))
    }

    pub fn rename_disk(&mut self, old: &str, new: &str) -> FsResult<()> {
        if old == new {
            return self.get(old).map(|_| ()).ok_or_else(|| missing(old));
        }
        validate_name(new)?;
        self.ensure_vacant(new)?;
        let manager = self.disks.get_mut(old).ok_or_else(|| missing(old))?;
        manager.rename_disk(new)?;
        if let Some(manager) = self.disks.remove(old) {
            self.disks.insert(new.to_string(), manager);
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DiskManager<M>> {
        self.disks.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut DiskManager<M>> {
        self.disks.get_mut(name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.disks.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.disks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.disks.is_empty()
    }

    /// Unregisters a disk, flushes it and hands its medium back.
    ///
    /// # Errors
    /// Returns `NotFound`, `ResourceBusy` while handles are open, or a flush
    /// failure.
    pub fn remove(&mut self, name: &str) -> FsResult<M> {
        let manager = self.disks.get(name).ok_or_else(|| missing(name))?;
        if manager.has_open_handles() {
            return Err(FsError::ResourceBusy(name.to_string()));
        }
        let manager = self.disks.remove(name).ok_or_else(|| missing(name))?;
        Ok(manager.into_disk()?.into_medium())
    }

    /// One capacity row per disk, in name order.
    #[must_use]
    pub fn report(&self) -> Vec<DiskReport> {
        self.disks.values().map(DiskManager::report).collect()
    }

    pub fn flush_all(&mut self) -> FsResult<()> {
        self.disks.values_mut().try_for_each(DiskManager::flush)
    }

    fn ensure_vacant(&self, name: &str) -> FsResult<()> {
        if self.disks.contains_key(name) {
            return Err(FsError::AlreadyExists(format!("disk {name}")));
        }
        Ok(())
    }

    fn insert(&mut self, manager: DiskManager<M>) -> &mut DiskManager<M> {
        let name = manager.name().to_string();
        info!(disk = %name, registered = self.disks.len() + 1, "registered disk");
        self.disks.entry(name).or_insert(manager)
    }
}

fn missing(name: &str) -> FsError {
    FsError::NotFound(format!("disk {name}"))
}
