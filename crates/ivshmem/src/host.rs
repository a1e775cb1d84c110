//! Host-side endpoint over the hypervisor's backing file.

use std::path::{Path, PathBuf};

use crate::error::{IvshmemError, Result};
use crate::posix::FileMapping;
use crate::region::MapState;
use crate::traits::SharedMemory;

/// Maps the file backing an IVSHMEM device on the VM host, usually under
/// `/dev/shm`.
pub struct Host {
    shm_path: PathBuf,
    state: MapState<FileMapping>,
}

impl Host {
    /// Creates a host endpoint for `shm_path` without mapping it.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be stat'ed.
    pub fn new(shm_path: impl Into<PathBuf>) -> Result<Self> {
        let shm_path = shm_path.into();
        std::fs::metadata(&shm_path).map_err(IvshmemError::wrap("stat shared memory file"))?;

        Ok(Self {
            shm_path,
            state: MapState::new(),
        })
    }
}

impl SharedMemory for Host {
    fn map(&mut self) -> Result<()> {
        let path = &self.shm_path;
        self.state.map_with(|| FileMapping::open(path))?;
        Ok(())
    }

    fn unmap(&mut self) -> Result<()> {
        self.state.unmap()
    }

    fn sync(&self) -> Result<()> {
        self.state.sync()
    }

    fn is_mapped(&self) -> bool {
        self.state.is_mapped()
    }

    fn size(&self) -> u64 {
        self.state.size()
    }

    fn dev_path(&self) -> &Path {
        &self.shm_path
    }

    fn shared_mem(&self) -> &[u8] {
        self.state.bytes()
    }

    fn shared_mem_mut(&mut self) -> &mut [u8] {
        self.state.bytes_mut()
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("shm_path", &self.shm_path)
            .field("mapped", &self.state.is_mapped())
            .field("size", &self.state.size())
            .finish()
    }
}
