//! Host storage seam for save data

use crate::error::{ZError, ZResult};
use indexmap::IndexMap;
use log::debug;

/// Name the `save`/`restore` opcodes use for whole-game saves
pub const GAME_SAVE: &str = "game";

/// Where `save` and `restore` put their bytes. Games address auxiliary
/// table saves by name; whole-game saves use [`GAME_SAVE`].
pub trait SaveStore {
    fn write(&mut self, name: &str, data: &[u8]) -> ZResult<()>;
    fn read(&mut self, name: &str) -> ZResult<Vec<u8>>;
}

/// Keeps saves in memory for the lifetime of the interpreter
#[derive(Debug, Default, Clone)]
pub struct MemorySaveStore {
    saves: IndexMap<String, Vec<u8>>,
}

impl MemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.saves.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.saves.keys().map(String::as_str)
    }
}

impl SaveStore for MemorySaveStore {
    fn write(&mut self, name: &str, data: &[u8]) -> ZResult<()> {
        debug!("Storing {} bytes as '{}'", data.len(), name);
        self.saves.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn read(&mut self, name: &str) -> ZResult<Vec<u8>> {
        self.saves
            .get(name)
            .cloned()
            .ok_or_else(|| ZError::InvalidSave(format!("nothing saved as '{name}'")))
    }
}
