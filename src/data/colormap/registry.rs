use std::sync::Arc;

use parking_lot::RwLock;

use crate::VoxelViewError;

/// A user-supplied lookup table of `len()` RGB entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTable {
    pub red : Vec<u8>,
    pub green : Vec<u8>,
    pub blue : Vec<u8>,
}

impl UserTable {
    pub fn len(&self) -> usize { self.red.len() }

    pub fn is_empty(&self) -> bool { self.red.is_empty() }
}

/// Process-wide store of user lookup tables.
///
/// Create one, wrap it in an `Arc` and hand it to every `Bundle` that
/// should see the same tables. Handles are stable, increasing indices;
/// a bundle's model number for handle `h` is `BUILTIN_MODELS + h`.
#[derive(Debug, Default)]
pub struct ColormapRegistry {
    tables : RwLock<Vec<Arc<UserTable>>>,
}

impl ColormapRegistry {
    pub fn new() -> Self {
        ColormapRegistry::default()
    }

    /// Appends a table and returns its handle. The three channels must
    /// be non-empty and of equal length.
    pub fn register(&self, red : &[u8], green : &[u8], blue : &[u8]) -> Result<usize, VoxelViewError> {
        if red.is_empty() || red.len() != green.len() || red.len() != blue.len() {
            return Err(VoxelViewError::InvalidColormap(format!(
                "channel lengths {} / {} / {}", red.len(), green.len(), blue.len()
            )));
        }
        let mut tables = self.tables.write();
        tables.push(Arc::new(UserTable {
            red : red.to_vec(),
            green : green.to_vec(),
            blue : blue.to_vec(),
        }));
        log::info!("Registered user colormap {} with {} entries", tables.len() - 1, red.len());
        Ok(tables.len() - 1)
    }

    pub fn get(&self, handle : usize) -> Option<Arc<UserTable>> {
        self.tables.read().get(handle).cloned()
    }

    pub fn len(&self) -> usize { self.tables.read().len() }

    pub fn is_empty(&self) -> bool { self.tables.read().is_empty() }

    /// Drops every table. Bundles still pointing at a user model fall
    /// back to grayscale on their next regeneration.
    pub fn clear(&self) {
        self.tables.write().clear();
    }
}
