//! Persistence of the elite brain between runs.

use anyhow::{Context, Result};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// Persistent slot holding one serialized brain.
pub trait BrainStore {
    fn save(&mut self, brain: &str) -> Result<()>;
    fn load(&self) -> Result<Option<String>>;
    fn clear(&mut self) -> Result<()>;
}

/// [`BrainStore`] backed by a single file.
pub struct FileStore {
    file: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(file: P) -> Self {
        Self {
            file: file.as_ref().to_path_buf(),
        }
    }
}

impl BrainStore for FileStore {
    fn save(&mut self, brain: &str) -> Result<()> {
        // The stored brain is replaced atomically.
        let tmp_file = self.file.with_extension("tmp");
        fs::write(&tmp_file, brain).with_context(|| format!("failed to write {tmp_file:?}"))?;
        fs::rename(&tmp_file, &self.file)
            .with_context(|| format!("failed to rename {tmp_file:?} to {:?}", self.file))?;
        Ok(())
    }

    fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.file) {
            Ok(brain) => Ok(Some(brain)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read {:?}", self.file)),
        }
    }

    fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.file) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to remove {:?}", self.file)),
        }
    }
}

/// In-memory [`BrainStore`].
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    pub brain: Option<String>,
}

#[cfg(test)]
impl BrainStore for MemoryStore {
    fn save(&mut self, brain: &str) -> Result<()> {
        self.brain = Some(brain.to_owned());
        Ok(())
    }

    fn load(&self) -> Result<Option<String>> {
        Ok(self.brain.clone())
    }

    fn clear(&mut self) -> Result<()> {
        self.brain = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn file_store_lifecycle() {
        let dir = env::temp_dir().join(format!("neurodrive-store-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("failed to create test directory");
        let mut store = FileStore::new(dir.join("brain.json"));

        assert_eq!(store.load().expect("load"), None);
        store.save(r#"{"levels":[]}"#).expect("save");
        assert_eq!(store.load().expect("load").as_deref(), Some(r#"{"levels":[]}"#));
        store.clear().expect("clear");
        assert_eq!(store.load().expect("load"), None);
        store.clear().expect("clearing twice is fine");

        fs::remove_dir_all(&dir).ok();
    }
}
