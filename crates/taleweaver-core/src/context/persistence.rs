use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::paths;
use crate::context::ConversationStore;
use crate::error::TaleError;
use crate::llm::{Message, Role};

/// On-disk shape of one turn message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for SavedMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// A single save slot: a JSON array of `{role, content}` objects in turn
/// order, overwritten wholesale on every save.
#[derive(Debug, Clone)]
pub struct SaveFile {
    path: PathBuf,
}

impl SaveFile {
    /// Save slot at the default location (`<data_dir>/taleweaver/savegame.json`).
    pub fn new() -> Result<Self, TaleError> {
        Ok(Self::with_path(Self::default_path()?))
    }

    /// Save slot at a custom path (useful for testing)
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> Result<PathBuf, TaleError> {
        let base = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| TaleError::Config("Could not determine data directory".to_string()))?;

        Ok(base.join(paths::CONFIG_DIR).join(paths::SAVE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write the whole store, replacing any previous save.
    pub fn save(&self, store: &ConversationStore) -> Result<(), TaleError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let saved: Vec<SavedMessage> = store.iter().map(SavedMessage::from).collect();
        let contents = serde_json::to_string_pretty(&saved)?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(&tmp_path, &self.path)?;

        tracing::info!(path = %self.path.display(), messages = saved.len(), "game saved");
        Ok(())
    }

    /// Read the save back into a fresh store.
    pub fn load(&self) -> Result<ConversationStore, TaleError> {
        if !self.exists() {
            return Err(TaleError::NotFound(self.path.display().to_string()));
        }

        let contents = fs::read(&self.path)?;
        let saved: Vec<SavedMessage> = serde_json::from_slice(&contents)
            .map_err(|e| TaleError::CorruptData(format!("{}: {e}", self.path.display())))?;

        let mut store = ConversationStore::new();
        for (index, message) in saved.into_iter().enumerate() {
            if message.role == Role::System {
                return Err(TaleError::CorruptData(format!(
                    "{}: unexpected system message at position {index}",
                    self.path.display()
                )));
            }
            store.append(Message {
                role: message.role,
                content: message.content,
            });
        }

        tracing::info!(path = %self.path.display(), messages = store.len(), "game loaded");
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_writes_plain_role_content_array() {
        let dir = TempDir::new().unwrap();
        let file = SaveFile::with_path(dir.path().join("save.json"));

        let mut store = ConversationStore::new();
        store.add_assistant_message("You wake on a beach.");
        store.add_user_message("stand up");
        file.save(&store).unwrap();

        let raw = fs::read_to_string(file.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"role": "assistant", "content": "You wake on a beach."},
                {"role": "user", "content": "stand up"},
            ])
        );
        assert!(!file.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn save_creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let file = SaveFile::with_path(dir.path().join("nested").join("slot").join("save.json"));

        file.save(&ConversationStore::new()).unwrap();
        assert!(file.exists());
    }

    #[test]
    fn rejects_system_messages() {
        let dir = TempDir::new().unwrap();
        let file = SaveFile::with_path(dir.path().join("save.json"));
        fs::write(file.path(), r#"[{"role":"system","content":"persona"}]"#).unwrap();

        assert!(matches!(file.load(), Err(TaleError::CorruptData(_))));
    }

    #[test]
    fn rejects_wrong_shape() {
        let dir = TempDir::new().unwrap();
        let file = SaveFile::with_path(dir.path().join("save.json"));
        fs::write(file.path(), r#"{"messages": []}"#).unwrap();

        assert!(matches!(file.load(), Err(TaleError::CorruptData(_))));
    }

    #[test]
    fn non_utf8_bytes_are_corrupt_data() {
        let dir = TempDir::new().unwrap();
        let file = SaveFile::with_path(dir.path().join("save.json"));
        fs::write(file.path(), [0xff, 0xfe]).unwrap();

        assert!(matches!(file.load(), Err(TaleError::CorruptData(_))));
    }
}
