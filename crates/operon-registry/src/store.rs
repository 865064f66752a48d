use std::path::{Path, PathBuf};

use tokio::fs;

use crate::element::CustomElement;
use crate::error::RegistryError;

/// Filesystem persistence for custom elements.
///
/// Each element is one pretty-printed JSON document:
/// ```text
/// {root}/
/// ├── 8f2c…-….json
/// └── 41aa…-….json
/// ```
/// The store is deliberately dumb — it never analyzes anything. Loaded
/// elements go back through the registry, which re-runs the analyzer on
/// admission.
pub struct FsElementStore {
  root: PathBuf,
}

impl FsElementStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn document_path(&self, id: &str) -> PathBuf {
    self.root.join(format!("{id}.json"))
  }

  pub async fn save(&self, element: &CustomElement) -> Result<(), RegistryError> {
    fs::create_dir_all(&self.root).await?;
    let body = serde_json::to_vec_pretty(element)?;
    fs::write(self.document_path(&element.id), body).await?;
    Ok(())
  }

  /// Every stored element, oldest first. A missing root directory is an
  /// empty store, not an error.
  pub async fn load_all(&self) -> Result<Vec<CustomElement>, RegistryError> {
    let mut elements = Vec::new();

    if !self.root.exists() {
      return Ok(elements);
    }

    let mut entries = fs::read_dir(&self.root).await?;
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if path.extension().and_then(|e| e.to_str()) != Some("json") {
        continue;
      }
      let content = fs::read_to_string(&path).await?;
      elements.push(serde_json::from_str(&content)?);
    }

    elements.sort_by(|a: &CustomElement, b: &CustomElement| {
      a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
    });
    Ok(elements)
  }

  pub async fn delete(&self, id: &str) -> Result<(), RegistryError> {
    let path = self.document_path(id);
    if !path.exists() {
      return Err(RegistryError::NotFound { id: id.to_string() });
    }
    fs::remove_file(path).await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::registry::StepRegistry;
  use operon_config::{ElementDef, ScriptLanguage};
  use tempfile::TempDir;

  async fn sample_element(name: &str) -> CustomElement {
    let registry = StepRegistry::empty();
    let id = registry
      .register_element(ElementDef::new(name, ScriptLanguage::Lua, "output = 1"))
      .await
      .unwrap();
    (*registry.element(&id).await.unwrap()).clone()
  }

  #[tokio::test]
  async fn save_then_load_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = FsElementStore::new(dir.path());

    let element = sample_element("persisted").await;
    store.save(&element).await.unwrap();

    let loaded = store.load_all().await.unwrap();
    assert_eq!(loaded, vec![element]);
  }

  #[tokio::test]
  async fn missing_root_is_an_empty_store() {
    let dir = TempDir::new().unwrap();
    let store = FsElementStore::new(dir.path().join("never-created"));
    assert!(store.load_all().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn delete_removes_the_document() {
    let dir = TempDir::new().unwrap();
    let store = FsElementStore::new(dir.path());

    let element = sample_element("ephemeral").await;
    store.save(&element).await.unwrap();
    store.delete(&element.id).await.unwrap();

    assert!(store.load_all().await.unwrap().is_empty());
    assert!(matches!(
      store.delete(&element.id).await,
      Err(RegistryError::NotFound { .. })
    ));
  }

  #[tokio::test]
  async fn ignores_foreign_files() {
    let dir = TempDir::new().unwrap();
    let store = FsElementStore::new(dir.path());

    let element = sample_element("kept").await;
    store.save(&element).await.unwrap();
    tokio::fs::write(dir.path().join("notes.txt"), "not an element")
      .await
      .unwrap();

    assert_eq!(store.load_all().await.unwrap().len(), 1);
  }
}
