use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use operon_config::ElementDef;
use operon_sandbox::ScriptAnalyzer;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::builtin::BuiltinStep;
use crate::element::CustomElement;
use crate::error::RegistryError;

/// What a step's `type` field resolved to.
#[derive(Clone)]
pub enum ResolvedStep {
  Builtin(Arc<dyn BuiltinStep>),
  Custom(Arc<CustomElement>),
}

/// Holds every step implementation a pipeline may reference.
///
/// Builtins are fixed at construction. Custom elements come and go at
/// runtime, each passing the analyzer exactly once on the way in; handles
/// are `Arc`s, so removing an element never disturbs a run already holding
/// it.
pub struct StepRegistry {
  analyzer: ScriptAnalyzer,
  builtins: HashMap<String, Arc<dyn BuiltinStep>>,
  elements: RwLock<HashMap<String, Arc<CustomElement>>>,
}

impl StepRegistry {
  pub fn builder() -> StepRegistryBuilder {
    StepRegistryBuilder::default()
  }

  /// A registry with no builtins at all.
  pub fn empty() -> Self {
    Self::builder().build()
  }

  /// Analyze and store a custom element. The id of the stored element is
  /// returned; a rejected script stores nothing.
  pub async fn register_element(&self, def: ElementDef) -> Result<String, RegistryError> {
    let verdict = self.analyzer.analyze(def.language, &def.script);
    if !verdict.safe {
      return Err(RegistryError::Rejected {
        violations: verdict.violations,
      });
    }

    let element = CustomElement {
      id: Uuid::new_v4().to_string(),
      def,
      verdict,
      created_at: Utc::now(),
    };
    let id = element.id.clone();
    self
      .elements
      .write()
      .await
      .insert(id.clone(), Arc::new(element));
    Ok(id)
  }

  /// Re-admit a previously stored element under its original id, for
  /// example when reloading persisted elements at startup. The script is
  /// analyzed again so a tightened policy still gates old elements.
  pub async fn restore_element(&self, mut element: CustomElement) -> Result<String, RegistryError> {
    let verdict = self
      .analyzer
      .analyze(element.def.language, &element.def.script);
    if !verdict.safe {
      return Err(RegistryError::Rejected {
        violations: verdict.violations,
      });
    }

    element.verdict = verdict;
    let id = element.id.clone();
    self
      .elements
      .write()
      .await
      .insert(id.clone(), Arc::new(element));
    Ok(id)
  }

  /// Resolve a step type: builtin name first, then element id, then an
  /// unambiguous element name. An ambiguous name resolves to nothing.
  pub async fn resolve(&self, step_type: &str) -> Option<ResolvedStep> {
    if let Some(builtin) = self.builtins.get(step_type) {
      return Some(ResolvedStep::Builtin(Arc::clone(builtin)));
    }

    let elements = self.elements.read().await;
    if let Some(element) = elements.get(step_type) {
      return Some(ResolvedStep::Custom(Arc::clone(element)));
    }

    let mut named = elements.values().filter(|e| e.name() == step_type);
    match (named.next(), named.next()) {
      (Some(element), None) => Some(ResolvedStep::Custom(Arc::clone(element))),
      _ => None,
    }
  }

  pub async fn element(&self, id: &str) -> Option<Arc<CustomElement>> {
    self.elements.read().await.get(id).cloned()
  }

  /// All stored elements, oldest first.
  pub async fn list_elements(&self) -> Vec<Arc<CustomElement>> {
    let mut elements: Vec<_> = self.elements.read().await.values().cloned().collect();
    elements.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    elements
  }

  pub async fn remove_element(&self, id: &str) -> Result<(), RegistryError> {
    match self.elements.write().await.remove(id) {
      Some(_) => Ok(()),
      None => Err(RegistryError::NotFound { id: id.to_string() }),
    }
  }

  /// Names of the compiled-in builtins, sorted.
  pub fn builtin_names(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self.builtins.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
  }
}

#[derive(Default)]
pub struct StepRegistryBuilder {
  builtins: HashMap<String, Arc<dyn BuiltinStep>>,
}

impl StepRegistryBuilder {
  pub fn builtin(mut self, step: impl BuiltinStep + 'static) -> Self {
    let name = step.name().to_string();
    self.builtins.insert(name, Arc::new(step));
    self
  }

  pub fn build(self) -> StepRegistry {
    StepRegistry {
      analyzer: ScriptAnalyzer::new(),
      builtins: self.builtins,
      elements: RwLock::new(HashMap::new()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::builtin::{BuiltinError, BuiltinFn};
  use operon_config::ScriptLanguage;
  use serde_json::{Value, json};

  fn counting_registry() -> StepRegistry {
    StepRegistry::builder()
      .builtin(BuiltinFn::new("count", |input: Value, _params| async move {
        let n = input.as_array().map(Vec::len).unwrap_or(0);
        Ok(json!(n))
      }))
      .build()
  }

  #[tokio::test]
  async fn registers_and_resolves_safe_element() {
    let registry = StepRegistry::empty();
    let id = registry
      .register_element(ElementDef::new(
        "double",
        ScriptLanguage::Lua,
        "output = input * 2",
      ))
      .await
      .unwrap();

    match registry.resolve(&id).await {
      Some(ResolvedStep::Custom(element)) => assert_eq!(element.name(), "double"),
      _ => panic!("expected custom element under its id"),
    }
    match registry.resolve("double").await {
      Some(ResolvedStep::Custom(element)) => assert_eq!(element.id, id),
      _ => panic!("expected custom element under its name"),
    }
  }

  #[tokio::test]
  async fn rejects_unsafe_element_and_stores_nothing() {
    let registry = StepRegistry::empty();
    let err = registry
      .register_element(ElementDef::new(
        "escape",
        ScriptLanguage::Lua,
        r#"os.execute("id")"#,
      ))
      .await
      .unwrap_err();

    match err {
      RegistryError::Rejected { violations } => assert!(!violations.is_empty()),
      other => panic!("expected rejection, got {other}"),
    }
    assert!(registry.list_elements().await.is_empty());
  }

  #[tokio::test]
  async fn builtin_name_wins_over_element_name() {
    let registry = counting_registry();
    registry
      .register_element(ElementDef::new(
        "count",
        ScriptLanguage::Lua,
        "output = -1",
      ))
      .await
      .unwrap();

    match registry.resolve("count").await {
      Some(ResolvedStep::Builtin(step)) => assert_eq!(step.name(), "count"),
      _ => panic!("builtin should shadow the element name"),
    }
  }

  #[tokio::test]
  async fn ambiguous_element_name_does_not_resolve() {
    let registry = StepRegistry::empty();
    let def = ElementDef::new("stats", ScriptLanguage::Lua, "output = 1");
    let first = registry.register_element(def.clone()).await.unwrap();
    registry.register_element(def).await.unwrap();

    assert!(registry.resolve("stats").await.is_none());
    // Ids keep working either way.
    assert!(registry.resolve(&first).await.is_some());
  }

  #[tokio::test]
  async fn removal_leaves_existing_handles_usable() {
    let registry = StepRegistry::empty();
    let id = registry
      .register_element(ElementDef::new("keep", ScriptLanguage::Lua, "output = 1"))
      .await
      .unwrap();

    let handle = registry.element(&id).await.unwrap();
    registry.remove_element(&id).await.unwrap();

    assert!(registry.element(&id).await.is_none());
    assert_eq!(handle.script(), "output = 1");
    assert!(matches!(
      registry.remove_element(&id).await,
      Err(RegistryError::NotFound { .. })
    ));
  }

  #[tokio::test]
  async fn restore_keeps_the_original_id() {
    let registry = StepRegistry::empty();
    let id = registry
      .register_element(ElementDef::new("keep", ScriptLanguage::Lua, "output = 1"))
      .await
      .unwrap();
    let element = registry.element(&id).await.unwrap();

    let fresh = StepRegistry::empty();
    let restored = fresh.restore_element((*element).clone()).await.unwrap();
    assert_eq!(restored, id);
    assert!(fresh.element(&id).await.is_some());
  }

  #[tokio::test]
  async fn builtin_errors_surface_as_messages() {
    let failing = BuiltinFn::new("explode", |_input: Value, _params| async move {
      Err::<Value, _>(BuiltinError::new("unsupported record shape"))
    });
    let registry = StepRegistry::builder().builtin(failing).build();
    let Some(ResolvedStep::Builtin(step)) = registry.resolve("explode").await else {
      panic!("builtin should resolve");
    };
    let err = step.invoke(json!({}), &serde_json::Map::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "unsupported record shape");
  }
}
