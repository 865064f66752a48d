//! Steps compiled into the embedding process.

use std::future::Future;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Failure raised by a builtin step's own logic. Always treated as a
/// runtime failure of the step, never as an infrastructure problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct BuiltinError(String);

impl BuiltinError {
  pub fn new(message: impl Into<String>) -> Self {
    Self(message.into())
  }
}

/// A step implementation provided by the embedding process rather than a
/// registered script. Builtins skip the analyzer entirely — they are
/// trusted code.
#[async_trait]
pub trait BuiltinStep: Send + Sync {
  /// The type name pipeline steps use to refer to this builtin.
  fn name(&self) -> &str;

  async fn invoke(
    &self,
    input: Value,
    parameters: &Map<String, Value>,
  ) -> Result<Value, BuiltinError>;
}

/// Adapter turning an async closure into a [`BuiltinStep`].
///
/// The closure receives the parameters by value so its future owns
/// everything it touches.
pub struct BuiltinFn<F> {
  name: String,
  func: F,
}

impl<F, Fut> BuiltinFn<F>
where
  F: Fn(Value, Map<String, Value>) -> Fut + Send + Sync,
  Fut: Future<Output = Result<Value, BuiltinError>> + Send,
{
  pub fn new(name: impl Into<String>, func: F) -> Self {
    Self {
      name: name.into(),
      func,
    }
  }
}

#[async_trait]
impl<F, Fut> BuiltinStep for BuiltinFn<F>
where
  F: Fn(Value, Map<String, Value>) -> Fut + Send + Sync,
  Fut: Future<Output = Result<Value, BuiltinError>> + Send,
{
  fn name(&self) -> &str {
    &self.name
  }

  async fn invoke(
    &self,
    input: Value,
    parameters: &Map<String, Value>,
  ) -> Result<Value, BuiltinError> {
    (self.func)(input, parameters.clone()).await
  }
}
