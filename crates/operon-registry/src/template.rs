//! Starter scripts handed to element authors.

use operon_config::ScriptLanguage;

const LUA_TEMPLATE: &str = r#"-- `input` holds the upstream payload, `parameters` this step's settings.
-- Assign the result to `output` (or return it).
local label = parameters.label or "unlabelled"

output = {
  label = label,
  received = input,
}
"#;

const PYTHON_TEMPLATE: &str = r#"# `input` and `parameters` are bound before this script runs.
# Leave the step's result in `result`; it is serialised to JSON.
label = parameters.get("label", "unlabelled")

result = {
    "label": label,
    "received": input,
}
"#;

const SHELL_TEMPLATE: &str = r#"# "$INPUT_FILE" holds {"input": .., "parameters": ..}.
# Print the step's result to stdout as a single JSON document.
cat "$INPUT_FILE"
"#;

/// A minimal working script for the given language, following the
/// invocation conventions its runner expects. Every template passes the
/// analyzer as-is.
pub fn script_template(language: ScriptLanguage) -> &'static str {
  match language {
    ScriptLanguage::Lua => LUA_TEMPLATE,
    ScriptLanguage::Python => PYTHON_TEMPLATE,
    ScriptLanguage::Shell => SHELL_TEMPLATE,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use operon_sandbox::ScriptAnalyzer;

  #[test]
  fn every_template_passes_analysis() {
    let analyzer = ScriptAnalyzer::new();
    for language in ScriptLanguage::ALL {
      let verdict = analyzer.analyze(language, script_template(language));
      assert!(
        verdict.safe,
        "{language} template rejected: {}",
        verdict.summary()
      );
    }
  }
}
