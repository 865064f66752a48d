use mlua::Lua;
use operon_config::ScriptLanguage;

use crate::policy::policy_for;
use crate::verdict::{SecurityVerdict, Violation, ViolationCategory};

/// Analyzes custom element scripts before registration.
///
/// Analysis never executes anything. For the in-process language the script
/// is additionally compiled (not run) to catch syntax errors early — an
/// invalid script is itself a violation, since it cannot be reasoned about.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptAnalyzer;

impl ScriptAnalyzer {
  pub fn new() -> Self {
    Self
  }

  /// Produce the verdict for a script in the given language.
  pub fn analyze(&self, language: ScriptLanguage, script: &str) -> SecurityVerdict {
    let mut violations = policy_for(language).scan(script);

    if language == ScriptLanguage::Lua {
      if let Some(violation) = lua_syntax_violation(script) {
        violations.push(violation);
      }
    }

    SecurityVerdict::from_violations(violations)
  }
}

/// Compile the chunk in a throwaway VM without calling it; a compile error
/// becomes a syntax violation.
fn lua_syntax_violation(script: &str) -> Option<Violation> {
  let lua = Lua::new();
  match lua.load(script).into_function() {
    Ok(_) => None,
    Err(e) => Some(Violation::new(
      ViolationCategory::Syntax,
      format!("script does not compile: {e}"),
    )),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_clean_lua() {
    let analyzer = ScriptAnalyzer::new();
    let verdict = analyzer.analyze(
      ScriptLanguage::Lua,
      "local total = 0\nfor _, v in ipairs(input) do total = total + v end\noutput = total",
    );
    assert!(verdict.safe, "unexpected violations: {}", verdict.summary());
  }

  #[test]
  fn rejects_lua_process_control() {
    let analyzer = ScriptAnalyzer::new();
    let verdict = analyzer.analyze(ScriptLanguage::Lua, "os.exit(1)");
    assert!(!verdict.safe);
    assert_eq!(
      verdict.violations[0].category,
      ViolationCategory::ProcessControl
    );
  }

  #[test]
  fn rejects_invalid_lua_syntax() {
    let analyzer = ScriptAnalyzer::new();
    let verdict = analyzer.analyze(ScriptLanguage::Lua, "output = (1 +");
    assert!(!verdict.safe);
    assert!(
      verdict
        .violations
        .iter()
        .any(|v| v.category == ViolationCategory::Syntax)
    );
  }

  #[test]
  fn syntax_gate_does_not_execute() {
    // A compiling script with an immediate runtime error must pass analysis
    // untouched; only compilation happens here.
    let analyzer = ScriptAnalyzer::new();
    let verdict = analyzer.analyze(ScriptLanguage::Lua, "error('never analyzed this far')");
    assert!(verdict.safe);
  }

  #[test]
  fn rejects_python_import() {
    let analyzer = ScriptAnalyzer::new();
    let verdict = analyzer.analyze(ScriptLanguage::Python, "import subprocess\n");
    assert!(!verdict.safe);
    assert_eq!(verdict.violations.len(), 1);
  }

  #[test]
  fn accepts_clean_shell() {
    let analyzer = ScriptAnalyzer::new();
    let verdict = analyzer.analyze(
      ScriptLanguage::Shell,
      "count=$(jq '.input | length' \"$INPUT_FILE\")\necho \"{\\\"count\\\": $count}\"",
    );
    assert!(verdict.safe, "unexpected violations: {}", verdict.summary());
  }

  #[test]
  fn verdict_is_deterministic() {
    let analyzer = ScriptAnalyzer::new();
    let script = "curl http://x\nsudo rm -rf /";
    let first = analyzer.analyze(ScriptLanguage::Shell, script);
    for _ in 0..5 {
      assert_eq!(analyzer.analyze(ScriptLanguage::Shell, script), first);
    }
  }
}
