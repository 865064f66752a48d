use std::sync::LazyLock;

use operon_config::ScriptLanguage;
use regex::RegexSet;

use crate::verdict::{Violation, ViolationCategory};

/// One deny rule: a pattern plus the violation it produces on a match.
struct Rule {
  pattern: String,
  category: ViolationCategory,
  detail: String,
}

impl Rule {
  /// A bare identifier reference, word-boundary matched so `loader` does
  /// not trip the `load` rule.
  fn reference(token: &str, category: ViolationCategory) -> Self {
    Self {
      pattern: format!(r"\b{}\b", regex::escape(token)),
      category,
      detail: format!("forbidden reference '{token}'"),
    }
  }

  /// A module import, matching both `import x` and `from x import ...`.
  fn import(module: &str, category: ViolationCategory) -> Self {
    Self {
      pattern: format!(r"\b(?:import|from)\s+{}\b", regex::escape(module)),
      category,
      detail: format!("forbidden import '{module}'"),
    }
  }

  /// A function call, requiring the opening parenthesis so `evaluate(` does
  /// not trip the `eval` rule.
  fn call(name: &str, category: ViolationCategory) -> Self {
    Self {
      pattern: format!(r"\b{}\s*\(", regex::escape(name)),
      category,
      detail: format!("forbidden call '{name}'"),
    }
  }

  /// A shell command name, word-boundary matched.
  fn command(name: &str, category: ViolationCategory) -> Self {
    Self {
      pattern: format!(r"\b{}\b", regex::escape(name)),
      category,
      detail: format!("dangerous command '{name}'"),
    }
  }

  /// A raw pattern with a hand-written description.
  fn pattern(pattern: &str, category: ViolationCategory, detail: &str) -> Self {
    Self {
      pattern: pattern.to_string(),
      category,
      detail: detail.to_string(),
    }
  }
}

/// The compiled deny-list for one language.
///
/// Rules are matched as a set in one pass; violations come back in rule
/// declaration order, so verdicts are deterministic for a given script.
pub struct LanguagePolicy {
  rules: Vec<Rule>,
  matcher: RegexSet,
}

impl LanguagePolicy {
  fn new(rules: Vec<Rule>) -> Self {
    let matcher = RegexSet::new(rules.iter().map(|r| r.pattern.as_str()))
      .expect("deny-list patterns compile");
    Self { rules, matcher }
  }

  /// Scan a script against every rule; one violation per matched rule.
  pub fn scan(&self, script: &str) -> Vec<Violation> {
    self
      .matcher
      .matches(script)
      .into_iter()
      .map(|index| {
        let rule = &self.rules[index];
        Violation::new(rule.category, rule.detail.clone())
      })
      .collect()
  }
}

/// Lua runs in-process, so the deny-list covers everything that could reach
/// outside the restricted evaluation environment: the `os` and `io`
/// libraries, chunk loading, and environment/metatable introspection.
static LUA: LazyLock<LanguagePolicy> = LazyLock::new(|| {
  use ViolationCategory::*;
  LanguagePolicy::new(vec![
    Rule::reference("os", ProcessControl),
    Rule::reference("io", FileIo),
    Rule::reference("dofile", FileIo),
    Rule::reference("loadfile", FileIo),
    Rule::reference("load", DynamicEval),
    Rule::reference("loadstring", DynamicEval),
    Rule::reference("require", DynamicEval),
    Rule::reference("package", DynamicEval),
    Rule::reference("debug", EnvironmentAccess),
    Rule::reference("getfenv", EnvironmentAccess),
    Rule::reference("setfenv", EnvironmentAccess),
    Rule::reference("collectgarbage", EnvironmentAccess),
    Rule::reference("getmetatable", EnvironmentAccess),
    Rule::reference("setmetatable", EnvironmentAccess),
    Rule::reference("rawget", EnvironmentAccess),
    Rule::reference("rawset", EnvironmentAccess),
  ])
});

static PYTHON: LazyLock<LanguagePolicy> = LazyLock::new(|| {
  use ViolationCategory::*;
  LanguagePolicy::new(vec![
    Rule::import("os", ProcessControl),
    Rule::import("sys", ProcessControl),
    Rule::import("subprocess", ProcessControl),
    Rule::import("socket", NetworkEgress),
    Rule::import("shutil", FileIo),
    Rule::import("ctypes", DynamicEval),
    Rule::import("importlib", DynamicEval),
    Rule::call("__import__", DynamicEval),
    Rule::call("exec", DynamicEval),
    Rule::call("eval", DynamicEval),
    Rule::call("compile", DynamicEval),
    Rule::call("open", FileIo),
    Rule::call("input", EnvironmentAccess),
    Rule::call("vars", EnvironmentAccess),
    Rule::call("locals", EnvironmentAccess),
    Rule::call("globals", EnvironmentAccess),
    Rule::call("getattr", EnvironmentAccess),
    Rule::call("setattr", EnvironmentAccess),
    Rule::call("delattr", EnvironmentAccess),
    Rule::call("hasattr", EnvironmentAccess),
    Rule::pattern(r"__\w+__", EnvironmentAccess, "suspicious dunder access"),
  ])
});

static SHELL: LazyLock<LanguagePolicy> = LazyLock::new(|| {
  use ViolationCategory::*;
  LanguagePolicy::new(vec![
    Rule::command("rm", DestructiveCommand),
    Rule::command("rmdir", DestructiveCommand),
    Rule::command("mkfs", DestructiveCommand),
    Rule::command("dd", DestructiveCommand),
    Rule::command("shred", DestructiveCommand),
    Rule::command("sudo", PrivilegeEscalation),
    Rule::command("su", PrivilegeEscalation),
    Rule::command("chown", PrivilegeEscalation),
    Rule::command("chmod", PrivilegeEscalation),
    Rule::command("curl", NetworkEgress),
    Rule::command("wget", NetworkEgress),
    Rule::command("nc", NetworkEgress),
    Rule::command("ssh", NetworkEgress),
    Rule::command("scp", NetworkEgress),
    Rule::command("eval", DynamicEval),
    Rule::command("nohup", ProcessControl),
  ])
});

/// The deny-list policy for a language.
pub fn policy_for(language: ScriptLanguage) -> &'static LanguagePolicy {
  match language {
    ScriptLanguage::Lua => &LUA,
    ScriptLanguage::Python => &PYTHON,
    ScriptLanguage::Shell => &SHELL,
  }
}
