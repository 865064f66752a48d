//! Per-language on-disk program assembly.

use operon_config::ScriptLanguage;

/// Name of the JSON payload file written into the workspace.
pub(crate) const INPUT_FILE: &str = "input.json";

/// Python wrapper. The prelude binds `input` and `parameters` from the
/// payload file and redirects `print` output to stderr so stdout stays a
/// clean result channel; the postlude serialises whatever the script left
/// in `result`.
const PYTHON_PRELUDE: &str = r#"import json as _operon_json
import sys as _operon_sys

with open("input.json", "r", encoding="utf-8") as _operon_file:
    _operon_payload = _operon_json.load(_operon_file)

input = _operon_payload["input"]
parameters = _operon_payload["parameters"]
result = None

_operon_stdout = _operon_sys.stdout
_operon_sys.stdout = _operon_sys.stderr
"#;

const PYTHON_POSTLUDE: &str = r#"
_operon_sys.stdout = _operon_stdout
print(_operon_json.dumps(result))
"#;

/// Shell wrapper. Scripts run under `set -eu` and report by printing a
/// single JSON document to stdout; `$INPUT_FILE` (exported by the runner)
/// names the payload file. Anything written to stderr becomes log lines.
const SHELL_HEADER: &str = "#!/bin/sh\nset -eu\n";

/// Which subprocess protocol a [`ProcessRunner`](crate::ProcessRunner)
/// speaks. One variant per out-of-process language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Harness {
  Python,
  Shell,
}

impl Harness {
  pub(crate) fn language(self) -> ScriptLanguage {
    match self {
      Harness::Python => ScriptLanguage::Python,
      Harness::Shell => ScriptLanguage::Shell,
    }
  }

  /// Interpreter binary the child is spawned with. Resolved through the
  /// restricted `PATH` for python, absolute for sh.
  pub(crate) fn interpreter(self) -> &'static str {
    match self {
      Harness::Python => "python3",
      Harness::Shell => "/bin/sh",
    }
  }

  /// File name the assembled program is written under.
  pub(crate) fn file_name(self) -> &'static str {
    match self {
      Harness::Python => "element.py",
      Harness::Shell => "element.sh",
    }
  }

  /// Wraps the user script in the language's invocation protocol.
  pub(crate) fn program(self, script: &str) -> String {
    match self {
      Harness::Python => {
        let mut program =
          String::with_capacity(PYTHON_PRELUDE.len() + script.len() + PYTHON_POSTLUDE.len() + 2);
        program.push_str(PYTHON_PRELUDE);
        program.push('\n');
        program.push_str(script);
        program.push('\n');
        program.push_str(PYTHON_POSTLUDE);
        program
      }
      Harness::Shell => {
        let mut program = String::with_capacity(SHELL_HEADER.len() + script.len() + 2);
        program.push_str(SHELL_HEADER);
        program.push('\n');
        program.push_str(script);
        program.push('\n');
        program
      }
    }
  }
}
