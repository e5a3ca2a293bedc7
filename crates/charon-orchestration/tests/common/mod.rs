//! Mock tool scripts shared by the integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Mock of the tool's command-line contract
///
/// Every invocation is appended to `calls.log` next to the script.
pub const MOCK_TOOL: &str = r#"
dir="$(dirname "$0")"
echo "$@" >> "$dir/calls.log"
verb="$1"
sub="$2"
out=""
input=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift ;;
    --input) input="$2"; shift ;;
  esac
  shift
done
case "$verb $sub" in
  "VERSION "*) echo "1.2.3" ;;
  "DATA FIND") printf '{"Id":"Sword","Name":"Excalibur"}' > "$out" ;;
  "DATA CREATE") cat "$input" > "$out" ;;
  "DATA LIST") : > "$out" ;;
  "DATA DELETE") echo "Document 'Ghost' not found" >&2; exit 3 ;;
  "DATA IMPORT") cp "$input" "$dir/imported.json" ;;
  "DATA VALIDATE") printf '{"records":[]}' > "$out" ;;
  "DATA BACKUP") echo backup > "$out" ;;
  "GENERATE CSHARPCODE") : ;;
  "INIT "*) : ;;
  "SERVER START") exec sleep 30 >/dev/null 2>&1 ;;
  *) exit 1 ;;
esac
"#;

/// Write an executable `sh` script named `name` into `dir`
#[cfg(unix)]
pub fn mock_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Invocations recorded by [`MOCK_TOOL`]
pub fn calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}
