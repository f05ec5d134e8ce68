//! Architectural Enforcement Integration Tests
//!
//! Source scans that keep the workspace honest:
//! - No sleep() calls in production code (wait on events or intervals)
//! - No global mutable state in the core (the observer owns everything)
//!
//! This crate only holds the scanning helpers; the rules live in `tests/`.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source trees checked by every rule
pub const PRODUCTION_DIRS: [&str; 2] = ["observer/core/src", "tui/src"];

/// A rule violation at a source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: PathBuf,
    pub line: usize,
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.line, self.text)
    }
}

/// Root of the workspace
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// All `.rs` files below `dir` (relative to the workspace root)
pub fn rust_sources(dir: &str) -> Vec<PathBuf> {
    let root = workspace_root().join(dir);
    if !root.exists() {
        return Vec::new();
    }

    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.into_path())
        .collect()
}

/// Production lines of a source file as `(line_number, code)`
///
/// Comments are cut off and everything from the first `#[cfg(test)]` on is
/// dropped, since test modules sit at the bottom of each file.
pub fn production_lines(content: &str) -> Vec<(usize, &str)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| line.trim() != "#[cfg(test)]")
        .map(|(idx, line)| (idx + 1, line.split("//").next().unwrap_or(line)))
        .filter(|(_, code)| !code.trim().is_empty())
        .collect()
}

/// Scan the production trees for lines matching `is_violation`
pub fn scan(dirs: &[&str], is_violation: impl Fn(&str) -> bool) -> Vec<Violation> {
    let mut violations = Vec::new();

    for dir in dirs {
        for path in rust_sources(dir) {
            let content = match fs::read_to_string(&path) {
                Ok(c) => c,
                Err(_) => continue,
            };
            for (line, code) in production_lines(&content) {
                if is_violation(code) {
                    violations.push(Violation {
                        path: path.clone(),
                        line,
                        text: code.trim().to_string(),
                    });
                }
            }
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_strip_comments_and_tests() {
        let source = "fn a() {} // sleep(1)\n\n#[cfg(test)]\nmod tests { fn b() { sleep(1) } }\n";
        let lines = production_lines(source);
        assert_eq!(lines, vec![(1, "fn a() {} ")]);
    }

    #[test]
    fn test_workspace_root_holds_core() {
        assert!(!rust_sources("observer/core/src").is_empty());
    }
}
