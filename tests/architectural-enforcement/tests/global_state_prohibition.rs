//! Integration Test: Global State Prohibition
//!
//! **Policy**: The observer core keeps all state in the `Observer` value.
//! Module-level mutable state (statics, thread locals, lazy cells) is not
//! allowed in `observer/core/src`.

use architectural_enforcement::scan;

fn is_global_state(code: &str) -> bool {
    let trimmed = code.trim_start();
    trimmed.starts_with("static ")
        || trimmed.starts_with("pub static ")
        || trimmed.starts_with("pub(crate) static ")
        || code.contains("static mut ")
        || code.contains("thread_local!")
        || code.contains("lazy_static!")
        || code.contains("OnceLock")
        || code.contains("OnceCell")
}

#[test]
fn test_no_global_state_in_core() {
    let violations = scan(&["observer/core/src"], is_global_state);

    if !violations.is_empty() {
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        panic!(
            "\nFound {} global state declaration(s) in observer-core.",
            violations.len()
        );
    }
}

#[test]
fn test_global_state_detection() {
    assert!(is_global_state("static COUNTER: AtomicUsize = AtomicUsize::new(0);"));
    assert!(is_global_state("    thread_local! {"));
    assert!(is_global_state("pub static CONFIG: OnceLock<Config> = OnceLock::new();"));
    assert!(!is_global_state("pub fn label(self) -> &'static str {"));
    assert!(!is_global_state("pub const HISTORY_CAPACITY: usize = 3;"));
}
