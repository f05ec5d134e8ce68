//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT call sleep methods.
//! Replay pacing and dialogue reveals run on `tokio::time::interval` ticks
//! inside the app's select loop.

use architectural_enforcement::{scan, PRODUCTION_DIRS};

fn is_sleep_call(code: &str) -> bool {
    code.contains("::sleep(") || code.contains(".sleep(") || code.contains("sleep_until(")
}

#[test]
fn test_no_sleep_in_production_code() {
    let violations = scan(&PRODUCTION_DIRS, is_sleep_call);

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ Use tokio::time::interval() in a select! branch instead");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

#[test]
fn test_sleep_detection() {
    assert!(is_sleep_call("tokio::time::sleep(Duration::from_millis(5)).await;"));
    assert!(is_sleep_call("std::thread::sleep(d);"));
    assert!(!is_sleep_call("let mut tick = tokio::time::interval(period);"));
}
