use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use qgate_core::{
    run_with_self_healing, run_with_self_healing_async, HealingPolicy, InMemoryMetrics,
    SelfHealingExecutor,
};

#[test]
fn fail_once_then_succeed_is_healed() {
    let calls = Cell::new(0u32);
    let res = run_with_self_healing(
        || {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Err("transient")
            } else {
                Ok("ok")
            }
        },
        3,
        0,
    );

    assert!(res.ok);
    assert_eq!(res.attempts, 2);
    assert!(res.healed);
    assert_eq!(res.result, Some("ok"));
    assert!(res.last_error.is_empty());
}

#[test]
fn first_attempt_success_is_not_healed() {
    let res = run_with_self_healing(|| Ok::<_, String>(42), 3, 0);
    assert!(res.ok);
    assert_eq!(res.attempts, 1);
    assert!(!res.healed);
}

#[test]
fn exhaustion_reports_last_error_without_panicking() {
    let calls = Cell::new(0u32);
    let res = run_with_self_healing(
        || -> Result<(), String> {
            calls.set(calls.get() + 1);
            Err(format!("failure #{}", calls.get()))
        },
        3,
        0,
    );

    assert!(!res.ok);
    assert!(!res.healed);
    assert_eq!(res.attempts, 3);
    assert_eq!(calls.get(), 3);
    assert_eq!(res.last_error, "failure #3");
    assert_eq!(res.into_result(), Err("failure #3".to_string()));
}

#[test]
fn zero_budget_runs_exactly_once() {
    let calls = Cell::new(0u32);
    let res = run_with_self_healing(
        || -> Result<(), &str> {
            calls.set(calls.get() + 1);
            Err("nope")
        },
        0,
        0,
    );
    assert_eq!(calls.get(), 1);
    assert_eq!(res.attempts, 1);
}

#[test]
fn metrics_sink_sees_attempts_and_healing() {
    let metrics = Arc::new(InMemoryMetrics::new());
    let exec = SelfHealingExecutor::new(HealingPolicy::new(4, 0)).with_metrics(metrics.clone());

    let calls = Cell::new(0u32);
    let res = exec.run(|| {
        calls.set(calls.get() + 1);
        if calls.get() < 3 {
            Err("flap")
        } else {
            Ok(())
        }
    });

    assert!(res.healed);
    assert_eq!(metrics.counter("self_healing.attempts"), 3);
    assert_eq!(metrics.counter("self_healing.failed_attempts"), 2);
    assert_eq!(metrics.counter("self_healing.healed"), 1);
    assert_eq!(metrics.counter("self_healing.exhausted"), 0);
}

#[tokio::test(start_paused = true)]
async fn async_backoff_waits_between_attempts_only() {
    let calls = Arc::new(AtomicU32::new(0));
    let started = tokio::time::Instant::now();

    let res = run_with_self_healing_async(
        || {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("attempt {n} failed"))
                } else {
                    Ok(n)
                }
            }
        },
        3,
        500,
    )
    .await;

    assert!(res.ok);
    assert_eq!(res.attempts, 3);
    assert_eq!(res.result, Some(3));
    // two backoffs between three attempts
    assert_eq!(started.elapsed(), std::time::Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn async_exhaustion_skips_trailing_backoff() {
    let started = tokio::time::Instant::now();
    let res = run_with_self_healing_async(
        || async { Err::<(), _>("down") },
        2,
        300,
    )
    .await;

    assert!(!res.ok);
    assert_eq!(res.attempts, 2);
    assert_eq!(res.last_error, "down");
    assert_eq!(started.elapsed(), std::time::Duration::from_millis(300));
}
