//! Integration tests for routing, lifecycle accounting and the monitor tick.
//!
//! Scenarios mirror how a caller drives the router:
//! 1. Selection over a healthy pool, preferred targets, empty registry
//! 2. Degraded components losing traffic to healthier peers
//! 3. Congestion and stalled-request reaping on a tick
//! 4. Emergency recovery when every component is withdrawn
//! 5. Repair history ordering and bounds

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_healing_router::healing::{HealthPolicy, IssueType};
use tokio_healing_router::{Component, RouterConfig, SelfHealingRouter, SystemStatus};

/// Helper: the three-component pool used throughout (capacity 35).
fn pool() -> SelfHealingRouter {
    let router = SelfHealingRouter::new(RouterConfig::default());
    router.register_component(Component::new("comp1", "http://10.0.0.1", 3, 10));
    router.register_component(Component::new("comp2", "http://10.0.0.2", 2, 5));
    router.register_component(Component::new("comp3", "http://10.0.0.3", 1, 20));
    router
}

fn healthy_ids(router: &SelfHealingRouter) -> Vec<String> {
    let policy = *router.policy();
    router
        .components()
        .into_iter()
        .filter(|c| c.is_healthy(&policy))
        .map(|c| c.id)
        .collect()
}

// ─── Selection ────────────────────────────────────────────────────────────

#[test]
fn test_healthy_pool_routes_to_registered_component() {
    let router = pool();
    let route = router.route_request("summarise", None);
    assert!(["comp1", "comp2", "comp3"].contains(&route.component_id.as_str()));
    assert!(route.confidence > 0.0);
    assert!(!route.fallback_used);
}

#[test]
fn test_preferred_healthy_component_wins_outright() {
    let router = pool();
    let route = router.route_request("summarise", Some("comp2"));
    assert_eq!(route.component_id, "comp2");
    assert!((route.confidence - 0.9).abs() < f64::EPSILON);
    assert!(!route.fallback_used);
}

#[test]
fn test_empty_registry_returns_fallback() {
    let router = SelfHealingRouter::new(RouterConfig::default());
    let route = router.route_request("anything", None);
    assert_eq!(route.component_id, "");
    assert!(route.confidence.abs() < f64::EPSILON);
    assert!(route.fallback_used);
}

#[test]
fn test_degraded_component_never_selected_over_healthier_peer() {
    let router = pool();
    router.register_component(Component {
        failure_count: 5,
        health_score: 0.2,
        ..Component::new("comp1", "http://10.0.0.1", 3, 10)
    });
    for i in 0..20 {
        let route = router.route_request(&format!("work-{i}"), None);
        assert_ne!(route.component_id, "comp1");
    }
    let preferred = router.route_request("pinned", Some("comp1"));
    assert_ne!(preferred.component_id, "comp1");
}

#[test]
fn test_selection_stays_inside_healthy_set_under_churn() {
    let router = pool();
    for i in 0..60 {
        let request_id = format!("req-{i}");
        let candidates = healthy_ids(&router);
        let route = router.route_request(&request_id, None);
        if !candidates.is_empty() {
            assert!(candidates.contains(&route.component_id));
        }
        router.record_request_start_on(&request_id, &route.component_id);
        // Every third request fails so health keeps moving.
        router.record_request_end(
            &request_id,
            &route.component_id,
            i % 3 != 0,
            Duration::from_millis(10),
        );
    }
}

#[test]
fn test_inactive_implies_unhealthy() {
    let router = pool();
    router.deactivate_component("comp2");
    let policy: HealthPolicy = *router.policy();
    for c in router.components() {
        if c.is_healthy(&policy) {
            assert!(c.is_active);
        }
    }
    assert!(!healthy_ids(&router).contains(&"comp2".to_string()));
}

// ─── Accounting ───────────────────────────────────────────────────────────

#[test]
fn test_success_raises_health_above_nominal() {
    let router = pool();
    router.record_request_start_on("req-1", "comp3");
    router.record_request_end("req-1", "comp3", true, Duration::from_millis(25));

    let comp = router.component("comp3").expect("comp3 registered");
    assert_eq!(comp.success_count, 1);
    assert!(comp.health_score > 1.0);
    assert_eq!(router.in_flight("comp3"), Some(0));
    assert_eq!(router.active_request_count(), 0);
}

#[test]
fn test_repeated_failures_cross_the_gate() {
    let router = pool();
    for i in 0..5 {
        router.record_request_end(&format!("r{i}"), "comp1", false, Duration::from_millis(1));
    }
    assert!(!healthy_ids(&router).contains(&"comp1".to_string()));
    let metrics = router.get_metrics();
    assert_eq!(metrics.healthy_components, 2);
    assert_eq!(metrics.response_times.count, 5);
}

// ─── Monitor tick ─────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fifty_concurrent_requests_flag_congestion() {
    let router = Arc::new(pool());
    let mut set = tokio::task::JoinSet::new();
    for i in 0..50 {
        let router = Arc::clone(&router);
        set.spawn(async move { router.record_request_start(format!("req-{i}")) });
    }
    while set.join_next().await.is_some() {}
    assert_eq!(router.active_request_count(), 50);

    let report = router.run_health_check().await;
    assert!(report.congested);
    assert_eq!(router.system_status(), SystemStatus::Congested);

    let latest = router.get_repair_history(1);
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].issue, IssueType::Congestion);
}

#[tokio::test(start_paused = true)]
async fn test_two_stale_requests_are_reaped_in_one_tick() {
    let router = pool();
    router.record_request_start("stalled-a");
    router.record_request_start("stalled-b");
    tokio::time::advance(Duration::from_secs(35)).await;

    let report = router.run_health_check().await;
    assert_eq!(report.timed_out, 2);
    assert_eq!(router.active_request_count(), 0);

    let history = router.get_repair_history(10);
    let timeouts = history
        .iter()
        .filter(|h| h.issue == IssueType::Timeout)
        .count();
    assert_eq!(timeouts, 2);
    assert_eq!(router.system_status(), SystemStatus::Repairing);
}

#[tokio::test]
async fn test_quiet_pool_is_flowing() {
    let router = pool();
    router.record_request_start("fresh");
    let report = router.run_health_check().await;
    assert_eq!(report.status, SystemStatus::Flowing);
    assert!(router.get_status_message().contains("FLOWING"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_snapshots_stay_consistent_while_monitor_runs() {
    let config = RouterConfig {
        health_check_interval_secs: 0.002,
        ..RouterConfig::default()
    };
    let penalty = config.penalty_factor;
    let router = Arc::new(SelfHealingRouter::new(config));
    router.register_component(Component::new("comp1", "", 3, 10));
    router.register_component(Component::new("comp2", "", 2, 5));
    router.register_component(Component::new("comp3", "", 1, 20));
    router.start().expect("start monitor");

    let done = Arc::new(AtomicBool::new(false));
    let sampler = {
        let router = Arc::clone(&router);
        let done = Arc::clone(&done);
        tokio::spawn(async move {
            let mut samples = 0usize;
            while !done.load(Ordering::Acquire) {
                let snapshot = router.get_metrics();
                let failures: u64 = snapshot
                    .components
                    .iter()
                    .map(|c| u64::from(c.failure_count))
                    .sum();
                // Every outcome bumps a counter and records a latency under one lock.
                assert_eq!(failures, snapshot.response_times.total_recorded);
                for c in &snapshot.components {
                    assert_eq!(c.success_count, 0);
                    let expected = penalty.powi(i32::try_from(c.failure_count).unwrap_or(i32::MAX));
                    assert!(
                        (c.health_score - expected).abs() <= expected * 1e-9,
                        "{} health {} after {} failures",
                        c.id,
                        c.health_score,
                        c.failure_count
                    );
                    if c.is_healthy {
                        assert!(c.is_active);
                    }
                }
                samples += 1;
                tokio::task::yield_now().await;
            }
            samples
        })
    };

    let mut workers = tokio::task::JoinSet::new();
    for w in 0..4 {
        let router = Arc::clone(&router);
        workers.spawn(async move {
            for i in 0..150 {
                let request_id = format!("w{w}-r{i}");
                let route = router.route_request(&request_id, None);
                router.record_request_start_on(&request_id, &route.component_id);
                tokio::task::yield_now().await;
                router.record_request_end(
                    &request_id,
                    &route.component_id,
                    false,
                    Duration::from_micros(50),
                );
            }
        });
    }
    while let Some(joined) = workers.join_next().await {
        assert!(joined.is_ok());
    }
    done.store(true, Ordering::Release);
    let samples = sampler.await.expect("sampler must not panic");
    router.stop().await;

    assert!(samples > 0);
    let final_metrics = router.get_metrics();
    assert_eq!(final_metrics.response_times.total_recorded, 600);
    assert_eq!(final_metrics.active_requests, 0);
    assert!(final_metrics.components.iter().all(|c| c.in_flight == 0));
}

// ─── Emergency recovery ───────────────────────────────────────────────────

#[test]
fn test_all_deactivated_triggers_emergency_recovery() {
    let router = pool();
    for id in ["comp1", "comp2", "comp3"] {
        assert!(router.deactivate_component(id));
    }

    let route = router.route_request("rescue", None);
    assert!(!route.component_id.is_empty());
    assert!(router.components().iter().all(|c| c.is_active));

    let latest = &router.get_repair_history(1)[0];
    assert_eq!(latest.issue, IssueType::Emergency);
    assert!(latest.message.to_lowercase().contains("emergency recovery"));
}

// ─── Repair history ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_repair_history_bounded_and_newest_first() {
    let router = pool();
    for i in 0..4 {
        router.record_request_start(format!("stalled-{i}"));
        tokio::time::advance(Duration::from_secs(31)).await;
        let _ = router.run_health_check().await;
    }
    assert_eq!(router.repair_history_len(), 4);

    assert_eq!(router.get_repair_history(2).len(), 2);
    assert!(router.get_repair_history(0).is_empty());

    let full = router.get_repair_history(router.repair_history_len());
    assert_eq!(full.len(), 4);
    assert!(full[0].message.contains("stalled-3"));
    assert!(full[3].message.contains("stalled-0"));
    assert_eq!(router.get_repair_history(100).len(), 4);
}

#[test]
fn test_repair_log_evicts_oldest_at_capacity() {
    let router = SelfHealingRouter::new(RouterConfig {
        repair_log_capacity: 2,
        ..RouterConfig::default()
    });
    router.register_component(Component::new("only", "", 1, 1));
    for _ in 0..3 {
        router.deactivate_component("only");
        let _ = router.route_request("w", None);
    }
    assert_eq!(router.repair_history_len(), 2);
    assert_eq!(router.get_metrics().total_repairs, 3);
}
