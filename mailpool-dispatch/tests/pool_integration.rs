//! Integration tests for account selection, health and distribution

mod support;

use std::{collections::HashMap, time::Duration};

use mailpool_dispatch::{
    AccountPool, DispatchError, FallbackConfig, HealthCheckSummary, LimitsConfig, PoolConfig,
    Purpose, SelectionMode, SenderAccount, TransportError, time::MockClock,
};
use pretty_assertions::assert_eq;
use support::{bulk_accounts, church_catalog, fast_limits, pool, pool_with_clock, quarantine, recipients};

#[test]
fn test_rolling_hour_reset() {
    let clock = MockClock::shared();
    let limits = LimitsConfig {
        per_account_hourly: 3,
        ..fast_limits()
    };
    let pool = pool_with_clock(bulk_accounts(1), limits, clock.clone());
    let account = "no-reply1@example.org";

    for _ in 0..3 {
        assert!(pool.can_send(account));
        pool.record_attempt(account, true, None);
    }
    assert!(!pool.can_send(account));

    clock.advance(Duration::from_secs(59 * 60));
    assert!(!pool.can_send(account));

    clock.advance(Duration::from_secs(2 * 60));
    assert!(pool.can_send(account));
    assert_eq!(pool.get_health(account).unwrap().hourly_count, 0);
    assert_eq!(pool.get_health(account).unwrap().total_sent, 3);
}

#[test]
fn test_quarantine_threshold_and_sticky_unhealthy() {
    let pool = pool(bulk_accounts(2), fast_limits());
    let account = "no-reply1@example.org";
    let error = TransportError::Temporary("connection reset".to_string());

    assert!(!pool.record_attempt(account, false, Some(&error)));
    assert!(!pool.record_attempt(account, false, Some(&error)));
    assert!(pool.record_attempt(account, false, Some(&error)));
    assert!(!pool.can_send(account));

    // A success after quarantine resets the streak only
    pool.record_attempt(account, true, None);
    let health = pool.get_health(account).unwrap();
    assert!(!health.is_healthy);
    assert_eq!(health.consecutive_failures, 0);

    // Only the healthy account is offered
    assert_eq!(
        pool.list_usable_bulk_accounts().unwrap(),
        vec![SenderAccount::new("no-reply2@example.org", Purpose::Bulk, 1)]
    );

    pool.reset(account);
    assert!(pool.can_send(account));
}

#[test]
fn test_even_partition_over_catalog() {
    let pool = pool(church_catalog(), fast_limits());
    let k = pool.list_usable_bulk_accounts().unwrap().len();
    assert_eq!(k, 9);

    for r in [1, k, k + 1, 7 * k + 3] {
        let input = recipients(r);
        let plan = pool.distribute(&input).unwrap();

        let flattened: Vec<String> = plan
            .entries
            .iter()
            .flat_map(|e| e.recipients.iter().cloned())
            .collect();
        assert_eq!(flattened, input, "r={r}");

        let chunk = r.div_ceil(k);
        assert!(plan.entries.iter().all(|e| e.recipients.len() <= chunk));
        assert!(plan.len() <= k);
        assert!(plan.entries.iter().all(|e| e.account.purpose == Purpose::Bulk));
    }
}

#[test]
fn test_round_robin_fairness() {
    let pool = pool(bulk_accounts(10), fast_limits());
    let mut counts: HashMap<String, usize> = HashMap::new();

    for _ in 0..10_000 {
        *counts.entry(pool.select_for_bulk().unwrap().address).or_default() += 1;
    }

    assert_eq!(counts.len(), 10);
    for (address, count) in counts {
        assert_eq!(count, 1000, "{address}");
    }
}

#[test]
fn test_round_robin_prefers_priority_order() {
    let pool = pool(church_catalog(), fast_limits());

    let first_three: Vec<u32> = (0..3).map(|_| pool.select_for_bulk().unwrap().priority).collect();
    assert_eq!(first_three, [1, 1, 1]);

    let next_three: Vec<u32> = (0..3).map(|_| pool.select_for_bulk().unwrap().priority).collect();
    assert_eq!(next_three, [2, 2, 2]);
}

#[test]
fn test_auto_recovery_respects_quiescence() {
    let clock = MockClock::shared();
    let pool = pool_with_clock(bulk_accounts(3), fast_limits(), clock.clone());

    quarantine(&pool, "no-reply1@example.org");
    clock.advance(Duration::from_secs(2 * 3600));
    quarantine(&pool, "no-reply2@example.org");
    clock.advance(Duration::from_secs(10 * 60));

    let summary = pool.run_health_check_once();
    assert_eq!(
        summary,
        HealthCheckSummary {
            healthy: 2,
            unhealthy: 1,
            total: 3
        }
    );

    let recovered = pool.get_health("no-reply1@example.org").unwrap();
    assert!(recovered.is_healthy);
    assert_eq!(recovered.consecutive_failures, 0);
    assert_eq!(recovered.hourly_count, 0);
    assert!(!pool.get_health("no-reply2@example.org").unwrap().is_healthy);
}

#[test]
fn test_degraded_mode_uses_whole_bulk_tier() {
    let pool = pool(church_catalog(), fast_limits());
    for i in 1..=9 {
        quarantine(&pool, &format!("no-reply{i}@example.org"));
    }

    let usable = pool.usable_pool().unwrap();
    assert_eq!(usable.mode, SelectionMode::Degraded);
    assert_eq!(usable.accounts.len(), 9);

    let plan = pool.distribute(&recipients(20)).unwrap();
    assert_eq!(plan.mode, SelectionMode::Degraded);
    assert_eq!(plan.total_recipients(), 20);

    assert_eq!(pool.select_for_bulk().unwrap().address, "no-reply1@example.org");
}

#[test]
fn test_thirteen_recipients_three_accounts() {
    let pool = pool(bulk_accounts(3), LimitsConfig::default());
    let plan = pool.distribute(&recipients(13)).unwrap();

    let shape: Vec<(String, usize, Duration)> = plan
        .entries
        .iter()
        .map(|e| (e.account.address.clone(), e.recipients.len(), e.estimated_duration))
        .collect();

    assert_eq!(
        shape,
        vec![
            ("no-reply1@example.org".to_string(), 5, Duration::from_millis(500)),
            ("no-reply2@example.org".to_string(), 5, Duration::from_millis(500)),
            ("no-reply3@example.org".to_string(), 3, Duration::from_millis(300)),
        ]
    );
}

#[test]
fn test_transactional_selection() {
    let pool = pool(church_catalog(), fast_limits());

    assert_eq!(pool.select_for_purpose(Purpose::Events).unwrap().address, "events@example.org");

    quarantine(&pool, "events@example.org");
    let account = pool.select_for_purpose(Purpose::Events).unwrap();
    assert_eq!(account.purpose, Purpose::Bulk);
    assert_eq!(account.priority, 1);
}

#[test]
fn test_fallback_mode() {
    let pool = AccountPool::new(PoolConfig {
        accounts: church_catalog(),
        fallback: FallbackConfig {
            enabled: true,
            address: Some("church.relay@gmail.example".to_string()),
            credential: Some("GMAIL_APP_PASSWORD".to_string()),
        },
        limits: fast_limits(),
    })
    .unwrap();

    for purpose in [Purpose::Admin, Purpose::Bulk, Purpose::System] {
        assert_eq!(
            pool.select_for_purpose(purpose).unwrap().address,
            "church.relay@gmail.example"
        );
    }

    let plan = pool.distribute(&recipients(40)).unwrap();
    assert_eq!(plan.mode, SelectionMode::Fallback);
    assert_eq!(plan.len(), 1);

    // The fallback account is monitored alongside the catalog
    assert_eq!(pool.run_health_check_once().total, 14);
}

#[test]
fn test_configuration_errors() {
    let err = AccountPool::new(PoolConfig {
        accounts: vec![SenderAccount::new("admin@example.org", Purpose::Admin, 1)],
        ..PoolConfig::default()
    })
    .unwrap_err();
    assert!(err.is_configuration());

    let err = AccountPool::new(PoolConfig {
        accounts: bulk_accounts(2),
        fallback: FallbackConfig {
            enabled: true,
            ..FallbackConfig::default()
        },
        limits: fast_limits(),
    })
    .unwrap_err();
    assert!(matches!(err, DispatchError::Configuration(_)));
}

#[test]
fn test_health_report_after_traffic() {
    let pool = pool(bulk_accounts(2), fast_limits());
    pool.record_attempt("no-reply1@example.org", true, None);
    quarantine(&pool, "no-reply2@example.org");

    let report = pool.health_report(true);
    assert_eq!(report.accounts.total, 2);
    assert_eq!(report.accounts.healthy, 1);
    assert_eq!(report.statistics.hourly_capacity, 500);
    assert!(report.system.can_send);
    assert_eq!(report.recent_errors.as_ref().map(Vec::len), Some(3));

    assert_eq!(pool.reset_all(), 2);
    assert_eq!(pool.health_report(false).accounts.healthy, 2);
}
