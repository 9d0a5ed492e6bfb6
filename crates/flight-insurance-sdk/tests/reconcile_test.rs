//! Reconciliation passes against an in-memory ledger and cache

use chrono::{TimeZone, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use flight_insurance_sdk::{
    classify, CleanupStatus, ContractConfig, Divergence, MemorySlot, MockExecutor, MockLedger,
    PolicyError, PolicyRecord, PolicyService, PoolSnapshot, RecordStore, RepairOptions,
    Verification,
};

fn id(n: u32) -> String {
    format!("0x{:064x}", n)
}

fn policy_type() -> String {
    ContractConfig::default().policy_type()
}

fn service(ledger: Arc<MockLedger>, local: &[String]) -> (PolicyService, RecordStore) {
    let store = RecordStore::new(Arc::new(MemorySlot::new()));
    let records: Vec<PolicyRecord> = local
        .iter()
        .map(|id| PolicyRecord::placeholder(id.clone(), Utc::now()))
        .collect();
    store.save(&records).unwrap();

    let service = PolicyService::new(ContractConfig::default(), ledger, store.clone());
    (service, store)
}

#[tokio::test]
async fn test_pass_is_idempotent_once_applied() {
    let (p1, p2, p3, p4, p5) = (id(1), id(2), id(3), id(4), id(5));
    let ledger = Arc::new(
        MockLedger::new()
            .with_object(p1.clone(), policy_type())
            .with_object(p2.clone(), policy_type())
            .with_object(p5.clone(), policy_type())
            .with_pool(vec![p1.clone(), p2.clone(), p3.clone()], 10),
    );
    // p4 dead and unpooled, p5 live and unpooled
    let (service, store) = service(ledger.clone(), &[p1.clone(), p4.clone(), p5.clone()]);

    let first = service
        .reconcile_and_repair(RepairOptions::apply_only())
        .await
        .unwrap();
    assert_eq!(first.plan.to_add.len(), 1);
    assert_eq!(first.plan.to_add[0].policy_id, p2);
    assert_eq!(first.plan.to_remove, BTreeSet::from([p4.clone()]));
    assert_eq!(first.plan.corrupted_for_cleanup, BTreeSet::from([p3.clone()]));
    assert_eq!(first.plan.ghosts, BTreeSet::from([p5.clone()]));
    assert_eq!(first.applied.unwrap().added, 1);
    assert_eq!(first.applied.unwrap().removed, 1);

    let second = service
        .reconcile_and_repair(RepairOptions::apply_only())
        .await
        .unwrap();
    assert!(second.plan.to_add.is_empty());
    assert!(second.plan.to_remove.is_empty());
    // Still listed until a cleanup transaction lands
    assert_eq!(second.plan.corrupted_for_cleanup, BTreeSet::from([p3.clone()]));

    ledger.set_pool(vec![p1.clone(), p2.clone()], 10);
    let third = service
        .reconcile_and_repair(RepairOptions::apply_only())
        .await
        .unwrap();
    assert!(third.plan.is_empty());
    assert_eq!(third.plan.count(Divergence::Consistent), 2);
    assert_eq!(third.plan.ghosts, BTreeSet::from([p5.clone()]));

    let cached: BTreeSet<String> = store.ids().into_iter().collect();
    assert_eq!(cached, BTreeSet::from([p1, p2, p5]));
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let p1 = id(1);
    let ledger = Arc::new(MockLedger::new());
    let slot = Arc::new(MemorySlot::new());
    let store = RecordStore::new(slot.clone());
    store
        .save(&[PolicyRecord::placeholder(p1.clone(), Utc::now())])
        .unwrap();
    let service = PolicyService::new(ContractConfig::default(), ledger, store.clone());
    let writes = slot.write_count();

    let report = service
        .reconcile_and_repair(RepairOptions::dry_run())
        .await
        .unwrap();

    assert_eq!(report.plan.to_remove, BTreeSet::from([p1.clone()]));
    assert!(report.applied.is_none());
    assert_eq!(slot.write_count(), writes);
    assert!(store.contains(&p1));
}

#[tokio::test]
async fn test_unreadable_pool_yields_empty_plan() {
    let p1 = id(1);
    let ledger = Arc::new(MockLedger::new());
    ledger.set_offline(true);
    let (service, store) = service(ledger, &[p1.clone()]);

    let report = service
        .reconcile_and_repair(RepairOptions::full())
        .await
        .unwrap();

    assert!(report.plan.is_empty());
    assert!(report.plan.classification.is_empty());
    assert!(report.pool_read_error.is_some());
    assert!(report.summary().starts_with("Pool unreadable"));
    assert!(store.contains(&p1));
}

#[tokio::test]
async fn test_unreachable_pool_member_is_left_alone() {
    let p1 = id(1);
    let ledger = Arc::new(
        MockLedger::new()
            .with_failing(p1.clone())
            .with_pool(vec![p1.clone()], 0),
    );
    let (service, _) = service(ledger, &[]);

    let report = service
        .reconcile_and_repair(RepairOptions::dry_run())
        .await
        .unwrap();
    assert!(report.plan.to_add.is_empty());
    assert!(report.plan.corrupted_for_cleanup.is_empty());
    assert_eq!(report.plan.classification[&p1], Divergence::Unverified);
}

#[tokio::test]
async fn test_transport_failures_never_repair_live_policies() {
    let (cached_only, pooled_only) = (id(1), id(2));
    let ledger = Arc::new(
        MockLedger::new()
            .with_object(cached_only.clone(), policy_type())
            .with_object(pooled_only.clone(), policy_type())
            .with_failing(cached_only.clone())
            .with_failing(pooled_only.clone())
            .with_pool(vec![pooled_only.clone()], 0),
    );
    let executor = Arc::new(MockExecutor::new());
    let (service, store) = service(ledger.clone(), &[cached_only.clone()]);
    let service = service.with_executor(executor.clone());

    let report = service
        .reconcile_and_repair(RepairOptions::full())
        .await
        .unwrap();

    assert!(report.plan.to_remove.is_empty());
    assert!(report.plan.corrupted_for_cleanup.is_empty());
    assert_eq!(
        report.plan.unverified,
        BTreeSet::from([cached_only.clone(), pooled_only.clone()])
    );
    assert_eq!(report.cleanup, CleanupStatus::NothingToClean);
    assert_eq!(executor.call_count(), 0);
    assert!(store.contains(&cached_only));
    assert!(report.summary().contains("2 unverified"));
}

#[tokio::test]
async fn test_dropped_pass_writes_nothing() {
    let (live, dead) = (id(1), id(2));
    let ledger = Arc::new(
        MockLedger::new()
            .with_object(live.clone(), policy_type())
            .with_pool(vec![live.clone()], 0)
            .with_latency(Duration::from_millis(200)),
    );
    let slot = Arc::new(MemorySlot::new());
    let store = RecordStore::new(slot.clone());
    store
        .save(&[PolicyRecord::placeholder(dead.clone(), Utc::now())])
        .unwrap();
    let service = PolicyService::new(ContractConfig::default(), ledger.clone(), store.clone());
    let writes = slot.write_count();

    // Pool read takes 200ms, verification another 200ms
    let result = tokio::time::timeout(
        Duration::from_millis(300),
        service.reconcile_and_repair(RepairOptions::apply_only()),
    )
    .await;

    assert!(result.is_err());
    assert!(ledger.object_reads() > 0);
    assert_eq!(slot.write_count(), writes);
    assert!(!service.is_reconciling());
    assert!(store.contains(&dead));

    // The next pass runs normally
    let report = service
        .reconcile_and_repair(RepairOptions::apply_only())
        .await
        .unwrap();
    assert_eq!(report.plan.to_remove, BTreeSet::from([dead.clone()]));
    assert!(!store.contains(&dead));
}

#[tokio::test]
async fn test_concurrent_pass_is_rejected() {
    let ledger = Arc::new(
        MockLedger::new()
            .with_pool(vec![id(1)], 0)
            .with_latency(Duration::from_millis(50)),
    );
    let (service, _) = service(ledger, &[]);

    let (a, b) = tokio::join!(
        service.reconcile_and_repair(RepairOptions::dry_run()),
        service.reconcile_and_repair(RepairOptions::dry_run()),
    );

    let rejected = [&a, &b]
        .iter()
        .filter(|r| matches!(r, Err(PolicyError::ReconcileInProgress)))
        .count();
    assert_eq!(rejected, 1);
    assert!(a.is_ok() || b.is_ok());
    assert!(!service.is_reconciling());
}

/// Linear congruential generator with a fixed seed.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

#[test]
fn test_edit_sets_disjoint_for_disjoint_sources() {
    let now = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap();
    let mut rng = Lcg(7);

    for round in 0..200u32 {
        let local_count = rng.next() % 6;
        let pool_count = rng.next() % 6;
        let base = round * 100;

        let local: Vec<PolicyRecord> = (0..local_count)
            .map(|i| PolicyRecord::placeholder(id(base + i as u32), now))
            .collect();
        let pool_ids: Vec<String> = (0..pool_count).map(|i| id(base + 50 + i as u32)).collect();

        let verdicts: HashMap<String, Verification> = local
            .iter()
            .map(|r| r.policy_id.clone())
            .chain(pool_ids.iter().cloned())
            .map(|id| {
                let verdict = match rng.next() % 3 {
                    0 => Verification::Live,
                    1 => Verification::NotFound,
                    _ => Verification::Unreachable {
                        reason: "timed out".into(),
                        attempts: 3,
                    },
                };
                (id, verdict)
            })
            .collect();

        let pool = PoolSnapshot::new(pool_ids, 0);
        let plan = classify(&local, &pool, &verdicts, now);

        let added: BTreeSet<String> = plan.to_add.iter().map(|r| r.policy_id.clone()).collect();
        assert!(added.is_disjoint(&plan.to_remove), "round {}", round);
        assert!(added.is_disjoint(&plan.corrupted_for_cleanup), "round {}", round);
        assert!(plan.to_remove.is_disjoint(&plan.corrupted_for_cleanup), "round {}", round);

        let union = added.len() + plan.to_remove.len() + plan.corrupted_for_cleanup.len();
        assert!(union <= local.len() + pool.len(), "round {}", round);
        assert_eq!(plan.classification.len(), local.len() + pool.len());
        for id in &plan.unverified {
            assert!(!plan.to_remove.contains(id), "round {}", round);
            assert!(!plan.corrupted_for_cleanup.contains(id), "round {}", round);
        }
    }
}
