use super::common::*;
use std::sync::Arc;

use crate::config::RewardConfig;
use crate::marketplace::domain::{UserId, UserRole};
use crate::marketplace::error::MarketplaceError;
use crate::marketplace::money::Money;
use crate::marketplace::rewards::{LedgerError, PayoutRequest, RewardLedger};
use crate::marketplace::store::{MarketplaceStore, MemoryStore};

fn request(agent: u64, amount: &str) -> PayoutRequest {
    PayoutRequest {
        agent_id: UserId(agent),
        listing_id: None,
        amount: money(amount),
        reason: "verified listing bonus".to_string(),
    }
}

#[test]
fn get_or_create_seeds_a_single_pool() {
    let store = MemoryStore::new();
    let ledger = RewardLedger::new(reward_config());

    let first = ledger.bootstrap(&store).expect("bootstrap");
    let second = ledger.bootstrap(&store).expect("bootstrap again");

    assert_eq!(first.id, second.id);
    assert_eq!(first.total_amount, money("500.00"));
    assert_eq!(first.available_amount, money("500.00"));
}

#[test]
fn negative_seed_never_creates_a_pool() {
    let store = MemoryStore::new();
    let ledger = RewardLedger::new(RewardConfig {
        default_pool_amount: Money::from_cents(-500),
    });

    match ledger.bootstrap(&store) {
        Err(LedgerError::NegativeSeed(seed)) => assert_eq!(seed, money("-5.00")),
        other => panic!("expected negative seed rejection, got {other:?}"),
    }

    let mut tx = store.begin().expect("begin");
    assert!(tx.latest_reward_pool().expect("read").is_none());
    assert!(matches!(
        ledger.get_or_create_pool(tx.as_mut()),
        Err(LedgerError::NegativeSeed(_))
    ));
}

#[test]
fn zero_seed_is_a_valid_empty_pool() {
    let store = MemoryStore::new();
    let ledger = RewardLedger::new(RewardConfig {
        default_pool_amount: Money::ZERO,
    });

    let pool = ledger.bootstrap(&store).expect("empty pool is allowed");
    assert_eq!(pool.available_amount, Money::ZERO);
}

#[test]
fn draining_the_pool_exactly_then_one_cent_more_fails() {
    let store = MemoryStore::new();
    let ledger = RewardLedger::new(reward_config());
    let pool = ledger.bootstrap(&store).expect("bootstrap");

    let mut tx = store.begin().expect("begin");
    let payout = ledger
        .allocate_payout(tx.as_mut(), &pool, &request(7, "500.00"), Some(UserId(1)))
        .expect("full balance can be paid out");
    assert_eq!(payout.amount, money("500.00"));
    tx.commit().expect("commit");

    let mut tx = store.begin().expect("begin");
    match ledger.allocate_payout(tx.as_mut(), &pool, &request(7, "0.01"), Some(UserId(1))) {
        Err(LedgerError::InsufficientFunds {
            requested,
            available,
        }) => {
            assert_eq!(requested, money("0.01"));
            assert_eq!(available, Money::ZERO);
        }
        other => panic!("expected insufficient funds, got {other:?}"),
    }
    drop(tx);

    let tx = store.begin().expect("begin");
    let current = tx.latest_reward_pool().expect("read").expect("pool");
    assert_eq!(current.available_amount, Money::ZERO);
    assert_eq!(tx.reward_payouts(None).expect("payouts").len(), 1);
}

#[test]
fn successful_payouts_reduce_the_balance_by_their_exact_sum() {
    let store = MemoryStore::new();
    let ledger = RewardLedger::new(reward_config());
    let pool = ledger.bootstrap(&store).expect("bootstrap");
    let amounts = ["0.10", "0.20", "12.34", "99.99", "0.01", "150.00"];

    let mut tx = store.begin().expect("begin");
    for amount in amounts {
        ledger
            .allocate_payout(tx.as_mut(), &pool, &request(4, amount), None)
            .expect("payout fits");
    }
    tx.commit().expect("commit");

    let spent: i64 = amounts.iter().map(|amount| money(amount).cents()).sum();
    let tx = store.begin().expect("begin");
    let current = tx.latest_reward_pool().expect("read").expect("pool");
    assert_eq!(
        current.available_amount,
        Money::from_cents(money("500.00").cents() - spent)
    );
    assert_eq!(current.total_amount, money("500.00"));
    assert_eq!(tx.audit_entries(50).expect("audit").len(), amounts.len());
}

#[test]
fn stale_pool_snapshot_cannot_overdraw() {
    let store = MemoryStore::new();
    let ledger = RewardLedger::new(reward_config());
    let stale = ledger.bootstrap(&store).expect("bootstrap");

    let mut tx = store.begin().expect("begin");
    ledger
        .allocate_payout(tx.as_mut(), &stale, &request(2, "400.00"), None)
        .expect("first payout");
    tx.commit().expect("commit");

    let mut tx = store.begin().expect("begin");
    let result = ledger.allocate_payout(tx.as_mut(), &stale, &request(2, "200.00"), None);
    assert!(matches!(
        result,
        Err(LedgerError::InsufficientFunds { available, .. }) if available == money("100.00")
    ));
}

#[test]
fn non_positive_amounts_are_rejected_before_staging() {
    let store = MemoryStore::new();
    let ledger = RewardLedger::new(reward_config());
    let pool = ledger.bootstrap(&store).expect("bootstrap");

    for amount in ["0", "-5.00"] {
        let mut tx = store.begin().expect("begin");
        match ledger.allocate_payout(tx.as_mut(), &pool, &request(2, amount), None) {
            Err(LedgerError::NonPositiveAmount(rejected)) => assert_eq!(rejected, money(amount)),
            other => panic!("expected non-positive rejection, got {other:?}"),
        }
        assert!(tx.reward_payouts(None).expect("payouts").is_empty());
    }
}

#[test]
fn payout_audit_entry_carries_the_allocation_details() {
    let store = MemoryStore::new();
    let ledger = RewardLedger::new(reward_config());
    let pool = ledger.bootstrap(&store).expect("bootstrap");

    let mut tx = store.begin().expect("begin");
    let payout = ledger
        .allocate_payout(tx.as_mut(), &pool, &request(5, "25.50"), Some(UserId(1)))
        .expect("payout");
    tx.commit().expect("commit");

    let tx = store.begin().expect("begin");
    let entries = tx.audit_entries(1).expect("audit");
    let entry = entries.first().expect("entry present");
    assert_eq!(entry.action, "reward_payout");
    assert_eq!(entry.entity_type, "RewardPayout");
    assert_eq!(entry.entity_id, Some(payout.id.0));
    assert_eq!(entry.user_id, Some(UserId(1)));
    let details = entry.details.as_ref().expect("details");
    assert_eq!(details["amount"], "25.50");
    assert_eq!(details["agent_id"], 5);
    assert_eq!(details["reward_pool_id"], pool.id.0);
}

#[test]
fn concurrent_payouts_never_overdraw_the_pool() {
    let (service, store) = build_service();
    let admin = register(&service, "admin@propad.test", UserRole::Admin);
    let agent = register(&service, "agent@propad.test", UserRole::Agent);
    service.bootstrap().expect("bootstrap");
    let service = Arc::new(service);

    let workers = 16;
    let attempts_per_worker = 10;
    let mut granted = 0;
    let mut refused = 0;

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let service = Arc::clone(&service);
                let admin = admin.clone();
                let agent_id = agent.id;
                scope.spawn(move || {
                    let mut outcomes = (0, 0);
                    for _ in 0..attempts_per_worker {
                        match service.create_payout(&admin, request(agent_id.0, "5.00")) {
                            Ok(_) => outcomes.0 += 1,
                            Err(MarketplaceError::InsufficientFunds { .. }) => outcomes.1 += 1,
                            Err(other) => panic!("unexpected payout failure: {other:?}"),
                        }
                    }
                    outcomes
                })
            })
            .collect();

        for handle in handles {
            let (ok, rejected) = handle.join().expect("worker completes");
            granted += ok;
            refused += rejected;
        }
    });

    assert_eq!(granted, 100);
    assert_eq!(refused, workers * attempts_per_worker - 100);

    let tx = store.begin().expect("begin");
    let pool = tx.latest_reward_pool().expect("read").expect("pool");
    assert_eq!(pool.available_amount, Money::ZERO);
    let payouts = tx.reward_payouts(None).expect("payouts");
    assert_eq!(payouts.len(), 100);
    let paid: i64 = payouts.iter().map(|payout| payout.amount.cents()).sum();
    assert_eq!(paid, money("500.00").cents());
}
