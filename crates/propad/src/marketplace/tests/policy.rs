use super::common::*;
use chrono::Utc;

use crate::marketplace::domain::{ListingId, RuleId, UserId};
use crate::marketplace::policy::{
    evaluate, excerpt, PolicyEngine, PolicyRule, PolicySeverity, RuleSet, EXCERPT_CHAR_LIMIT,
};
use crate::marketplace::store::{MarketplaceStore, MemoryStore, NewPolicyRule};

fn rule(id: u64, phrase: &str, severity: PolicySeverity) -> PolicyRule {
    PolicyRule {
        id: RuleId(id),
        phrase: phrase.to_string(),
        severity,
        description: None,
        created_at: Utc::now(),
    }
}

#[test]
fn blocked_and_flagged_phrases_are_reported_separately() {
    let result = evaluate(
        "No viewing fee, but negotiable fee applies",
        &strings(&["viewing fee"]),
        &strings(&["negotiable fee"]),
        &[],
    );

    assert_eq!(result.blocked, strings(&["viewing fee"]));
    assert_eq!(result.flagged, strings(&["negotiable fee"]));
    assert!(result.is_blocked());
}

#[test]
fn clean_text_produces_no_hits() {
    let config = policy_config();
    let result = evaluate(
        "Zero fees always\nSpacious flat close to schools.",
        &config.block_list,
        &config.flag_list,
        &[],
    );

    assert!(result.blocked.is_empty());
    assert!(result.flagged.is_empty());
    assert!(!result.has_violations());
}

#[test]
fn matching_ignores_case_on_both_sides() {
    let result = evaluate(
        "A VIEWING FEE of $20 applies",
        &strings(&["Viewing Fee"]),
        &[],
        &[],
    );
    assert_eq!(result.blocked, strings(&["viewing fee"]));
}

#[test]
fn whitespace_around_a_phrase_is_part_of_the_match() {
    let word = strings(&[" rent "]);

    let inside_a_word = evaluate("The parent company manages it", &word, &[], &[]);
    assert!(inside_a_word.blocked.is_empty());

    let standalone = evaluate("Pay RENT monthly", &word, &[], &[]);
    assert_eq!(standalone.blocked, strings(&[" rent "]));

    let persisted = [rule(1, " deposit ", PolicySeverity::Flag)];
    let flagged = evaluate("No deposits taken", &[], &[], &persisted);
    assert!(flagged.flagged.is_empty());
}

#[test]
fn phrase_in_both_sets_is_only_blocked() {
    let result = evaluate(
        "processing fee payable upfront",
        &strings(&["processing fee"]),
        &strings(&["processing fee"]),
        &[rule(1, "processing fee", PolicySeverity::Flag)],
    );

    assert_eq!(result.blocked, strings(&["processing fee"]));
    assert!(result.flagged.is_empty());
}

#[test]
fn persisted_rules_extend_configured_lists() {
    let persisted = vec![
        rule(1, "cash only", PolicySeverity::Block),
        rule(2, "deposit upfront", PolicySeverity::Flag),
    ];
    let result = evaluate(
        "Cash only. Deposit upfront required. Registration fee waived.",
        &strings(&["registration fee"]),
        &[],
        &persisted,
    );

    assert_eq!(result.blocked, strings(&["cash only", "registration fee"]));
    assert_eq!(result.flagged, strings(&["deposit upfront"]));
}

#[test]
fn blank_phrases_never_match() {
    let rules = RuleSet::merge(&strings(&["", "   "]), &strings(&[" "]), &[]);
    assert_eq!(rules.blocked().count(), 0);
    assert_eq!(rules.flagged().count(), 0);
    assert!(!rules.scan("any text at all").has_violations());
}

#[test]
fn evaluation_is_sorted_and_idempotent() {
    let block = strings(&["zebra fee", "agent commission", "viewing fee"]);
    let flag = strings(&["processing fee", "finder's fee"]);
    let text =
        "viewing fee, zebra fee, finder's fee, agent commission, processing fee, viewing fee";

    let first = evaluate(text, &block, &flag, &[]);
    let second = evaluate(text, &block, &flag, &[]);

    assert_eq!(first, second);
    assert_eq!(
        first.blocked,
        strings(&["agent commission", "viewing fee", "zebra fee"])
    );
    assert_eq!(first.flagged, strings(&["finder's fee", "processing fee"]));
}

#[test]
fn every_configured_block_phrase_is_detected_inside_longer_text() {
    let config = policy_config();
    for phrase in &config.block_list {
        let text = format!("Lovely home. {} applies on request!", phrase.to_uppercase());
        let result = evaluate(&text, &config.block_list, &config.flag_list, &[]);
        assert!(
            result.blocked.contains(phrase),
            "expected '{phrase}' to be blocked in {text:?}"
        );
        assert!(!result.flagged.contains(phrase));
    }
}

#[test]
fn excerpt_is_capped_by_characters() {
    let text = "é".repeat(EXCERPT_CHAR_LIMIT + 40);
    let clipped = excerpt(&text);
    assert_eq!(clipped.chars().count(), EXCERPT_CHAR_LIMIT);
    assert_eq!(excerpt("short"), "short");
}

#[test]
fn record_stages_one_event_per_hit_and_commits_only_with_caller() {
    let store = MemoryStore::new();
    let engine = PolicyEngine::new(policy_config());
    let long_tail = "x".repeat(400);
    let text = format!("Viewing fee plus processing fee. {long_tail}");

    {
        let mut tx = store.begin().expect("begin");
        let result = engine
            .record(tx.as_mut(), &text, Some(ListingId(9)), Some(UserId(3)))
            .expect("record");
        assert_eq!(result.blocked, strings(&["viewing fee"]));
        assert_eq!(result.flagged, strings(&["processing fee"]));
        tx.rollback();
    }
    let tx = store.begin().expect("begin");
    assert!(tx.policy_events(10).expect("events").is_empty());
    drop(tx);

    let mut tx = store.begin().expect("begin");
    engine
        .record(tx.as_mut(), &text, Some(ListingId(9)), Some(UserId(3)))
        .expect("record");
    tx.commit().expect("commit");

    let tx = store.begin().expect("begin");
    let events = tx.policy_events(10).expect("events");
    assert_eq!(events.len(), 2);
    assert!(events
        .iter()
        .all(|event| event.text_excerpt.chars().count() == EXCERPT_CHAR_LIMIT));
    let severities: Vec<PolicySeverity> = events.iter().map(|event| event.severity).collect();
    assert!(severities.contains(&PolicySeverity::Block));
    assert!(severities.contains(&PolicySeverity::Flag));
}

#[test]
fn record_dedupes_repeat_hits_for_the_same_listing() {
    let store = MemoryStore::new();
    let engine = PolicyEngine::new(policy_config());

    let mut tx = store.begin().expect("begin");
    for _ in 0..3 {
        engine
            .record(tx.as_mut(), "negotiable fee", Some(ListingId(1)), None)
            .expect("record");
    }
    engine
        .record(tx.as_mut(), "negotiable fee", Some(ListingId(2)), None)
        .expect("record");
    tx.commit().expect("commit");

    let tx = store.begin().expect("begin");
    assert_eq!(tx.policy_events(10).expect("events").len(), 2);
}

#[test]
fn check_reads_rules_persisted_in_the_same_transaction() {
    let store = MemoryStore::new();
    let engine = PolicyEngine::new(policy_config());

    let mut tx = store.begin().expect("begin");
    tx.insert_policy_rule(NewPolicyRule {
        phrase: "key money".to_string(),
        severity: PolicySeverity::Block,
        description: Some("illegal upfront charge".to_string()),
    })
    .expect("rule inserted");

    let result = engine.check(tx.as_ref(), "Key money of one month").expect("check");
    assert_eq!(result.blocked, strings(&["key money"]));
    assert!(tx.policy_events(10).expect("events").is_empty());
}
