use std::sync::Arc;
use std::time::{Duration, SystemTime};

use quotagate_core::{
    AcquireError, Credential, CredentialPool, Event, EventHub, InsertError, OperationalEvent,
    QuotaGroupRegistry, QuotaSignal,
};

fn t0() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn antigravity_pool(hub: EventHub) -> CredentialPool {
    let pool = CredentialPool::new(Arc::new(QuotaGroupRegistry::with_defaults()), hub);
    pool.insert("antigravity", Credential::new(1)).unwrap();
    pool.insert("antigravity", Credential::new(2)).unwrap();
    pool
}

#[test]
fn unknown_provider_is_reported() {
    let pool = antigravity_pool(EventHub::new(8));
    assert_eq!(
        pool.acquire_for_model("codex", "gpt-5", t0()).unwrap_err(),
        AcquireError::ProviderUnknown
    );
}

#[test]
fn block_on_one_model_moves_whole_family_to_next_credential() {
    let pool = antigravity_pool(EventHub::new(8));
    assert_eq!(
        pool.acquire_for_model("antigravity", "claude-opus-4-5-thinking", t0())
            .unwrap()
            .id(),
        1
    );

    let scope = pool.record_quota_exceeded(
        1,
        "antigravity",
        "claude-opus-4-5-thinking",
        QuotaSignal::after(t0(), secs(30)),
    );
    assert_eq!(scope.as_deref(), Some("claude"));

    let picked = pool
        .acquire_for_model("antigravity", "claude-sonnet-4-5", t0() + secs(1))
        .unwrap();
    assert_eq!(picked.id(), 2);

    // Other families on the same credential are unaffected.
    let picked = pool
        .acquire_for_model("antigravity", "gemini-3-pro-high", t0() + secs(1))
        .unwrap();
    assert_eq!(picked.id(), 1);

    // Once the window passes, credential 1 is preferred again.
    let picked = pool
        .acquire_for_model("antigravity", "claude-sonnet-4-5", t0() + secs(31))
        .unwrap();
    assert_eq!(picked.id(), 1);
}

#[test]
fn all_blocked_reports_earliest_recovery() {
    let pool = antigravity_pool(EventHub::new(8));
    pool.record_quota_exceeded(1, "antigravity", "claude-a", QuotaSignal::after(t0(), secs(90)));
    pool.record_quota_exceeded(
        2,
        "antigravity",
        "claude-b",
        QuotaSignal::after(t0(), secs(10)).with_recover_at(t0() + secs(40)),
    );

    assert_eq!(
        pool.acquire_for_model("antigravity", "claude-c", t0())
            .unwrap_err(),
        AcquireError::QuotaExhausted {
            retry_at: t0() + secs(40)
        }
    );
}

#[test]
fn ungrouped_provider_blocks_only_the_model() {
    let pool = CredentialPool::new(Arc::new(QuotaGroupRegistry::with_defaults()), EventHub::new(8));
    pool.insert("codex", Credential::new(5)).unwrap();

    let scope = pool.record_quota_exceeded(5, "codex", "gpt-5-codex", QuotaSignal::after(t0(), secs(60)));
    assert_eq!(scope.as_deref(), Some("gpt-5-codex"));

    assert!(matches!(
        pool.acquire_for_model("codex", "gpt-5-codex", t0()),
        Err(AcquireError::QuotaExhausted { .. })
    ));
    assert_eq!(pool.acquire_for_model("codex", "gpt-5", t0()).unwrap().id(), 5);
}

#[test]
fn clear_quota_unblocks_immediately_and_emits() {
    let hub = EventHub::new(8);
    let mut rx = hub.subscribe();
    let pool = antigravity_pool(hub);

    pool.record_quota_exceeded(1, "antigravity", "claude-a", QuotaSignal::after(t0(), secs(300)));
    pool.record_quota_exceeded(2, "antigravity", "claude-a", QuotaSignal::after(t0(), secs(300)));
    assert!(pool.clear_quota(2, "antigravity", "claude-b"));

    assert_eq!(
        pool.acquire_for_model("antigravity", "claude-a", t0()).unwrap().id(),
        2
    );

    let first = rx.try_recv().expect("blocked event");
    match first {
        Event::Operational(OperationalEvent::QuotaGroupBlocked(event)) => {
            assert_eq!(event.credential_id, 1);
            assert_eq!(event.group, "claude");
            assert_eq!(event.source_model, "claude-a");
            assert_eq!(event.retry_after, t0() + secs(300));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    let _second_block = rx.try_recv().expect("second blocked event");
    let cleared = rx.try_recv().expect("cleared event");
    assert!(matches!(
        cleared,
        Event::Operational(OperationalEvent::QuotaGroupCleared(ref event))
            if event.credential_id == 2 && event.group == "claude"
    ));
}

#[test]
fn disabled_credentials_are_skipped_and_keep_quota_state() {
    let pool = antigravity_pool(EventHub::new(8));
    pool.record_quota_exceeded(2, "antigravity", "claude-a", QuotaSignal::after(t0(), secs(60)));

    assert!(pool.set_enabled(1, false));
    assert!(!pool.set_enabled(42, false));
    assert!(matches!(
        pool.acquire_for_model("antigravity", "claude-a", t0()),
        Err(AcquireError::QuotaExhausted { .. })
    ));
    assert_eq!(
        pool.acquire_for_model("antigravity", "gemini-pro", t0()).unwrap().id(),
        2
    );

    // Re-inserting an existing id re-enables it without dropping its index.
    pool.insert("antigravity", Credential::new(2)).unwrap();
    assert_eq!(pool.quota_states(2, t0()).len(), 1);

    assert!(pool.set_enabled(2, false));
    assert_eq!(
        pool.acquire_for_model("antigravity", "gemini-pro", t0()).unwrap_err(),
        AcquireError::NoActiveCredentials
    );
}

#[test]
fn unknown_credential_signals_are_ignored() {
    let pool = antigravity_pool(EventHub::new(8));
    assert_eq!(
        pool.record_quota_exceeded(99, "antigravity", "claude-a", QuotaSignal::after(t0(), secs(5))),
        None
    );
    assert!(!pool.clear_quota(99, "antigravity", "claude-a"));
    assert!(pool.quota_states(99, t0()).is_empty());
}

#[test]
fn quota_states_lists_active_blocks() {
    let pool = antigravity_pool(EventHub::new(8));
    pool.record_quota_exceeded(1, "antigravity", "gemini-2.5-pro", QuotaSignal::after(t0(), secs(20)));
    pool.record_quota_exceeded(1, "antigravity", "claude-a", QuotaSignal::after(t0(), secs(5)));

    let states = pool.quota_states(1, t0() + secs(10));
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].0, "gemini");
    assert_eq!(states[0].1.source_model, "gemini-2.5-pro");
}

#[test]
fn credential_ids_are_unique_across_providers() {
    let pool = antigravity_pool(EventHub::new(8));
    assert_eq!(
        pool.insert("codex", Credential::new(1)),
        Err(InsertError::IdTaken {
            id: 1,
            provider: "antigravity".to_string()
        })
    );
    assert_eq!(
        pool.acquire_for_model("codex", "gpt-5", t0()).unwrap_err(),
        AcquireError::ProviderUnknown
    );
    // Same provider under a different spelling is a re-insert.
    assert_eq!(pool.insert(" AntiGravity", Credential::new(1)), Ok(()));
}

#[test]
fn quota_signals_only_reach_the_named_provider() {
    let pool = antigravity_pool(EventHub::new(8));
    pool.insert("codex", Credential::new(7)).unwrap();

    // Credential 1 belongs to antigravity, not codex.
    assert_eq!(
        pool.record_quota_exceeded(1, "codex", "gpt-5", QuotaSignal::after(t0(), secs(60))),
        None
    );
    assert!(!pool.clear_quota(1, "codex", "gpt-5"));
    assert!(pool.quota_states(1, t0()).is_empty());

    let scope = pool.record_quota_exceeded(7, "Codex", "gpt-5", QuotaSignal::after(t0(), secs(60)));
    assert_eq!(scope.as_deref(), Some("gpt-5"));
    assert!(matches!(
        pool.acquire_for_model("codex", "gpt-5", t0()),
        Err(AcquireError::QuotaExhausted { .. })
    ));
    assert_eq!(
        pool.acquire_for_model("antigravity", "gpt-5", t0()).unwrap().id(),
        1
    );
}
