//! License store tests: creation, expiry shifts, lookups, duplicate
//! cleanup, binding columns, pending activation, sweep support

#[path = "../common/mod.rs"]
mod common;

use common::*;

// ============ Creation ============

#[test]
fn test_create_license() {
    let state = create_test_app_state();
    let expires = future_timestamp(30);
    let license = create_test_license(&state, "1001", "forge", expires);

    assert!(
        license.license_key.starts_with("KW-"),
        "issued key should carry the token prefix"
    );
    assert_eq!(license.owner_id, "1001");
    assert_eq!(license.product, "forge");
    assert_eq!(license.expires_at, expires);
    assert!(!license.revoked, "new license should not be revoked");
    assert!(license.hwid.is_none(), "new license should be unbound");
    assert!(!license.expiry_notified);
    assert!(!license.warning_notified);

    let stored = state.licenses.get(&license.license_key).unwrap().unwrap();
    assert_eq!(stored.owner_id, "1001");
    assert_eq!(stored.expires_at, expires);
}

#[test]
fn test_issued_keys_verify_against_the_codec() {
    let state = create_test_app_state();
    let expires = future_timestamp(30);
    let license = create_test_license(&state, "1001", "forge", expires);

    let claims = state
        .codec
        .verify(&license.license_key)
        .expect("stored key should verify offline");
    assert_eq!(claims.uid, "1001");
    assert_eq!(claims.exp, expires, "embedded expiry should match the row");
}

#[test]
fn test_issued_keys_are_unique_per_call() {
    let state = create_test_app_state();
    let a = create_test_license(&state, "1001", "forge", future_timestamp(30));
    let b = create_test_license(&state, "1001", "forge", future_timestamp(30));
    assert_ne!(
        a.license_key, b.license_key,
        "the nonce should make reissued keys distinct"
    );
}

#[test]
fn test_create_with_duplicate_key_is_rejected() {
    let state = create_test_app_state();
    let input = CreateLicense {
        license_key: "KW-fixed-key".to_string(),
        owner_id: "1001".to_string(),
        owner_name: "Owner".to_string(),
        product: "forge".to_string(),
        expires_at: future_timestamp(30),
        pending_days: None,
    };

    state.licenses.create(&input).expect("first insert succeeds");
    let err = state.licenses.create(&input).unwrap_err();
    assert!(
        matches!(err, AppError::DuplicateKey(ref key) if key == "KW-fixed-key"),
        "second insert should surface the colliding key, got {err:?}"
    );
}

#[test]
fn test_create_pending_license_stores_sentinel_expiry() {
    let state = create_test_app_state();
    let license = create_pending_license(&state, "1001", "forge", 14);

    assert_eq!(license.pending_days, Some(14));
    assert_eq!(
        license.expires_at, PENDING_EXPIRY_SENTINEL,
        "deferred licenses should sit at the sentinel until activation"
    );
    assert!(license.is_pending());
    assert!(
        license.is_active(now()),
        "a deferred license counts as active before activation"
    );
}

// ============ Expiry Shifts ============

#[test]
fn test_extend_active_license_adds_from_current_expiry() {
    let state = create_test_app_state();
    let expires = future_timestamp(10);
    let license = create_test_license(&state, "1001", "forge", expires);

    let new_expiry = state
        .licenses
        .extend(&license.license_key, 5 * ONE_DAY)
        .unwrap()
        .expect("license exists");

    assert_eq!(
        new_expiry,
        expires + 5 * ONE_DAY,
        "extending a live license should add on top of its expiry"
    );
}

#[test]
fn test_extend_expired_license_restarts_from_now() {
    let state = create_test_app_state();
    let license = create_test_license(&state, "1001", "forge", past_timestamp(5));

    let before = now();
    let new_expiry = state
        .licenses
        .extend(&license.license_key, 10 * ONE_DAY)
        .unwrap()
        .expect("license exists");

    let expected = before + 10 * ONE_DAY;
    assert!(
        (new_expiry - expected).abs() <= 2,
        "extending an expired license should restart from now: got {new_expiry}, expected about {expected}"
    );
}

#[test]
fn test_reduce_subtracts_from_stored_expiry() {
    let state = create_test_app_state();
    let expires = future_timestamp(10);
    let license = create_test_license(&state, "1001", "forge", expires);

    let new_expiry = state
        .licenses
        .extend(&license.license_key, -3 * ONE_DAY)
        .unwrap()
        .expect("license exists");

    assert_eq!(
        new_expiry,
        expires - 3 * ONE_DAY,
        "a reduction should come straight off the stored expiry"
    );
}

#[test]
fn test_reduce_can_push_expiry_into_the_past() {
    let state = create_test_app_state();
    let expires = future_timestamp(1);
    let license = create_test_license(&state, "1001", "forge", expires);

    let new_expiry = state
        .licenses
        .extend(&license.license_key, -10 * ONE_DAY)
        .unwrap()
        .expect("license exists");

    assert_eq!(new_expiry, expires - 10 * ONE_DAY);
    let stored = state.licenses.get(&license.license_key).unwrap().unwrap();
    assert!(
        stored.is_expired(now()),
        "a reduction past now should leave the license expired, never floored"
    );
}

#[test]
fn test_extend_clears_revocation() {
    let state = create_test_app_state();
    let license = create_test_license(&state, "1001", "forge", future_timestamp(10));
    state.licenses.revoke(&license.license_key).unwrap();

    state
        .licenses
        .extend(&license.license_key, ONE_DAY)
        .unwrap()
        .expect("license exists");

    let stored = state.licenses.get(&license.license_key).unwrap().unwrap();
    assert!(!stored.revoked, "any expiry shift should un-revoke");
}

#[test]
fn test_extend_unknown_key_returns_none() {
    let state = create_test_app_state();
    let result = state.licenses.extend("KW-missing", ONE_DAY).unwrap();
    assert!(result.is_none(), "extending a missing key is not an error");
}

#[test]
fn test_extend_does_not_reset_notification_flags() {
    let state = create_test_app_state();
    let license = create_test_license(&state, "1001", "forge", past_timestamp(1));
    state
        .licenses
        .mark_expiry_notified(&license.license_key)
        .unwrap();
    state
        .licenses
        .mark_warning_notified(&license.license_key)
        .unwrap();

    state
        .licenses
        .extend(&license.license_key, 30 * ONE_DAY)
        .unwrap()
        .expect("license exists");

    let stored = state.licenses.get(&license.license_key).unwrap().unwrap();
    assert!(
        stored.expiry_notified && stored.warning_notified,
        "shifting the expiry must not rearm past announcements"
    );
}

#[test]
fn test_extend_for_owner_targets_latest_unrevoked() {
    let state = create_test_app_state();
    let older = create_test_license(&state, "1001", "forge", future_timestamp(5));
    let newest = create_test_license(&state, "1001", "forge", future_timestamp(20));
    let revoked = create_test_license(&state, "1001", "forge", future_timestamp(40));
    state.licenses.revoke(&revoked.license_key).unwrap();

    let (key, new_expiry) = state
        .licenses
        .extend_for_owner("1001", ONE_DAY, Some("forge"))
        .unwrap()
        .expect("owner has a live license");

    assert_eq!(
        key, newest.license_key,
        "the latest non-revoked license should take the grant"
    );
    assert_eq!(new_expiry, newest.expires_at + ONE_DAY);

    let untouched = state.licenses.get(&older.license_key).unwrap().unwrap();
    assert_eq!(untouched.expires_at, older.expires_at);
}

#[test]
fn test_extend_for_owner_respects_product_filter() {
    let state = create_test_app_state();
    create_test_license(&state, "1001", "forge", future_timestamp(5));

    let result = state
        .licenses
        .extend_for_owner("1001", ONE_DAY, Some("loom"))
        .unwrap();
    assert!(result.is_none(), "a forge license should not absorb a loom grant");
}

#[test]
fn test_extend_for_owner_without_licenses_returns_none() {
    let state = create_test_app_state();
    let result = state
        .licenses
        .extend_for_owner("nobody", ONE_DAY, None)
        .unwrap();
    assert!(result.is_none());
}

// ============ Revocation & Deletion ============

#[test]
fn test_revoke_preserves_expiry() {
    let state = create_test_app_state();
    let expires = future_timestamp(10);
    let license = create_test_license(&state, "1001", "forge", expires);

    assert!(state.licenses.revoke(&license.license_key).unwrap());

    let stored = state.licenses.get(&license.license_key).unwrap().unwrap();
    assert!(stored.revoked);
    assert_eq!(
        stored.expires_at, expires,
        "revocation should not burn the remaining time"
    );
}

#[test]
fn test_revoke_unknown_key_returns_false() {
    let state = create_test_app_state();
    assert!(!state.licenses.revoke("KW-missing").unwrap());
}

#[test]
fn test_revoke_all_for_owner_counts_live_rows() {
    let state = create_test_app_state();
    create_test_license(&state, "1001", "forge", future_timestamp(10));
    create_test_license(&state, "1001", "loom", future_timestamp(10));
    let already = create_test_license(&state, "1001", "forge", future_timestamp(10));
    state.licenses.revoke(&already.license_key).unwrap();
    create_test_license(&state, "2002", "forge", future_timestamp(10));

    let revoked = state.licenses.revoke_all_for_owner("1001").unwrap();
    assert_eq!(revoked, 2, "only rows that were live should be counted");

    for license in state.licenses.list_for_owner("1001").unwrap() {
        assert!(license.revoked);
    }
    let other = state.licenses.list_for_owner("2002").unwrap();
    assert!(!other[0].revoked, "other owners must be untouched");
}

#[test]
fn test_delete_license() {
    let state = create_test_app_state();
    let license = create_test_license(&state, "1001", "forge", future_timestamp(10));

    assert!(state.licenses.delete(&license.license_key).unwrap());
    assert!(state.licenses.get(&license.license_key).unwrap().is_none());
    assert!(!state.licenses.delete(&license.license_key).unwrap());
}

#[test]
fn test_delete_all_for_owner() {
    let state = create_test_app_state();
    create_test_license(&state, "1001", "forge", future_timestamp(10));
    create_test_license(&state, "1001", "loom", future_timestamp(10));
    create_test_license(&state, "2002", "forge", future_timestamp(10));

    assert_eq!(state.licenses.delete_all_for_owner("1001").unwrap(), 2);
    assert!(state.licenses.list_for_owner("1001").unwrap().is_empty());
    assert_eq!(state.licenses.list_for_owner("2002").unwrap().len(), 1);
}

// ============ Lookups ============

#[test]
fn test_get_active_for_owner_prefers_latest_expiry() {
    let state = create_test_app_state();
    create_test_license(&state, "1001", "forge", future_timestamp(5));
    let latest = create_test_license(&state, "1001", "forge", future_timestamp(20));

    let found = state
        .licenses
        .get_active_for_owner("1001", Some("forge"))
        .unwrap()
        .expect("owner has licenses");
    assert_eq!(found.license_key, latest.license_key);
}

#[test]
fn test_get_active_for_owner_ignores_revoked() {
    let state = create_test_app_state();
    let live = create_test_license(&state, "1001", "forge", future_timestamp(5));
    let revoked = create_test_license(&state, "1001", "forge", future_timestamp(20));
    state.licenses.revoke(&revoked.license_key).unwrap();

    let found = state
        .licenses
        .get_active_for_owner("1001", Some("forge"))
        .unwrap()
        .expect("owner still has a live license");
    assert_eq!(
        found.license_key, live.license_key,
        "a revoked license must never win the active lookup"
    );
}

#[test]
fn test_get_latest_for_owner_prefers_unrevoked_over_later_expiry() {
    let state = create_test_app_state();
    let live = create_test_license(&state, "1001", "forge", future_timestamp(5));
    let revoked = create_test_license(&state, "1001", "forge", future_timestamp(20));
    state.licenses.revoke(&revoked.license_key).unwrap();

    let found = state
        .licenses
        .get_latest_for_owner("1001", Some("forge"))
        .unwrap()
        .unwrap();
    assert_eq!(found.license_key, live.license_key);
}

#[test]
fn test_get_latest_for_owner_falls_back_to_revoked() {
    let state = create_test_app_state();
    let revoked = create_test_license(&state, "1001", "forge", future_timestamp(20));
    state.licenses.revoke(&revoked.license_key).unwrap();

    let found = state
        .licenses
        .get_latest_for_owner("1001", Some("forge"))
        .unwrap()
        .expect("revoked licenses still resolve so boundaries can say why");
    assert!(found.revoked);
}

#[test]
fn test_list_active_filters_dead_rows() {
    let state = create_test_app_state();
    let live = create_test_license(&state, "1001", "forge", future_timestamp(10));
    create_test_license(&state, "2002", "forge", past_timestamp(1));
    let revoked = create_test_license(&state, "3003", "forge", future_timestamp(10));
    state.licenses.revoke(&revoked.license_key).unwrap();

    let active = state.licenses.list_active(None).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].license_key, live.license_key);
}

#[test]
fn test_list_active_with_product_filter() {
    let state = create_test_app_state();
    create_test_license(&state, "1001", "forge", future_timestamp(10));
    create_test_license(&state, "1001", "loom", future_timestamp(10));

    assert_eq!(state.licenses.list_active(Some("forge")).unwrap().len(), 1);
    assert_eq!(state.licenses.list_active(Some("loom")).unwrap().len(), 1);
    assert_eq!(state.licenses.list_active(None).unwrap().len(), 2);
}

#[test]
fn test_has_active() {
    let state = create_test_app_state();
    create_test_license(&state, "1001", "forge", future_timestamp(10));
    create_test_license(&state, "2002", "forge", past_timestamp(1));

    assert!(state.licenses.has_active("1001", Some("forge")).unwrap());
    assert!(!state.licenses.has_active("1001", Some("loom")).unwrap());
    assert!(!state.licenses.has_active("2002", Some("forge")).unwrap());
    assert!(!state.licenses.has_active("nobody", None).unwrap());
}

#[test]
fn test_stats_partition_the_total_exactly() {
    let state = create_test_app_state();
    create_test_license(&state, "1001", "forge", future_timestamp(10));
    create_test_license(&state, "2002", "forge", future_timestamp(20));
    create_test_license(&state, "3003", "forge", past_timestamp(1));
    // Revoked and expired at once: counted as revoked, never twice.
    let dead = create_test_license(&state, "4004", "forge", past_timestamp(2));
    state.licenses.revoke(&dead.license_key).unwrap();
    create_test_license(&state, "1001", "loom", future_timestamp(10));

    let forge = state.licenses.stats(Some("forge")).unwrap();
    assert_eq!(forge.total, 4);
    assert_eq!(forge.active, 2);
    assert_eq!(forge.expired, 1);
    assert_eq!(forge.revoked, 1);
    assert_eq!(
        forge.active + forge.expired + forge.revoked,
        forge.total,
        "every row must land in exactly one bucket"
    );

    let all = state.licenses.stats(None).unwrap();
    assert_eq!(all.total, 5);
    assert_eq!(all.active + all.expired + all.revoked, all.total);
}

// ============ Duplicate Cleanup ============

#[test]
fn test_reset_duplicates_keeps_latest_expiry() {
    let state = create_test_app_state();
    let short = create_test_license(&state, "1001", "forge", future_timestamp(1));
    let mid = create_test_license(&state, "1001", "forge", future_timestamp(2));
    let longest = create_test_license(&state, "1001", "forge", future_timestamp(3));

    let cleanup = state.licenses.reset_duplicates().unwrap();

    assert_eq!(cleanup.removed, 2, "three duplicates collapse to one");
    assert_eq!(cleanup.groups.len(), 1);
    let group = &cleanup.groups[0];
    assert_eq!(group.owner_id, "1001");
    assert_eq!(group.product, "forge");
    assert_eq!(group.kept_key, longest.license_key);
    assert!(group.removed_keys.contains(&short.license_key));
    assert!(group.removed_keys.contains(&mid.license_key));

    assert!(state.licenses.get(&longest.license_key).unwrap().is_some());
    assert!(state.licenses.get(&short.license_key).unwrap().is_none());
    assert!(state.licenses.get(&mid.license_key).unwrap().is_none());
}

#[test]
fn test_reset_duplicates_ignores_singles_and_revoked() {
    let state = create_test_app_state();
    // Single licenses per (owner, product) are not duplicates.
    create_test_license(&state, "1001", "forge", future_timestamp(1));
    create_test_license(&state, "1001", "loom", future_timestamp(1));
    // A revoked copy does not make the group a duplicate group.
    let revoked = create_test_license(&state, "1001", "forge", future_timestamp(9));
    state.licenses.revoke(&revoked.license_key).unwrap();

    let cleanup = state.licenses.reset_duplicates().unwrap();
    assert_eq!(cleanup.removed, 0);
    assert!(cleanup.groups.is_empty());
    assert!(
        state.licenses.get(&revoked.license_key).unwrap().is_some(),
        "revoked rows are outside the sweep entirely"
    );
}

#[test]
fn test_reset_duplicates_handles_multiple_groups() {
    let state = create_test_app_state();
    create_test_license(&state, "1001", "forge", future_timestamp(1));
    create_test_license(&state, "1001", "forge", future_timestamp(2));
    create_test_license(&state, "2002", "loom", future_timestamp(1));
    create_test_license(&state, "2002", "loom", future_timestamp(2));
    create_test_license(&state, "2002", "loom", future_timestamp(3));

    let cleanup = state.licenses.reset_duplicates().unwrap();
    assert_eq!(cleanup.groups.len(), 2);
    assert_eq!(cleanup.removed, 3);
    assert_eq!(state.licenses.list_for_owner("1001").unwrap().len(), 1);
    assert_eq!(state.licenses.list_for_owner("2002").unwrap().len(), 1);
}

// ============ Device Binding Columns ============

#[test]
fn test_bind_hwid_only_when_unbound() {
    let state = create_test_app_state();
    let license = create_test_license(&state, "1001", "forge", future_timestamp(10));

    assert!(state.licenses.bind_hwid(&license.license_key, "device-a").unwrap());
    assert!(
        !state.licenses.bind_hwid(&license.license_key, "device-b").unwrap(),
        "a bound license must reject a second fingerprint"
    );

    let stored = state.licenses.get(&license.license_key).unwrap().unwrap();
    assert_eq!(stored.hwid.as_deref(), Some("device-a"));
}

#[test]
fn test_reset_hwid() {
    let state = create_test_app_state();
    let license = create_test_license(&state, "1001", "forge", future_timestamp(10));
    state.licenses.bind_hwid(&license.license_key, "device-a").unwrap();

    assert!(state.licenses.reset_hwid(&license.license_key).unwrap());
    let stored = state.licenses.get(&license.license_key).unwrap().unwrap();
    assert!(stored.hwid.is_none());

    assert!(!state.licenses.reset_hwid("KW-missing").unwrap());
}

#[test]
fn test_reset_hwid_for_owner_counts_bound_rows() {
    let state = create_test_app_state();
    let a = create_test_license(&state, "1001", "forge", future_timestamp(10));
    let b = create_test_license(&state, "1001", "loom", future_timestamp(10));
    create_test_license(&state, "1001", "forge", future_timestamp(10));
    state.licenses.bind_hwid(&a.license_key, "dev-1").unwrap();
    state.licenses.bind_hwid(&b.license_key, "dev-2").unwrap();

    assert_eq!(state.licenses.reset_hwid_for_owner("1001").unwrap(), 2);
    assert_eq!(state.licenses.reset_hwid_for_owner("1001").unwrap(), 0);
}

#[test]
fn test_reset_all_hwids_scoped_by_product() {
    let state = create_test_app_state();
    let forge = create_test_license(&state, "1001", "forge", future_timestamp(10));
    let loom = create_test_license(&state, "2002", "loom", future_timestamp(10));
    state.licenses.bind_hwid(&forge.license_key, "dev-1").unwrap();
    state.licenses.bind_hwid(&loom.license_key, "dev-2").unwrap();

    assert_eq!(state.licenses.reset_all_hwids(Some("forge")).unwrap(), 1);
    let untouched = state.licenses.get(&loom.license_key).unwrap().unwrap();
    assert_eq!(
        untouched.hwid.as_deref(),
        Some("dev-2"),
        "the product filter must protect other products' bindings"
    );

    assert_eq!(state.licenses.reset_all_hwids(None).unwrap(), 1);
}

// ============ Pending Activation ============

#[test]
fn test_activate_pending_starts_countdown() {
    let state = create_test_app_state();
    let license = create_pending_license(&state, "1001", "forge", 14);

    let before = now();
    let expires = state
        .licenses
        .activate_pending(&license.license_key)
        .unwrap()
        .expect("pending license activates");

    let expected = before + 14 * ONE_DAY;
    assert!(
        (expires - expected).abs() <= 2,
        "countdown should start from activation: got {expires}, expected about {expected}"
    );

    let stored = state.licenses.get(&license.license_key).unwrap().unwrap();
    assert!(stored.pending_days.is_none());
    assert_eq!(stored.expires_at, expires);
}

#[test]
fn test_activate_pending_is_one_shot() {
    let state = create_test_app_state();
    let license = create_pending_license(&state, "1001", "forge", 14);
    state
        .licenses
        .activate_pending(&license.license_key)
        .unwrap()
        .expect("first activation");

    assert!(
        state
            .licenses
            .activate_pending(&license.license_key)
            .unwrap()
            .is_none(),
        "a second activation must not restart the countdown"
    );
}

#[test]
fn test_activate_pending_on_regular_license_returns_none() {
    let state = create_test_app_state();
    let license = create_test_license(&state, "1001", "forge", future_timestamp(10));
    assert!(state
        .licenses
        .activate_pending(&license.license_key)
        .unwrap()
        .is_none());
}

// ============ Sweep Support ============

#[test]
fn test_newly_expired_is_exactly_once() {
    let state = create_test_app_state();
    let expired = create_test_license(&state, "1001", "forge", past_timestamp(1));
    create_test_license(&state, "2002", "forge", future_timestamp(10));
    let revoked = create_test_license(&state, "3003", "forge", past_timestamp(1));
    state.licenses.revoke(&revoked.license_key).unwrap();

    let rows = state.licenses.newly_expired().unwrap();
    assert_eq!(rows.len(), 1, "live future and revoked rows stay out");
    assert_eq!(rows[0].license_key, expired.license_key);

    state.licenses.mark_expiry_notified(&expired.license_key).unwrap();
    assert!(
        state.licenses.newly_expired().unwrap().is_empty(),
        "a flagged row must not be picked up again"
    );
}

#[test]
fn test_expiring_within_window_semantics() {
    let state = create_test_app_state();
    let soon = create_test_license(&state, "1001", "forge", future_timestamp(1));
    create_test_license(&state, "2002", "forge", future_timestamp(10));
    create_test_license(&state, "3003", "forge", past_timestamp(1));
    create_pending_license(&state, "4004", "forge", 14);

    let rows = state.licenses.expiring_within(3 * ONE_DAY).unwrap();
    assert_eq!(
        rows.len(),
        1,
        "already expired, far future and pending rows are all outside the window"
    );
    assert_eq!(rows[0].license_key, soon.license_key);

    state.licenses.mark_warning_notified(&soon.license_key).unwrap();
    assert!(state.licenses.expiring_within(3 * ONE_DAY).unwrap().is_empty());
}
