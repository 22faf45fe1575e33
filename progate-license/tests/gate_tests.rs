mod common;

use chrono::{DateTime, Duration, Utc};
use common::{sample_record, sealer_a, t0};
use pretty_assertions::assert_eq;
use progate_license::{
    CacheHealth, FeatureGate, LicenseCache, LicenseRecord, LicenseState, ManualClock,
};
use proptest::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

fn gate_with(record: Option<&LicenseRecord>) -> (TempDir, Arc<ManualClock>, FeatureGate) {
    let dir = tempfile::tempdir().unwrap();
    let cache = LicenseCache::new(dir.path(), sealer_a());
    if let Some(record) = record {
        cache.write(record).unwrap();
    }
    let clock = Arc::new(ManualClock::new(t0()));
    let gate = FeatureGate::with_clock(cache, clock.clone());
    (dir, clock, gate)
}

#[test]
fn no_cache_is_not_activated() {
    let (_dir, _clock, gate) = gate_with(None);
    assert_eq!(gate.state(), LicenseState::NotActivated);
    assert!(!gate.is_available("pro.memory.analytics"));
    assert!(gate.list_available().is_empty());

    let status = gate.status();
    assert_eq!(status.cache, CacheHealth::Missing);
    assert_eq!(status.key, None);
}

#[test]
fn state_boundaries_are_inclusive_of_grace_end() {
    let record = sample_record(&["pro.memory.*"], t0());
    let (_dir, clock, gate) = gate_with(Some(&record));

    clock.set(t0() + Duration::days(30));
    assert_eq!(gate.state(), LicenseState::Active);

    clock.set(t0() + Duration::days(30) + Duration::seconds(1));
    assert_eq!(gate.state(), LicenseState::Grace);

    clock.set(t0() + Duration::days(37));
    assert_eq!(gate.state(), LicenseState::Grace);

    clock.set(t0() + Duration::days(37) + Duration::seconds(1));
    assert_eq!(gate.state(), LicenseState::Expired);
}

#[test]
fn long_running_process_crosses_expiry_without_reload() {
    let record = sample_record(&["pro.memory.*"], t0());
    let (_dir, clock, gate) = gate_with(Some(&record));
    assert!(gate.is_available("pro.memory.analytics"));

    clock.advance(Duration::days(40));
    assert!(!gate.is_available("pro.memory.analytics"));
}

#[test]
fn perpetual_window_keeps_gate_usable() {
    let mut record = sample_record(&["pro.memory.*"], t0());
    record.cache_valid_days = u32::MAX;
    record.grace_period_days = u32::MAX;
    let (_dir, clock, gate) = gate_with(Some(&record));

    assert!(gate.is_available("pro.memory.x"));
    assert!(gate.require("pro.memory.x", "Memory").is_ok());

    clock.advance(Duration::days(365 * 50));
    let status = gate.status();
    assert_eq!(status.state, LicenseState::Active);
    assert_eq!(status.cache_expires_at, Some(DateTime::<Utc>::MAX_UTC));
    assert!(status.days_remaining.unwrap() > 0);
}

#[test]
fn wildcard_grants_children_only() {
    let record = sample_record(&["pro.squads.*"], t0());
    let (_dir, _clock, gate) = gate_with(Some(&record));

    assert!(gate.is_available("pro.squads.premium"));
    assert!(gate.is_available("pro.squads.premium.extra"));
    assert!(!gate.is_available("pro.squads"));
    assert!(!gate.is_available("pro.squadsx"));
    assert!(!gate.is_available("pro.memory.analytics"));
    assert!(!gate.is_available("PRO.SQUADS.PREMIUM"));
}

#[test]
fn exact_grant_does_not_cover_children() {
    let record = sample_record(&["pro.memory"], t0());
    let (_dir, _clock, gate) = gate_with(Some(&record));

    assert!(gate.is_available("pro.memory"));
    assert!(!gate.is_available("pro.memory.analytics"));
}

#[test]
fn require_explains_missing_grant() {
    let record = sample_record(&["pro.memory.*"], t0());
    let (_dir, _clock, gate) = gate_with(Some(&record));

    let denial = gate.require("pro.squads.premium", "Squads").unwrap_err();
    assert_eq!(denial.state, LicenseState::Active);
    assert!(denial.hint.contains("does not include"));
    assert!(denial.to_string().contains("Squads"));
    assert!(gate.require("pro.memory.analytics", "Analytics").is_ok());
}

#[test]
fn require_names_custom_activate_command() {
    let (_dir, _clock, gate) = gate_with(None);
    let gate = gate.with_activate_command("mytool license activate");
    let denial = gate.require("pro.memory.analytics", "Analytics").unwrap_err();
    assert_eq!(denial.state, LicenseState::NotActivated);
    assert!(denial.hint.contains("mytool license activate"));
    assert!(denial.hint.contains("Core features remain available"));
}

#[test]
fn gated_picks_the_right_path() {
    let record = sample_record(&["pro.memory.*"], t0());
    let (_dir, clock, gate) = gate_with(Some(&record));

    let run = || gate.gated("pro.memory.analytics", "Analytics", || "pro", || "free");
    assert_eq!(run(), "pro");
    clock.advance(Duration::days(60));
    assert_eq!(run(), "free");
}

#[test]
fn reload_picks_up_new_cache_contents() {
    let dir = tempfile::tempdir().unwrap();
    let cache = LicenseCache::new(dir.path(), sealer_a());
    let clock = Arc::new(ManualClock::new(t0()));
    let gate = FeatureGate::with_clock(cache.clone(), clock.clone());
    assert_eq!(gate.state(), LicenseState::NotActivated);

    cache
        .write(&sample_record(&["pro.memory.*"], t0()))
        .unwrap();
    // Snapshot is memoized until reload.
    assert_eq!(gate.state(), LicenseState::NotActivated);
    gate.reload();
    assert_eq!(gate.state(), LicenseState::Active);

    cache.delete().unwrap();
    gate.reload();
    assert_eq!(gate.state(), LicenseState::NotActivated);
}

#[test]
fn status_reports_windows_and_masked_key() {
    let record = sample_record(&["pro.squads.*", "pro.memory.analytics"], t0());
    let (_dir, clock, gate) = gate_with(Some(&record));
    clock.advance(Duration::days(5));

    let status = gate.status();
    assert_eq!(status.state, LicenseState::Active);
    assert_eq!(status.key.as_deref(), Some("PRO-AB12-****-****-GH78"));
    assert_eq!(status.cache_expires_at, Some(t0() + Duration::days(30)));
    assert_eq!(status.grace_ends_at, Some(t0() + Duration::days(37)));
    assert_eq!(status.days_remaining, Some(25));
    assert!(!status.revalidation_recommended);
    assert_eq!(
        status.features,
        vec![
            "pro.memory.analytics".to_string(),
            "pro.squads.*".to_string()
        ]
    );
}

#[test]
fn expired_status_hides_features_but_keeps_details() {
    let record = sample_record(&["pro.squads.*"], t0());
    let (_dir, clock, gate) = gate_with(Some(&record));
    clock.advance(Duration::days(50));

    let status = gate.status();
    assert_eq!(status.state, LicenseState::Expired);
    assert!(status.features.is_empty());
    assert!(status.key.is_some());
    assert!(gate.list_by_module().is_empty());
}

fn arb_record() -> impl Strategy<Value = (LicenseRecord, DateTime<Utc>)> {
    (0u32..60, 0u32..30, -400i64..400).prop_map(|(valid, grace, offset_hours)| {
        let mut record = sample_record(&["pro.*"], t0());
        record.cache_valid_days = valid;
        record.grace_period_days = grace;
        (record, t0() + Duration::hours(offset_hours * 6))
    })
}

proptest! {
    #[test]
    fn state_is_total_and_consistent((record, now) in arb_record()) {
        let state = LicenseState::of(Some(&record), now);
        let expected = if now <= record.cache_expires_at() {
            LicenseState::Active
        } else if now <= record.grace_ends_at() {
            LicenseState::Grace
        } else {
            LicenseState::Expired
        };
        prop_assert_eq!(state, expected);
        prop_assert_eq!(LicenseState::of(None, now), LicenseState::NotActivated);
    }

    #[test]
    fn unusable_states_deny_everything(
        feature in "[a-z]{1,6}(\\.[a-z*]{1,6}){0,3}",
        days_past in 38i64..500,
    ) {
        let record = sample_record(&["pro.*", "tools.export"], t0());
        let (_dir, clock, gate) = gate_with(Some(&record));
        clock.set(t0() + Duration::days(days_past));
        prop_assert_eq!(gate.state(), LicenseState::Expired);
        prop_assert!(!gate.is_available(&feature));
        prop_assert!(gate.require(&feature, "Feature").is_err());

        let (_empty_dir, _clock, empty) = gate_with(None);
        prop_assert!(!empty.is_available(&feature));
    }
}
