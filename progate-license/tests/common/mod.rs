//! Shared test helpers for license tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use progate_crypto::SealedBox;
use progate_license::{
    ActivationErrorCode, Clock, LicenseAuthority, LicenseConfig, LicenseError, LicenseKey,
    LicenseRecord, LicenseResult, LicenseService, MachineIdentity, ManualClock, Seats,
    ValidationResponse,
};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

/// A well-formed key used throughout the tests.
pub const KEY: &str = "PRO-AB12-CD34-EF56-GH78";

/// Identity of the machine under test.
pub const MACHINE_A: &str = "machine-a-identity";

/// Identity of some other machine.
pub const MACHINE_B: &str = "machine-b-identity";

/// Routes library logs to the test output. Set `RUST_LOG=progate_license=debug` to see them.
pub fn init_tracing() {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Fixed start time for clock-driven tests.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

pub fn key() -> LicenseKey {
    LicenseKey::parse(KEY).unwrap()
}

/// Sealer for `MACHINE_A`, derived once per test binary.
pub fn sealer_a() -> Arc<SealedBox> {
    static SEALER: OnceLock<Arc<SealedBox>> = OnceLock::new();
    Arc::clone(SEALER.get_or_init(|| Arc::new(SealedBox::for_identity(MACHINE_A).unwrap())))
}

/// Sealer for `MACHINE_B`, derived once per test binary.
pub fn sealer_b() -> Arc<SealedBox> {
    static SEALER: OnceLock<Arc<SealedBox>> = OnceLock::new();
    Arc::clone(SEALER.get_or_init(|| Arc::new(SealedBox::for_identity(MACHINE_B).unwrap())))
}

/// A record activated at `at` with the default 30 + 7 day windows.
pub fn sample_record(features: &[&str], at: DateTime<Utc>) -> LicenseRecord {
    LicenseRecord {
        key: key(),
        activated_at: at,
        expires_at: at + Duration::days(365),
        features: features.iter().map(|f| (*f).to_string()).collect(),
        seats: Seats { used: 1, max: 3 },
        cache_valid_days: 30,
        grace_period_days: 7,
        last_validated: Some(at),
    }
}

#[derive(Debug)]
pub struct FakeState {
    pub online: bool,
    pub reject_activation: Option<ActivationErrorCode>,
    pub reject_deactivation: Option<ActivationErrorCode>,
    pub valid: bool,
    pub reason: Option<String>,
    pub features: Vec<String>,
    pub activations: usize,
    pub validations: usize,
    /// Raw keys the authority was asked to deactivate.
    pub deactivations: Vec<String>,
}

/// In-process authority controlled by the test.
pub struct FakeAuthority {
    clock: Arc<ManualClock>,
    pub state: Mutex<FakeState>,
}

impl FakeAuthority {
    pub fn new(clock: Arc<ManualClock>, features: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            clock,
            state: Mutex::new(FakeState {
                online: true,
                reject_activation: None,
                reject_deactivation: None,
                valid: true,
                reason: None,
                features: features.iter().map(|f| (*f).to_string()).collect(),
                activations: 0,
                validations: 0,
                deactivations: Vec::new(),
            }),
        })
    }

    pub fn set_online(&self, online: bool) {
        self.state.lock().unwrap().online = online;
    }

    pub fn revoke(&self, reason: &str) {
        let mut state = self.state.lock().unwrap();
        state.valid = false;
        state.reason = Some(reason.to_string());
    }

    pub fn set_features(&self, features: &[&str]) {
        self.state.lock().unwrap().features = features.iter().map(|f| (*f).to_string()).collect();
    }

    pub fn activations(&self) -> usize {
        self.state.lock().unwrap().activations
    }

    pub fn deactivations(&self) -> Vec<String> {
        self.state.lock().unwrap().deactivations.clone()
    }

    fn record_for(&self, key: &LicenseKey, features: &[String]) -> LicenseRecord {
        let now = self.clock.now();
        LicenseRecord {
            key: key.clone(),
            activated_at: now,
            expires_at: now + Duration::days(365),
            features: features.to_vec(),
            seats: Seats { used: 1, max: 3 },
            cache_valid_days: 30,
            grace_period_days: 7,
            last_validated: None,
        }
    }
}

fn unreachable() -> LicenseError {
    LicenseError::Network("connection refused".to_string())
}

#[async_trait]
impl LicenseAuthority for FakeAuthority {
    async fn activate(
        &self,
        key: &LicenseKey,
        _machine: &MachineIdentity,
        _host_version: &str,
    ) -> LicenseResult<LicenseRecord> {
        let mut state = self.state.lock().unwrap();
        if !state.online {
            return Err(unreachable());
        }
        if let Some(code) = state.reject_activation {
            return Err(LicenseError::Activation {
                code,
                details: "rejected by test".to_string(),
            });
        }
        state.activations += 1;
        Ok(self.record_for(key, &state.features))
    }

    async fn validate(
        &self,
        key: &LicenseKey,
        _machine: &MachineIdentity,
    ) -> LicenseResult<ValidationResponse> {
        let mut state = self.state.lock().unwrap();
        if !state.online {
            return Err(unreachable());
        }
        state.validations += 1;
        Ok(ValidationResponse {
            valid: state.valid,
            reason: state.reason.clone(),
            record: state.valid.then(|| self.record_for(key, &state.features)),
        })
    }

    async fn deactivate(&self, key: &LicenseKey, _machine: &MachineIdentity) -> LicenseResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.online {
            return Err(unreachable());
        }
        if let Some(code) = state.reject_deactivation {
            return Err(LicenseError::Activation {
                code,
                details: "rejected by test".to_string(),
            });
        }
        state.deactivations.push(key.raw().to_string());
        Ok(())
    }

    async fn is_online(&self) -> bool {
        self.state.lock().unwrap().online
    }
}

/// A service for `machine` rooted at `dir`.
pub fn service_for(
    dir: &Path,
    machine: &str,
    authority: Arc<FakeAuthority>,
    clock: Arc<ManualClock>,
) -> LicenseService {
    LicenseService::new(
        LicenseConfig::in_dir(dir),
        MachineIdentity::from_raw(machine),
        authority,
        clock,
    )
    .unwrap()
}

/// Everything a service test needs, kept alive together.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub clock: Arc<ManualClock>,
    pub authority: Arc<FakeAuthority>,
    pub service: LicenseService,
}

impl Harness {
    pub fn new(features: &[&str]) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let authority = FakeAuthority::new(Arc::clone(&clock), features);
        let service = service_for(
            dir.path(),
            MACHINE_A,
            Arc::clone(&authority),
            Arc::clone(&clock),
        );
        Self {
            dir,
            clock,
            authority,
            service,
        }
    }

    pub fn advance_days(&self, days: i64) {
        self.clock.advance(Duration::days(days));
    }
}
