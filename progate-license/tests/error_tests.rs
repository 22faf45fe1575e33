use progate_crypto::CryptoError;
use progate_license::{ActivationErrorCode, LicenseError, LicenseState, ProFeatureError};

#[test]
fn error_display_invalid_key_format() {
    let err = LicenseError::InvalidKeyFormat("bad format".into());
    assert!(format!("{err}").contains("invalid license key format"));
}

#[test]
fn error_display_activation_names_code() {
    let err = LicenseError::Activation {
        code: ActivationErrorCode::SeatLimitReached,
        details: "3 of 3 seats used".into(),
    };
    let msg = format!("{err}");
    assert!(msg.contains("seat_limit_reached"));
    assert!(msg.contains("3 of 3 seats used"));
}

#[test]
fn error_display_not_activated() {
    let err = LicenseError::NotActivated;
    assert!(format!("{err}").contains("not activated"));
}

#[test]
fn error_display_network() {
    let err = LicenseError::Network("timed out".into());
    assert!(format!("{err}").contains("network error"));
    assert!(err.is_network());
}

#[test]
fn error_display_storage() {
    let err = LicenseError::Storage("disk full".into());
    assert!(format!("{err}").contains("disk full"));
    assert!(!err.is_network());
}

#[test]
fn crypto_errors_keep_their_meaning() {
    assert!(matches!(
        LicenseError::from(CryptoError::KeyMismatch),
        LicenseError::KeyMismatch
    ));
    assert!(matches!(
        LicenseError::from(CryptoError::Integrity("checksum".into())),
        LicenseError::Integrity(_)
    ));
    assert!(matches!(
        LicenseError::from(CryptoError::Encryption("aead".into())),
        LicenseError::Storage(_)
    ));
}

#[test]
fn activation_code_accessor() {
    let err = LicenseError::Activation {
        code: ActivationErrorCode::Revoked,
        details: String::new(),
    };
    assert_eq!(err.activation_code(), Some(ActivationErrorCode::Revoked));
    assert_eq!(LicenseError::NotActivated.activation_code(), None);
}

#[test]
fn activation_codes_use_wire_names() {
    let parsed: ActivationErrorCode = serde_json::from_str("\"machine_mismatch\"").unwrap();
    assert_eq!(parsed, ActivationErrorCode::MachineMismatch);
    let unknown: ActivationErrorCode = serde_json::from_str("\"something_new\"").unwrap();
    assert_eq!(unknown, ActivationErrorCode::Unknown);
    assert_eq!(ActivationErrorCode::RateLimited.to_string(), "rate_limited");
}

#[test]
fn pro_feature_error_display() {
    let err = ProFeatureError {
        feature_id: "pro.memory.analytics".into(),
        friendly_name: "Memory analytics".into(),
        state: LicenseState::Expired,
        hint: "Reconnect and run `progate activate`.".into(),
    };
    let msg = err.to_string();
    assert!(msg.starts_with("Memory analytics requires an active Pro license"));
    assert!(msg.contains("pro.memory.analytics"));
    assert!(msg.contains("license expired"));
    assert!(msg.contains("Reconnect"));
}
