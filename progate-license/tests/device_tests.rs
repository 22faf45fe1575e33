use progate_license::{DeviceInfo, MachineIdentity};

#[test]
fn device_info_collection() {
    let info = DeviceInfo::collect();
    assert!(!info.os_name.is_empty());
    assert!(!info.arch.is_empty());
    assert!(!info.hostname.is_empty());
}

#[test]
fn device_info_serializes_camel_case() {
    let info = DeviceInfo::collect();
    let json = serde_json::to_value(&info).unwrap();
    assert!(json.get("osName").is_some());
    assert!(json.get("osVersion").is_some());
    let parsed: DeviceInfo = serde_json::from_value(json).unwrap();
    assert_eq!(parsed.arch, info.arch);
}

#[test]
fn identity_is_stable_for_one_machine() {
    let dir = tempfile::tempdir().unwrap();
    let first = MachineIdentity::resolve(dir.path());
    let second = MachineIdentity::resolve(dir.path());
    assert_eq!(first, second);
}

#[test]
fn identity_is_an_opaque_digest() {
    let dir = tempfile::tempdir().unwrap();
    let id = MachineIdentity::resolve(dir.path());
    assert_eq!(id.as_str().len(), 22);
    assert!(
        id.as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    );
}

#[test]
fn raw_identity_serializes_transparently() {
    let id = MachineIdentity::from_raw("abc123");
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");
    assert_eq!(id.to_string(), "abc123");
}
