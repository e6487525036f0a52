// Licensed under the Apache-2.0 license

use otpgen_error::{ErrorCategory, OtpError, OtpResult};
use otpgen_mmap::{LockMode, MemoryMap, Variant};
use otpgen_types::{HexValue, MemoryMapConfig};
use serde_json::{json, Value};

fn mmap_config() -> Value {
    json!({
        "seed": "1234",
        "otp": {"depth": "64", "width": "2"},
        "scrambling": {
            "key_size": "16",
            "iv_size": "8",
            "cnst_size": "16",
            "keys": [
                {"name": "Secret0Key", "value": "<random>"},
                {"name": "Secret1Key", "value": "0x0123456789abcdef_fedcba9876543210"}
            ],
            "digests": [
                {"name": "CnstyDigest", "iv_value": "<random>", "cnst_value": "<random>"}
            ]
        },
        "partitions": [
            {
                "name": "VENDOR_TEST",
                "variant": "Unbuffered",
                "sw_digest": true,
                "write_lock": "Digest",
                "desc": "Vendor test partition.",
                "items": [{"name": "SCRATCH", "size": "8"}]
            },
            {
                "name": "HW_CFG",
                "variant": "Buffered",
                "hw_digest": "true",
                "write_lock": "digest",
                "absorb": true,
                "integrity": true,
                "items": [
                    {"name": "DEVICE_ID", "size": 4, "desc": "Device\nidentifier."},
                    {"name": "EN_FEATURE", "size": 1, "ismubi": true}
                ]
            },
            {
                "name": "SECRET0",
                "variant": "Buffered",
                "secret": true,
                "hw_digest": true,
                "key_sel": "Secret0Key",
                "write_lock": "digest",
                "read_lock": "digest",
                "items": [{"name": "TEST_UNLOCK_TOKEN", "size": 16, "iskeymgr_creator": true}]
            },
            {
                "name": "LIFE_CYCLE",
                "variant": "LifeCycle",
                "items": [
                    {"name": "LC_TRANSITION_CNT", "size": 4},
                    {"name": "LC_STATE", "size": 6}
                ]
            }
        ]
    })
}

fn build(value: Value) -> OtpResult<MemoryMap> {
    let config: MemoryMapConfig = serde_json::from_value(value).unwrap();
    MemoryMap::new(&config)
}

fn build_err(value: Value) -> OtpError {
    build(value).unwrap_err()
}

type Mutation = fn(&mut Value);
type Check = fn(&OtpError) -> bool;

fn case(mutate: Mutation, check: Check) -> (Mutation, Check) {
    (mutate, check)
}

#[test]
fn test_layout() {
    let map = build(mmap_config()).unwrap();

    assert_eq!(map.otp().size(), 128);
    let layout: Vec<_> = map
        .partitions()
        .iter()
        .map(|p| (p.name.as_str(), p.offset, p.size))
        .collect();
    assert_eq!(
        layout,
        vec![
            ("VENDOR_TEST", 0, 16),
            ("HW_CFG", 16, 72),
            ("SECRET0", 88, 24),
            ("LIFE_CYCLE", 112, 16),
        ]
    );

    let hw_cfg = map.get_part("HW_CFG").unwrap();
    assert_eq!(hw_cfg.variant, Variant::Buffered);
    assert_eq!(hw_cfg.write_lock, LockMode::Digest);
    let offsets: Vec<_> = hw_cfg
        .items
        .iter()
        .map(|i| (i.name.as_str(), i.offset, i.size, i.is_digest))
        .collect();
    assert_eq!(
        offsets,
        vec![
            ("DEVICE_ID", 16, 4, false),
            ("EN_FEATURE", 20, 1, false),
            ("HW_CFG_DIGEST", 80, 8, true),
        ]
    );

    let digest = map.get_item("VENDOR_TEST", "VENDOR_TEST_DIGEST").unwrap();
    assert_eq!(digest.offset, 8);
    assert!(map.get_item("LIFE_CYCLE", "LIFE_CYCLE_DIGEST").is_none());
    assert_eq!(map.get_item("LIFE_CYCLE", "LC_STATE").unwrap().offset, 116);

    let secret0 = map.get_part("SECRET0").unwrap();
    assert!(secret0.is_keymgr_creator);
    assert!(!secret0.is_keymgr_owner);
    assert_eq!(map.lc_partition().unwrap().name, "LIFE_CYCLE");
}

#[test]
fn test_missing_lookups() {
    let map = build(mmap_config()).unwrap();
    assert!(map.get_part("SECRET9").is_none());
    assert!(map.get_item("SECRET0", "FOO").is_none());
    assert!(map.get_item("SECRET9", "FOO").is_none());
    assert!(map.key("Secret9Key").is_none());
}

#[test]
fn test_netlist_constants() {
    let mut config = mmap_config();
    config["seed"] = json!(77);
    let map = build(config.clone()).unwrap();
    let again = build(config).unwrap();

    let key = map.key("Secret0Key").unwrap();
    assert_eq!(key.value.bytes().unwrap().len(), 16);
    assert_eq!(key, again.key("Secret0Key").unwrap());
    assert_eq!(
        map.key("Secret1Key").unwrap().value.as_u128(),
        Some(0x0123456789abcdef_fedcba9876543210)
    );

    let digest = map.digest("CnstyDigest").unwrap();
    assert_eq!(digest.iv.bytes().unwrap().len(), 8);
    assert_eq!(digest.cnst.bytes().unwrap().len(), 16);
    assert_eq!(digest, again.digest("CnstyDigest").unwrap());

    // Mubi items default to an encoded false, other items to zero, and
    // digest items draw a random invalid default.
    let en = map.get_item("HW_CFG", "EN_FEATURE").unwrap();
    assert_eq!(en.inv_default, HexValue::Fixed(vec![0x69]));
    let id = map.get_item("HW_CFG", "DEVICE_ID").unwrap();
    assert_eq!(id.inv_default, HexValue::Fixed(vec![0; 4]));
    let digest_item = map.get_item("SECRET0", "SECRET0_DIGEST").unwrap();
    assert_eq!(digest_item.inv_default.bytes().unwrap().len(), 8);

    let mut other = mmap_config();
    other["seed"] = json!(78);
    let other = build(other).unwrap();
    assert_ne!(key, other.key("Secret0Key").unwrap());
}

#[test]
fn test_top_level_errors() {
    for field in ["seed", "otp", "scrambling", "partitions"] {
        let mut config = mmap_config();
        config.as_object_mut().unwrap().remove(field);
        assert!(
            matches!(build_err(config), OtpError::MissingField { .. }),
            "{field}"
        );
    }

    let mut config = mmap_config();
    config["scrambling"]["key_size"] = json!(32);
    assert!(matches!(build_err(config), OtpError::InvalidValue { .. }));

    let mut config = mmap_config();
    config["scrambling"]["keys"][1]["name"] = json!("Secret0Key");
    assert!(matches!(build_err(config), OtpError::DuplicateName { .. }));
}

#[test]
fn test_partition_errors() {
    let cases = vec![
        case(
            |c| c["partitions"][3]["variant"] = json!("Buffered"),
            |e| matches!(e, OtpError::InvalidConfig(_)),
        ),
        case(
            |c| c["partitions"][1]["name"] = json!("VENDOR_TEST"),
            |e| matches!(e, OtpError::DuplicateName { kind: "partition", .. }),
        ),
        case(
            |c| c["partitions"][0]["variant"] = json!("Sometimes"),
            |e| matches!(e, OtpError::InvalidValue { .. }),
        ),
        case(
            |c| c["partitions"][2]["key_sel"] = json!("Secret7Key"),
            |e| matches!(e, OtpError::UnknownReference { .. }),
        ),
        case(
            |c| c["partitions"][2]["key_sel"] = json!("NoKey"),
            |e| matches!(e, OtpError::InvalidConfig(_)),
        ),
        case(
            |c| c["partitions"][1]["sw_digest"] = json!(true),
            |e| matches!(e, OtpError::InvalidConfig(_)),
        ),
        case(
            |c| c["partitions"][0]["hw_digest"] = json!(true),
            |e| matches!(e, OtpError::InvalidConfig(_)),
        ),
        case(
            |c| c["partitions"][1]["read_lock"] = json!("CSR"),
            |e| matches!(e, OtpError::InvalidConfig(_)),
        ),
        case(
            |c| c["partitions"][3]["write_lock"] = json!("digest"),
            |e| matches!(e, OtpError::InvalidConfig(_)),
        ),
        case(
            |c| c["partitions"][0]["read_lock"] = json!("sometimes"),
            |e| matches!(e, OtpError::InvalidValue { .. }),
        ),
        case(
            |c| c["partitions"][0]["items"] = json!([]),
            |e| matches!(e, OtpError::InvalidConfig(_)),
        ),
        case(
            |c| c["partitions"][1]["items"][1]["name"] = json!("DEVICE_ID"),
            |e| matches!(e, OtpError::DuplicateName { kind: "item", .. }),
        ),
        case(
            |c| c["partitions"][2]["secret"] = json!(false),
            |e| matches!(e, OtpError::InvalidConfig(_)),
        ),
        case(
            |c| c["partitions"][2]["items"][0]["iskeymgr_owner"] = json!(true),
            |e| matches!(e, OtpError::InvalidConfig(_)),
        ),
        case(
            |c| c["partitions"][1]["items"][1]["size"] = json!(5),
            |e| matches!(e, OtpError::InvalidValue { .. }),
        ),
        case(
            |c| c["partitions"][0]["size"] = json!(12),
            |e| matches!(e, OtpError::Misaligned { .. }),
        ),
        case(
            |c| c["partitions"][0]["size"] = json!(8),
            |e| matches!(e, OtpError::InsufficientSpace { .. }),
        ),
        case(
            |c| c["partitions"][3]["size"] = json!(8),
            |e| matches!(e, OtpError::InsufficientSpace { .. }),
        ),
        case(
            |c| c["otp"]["depth"] = json!(16),
            |e| matches!(e, OtpError::InsufficientSpace { .. }),
        ),
        case(
            |c| c["partitions"][1]["hw_digest"] = json!("maybe"),
            |e| matches!(e, OtpError::InvalidValue { .. }),
        ),
    ];

    for (i, (mutate, check)) in cases.into_iter().enumerate() {
        let mut config = mmap_config();
        mutate(&mut config);
        let err = build_err(config);
        assert!(check(&err), "case {i}: {err}");
        assert_ne!(err.category(), ErrorCategory::Internal);
    }
}

#[test]
fn test_tables() {
    let mut config = mmap_config();
    config["seed"] = json!(5);
    let map = build(config).unwrap();

    let partitions = map.partitions_table();
    let lines: Vec<_> = partitions.lines().collect();
    assert_eq!(lines.len(), 6);
    assert!(lines[0].starts_with("|  Partition  |"));
    assert!(lines[2].contains("VENDOR_TEST"));
    assert!(lines[2].contains("yes (digest)"));
    assert!(lines[2].contains("Vendor test partition."));

    let mmap = map.mmap_table();
    assert!(mmap.contains("[HW_CFG_DIGEST](#Reg_hw_cfg_digest_0)"));
    assert!(mmap.contains("0x050"));
    // One row per item, including digests.
    assert_eq!(mmap.lines().count(), 2 + 9);

    let desc = map.description_table();
    assert!(desc.contains("Device identifier."));
    assert!(!desc.contains("TEST_UNLOCK_TOKEN"));
    assert!(!desc.contains("SCRATCH"));
    assert!(!desc.contains("LC_STATE"));
    assert!(!desc.contains("DIGEST"));

    let digests = map.digests_table();
    assert_eq!(digests.lines().count(), 2 + 3);
    assert!(digests.contains("[SECRET0_DIGEST](#Reg_secret0_digest_0)"));
}
