//! Integration tests for the show engine
//!
//! Runs full requests against an in-memory database set:
//! - Counter differencing and clamping
//! - Baseline ("since last clear") correction inside a sampling window
//! - Alias translation in both directions
//! - Single- and multi-ASIC namespace handling, including a failing ASIC

use serde_json::Value;
use sonic_show_engine::counters::{Counter, CounterField, CounterSnapshot, CounterSnapshotEngine, SnapshotMap};
use sonic_show_engine::diff::{diff, diff_snapshot, field_diff};
use sonic_show_engine::ip_interfaces::{IpAddressDetail, IpInterfaceDetail};
use sonic_show_engine::topology::merge_across_namespaces;
use sonic_show_engine::{
    dispatch, AliasMap, EngineConfig, ErrorClass, MemoryStore, NamespaceRoleSet, QueryResolver,
    RawOptions, Result, ShowContext, ShowError, Store, StoreTarget,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

/// Test fixture: in-memory databases plus the context built over them
struct TestSetup {
    store: Arc<MemoryStore>,
    ctx: ShowContext,
    // Keeps the baseline file alive for the test's duration
    _baseline: Option<NamedTempFile>,
}

impl TestSetup {
    fn new() -> Self {
        Self::build(None, NamespaceRoleSet::single_asic())
    }

    fn with_baseline(content: &str) -> Self {
        let mut file = NamedTempFile::new().expect("Failed to create baseline file");
        file.write_all(content.as_bytes())
            .expect("Failed to write baseline file");
        Self::build(Some(file), NamespaceRoleSet::single_asic())
    }

    fn multi_asic(roles: NamespaceRoleSet) -> Self {
        Self::build(None, roles)
    }

    fn build(baseline: Option<NamedTempFile>, roles: NamespaceRoleSet) -> Self {
        let store = Arc::new(MemoryStore::new());
        let mut config = EngineConfig::default();
        config.counters.baseline_cache_path = match &baseline {
            Some(file) => file.path().to_path_buf(),
            None => "/nonexistent/portstat".into(),
        };
        let ctx = ShowContext::new(store.clone(), config)
            .with_alias_map(AliasMap::from_pairs([("Ethernet0", "etp1"), ("Ethernet4", "etp2")]))
            .with_namespace_roles(roles);
        Self {
            store,
            ctx,
            _baseline: baseline,
        }
    }

    /// Add a port with its counters to COUNTERS_DB and its state to APPL_DB
    fn add_port(&self, name: &str, oid: &str, counters: &[(&str, &str)]) {
        self.store
            .hset_default(Store::Counters, "COUNTERS_PORT_NAME_MAP", [(name, oid)]);
        self.set_counters(oid, counters);
        self.store.hset_default(
            Store::Appl,
            &format!("PORT_TABLE:{}", name),
            [("admin_status", "up"), ("oper_status", "up")],
        );
    }

    fn set_counters(&self, oid: &str, counters: &[(&str, &str)]) {
        self.store.hset_default(
            Store::Counters,
            &format!("COUNTERS:{}", oid),
            counters.iter().copied(),
        );
    }

    async fn run(&self, command: &str, args: &[&str], options: RawOptions) -> Result<Value> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        dispatch(&self.ctx, command, &args, &options, &CancellationToken::new()).await
    }
}

fn snapshot_with(values: &[(CounterField, i64)]) -> CounterSnapshot {
    let mut snapshot = CounterSnapshot::default();
    for &(field, value) in values {
        snapshot.set(field, Counter::Present(value));
    }
    snapshot
}

fn interface(name: &str, addresses: &[&str]) -> IpInterfaceDetail {
    IpInterfaceDetail {
        name: name.to_string(),
        ip_addresses: addresses.iter().map(|a| IpAddressDetail::new(*a)).collect(),
        admin_status: "up".to_string(),
        oper_status: "up".to_string(),
        master: None,
    }
}

#[test]
fn test_clamped_difference_is_never_negative() {
    for (old, new) in [(0, 0), (5, 9), (9, 5), (i64::MAX, 0), (0, i64::MAX)] {
        let delta = field_diff(Counter::Present(old), Counter::Present(new), true);
        assert!(delta.value().is_some_and(|d| d >= 0), "{} -> {}", old, new);
    }
    assert_eq!(field_diff(Counter::Present(42), Counter::Present(42), true), Counter::Present(0));
    assert_eq!(field_diff(Counter::Missing, Counter::Present(42), true), Counter::Present(42));
    assert_eq!(field_diff(Counter::Present(42), Counter::Missing, true), Counter::Missing);
}

#[test]
fn test_difference_keeps_newer_rates() {
    let mut old = snapshot_with(&[(CounterField::RxOk, 10)]);
    old.rates.rx_bps = Some(1.0);
    let mut new = snapshot_with(&[(CounterField::RxOk, 30)]);
    new.rates.rx_bps = Some(2500.0);
    new.rates.tx_util = Some(12.5);

    let delta = diff_snapshot(&old, &new);
    assert_eq!(delta.rates, new.rates);
    assert_eq!(delta.counter(CounterField::RxOk), Counter::Present(20));
}

#[test]
fn test_counter_reset_reports_zero() {
    let old = snapshot_with(&[(CounterField::RxOk, 100)]);
    let new = snapshot_with(&[(CounterField::RxOk, 80)]);
    let delta = diff_snapshot(&old, &new);
    assert_eq!(delta.counter(CounterField::RxOk).to_string(), "0");
}

#[test]
fn test_alias_round_trip() {
    let aliases = AliasMap::from_pairs([("Ethernet0", "etp1"), ("Ethernet4", "etp2")]);
    for name in ["Ethernet0", "Ethernet4"] {
        let alias = aliases.alias_of(name).unwrap();
        assert_eq!(aliases.name_of(alias), Some(name));
    }
}

#[test]
fn test_namespace_merge_is_idempotent() {
    let asic0 = vec![interface("Ethernet0", &["10.0.0.0/31"]), interface("Loopback0", &["10.1.0.1/32"])];
    let asic1 = vec![interface("Loopback0", &["10.1.0.1/32", "10.1.0.2/32"])];

    let once = merge_across_namespaces([
        ("asic0".to_string(), asic0.clone()),
        ("asic1".to_string(), asic1.clone()),
    ]);
    let twice = merge_across_namespaces([
        ("asic0".to_string(), asic0.clone()),
        ("asic0".to_string(), asic0),
        ("asic1".to_string(), asic1.clone()),
        ("asic1".to_string(), asic1),
    ]);
    assert_eq!(once, twice);

    let loopback = once.iter().find(|i| i.name == "Loopback0").unwrap();
    assert_eq!(loopback.ip_addresses.len(), 2);
}

#[tokio::test]
async fn test_summed_receive_counter() {
    let setup = TestSetup::new();
    setup.add_port(
        "Ethernet0",
        "oid:0x1000000000001",
        &[
            ("SAI_PORT_STAT_IF_IN_UCAST_PKTS", "100"),
            ("SAI_PORT_STAT_IF_IN_NON_UCAST_PKTS", "20"),
        ],
    );

    let value = setup
        .run("interfaces/counters", &[], RawOptions::new())
        .await
        .expect("counters request failed");
    assert_eq!(value["Ethernet0"]["RxOk"], "120");
    assert_eq!(value["Ethernet0"]["State"], "U");
}

#[tokio::test(start_paused = true)]
async fn test_counter_reset_inside_window() {
    let setup = TestSetup::new();
    setup.add_port(
        "Ethernet0",
        "oid:0x1",
        &[
            ("SAI_PORT_STAT_IF_IN_UCAST_PKTS", "100"),
            ("SAI_PORT_STAT_IF_IN_NON_UCAST_PKTS", "0"),
            ("SAI_PORT_STAT_IF_IN_ERRORS", "1"),
        ],
    );

    let options = RawOptions::new().with("period", "5");
    let request = setup.run("interfaces/counters", &[], options);
    let reset = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        setup.set_counters(
            "oid:0x1",
            &[
                ("SAI_PORT_STAT_IF_IN_UCAST_PKTS", "80"),
                ("SAI_PORT_STAT_IF_IN_ERRORS", "4"),
            ],
        );
    };
    let (value, ()) = tokio::join!(request, reset);
    let value = value.expect("windowed request failed");

    assert_eq!(value["Ethernet0"]["RxOk"], "0");
    assert_eq!(value["Ethernet0"]["RxErr"], "3");
}

#[tokio::test]
async fn test_alias_mode_rejects_canonical_names() {
    let setup = TestSetup::new();
    setup.add_port("Ethernet0", "oid:0x1", &[("SAI_PORT_STAT_IF_IN_ERRORS", "1")]);

    let options = RawOptions::new()
        .with("interface", "Ethernet0")
        .with("namingMode", "alias");
    let err = setup
        .run("interfaces/counters/errors", &[], options)
        .await
        .unwrap_err();
    assert!(matches!(err, ShowError::UnknownAlias(ref name) if name == "Ethernet0"));
    assert_eq!(err.class(), ErrorClass::InvalidArgument);

    let options = RawOptions::new()
        .with("interface", "etp1")
        .with("namingMode", "alias");
    let value = setup
        .run("interfaces/counters/errors", &[], options)
        .await
        .unwrap();
    assert_eq!(value["etp1"]["RxErr"], "1");
}

#[tokio::test(start_paused = true)]
async fn test_baseline_cancels_out_of_window_difference() {
    let setup = TestSetup::with_baseline(
        r#"{"Ethernet0": {"rx_ok": "50", "rx_err": "1"}, "time": "2025-06-01T08:00:00"}"#,
    );
    setup.add_port(
        "Ethernet0",
        "oid:0x1",
        &[
            ("SAI_PORT_STAT_IF_IN_UCAST_PKTS", "100"),
            ("SAI_PORT_STAT_IF_IN_NON_UCAST_PKTS", "0"),
            ("SAI_PORT_STAT_IF_IN_ERRORS", "2"),
        ],
    );
    let engine = CounterSnapshotEngine::new(&setup.ctx);
    let names = vec!["Ethernet0".to_string()];

    let corrected_first = engine.snapshot(&names).await.unwrap();
    let raw_first = engine.absolute_snapshot(&names).await.unwrap();
    assert_eq!(corrected_first["Ethernet0"].counter(CounterField::RxOk), Counter::Present(50));
    assert_eq!(
        corrected_first["Ethernet0"].cleared_at.as_deref(),
        Some("2025-06-01T08:00:00")
    );

    setup.set_counters(
        "oid:0x1",
        &[
            ("SAI_PORT_STAT_IF_IN_UCAST_PKTS", "175"),
            ("SAI_PORT_STAT_IF_IN_ERRORS", "9"),
        ],
    );
    let corrected_second = engine.snapshot(&names).await.unwrap();
    let raw_second = engine.absolute_snapshot(&names).await.unwrap();

    let corrected: SnapshotMap = diff(&corrected_first, &corrected_second);
    let raw: SnapshotMap = diff(&raw_first, &raw_second);
    for &field in CounterField::ALL {
        assert_eq!(
            corrected["Ethernet0"].counter(field),
            raw["Ethernet0"].counter(field),
            "{}",
            field.name()
        );
    }
    assert_eq!(raw["Ethernet0"].counter(CounterField::RxOk), Counter::Present(75));
}

#[tokio::test]
async fn test_single_asic_discovery_reads_nothing() {
    let store = Arc::new(MemoryStore::new());
    let resolver = QueryResolver::new(store.clone());

    let roles = NamespaceRoleSet::discover(&resolver, 1).await.unwrap();
    assert_eq!(roles.frontend, vec![String::new()]);
    assert!(roles.backend.is_empty());
    assert!(!roles.is_multi_asic());
    assert_eq!(store.read_count(), 0);
}

#[tokio::test]
async fn test_failing_asic_is_left_out() {
    let setup = TestSetup::multi_asic(NamespaceRoleSet {
        frontend: vec!["asic0".to_string(), "asic1".to_string()],
        ..Default::default()
    });
    let asic0 = StoreTarget::new(Store::Config, "asic0");
    let asic1 = StoreTarget::new(Store::Config, "asic1");
    setup
        .store
        .hset(&asic0, "INTERFACE|Ethernet0|10.0.0.0/31", [("scope", "global")]);
    setup
        .store
        .hset(&asic1, "INTERFACE|Ethernet8|10.0.0.8/31", [("scope", "global")]);
    setup.store.hset(
        &StoreTarget::new(Store::Appl, "asic1"),
        "PORT_TABLE:Ethernet8",
        [("admin_status", "up"), ("oper_status", "down")],
    );
    setup.store.hset_default(
        Store::Config,
        "LOOPBACK_INTERFACE|Loopback0|10.1.0.1/32",
        [("scope", "global")],
    );
    setup.store.fail_namespace("asic0");

    let value = setup
        .run("ip/interfaces", &[], RawOptions::new())
        .await
        .expect("a failing namespace must not fail the request");
    let names: Vec<&str> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Ethernet8", "Loopback0"]);
    assert_eq!(value[0]["oper_status"], "down");
    assert_eq!(value[0]["ip_addresses"][0]["address"], "10.0.0.8/31");
}

#[tokio::test]
async fn test_unknown_namespace_rejected() {
    let setup = TestSetup::multi_asic(NamespaceRoleSet {
        frontend: vec!["asic0".to_string()],
        ..Default::default()
    });
    let options = RawOptions::new().with("namespace", "asic7");
    let err = setup.run("ip/interfaces", &[], options).await.unwrap_err();
    assert!(matches!(err, ShowError::UnknownNamespace(_)));
}

fn interface_names(value: &Value) -> Vec<String> {
    let mut names: Vec<String> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_explicit_namespace_skips_default() {
    let setup = TestSetup::multi_asic(NamespaceRoleSet {
        frontend: vec!["asic0".to_string(), "asic1".to_string()],
        ..Default::default()
    });
    setup.store.hset(
        &StoreTarget::new(Store::Config, "asic0"),
        "INTERFACE|Ethernet0|10.0.0.0/31",
        [("scope", "global")],
    );
    setup.store.hset(
        &StoreTarget::new(Store::Config, "asic1"),
        "INTERFACE|Ethernet8|10.0.0.8/31",
        [("scope", "global")],
    );
    setup.store.hset_default(
        Store::Config,
        "LOOPBACK_INTERFACE|Loopback0|10.1.0.1/32",
        [("scope", "global")],
    );

    let options = RawOptions::new().with("namespace", "asic1");
    let value = setup.run("ip/interfaces", &[], options).await.unwrap();
    assert_eq!(interface_names(&value), vec!["Ethernet8"]);

    let value = setup.run("ip/interfaces", &[], RawOptions::new()).await.unwrap();
    assert_eq!(interface_names(&value), vec!["Ethernet0", "Ethernet8", "Loopback0"]);
}

#[tokio::test]
async fn test_multi_asic_defaults_to_frontend_view() {
    let setup = TestSetup::multi_asic(NamespaceRoleSet {
        frontend: vec!["asic0".to_string()],
        backend: vec!["asic1".to_string()],
        ..Default::default()
    });
    let asic0 = StoreTarget::new(Store::Config, "asic0");
    setup
        .store
        .hset(&asic0, "INTERFACE|Ethernet0|10.0.0.0/31", [("scope", "global")]);
    setup
        .store
        .hset(&asic0, "INTERFACE|Ethernet-BP0|10.0.1.0/31", [("scope", "global")]);
    setup.store.hset(
        &StoreTarget::new(Store::Config, "asic1"),
        "INTERFACE|Ethernet-BP8|10.0.1.8/31",
        [("scope", "global")],
    );
    setup.store.hset_default(
        Store::Config,
        "LOOPBACK_INTERFACE|Loopback4096|10.2.0.1/32",
        [("scope", "global")],
    );

    let value = setup.run("ip/interfaces", &[], RawOptions::new()).await.unwrap();
    assert_eq!(interface_names(&value), vec!["Ethernet0"]);

    let options = RawOptions::new().with("display", "all");
    let value = setup.run("ip/interfaces", &[], options).await.unwrap();
    assert_eq!(
        interface_names(&value),
        vec!["Ethernet-BP0", "Ethernet-BP8", "Ethernet0", "Loopback4096"]
    );
}
