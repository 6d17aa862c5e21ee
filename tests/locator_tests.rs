use async_trait::async_trait;
use backend_locator::config::LocatorConfig;
use backend_locator::hint::EnvironmentMetadata;
use backend_locator::locator::Locator;
use backend_locator::probe::Prober;
use backend_locator::scanner::scan_subnet;
use backend_locator::session::Session;
use backend_locator::types::{Strategy, SubnetPrefix};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Records every probe; answers `true` for the addresses in `up`.
#[derive(Default)]
struct RecordingProber {
    up: HashSet<Ipv4Addr>,
    calls: Mutex<Vec<Ipv4Addr>>,
}

impl RecordingProber {
    fn with_up(ips: &[Ipv4Addr]) -> Arc<Self> {
        Arc::new(Self {
            up: ips.iter().copied().collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Ipv4Addr> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prober for RecordingProber {
    async fn probe(&self, ip: Ipv4Addr) -> bool {
        self.calls.lock().unwrap().push(ip);
        self.up.contains(&ip)
    }
}

fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

#[tokio::test]
async fn reachable_hint_takes_fast_path_with_one_probe() {
    let prober = RecordingProber::with_up(&[ip("192.168.1.55")]);
    let locator = Locator::new(prober.clone(), LocatorConfig::default());
    let meta = EnvironmentMetadata::from_script_url("http://192.168.1.55:8081/index.bundle");

    let res = locator.resolve(&meta).await.expect("resolved");
    assert_eq!(res.address, ip("192.168.1.55"));
    assert_eq!(res.strategy, Strategy::HintProbed);
    assert_eq!(prober.calls(), vec![ip("192.168.1.55")]);

    let mut session = Session::new();
    session.apply(&res, 8000);
    assert_eq!(
        session.base_url().map(|u| u.as_str()),
        Some("http://192.168.1.55:8000")
    );
}

#[tokio::test]
async fn unreachable_hint_scans_outward_until_neighbour_answers() {
    let prober = RecordingProber::with_up(&[ip("172.24.171.101")]);
    let cfg = LocatorConfig {
        batch_size: 1,
        ..Default::default()
    };
    let locator = Locator::new(prober.clone(), cfg);
    let meta = EnvironmentMetadata::from_script_url("http://172.24.171.99:8081");

    let res = locator.resolve(&meta).await.expect("resolved");
    assert_eq!(res.address, ip("172.24.171.101"));
    assert_eq!(res.strategy, Strategy::HintSubnetScan);

    // Direct probe, then distance order from 99 with the lower neighbour first.
    let expected: Vec<Ipv4Addr> = ["99", "99", "98", "100", "97", "101"]
        .iter()
        .map(|o| ip(&format!("172.24.171.{o}")))
        .collect();
    assert_eq!(prober.calls(), expected);
}

#[tokio::test]
async fn neighbour_found_with_default_batches() {
    let prober = RecordingProber::with_up(&[ip("172.24.171.101")]);
    let locator = Locator::new(prober.clone(), LocatorConfig::default());
    let meta = EnvironmentMetadata::from_script_url("exp://172.24.171.99:8081");

    let res = locator.resolve(&meta).await.expect("resolved");
    assert_eq!(res.address, ip("172.24.171.101"));
    assert!(prober.calls().len() <= 1 + LocatorConfig::default().batch_size);
}

#[tokio::test]
async fn hint_is_returned_unverified_when_nothing_answers() {
    let prober = RecordingProber::with_up(&[]);
    let cfg = LocatorConfig::default();
    let budget = cfg.hint_scan_budget;
    let locator = Locator::new(prober.clone(), cfg);
    let meta = EnvironmentMetadata::from_script_url("http://10.0.0.42:8081");

    let res = locator.resolve(&meta).await.expect("hint fallback");
    assert_eq!(res.address, ip("10.0.0.42"));
    assert_eq!(res.strategy, Strategy::UnverifiedHint);
    assert!(!res.strategy.is_verified());
    assert_eq!(prober.calls().len(), 1 + budget);
}

#[tokio::test]
async fn blind_scan_without_hint_is_bounded_and_unresolved() {
    let prober = RecordingProber::with_up(&[]);
    let cfg = LocatorConfig::default();
    let expected_calls = cfg.common_prefixes.len() * cfg.blind_scan_budget;
    let locator = Locator::new(prober.clone(), cfg);

    let res = locator.resolve(&EnvironmentMetadata::default()).await;
    assert!(res.is_none());
    assert_eq!(prober.calls().len(), expected_calls);
}

#[tokio::test]
async fn loopback_only_metadata_falls_through_to_blind_scan() {
    let prober = RecordingProber::with_up(&[ip("192.168.0.1")]);
    let locator = Locator::new(prober.clone(), LocatorConfig::default());
    let meta = EnvironmentMetadata::from_script_url("http://127.0.0.1:8081/index.bundle");

    let res = locator.resolve(&meta).await.expect("resolved");
    assert_eq!(res.address, ip("192.168.0.1"));
    assert_eq!(res.strategy, Strategy::BlindScan);
    assert!(!prober.calls().contains(&ip("127.0.0.1")));
}

#[tokio::test]
async fn blind_scan_follows_prefix_priority() {
    let prober = RecordingProber::with_up(&[ip("10.0.0.1"), ip("172.16.0.1")]);
    let locator = Locator::new(prober, LocatorConfig::default());
    let res = locator.resolve(&EnvironmentMetadata::default()).await.unwrap();
    assert_eq!(res.address, ip("10.0.0.1"));
}

#[tokio::test]
async fn seeded_scan_never_exceeds_budget() {
    let prober = RecordingProber::with_up(&[]);
    let prefix = SubnetPrefix::new(192, 168, 1);
    let out = scan_subnet(prober.clone(), prefix, Some(100), 5, 1, &CancellationToken::new()).await;

    assert!(out.found.is_none());
    let order: Vec<u8> = prober.calls().iter().map(|a| a.octets()[3]).collect();
    assert_eq!(order, vec![100, 99, 101, 98, 102]);
}

#[tokio::test]
async fn cancelled_locator_stops_blind_scan() {
    let prober = RecordingProber::with_up(&[]);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let locator = Locator::new(prober.clone(), LocatorConfig::default()).with_cancel(cancel);
    assert!(locator.resolve(&EnvironmentMetadata::default()).await.is_none());
    assert!(prober.calls().is_empty());
}

#[tokio::test]
async fn blind_scan_is_capped_by_time_limit() {
    let prober = RecordingProber::with_up(&[]);
    let cfg = LocatorConfig {
        common_prefixes: (0..=100).map(|i| SubnetPrefix::new(10, 0, i)).collect(),
        ..Default::default()
    };
    let cap = cfg.max_blind_prefixes();
    let budget = cfg.blind_scan_budget;
    let locator = Locator::new(prober.clone(), cfg);

    assert_eq!(locator.blind_prefixes().len(), cap);
    assert!(locator.resolve(&EnvironmentMetadata::default()).await.is_none());
    assert_eq!(prober.calls().len(), cap * budget);
}
