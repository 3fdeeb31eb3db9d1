//! End-to-end reconcile behavior against the lab daemon.

use netstate::Error;
use netstate::state::IpAddress;

use crate::common::{doc, journal_pos, lab, seed};

const STATIC_IP_AND_ROUTES: &str = r"---
interfaces:
- name: dummy1
  type: dummy
  state: up
  ipv4:
    enabled: true
    dhcp: false
    address:
    - ip: 192.0.2.252
      prefix-length: 24
    - ip: 192.0.2.251
      prefix-length: 24
routes:
- destination: 0.0.0.0/0
  next-hop-address: 192.0.2.1
  next-hop-interface: dummy1
  metric: 101
- destination: 198.51.100.0/24
  next-hop-address: 192.0.2.1
  next-hop-interface: dummy1
";

#[tokio::test]
async fn test_static_ip_and_routes() {
    let (r, _clock) = lab();
    let report = r.reconcile(&doc(STATIC_IP_AND_ROUTES)).await.unwrap();
    assert!(report.changed);
    assert!(report.applied.is_clean());

    let live = r.query().await.unwrap();
    let iface = live.interface("dummy1").unwrap();
    assert!(iface.is_up());
    assert_eq!(live.routes_via("dummy1").len(), 2);

    // Addresses land in document order.
    let addrs = iface.ipv4.as_ref().unwrap().addresses.as_ref().unwrap();
    assert_eq!(
        addrs,
        &[
            IpAddress::new("192.0.2.252".parse().unwrap(), 24),
            IpAddress::new("192.0.2.251".parse().unwrap(), 24),
        ]
    );

    // Routes go in only after the interface is active.
    let journal = r.backend().journal();
    let up = journal_pos(&journal, "activate dummy1");
    let route = journal_pos(&journal, "route-add");
    assert!(up < route, "journal: {:?}", journal);
}

#[tokio::test]
async fn test_reapply_is_idempotent() {
    let (r, _clock) = lab();
    r.reconcile(&doc(STATIC_IP_AND_ROUTES)).await.unwrap();
    let journal = r.backend().journal();

    let report = r.reconcile(&doc(STATIC_IP_AND_ROUTES)).await.unwrap();
    assert!(!report.changed);
    assert_eq!(r.backend().journal(), journal);
}

#[tokio::test]
async fn test_partial_document_leaves_unasserted_attributes() {
    let (r, _clock) = lab();
    r.reconcile(&doc(STATIC_IP_AND_ROUTES)).await.unwrap();

    // A later document that only asserts the MTU.
    r.reconcile(&doc(
        r"---
interfaces:
- name: dummy1
  state: up
  mtu: 9000
",
    ))
    .await
    .unwrap();

    let live = r.query().await.unwrap();
    let iface = live.interface("dummy1").unwrap();
    assert_eq!(iface.mtu, Some(9000));
    // Addresses and routes from the first document are untouched.
    let addrs = iface.ipv4.as_ref().unwrap().addresses.as_ref().unwrap();
    assert_eq!(addrs.len(), 2);
    assert_eq!(live.routes_via("dummy1").len(), 2);
}

#[tokio::test]
async fn test_address_reorder_is_applied() {
    let (r, _clock) = lab();
    r.reconcile(&doc(STATIC_IP_AND_ROUTES)).await.unwrap();

    let reordered = r"---
interfaces:
- name: dummy1
  state: up
  ipv4:
    enabled: true
    dhcp: false
    address:
    - ip: 192.0.2.251
      prefix-length: 24
    - ip: 192.0.2.252
      prefix-length: 24
";
    let report = r.reconcile(&doc(reordered)).await.unwrap();
    assert!(report.changed);

    let live = r.query().await.unwrap();
    let addrs = live
        .interface("dummy1")
        .unwrap()
        .ipv4
        .as_ref()
        .unwrap()
        .addresses
        .as_ref()
        .unwrap();
    assert_eq!(addrs[0].ip, "192.0.2.251".parse::<std::net::IpAddr>().unwrap());
}

#[tokio::test]
async fn test_delete_interface_removes_its_routes() {
    let (r, _clock) = lab();
    seed(
        r.backend(),
        r"---
interfaces:
- name: dummy1
  type: dummy
  state: up
  managed: true
- name: eth0
  type: ethernet
  state: up
  managed: true
routes:
- destination: 0.0.0.0/0
  next-hop-address: 192.0.2.1
  next-hop-interface: dummy1
- destination: 10.0.0.0/8
  next-hop-interface: eth0
",
    );

    r.reconcile(&doc(
        r"---
interfaces:
- name: dummy1
  state: absent
",
    ))
    .await
    .unwrap();

    let live = r.query().await.unwrap();
    assert!(live.interface("dummy1").is_none());
    assert!(live.routes_via("dummy1").is_empty());
    // The route over the untouched interface survives.
    assert_eq!(live.routes_via("eth0").len(), 1);

    // Routes drain before the interface goes away.
    let journal = r.backend().journal();
    assert!(journal_pos(&journal, "route-del") < journal_pos(&journal, "delete dummy1"));
}

#[tokio::test]
async fn test_unreachable_daemon_is_fatal() {
    let (r, _clock) = lab();
    r.backend().set_unreachable(true);
    let err = r.reconcile(&doc(STATIC_IP_AND_ROUTES)).await.unwrap_err();
    assert!(err.is_collection_failure());
}

#[tokio::test]
async fn test_route_through_unknown_interface_rejected_before_mutation() {
    let (r, _clock) = lab();
    let err = r
        .reconcile(&doc(
            r"---
interfaces: []
routes:
- destination: 0.0.0.0/0
  next-hop-interface: ghost0
",
        ))
        .await
        .unwrap_err();
    assert!(err.is_invalid_input());
    assert!(r.backend().journal().is_empty());
}

#[tokio::test]
async fn test_verifier_tolerates_lagging_queries() {
    let (r, clock) = lab();
    seed(
        r.backend(),
        r"---
interfaces:
- name: dummy1
  type: dummy
  state: up
  managed: true
",
    );
    // The daemon's query side serves a two-reads-old view. The first
    // read feeds the diff (harmless, nothing has changed yet); the
    // verifier burns the second and retries until it sees fresh data.
    r.backend().delay_observation(2);

    r.reconcile(&doc(
        r"---
interfaces:
- name: dummy1
  state: down
",
    ))
    .await
    .unwrap();

    assert_eq!(clock.sleeps(), 1);
    let live = r.query().await.unwrap();
    assert!(!live.interface("dummy1").unwrap().is_up());
}

#[tokio::test]
async fn test_failed_operation_surfaces_full_record() {
    let (r, _clock) = lab();
    r.backend().fail_op("route-add");
    let err = r.reconcile(&doc(STATIC_IP_AND_ROUTES)).await.unwrap_err();
    match err {
        Error::Apply {
            report,
            unconverged,
        } => {
            assert_eq!(report.error_count(), 2);
            assert!(!report.is_clean());
            // The error also reports the routes as still unsettled.
            assert!(
                unconverged.mismatches.iter().any(|m| m.attribute == "route"),
                "unconverged: {}",
                unconverged
            );
        }
        other => panic!("expected Apply, got {:?}", other),
    }
    // The interface work before the route failures still happened.
    let live = r.query().await.unwrap();
    assert!(live.interface("dummy1").is_some());
}
