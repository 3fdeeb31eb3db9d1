//! Bond creation, membership, and reshaping.

use netstate::state::{BondMode, InterfaceState};

use crate::common::{doc, journal_pos, lab, seed};

const BOND_OVER_DUMMIES: &str = r"---
interfaces:
- name: bond99
  type: bond
  state: up
  bond:
    mode: balance-rr
    port:
    - dummy1
    - dummy2
- name: dummy1
  type: dummy
  state: up
- name: dummy2
  type: dummy
  state: up
";

const LIVE_BOND: &str = r"---
interfaces:
- name: bond99
  type: bond
  state: up
  managed: true
  bond:
    mode: balance-rr
    port:
    - dummy1
    - dummy2
- name: dummy1
  type: dummy
  state: up
  managed: true
  controller: bond99
- name: dummy2
  type: dummy
  state: up
  managed: true
  controller: bond99
";

#[tokio::test]
async fn test_create_bond_over_ports() {
    let (r, _clock) = lab();
    r.reconcile(&doc(BOND_OVER_DUMMIES)).await.unwrap();

    let live = r.query().await.unwrap();
    let bond = live.interface("bond99").unwrap();
    assert!(bond.is_up());
    assert_eq!(bond.bond.as_ref().unwrap().mode, Some(BondMode::BalanceRr));

    // Ports exist and come up before the bond that aggregates them.
    let journal = r.backend().journal();
    assert!(journal_pos(&journal, "create dummy1") < journal_pos(&journal, "create bond99"));
    assert!(journal_pos(&journal, "create dummy2") < journal_pos(&journal, "create bond99"));
    assert!(journal_pos(&journal, "activate dummy1") < journal_pos(&journal, "activate bond99"));
}

#[tokio::test]
async fn test_bond_mode_change_reactivates() {
    let (r, _clock) = lab();
    seed(r.backend(), LIVE_BOND);

    r.reconcile(&doc(
        r"---
interfaces:
- name: bond99
  state: up
  bond:
    mode: active-backup
    port:
    - dummy1
    - dummy2
",
    ))
    .await
    .unwrap();

    // The bond goes down, is reshaped, then comes back. Never an
    // in-place mode flip on an active bond.
    let journal = r.backend().journal();
    assert_eq!(
        journal,
        ["deactivate bond99", "update bond99", "activate bond99"]
    );

    let live = r.query().await.unwrap();
    let bond = live.interface("bond99").unwrap();
    assert_eq!(bond.state, Some(InterfaceState::Up));
    assert_eq!(
        bond.bond.as_ref().unwrap().mode,
        Some(BondMode::ActiveBackup)
    );
}

#[tokio::test]
async fn test_bond_reshape_with_down_assertion_stays_down() {
    let (r, _clock) = lab();
    seed(r.backend(), LIVE_BOND);

    r.reconcile(&doc(
        r"---
interfaces:
- name: bond99
  state: down
  bond:
    mode: active-backup
    port:
    - dummy1
    - dummy2
",
    ))
    .await
    .unwrap();

    // Asserting `down` alongside a reshape must not end in an activation.
    let journal = r.backend().journal();
    assert_eq!(journal, ["deactivate bond99", "update bond99"]);

    let live = r.query().await.unwrap();
    let bond = live.interface("bond99").unwrap();
    assert_eq!(bond.state, Some(InterfaceState::Down));
    assert_eq!(
        bond.bond.as_ref().unwrap().mode,
        Some(BondMode::ActiveBackup)
    );
}

#[tokio::test]
async fn test_bond_port_reorder_is_a_no_op() {
    let (r, _clock) = lab();
    seed(r.backend(), LIVE_BOND);

    let report = r
        .reconcile(&doc(
            r"---
interfaces:
- name: bond99
  state: up
  bond:
    mode: balance-rr
    port:
    - dummy2
    - dummy1
",
        ))
        .await
        .unwrap();
    assert!(!report.changed);
    assert!(r.backend().journal().is_empty());
}

#[tokio::test]
async fn test_port_membership_change_reactivates() {
    let (r, _clock) = lab();
    seed(r.backend(), LIVE_BOND);

    r.reconcile(&doc(
        r"---
interfaces:
- name: bond99
  state: up
  bond:
    mode: balance-rr
    port:
    - dummy1
",
    ))
    .await
    .unwrap();

    let journal = r.backend().journal();
    assert!(journal_pos(&journal, "deactivate bond99") < journal_pos(&journal, "update bond99"));
    assert!(journal_pos(&journal, "update bond99") < journal_pos(&journal, "activate bond99"));

    let live = r.query().await.unwrap();
    let ports = live.interface("bond99").unwrap().ports().unwrap().to_vec();
    assert_eq!(ports, ["dummy1"]);
}

#[tokio::test]
async fn test_named_ports_keep_their_configuration() {
    let (r, _clock) = lab();
    seed(
        r.backend(),
        r"---
interfaces:
- name: dummy1
  type: dummy
  state: up
  managed: true
  mtu: 9000
  ipv4:
    enabled: true
    dhcp: false
    address:
    - ip: 192.0.2.251
      prefix-length: 24
",
    );

    // The document only names dummy1 as a port; its own attributes are
    // never asserted and must survive the enslaving.
    r.reconcile(&doc(
        r"---
interfaces:
- name: bond99
  type: bond
  state: up
  bond:
    mode: balance-rr
    port:
    - dummy1
",
    ))
    .await
    .unwrap();

    let live = r.query().await.unwrap();
    let port = live.interface("dummy1").unwrap();
    assert_eq!(port.controller.as_deref(), Some("bond99"));
    assert_eq!(port.mtu, Some(9000));
    assert!(port.ipv4.as_ref().unwrap().addresses.is_some());
}

#[tokio::test]
async fn test_dangling_port_rejected_before_mutation() {
    let (r, _clock) = lab();
    let err = r
        .reconcile(&doc(
            r"---
interfaces:
- name: bond99
  type: bond
  state: up
  bond:
    mode: balance-rr
    port:
    - ghost0
",
        ))
        .await
        .unwrap_err();
    assert!(err.is_invalid_input());
    assert!(r.backend().journal().is_empty());
}

#[tokio::test]
async fn test_retire_bond_and_free_its_port() {
    let (r, _clock) = lab();
    seed(r.backend(), LIVE_BOND);

    r.reconcile(&doc(
        r"---
interfaces:
- name: bond99
  state: absent
- name: dummy1
  state: up
  controller: ''
- name: dummy2
  state: up
  controller: ''
",
    ))
    .await
    .unwrap();

    let live = r.query().await.unwrap();
    assert!(live.interface("bond99").is_none());
    assert!(live.interface("dummy1").unwrap().controller.is_none());

    // The bond is gone before its ports are repointed.
    let journal = r.backend().journal();
    assert!(journal_pos(&journal, "delete bond99") < journal_pos(&journal, "update dummy1"));
}
