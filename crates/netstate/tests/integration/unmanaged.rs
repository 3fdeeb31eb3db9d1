//! Ownership handoff for externally managed interfaces.

use crate::common::{doc, journal_pos, lab, seed};

const FOREIGN_DUMMY: &str = r"---
interfaces:
- name: dummy1
  type: dummy
  state: up
  managed: false
  mtu: 1500
  ipv4:
    enabled: true
    dhcp: false
    address:
    - ip: 192.0.2.251
      prefix-length: 24
routes:
- destination: 0.0.0.0/0
  next-hop-address: 192.0.2.1
  next-hop-interface: dummy1
";

#[tokio::test]
async fn test_takeover_precedes_first_mutation() {
    let (r, _clock) = lab();
    seed(r.backend(), FOREIGN_DUMMY);

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

    let journal = r.backend().journal();
    assert!(journal_pos(&journal, "manage dummy1") < journal_pos(&journal, "update dummy1"));

    let live = r.query().await.unwrap();
    let iface = live.interface("dummy1").unwrap();
    assert_eq!(iface.managed, Some(true));
    assert_eq!(iface.mtu, Some(9000));
}

#[tokio::test]
async fn test_takeover_preserves_existing_configuration() {
    let (r, _clock) = lab();
    seed(r.backend(), FOREIGN_DUMMY);

    // Only the admin state is asserted; addresses and routes belong to
    // whoever configured them and must survive the handoff.
    r.reconcile(&doc(
        r"---
interfaces:
- name: dummy1
  state: up
",
    ))
    .await
    .unwrap();

    let live = r.query().await.unwrap();
    let iface = live.interface("dummy1").unwrap();
    assert_eq!(iface.managed, Some(true));
    assert_eq!(
        iface.ipv4.as_ref().unwrap().addresses.as_ref().unwrap().len(),
        1
    );
    assert_eq!(live.routes_via("dummy1").len(), 1);
}

#[tokio::test]
async fn test_takeover_just_to_bring_it_down() {
    let (r, _clock) = lab();
    seed(r.backend(), FOREIGN_DUMMY);

    // Nothing but the admin state is asserted; the handoff still has to
    // happen before the deactivation, and everything else stays put.
    r.reconcile(&doc(
        r"---
interfaces:
- name: dummy1
  state: down
",
    ))
    .await
    .unwrap();

    let journal = r.backend().journal();
    assert!(journal_pos(&journal, "manage dummy1") < journal_pos(&journal, "deactivate dummy1"));

    let live = r.query().await.unwrap();
    let iface = live.interface("dummy1").unwrap();
    assert_eq!(iface.managed, Some(true));
    assert!(!iface.is_up());
    assert_eq!(
        iface.ipv4.as_ref().unwrap().addresses.as_ref().unwrap().len(),
        1
    );
    assert_eq!(live.routes_via("dummy1").len(), 1);
}

#[tokio::test]
async fn test_undeclared_foreign_interfaces_are_left_alone() {
    let (r, _clock) = lab();
    seed(r.backend(), FOREIGN_DUMMY);
    seed(
        r.backend(),
        r"---
interfaces:
- name: dummy2
  type: dummy
  state: up
  managed: true
",
    );

    r.reconcile(&doc(
        r"---
interfaces:
- name: dummy2
  state: up
  mtu: 9000
",
    ))
    .await
    .unwrap();

    let journal = r.backend().journal();
    assert!(!journal.iter().any(|e| e.contains("dummy1")), "{:?}", journal);
    let live = r.query().await.unwrap();
    assert_eq!(live.interface("dummy1").unwrap().managed, Some(false));
}

#[tokio::test]
async fn test_delete_foreign_interface() {
    let (r, _clock) = lab();
    seed(r.backend(), FOREIGN_DUMMY);

    r.reconcile(&doc(
        r"---
interfaces:
- name: dummy1
  state: absent
",
    ))
    .await
    .unwrap();

    let journal = r.backend().journal();
    assert!(journal_pos(&journal, "manage dummy1") < journal_pos(&journal, "deactivate dummy1"));
    assert!(live_gone(&r).await);
}

async fn live_gone(
    r: &netstate::Reconciler<netstate::fake::FakeDaemon, crate::common::ManualClock>,
) -> bool {
    let live = r.query().await.unwrap();
    live.interface("dummy1").is_none() && live.routes_via("dummy1").is_empty()
}
