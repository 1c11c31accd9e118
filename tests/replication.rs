mod common;

use multipaxos::message::*;
use multipaxos::{ProposalNumber, Role};

use common::Cluster;

#[test]
fn single_value_is_learned_everywhere() {
    let mut cluster = Cluster::established(3);
    assert_eq!(cluster.replicas[0].state().role(), Role::Dictated);

    cluster.request(0, 1, 0, ProposalNumber::default(), "X");
    cluster.run();

    for id in 0..3 {
        assert_eq!(cluster.learned(id, 0), Some(b"X".to_vec()));
    }
    assert!(cluster.acked(1, 0));
    cluster.check_agreement();
}

#[test]
fn sequential_requests_fill_consecutive_slots() {
    let mut cluster = Cluster::established(5);
    for request_no in 0..10 {
        let value = format!("value-{}", request_no);
        cluster.request(0, 1, request_no, ProposalNumber::default(), &value);
        cluster.run();
        assert!(cluster.acked(1, request_no));
    }
    for id in 0..5 {
        assert_eq!(cluster.replicas[id].state().first_unchosen(), 10);
        assert_eq!(cluster.learned(id, 7), Some(b"value-7".to_vec()));
    }
    cluster.check_agreement();
}

#[test]
fn queued_requests_drain_in_order() {
    let mut cluster = Cluster::established(3);
    for (client_id, value) in vec![(1, "a"), (2, "b"), (3, "c")] {
        cluster.request(0, client_id, 0, ProposalNumber::default(), value);
    }
    cluster.run();
    assert_eq!(cluster.learned(2, 0), Some(b"a".to_vec()));
    assert_eq!(cluster.learned(2, 1), Some(b"b".to_vec()));
    assert_eq!(cluster.learned(2, 2), Some(b"c".to_vec()));
    assert!(cluster.replicas[0].state().waiting_for_client());
}

#[test]
fn majority_learns_and_minority_does_not() {
    let mut cluster = Cluster::established(5);

    // Three of five is exactly a majority.
    cluster.crash(3);
    cluster.crash(4);
    cluster.request(0, 1, 0, ProposalNumber::default(), "X");
    cluster.run();
    for id in 0..3 {
        assert_eq!(cluster.learned(id, 0), Some(b"X".to_vec()));
    }
    assert!(cluster.acked(1, 0));

    // Two of five is one short.
    cluster.crash(2);
    cluster.request(0, 1, 1, ProposalNumber::default(), "Y");
    cluster.run();
    for id in 0..2 {
        assert_eq!(cluster.learned(id, 1), None);
    }
    assert!(!cluster.acked(1, 1));
    assert_eq!(cluster.replicas[0].state().log().get(1).unwrap().votes(), 2);
}

#[test]
fn duplicate_request_in_quick_succession_is_chosen_once() {
    let mut cluster = Cluster::established(3);
    let request = RequestId { client_id: 1, request_no: 0 };

    // Second copy arrives while the first is in flight.
    cluster.request(0, 1, 0, ProposalNumber::default(), "X");
    cluster.request(0, 1, 0, ProposalNumber::default(), "X");
    cluster.run();
    assert_eq!(cluster.slots_of(request), vec![0]);

    // Resent after it was chosen: acknowledged, not proposed again.
    cluster.take_mailbox(1);
    cluster.request(0, 1, 0, ProposalNumber::default(), "X");
    cluster.run();
    assert!(cluster.acked(1, 0));
    assert_eq!(cluster.slots_of(request), vec![0]);
    assert_eq!(cluster.replicas[0].state().next_slot(), 1);
    assert_eq!(cluster.learned(0, 1), None);
}

#[test]
fn duplicate_queued_behind_another_request_is_chosen_once() {
    let mut cluster = Cluster::established(3);
    cluster.request(0, 1, 0, ProposalNumber::default(), "A");
    cluster.request(0, 2, 0, ProposalNumber::default(), "B");
    cluster.request(0, 2, 0, ProposalNumber::default(), "B");
    cluster.run();
    assert_eq!(cluster.slots_of(RequestId { client_id: 2, request_no: 0 }), vec![1]);
    assert_eq!(cluster.learned(1, 2), None);
}

#[test]
fn followers_redirect_to_the_leader() {
    let mut cluster = Cluster::established(3);
    cluster.request(2, 1, 0, ProposalNumber::default(), "X");
    cluster.run();
    assert_eq!(cluster.redirect(1), Some(ProposalNumber::default()));
    assert_eq!(cluster.learned(0, 0), None);
}

#[test]
fn skipped_slots_stay_empty() {
    let mut cluster = Cluster::new(3, 0).with_skipped_slots(0, vec![1]);
    cluster.start();
    cluster.run();
    for request_no in 0..3 {
        cluster.request(0, 1, request_no, ProposalNumber::default(), "v");
        cluster.run();
    }
    assert!(cluster.learned(0, 0).is_some());
    assert_eq!(cluster.learned(0, 1), None);
    assert!(cluster.learned(0, 2).is_some());
    assert!(cluster.learned(0, 3).is_some());
    assert_eq!(cluster.replicas[1].state().first_unchosen(), 1);
}
