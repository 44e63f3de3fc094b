use super::*;
use crate::geometry::rect;

#[test]
fn new_geometry_appears_only_once_every_client_acknowledged() {
    let mut h = Harness::new();
    let a = h.map_settled(1);
    assert_eq!(h.current_box(a), rect(0, 0, 1000, 500));
    h.toolkit.take();

    let b = h.map_view(2);
    assert!(h.root.transaction_in_flight());
    assert_eq!(h.root.views[a].pending_box, Some(rect(600, 0, 400, 500)));
    assert_eq!(h.root.views[b].pending_box, Some(rect(0, 0, 600, 500)));

    h.commit(1);
    assert!(h.root.transaction_in_flight());
    assert_eq!(h.current_box(a), rect(0, 0, 1000, 500));
    assert_eq!(h.current_box(b), rect(0, 0, 0, 0));

    h.commit(2);
    assert!(!h.root.transaction_in_flight());
    assert_eq!(h.current_box(a), rect(600, 0, 400, 500));
    assert_eq!(h.current_box(b), rect(0, 0, 600, 500));

    assert_eq!(h.toolkit.count(|r| matches!(r, Request::Stash(..))), 2);
    assert_eq!(h.toolkit.count(|r| matches!(r, Request::Release(_))), 2);
    assert_eq!(h.toolkit.count(|r| *r == Request::Repaint(OUTPUT)), 1);
}

#[test]
fn timeout_applies_everything_once_and_keeps_laggard_frame() {
    let mut h = Harness::new();
    let a = h.map_settled(1);
    let b = h.map_view(2);
    let id = h.last_timeout();

    h.commit(2);
    assert!(h.root.transaction_in_flight());

    h.dispatch(Event::TransactionTimeout(id));
    assert!(!h.root.transaction_in_flight());
    assert_eq!(h.current_box(a), rect(600, 0, 400, 500));
    assert_eq!(h.current_box(b), rect(0, 0, 600, 500));
    assert!(h.root.views[a].stashed_buffer().is_some());
    assert!(h.root.views[b].stashed_buffer().is_none());

    // A second firing of the same timer changes nothing.
    h.toolkit.take();
    h.dispatch(Event::TransactionTimeout(id));
    assert!(h.toolkit.requests.is_empty());
    assert_eq!(h.current_box(a), rect(600, 0, 400, 500));

    // The late client finally draws at its new size.
    h.commit(1);
    assert!(h.root.views[a].stashed_buffer().is_none());
    assert_eq!(h.toolkit.count(|r| matches!(r, Request::Release(_))), 1);
    assert_eq!(h.toolkit.count(|r| *r == Request::Repaint(OUTPUT)), 1);
    assert_eq!(h.toolkit.count(|r| matches!(r, Request::ProposeSize { .. })), 0);
}

#[test]
fn stale_timeout_is_ignored() {
    let mut h = Harness::new();
    h.map_view(1);
    let first = h.last_timeout();
    h.settle();

    h.map_view(2);
    let second = h.last_timeout();
    assert_ne!(first, second);

    h.dispatch(Event::TransactionTimeout(first));
    assert!(h.root.transaction_in_flight());
    h.dispatch(Event::TransactionTimeout(second));
    assert!(!h.root.transaction_in_flight());
}

#[test]
fn destroying_an_awaited_view_completes_the_transaction() {
    let mut h = Harness::new();
    let a = h.map_settled(1);
    h.map_view(2);
    h.commit(1);

    h.dispatch(Event::DestroyView(SurfaceId(2)));
    assert_eq!(h.root.views.len(), 1);
    assert_eq!(h.focused(), Some(a));
    // The cancelled transaction applied, and the survivor is already being
    // grown back to the full output.
    assert_eq!(h.current_box(a), rect(600, 0, 400, 500));
    assert!(h.root.transaction_in_flight());
    assert_eq!(h.root.views[a].pending_box, Some(rect(0, 0, 1000, 500)));

    h.settle();
    assert_eq!(h.current_box(a), rect(0, 0, 1000, 500));
}

#[test]
fn xwayland_views_apply_without_waiting() {
    let mut h = Harness::new();
    let x = h.create_view(5, ViewKind::Xwayland);
    h.dispatch(Event::MapView(SurfaceId(5)));

    assert!(!h.root.transaction_in_flight());
    assert_eq!(h.current_box(x), rect(0, 0, 1000, 500));
    assert_eq!(
        h.toolkit.count(|r| matches!(r, Request::ScheduleTimeout(..))),
        0
    );
}

#[test]
fn xwayland_geometry_still_waits_for_its_transaction() {
    let mut h = Harness::new();
    let a = h.map_settled(1);
    let x = h.create_view(5, ViewKind::Xwayland);
    h.dispatch(Event::MapView(SurfaceId(5)));

    assert!(h.root.transaction_in_flight());
    assert_eq!(h.current_box(x), rect(0, 0, 0, 0));

    h.commit(1);
    assert_eq!(h.current_box(x), rect(0, 0, 600, 500));
    assert_eq!(h.current_box(a), rect(600, 0, 400, 500));
}

#[test]
fn arrangement_requested_mid_transaction_runs_afterwards() {
    let mut h = Harness::new();
    h.map_settled(1);
    let b = h.map_view(2);
    let proposals = h.toolkit.count(|r| matches!(r, Request::ProposeSize { .. }));

    h.run("mod_master_factor +0.1");
    assert_eq!(
        h.toolkit.count(|r| matches!(r, Request::ProposeSize { .. })),
        proposals
    );

    h.settle();
    assert_eq!(h.current_box(b), rect(0, 0, 700, 500));
}
