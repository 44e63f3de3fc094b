use smithay::wayland::shell::wlr_layer::{
    Anchor, ExclusiveZone, KeyboardInteractivity, Layer, Margins,
};

use super::*;
use crate::{geometry::rect, output::LayerState, seat::FocusTarget};

fn new_layer(h: &mut Harness, surface: u64, layer: Layer, namespace: &str) {
    h.dispatch(Event::NewLayerSurface {
        surface: SurfaceId(surface),
        client: ClientId(surface),
        output: Some(OUTPUT),
        layer,
        namespace: namespace.to_owned(),
    });
}

fn bar_state() -> LayerState {
    LayerState {
        anchor: Anchor::TOP | Anchor::LEFT | Anchor::RIGHT,
        exclusive_zone: ExclusiveZone::Exclusive(30),
        desired_size: Size::from((0, 30)),
        ..LayerState::new(Layer::Top)
    }
}

fn launcher_state() -> LayerState {
    LayerState {
        desired_size: Size::from((400, 200)),
        keyboard_interactivity: KeyboardInteractivity::Exclusive,
        ..LayerState::new(Layer::Overlay)
    }
}

#[test]
fn exclusive_bar_shrinks_the_tiling_area() {
    let mut h = Harness::new();
    let a = h.map_settled(1);

    new_layer(&mut h, 50, Layer::Top, "bar");
    h.dispatch(Event::LayerCommit {
        surface: SurfaceId(50),
        state: bar_state(),
    });
    assert!(h.toolkit.requests.contains(&Request::ProposeSize {
        surface: SurfaceId(50),
        width: 1000,
        height: 30,
    }));
    h.settle();
    assert_eq!(h.current_box(a), rect(0, 30, 1000, 470));

    // Re-committing identical state is a no-op.
    h.toolkit.take();
    h.dispatch(Event::LayerCommit {
        surface: SurfaceId(50),
        state: bar_state(),
    });
    assert!(h.toolkit.requests.is_empty());

    h.dispatch(Event::DestroyLayerSurface(SurfaceId(50)));
    h.settle();
    assert_eq!(h.current_box(a), rect(0, 0, 1000, 500));
}

#[test]
fn bar_margin_is_reserved_too() {
    let mut h = Harness::new();
    let a = h.map_settled(1);

    new_layer(&mut h, 50, Layer::Bottom, "dock");
    h.dispatch(Event::LayerCommit {
        surface: SurfaceId(50),
        state: LayerState {
            anchor: Anchor::BOTTOM,
            exclusive_zone: ExclusiveZone::Exclusive(40),
            desired_size: Size::from((600, 40)),
            margin: Margins {
                bottom: 10,
                ..Margins::default()
            },
            ..LayerState::new(Layer::Bottom)
        },
    });
    h.settle();
    assert_eq!(h.current_box(a), rect(0, 0, 1000, 450));
    assert_eq!(
        h.root.layers.values().next().map(|layer| layer.geometry),
        Some(rect(200, 450, 600, 40))
    );
}

#[test]
fn exclusive_keyboard_layer_takes_and_returns_focus() {
    let mut h = Harness::new();
    let a = h.map_settled(1);

    new_layer(&mut h, 60, Layer::Overlay, "launcher");
    h.dispatch(Event::LayerCommit {
        surface: SurfaceId(60),
        state: launcher_state(),
    });
    let seat = &h.root.seats[h.seat()];
    assert!(matches!(seat.focused, FocusTarget::Layer(_)));
    assert!(h.toolkit.requests.contains(&Request::KeyboardEnter(SEAT, SurfaceId(60))));
    assert!(!h.root.views[a].is_focused());

    // Keys belong to the launcher while it is up.
    assert!(matches!(h.press(Keysym::j, logo()), FilterResult::Forward));

    // Mapping a window does not steal the keyboard from it.
    h.map_settled(2);
    assert!(h.root.seats[h.seat()].focused_layer().is_some());

    h.dispatch(Event::UnmapLayerSurface(SurfaceId(60)));
    assert!(h.root.seats[h.seat()].focused_layer().is_none());
    assert_eq!(h.focused(), Some(a));
}

#[test]
fn zero_size_without_opposite_anchors_closes_the_surface() {
    let mut h = Harness::new();
    let a = h.map_settled(1);

    new_layer(&mut h, 70, Layer::Top, "broken");
    h.dispatch(Event::LayerCommit {
        surface: SurfaceId(70),
        state: LayerState {
            anchor: Anchor::TOP,
            exclusive_zone: ExclusiveZone::Exclusive(30),
            desired_size: Size::from((0, 30)),
            ..LayerState::new(Layer::Top)
        },
    });
    assert!(h.toolkit.requests.contains(&Request::Close(SurfaceId(70))));
    assert!(!h.root.transaction_in_flight());
    assert_eq!(h.current_box(a), rect(0, 0, 1000, 500));
}

#[test]
fn layer_surface_without_output_is_closed() {
    let mut h = Harness::bare();
    h.dispatch(Event::NewLayerSurface {
        surface: SurfaceId(80),
        client: ClientId(80),
        output: None,
        layer: Layer::Top,
        namespace: "bar".to_owned(),
    });
    assert_eq!(h.toolkit.requests, vec![Request::Close(SurfaceId(80))]);
    assert!(h.root.layers.is_empty());
}

#[test]
fn inhibitor_keeps_the_keyboard_from_other_layers() {
    let mut h = Harness::new();
    h.map_settled(1);
    h.dispatch(Event::InhibitorActivated(ClientId(99)));

    new_layer(&mut h, 60, Layer::Overlay, "launcher");
    h.dispatch(Event::LayerCommit {
        surface: SurfaceId(60),
        state: launcher_state(),
    });
    assert_eq!(h.root.seats[h.seat()].focused, FocusTarget::None);

    h.dispatch(Event::InhibitorDeactivated);
    assert!(h.root.seats[h.seat()].focused_layer().is_some());
}
