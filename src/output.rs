use smithay::{
    utils::{Logical, Size},
    wayland::shell::wlr_layer::{Anchor, ExclusiveZone, KeyboardInteractivity, Layer, Margins},
};
use slotmap::{SlotMap, new_key_type};

use crate::{
    geometry::{self, Rect, TagSet},
    layout::{self, LayoutParams, LayoutType},
    toolkit::{ClientId, OutputHandle, SurfaceId},
    view::{ViewId, Views},
    view_stack::ViewStack,
};

new_key_type! {
    pub struct OutputId;
    pub struct LayerId;
}

pub type Layers = SlotMap<LayerId, LayerSurface>;

/// Double-buffered layer surface state as last committed by the client.
#[derive(Clone, Copy, Debug)]
pub struct LayerState {
    pub layer: Layer,
    pub anchor: Anchor,
    pub exclusive_zone: ExclusiveZone,
    pub margin: Margins,
    /// Zero on an axis means "stretch between the anchors".
    pub desired_size: Size<i32, Logical>,
    pub keyboard_interactivity: KeyboardInteractivity,
}

// `Margins` has no `PartialEq`.
impl PartialEq for LayerState {
    fn eq(&self, other: &Self) -> bool {
        let margins = |m: &Margins| (m.top, m.right, m.bottom, m.left);
        self.layer == other.layer
            && self.anchor == other.anchor
            && self.exclusive_zone == other.exclusive_zone
            && margins(&self.margin) == margins(&other.margin)
            && self.desired_size == other.desired_size
            && self.keyboard_interactivity == other.keyboard_interactivity
    }
}

impl LayerState {
    pub fn new(layer: Layer) -> Self {
        Self {
            layer,
            anchor: Anchor::empty(),
            exclusive_zone: ExclusiveZone::Neutral,
            margin: Margins::default(),
            desired_size: Size::from((0, 0)),
            keyboard_interactivity: KeyboardInteractivity::None,
        }
    }

    /// Width or height left at zero without anchoring both opposite edges.
    pub fn violates_protocol(&self) -> bool {
        let horizontal = self.anchor.contains(Anchor::LEFT | Anchor::RIGHT);
        let vertical = self.anchor.contains(Anchor::TOP | Anchor::BOTTOM);
        (self.desired_size.w == 0 && !horizontal) || (self.desired_size.h == 0 && !vertical)
    }

    fn reserved_edge(&self) -> Option<Edge> {
        let horizontal = Anchor::LEFT | Anchor::RIGHT;
        let vertical = Anchor::TOP | Anchor::BOTTOM;
        let anchor = self.anchor;
        if anchor == Anchor::TOP || anchor == Anchor::TOP | horizontal {
            Some(Edge::Top)
        } else if anchor == Anchor::BOTTOM || anchor == Anchor::BOTTOM | horizontal {
            Some(Edge::Bottom)
        } else if anchor == Anchor::LEFT || anchor == Anchor::LEFT | vertical {
            Some(Edge::Left)
        } else if anchor == Anchor::RIGHT || anchor == Anchor::RIGHT | vertical {
            Some(Edge::Right)
        } else {
            None
        }
    }

    /// Box inside `bounds` honouring anchors and margins.
    fn place(&self, bounds: Rect) -> Rect {
        let Margins {
            top,
            right,
            bottom,
            left,
        } = self.margin;
        let anchor = self.anchor;

        let (x, width) = place_axis(
            bounds.loc.x,
            bounds.size.w,
            self.desired_size.w,
            (left, right),
            (anchor.contains(Anchor::LEFT), anchor.contains(Anchor::RIGHT)),
        );
        let (y, height) = place_axis(
            bounds.loc.y,
            bounds.size.h,
            self.desired_size.h,
            (top, bottom),
            (anchor.contains(Anchor::TOP), anchor.contains(Anchor::BOTTOM)),
        );
        geometry::rect(x, y, width, height)
    }
}

fn place_axis(
    start: i32,
    extent: i32,
    desired: i32,
    (margin_start, margin_end): (i32, i32),
    (anchor_start, anchor_end): (bool, bool),
) -> (i32, i32) {
    let available = extent
        .saturating_sub(margin_start)
        .saturating_sub(margin_end)
        .max(0);
    let length = if desired == 0 { available } else { desired.clamp(0, extent.max(0)) };
    let position = match (anchor_start, anchor_end) {
        (true, false) => start.saturating_add(margin_start),
        (false, true) => start
            .saturating_add(extent)
            .saturating_sub(margin_end)
            .saturating_sub(length),
        (true, true) => start
            .saturating_add(margin_start)
            .saturating_add((available - length) / 2),
        (false, false) => start + (extent - length) / 2,
    };
    (position, length)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

#[derive(Debug)]
pub struct LayerSurface {
    pub surface: SurfaceId,
    pub client: ClientId,
    pub output: OutputId,
    pub namespace: String,
    pub state: LayerState,
    pub mapped: bool,
    /// Output-relative box assigned by the last layer arrangement.
    pub geometry: Rect,
}

impl LayerSurface {
    pub fn new(
        surface: SurfaceId,
        client: ClientId,
        output: OutputId,
        layer: Layer,
        namespace: String,
    ) -> Self {
        Self {
            surface,
            client,
            output,
            namespace,
            state: LayerState::new(layer),
            mapped: false,
            geometry: geometry::rect(0, 0, 0, 0),
        }
    }

    /// Whether this surface asks for the keyboard above every window.
    pub fn wants_exclusive_focus(&self) -> bool {
        self.mapped
            && matches!(self.state.layer, Layer::Top | Layer::Overlay)
            && self.state.keyboard_interactivity == KeyboardInteractivity::Exclusive
    }
}

/// Result of [`Output::arrange_layers`].
#[derive(Debug, Default)]
pub struct LayerArrangement {
    pub usable_changed: bool,
    /// Surfaces whose state breaks the protocol. They were not placed.
    pub violators: Vec<LayerId>,
    /// Surfaces whose size changed and need a configure.
    pub resized: Vec<LayerId>,
}

#[derive(Debug)]
pub struct Output {
    /// `None` for the fallback output.
    pub handle: Option<OutputHandle>,
    pub name: String,
    pub size: Size<i32, Logical>,
    pub views: ViewStack,
    pub layers: Vec<LayerId>,

    pub current_focused_tags: TagSet,
    pub pending_focused_tags: Option<TagSet>,

    pub layout: LayoutType,
    pub params: LayoutParams,
    usable_box: Rect,
}

impl Output {
    pub fn new(
        handle: Option<OutputHandle>,
        name: impl Into<String>,
        size: Size<i32, Logical>,
        layout: LayoutType,
        params: LayoutParams,
    ) -> Self {
        Self {
            handle,
            name: name.into(),
            size,
            views: ViewStack::new(),
            layers: Vec::new(),
            current_focused_tags: TagSet::FIRST,
            pending_focused_tags: None,
            layout,
            params,
            usable_box: geometry::rect(0, 0, size.w, size.h),
        }
    }

    /// The zero-area output views are parked on while no real output exists.
    pub fn noop(layout: LayoutType, params: LayoutParams) -> Self {
        Self::new(None, "NOOP", Size::from((0, 0)), layout, params)
    }

    pub fn is_noop(&self) -> bool {
        self.handle.is_none()
    }

    pub fn focused_tags(&self, use_pending: bool) -> TagSet {
        match self.pending_focused_tags {
            Some(tags) if use_pending => tags,
            _ => self.current_focused_tags,
        }
    }

    pub fn full_box(&self) -> Rect {
        geometry::rect(0, 0, self.size.w, self.size.h)
    }

    pub fn usable_box(&self) -> Rect {
        self.usable_box
    }

    pub fn set_size(&mut self, size: Size<i32, Logical>) {
        self.size = size;
        self.usable_box = self.full_box();
    }

    pub fn has_pending_changes(&self) -> bool {
        self.pending_focused_tags
            .is_some_and(|tags| tags != self.current_focused_tags)
    }

    pub fn apply_pending(&mut self) {
        if let Some(tags) = self.pending_focused_tags.take() {
            self.current_focused_tags = tags;
        }
    }

    /// Visible, tiled views in stack order, judged on pending state.
    pub fn tiled_views(&self, views: &Views) -> Vec<ViewId> {
        self.views
            .visible(views, self.focused_tags(true), true)
            .filter(|id| views.get(*id).is_some_and(|view| !view.floating))
            .collect()
    }

    /// Recomputes the pending box of every visible tiled view. Floating views
    /// keep whatever box they have.
    pub fn arrange(&self, views: &mut Views) {
        if geometry::is_empty(&self.usable_box) {
            return;
        }

        let tiled = self.tiled_views(views);
        let boxes = layout::arrange(self.layout, tiled.len(), self.usable_box, &self.params);
        for (id, rect) in tiled.into_iter().zip(boxes) {
            if let Some(view) = views.get_mut(id) {
                tracing::trace!(output = %self.name, ?id, ?rect, "arranged view");
                view.pending_box = Some(rect);
            }
        }
    }

    /// Places every mapped layer surface and recomputes the usable box.
    ///
    /// Exclusive surfaces go first and each reserves its zone plus margin on
    /// the edge it is anchored to. Neutral surfaces are then placed inside
    /// the remaining area and the rest against the whole output.
    pub fn arrange_layers(&mut self, layers: &mut Layers) -> LayerArrangement {
        let mut result = LayerArrangement::default();
        let full = self.full_box();
        let mut usable = full;

        let mut ordered: Vec<LayerId> = self
            .layers
            .iter()
            .copied()
            .filter(|id| layers.get(*id).is_some_and(|layer| layer.mapped))
            .collect();
        ordered.sort_by_key(|id| layers.get(*id).map(|layer| layer_rank(layer.state.layer)));

        ordered.retain(|id| {
            let violates = layers
                .get(*id)
                .is_some_and(|layer| layer.state.violates_protocol());
            if violates {
                result.violators.push(*id);
            }
            !violates
        });

        for id in &ordered {
            let Some(layer) = layers.get_mut(*id) else {
                continue;
            };
            let ExclusiveZone::Exclusive(zone) = layer.state.exclusive_zone else {
                continue;
            };
            assign(layer, *id, usable, &mut result.resized);
            if let Some(edge) = layer.state.reserved_edge() {
                usable = reserve(usable, edge, zone, &layer.state.margin);
            }
        }

        for id in &ordered {
            let Some(layer) = layers.get_mut(*id) else {
                continue;
            };
            match layer.state.exclusive_zone {
                ExclusiveZone::Exclusive(_) => {}
                ExclusiveZone::Neutral => assign(layer, *id, usable, &mut result.resized),
                ExclusiveZone::DontCare => assign(layer, *id, full, &mut result.resized),
            }
        }

        if usable != self.usable_box {
            tracing::debug!(output = %self.name, ?usable, "usable box changed");
            self.usable_box = usable;
            result.usable_changed = true;
        }
        result
    }
}

fn assign(layer: &mut LayerSurface, id: LayerId, bounds: Rect, resized: &mut Vec<LayerId>) {
    let placed = layer.state.place(bounds);
    if placed.size != layer.geometry.size {
        resized.push(id);
    }
    layer.geometry = placed;
}

pub(crate) fn layer_rank(layer: Layer) -> u8 {
    match layer {
        Layer::Overlay => 0,
        Layer::Top => 1,
        Layer::Bottom => 2,
        Layer::Background => 3,
    }
}

/// Shrinks `usable` by a zone plus margin on one edge. Client values are
/// saturated and clamped so a bogus zone can at most take the whole area.
fn reserve(usable: Rect, edge: Edge, zone: u32, margin: &Margins) -> Rect {
    let (x, y, w, h) = (usable.loc.x, usable.loc.y, usable.size.w, usable.size.h);
    let zone = i32::try_from(zone).unwrap_or(i32::MAX);
    let (margin, extent) = match edge {
        Edge::Top => (margin.top, h),
        Edge::Bottom => (margin.bottom, h),
        Edge::Left => (margin.left, w),
        Edge::Right => (margin.right, w),
    };
    let amount = zone.saturating_add(margin).clamp(0, extent.max(0));
    match edge {
        Edge::Top => geometry::rect(x, y + amount, w, h - amount),
        Edge::Bottom => geometry::rect(x, y, w, h - amount),
        Edge::Left => geometry::rect(x + amount, y, w - amount, h),
        Edge::Right => geometry::rect(x, y, w - amount, h),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::rect,
        toolkit::{ClientId, SurfaceId},
        view::{View, ViewImpl, ViewKind},
    };

    struct Fixture {
        outputs: SlotMap<OutputId, ()>,
        layers: Layers,
        output: Output,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                outputs: SlotMap::with_key(),
                layers: Layers::with_key(),
                output: Output::new(
                    Some(OutputHandle(1)),
                    "HEADLESS-1",
                    Size::from((1920, 1080)),
                    LayoutType::default(),
                    LayoutParams::default(),
                ),
            }
        }

        fn layer(&mut self, state: LayerState) -> LayerId {
            let output = self.outputs.insert(());
            let mut layer = LayerSurface::new(
                SurfaceId(100 + self.layers.len() as u64),
                ClientId(9),
                output,
                state.layer,
                "panel".into(),
            );
            layer.state = state;
            layer.mapped = true;
            let id = self.layers.insert(layer);
            self.output.layers.push(id);
            id
        }
    }

    fn bar(anchor: Anchor, zone: ExclusiveZone, size: (i32, i32)) -> LayerState {
        LayerState {
            anchor,
            exclusive_zone: zone,
            desired_size: Size::from(size),
            ..LayerState::new(Layer::Top)
        }
    }

    #[test]
    fn exclusive_top_bar_shrinks_usable_box() {
        let mut fixture = Fixture::new();
        let id = fixture.layer(bar(
            Anchor::TOP | Anchor::LEFT | Anchor::RIGHT,
            ExclusiveZone::Exclusive(30),
            (0, 30),
        ));

        let result = fixture.output.arrange_layers(&mut fixture.layers);
        assert!(result.usable_changed);
        assert!(result.violators.is_empty());
        assert_eq!(result.resized, vec![id]);
        assert_eq!(fixture.layers[id].geometry, rect(0, 0, 1920, 30));
        assert_eq!(fixture.output.usable_box(), rect(0, 30, 1920, 1050));

        let again = fixture.output.arrange_layers(&mut fixture.layers);
        assert!(!again.usable_changed);
        assert!(again.resized.is_empty());
    }

    #[test]
    fn margins_add_to_the_reserved_zone() {
        let mut fixture = Fixture::new();
        let mut state = bar(
            Anchor::LEFT | Anchor::TOP | Anchor::BOTTOM,
            ExclusiveZone::Exclusive(100),
            (100, 0),
        );
        state.margin.left = 10;
        let id = fixture.layer(state);

        fixture.output.arrange_layers(&mut fixture.layers);
        assert_eq!(fixture.layers[id].geometry, rect(10, 0, 100, 1080));
        assert_eq!(fixture.output.usable_box(), rect(110, 0, 1810, 1080));
    }

    #[test]
    fn neutral_and_dont_care_surfaces() {
        let mut fixture = Fixture::new();
        fixture.layer(bar(
            Anchor::BOTTOM | Anchor::LEFT | Anchor::RIGHT,
            ExclusiveZone::Exclusive(40),
            (0, 40),
        ));
        let notification = fixture.layer(bar(
            Anchor::BOTTOM | Anchor::RIGHT,
            ExclusiveZone::Neutral,
            (300, 100),
        ));
        let wallpaper = fixture.layer(LayerState {
            layer: Layer::Background,
            ..bar(
                Anchor::TOP | Anchor::BOTTOM | Anchor::LEFT | Anchor::RIGHT,
                ExclusiveZone::DontCare,
                (0, 0),
            )
        });

        fixture.output.arrange_layers(&mut fixture.layers);
        assert_eq!(fixture.layers[notification].geometry, rect(1620, 940, 300, 100));
        assert_eq!(fixture.layers[wallpaper].geometry, rect(0, 0, 1920, 1080));
        assert_eq!(fixture.output.usable_box(), rect(0, 0, 1920, 1040));
    }

    #[test]
    fn zero_width_without_side_anchors_is_rejected() {
        let mut fixture = Fixture::new();
        let id = fixture.layer(bar(Anchor::TOP, ExclusiveZone::Exclusive(30), (0, 30)));

        let result = fixture.output.arrange_layers(&mut fixture.layers);
        assert_eq!(result.violators, vec![id]);
        assert!(!result.usable_changed);
        assert_eq!(fixture.output.usable_box(), fixture.output.full_box());
    }

    #[test]
    fn oversized_zone_takes_at_most_the_whole_output() {
        for zone in [i32::MAX as u32, u32::MAX] {
            let mut fixture = Fixture::new();
            let mut state = bar(
                Anchor::TOP | Anchor::LEFT | Anchor::RIGHT,
                ExclusiveZone::Exclusive(zone),
                (0, 30),
            );
            state.margin.top = 10;
            let id = fixture.layer(state);

            let result = fixture.output.arrange_layers(&mut fixture.layers);
            assert!(result.violators.is_empty());
            assert_eq!(fixture.layers[id].geometry, rect(0, 10, 1920, 30));
            assert_eq!(fixture.output.usable_box(), rect(0, 1080, 1920, 0));
        }
    }

    #[test]
    fn layer_states_compare_margins() {
        let state = bar(Anchor::TOP, ExclusiveZone::Exclusive(30), (100, 30));
        let mut moved = state;
        assert_eq!(state, moved);
        moved.margin.left = 4;
        assert_ne!(state, moved);
    }

    #[test]
    fn huge_margins_do_not_overflow_placement() {
        let mut fixture = Fixture::new();
        let mut state = bar(Anchor::BOTTOM | Anchor::RIGHT, ExclusiveZone::Neutral, (300, 100));
        state.margin.right = i32::MAX;
        state.margin.bottom = i32::MAX;
        let id = fixture.layer(state);

        fixture.output.arrange_layers(&mut fixture.layers);
        assert_eq!(fixture.layers[id].geometry.size, Size::from((300, 100)));
        assert_eq!(fixture.output.usable_box(), fixture.output.full_box());
    }

    #[test]
    fn arrange_skips_floating_and_is_idempotent() {
        let fixture = Fixture::new();
        let mut outputs = fixture.outputs;
        let output_id = outputs.insert(());
        let mut output = fixture.output;
        let mut views = Views::with_key();

        let ids: Vec<ViewId> = (0..3)
            .map(|index| {
                let mut view = View::new(
                    ViewImpl::new(ViewKind::XdgToplevel, SurfaceId(index)),
                    ClientId(index),
                    output_id,
                    TagSet::FIRST,
                    Size::from((400, 300)),
                );
                view.mapped = true;
                let id = views.insert(view);
                output.views.append(id);
                id
            })
            .collect();
        views[ids[2]].floating = true;

        output.arrange(&mut views);
        let first: Vec<_> = ids.iter().map(|id| views[*id].pending_box).collect();
        output.arrange(&mut views);
        let second: Vec<_> = ids.iter().map(|id| views[*id].pending_box).collect();

        assert_eq!(first, second);
        assert_eq!(first[0], Some(rect(0, 0, 1152, 1080)));
        assert_eq!(first[1], Some(rect(1152, 0, 768, 1080)));
        assert_eq!(first[2], None);
    }

    #[test]
    fn empty_usable_box_leaves_views_alone() {
        let mut outputs = SlotMap::<OutputId, ()>::with_key();
        let output_id = outputs.insert(());
        let mut output = Output::noop(LayoutType::default(), LayoutParams::default());
        let mut views = Views::with_key();
        let mut view = View::new(
            ViewImpl::new(ViewKind::XdgToplevel, SurfaceId(1)),
            ClientId(1),
            output_id,
            TagSet::FIRST,
            Size::from((400, 300)),
        );
        view.mapped = true;
        let id = views.insert(view);
        output.views.push(id);

        output.arrange(&mut views);
        assert_eq!(views[id].pending_box, None);
    }
}
