//! Per-seat keyboard focus.
//!
//! A seat focuses at most one thing: a view, a layer surface, or nothing.
//! [`FocusTarget`] makes that a single value so the two can never be set
//! together.

use slotmap::SlotMap;

use crate::{
    output::{LayerId, Layers, Output, OutputId},
    toolkit::{ClientId, SeatHandle, SurfaceId, Toolkit},
    view::{ViewId, Views},
    view_stack::ViewStack,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FocusTarget {
    #[default]
    None,
    View(ViewId),
    Layer(LayerId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Everything focus changes need to look at or talk to.
pub struct FocusContext<'a> {
    pub views: &'a mut Views,
    pub outputs: &'a SlotMap<OutputId, Output>,
    pub layers: &'a Layers,
    /// Client holding the input inhibitor, if any.
    pub inhibitor: Option<ClientId>,
    pub toolkit: &'a mut dyn Toolkit,
}

impl FocusContext<'_> {
    fn allows(&self, client: ClientId) -> bool {
        self.inhibitor.is_none_or(|holder| holder == client)
    }

    fn surface_of(&self, target: FocusTarget) -> Option<SurfaceId> {
        match target {
            FocusTarget::None => None,
            FocusTarget::View(id) => self.views.get(id).map(|view| view.surface()),
            FocusTarget::Layer(id) => self.layers.get(id).map(|layer| layer.surface),
        }
    }
}

#[derive(Debug)]
pub struct Seat {
    pub handle: SeatHandle,
    pub name: String,
    pub focused: FocusTarget,
    /// Always valid. Points at the fallback output when nothing else exists.
    pub focused_output: OutputId,
    /// Most recently focused first.
    pub focus_stack: ViewStack,
    pub devices: Vec<String>,
}

impl Seat {
    pub fn new(handle: SeatHandle, name: impl Into<String>, focused_output: OutputId) -> Self {
        Self {
            handle,
            name: name.into(),
            focused: FocusTarget::None,
            focused_output,
            focus_stack: ViewStack::new(),
            devices: Vec::new(),
        }
    }

    pub fn focused_view(&self) -> Option<ViewId> {
        match self.focused {
            FocusTarget::View(id) => Some(id),
            _ => None,
        }
    }

    pub fn focused_layer(&self) -> Option<LayerId> {
        match self.focused {
            FocusTarget::Layer(id) => Some(id),
            _ => None,
        }
    }

    fn is_visible(&self, cx: &FocusContext<'_>, id: ViewId) -> bool {
        let Some(output) = cx.outputs.get(self.focused_output) else {
            return false;
        };
        cx.views.get(id).is_some_and(|view| {
            view.mapped
                && view.output == self.focused_output
                && view.tags(true).intersects(output.focused_tags(true))
        })
    }

    /// Picks `target` if it can be focused, otherwise the most recent
    /// visible view in the history.
    fn resolve(&self, cx: &FocusContext<'_>, target: Option<ViewId>) -> FocusTarget {
        let resolved = target
            .filter(|id| self.is_visible(cx, *id))
            .or_else(|| self.focus_stack.iter().find(|id| self.is_visible(cx, *id)));

        match resolved {
            Some(id) if cx.views.get(id).is_some_and(|view| cx.allows(view.client)) => {
                FocusTarget::View(id)
            }
            _ => FocusTarget::None,
        }
    }

    /// Focuses `target` or the best fallback. Does nothing while a layer
    /// surface holds the keyboard.
    pub fn focus(&mut self, cx: &mut FocusContext<'_>, target: Option<ViewId>) {
        if matches!(self.focused, FocusTarget::Layer(_)) {
            return;
        }
        let resolved = self.resolve(cx, target);
        self.transition(cx, resolved);
    }

    /// Grants exclusive keyboard focus to a layer surface, or releases it
    /// with `None`.
    pub fn focus_layer(&mut self, cx: &mut FocusContext<'_>, layer: Option<LayerId>) {
        match layer {
            Some(id) => {
                let grantable = cx
                    .layers
                    .get(id)
                    .is_some_and(|layer| layer.mapped && cx.allows(layer.client));
                if grantable {
                    self.transition(cx, FocusTarget::Layer(id));
                } else {
                    tracing::debug!(seat = %self.name, ?id, "layer focus refused");
                    self.focus_layer(cx, None);
                }
            }
            None => {
                if matches!(self.focused, FocusTarget::Layer(_)) {
                    let resolved = self.resolve(cx, None);
                    self.transition(cx, resolved);
                }
            }
        }
    }

    /// Re-validates the current focus after the visible set changed.
    pub fn refresh(&mut self, cx: &mut FocusContext<'_>) {
        match self.focused {
            FocusTarget::Layer(id) => {
                let valid = cx
                    .layers
                    .get(id)
                    .is_some_and(|layer| layer.mapped && cx.allows(layer.client));
                if !valid {
                    self.focus_layer(cx, None);
                }
            }
            FocusTarget::View(id) => self.focus(cx, Some(id)),
            FocusTarget::None => self.focus(cx, None),
        }
    }

    pub fn handle_view_unmap(&mut self, cx: &mut FocusContext<'_>, view: ViewId) {
        self.focus_stack.remove(view);
        if self.focused == FocusTarget::View(view) {
            self.focus(cx, None);
        }
    }

    /// Drops every reference to a destroyed view without talking to its
    /// client.
    pub fn forget_view(&mut self, views: &mut Views, view: ViewId) {
        self.focus_stack.remove(view);
        if self.focused == FocusTarget::View(view) {
            if let Some(view) = views.get_mut(view) {
                view.focus_dropped();
            }
            self.focused = FocusTarget::None;
        }
    }

    /// Moves focus along the focused output's visible views, wrapping at
    /// either end.
    pub fn cycle(&mut self, cx: &mut FocusContext<'_>, direction: Direction) {
        let Some(output) = cx.outputs.get(self.focused_output) else {
            return;
        };
        let visible: Vec<ViewId> = output
            .views
            .visible(cx.views, output.focused_tags(true), true)
            .collect();
        if visible.is_empty() {
            return;
        }

        let next = match self
            .focused_view()
            .and_then(|id| visible.iter().position(|candidate| *candidate == id))
        {
            Some(index) => match direction {
                Direction::Next => visible[(index + 1) % visible.len()],
                Direction::Previous => visible[(index + visible.len() - 1) % visible.len()],
            },
            None => visible[0],
        };
        self.focus(cx, Some(next));
    }

    fn transition(&mut self, cx: &mut FocusContext<'_>, target: FocusTarget) {
        if let FocusTarget::View(id) = target {
            self.focus_stack.push(id);
        }
        if target == self.focused {
            return;
        }

        let previous = std::mem::replace(&mut self.focused, target);
        if let FocusTarget::View(id) = previous
            && let Some(view) = cx.views.get_mut(id)
        {
            view.focus_lost(cx.toolkit);
        }
        if let FocusTarget::View(id) = target
            && let Some(view) = cx.views.get_mut(id)
        {
            view.focus_gained(cx.toolkit);
        }

        match cx.surface_of(target) {
            Some(surface) => cx.toolkit.send_keyboard_enter(self.handle, surface),
            None => cx.toolkit.clear_keyboard_focus(self.handle),
        }
        tracing::debug!(seat = %self.name, ?previous, current = ?target, "focus changed");
    }
}
