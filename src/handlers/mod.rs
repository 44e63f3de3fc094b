mod compositor;
mod layer_shell;
mod xdg_shell;

use smithay::utils::{Logical, Size};

use crate::{
    event::Event,
    output::{Output, OutputId},
    root::Root,
    seat::{FocusTarget, Seat},
    toolkit::{OutputHandle, SeatHandle, Toolkit},
};

impl Root {
    /// Feeds one toolkit event into the core.
    pub fn dispatch(&mut self, event: Event, toolkit: &mut dyn Toolkit) {
        match event {
            Event::NewView {
                surface,
                client,
                kind,
                natural_size,
            } => self.new_view(surface, client, kind, natural_size),
            Event::MapView(surface) => self.map_view(surface, toolkit),
            Event::UnmapView(surface) => self.unmap_view(surface, toolkit),
            Event::DestroyView(surface) => self.destroy_view(surface, toolkit),
            Event::Commit { surface, serial } => self.handle_commit(surface, serial, toolkit),
            Event::SetTitle { surface, title } => self.set_title(surface, title),
            Event::SetAppId { surface, app_id } => self.set_app_id(surface, app_id),
            Event::NewPopup { parent, surface } => self.new_popup(parent, surface),
            Event::PopupDestroyed(surface) => self.popup_destroyed(surface),

            Event::NewLayerSurface {
                surface,
                client,
                output,
                layer,
                namespace,
            } => self.new_layer_surface(surface, client, output, layer, namespace, toolkit),
            Event::LayerCommit { surface, state } => self.layer_commit(surface, state, toolkit),
            Event::UnmapLayerSurface(surface) => self.unmap_layer_surface(surface, toolkit),
            Event::DestroyLayerSurface(surface) => self.destroy_layer_surface(surface, toolkit),

            Event::OutputAdded { handle, name, size } => {
                self.output_added(handle, name, size, toolkit)
            }
            Event::OutputRemoved(handle) => self.output_removed(handle, toolkit),
            Event::OutputModeChanged { handle, size } => {
                self.output_mode_changed(handle, size, toolkit)
            }

            Event::NewSeat { handle, name } => self.new_seat(handle, name, toolkit),
            Event::SeatRemoved(handle) => self.seat_removed(handle, toolkit),
            Event::NewInputDevice { seat, name } => {
                match self.seat_by_handle(seat).and_then(|id| self.seats.get_mut(id)) {
                    Some(seat) => {
                        tracing::info!(seat = %seat.name, device = %name, "new input device");
                        seat.devices.push(name);
                    }
                    None => tracing::warn!(?seat, device = %name, "input device for unknown seat"),
                }
            }
            Event::Key {
                seat,
                keysym,
                modifiers,
                pressed,
            } => {
                self.handle_key(seat, keysym, &modifiers, pressed, toolkit);
            }

            Event::InhibitorActivated(client) => {
                tracing::info!(?client, "input inhibitor activated");
                self.inhibitor = Some(client);
                self.refresh_focus(toolkit);
                self.arrange_all(toolkit);
            }
            Event::InhibitorDeactivated => {
                tracing::info!("input inhibitor deactivated");
                self.inhibitor = None;
                self.refresh_focus(toolkit);
                self.arrange_all(toolkit);
            }

            Event::TransactionTimeout(id) => self.handle_transaction_timeout(id, toolkit),
        }
    }

    fn output_added(
        &mut self,
        handle: OutputHandle,
        name: String,
        size: Size<i32, Logical>,
        toolkit: &mut dyn Toolkit,
    ) {
        if self.output_handles.contains_key(&handle) {
            tracing::warn!(?handle, "output announced twice");
            return;
        }

        tracing::info!(output = %name, width = size.w, height = size.h, "output added");
        let id = self.outputs.insert(Output::new(
            Some(handle),
            name,
            size,
            self.config.default_layout,
            self.config.layout_params(),
        ));
        self.output_handles.insert(handle, id);
        self.output_order.push(id);

        // The first real output takes over everything parked on the fallback.
        if self.output_order.len() == 1 {
            let noop = self.noop_output();
            self.evacuate(noop, id);
            for seat in self.seats.values_mut() {
                seat.focused_output = id;
            }
            self.for_each_seat(toolkit, |seat, cx| seat.focus(cx, None));
        }

        self.arrange_all(toolkit);
    }

    fn output_removed(&mut self, handle: OutputHandle, toolkit: &mut dyn Toolkit) {
        let Some(id) = self.output_handles.remove(&handle) else {
            tracing::warn!(?handle, "removal of unknown output");
            return;
        };
        self.output_order.retain(|candidate| *candidate != id);
        let fallback = self
            .output_order
            .first()
            .copied()
            .unwrap_or(self.noop_output());

        if let Some(output) = self.outputs.get(id) {
            tracing::info!(output = %output.name, "output removed");
        }

        for layer in self
            .outputs
            .get_mut(id)
            .map(|output| std::mem::take(&mut output.layers))
            .unwrap_or_default()
        {
            if let Some(layer) = self.layers.get_mut(layer) {
                layer.mapped = false;
                toolkit.close_surface(layer.surface);
            }
        }
        self.for_each_seat(toolkit, |seat, cx| {
            if matches!(seat.focused, FocusTarget::Layer(_)) {
                seat.focus_layer(cx, None);
            }
        });

        self.evacuate(id, fallback);
        for seat in self.seats.values_mut() {
            if seat.focused_output == id {
                seat.focused_output = fallback;
            }
        }
        self.outputs.remove(id);
        self.for_each_seat(toolkit, |seat, cx| seat.focus(cx, None));

        self.arrange_all(toolkit);
    }

    /// Moves every view of `from` below the views of `to`, keeping their
    /// stacking order. Views take the focused tags of `to`.
    fn evacuate(&mut self, from: OutputId, to: OutputId) {
        let Some(views) = self
            .outputs
            .get_mut(from)
            .map(|output| std::mem::take(&mut output.views))
        else {
            return;
        };
        let Some(target) = self.outputs.get_mut(to) else {
            return;
        };
        if !views.is_empty() {
            tracing::debug!(count = views.len(), to = %target.name, "evacuating views");
        }
        let tags = target.focused_tags(true);
        for id in views.iter() {
            target.views.append(id);
            if let Some(view) = self.views.get_mut(id) {
                view.output = to;
                view.pending_tags = Some(tags);
            }
        }
    }

    fn output_mode_changed(
        &mut self,
        handle: OutputHandle,
        size: Size<i32, Logical>,
        toolkit: &mut dyn Toolkit,
    ) {
        let Some(output) = self
            .output_handles
            .get(&handle)
            .and_then(|id| self.outputs.get_mut(*id))
        else {
            tracing::warn!(?handle, "mode change for unknown output");
            return;
        };
        tracing::info!(output = %output.name, width = size.w, height = size.h, "output mode changed");
        output.set_size(size);
        self.arrange_all(toolkit);
    }

    fn new_seat(&mut self, handle: SeatHandle, name: String, toolkit: &mut dyn Toolkit) {
        if self.seat_handles.contains_key(&handle) {
            tracing::warn!(?handle, "seat announced twice");
            return;
        }
        let output = self
            .output_order
            .first()
            .copied()
            .unwrap_or(self.noop_output());
        tracing::info!(seat = %name, "new seat");
        let id = self.seats.insert(Seat::new(handle, name, output));
        self.seat_handles.insert(handle, id);
        if self.default_seat.is_none() {
            self.default_seat = Some(id);
        }
        self.refresh_focus(toolkit);
    }

    fn seat_removed(&mut self, handle: SeatHandle, toolkit: &mut dyn Toolkit) {
        let Some(id) = self.seat_handles.remove(&handle) else {
            return;
        };
        let Some(seat) = self.seats.remove(id) else {
            return;
        };
        tracing::info!(seat = %seat.name, "seat removed");
        if let FocusTarget::View(view) = seat.focused
            && let Some(view) = self.views.get_mut(view)
        {
            view.focus_lost(toolkit);
        }
        if self.default_seat == Some(id) {
            self.default_seat = self.seats.keys().next();
        }
    }
}
