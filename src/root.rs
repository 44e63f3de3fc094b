//! The window manager core.
//!
//! [`Root`] owns every view, layer surface, output and seat. Events come in
//! through [`Root::dispatch`], arrangement runs in [`Root::arrange_all`] and
//! geometry reaches the screen through a single in-flight [`Transaction`].

use std::collections::HashMap;

use slotmap::{SlotMap, new_key_type};

use crate::{
    action::{Command, CommandError},
    config::{AttachMode, RuntimeConfig},
    output::{self, LayerId, Layers, Output, OutputId},
    seat::{Direction, FocusContext, FocusTarget, Seat},
    toolkit::{ClientId, OutputHandle, SeatHandle, SurfaceId, Toolkit},
    transaction::{Transaction, TransactionId},
    view::{ViewId, Views},
};

new_key_type! {
    pub struct SeatId;
}

/// What a toolkit surface is to us.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SurfaceRole {
    View(ViewId),
    Popup(ViewId),
    Layer(LayerId),
}

pub struct Root {
    pub config: RuntimeConfig,
    pub views: Views,
    pub layers: Layers,
    pub outputs: SlotMap<OutputId, Output>,
    /// Real outputs in the order they appeared.
    pub(crate) output_order: Vec<OutputId>,
    noop_output: OutputId,
    pub seats: SlotMap<SeatId, Seat>,
    pub(crate) default_seat: Option<SeatId>,

    transaction: Option<Transaction>,
    next_transaction: u64,
    /// An arrangement was requested while a transaction was in flight.
    arrange_queued: bool,

    pub(crate) inhibitor: Option<ClientId>,

    pub(crate) surfaces: HashMap<SurfaceId, SurfaceRole>,
    pub(crate) output_handles: HashMap<OutputHandle, OutputId>,
    pub(crate) seat_handles: HashMap<SeatHandle, SeatId>,
}

impl Root {
    pub fn new(config: RuntimeConfig) -> Self {
        let mut outputs = SlotMap::with_key();
        let noop_output = outputs.insert(Output::noop(
            config.default_layout,
            config.layout_params(),
        ));

        Self {
            config,
            views: Views::with_key(),
            layers: Layers::with_key(),
            outputs,
            output_order: Vec::new(),
            noop_output,
            seats: SlotMap::with_key(),
            default_seat: None,
            transaction: None,
            next_transaction: 1,
            arrange_queued: false,
            inhibitor: None,
            surfaces: HashMap::new(),
            output_handles: HashMap::new(),
            seat_handles: HashMap::new(),
        }
    }

    pub fn noop_output(&self) -> OutputId {
        self.noop_output
    }

    pub fn transaction_in_flight(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn seat_by_handle(&self, handle: SeatHandle) -> Option<SeatId> {
        self.seat_handles.get(&handle).copied()
    }

    pub fn focused_view(&self, seat: SeatId) -> Option<ViewId> {
        self.seats.get(seat)?.focused_view()
    }

    /// The output new views and layer surfaces land on.
    pub(crate) fn preferred_output(&self) -> OutputId {
        self.default_seat
            .and_then(|seat| self.seats.get(seat))
            .map(|seat| seat.focused_output)
            .or_else(|| self.output_order.first().copied())
            .unwrap_or(self.noop_output)
    }

    pub(crate) fn seat_output_mut(&mut self, seat: SeatId) -> Option<&mut Output> {
        let output = self.seats.get(seat)?.focused_output;
        self.outputs.get_mut(output)
    }

    /// The real output after or before `current`, wrapping around.
    pub(crate) fn adjacent_output(&self, current: OutputId, direction: Direction) -> Option<OutputId> {
        let count = self.output_order.len();
        if count == 0 {
            return None;
        }
        let Some(index) = self.output_order.iter().position(|id| *id == current) else {
            return self.output_order.first().copied();
        };
        let next = match direction {
            Direction::Next => (index + 1) % count,
            Direction::Previous => (index + count - 1) % count,
        };
        Some(self.output_order[next])
    }

    pub(crate) fn with_seat<R>(
        &mut self,
        seat: SeatId,
        toolkit: &mut dyn Toolkit,
        f: impl FnOnce(&mut Seat, &mut FocusContext<'_>) -> R,
    ) -> Option<R> {
        let seat = self.seats.get_mut(seat)?;
        let mut cx = FocusContext {
            views: &mut self.views,
            outputs: &self.outputs,
            layers: &self.layers,
            inhibitor: self.inhibitor,
            toolkit,
        };
        Some(f(seat, &mut cx))
    }

    pub(crate) fn for_each_seat(
        &mut self,
        toolkit: &mut dyn Toolkit,
        mut f: impl FnMut(&mut Seat, &mut FocusContext<'_>),
    ) {
        let mut cx = FocusContext {
            views: &mut self.views,
            outputs: &self.outputs,
            layers: &self.layers,
            inhibitor: self.inhibitor,
            toolkit,
        };
        for seat in self.seats.values_mut() {
            f(seat, &mut cx);
        }
    }

    /// Moves a view to the top or bottom of another output's stack. Its tags
    /// become the destination's focused tags so it stays visible.
    pub(crate) fn move_view(&mut self, view: ViewId, target: OutputId) {
        let Some(current) = self.views.get(view).map(|view| view.output) else {
            return;
        };
        if let Some(output) = self.outputs.get_mut(current) {
            output.views.remove(view);
        }
        let Some(output) = self.outputs.get_mut(target) else {
            return;
        };
        match self.config.attach_mode {
            AttachMode::Top => output.views.push(view),
            AttachMode::Bottom => output.views.append(view),
        }
        let tags = output.focused_tags(true);
        if let Some(view) = self.views.get_mut(view) {
            view.output = target;
            view.pending_tags = Some(tags);
        }
    }

    /// Parses and runs a command line on the default seat.
    pub fn run_command(&mut self, line: &str, toolkit: &mut dyn Toolkit) -> Result<(), CommandError> {
        let command = Command::parse_line(line)?;
        let seat = self.default_seat.ok_or(CommandError::NoSeat)?;
        command.execute(self, seat, toolkit);
        Ok(())
    }

    /// Applies a freshly loaded configuration. Per-output layout choices
    /// survive; layout parameters are reset to the configured values.
    pub fn apply_config(&mut self, config: RuntimeConfig, toolkit: &mut dyn Toolkit) {
        let params = config.layout_params();
        for output in self.outputs.values_mut() {
            output.params = params;
        }
        self.config = config;
        tracing::info!("configuration applied");
        self.arrange_all(toolkit);
    }

    /// Re-arranges every output and starts a transaction for the result.
    ///
    /// Layer surfaces are always placed right away. Views are only arranged
    /// when no transaction is in flight; otherwise the request is queued
    /// until the current one applies.
    pub fn arrange_all(&mut self, toolkit: &mut dyn Toolkit) {
        self.arrange_layers(toolkit);
        self.refresh_layer_focus(toolkit);

        if self.transaction.is_some() {
            tracing::trace!("transaction in flight, queueing arrangement");
            self.arrange_queued = true;
            return;
        }

        for output in self.outputs.values() {
            output.arrange(&mut self.views);
        }
        self.for_each_seat(toolkit, |seat, cx| seat.refresh(cx));
        self.start_transaction(toolkit);
    }

    fn arrange_layers(&mut self, toolkit: &mut dyn Toolkit) {
        for output in self.outputs.values_mut() {
            let result = output.arrange_layers(&mut self.layers);
            if result.usable_changed {
                tracing::debug!(output = %output.name, usable = ?output.usable_box(), "usable area changed");
            }

            for id in result.violators {
                let Some(layer) = self.layers.get_mut(id) else {
                    continue;
                };
                tracing::warn!(
                    namespace = %layer.namespace,
                    surface = ?layer.surface,
                    "layer surface has a zero size without anchoring both edges, closing"
                );
                layer.mapped = false;
                toolkit.close_surface(layer.surface);
            }

            for id in result.resized {
                if let Some(layer) = self.layers.get(id) {
                    toolkit.propose_size(
                        layer.surface,
                        layer.geometry.size.w as u32,
                        layer.geometry.size.h as u32,
                    );
                }
            }
        }
    }

    /// Hands the keyboard to the topmost exclusive layer surface of each
    /// seat's output, or takes it back when there is none.
    fn refresh_layer_focus(&mut self, toolkit: &mut dyn Toolkit) {
        let exclusive: HashMap<OutputId, LayerId> = self
            .outputs
            .iter()
            .filter_map(|(output_id, output)| {
                output
                    .layers
                    .iter()
                    .copied()
                    .filter(|id| {
                        self.layers
                            .get(*id)
                            .is_some_and(|layer| layer.wants_exclusive_focus())
                    })
                    .min_by_key(|id| {
                        self.layers
                            .get(*id)
                            .map(|layer| output::layer_rank(layer.state.layer))
                    })
                    .map(|layer| (output_id, layer))
            })
            .collect();

        self.for_each_seat(toolkit, |seat, cx| match exclusive.get(&seat.focused_output) {
            Some(layer) if seat.focused != FocusTarget::Layer(*layer) => {
                seat.focus_layer(cx, Some(*layer));
            }
            Some(_) => {}
            None => {
                if seat.focused_layer().is_some() {
                    seat.focus_layer(cx, None);
                }
            }
        });
    }

    /// Re-validates every seat's focus, e.g. after the inhibitor changed.
    pub(crate) fn refresh_focus(&mut self, toolkit: &mut dyn Toolkit) {
        self.refresh_layer_focus(toolkit);
        self.for_each_seat(toolkit, |seat, cx| seat.refresh(cx));
    }

    fn start_transaction(&mut self, toolkit: &mut dyn Toolkit) {
        let mut awaiting = Vec::new();
        let mut settled = Vec::new();
        let mut changed = self.outputs.values().any(Output::has_pending_changes);

        for (id, view) in self.views.iter_mut() {
            changed |= view.has_pending_changes();
            if !view.mapped {
                continue;
            }
            let resize = view.pending_resize();
            if view.configure_pending(toolkit) {
                awaiting.push(id);
            } else if resize {
                settled.push(id);
            }
        }

        if awaiting.is_empty() {
            if changed {
                tracing::trace!("no configure needed, applying immediately");
            }
            self.apply_pending(&settled, changed, toolkit);
            return;
        }

        for id in &awaiting {
            if let Some(view) = self.views.get_mut(*id) {
                view.stash_buffer(toolkit);
            }
        }

        let id = TransactionId(self.next_transaction);
        self.next_transaction += 1;
        toolkit.schedule_transaction_timeout(id, self.config.transaction_timeout);
        tracing::debug!(transaction = %id, views = awaiting.len(), "transaction started");
        self.transaction = Some(Transaction::new(id, awaiting, settled));
    }

    /// Records a client's acknowledgement of its configure.
    pub(crate) fn acknowledge_configure(&mut self, view: ViewId, toolkit: &mut dyn Toolkit) {
        let Some(transaction) = self.transaction.as_mut() else {
            return;
        };
        if !transaction.acknowledge(view) {
            return;
        }
        tracing::trace!(transaction = %transaction.id(), ?view, "configure acknowledged");
        if transaction.is_complete() {
            self.apply_transaction(toolkit);
        }
    }

    pub(crate) fn is_tracked(&self, view: ViewId) -> bool {
        self.transaction
            .as_ref()
            .is_some_and(|transaction| transaction.is_tracking(view))
    }

    /// Stops waiting on a view that is going away.
    pub(crate) fn cancel_in_transaction(&mut self, view: ViewId, toolkit: &mut dyn Toolkit) {
        let Some(transaction) = self.transaction.as_mut() else {
            return;
        };
        if transaction.cancel(view) && transaction.is_complete() {
            tracing::debug!(transaction = %transaction.id(), "last awaited view went away");
            self.apply_transaction(toolkit);
        }
    }

    pub fn handle_transaction_timeout(&mut self, id: TransactionId, toolkit: &mut dyn Toolkit) {
        match &self.transaction {
            Some(transaction) if transaction.id() == id => {
                tracing::warn!(
                    transaction = %id,
                    laggards = transaction.laggards().len(),
                    "transaction timed out, applying anyway"
                );
                self.apply_transaction(toolkit);
            }
            _ => tracing::trace!(transaction = %id, "stale transaction timeout ignored"),
        }
    }

    fn apply_transaction(&mut self, toolkit: &mut dyn Toolkit) {
        let Some(transaction) = self.transaction.take() else {
            return;
        };
        let mut tracked = transaction.acknowledged().to_vec();
        tracked.extend_from_slice(transaction.laggards());
        tracing::debug!(
            transaction = %transaction.id(),
            elapsed = ?transaction.started().elapsed(),
            "transaction applied"
        );
        self.apply_pending(&tracked, true, toolkit);

        for id in transaction.acknowledged() {
            if let Some(view) = self.views.get_mut(*id) {
                view.drop_stashed_buffer(toolkit);
            }
        }

        if std::mem::take(&mut self.arrange_queued) {
            self.arrange_all(toolkit);
        }
    }

    /// Promotes pending state to current. A view outside `tracked` whose
    /// pending box needs a configure keeps it for the next arrangement.
    fn apply_pending(&mut self, tracked: &[ViewId], repaint: bool, toolkit: &mut dyn Toolkit) {
        for (id, view) in self.views.iter_mut() {
            if view.mapped && view.pending_resize() && !tracked.contains(&id) {
                self.arrange_queued = true;
                if let Some(tags) = view.pending_tags.take() {
                    view.current_tags = tags;
                }
                continue;
            }
            view.apply_pending();
        }

        for output in self.outputs.values_mut() {
            output.apply_pending();
            if repaint && let Some(handle) = output.handle {
                toolkit.request_repaint(handle);
            }
        }
    }
}
