use smithay::input::keyboard::{FilterResult, Keysym, ModifiersState};

use crate::{
    root::Root,
    seat::FocusTarget,
    toolkit::{SeatHandle, Toolkit},
};

impl Root {
    /// Runs the keybinding matching a key press, if any. Keys go straight to
    /// the client while a layer surface holds the keyboard or an input
    /// inhibitor is active.
    pub fn handle_key(
        &mut self,
        seat: SeatHandle,
        keysym: Keysym,
        modifiers: &ModifiersState,
        pressed: bool,
        toolkit: &mut dyn Toolkit,
    ) -> FilterResult<()> {
        if !pressed {
            return FilterResult::Forward;
        }
        let Some(seat_id) = self.seat_by_handle(seat) else {
            tracing::warn!(?seat, "key press on unknown seat");
            return FilterResult::Forward;
        };
        if self.inhibitor.is_some() {
            return FilterResult::Forward;
        }
        if self
            .seats
            .get(seat_id)
            .is_some_and(|seat| matches!(seat.focused, FocusTarget::Layer(_)))
        {
            return FilterResult::Forward;
        }

        let Some(command) = self.config.command_for(modifiers, keysym).cloned() else {
            return FilterResult::Forward;
        };
        tracing::debug!(?keysym, ?command, "keybinding triggered");
        command.execute(self, seat_id, toolkit);
        FilterResult::Intercept(())
    }
}
