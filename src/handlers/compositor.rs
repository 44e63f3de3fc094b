use smithay::utils::Serial;

use crate::{
    root::{Root, SurfaceRole},
    toolkit::{SurfaceId, Toolkit},
};

impl Root {
    /// A surface committed new state. For views this is where configure
    /// acknowledgements arrive.
    pub(super) fn handle_commit(
        &mut self,
        surface: SurfaceId,
        serial: Option<Serial>,
        toolkit: &mut dyn Toolkit,
    ) {
        let Some(SurfaceRole::View(id)) = self.surfaces.get(&surface).copied() else {
            return;
        };
        let tracked = self.is_tracked(id);
        let Some(view) = self.views.get_mut(id) else {
            return;
        };

        let acknowledged = serial.is_some_and(|serial| view.acknowledge(serial));
        if tracked {
            if acknowledged {
                self.acknowledge_configure(id, toolkit);
            }
            return;
        }

        // A laggard of an already applied transaction finally drew at its
        // new size.
        if view.stashed_buffer().is_some() && (acknowledged || !view.awaiting_configure()) {
            tracing::trace!(?surface, "dropping stashed buffer of late view");
            view.drop_stashed_buffer(toolkit);
            if let Some(handle) = self
                .outputs
                .get(view.output)
                .and_then(|output| output.handle)
            {
                toolkit.request_repaint(handle);
            }
        }
    }
}
