use smithay::utils::{Logical, Size};

use crate::{
    config::AttachMode,
    root::{Root, SurfaceRole},
    toolkit::{ClientId, SurfaceId, Toolkit},
    view::{View, ViewId, ViewImpl, ViewKind},
};

impl Root {
    pub(crate) fn view_for_surface(&self, surface: SurfaceId) -> Option<ViewId> {
        match self.surfaces.get(&surface)? {
            SurfaceRole::View(id) => Some(*id),
            _ => None,
        }
    }

    pub(super) fn new_view(
        &mut self,
        surface: SurfaceId,
        client: ClientId,
        kind: ViewKind,
        natural_size: Size<i32, Logical>,
    ) {
        if self.surfaces.contains_key(&surface) {
            tracing::warn!(?surface, "surface already has a role");
            return;
        }

        let output_id = self.preferred_output();
        let Some(output) = self.outputs.get_mut(output_id) else {
            return;
        };
        let tags = output.focused_tags(true);
        let id = self.views.insert(View::new(
            ViewImpl::new(kind, surface),
            client,
            output_id,
            tags,
            natural_size,
        ));
        match self.config.attach_mode {
            AttachMode::Top => output.views.push(id),
            AttachMode::Bottom => output.views.append(id),
        }
        self.surfaces.insert(surface, SurfaceRole::View(id));
        tracing::debug!(?surface, ?kind, output = %output.name, %tags, "new view");
    }

    pub(super) fn map_view(&mut self, surface: SurfaceId, toolkit: &mut dyn Toolkit) {
        let Some(id) = self.view_for_surface(surface) else {
            tracing::warn!(?surface, "map of unknown view");
            return;
        };
        let Some(view) = self.views.get_mut(id) else {
            return;
        };
        if view.mapped {
            return;
        }
        view.mapped = true;
        let output = view.output;
        tracing::debug!(?surface, title = ?view.title, "view mapped");

        self.for_each_seat(toolkit, |seat, cx| {
            if seat.focused_output == output {
                seat.focus(cx, Some(id));
            }
        });
        self.arrange_all(toolkit);
    }

    pub(super) fn unmap_view(&mut self, surface: SurfaceId, toolkit: &mut dyn Toolkit) {
        let Some(id) = self.view_for_surface(surface) else {
            tracing::warn!(?surface, "unmap of unknown view");
            return;
        };
        if self.unmap(id, toolkit) {
            self.arrange_all(toolkit);
        }
    }

    /// Returns whether the view was mapped.
    fn unmap(&mut self, id: ViewId, toolkit: &mut dyn Toolkit) -> bool {
        let Some(view) = self.views.get_mut(id) else {
            return false;
        };
        if !view.mapped {
            return false;
        }
        view.mapped = false;
        tracing::debug!(surface = ?view.surface(), "view unmapped");

        self.for_each_seat(toolkit, |seat, cx| seat.handle_view_unmap(cx, id));
        self.cancel_in_transaction(id, toolkit);
        if let Some(view) = self.views.get_mut(id) {
            view.drop_stashed_buffer(toolkit);
        }
        true
    }

    pub(super) fn destroy_view(&mut self, surface: SurfaceId, toolkit: &mut dyn Toolkit) {
        let Some(id) = self.view_for_surface(surface) else {
            tracing::warn!(?surface, "destroy of unknown view");
            return;
        };
        let was_mapped = self.unmap(id, toolkit);

        for seat in self.seats.values_mut() {
            seat.forget_view(&mut self.views, id);
        }
        self.cancel_in_transaction(id, toolkit);

        let Some(mut view) = self.views.remove(id) else {
            return;
        };
        if let Some(output) = self.outputs.get_mut(view.output) {
            output.views.remove(id);
        }
        view.drop_stashed_buffer(toolkit);
        view.inner.for_each_surface(|surface| {
            self.surfaces.remove(&surface);
        });
        tracing::debug!(?surface, "view destroyed");

        if was_mapped {
            self.arrange_all(toolkit);
        }
    }

    pub(super) fn set_title(&mut self, surface: SurfaceId, title: String) {
        if let Some(view) = self
            .view_for_surface(surface)
            .and_then(|id| self.views.get_mut(id))
        {
            view.title = Some(title);
        }
    }

    pub(super) fn set_app_id(&mut self, surface: SurfaceId, app_id: String) {
        if let Some(view) = self
            .view_for_surface(surface)
            .and_then(|id| self.views.get_mut(id))
        {
            view.app_id = Some(app_id);
        }
    }

    pub(super) fn new_popup(&mut self, parent: SurfaceId, surface: SurfaceId) {
        let parent = match self.surfaces.get(&parent) {
            Some(SurfaceRole::View(id) | SurfaceRole::Popup(id)) => *id,
            _ => {
                tracing::debug!(?surface, "popup without a view parent");
                return;
            }
        };
        if let Some(view) = self.views.get_mut(parent)
            && view.inner.add_popup(surface)
        {
            self.surfaces.insert(surface, SurfaceRole::Popup(parent));
        }
    }

    pub(super) fn popup_destroyed(&mut self, surface: SurfaceId) {
        if let Some(SurfaceRole::Popup(parent)) = self.surfaces.remove(&surface)
            && let Some(view) = self.views.get_mut(parent)
        {
            view.inner.remove_popup(surface);
        }
    }
}
