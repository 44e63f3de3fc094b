use smithay::wayland::shell::wlr_layer::Layer;

use crate::{
    output::{LayerId, LayerState, LayerSurface},
    root::{Root, SurfaceRole},
    toolkit::{ClientId, OutputHandle, SurfaceId, Toolkit},
};

impl Root {
    fn layer_for_surface(&self, surface: SurfaceId) -> Option<LayerId> {
        match self.surfaces.get(&surface)? {
            SurfaceRole::Layer(id) => Some(*id),
            _ => None,
        }
    }

    pub(super) fn new_layer_surface(
        &mut self,
        surface: SurfaceId,
        client: ClientId,
        output: Option<OutputHandle>,
        layer: Layer,
        namespace: String,
        toolkit: &mut dyn Toolkit,
    ) {
        let output_id = match output {
            Some(handle) => self.output_handles.get(&handle).copied(),
            None => Some(self.preferred_output()),
        };
        let Some(output_id) = output_id.filter(|id| *id != self.noop_output()) else {
            tracing::warn!(namespace, "no output for new layer surface, closing");
            toolkit.close_surface(surface);
            return;
        };
        let Some(output) = self.outputs.get_mut(output_id) else {
            return;
        };

        tracing::debug!(
            namespace,
            requested_layer = ?layer,
            output = %output.name,
            "new layer surface"
        );
        let id = self.layers.insert(LayerSurface::new(
            surface, client, output_id, layer, namespace,
        ));
        output.layers.push(id);
        self.surfaces.insert(surface, SurfaceRole::Layer(id));
    }

    /// Takes the committed state and re-arranges. The first commit maps the
    /// surface for arrangement and answers with its initial configure.
    pub(super) fn layer_commit(
        &mut self,
        surface: SurfaceId,
        state: LayerState,
        toolkit: &mut dyn Toolkit,
    ) {
        let Some(layer) = self
            .layer_for_surface(surface)
            .and_then(|id| self.layers.get_mut(id))
        else {
            return;
        };
        if layer.mapped && layer.state == state {
            return;
        }
        tracing::debug!(
            namespace = %layer.namespace,
            layer = ?state.layer,
            zone = ?state.exclusive_zone,
            "layer commit"
        );
        layer.state = state;
        layer.mapped = true;
        self.arrange_all(toolkit);
    }

    pub(super) fn unmap_layer_surface(&mut self, surface: SurfaceId, toolkit: &mut dyn Toolkit) {
        let Some(layer) = self
            .layer_for_surface(surface)
            .and_then(|id| self.layers.get_mut(id))
        else {
            return;
        };
        if !layer.mapped {
            return;
        }
        layer.mapped = false;
        self.arrange_all(toolkit);
    }

    pub(super) fn destroy_layer_surface(&mut self, surface: SurfaceId, toolkit: &mut dyn Toolkit) {
        let Some(id) = self.layer_for_surface(surface) else {
            return;
        };
        self.surfaces.remove(&surface);
        let Some(layer) = self.layers.remove(id) else {
            return;
        };
        if let Some(output) = self.outputs.get_mut(layer.output) {
            output.layers.retain(|candidate| *candidate != id);
        }
        tracing::debug!(namespace = %layer.namespace, "layer surface destroyed");
        if layer.mapped {
            self.arrange_all(toolkit);
        } else {
            self.refresh_focus(toolkit);
        }
    }
}
