use smithay::utils::{Logical, Serial, Size};
use slotmap::{SlotMap, new_key_type};

use crate::{
    geometry::{self, Rect, TagSet},
    output::OutputId,
    toolkit::{BufferId, ClientId, SurfaceId, Toolkit},
};

new_key_type! {
    pub struct ViewId;
}

pub type Views = SlotMap<ViewId, View>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewKind {
    XdgToplevel,
    Xwayland,
}

/// Protocol-specific half of a view.
#[derive(Debug)]
pub enum ViewImpl {
    XdgToplevel {
        surface: SurfaceId,
        popups: Vec<SurfaceId>,
    },
    Xwayland {
        surface: SurfaceId,
    },
}

impl ViewImpl {
    pub fn new(kind: ViewKind, surface: SurfaceId) -> Self {
        match kind {
            ViewKind::XdgToplevel => ViewImpl::XdgToplevel {
                surface,
                popups: Vec::new(),
            },
            ViewKind::Xwayland => ViewImpl::Xwayland { surface },
        }
    }

    pub fn surface(&self) -> SurfaceId {
        match self {
            ViewImpl::XdgToplevel { surface, .. } | ViewImpl::Xwayland { surface } => *surface,
        }
    }

    /// Sends the new size. Returns the serial to wait for, if any.
    pub fn configure(&self, toolkit: &mut dyn Toolkit, size: Size<i32, Logical>) -> Option<Serial> {
        let width = size.w.max(0) as u32;
        let height = size.h.max(0) as u32;
        match self {
            ViewImpl::XdgToplevel { surface, .. } => toolkit.propose_size(*surface, width, height),
            // X11 configures take effect without an acknowledgement.
            ViewImpl::Xwayland { surface } => {
                toolkit.propose_size(*surface, width, height);
                None
            }
        }
    }

    pub fn close(&self, toolkit: &mut dyn Toolkit) {
        toolkit.close_surface(self.surface());
    }

    pub fn set_activated(&self, toolkit: &mut dyn Toolkit, activated: bool) {
        toolkit.set_activated(self.surface(), activated);
    }

    pub fn for_each_surface(&self, mut f: impl FnMut(SurfaceId)) {
        match self {
            ViewImpl::XdgToplevel { surface, popups } => {
                f(*surface);
                popups.iter().copied().for_each(f);
            }
            ViewImpl::Xwayland { surface } => f(*surface),
        }
    }

    pub fn add_popup(&mut self, popup: SurfaceId) -> bool {
        match self {
            ViewImpl::XdgToplevel { popups, .. } => {
                if !popups.contains(&popup) {
                    popups.push(popup);
                }
                true
            }
            ViewImpl::Xwayland { .. } => false,
        }
    }

    pub fn remove_popup(&mut self, popup: SurfaceId) -> bool {
        match self {
            ViewImpl::XdgToplevel { popups, .. } => {
                let before = popups.len();
                popups.retain(|candidate| *candidate != popup);
                before != popups.len()
            }
            ViewImpl::Xwayland { .. } => false,
        }
    }
}

/// What the renderer should draw for a view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderSource {
    /// The last good frame, shown while a transaction is in flight.
    Stashed(BufferId),
    Surfaces(Vec<SurfaceId>),
}

#[derive(Debug)]
pub struct View {
    pub(crate) inner: ViewImpl,
    pub client: ClientId,
    pub output: OutputId,

    pub current_box: Rect,
    pub pending_box: Option<Rect>,
    pub current_tags: TagSet,
    pub pending_tags: Option<TagSet>,

    pub floating: bool,
    pub mapped: bool,
    /// Number of seats focusing this view.
    focus_count: u32,

    pending_serial: Option<Serial>,
    stashed_buffer: Option<BufferId>,

    /// Size the client picks when unconstrained.
    pub natural_size: Size<i32, Logical>,
    pub title: Option<String>,
    pub app_id: Option<String>,
}

impl View {
    pub fn new(
        inner: ViewImpl,
        client: ClientId,
        output: OutputId,
        tags: TagSet,
        natural_size: Size<i32, Logical>,
    ) -> Self {
        Self {
            inner,
            client,
            output,
            current_box: geometry::rect(0, 0, 0, 0),
            pending_box: None,
            current_tags: tags,
            pending_tags: None,
            floating: false,
            mapped: false,
            focus_count: 0,
            pending_serial: None,
            stashed_buffer: None,
            natural_size,
            title: None,
            app_id: None,
        }
    }

    pub fn surface(&self) -> SurfaceId {
        self.inner.surface()
    }

    pub fn tags(&self, use_pending: bool) -> TagSet {
        match self.pending_tags {
            Some(tags) if use_pending => tags,
            _ => self.current_tags,
        }
    }

    pub fn target_box(&self) -> Rect {
        self.pending_box.unwrap_or(self.current_box)
    }

    pub fn is_focused(&self) -> bool {
        self.focus_count > 0
    }

    pub fn awaiting_configure(&self) -> bool {
        self.pending_serial.is_some()
    }

    pub fn has_pending_changes(&self) -> bool {
        self.pending_box.is_some_and(|rect| rect != self.current_box)
            || self.pending_tags.is_some_and(|tags| tags != self.current_tags)
    }

    /// Whether the pending box can only be applied after a configure.
    pub fn pending_resize(&self) -> bool {
        self.pending_box.is_some_and(|rect| {
            !geometry::is_empty(&rect) && rect.size != self.current_box.size
        })
    }

    /// Sets the pending box and asks the client to resize if needed. Returns
    /// whether an acknowledgement has to be awaited.
    pub fn propose(&mut self, rect: Rect, toolkit: &mut dyn Toolkit) -> bool {
        self.pending_box = Some(rect);
        self.configure_pending(toolkit)
    }

    pub fn configure_pending(&mut self, toolkit: &mut dyn Toolkit) -> bool {
        let Some(pending) = self.pending_box else {
            return false;
        };
        if geometry::is_empty(&pending) || pending.size == self.current_box.size {
            return false;
        }

        match self.inner.configure(toolkit, pending.size) {
            Some(serial) => {
                tracing::trace!(
                    surface = ?self.surface(),
                    width = pending.size.w,
                    height = pending.size.h,
                    ?serial,
                    "proposed new size"
                );
                self.pending_serial = Some(serial);
                true
            }
            None => false,
        }
    }

    /// Returns true when `serial` matches the outstanding configure.
    pub fn acknowledge(&mut self, serial: Serial) -> bool {
        if self.pending_serial == Some(serial) {
            self.pending_serial = None;
            true
        } else {
            false
        }
    }

    pub fn apply_pending(&mut self) {
        if let Some(rect) = self.pending_box.take() {
            self.current_box = rect;
        }
        if let Some(tags) = self.pending_tags.take() {
            self.current_tags = tags;
        }
    }

    pub fn stash_buffer(&mut self, toolkit: &mut dyn Toolkit) {
        if self.stashed_buffer.is_none() {
            self.stashed_buffer = toolkit.stash_buffer(self.surface());
        }
    }

    pub fn drop_stashed_buffer(&mut self, toolkit: &mut dyn Toolkit) {
        if let Some(buffer) = self.stashed_buffer.take() {
            toolkit.release_buffer(buffer);
        }
    }

    pub fn stashed_buffer(&self) -> Option<BufferId> {
        self.stashed_buffer
    }

    /// Views with an empty box are never shown.
    pub fn is_renderable(&self) -> bool {
        self.mapped && !geometry::is_empty(&self.current_box)
    }

    pub fn render_source(&self) -> RenderSource {
        if let Some(buffer) = self.stashed_buffer {
            return RenderSource::Stashed(buffer);
        }
        let mut surfaces = Vec::new();
        self.inner.for_each_surface(|surface| surfaces.push(surface));
        RenderSource::Surfaces(surfaces)
    }

    pub(crate) fn focus_gained(&mut self, toolkit: &mut dyn Toolkit) {
        self.focus_count += 1;
        if self.focus_count == 1 {
            self.inner.set_activated(toolkit, true);
        }
    }

    pub(crate) fn focus_lost(&mut self, toolkit: &mut dyn Toolkit) {
        if self.focus_count == 0 {
            return;
        }
        self.focus_count -= 1;
        if self.focus_count == 0 && self.mapped {
            self.inner.set_activated(toolkit, false);
        }
    }

    /// Forgets a seat's focus without talking to the client.
    pub(crate) fn focus_dropped(&mut self) {
        self.focus_count = self.focus_count.saturating_sub(1);
    }

    pub fn close(&self, toolkit: &mut dyn Toolkit) {
        self.inner.close(toolkit);
    }
}
