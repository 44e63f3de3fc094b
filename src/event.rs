use smithay::{
    input::keyboard::{Keysym, ModifiersState},
    utils::{Logical, Serial, Size},
    wayland::shell::wlr_layer::Layer,
};

use crate::{
    output::LayerState,
    toolkit::{ClientId, OutputHandle, SeatHandle, SurfaceId},
    transaction::TransactionId,
    view::ViewKind,
};

/// Everything the toolkit reports, in arrival order.
#[derive(Clone, Debug)]
pub enum Event {
    NewView {
        surface: SurfaceId,
        client: ClientId,
        kind: ViewKind,
        natural_size: Size<i32, Logical>,
    },
    MapView(SurfaceId),
    UnmapView(SurfaceId),
    DestroyView(SurfaceId),
    /// A surface committed. `serial` is the configure it acknowledged, if any.
    Commit {
        surface: SurfaceId,
        serial: Option<Serial>,
    },
    SetTitle {
        surface: SurfaceId,
        title: String,
    },
    SetAppId {
        surface: SurfaceId,
        app_id: String,
    },
    NewPopup {
        parent: SurfaceId,
        surface: SurfaceId,
    },
    PopupDestroyed(SurfaceId),

    NewLayerSurface {
        surface: SurfaceId,
        client: ClientId,
        output: Option<OutputHandle>,
        layer: Layer,
        namespace: String,
    },
    LayerCommit {
        surface: SurfaceId,
        state: LayerState,
    },
    UnmapLayerSurface(SurfaceId),
    DestroyLayerSurface(SurfaceId),

    OutputAdded {
        handle: OutputHandle,
        name: String,
        size: Size<i32, Logical>,
    },
    OutputRemoved(OutputHandle),
    OutputModeChanged {
        handle: OutputHandle,
        size: Size<i32, Logical>,
    },

    NewSeat {
        handle: SeatHandle,
        name: String,
    },
    SeatRemoved(SeatHandle),
    NewInputDevice {
        seat: SeatHandle,
        name: String,
    },
    Key {
        seat: SeatHandle,
        keysym: Keysym,
        modifiers: ModifiersState,
        pressed: bool,
    },

    /// A client took an exclusive input session, e.g. a screen locker.
    InhibitorActivated(ClientId),
    InhibitorDeactivated,

    TransactionTimeout(TransactionId),
}
