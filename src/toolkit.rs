//! Boundary to the windowing toolkit.
//!
//! The toolkit owns client surfaces, buffers and hardware. It reports what
//! happens through [`crate::event::Event`] and receives decisions through the
//! [`Toolkit`] trait. Every object it owns is referred to by an opaque handle.

use std::time::Duration;

use smithay::utils::Serial;

use crate::transaction::TransactionId;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    };
}

handle!(
    /// A client surface (toplevel, xwayland window or layer surface).
    SurfaceId
);
handle!(
    /// A connected client.
    ClientId
);
handle!(
    /// A physical output.
    OutputHandle
);
handle!(
    /// An input seat.
    SeatHandle
);
handle!(
    /// A rendered frame retained by the toolkit on our behalf.
    BufferId
);

/// Calls issued by the core. None of them block.
pub trait Toolkit {
    /// Asks the client to resize. Returns the serial the client will
    /// acknowledge, or `None` when the protocol has no acknowledgement.
    fn propose_size(&mut self, surface: SurfaceId, width: u32, height: u32) -> Option<Serial>;

    fn set_activated(&mut self, surface: SurfaceId, activated: bool);

    fn send_keyboard_enter(&mut self, seat: SeatHandle, surface: SurfaceId);

    fn clear_keyboard_focus(&mut self, seat: SeatHandle);

    /// Closes the surface. For protocol violations this tears the client
    /// connection down.
    fn close_surface(&mut self, surface: SurfaceId);

    fn request_repaint(&mut self, output: OutputHandle);

    /// Retains the last rendered frame of `surface`.
    fn stash_buffer(&mut self, surface: SurfaceId) -> Option<BufferId>;

    fn release_buffer(&mut self, buffer: BufferId);

    /// Arms a one-shot timer that must be reported back as
    /// [`crate::event::Event::TransactionTimeout`].
    fn schedule_transaction_timeout(&mut self, id: TransactionId, after: Duration);

    fn spawn(&mut self, command: &str);

    fn exit(&mut self);
}
