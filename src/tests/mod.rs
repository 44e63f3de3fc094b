use std::time::Duration;

use smithay::{
    input::keyboard::{FilterResult, Keysym, ModifiersState},
    utils::Size,
};

use crate::{
    config::RuntimeConfig,
    event::Event,
    geometry::Rect,
    layout::GapConfig,
    root::{Root, SeatId},
    toolkit::{
        ClientId, OutputHandle, SeatHandle, SurfaceId,
        testing::{RecordingToolkit, Request},
    },
    transaction::TransactionId,
    view::{ViewId, ViewKind},
};

mod layers;
mod transactions;

const SEAT: SeatHandle = SeatHandle(1);
const OUTPUT: OutputHandle = OutputHandle(1);

struct Harness {
    root: Root,
    toolkit: RecordingToolkit,
}

impl Harness {
    /// One seat and one 1000x500 output, no gaps or borders.
    fn new() -> Self {
        let mut harness = Self::bare();
        harness.add_output(OUTPUT, "DP-1", 1000, 500);
        harness
    }

    /// One seat and no outputs at all.
    fn bare() -> Self {
        let config = RuntimeConfig {
            border_width: 0,
            gaps: GapConfig::default(),
            ..RuntimeConfig::default()
        };
        let mut harness = Self {
            root: Root::new(config),
            toolkit: RecordingToolkit::default(),
        };
        harness.dispatch(Event::NewSeat {
            handle: SEAT,
            name: "seat0".to_owned(),
        });
        harness
    }

    fn dispatch(&mut self, event: Event) {
        self.root.dispatch(event, &mut self.toolkit);
    }

    fn add_output(&mut self, handle: OutputHandle, name: &str, width: i32, height: i32) {
        self.dispatch(Event::OutputAdded {
            handle,
            name: name.to_owned(),
            size: Size::from((width, height)),
        });
    }

    fn create_view(&mut self, surface: u64, kind: ViewKind) -> ViewId {
        self.dispatch(Event::NewView {
            surface: SurfaceId(surface),
            client: ClientId(surface),
            kind,
            natural_size: Size::from((400, 300)),
        });
        self.root
            .view_for_surface(SurfaceId(surface))
            .expect("view registered")
    }

    /// Creates and maps an xdg toplevel without acknowledging anything.
    fn map_view(&mut self, surface: u64) -> ViewId {
        let id = self.create_view(surface, ViewKind::XdgToplevel);
        self.dispatch(Event::MapView(SurfaceId(surface)));
        id
    }

    /// Commits the last configure sent to `surface`.
    fn commit(&mut self, surface: u64) {
        let serial = self.toolkit.serial_for(SurfaceId(surface));
        self.dispatch(Event::Commit {
            surface: SurfaceId(surface),
            serial,
        });
    }

    /// Lets every client acknowledge until no transaction is left.
    fn settle(&mut self) {
        for _ in 0..8 {
            if !self.root.transaction_in_flight() {
                return;
            }
            let awaiting: Vec<u64> = self
                .root
                .views
                .values()
                .filter(|view| view.awaiting_configure())
                .map(|view| view.surface().0)
                .collect();
            for surface in awaiting {
                self.commit(surface);
            }
        }
        panic!("transactions did not settle");
    }

    fn map_settled(&mut self, surface: u64) -> ViewId {
        let id = self.map_view(surface);
        self.settle();
        id
    }

    fn seat(&self) -> SeatId {
        self.root.seat_by_handle(SEAT).expect("seat registered")
    }

    fn focused(&self) -> Option<ViewId> {
        self.root.focused_view(self.seat())
    }

    fn current_box(&self, view: ViewId) -> Rect {
        self.root.views[view].current_box
    }

    fn last_timeout(&self) -> TransactionId {
        self.toolkit
            .requests
            .iter()
            .rev()
            .find_map(|request| match request {
                Request::ScheduleTimeout(id, _) => Some(*id),
                _ => None,
            })
            .expect("timeout scheduled")
    }

    fn run(&mut self, line: &str) {
        self.root
            .run_command(line, &mut self.toolkit)
            .expect("command accepted");
    }

    fn press(&mut self, keysym: Keysym, modifiers: ModifiersState) -> FilterResult<()> {
        self.root
            .handle_key(SEAT, keysym, &modifiers, true, &mut self.toolkit)
    }
}

fn logo() -> ModifiersState {
    let mut modifiers = ModifiersState::default();
    modifiers.logo = true;
    modifiers
}

#[test]
fn transactions_arm_the_configured_timeout() {
    let mut h = Harness::new();
    h.map_view(1);
    let id = h.last_timeout();
    assert!(
        h.toolkit
            .requests
            .contains(&Request::ScheduleTimeout(id, Duration::from_millis(200)))
    );
}
