//! Toolkit without a display server.
//!
//! Clients are simulated: every configure is acknowledged on the next commit
//! and nothing is ever drawn. Timers and child processes are real, driven by
//! the calloop event loop the binary runs.

use std::{
    collections::{HashSet, VecDeque},
    process::{Command, Stdio},
    time::Duration,
};

use smithay::{
    reexports::calloop::{
        LoopHandle, LoopSignal,
        timer::{TimeoutAction, Timer},
    },
    utils::{Logical, SERIAL_COUNTER, Serial, Size},
};

use crate::{
    event::Event,
    state::Estuary,
    toolkit::{BufferId, OutputHandle, SeatHandle, SurfaceId, Toolkit},
    transaction::TransactionId,
};

pub struct HeadlessBackend {
    loop_handle: LoopHandle<'static, Estuary>,
    loop_signal: LoopSignal,
    /// Events generated by simulated clients, dispatched after the current one.
    queued: VecDeque<Event>,
    stashed: HashSet<BufferId>,
    next_handle: u64,
    frames: u64,
}

impl HeadlessBackend {
    pub fn new(loop_handle: LoopHandle<'static, Estuary>, loop_signal: LoopSignal) -> Self {
        Self {
            loop_handle,
            loop_signal,
            queued: VecDeque::new(),
            stashed: HashSet::new(),
            next_handle: 1,
            frames: 0,
        }
    }

    pub fn take_queued(&mut self) -> Option<Event> {
        self.queued.pop_front()
    }

    fn allocate_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Announces the virtual outputs and the single seat.
pub fn init_headless(
    state: &mut Estuary,
    outputs: &[(String, Size<i32, Logical>)],
) -> crate::Result<()> {
    let seat = SeatHandle(state.backend.allocate_handle());
    state.dispatch(Event::NewSeat {
        handle: seat,
        name: "seat0".to_owned(),
    });
    state.dispatch(Event::NewInputDevice {
        seat,
        name: "headless-keyboard".to_owned(),
    });

    for (name, size) in outputs {
        if size.w <= 0 || size.h <= 0 {
            return Err(crate::CompositorError::Backend(format!(
                "output {name} has an empty mode {}x{}",
                size.w, size.h
            )));
        }
        let handle = OutputHandle(state.backend.allocate_handle());
        state.dispatch(Event::OutputAdded {
            handle,
            name: name.clone(),
            size: *size,
        });
    }

    tracing::info!(outputs = outputs.len(), "headless backend initialized");
    Ok(())
}

impl Toolkit for HeadlessBackend {
    fn propose_size(&mut self, surface: SurfaceId, width: u32, height: u32) -> Option<Serial> {
        let serial = SERIAL_COUNTER.next_serial();
        tracing::trace!(?surface, width, height, ?serial, "configure");
        self.queued.push_back(Event::Commit {
            surface,
            serial: Some(serial),
        });
        Some(serial)
    }

    fn set_activated(&mut self, surface: SurfaceId, activated: bool) {
        tracing::trace!(?surface, activated, "activation changed");
    }

    fn send_keyboard_enter(&mut self, seat: SeatHandle, surface: SurfaceId) {
        tracing::trace!(?seat, ?surface, "keyboard enter");
    }

    fn clear_keyboard_focus(&mut self, seat: SeatHandle) {
        tracing::trace!(?seat, "keyboard focus cleared");
    }

    fn close_surface(&mut self, surface: SurfaceId) {
        tracing::info!(?surface, "closing surface");
    }

    fn request_repaint(&mut self, output: OutputHandle) {
        self.frames += 1;
        tracing::trace!(?output, frame = self.frames, "repaint");
    }

    fn stash_buffer(&mut self, surface: SurfaceId) -> Option<BufferId> {
        let buffer = BufferId(self.allocate_handle());
        tracing::trace!(?surface, ?buffer, "buffer stashed");
        self.stashed.insert(buffer);
        Some(buffer)
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        if !self.stashed.remove(&buffer) {
            tracing::warn!(?buffer, "release of unknown buffer");
        }
    }

    fn schedule_transaction_timeout(&mut self, id: TransactionId, after: Duration) {
        let result = self
            .loop_handle
            .insert_source(Timer::from_duration(after), move |_, _, state| {
                state.dispatch(Event::TransactionTimeout(id));
                TimeoutAction::Drop
            });
        if let Err(err) = result {
            tracing::error!(transaction = %id, "failed to arm transaction timeout: {err}");
        }
    }

    fn spawn(&mut self, command: &str) {
        if command.trim().is_empty() {
            return;
        }

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null());
        match cmd.spawn() {
            Ok(child) => tracing::info!(command, pid = child.id(), "spawned command"),
            Err(err) => tracing::warn!(command, "failed to spawn command: {err}"),
        }
    }

    fn exit(&mut self) {
        tracing::info!("exit requested");
        self.loop_signal.stop();
    }
}
