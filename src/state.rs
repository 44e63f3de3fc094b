use std::{
    io::{Read, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::{Path, PathBuf},
};

use smithay::reexports::calloop::{
    Interest, LoopHandle, LoopSignal, Mode, PostAction, generic::Generic,
};

use crate::{
    CompositorError,
    backend::headless::HeadlessBackend,
    config,
    event::Event,
    root::Root,
    toolkit::Toolkit,
};

/// Everything the event loop callbacks reach.
pub struct Estuary {
    pub root: Root,
    pub backend: HeadlessBackend,
    pub config_path: PathBuf,
    pub display_name: String,
    ipc_socket_path: Option<PathBuf>,
    autostart_started: bool,
}

impl Estuary {
    pub fn new(
        loop_handle: LoopHandle<'static, Estuary>,
        loop_signal: LoopSignal,
        display_name: String,
    ) -> Result<Self, CompositorError> {
        let loaded = config::load_or_create_default()?;
        tracing::info!(path = %loaded.path.display(), "config loaded");

        let ipc_socket_path = match init_ipc_listener(&loop_handle, &display_name) {
            Ok(path) => {
                tracing::info!(path = %path.display(), "ipc listener initialized");
                Some(path)
            }
            Err(err) => {
                tracing::warn!("failed to initialize ipc listener: {err}");
                None
            }
        };

        Ok(Self {
            root: Root::new(loaded.config),
            backend: HeadlessBackend::new(loop_handle, loop_signal),
            config_path: loaded.path,
            display_name,
            ipc_socket_path,
            autostart_started: false,
        })
    }

    /// Feeds an event to the core, followed by whatever the simulated
    /// clients answer.
    pub fn dispatch(&mut self, event: Event) {
        self.root.dispatch(event, &mut self.backend);
        self.drain_queued();
    }

    pub fn run_startup_tasks(&mut self) {
        if self.autostart_started {
            return;
        }
        self.autostart_started = true;
        tracing::info!(
            outputs = self.root.output_order.len(),
            display = %self.display_name,
            "running startup tasks"
        );

        let commands = self.root.config.autostart.clone();
        for command in &commands {
            tracing::info!(command, "starting autostart command");
            self.backend.spawn(command);
        }
    }

    pub fn reload_config(&mut self) -> Result<(), CompositorError> {
        let config = config::load_from_path(&self.config_path)?;
        self.root.apply_config(config, &mut self.backend);
        self.drain_queued();
        tracing::info!(path = %self.config_path.display(), "reloaded config");
        Ok(())
    }

    fn drain_queued(&mut self) {
        while let Some(event) = self.backend.take_queued() {
            self.root.dispatch(event, &mut self.backend);
        }
    }

    /// Answers one request: `status`, `reload` or a command line.
    pub fn handle_ipc_request(&mut self, request: &str) -> String {
        match request.trim() {
            "" => "error: empty command (supported: status, reload, <command>)\n".to_owned(),
            "status" => self.root.status().to_string(),
            "reload" => match self.reload_config() {
                Ok(()) => "ok\n".to_owned(),
                Err(err) => format!("error: {err}\n"),
            },
            line => {
                let result = self.root.run_command(line, &mut self.backend);
                self.drain_queued();
                match result {
                    Ok(()) => "ok\n".to_owned(),
                    Err(err) => format!("error: {err}\n"),
                }
            }
        }
    }

    fn handle_ipc_stream(&mut self, mut stream: UnixStream) {
        let mut request = String::new();
        let response = match stream.read_to_string(&mut request) {
            Ok(_) => self.handle_ipc_request(&request),
            Err(err) => format!("error: failed to read request: {err}\n"),
        };
        if let Err(err) = stream.write_all(response.as_bytes()) {
            tracing::warn!("ipc client went away before the reply: {err}");
        }
    }
}

impl Drop for Estuary {
    fn drop(&mut self) {
        if let Some(path) = &self.ipc_socket_path
            && let Err(err) = std::fs::remove_file(path)
        {
            tracing::warn!(path = %path.display(), "failed to remove ipc socket: {err}");
        }
    }
}

/// Binds the control socket and serves one request per connection from
/// the event loop.
fn init_ipc_listener(
    loop_handle: &LoopHandle<'static, Estuary>,
    display_name: &str,
) -> Result<PathBuf, CompositorError> {
    let path = ipc_socket_path(display_name)?;
    let socket_err = |what: &str, err: std::io::Error| {
        CompositorError::Backend(format!("{what} {}: {err}", path.display()))
    };

    // A previous session that did not shut down cleanly leaves its socket behind.
    if path.exists() {
        std::fs::remove_file(&path).map_err(|err| socket_err("cannot replace", err))?;
    }
    let listener = UnixListener::bind(&path).map_err(|err| socket_err("cannot bind", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| socket_err("cannot configure", err))?;

    let source = Generic::new(listener, Interest::READ, Mode::Level);
    loop_handle
        .insert_source(source, |_, listener, state| {
            loop {
                match listener.accept() {
                    Ok((stream, _)) => state.handle_ipc_stream(stream),
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                    Err(err) => {
                        tracing::warn!("accepting ipc client: {err}");
                        break;
                    }
                }
            }
            Ok(PostAction::Continue)
        })
        .map_err(|err| CompositorError::EventLoop(format!("ipc source: {err}")))?;

    Ok(path)
}

pub fn ipc_socket_path(display_name: &str) -> Result<PathBuf, CompositorError> {
    let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR")
        .ok_or_else(|| CompositorError::Backend("XDG_RUNTIME_DIR is not set".to_owned()))?;
    socket_path_in(Path::new(&runtime_dir), display_name)
}

fn socket_path_in(runtime_dir: &Path, display_name: &str) -> Result<PathBuf, CompositorError> {
    let display_name = display_name.trim();
    if display_name.is_empty() || display_name.contains('/') {
        return Err(CompositorError::Backend(format!(
            "invalid display name `{display_name}` for ipc socket"
        )));
    }
    Ok(runtime_dir.join(format!("estuary-{display_name}.sock")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_name_carries_display() {
        let path = socket_path_in(Path::new("/run/user/1000"), "0").expect("valid name");
        assert_eq!(path, PathBuf::from("/run/user/1000/estuary-0.sock"));
        assert!(socket_path_in(Path::new("/tmp"), " ").is_err());
        assert!(socket_path_in(Path::new("/tmp"), "../x").is_err());
    }
}
