use std::{
    backtrace::Backtrace,
    fs,
    io::{Read, Write},
    os::unix::net::UnixStream,
    path::PathBuf,
};

use anyhow::{Context, bail};
use calloop::signals::{Signal, Signals};
use estuary::{CompositorError, Estuary, backend::headless};
use smithay::{
    reexports::calloop::{
        EventLoop,
        timer::{TimeoutAction, Timer},
    },
    utils::{Logical, Size},
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_OUTPUT: (&str, i32, i32) = ("HEADLESS-1", 1920, 1080);

fn main() -> anyhow::Result<()> {
    init_backtrace_defaults();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("ctl") {
        let response = run_ipc_command(&args[1..].join(" "))?;
        print!("{response}");
        if response.starts_with("error:") {
            std::process::exit(1);
        }
        return Ok(());
    }

    init_logging()?;
    std::panic::set_hook(Box::new(|panic_info| {
        let backtrace = Backtrace::force_capture();
        tracing::error!("panic: {panic_info}\n{backtrace}");
        eprintln!("panic: {panic_info}\n{backtrace}");
    }));

    let options = parse_options(&args)?;

    let mut event_loop: EventLoop<Estuary> =
        EventLoop::try_new().map_err(|e| CompositorError::EventLoop(e.to_string()))?;
    let mut state = Estuary::new(
        event_loop.handle(),
        event_loop.get_signal(),
        options.display_name,
    )?;

    let signals = Signals::new(&[Signal::SIGINT, Signal::SIGTERM])
        .map_err(|err| CompositorError::EventLoop(format!("failed to watch signals: {err}")))?;
    let loop_signal = event_loop.get_signal();
    event_loop
        .handle()
        .insert_source(signals, move |event, _, _| {
            tracing::info!(signal = ?event.signal(), "shutting down");
            loop_signal.stop();
        })
        .map_err(|err| CompositorError::EventLoop(format!("failed to watch signals: {err}")))?;

    tracing::info!("Starting with headless backend");
    headless::init_headless(&mut state, &options.outputs)?;

    event_loop
        .handle()
        .insert_source(Timer::immediate(), |_, _, state| {
            state.run_startup_tasks();
            TimeoutAction::Drop
        })
        .map_err(|err| {
            CompositorError::EventLoop(format!("failed to schedule startup tasks: {err}"))
        })?;

    event_loop
        .run(None, &mut state, |_| {})
        .map_err(|e| CompositorError::EventLoop(e.to_string()))?;

    tracing::info!(frames = state.backend.frames(), "event loop exited");
    Ok(())
}

struct Options {
    display_name: String,
    outputs: Vec<(String, Size<i32, Logical>)>,
}

fn parse_options(args: &[String]) -> anyhow::Result<Options> {
    let mut display_name = std::env::var("ESTUARY_DISPLAY").unwrap_or_else(|_| "0".to_owned());
    let mut outputs = Vec::new();

    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--display" => {
                display_name = args.next().context("--display needs a name")?.clone();
            }
            "--output" => {
                let output = args.next().context("--output needs NAME=WIDTHxHEIGHT")?;
                outputs.push(parse_output(output)?);
            }
            other => bail!("unknown argument `{other}`"),
        }
    }

    if outputs.is_empty() {
        let (name, width, height) = DEFAULT_OUTPUT;
        outputs.push((name.to_owned(), Size::from((width, height))));
    }
    Ok(Options {
        display_name,
        outputs,
    })
}

fn parse_output(arg: &str) -> anyhow::Result<(String, Size<i32, Logical>)> {
    let (name, mode) = arg
        .split_once('=')
        .with_context(|| format!("invalid output `{arg}`, expected NAME=WIDTHxHEIGHT"))?;
    let (width, height) = mode
        .split_once('x')
        .with_context(|| format!("invalid mode `{mode}`, expected WIDTHxHEIGHT"))?;
    let width: i32 = width
        .parse()
        .with_context(|| format!("invalid output width `{width}`"))?;
    let height: i32 = height
        .parse()
        .with_context(|| format!("invalid output height `{height}`"))?;
    Ok((name.to_owned(), Size::from((width, height))))
}

fn run_ipc_command(command: &str) -> anyhow::Result<String> {
    if command.trim().is_empty() {
        bail!("usage: estuary ctl <status|reload|command...>");
    }
    let socket_path = ipc_socket_path_from_env()?;
    let mut stream = UnixStream::connect(&socket_path).with_context(|| {
        format!(
            "failed to connect to estuary ipc socket {}",
            socket_path.display()
        )
    })?;

    stream
        .write_all(command.as_bytes())
        .context("failed to send ipc command")?;
    stream
        .shutdown(std::net::Shutdown::Write)
        .context("failed to finalize ipc command write")?;

    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .context("failed to read ipc response")?;

    if response.is_empty() {
        bail!("empty response from estuary ipc");
    }
    Ok(response)
}

fn ipc_socket_path_from_env() -> anyhow::Result<PathBuf> {
    if let Ok(display) = std::env::var("ESTUARY_DISPLAY") {
        return Ok(estuary::state::ipc_socket_path(&display)?);
    }

    let runtime_dir = PathBuf::from(
        std::env::var_os("XDG_RUNTIME_DIR").context("XDG_RUNTIME_DIR is not set")?,
    );
    let entries = fs::read_dir(&runtime_dir)
        .with_context(|| format!("failed to scan runtime dir {}", runtime_dir.display()))?;

    let mut candidates: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with("estuary-") && name.ends_with(".sock")
        })
        .map(|entry| entry.path())
        .collect();

    match candidates.len() {
        1 => Ok(candidates.remove(0)),
        0 => bail!("estuary ipc socket not found (is estuary running?)"),
        _ => bail!("multiple estuary sessions detected; set ESTUARY_DISPLAY to select one"),
    }
}

fn init_backtrace_defaults() {
    if std::env::var_os("RUST_BACKTRACE").is_none() {
        // Safety: called at startup before creating any threads.
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }
}

const DEFAULT_LOG_FILTER: &str = "estuary=debug";

fn log_dir() -> Result<PathBuf, CompositorError> {
    if let Some(state) = std::env::var_os("XDG_STATE_HOME")
        && !state.is_empty()
    {
        return Ok(PathBuf::from(state).join("estuary"));
    }
    let home = std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .ok_or_else(|| {
            CompositorError::Backend("HOME and XDG_STATE_HOME are unset".to_owned())
        })?;
    Ok(PathBuf::from(home).join(".local/state/estuary"))
}

fn init_logging() -> Result<(), CompositorError> {
    let log_dir = log_dir()?;
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(&log_dir, "estuary.log");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_appender),
        )
        .init();

    let log_file = log_dir.join("estuary.log");
    tracing::info!(path = %log_file.display(), "logging initialized");

    Ok(())
}
