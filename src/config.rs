use std::{
    collections::{BTreeMap, HashMap},
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use smithay::input::keyboard::{Keysym, ModifiersState};

use crate::{
    CompositorError,
    action::{Command, MAX_MASTER_FACTOR, MIN_MASTER_FACTOR},
    layout::{GapConfig, LayoutParams, LayoutType},
};

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub main_key: MainKey,
    pub keybinds: Vec<Keybind>,
    pub autostart: Vec<String>,
    pub border_width: u32,
    pub gaps: GapConfig,
    pub smart_gaps: bool,
    pub master_count: u32,
    pub master_factor: f64,
    pub default_layout: LayoutType,
    pub attach_mode: AttachMode,
    /// Upper bound on how long a transaction waits for slow clients.
    pub transaction_timeout: Duration,
}

impl RuntimeConfig {
    pub fn layout_params(&self) -> LayoutParams {
        LayoutParams {
            master_count: self.master_count,
            master_factor: self.master_factor,
            gaps: self.gaps,
            border_width: self.border_width,
            smart_gaps: self.smart_gaps,
        }
    }

    pub fn command_for(&self, modifiers: &ModifiersState, keysym: Keysym) -> Option<&Command> {
        self.keybinds
            .iter()
            .find(|bind| bind.matches(modifiers, keysym))
            .map(|bind| &bind.command)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let main_key = MainKey::Super;
        Self {
            main_key,
            keybinds: default_keybinds(main_key),
            autostart: Vec::new(),
            border_width: 2,
            gaps: GapConfig {
                outer_horizontal: 5,
                outer_vertical: 5,
                inner_horizontal: 5,
                inner_vertical: 5,
            },
            smart_gaps: true,
            master_count: 1,
            master_factor: 0.6,
            default_layout: LayoutType::default(),
            attach_mode: AttachMode::Top,
            transaction_timeout: Duration::from_millis(200),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MainKey {
    Super,
    Alt,
    Ctrl,
}

/// Where new views enter their output's stack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AttachMode {
    #[default]
    Top,
    Bottom,
}

#[derive(Clone, Debug)]
pub struct Keybind {
    pub modifiers: KeybindModifiers,
    pub key: KeyToken,
    pub command: Command,
}

impl Keybind {
    fn matches(&self, modifiers: &ModifiersState, keysym: Keysym) -> bool {
        self.modifiers.is_held(modifiers) && self.key.accepts(keysym)
    }
}

/// The non-modifier half of a combo, resolved when the config is read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyToken {
    /// A printable key, compared case-insensitively.
    Char(char),
    /// Any of these keysyms.
    Syms(&'static [Keysym]),
}

impl KeyToken {
    fn accepts(&self, keysym: Keysym) -> bool {
        match self {
            KeyToken::Char(expected) => keysym
                .key_char()
                .is_some_and(|ch| ch.to_ascii_lowercase() == *expected),
            KeyToken::Syms(syms) => syms.contains(&keysym),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeybindModifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub logo: bool,
}

impl KeybindModifiers {
    fn is_held(self, state: &ModifiersState) -> bool {
        (self.shift, self.ctrl, self.alt, self.logo)
            == (state.shift, state.ctrl, state.alt, state.logo)
    }
}

pub struct LoadedConfig {
    pub path: PathBuf,
    pub config: RuntimeConfig,
}

/// Reads the user's config, writing the commented default first if there is none.
pub fn load_or_create_default() -> Result<LoadedConfig, CompositorError> {
    let path = config_path()?;
    if !path.exists() {
        write_default(&path)?;
        tracing::info!(path = %path.display(), "wrote default config");
    }
    let config = load_from_path(&path)?;
    Ok(LoadedConfig { path, config })
}

fn write_default(path: &Path) -> Result<(), CompositorError> {
    let io_error =
        |err: std::io::Error| CompositorError::Config(format!("{}: {err}", path.display()));
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(io_error)?;
    }
    fs::write(path, default_config_template()).map_err(io_error)
}

pub fn load_from_path(path: &Path) -> Result<RuntimeConfig, CompositorError> {
    let text = fs::read_to_string(path)
        .map_err(|err| CompositorError::Config(format!("{}: {err}", path.display())))?;
    parse_config(&text)
}

pub fn parse_config(text: &str) -> Result<RuntimeConfig, CompositorError> {
    let values = parse_key_values(text)?;
    let mut config = RuntimeConfig::default();

    if let Some(raw) = values.get("main_key").or_else(|| values.get("modkey")) {
        config.main_key = parse_main_key(raw)?;
    }

    if let Some(width) = parse_spacing(&values, "border_width")? {
        config.border_width = width;
    }
    if let Some(gap) = parse_spacing(&values, "gap_size")? {
        config.gaps = GapConfig {
            outer_horizontal: gap,
            outer_vertical: gap,
            inner_horizontal: gap,
            inner_vertical: gap,
        };
    }
    let gaps = &mut config.gaps;
    for (key, slot) in [
        ("gaps.outer_horizontal", &mut gaps.outer_horizontal),
        ("gaps.outer_vertical", &mut gaps.outer_vertical),
        ("gaps.inner_horizontal", &mut gaps.inner_horizontal),
        ("gaps.inner_vertical", &mut gaps.inner_vertical),
    ] {
        if let Some(gap) = parse_spacing(&values, key)? {
            *slot = gap;
        }
    }
    if let Some(smart) = parse_switch(&values, "smart_gaps")? {
        config.smart_gaps = smart;
    }

    if let Some(count) = parse_value(&values, "master_count")? {
        config.master_count = count;
    }
    if let Some(factor) = parse_value::<f64>(&values, "master_factor")? {
        if !(MIN_MASTER_FACTOR..=MAX_MASTER_FACTOR).contains(&factor) {
            return Err(CompositorError::Config(format!(
                "master_factor must be between {MIN_MASTER_FACTOR} and {MAX_MASTER_FACTOR}"
            )));
        }
        config.master_factor = factor;
    }

    if let Some(layout) = parse_value(&values, "default_layout")? {
        config.default_layout = layout;
    }
    if let Some(raw) = values.get("attach_mode") {
        config.attach_mode = match raw.to_ascii_lowercase().as_str() {
            "top" => AttachMode::Top,
            "bottom" => AttachMode::Bottom,
            _ => {
                return Err(CompositorError::Config(format!(
                    "attach_mode = {raw}: expected top or bottom"
                )));
            }
        };
    }

    if let Some(millis) = parse_value::<u64>(&values, "transaction_timeout_ms")? {
        if millis == 0 {
            return Err(CompositorError::Config(
                "transaction_timeout_ms must be greater than 0".to_owned(),
            ));
        }
        config.transaction_timeout = Duration::from_millis(millis);
    }

    config.autostart = indexed_entries(&values, "autostart.")?;

    let binds = indexed_entries(&values, "keybind.")?;
    if !binds.is_empty() {
        config.keybinds = binds
            .iter()
            .map(|line| parse_keybind_line(line, config.main_key))
            .collect::<Result<_, _>>()?;
    } else if config.main_key != MainKey::Super {
        config.keybinds = default_keybinds(config.main_key);
    }

    Ok(config)
}

fn config_path() -> Result<PathBuf, CompositorError> {
    let non_empty = |name: &str| std::env::var_os(name).filter(|value| !value.is_empty());
    let base = match (non_empty("XDG_CONFIG_HOME"), non_empty("HOME")) {
        (Some(xdg), _) => PathBuf::from(xdg),
        (None, Some(home)) => PathBuf::from(home).join(".config"),
        (None, None) => {
            return Err(CompositorError::Config(
                "neither XDG_CONFIG_HOME nor HOME is set".to_owned(),
            ));
        }
    };
    Ok(base.join("estuary").join("config"))
}

/// One `key = value` per line. Blank lines and `#` comments are skipped.
fn parse_key_values(content: &str) -> Result<HashMap<String, String>, CompositorError> {
    let mut values = HashMap::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(CompositorError::Config(format!(
                "line {}: expected `key = value`, got `{line}`",
                number + 1
            )));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(CompositorError::Config(format!(
                "line {}: missing key",
                number + 1
            )));
        }
        values.insert(key.to_owned(), value.trim().to_owned());
    }
    Ok(values)
}

/// Values of `<prefix>N` keys, ordered by N.
fn indexed_entries(
    values: &HashMap<String, String>,
    prefix: &str,
) -> Result<Vec<String>, CompositorError> {
    let mut entries = BTreeMap::new();
    for (key, value) in values {
        if let Some(suffix) = key.strip_prefix(prefix) {
            let position: usize = suffix.parse().map_err(|_| {
                CompositorError::Config(format!("`{key}` needs a numeric suffix"))
            })?;
            entries.insert(position, value.clone());
        }
    }
    Ok(entries.into_values().collect())
}

fn parse_main_key(raw: &str) -> Result<MainKey, CompositorError> {
    match modifier_name(raw) {
        Some(Modifier::Logo) => Ok(MainKey::Super),
        Some(Modifier::Alt) => Ok(MainKey::Alt),
        Some(Modifier::Ctrl) => Ok(MainKey::Ctrl),
        _ => Err(CompositorError::Config(format!(
            "modkey `{raw}` is not one of super, alt, ctrl"
        ))),
    }
}

enum Modifier {
    Shift,
    Ctrl,
    Alt,
    Logo,
    Main,
}

fn modifier_name(raw: &str) -> Option<Modifier> {
    let modifier = match raw.trim().to_ascii_lowercase().as_str() {
        "shift" => Modifier::Shift,
        "ctrl" | "control" => Modifier::Ctrl,
        "alt" | "mod1" => Modifier::Alt,
        "super" | "logo" | "mod4" => Modifier::Logo,
        "main" => Modifier::Main,
        _ => return None,
    };
    Some(modifier)
}

const DEFAULT_BINDS: &[&str] = &[
    "Main+Shift+Return spawn foot",
    "Main+Return zoom",
    "Main+Q close",
    "Main+Shift+E exit",
    "Main+Space toggle_float",
    "Main+J focus next",
    "Main+K focus prev",
    "Main+Period focus_output next",
    "Main+Comma focus_output prev",
    "Main+Shift+Period send_to_output next",
    "Main+Shift+Comma send_to_output prev",
    "Main+H mod_master_factor -0.05",
    "Main+L mod_master_factor +0.05",
    "Main+Shift+H mod_master_count +1",
    "Main+Shift+L mod_master_count -1",
    "Main+T set_layout left-master",
    "Main+Shift+T set_layout top-master",
    "Main+M set_layout full",
    "Main+S set_layout spiral",
];

/// Built-in bindings, plus tag bindings for keys 1 to 9.
fn default_keybinds(main_key: MainKey) -> Vec<Keybind> {
    let tag_binds = (1..=9u32).flat_map(|digit| {
        let mask = 1u32 << (digit - 1);
        [
            format!("Main+{digit} focus_tag {mask}"),
            format!("Main+Shift+{digit} set_view_tags {mask}"),
            format!("Main+Ctrl+{digit} toggle_tag {mask}"),
            format!("Main+Shift+Ctrl+{digit} toggle_view_tag {mask}"),
        ]
    });

    DEFAULT_BINDS
        .iter()
        .map(|line| (*line).to_owned())
        .chain(tag_binds)
        .filter_map(|line| match parse_keybind_line(&line, main_key) {
            Ok(bind) => Some(bind),
            Err(err) => {
                tracing::error!("built-in keybinding rejected: {err}");
                None
            }
        })
        .collect()
}

fn parse_keybind_line(line: &str, main_key: MainKey) -> Result<Keybind, CompositorError> {
    let trimmed = line.trim();
    let Some((combo, command)) = trimmed.split_once(char::is_whitespace) else {
        return Err(CompositorError::Config(format!(
            "invalid keybind `{trimmed}`: expected `<combo> <command> [args]`"
        )));
    };

    let (modifiers, key) = parse_combo(combo, main_key)?;
    let command = Command::parse_line(command)
        .map_err(|err| CompositorError::Config(format!("invalid keybind `{trimmed}`: {err}")))?;

    Ok(Keybind {
        modifiers,
        key,
        command,
    })
}

fn parse_combo(
    combo: &str,
    main_key: MainKey,
) -> Result<(KeybindModifiers, KeyToken), CompositorError> {
    let invalid = |reason: &str| CompositorError::Config(format!("combo `{combo}`: {reason}"));
    let mut modifiers = KeybindModifiers::default();
    let mut token = None;

    for part in combo.split('+').map(str::trim) {
        if part.is_empty() {
            return Err(invalid("empty segment"));
        }
        let modifier = match modifier_name(part) {
            Some(Modifier::Main) => match main_key {
                MainKey::Super => Modifier::Logo,
                MainKey::Alt => Modifier::Alt,
                MainKey::Ctrl => Modifier::Ctrl,
            },
            Some(modifier) => modifier,
            None => {
                if token.replace(parse_key_token(part)?).is_some() {
                    return Err(invalid("more than one key"));
                }
                continue;
            }
        };
        match modifier {
            Modifier::Shift => modifiers.shift = true,
            Modifier::Ctrl => modifiers.ctrl = true,
            Modifier::Alt => modifiers.alt = true,
            Modifier::Logo | Modifier::Main => modifiers.logo = true,
        }
    }

    let token = token.ok_or_else(|| invalid("no key given"))?;
    Ok((modifiers, token))
}

/// Digits also match their shifted symbol on a US layout so that
/// `Main+Shift+1` fires however the keymap reports it.
const DIGITS: [&[Keysym]; 10] = [
    &[Keysym::_0, Keysym::parenright],
    &[Keysym::_1, Keysym::exclam],
    &[Keysym::_2, Keysym::at],
    &[Keysym::_3, Keysym::numbersign],
    &[Keysym::_4, Keysym::dollar],
    &[Keysym::_5, Keysym::percent],
    &[Keysym::_6, Keysym::asciicircum],
    &[Keysym::_7, Keysym::ampersand],
    &[Keysym::_8, Keysym::asterisk],
    &[Keysym::_9, Keysym::parenleft],
];

fn parse_key_token(raw: &str) -> Result<KeyToken, CompositorError> {
    let mut chars = raw.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        return Ok(match ch {
            '0'..='9' => KeyToken::Syms(DIGITS[ch as usize - '0' as usize]),
            '.' => KeyToken::Syms(&[Keysym::period, Keysym::greater]),
            ',' => KeyToken::Syms(&[Keysym::comma, Keysym::less]),
            _ => KeyToken::Char(ch.to_ascii_lowercase()),
        });
    }

    let syms: &'static [Keysym] = match raw.to_ascii_lowercase().as_str() {
        "return" | "enter" => &[Keysym::Return, Keysym::KP_Enter],
        "escape" | "esc" => &[Keysym::Escape],
        "space" => &[Keysym::space],
        "tab" => &[Keysym::Tab, Keysym::ISO_Left_Tab],
        "period" => &[Keysym::period, Keysym::greater],
        "comma" => &[Keysym::comma, Keysym::less],
        "backspace" => &[Keysym::BackSpace],
        "left" => &[Keysym::Left],
        "right" => &[Keysym::Right],
        "up" => &[Keysym::Up],
        "down" => &[Keysym::Down],
        _ => {
            return Err(CompositorError::Config(format!("unknown key `{raw}`")));
        }
    };
    Ok(KeyToken::Syms(syms))
}

fn parse_value<T: FromStr>(
    values: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, CompositorError>
where
    T::Err: Display,
{
    values
        .get(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|err| CompositorError::Config(format!("{key} = {raw}: {err}")))
        })
        .transpose()
}

/// Largest gap or border width accepted, in logical pixels.
pub const MAX_SPACING: u32 = 1024;

fn parse_spacing(
    values: &HashMap<String, String>,
    key: &str,
) -> Result<Option<u32>, CompositorError> {
    let spacing = parse_value::<u32>(values, key)?;
    if let Some(value) = spacing
        && value > MAX_SPACING
    {
        return Err(CompositorError::Config(format!(
            "{key} = {value}: must be at most {MAX_SPACING}"
        )));
    }
    Ok(spacing)
}

fn parse_switch(
    values: &HashMap<String, String>,
    key: &str,
) -> Result<Option<bool>, CompositorError> {
    let Some(raw) = values.get(key) else {
        return Ok(None);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(Some(true)),
        "false" | "no" | "off" | "0" => Ok(Some(false)),
        _ => Err(CompositorError::Config(format!(
            "{key} = {raw}: expected true or false"
        ))),
    }
}

fn default_config_template() -> &'static str {
    r#"# estuary config
# File: ~/.config/estuary/config (or $XDG_CONFIG_HOME/estuary/config)
# One `key = value` per line. Reload with `estuary ctl reload`.

modkey = Super

# Layout
default_layout = left-master
master_count = 1
master_factor = 0.6
attach_mode = top
border_width = 2
gap_size = 5
# gaps.outer_horizontal = 5
# gaps.outer_vertical = 5
# gaps.inner_horizontal = 5
# gaps.inner_vertical = 5
smart_gaps = true

# How long to wait for clients to redraw at their new size.
transaction_timeout_ms = 200

# Commands run once at startup.
# autostart.1 = waybar

# Keybindings: <combo> <command> [args]. Without any keybind entries the
# built-in set is used.
# keybind.1 = Main+Shift+Return spawn foot
# keybind.2 = Main+Return zoom
# keybind.3 = Main+Q close
# keybind.4 = Main+J focus next
# keybind.5 = Main+K focus prev
# keybind.6 = Main+1 focus_tag 1
# keybind.7 = Main+Shift+1 set_view_tags 1
# keybind.8 = Main+H mod_master_factor -0.05
# keybind.9 = Main+L mod_master_factor +0.05
# keybind.10 = Main+Shift+E exit
"#
}
