//! User commands.
//!
//! Commands arrive as argument lists from keybindings and the control socket.
//! They are validated into a [`Command`] first and only then executed against
//! the [`Root`] for one seat.

use std::num::IntErrorKind;

use thiserror::Error;

use crate::{
    geometry::{self, TagSet},
    layout::{LayoutType, ParseLayoutError},
    root::{Root, SeatId},
    seat::Direction,
    toolkit::Toolkit,
};

pub const MIN_MASTER_FACTOR: f64 = 0.05;
pub const MAX_MASTER_FACTOR: f64 = 0.95;

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("no command given")]
    NoCommand,
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("`{0}` needs more arguments")]
    NotEnoughArguments(&'static str),
    #[error("`{0}` takes fewer arguments")]
    TooManyArguments(&'static str),
    #[error("`{0}` is out of range")]
    Overflow(String),
    #[error("invalid value `{0}`")]
    InvalidValue(String),
    #[error("invalid direction `{0}` (expected next or prev)")]
    InvalidDirection(String),
    #[error(transparent)]
    UnknownLayout(#[from] ParseLayoutError),
    #[error("no seat to run the command on")]
    NoSeat,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Focus(Direction),
    FocusOutput(Direction),
    SendToOutput(Direction),
    FocusTag(TagSet),
    ToggleTag(TagSet),
    SetViewTags(TagSet),
    ToggleViewTag(TagSet),
    ModMasterCount(i32),
    ModMasterFactor(f64),
    SetLayout(LayoutType),
    ToggleFloat,
    Zoom,
    Close,
    Exit,
    Spawn(String),
}

impl Command {
    /// Parses one whitespace separated command line.
    pub fn parse_line(line: &str) -> Result<Self, CommandError> {
        let args: Vec<&str> = line.split_whitespace().collect();
        Self::parse(&args)
    }

    pub fn parse(args: &[&str]) -> Result<Self, CommandError> {
        let Some((name, rest)) = args.split_first() else {
            return Err(CommandError::NoCommand);
        };

        let command = match *name {
            "focus" => Command::Focus(parse_direction(single("focus", rest)?)?),
            "focus_output" => {
                Command::FocusOutput(parse_direction(single("focus_output", rest)?)?)
            }
            "send_to_output" => {
                Command::SendToOutput(parse_direction(single("send_to_output", rest)?)?)
            }
            "focus_tag" => Command::FocusTag(parse_tags(single("focus_tag", rest)?)?),
            "toggle_tag" => Command::ToggleTag(parse_tags(single("toggle_tag", rest)?)?),
            "set_view_tags" => Command::SetViewTags(parse_tags(single("set_view_tags", rest)?)?),
            "toggle_view_tag" => {
                Command::ToggleViewTag(parse_tags(single("toggle_view_tag", rest)?)?)
            }
            "mod_master_count" => {
                let raw = single("mod_master_count", rest)?;
                Command::ModMasterCount(raw.parse::<i32>().map_err(|err| {
                    match err.kind() {
                        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                            CommandError::Overflow(raw.to_owned())
                        }
                        _ => CommandError::InvalidValue(raw.to_owned()),
                    }
                })?)
            }
            "mod_master_factor" => {
                let raw = single("mod_master_factor", rest)?;
                let delta = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|delta| delta.is_finite())
                    .ok_or_else(|| CommandError::InvalidValue(raw.to_owned()))?;
                Command::ModMasterFactor(delta)
            }
            "set_layout" => Command::SetLayout(single("set_layout", rest)?.parse()?),
            "toggle_float" => none("toggle_float", rest, Command::ToggleFloat)?,
            "zoom" => none("zoom", rest, Command::Zoom)?,
            "close" => none("close", rest, Command::Close)?,
            "exit" => none("exit", rest, Command::Exit)?,
            "spawn" => {
                if rest.is_empty() {
                    return Err(CommandError::NotEnoughArguments("spawn"));
                }
                Command::Spawn(rest.join(" "))
            }
            other => return Err(CommandError::UnknownCommand(other.to_owned())),
        };
        Ok(command)
    }

    pub fn execute(self, root: &mut Root, seat: SeatId, toolkit: &mut dyn Toolkit) {
        tracing::debug!(command = ?self, "executing command");
        match self {
            Command::Focus(direction) => {
                root.with_seat(seat, toolkit, |seat, cx| seat.cycle(cx, direction));
            }
            Command::FocusOutput(direction) => focus_output(root, seat, direction, toolkit),
            Command::SendToOutput(direction) => send_to_output(root, seat, direction, toolkit),
            Command::FocusTag(tags) => set_focused_tags(root, seat, |_| Some(tags), toolkit),
            Command::ToggleTag(mask) => {
                set_focused_tags(root, seat, |current| current.toggled(mask), toolkit)
            }
            Command::SetViewTags(tags) => set_view_tags(root, seat, |_| Some(tags), toolkit),
            Command::ToggleViewTag(mask) => {
                set_view_tags(root, seat, |current| current.toggled(mask), toolkit)
            }
            Command::ModMasterCount(delta) => {
                let Some(output) = root.seat_output_mut(seat) else {
                    return;
                };
                let count = (i64::from(output.params.master_count) + i64::from(delta))
                    .clamp(0, i64::from(u32::MAX)) as u32;
                if count == output.params.master_count {
                    return;
                }
                output.params.master_count = count;
                root.arrange_all(toolkit);
            }
            Command::ModMasterFactor(delta) => {
                let Some(output) = root.seat_output_mut(seat) else {
                    return;
                };
                let factor =
                    (output.params.master_factor + delta).clamp(MIN_MASTER_FACTOR, MAX_MASTER_FACTOR);
                if (factor - output.params.master_factor).abs() < f64::EPSILON {
                    return;
                }
                output.params.master_factor = factor;
                root.arrange_all(toolkit);
            }
            Command::SetLayout(layout) => {
                let Some(output) = root.seat_output_mut(seat) else {
                    return;
                };
                if output.layout == layout {
                    return;
                }
                output.layout = layout;
                root.arrange_all(toolkit);
            }
            Command::ToggleFloat => toggle_float(root, seat, toolkit),
            Command::Zoom => zoom(root, seat, toolkit),
            Command::Close => {
                if let Some(view) = root.focused_view(seat).and_then(|id| root.views.get(id)) {
                    view.close(toolkit);
                }
            }
            Command::Exit => toolkit.exit(),
            Command::Spawn(command) => toolkit.spawn(&command),
        }
    }
}

fn single<'a>(name: &'static str, rest: &[&'a str]) -> Result<&'a str, CommandError> {
    match rest {
        [] => Err(CommandError::NotEnoughArguments(name)),
        [arg] => Ok(*arg),
        _ => Err(CommandError::TooManyArguments(name)),
    }
}

fn none(name: &'static str, rest: &[&str], command: Command) -> Result<Command, CommandError> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(CommandError::TooManyArguments(name))
    }
}

fn parse_direction(raw: &str) -> Result<Direction, CommandError> {
    match raw {
        "next" => Ok(Direction::Next),
        "prev" | "previous" => Ok(Direction::Previous),
        other => Err(CommandError::InvalidDirection(other.to_owned())),
    }
}

fn parse_tags(raw: &str) -> Result<TagSet, CommandError> {
    let parsed = match raw.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => raw.parse::<u32>(),
    };
    let bits = parsed.map_err(|err| match err.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            CommandError::Overflow(raw.to_owned())
        }
        _ => CommandError::InvalidValue(raw.to_owned()),
    })?;
    TagSet::new(bits).ok_or_else(|| CommandError::InvalidValue(raw.to_owned()))
}

fn focus_output(root: &mut Root, seat: SeatId, direction: Direction, toolkit: &mut dyn Toolkit) {
    let Some(current) = root.seats.get(seat).map(|seat| seat.focused_output) else {
        return;
    };
    let Some(target) = root.adjacent_output(current, direction) else {
        return;
    };
    if target == current {
        return;
    }
    if let Some(seat) = root.seats.get_mut(seat) {
        seat.focused_output = target;
    }
    root.with_seat(seat, toolkit, |seat, cx| seat.focus(cx, None));
    root.arrange_all(toolkit);
}

fn send_to_output(root: &mut Root, seat: SeatId, direction: Direction, toolkit: &mut dyn Toolkit) {
    let Some(view) = root.focused_view(seat) else {
        return;
    };
    let Some(current) = root.views.get(view).map(|view| view.output) else {
        return;
    };
    let Some(target) = root.adjacent_output(current, direction) else {
        return;
    };
    if target == current {
        return;
    }
    root.move_view(view, target);
    root.with_seat(seat, toolkit, |seat, cx| seat.focus(cx, None));
    root.arrange_all(toolkit);
}

fn set_focused_tags(
    root: &mut Root,
    seat: SeatId,
    tags: impl FnOnce(TagSet) -> Option<TagSet>,
    toolkit: &mut dyn Toolkit,
) {
    let Some(output) = root.seat_output_mut(seat) else {
        return;
    };
    let current = output.focused_tags(true);
    let Some(tags) = tags(current) else {
        return;
    };
    if tags == current {
        return;
    }
    output.pending_focused_tags = Some(tags);
    root.with_seat(seat, toolkit, |seat, cx| seat.focus(cx, None));
    root.arrange_all(toolkit);
}

fn set_view_tags(
    root: &mut Root,
    seat: SeatId,
    tags: impl FnOnce(TagSet) -> Option<TagSet>,
    toolkit: &mut dyn Toolkit,
) {
    let Some(view) = root.focused_view(seat).and_then(|id| root.views.get_mut(id)) else {
        return;
    };
    let current = view.tags(true);
    let Some(tags) = tags(current) else {
        return;
    };
    if tags == current {
        return;
    }
    view.pending_tags = Some(tags);
    root.with_seat(seat, toolkit, |seat, cx| seat.focus(cx, None));
    root.arrange_all(toolkit);
}

fn toggle_float(root: &mut Root, seat: SeatId, toolkit: &mut dyn Toolkit) {
    let Some(id) = root.focused_view(seat) else {
        return;
    };
    let Some(usable) = root
        .views
        .get(id)
        .and_then(|view| root.outputs.get(view.output))
        .map(|output| output.usable_box())
    else {
        return;
    };
    let Some(view) = root.views.get_mut(id) else {
        return;
    };
    view.floating = !view.floating;
    if view.floating {
        view.pending_box = Some(geometry::centered(usable, view.natural_size));
    }
    root.arrange_all(toolkit);
}

/// Moves the focused view to the top of the stack. The top view instead
/// trades places with the one below it.
fn zoom(root: &mut Root, seat: SeatId, toolkit: &mut dyn Toolkit) {
    let Some(id) = root.focused_view(seat) else {
        return;
    };
    let Some(output_id) = root.views.get(id).map(|view| view.output) else {
        return;
    };
    let Some(output) = root.outputs.get_mut(output_id) else {
        return;
    };
    let tiled = output.tiled_views(&root.views);
    let promoted = match tiled.as_slice() {
        [first, second, ..] if *first == id => {
            output.views.swap(*first, *second);
            *second
        }
        [first, ..] if *first != id && tiled.contains(&id) => {
            output.views.push(id);
            id
        }
        _ => return,
    };
    root.with_seat(seat, toolkit, |seat, cx| seat.focus(cx, Some(promoted)));
    root.arrange_all(toolkit);
}
