//! Read-only snapshot of what status bars care about.

use std::fmt;

use crate::{geometry::TagSet, layout::LayoutType, root::Root};

#[derive(Clone, Debug, PartialEq)]
pub struct Status {
    pub outputs: Vec<OutputStatus>,
    pub seats: Vec<SeatStatus>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutputStatus {
    pub name: String,
    pub focused_tags: TagSet,
    /// Tags of every mapped view, top of the stack first.
    pub view_tags: Vec<TagSet>,
    pub layout: LayoutType,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SeatStatus {
    pub name: String,
    pub focused_output: Option<String>,
    pub title: Option<String>,
}

impl Root {
    /// Reports committed state only; pending changes of an in-flight
    /// transaction are not visible yet.
    pub fn status(&self) -> Status {
        let outputs = self
            .output_order
            .iter()
            .filter_map(|id| self.outputs.get(*id))
            .map(|output| OutputStatus {
                name: output.name.clone(),
                focused_tags: output.current_focused_tags,
                view_tags: output
                    .views
                    .iter()
                    .filter_map(|id| self.views.get(id))
                    .filter(|view| view.mapped)
                    .map(|view| view.current_tags)
                    .collect(),
                layout: output.layout,
            })
            .collect();

        let seats = self
            .seats
            .values()
            .map(|seat| SeatStatus {
                name: seat.name.clone(),
                focused_output: self
                    .outputs
                    .get(seat.focused_output)
                    .filter(|output| !output.is_noop())
                    .map(|output| output.name.clone()),
                title: seat
                    .focused_view()
                    .and_then(|id| self.views.get(id))
                    .and_then(|view| view.title.clone()),
            })
            .collect();

        Status { outputs, seats }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for output in &self.outputs {
            write!(
                f,
                "output {} tags {} layout {} views",
                output.name, output.focused_tags, output.layout
            )?;
            if output.view_tags.is_empty() {
                write!(f, " -")?;
            }
            for tags in &output.view_tags {
                write!(f, " {tags}")?;
            }
            writeln!(f)?;
        }
        for seat in &self.seats {
            writeln!(
                f,
                "seat {} output {} title {}",
                seat.name,
                seat.focused_output.as_deref().unwrap_or("-"),
                seat.title
                    .as_deref()
                    .map(|title| format!("{title:?}"))
                    .unwrap_or_else(|| "-".to_owned()),
            )?;
        }
        Ok(())
    }
}
