//! Ordered collection of views, most recently pushed first.
//!
//! The stack stores arena handles and keeps its links beside them, so a view
//! can sit in one output stack and any number of seat focus stacks at once.

use slotmap::SecondaryMap;

use crate::{
    geometry::TagSet,
    view::{ViewId, Views},
};

#[derive(Clone, Copy, Debug, Default)]
struct Link {
    prev: Option<ViewId>,
    next: Option<ViewId>,
}

#[derive(Debug, Default)]
pub struct ViewStack {
    head: Option<ViewId>,
    tail: Option<ViewId>,
    links: SecondaryMap<ViewId, Link>,
}

impl ViewStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn contains(&self, view: ViewId) -> bool {
        self.links.contains_key(view)
    }

    pub fn first(&self) -> Option<ViewId> {
        self.head
    }

    /// Inserts `view` at the head. A view already in the stack is moved.
    pub fn push(&mut self, view: ViewId) {
        self.remove(view);
        let link = Link {
            prev: None,
            next: self.head,
        };
        if let Some(old_head) = self.head
            && let Some(old) = self.links.get_mut(old_head)
        {
            old.prev = Some(view);
        }
        self.head = Some(view);
        if self.tail.is_none() {
            self.tail = Some(view);
        }
        self.links.insert(view, link);
    }

    /// Inserts `view` at the tail. A view already in the stack is moved.
    pub fn append(&mut self, view: ViewId) {
        self.remove(view);
        let link = Link {
            prev: self.tail,
            next: None,
        };
        if let Some(old_tail) = self.tail
            && let Some(old) = self.links.get_mut(old_tail)
        {
            old.next = Some(view);
        }
        self.tail = Some(view);
        if self.head.is_none() {
            self.head = Some(view);
        }
        self.links.insert(view, link);
    }

    /// Detaches `view` from wherever it is. Returns whether it was present.
    pub fn remove(&mut self, view: ViewId) -> bool {
        let Some(link) = self.links.remove(view) else {
            return false;
        };
        match link.prev {
            Some(prev) => {
                if let Some(prev_link) = self.links.get_mut(prev) {
                    prev_link.next = link.next;
                }
            }
            None => self.head = link.next,
        }
        match link.next {
            Some(next) => {
                if let Some(next_link) = self.links.get_mut(next) {
                    next_link.prev = link.prev;
                }
            }
            None => self.tail = link.prev,
        }
        true
    }

    /// Swaps the positions of two members.
    pub fn swap(&mut self, a: ViewId, b: ViewId) {
        if a == b || !self.contains(a) || !self.contains(b) {
            return;
        }
        let order: Vec<ViewId> = self
            .iter()
            .map(|id| match id {
                id if id == a => b,
                id if id == b => a,
                id => id,
            })
            .collect();
        self.rebuild(order);
    }

    fn rebuild(&mut self, order: Vec<ViewId>) {
        self.head = None;
        self.tail = None;
        self.links.clear();
        for id in order {
            self.append(id);
        }
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            stack: self,
            cursor: self.head,
            reverse: false,
        }
    }

    pub fn iter_rev(&self) -> Iter<'_> {
        Iter {
            stack: self,
            cursor: self.tail,
            reverse: true,
        }
    }

    /// Mapped views whose tags intersect `tags`, head first. With
    /// `use_pending`, a view's pending tags are tested when it has any.
    pub fn visible<'a>(
        &'a self,
        views: &'a Views,
        tags: TagSet,
        use_pending: bool,
    ) -> impl Iterator<Item = ViewId> + 'a {
        self.iter()
            .filter(move |id| is_visible(views, *id, tags, use_pending))
    }

    pub fn visible_rev<'a>(
        &'a self,
        views: &'a Views,
        tags: TagSet,
        use_pending: bool,
    ) -> impl Iterator<Item = ViewId> + 'a {
        self.iter_rev()
            .filter(move |id| is_visible(views, *id, tags, use_pending))
    }
}

fn is_visible(views: &Views, id: ViewId, tags: TagSet, use_pending: bool) -> bool {
    views
        .get(id)
        .is_some_and(|view| view.mapped && view.tags(use_pending).intersects(tags))
}

pub struct Iter<'a> {
    stack: &'a ViewStack,
    cursor: Option<ViewId>,
    reverse: bool,
}

impl Iterator for Iter<'_> {
    type Item = ViewId;

    fn next(&mut self) -> Option<ViewId> {
        let current = self.cursor?;
        let link = self.stack.links.get(current)?;
        self.cursor = if self.reverse { link.prev } else { link.next };
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use smithay::utils::Size;
    use slotmap::SlotMap;

    use super::*;
    use crate::{
        output::OutputId,
        toolkit::{ClientId, SurfaceId},
        view::{View, ViewImpl, ViewKind},
    };

    fn views(count: u64) -> (Views, Vec<ViewId>) {
        let mut outputs = SlotMap::<OutputId, ()>::with_key();
        let output = outputs.insert(());
        let mut views = Views::with_key();
        let ids = (0..count)
            .map(|index| {
                let mut view = View::new(
                    ViewImpl::new(ViewKind::XdgToplevel, SurfaceId(index)),
                    ClientId(index),
                    output,
                    TagSet::FIRST,
                    Size::from((100, 100)),
                );
                view.mapped = true;
                views.insert(view)
            })
            .collect();
        (views, ids)
    }

    #[test]
    fn push_orders_most_recent_first() {
        let (_, ids) = views(3);
        let mut stack = ViewStack::new();
        for id in &ids {
            stack.push(*id);
        }
        assert_eq!(stack.iter().collect::<Vec<_>>(), vec![ids[2], ids[1], ids[0]]);
        assert_eq!(stack.iter_rev().collect::<Vec<_>>(), vec![ids[0], ids[1], ids[2]]);
    }

    #[test]
    fn pushing_twice_keeps_one_entry() {
        let (_, ids) = views(2);
        let mut stack = ViewStack::new();
        stack.push(ids[0]);
        stack.push(ids[1]);
        stack.push(ids[0]);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.iter().collect::<Vec<_>>(), vec![ids[0], ids[1]]);
    }

    #[test]
    fn remove_from_middle_and_ends() {
        let (_, ids) = views(4);
        let mut stack = ViewStack::new();
        for id in &ids {
            stack.append(*id);
        }
        assert!(stack.remove(ids[1]));
        assert!(!stack.remove(ids[1]));
        assert!(stack.remove(ids[0]));
        assert!(stack.remove(ids[3]));
        assert_eq!(stack.iter().collect::<Vec<_>>(), vec![ids[2]]);
        assert_eq!(stack.first(), Some(ids[2]));
        assert!(stack.remove(ids[2]));
        assert!(stack.is_empty());
        assert_eq!(stack.iter_rev().count(), 0);
    }

    #[test]
    fn filters_unmapped_and_foreign_tags() {
        let (mut views, ids) = views(3);
        let mut stack = ViewStack::new();
        for id in &ids {
            stack.append(*id);
        }
        views[ids[0]].mapped = false;
        views[ids[1]].pending_tags = TagSet::new(0b10);

        let tag_one = TagSet::FIRST;
        let tag_two = TagSet::or_first(0b10);
        assert_eq!(stack.visible(&views, tag_one, false).collect::<Vec<_>>(), vec![ids[1], ids[2]]);
        assert_eq!(stack.visible(&views, tag_one, true).collect::<Vec<_>>(), vec![ids[2]]);
        assert_eq!(stack.visible_rev(&views, tag_two, true).collect::<Vec<_>>(), vec![ids[1]]);
        // Restartable: a second pass yields the same sequence.
        assert_eq!(stack.visible(&views, tag_one, true).count(), 1);
    }

    #[test]
    fn swap_exchanges_positions() {
        let (_, ids) = views(3);
        let mut stack = ViewStack::new();
        for id in &ids {
            stack.append(*id);
        }
        stack.swap(ids[0], ids[2]);
        assert_eq!(stack.iter().collect::<Vec<_>>(), vec![ids[2], ids[1], ids[0]]);
    }
}
