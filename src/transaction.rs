use std::{fmt, time::Instant};

use crate::view::ViewId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Views with an outstanding configure, waited on before pending state is
/// applied.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    awaiting: Vec<ViewId>,
    acknowledged: Vec<ViewId>,
    started: Instant,
}

impl Transaction {
    /// `settled` views were configured without a round trip and only need
    /// to be applied together with the rest.
    pub fn new(id: TransactionId, awaiting: Vec<ViewId>, settled: Vec<ViewId>) -> Self {
        Self {
            id,
            awaiting,
            acknowledged: settled,
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn is_tracking(&self, view: ViewId) -> bool {
        self.awaiting.contains(&view)
    }

    /// Marks `view` as configured. Returns whether it was being waited on.
    pub fn acknowledge(&mut self, view: ViewId) -> bool {
        let Some(index) = self.awaiting.iter().position(|id| *id == view) else {
            return false;
        };
        self.awaiting.swap_remove(index);
        self.acknowledged.push(view);
        true
    }

    /// Stops waiting on a view that went away.
    pub fn cancel(&mut self, view: ViewId) -> bool {
        self.acknowledged.retain(|id| *id != view);
        let before = self.awaiting.len();
        self.awaiting.retain(|id| *id != view);
        before != self.awaiting.len()
    }

    pub fn is_complete(&self) -> bool {
        self.awaiting.is_empty()
    }

    /// Views that have not acknowledged yet.
    pub fn laggards(&self) -> &[ViewId] {
        &self.awaiting
    }

    pub fn acknowledged(&self) -> &[ViewId] {
        &self.acknowledged
    }

    pub fn started(&self) -> Instant {
        self.started
    }
}
