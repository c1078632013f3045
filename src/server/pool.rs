use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Active,
    // the worker is saying goodbye and will free the slot shortly
    Draining,
}

/// A fixed set of connection slots
///
/// a slot stays occupied for as long as its [`Slot`] guard is alive.
#[derive(Debug)]
pub struct Pool {
    slots: Mutex<Vec<SlotState>>,
}

impl Pool {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            slots: Mutex::new(vec![SlotState::Empty; capacity]),
        })
    }

    fn slots(&self) -> MutexGuard<'_, Vec<SlotState>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims the lowest free slot, or None if every slot is taken
    pub fn try_acquire(self: &Arc<Self>) -> Option<Slot> {
        let mut slots = self.slots();
        let index = slots.iter().position(|state| *state == SlotState::Empty)?;
        slots[index] = SlotState::Active;

        Some(Slot {
            pool: self.clone(),
            index,
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots().len()
    }

    pub fn occupied(&self) -> usize {
        self.slots()
            .iter()
            .filter(|state| **state != SlotState::Empty)
            .count()
    }

    pub fn states(&self) -> Vec<SlotState> {
        self.slots().clone()
    }

    fn set(&self, index: usize, state: SlotState) {
        self.slots()[index] = state;
    }
}

/// Ownership of a single pool slot, released on drop
#[derive(Debug)]
pub struct Slot {
    pool: Arc<Pool>,
    index: usize,
}

impl Slot {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn drain(&self) {
        self.pool.set(self.index, SlotState::Draining);
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.pool.set(self.index, SlotState::Empty);
    }
}
