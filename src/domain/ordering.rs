//! Dense sibling numbering
//!
//! Chapters inside a volume and volumes inside a series are numbered
//! `1..=N` with no gaps or duplicates. Every mutation works on the full
//! sibling set so the invariant holds after each call, never only
//! "eventually".

use crate::error::AppError;

/// `reorder` anchor meaning "move to the front".
pub const FRONT: i64 = 0;

/// One sibling and its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub id: i64,
    pub number: i64,
}

/// The full set of siblings under one parent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sequence {
    slots: Vec<Slot>,
}

impl Sequence {
    pub fn new(mut slots: Vec<Slot>) -> Self {
        slots.sort_by_key(|slot| (slot.number, slot.id));
        Self { slots }
    }

    /// Number of siblings, which is also the highest number in use.
    pub fn count(&self) -> i64 {
        self.slots.len() as i64
    }

    /// Slots sorted by number.
    pub fn slots(&self) -> Vec<Slot> {
        let mut slots = self.slots.clone();
        slots.sort_by_key(|slot| (slot.number, slot.id));
        slots
    }

    pub fn number_of(&self, id: i64) -> Option<i64> {
        self.slots
            .iter()
            .find(|slot| slot.id == id)
            .map(|slot| slot.number)
    }

    /// Sibling ids in numeric order.
    pub fn ids(&self) -> Vec<i64> {
        self.slots().into_iter().map(|slot| slot.id).collect()
    }

    /// Append a new sibling at `count + 1`.
    pub fn append(&mut self, id: i64) -> Result<i64, AppError> {
        if self.number_of(id).is_some() {
            return Err(AppError::Conflict(format!("item {id} is already ordered")));
        }
        let number = self.count() + 1;
        self.slots.push(Slot { id, number });
        Ok(number)
    }

    /// Remove a sibling and close the gap it leaves.
    pub fn remove(&mut self, id: i64) -> Result<Slot, AppError> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.id == id)
            .ok_or(AppError::NotFound)?;
        let removed = self.slots.remove(index);
        for slot in &mut self.slots {
            if slot.number > removed.number {
                slot.number -= 1;
            }
        }
        Ok(removed)
    }

    /// Move `id` directly after `after`, or to the front when `after == FRONT`.
    ///
    /// Two phases: close the gap at the old position, then open one after the
    /// anchor. Moving an item after itself leaves the sequence untouched.
    pub fn reorder(&mut self, id: i64, after: i64) -> Result<(), AppError> {
        let old_number = self.number_of(id).ok_or(AppError::NotFound)?;
        if after != FRONT && self.number_of(after).is_none() {
            return Err(AppError::NotFound);
        }
        if after == id {
            return Ok(());
        }

        for slot in self.slots.iter_mut().filter(|slot| slot.id != id) {
            if slot.number > old_number {
                slot.number -= 1;
            }
        }

        let new_number = if after == FRONT {
            1
        } else {
            // Phase one already shifted the anchor if it sat after the target.
            let anchor = self.number_of(after).ok_or(AppError::NotFound)?;
            anchor + 1
        };

        for slot in self.slots.iter_mut().filter(|slot| slot.id != id) {
            if slot.number >= new_number {
                slot.number += 1;
            }
        }

        if let Some(target) = self.slots.iter_mut().find(|slot| slot.id == id) {
            target.number = new_number;
        }

        debug_assert!(self.is_dense());
        Ok(())
    }

    /// Slots whose number differs from `before` (new slots included).
    pub fn changed_since(&self, before: &Sequence) -> Vec<Slot> {
        self.slots
            .iter()
            .filter(|slot| before.number_of(slot.id) != Some(slot.number))
            .copied()
            .collect()
    }

    pub fn is_dense(&self) -> bool {
        is_dense(self.slots.iter().map(|slot| slot.number))
    }
}

/// True when `numbers` is exactly `{1..=len}`.
pub fn is_dense(numbers: impl IntoIterator<Item = i64>) -> bool {
    let mut numbers: Vec<i64> = numbers.into_iter().collect();
    numbers.sort_unstable();
    numbers
        .iter()
        .enumerate()
        .all(|(index, number)| *number == index as i64 + 1)
}
