//! Generation-checked slot arena.
//!
//! Bodies, fixtures, joints and contacts all live in arenas and refer to
//! each other through [`Handle`]s. A handle records the slot index plus the
//! generation the slot had when the value was inserted; once the value is
//! removed the slot's generation advances, so stale handles resolve to
//! `None` instead of aliasing whatever reuses the slot.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A typed index into an [`Arena`].
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

// Manual impls: derives would require `T` itself to satisfy the bounds.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", self.index, self.generation)
    }
}

impl<T> Handle<T> {
    /// A handle that never resolves. Slots start at generation 1, so
    /// generation 0 can serve as the sentinel.
    pub const NONE: Handle<T> = Handle {
        index: u32::MAX,
        generation: 0,
        _marker: PhantomData,
    };

    pub fn is_none(&self) -> bool {
        self.generation == 0
    }

    pub fn is_some(&self) -> bool {
        self.generation != 0
    }

    pub(crate) fn index(&self) -> usize {
        self.index as usize
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Handle::NONE
    }
}

struct Slot<T> {
    generation: u32,
    payload: Option<T>,
}

/// A slot arena with stable, generation-checked handles.
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Arena::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Arena {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, value: T) -> Handle<T> {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.payload.is_none());
            slot.payload = Some(value);
            Handle {
                index,
                generation: slot.generation,
                _marker: PhantomData,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 1,
                payload: Some(value),
            });
            Handle {
                index,
                generation: 1,
                _marker: PhantomData,
            }
        }
    }

    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.payload.take()?;
        slot.generation += 1;
        self.free.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        let slot = self.slots.get(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.payload.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.payload.as_mut()
    }

    /// Borrow two distinct slots mutably at once. Panics if the handles
    /// alias the same slot; returns `None` if either is stale.
    pub fn pair_mut(&mut self, a: Handle<T>, b: Handle<T>) -> Option<(&mut T, &mut T)> {
        assert_ne!(a.index, b.index, "pair_mut requires distinct handles");
        let (ia, ib) = (a.index(), b.index());
        if ia >= self.slots.len() || ib >= self.slots.len() {
            return None;
        }
        let (first, second, swapped) = if ia < ib {
            let (lo, hi) = self.slots.split_at_mut(ib);
            (&mut lo[ia], &mut hi[0], false)
        } else {
            let (lo, hi) = self.slots.split_at_mut(ia);
            (&mut lo[ib], &mut hi[0], true)
        };
        let (sa, sb) = if swapped {
            (second, first)
        } else {
            (first, second)
        };
        if sa.generation != a.generation || sb.generation != b.generation {
            return None;
        }
        match (sa.payload.as_mut(), sb.payload.as_mut()) {
            (Some(va), Some(vb)) => Some((va, vb)),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.payload.as_ref().map(|value| {
                (
                    Handle {
                        index: index as u32,
                        generation: slot.generation,
                        _marker: PhantomData,
                    },
                    value,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.payload.as_mut().map(|value| {
                (
                    Handle {
                        index: index as u32,
                        generation,
                        _marker: PhantomData,
                    },
                    value,
                )
            })
        })
    }

    /// Handles of all live values. Collected up front so callers can
    /// mutate the arena while walking the snapshot.
    pub fn handles(&self) -> Vec<Handle<T>> {
        self.iter().map(|(handle, _)| handle).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handle_does_not_resolve_after_reuse() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        arena.remove(a);
        let b = arena.insert(2);
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(b), Some(&2));
        // The slot was reused but the generation moved on.
        assert_ne!(a, b);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut arena = Arena::new();
        let a = arena.insert("x");
        assert_eq!(arena.remove(a), Some("x"));
        assert_eq!(arena.remove(a), None);
        assert!(arena.is_empty());
    }

    #[test]
    fn pair_mut_borrows_both_sides() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        let b = arena.insert(10);
        let (va, vb) = arena.pair_mut(a, b).unwrap();
        std::mem::swap(va, vb);
        assert_eq!(arena.get(a), Some(&10));
        assert_eq!(arena.get(b), Some(&1));
    }

    #[test]
    fn iteration_skips_freed_slots() {
        let mut arena = Arena::new();
        let _a = arena.insert(1);
        let b = arena.insert(2);
        let _c = arena.insert(3);
        arena.remove(b);
        let values: Vec<i32> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1, 3]);
    }
}
