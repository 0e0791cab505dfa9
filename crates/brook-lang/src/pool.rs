//! Collection pool: reusable scratch containers for one compile pipeline.
//!
//! Containers are keyed by their concrete type. `take` hands out a `Pooled`
//! guard with exclusive access; dropping the guard clears the container and
//! returns it, so a released container can never be read again. The pool is
//! `!Sync`: one pipeline, one thread, one pool.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::hash::Hash;
use std::ops::{Deref, DerefMut};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::InternalError;

// ─── Recycle ──────────────────────────────────────────────────────────────────

/// A container that can be emptied and handed out again.
pub trait Recycle: Default + 'static {
    fn recycle(&mut self);
}

impl<T: 'static> Recycle for Vec<T> {
    fn recycle(&mut self) { self.clear(); }
}

impl<T: 'static> Recycle for VecDeque<T> {
    fn recycle(&mut self) { self.clear(); }
}

impl<T: Eq + Hash + 'static> Recycle for FxHashSet<T> {
    fn recycle(&mut self) { self.clear(); }
}

impl<K: Eq + Hash + 'static, V: 'static> Recycle for FxHashMap<K, V> {
    fn recycle(&mut self) { self.clear(); }
}

// ─── Pool ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct CollectionPool {
    free: RefCell<FxHashMap<TypeId, Vec<Box<dyn Any>>>>,
    outstanding: Cell<usize>,
    checkouts: Cell<usize>,
    reuses: Cell<usize>,
}

impl CollectionPool {
    pub fn new() -> Self { Self::default() }

    /// Check out an empty container of type `C`.
    pub fn take<C: Recycle>(&self) -> Pooled<'_, C> {
        let reused = self
            .free
            .borrow_mut()
            .get_mut(&TypeId::of::<C>())
            .and_then(Vec::pop)
            .and_then(|boxed| boxed.downcast::<C>().ok());

        let value = match reused {
            Some(boxed) => {
                self.reuses.set(self.reuses.get() + 1);
                *boxed
            }
            None => C::default(),
        };
        self.outstanding.set(self.outstanding.get() + 1);
        self.checkouts.set(self.checkouts.get() + 1);
        Pooled { pool: self, value }
    }

    fn give_back<C: Recycle>(&self, mut value: C) {
        value.recycle();
        self.free
            .borrow_mut()
            .entry(TypeId::of::<C>())
            .or_default()
            .push(Box::new(value));
        self.outstanding.set(self.outstanding.get().saturating_sub(1));
    }

    /// Containers currently checked out.
    pub fn outstanding(&self) -> usize { self.outstanding.get() }

    /// Total checkouts since the last `clear`.
    pub fn checkouts(&self) -> usize { self.checkouts.get() }

    /// Checkouts served from a previously returned container.
    pub fn reuses(&self) -> usize { self.reuses.get() }

    /// Drop every pooled container. Fails if a guard was leaked.
    pub fn clear(&mut self) -> Result<(), InternalError> {
        let outstanding = self.outstanding.get();
        self.free.get_mut().clear();
        self.checkouts.set(0);
        self.reuses.set(0);
        if outstanding != 0 {
            self.outstanding.set(0);
            return Err(InternalError::PoolImbalance { outstanding });
        }
        Ok(())
    }
}

// ─── Guard ────────────────────────────────────────────────────────────────────

/// Exclusive checkout of a pooled container; released on drop.
pub struct Pooled<'p, C: Recycle> {
    pool: &'p CollectionPool,
    value: C,
}

impl<C: Recycle> Deref for Pooled<'_, C> {
    type Target = C;
    fn deref(&self) -> &C { &self.value }
}

impl<C: Recycle> DerefMut for Pooled<'_, C> {
    fn deref_mut(&mut self) -> &mut C { &mut self.value }
}

impl<C: Recycle> Drop for Pooled<'_, C> {
    fn drop(&mut self) {
        let value = std::mem::take(&mut self.value);
        self.pool.give_back(value);
    }
}
