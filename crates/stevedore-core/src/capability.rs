//! Per-container memo of capabilities already set up.
//!
//! Procedures that perform expensive, idempotent setup (installing a
//! toolchain, unpacking an archiver) record it here so later invocations on
//! the same container handle can skip the work. Every capability is its own
//! type, so two procedures can never collide on a key.
//!
//! ```
//! use stevedore_core::{Capability, ContainerState};
//!
//! struct Rustup;
//!
//! impl Capability for Rustup {
//!     type State = String;
//! }
//!
//! let mut state = ContainerState::default();
//! assert!(state.get::<Rustup>().is_none());
//! state.insert::<Rustup>("1.82.0".to_string());
//! assert_eq!(state.get::<Rustup>().map(String::as_str), Some("1.82.0"));
//! ```
//!
//! The memo lives on the handle only. A fresh handle over the same container
//! starts empty.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// A kind of idempotent setup a procedure can memoize.
pub trait Capability: 'static {
    /// What is remembered once the capability is set up.
    type State: Send + Sync + 'static;
}

/// Typed memo of set-up capabilities.
#[derive(Default)]
pub struct ContainerState {
    entries: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl fmt::Debug for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerState")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ContainerState {
    /// Get the recorded state of capability `C`.
    pub fn get<C: Capability>(&self) -> Option<&C::State> {
        self.entries
            .get(&TypeId::of::<C>())
            .and_then(|state| state.downcast_ref::<C::State>())
    }

    /// Get the recorded state of capability `C` mutably.
    pub fn get_mut<C: Capability>(&mut self) -> Option<&mut C::State> {
        self.entries
            .get_mut(&TypeId::of::<C>())
            .and_then(|state| state.downcast_mut::<C::State>())
    }

    /// Check whether capability `C` has been recorded.
    pub fn contains<C: Capability>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<C>())
    }

    /// Record capability `C`, returning the previous state if any.
    pub fn insert<C: Capability>(&mut self, state: C::State) -> Option<C::State> {
        self.entries
            .insert(TypeId::of::<C>(), Box::new(state))
            .and_then(|old| old.downcast::<C::State>().ok())
            .map(|old| *old)
    }

    /// Forget capability `C`.
    pub fn remove<C: Capability>(&mut self) -> Option<C::State> {
        self.entries
            .remove(&TypeId::of::<C>())
            .and_then(|old| old.downcast::<C::State>().ok())
            .map(|old| *old)
    }
}
