// src/planner/state.rs

//! Snapshot of the installed/referenced graph for one planning pass

use crate::error::Result;
use crate::source::LocalDatabase;
use crate::trove::{Identity, TroveRef};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// The installed system as seen by the planner
#[derive(Debug, Default)]
pub struct InstalledState {
    present: BTreeSet<Identity>,
    referenced: BTreeSet<Identity>,
    pinned: BTreeSet<Identity>,
    /// Present and referenced identities by name
    by_name: BTreeMap<String, BTreeSet<Identity>>,
    /// Locally installed product → referenced original
    originals: BTreeMap<Identity, Identity>,
    /// Referenced original → locally installed product
    products: BTreeMap<Identity, Identity>,
    /// Children of present containers
    children: BTreeMap<Identity, Vec<TroveRef>>,
    /// Child → (present container, by default)
    parents: BTreeMap<Identity, Vec<(Identity, bool)>>,
}

impl InstalledState {
    pub fn load(db: &dyn LocalDatabase) -> Result<Self> {
        let mut state = Self::default();

        for trove_state in db.trove_states()? {
            let id = trove_state.identity;
            if trove_state.present {
                state.present.insert(id.clone());
            }
            if trove_state.referenced {
                state.referenced.insert(id.clone());
            }
            if trove_state.pinned {
                state.pinned.insert(id.clone());
            }
            state.by_name.entry(id.name.clone()).or_default().insert(id);
        }

        for update in db.local_updates()? {
            state
                .originals
                .insert(update.installed.clone(), update.original.clone());
            state.products.insert(update.original, update.installed);
        }

        // Databases may track pins apart from the trove graph
        let present: Vec<Identity> = state.present.iter().cloned().collect();
        let pins = db.troves_are_pinned(&present)?;
        for (id, pinned) in present.iter().zip(pins) {
            if pinned {
                state.pinned.insert(id.clone());
            }
        }

        for id in present {
            if id.is_component() {
                continue;
            }
            let refs = db.iter_trove_list(&id)?;
            for child in &refs {
                state
                    .parents
                    .entry(child.identity.clone())
                    .or_default()
                    .push((id.clone(), child.by_default));
            }
            state.children.insert(id, refs);
        }

        trace!(
            "installed state: {} present, {} referenced, {} pinned, {} local updates",
            state.present.len(),
            state.referenced.len(),
            state.pinned.len(),
            state.products.len()
        );
        Ok(state)
    }

    pub fn is_present(&self, id: &Identity) -> bool {
        self.present.contains(id)
    }

    pub fn is_referenced(&self, id: &Identity) -> bool {
        self.referenced.contains(id)
    }

    pub fn is_visible(&self, id: &Identity) -> bool {
        self.is_present(id) || self.is_referenced(id)
    }

    pub fn is_pinned(&self, id: &Identity) -> bool {
        self.pinned.contains(id)
    }

    pub fn present(&self) -> &BTreeSet<Identity> {
        &self.present
    }

    /// Present and referenced identities of one name
    pub fn visible_named(&self, name: &str) -> impl Iterator<Item = &Identity> {
        self.by_name.get(name).into_iter().flatten()
    }

    pub fn visible(&self) -> impl Iterator<Item = &Identity> {
        self.by_name.values().flatten()
    }

    /// The referenced trove a local update replaced, if `id` is one
    pub fn original_of(&self, id: &Identity) -> Option<&Identity> {
        self.originals.get(id)
    }

    /// The present local replacement of a referenced trove
    pub fn product_of(&self, id: &Identity) -> Option<&Identity> {
        self.products.get(id).filter(|p| self.is_present(p))
    }

    pub fn children(&self, id: &Identity) -> &[TroveRef] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Present containers of `id` with the by-default bit of each reference
    pub fn parents(&self, id: &Identity) -> &[(Identity, bool)] {
        self.parents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}
