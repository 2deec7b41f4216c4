//! View Registry
//!
//! Owns every live [`RenderView`] so teardown is centralized and ordered
//! instead of scattered across per-component globals. Views are destroyed in
//! reverse insertion order, which unwinds dependencies between a primary
//! view and secondaries bound after it.

use slotmap::{SlotMap, new_key_type};

use crate::surface::host::SurfaceHost;
use crate::surface::view::RenderView;

new_key_type! {
    /// Stable key for a registered view.
    pub struct ViewId;
}

/// Registry of owned render views.
#[derive(Default)]
pub struct ViewRegistry {
    views: SlotMap<ViewId, RenderView>,
    /// Insertion order, used for reverse-order teardown.
    order: Vec<ViewId>,
}

impl ViewRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of a view and returns its key.
    pub fn insert(&mut self, view: RenderView) -> ViewId {
        let id = self.views.insert(view);
        self.order.push(id);
        id
    }

    #[must_use]
    pub fn get(&self, id: ViewId) -> Option<&RenderView> {
        self.views.get(id)
    }

    #[must_use]
    pub fn get_mut(&mut self, id: ViewId) -> Option<&mut RenderView> {
        self.views.get_mut(id)
    }

    /// Destroys and removes a single view. Unknown ids are ignored.
    pub fn remove(&mut self, id: ViewId, host: &mut dyn SurfaceHost) {
        if let Some(mut view) = self.views.remove(id) {
            view.destroy(host);
            self.order.retain(|&o| o != id);
        }
    }

    /// Destroys every live view in reverse insertion order and empties the
    /// registry.
    pub fn destroy_all(&mut self, host: &mut dyn SurfaceHost) {
        for id in self.order.drain(..).rev() {
            if let Some(mut view) = self.views.remove(id) {
                view.destroy(host);
            }
        }
        self.views.clear();
    }

    /// Number of live views.
    #[must_use]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Iterates live views in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ViewId, &RenderView)> {
        self.order.iter().filter_map(|&id| self.views.get(id).map(|v| (id, v)))
    }

    /// Iterates live views mutably, in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ViewId, &mut RenderView)> {
        let order = &self.order;
        let mut views: Vec<(ViewId, &mut RenderView)> = self.views.iter_mut().collect();
        views.sort_by_key(|(id, _)| order.iter().position(|o| o == id));
        views.into_iter()
    }
}
