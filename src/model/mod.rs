//! Element-model queries consumed by rule conditions.
//!
//! The modeled artifact itself (elements, attributes, containment, types) is
//! an external collaborator — the engine never walks a model tree directly.
//! Rule conditions only ask the questions in [`ModelView`]: identity,
//! containment, the cross-side counterpart produced by the upstream matching
//! stage, and attribute-level differences between two element snapshots.
//!
//! [`ElementStore`] is the in-crate reference implementation, used by tests,
//! benches, and embedders that have no model representation of their own.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ElementId
// ---------------------------------------------------------------------------

/// Stable handle for one model element snapshot.
///
/// An arena index, not an object reference: element data lives in whatever
/// implements [`ModelView`], and ids stay valid for the whole merge session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(u32);

impl ElementId {
    /// Create an id from a raw arena index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The raw arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ModelView
// ---------------------------------------------------------------------------

/// Read/query interface over the modeled artifact.
///
/// All methods must be deterministic for the duration of one merge session;
/// `rename` is the single sanctioned mutation (used by the rename resolution
/// action to break name collisions).
pub trait ModelView {
    /// Element identity/equality.
    fn same(&self, a: ElementId, b: ElementId) -> bool {
        a == b
    }

    /// The containing (parent) element, if any.
    fn container(&self, e: ElementId) -> Option<ElementId>;

    /// The matched counterpart of `e` on the opposite merge side, as produced
    /// by the upstream element-matching stage. `None` means no correspondence
    /// was established.
    fn counterpart(&self, e: ElementId) -> Option<ElementId>;

    /// Names of attributes whose values differ between two element snapshots.
    /// The element name counts as the attribute `"name"`.
    fn differing_attributes(&self, a: ElementId, b: ElementId) -> Vec<String>;

    /// The element's name, if it has one.
    fn name(&self, e: ElementId) -> Option<String>;

    /// Rename an element (rename-resolution support).
    fn rename(&mut self, e: ElementId, name: String);

    /// Returns `true` if `e` is (transitively) contained in `ancestor`.
    ///
    /// Walks the container chain; `e == ancestor` does not count.
    fn contained_in(&self, e: ElementId, ancestor: ElementId) -> bool {
        let mut cursor = self.container(e);
        while let Some(c) = cursor {
            if self.same(c, ancestor) {
                return true;
            }
            cursor = self.container(c);
        }
        false
    }

    /// Display form used in error messages, e.g. `#4 'Order'`.
    fn describe(&self, e: ElementId) -> String {
        match self.name(e) {
            Some(name) => format!("{e} '{name}'"),
            None => e.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// ElementStore — reference ModelView implementation
// ---------------------------------------------------------------------------

/// One element snapshot in the reference store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct ElementRec {
    name: Option<String>,
    type_tag: String,
    container: Option<ElementId>,
    counterpart: Option<ElementId>,
    attrs: BTreeMap<String, String>,
}

/// Arena-backed in-memory model, sufficient for driving the engine directly.
///
/// Holds element snapshots from all three versions (ancestor, left, right);
/// cross-side correspondence is recorded with [`ElementStore::link`].
#[derive(Clone, Debug, Default)]
pub struct ElementStore {
    elements: Vec<ElementRec>,
}

impl ElementStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element snapshot; returns its id.
    pub fn add(&mut self, type_tag: &str, name: Option<&str>, container: Option<ElementId>) -> ElementId {
        let id = ElementId::new(u32::try_from(self.elements.len()).unwrap_or(u32::MAX));
        self.elements.push(ElementRec {
            name: name.map(str::to_owned),
            type_tag: type_tag.to_owned(),
            container,
            counterpart: None,
            attrs: BTreeMap::new(),
        });
        id
    }

    /// Set an attribute value on an element.
    pub fn set_attr(&mut self, e: ElementId, key: &str, value: &str) {
        if let Some(rec) = self.elements.get_mut(e.index()) {
            rec.attrs.insert(key.to_owned(), value.to_owned());
        }
    }

    /// Record a cross-side correspondence between two elements (both ways).
    pub fn link(&mut self, a: ElementId, b: ElementId) {
        if let Some(rec) = self.elements.get_mut(a.index()) {
            rec.counterpart = Some(b);
        }
        if let Some(rec) = self.elements.get_mut(b.index()) {
            rec.counterpart = Some(a);
        }
    }

    /// The element's type tag (empty string for unknown ids).
    #[must_use]
    pub fn type_tag(&self, e: ElementId) -> &str {
        self.elements
            .get(e.index())
            .map_or("", |rec| rec.type_tag.as_str())
    }

    /// Number of elements in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if the store holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn rec(&self, e: ElementId) -> Option<&ElementRec> {
        self.elements.get(e.index())
    }
}

impl ModelView for ElementStore {
    fn container(&self, e: ElementId) -> Option<ElementId> {
        self.rec(e).and_then(|rec| rec.container)
    }

    fn counterpart(&self, e: ElementId) -> Option<ElementId> {
        self.rec(e).and_then(|rec| rec.counterpart)
    }

    fn differing_attributes(&self, a: ElementId, b: ElementId) -> Vec<String> {
        let (Some(ra), Some(rb)) = (self.rec(a), self.rec(b)) else {
            return Vec::new();
        };
        let mut diff = Vec::new();
        if ra.name != rb.name {
            diff.push("name".to_owned());
        }
        // Union of keys, lexicographic (BTreeMap iteration order).
        let mut keys: Vec<&String> = ra.attrs.keys().chain(rb.attrs.keys()).collect();
        keys.sort();
        keys.dedup();
        for key in keys {
            if ra.attrs.get(key) != rb.attrs.get(key) {
                diff.push(key.clone());
            }
        }
        diff
    }

    fn name(&self, e: ElementId) -> Option<String> {
        self.rec(e).and_then(|rec| rec.name.clone())
    }

    fn rename(&mut self, e: ElementId, name: String) {
        if let Some(rec) = self.elements.get_mut(e.index()) {
            rec.name = Some(name);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
