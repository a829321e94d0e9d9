//! Priority-ordered list of sources.

use crate::source::Source;
use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Shared, mutable sequence of sources.
///
/// By default index 0 has the lowest priority and the last source the
/// highest; a reversed list gives index 0 the highest priority. Clones share
/// the same sequence, and every mutation is seen by the next resolution of
/// any stacked config built over it.
#[derive(Clone, Default)]
pub struct SourceList {
    sources: Arc<ArcSwap<Vec<Source>>>,
    reverse: bool,
}

impl SourceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty list whose first source has the highest priority.
    pub fn reversed() -> Self {
        Self {
            reverse: true,
            ..Self::default()
        }
    }

    pub fn is_reversed(&self) -> bool {
        self.reverse
    }

    pub fn push(&self, source: Source) {
        debug!(source = source.name(), "Adding source");
        self.sources.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(source.clone());
            next
        });
    }

    /// Insert at storage `index`, clamped to the list length.
    pub fn insert(&self, index: usize, source: Source) {
        debug!(source = source.name(), index, "Inserting source");
        self.sources.rcu(|current| {
            let mut next = Vec::clone(current);
            next.insert(index.min(next.len()), source.clone());
            next
        });
    }

    /// Remove the first occurrence of `source` by identity.
    pub fn remove(&self, source: &Source) -> bool {
        let mut removed = false;
        self.sources.rcu(|current| {
            let mut next = Vec::clone(current);
            removed = match next.iter().position(|s| s.ptr_eq(source)) {
                Some(index) => {
                    next.remove(index);
                    true
                }
                None => false,
            };
            next
        });
        if removed {
            debug!(source = source.name(), "Removed source");
        }
        removed
    }

    pub fn remove_at(&self, index: usize) -> Option<Source> {
        let mut removed = None;
        self.sources.rcu(|current| {
            let mut next = Vec::clone(current);
            removed = (index < next.len()).then(|| next.remove(index));
            next
        });
        removed
    }

    /// Swap the source at storage `index`, returning the previous one.
    pub fn replace(&self, index: usize, source: Source) -> Option<Source> {
        let mut previous = None;
        self.sources.rcu(|current| {
            let mut next = Vec::clone(current);
            previous = next
                .get_mut(index)
                .map(|slot| std::mem::replace(slot, source.clone()));
            next
        });
        previous
    }

    pub fn len(&self) -> usize {
        self.sources.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.load().is_empty()
    }

    /// Current sources in storage order.
    pub fn snapshot(&self) -> Arc<Vec<Source>> {
        self.sources.load_full()
    }

    /// Sources in storage order.
    pub fn iter(&self) -> impl Iterator<Item = Source> + use<> {
        let snapshot = self.snapshot();
        (0..snapshot.len()).map(move |i| snapshot[i].clone())
    }

    /// Sources from highest to lowest priority.
    pub fn iter_by_priority(&self) -> impl Iterator<Item = Source> + use<> {
        let snapshot = self.snapshot();
        let len = snapshot.len();
        let reverse = self.reverse;
        (0..len).map(move |i| {
            let index = if reverse { i } else { len - 1 - i };
            snapshot[index].clone()
        })
    }

    /// Typed sources, highest priority first.
    pub fn typed(&self) -> impl Iterator<Item = Source> + use<> {
        self.iter_by_priority().filter(Source::is_typed)
    }

    /// Writable sources, highest priority first.
    pub fn writable(&self) -> impl Iterator<Item = Source> + use<> {
        self.iter_by_priority().filter(Source::is_writable)
    }
}

impl fmt::Debug for SourceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceList")
            .field("sources", &*self.sources.load())
            .field("reverse", &self.reverse)
            .finish()
    }
}

impl FromIterator<Source> for SourceList {
    fn from_iter<I: IntoIterator<Item = Source>>(iter: I) -> Self {
        Self {
            sources: Arc::new(ArcSwap::from_pointee(iter.into_iter().collect())),
            reverse: false,
        }
    }
}
