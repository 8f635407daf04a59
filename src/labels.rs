//! Labels and label sets
//!
//! A [`Label`] is an interned identifier (think `Ability.Fireball` or
//! `State.Casting`). Labels compare and hash by their id, so they are cheap to
//! copy around and store in maps. A [`LabelSet`] is the owner-level multiset the
//! ability component shares between all of its abilities.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::{OnceLock, PoisonError, RwLock};

/// Interned identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u32);

#[derive(Default)]
struct LabelTable {
    names: Vec<&'static str>,
    ids: HashMap<&'static str, u32>,
}

fn label_table() -> &'static RwLock<LabelTable> {
    static TABLE: OnceLock<RwLock<LabelTable>> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(LabelTable::default()))
}

impl Label {
    /// Intern `name`, returning the same label for the same string every time.
    pub fn new(name: &str) -> Self {
        {
            let table = label_table().read().unwrap_or_else(PoisonError::into_inner);
            if let Some(&id) = table.ids.get(name) {
                return Label(id);
            }
        }

        let mut table = label_table().write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have interned it between the two locks
        if let Some(&id) = table.ids.get(name) {
            return Label(id);
        }
        let leaked: &'static str = Box::leak(name.to_owned().into_boxed_str());
        let id = table.names.len() as u32;
        table.names.push(leaked);
        table.ids.insert(leaked, id);
        Label(id)
    }

    /// The string this label was interned from.
    pub fn name(&self) -> &'static str {
        let table = label_table().read().unwrap_or_else(PoisonError::into_inner);
        table.names.get(self.0 as usize).copied().unwrap_or("<unknown>")
    }

    /// Raw interned id
    pub fn id(&self) -> u32 {
        self.0
    }
}

impl From<&str> for Label {
    fn from(name: &str) -> Self {
        Label::new(name)
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label({})", self.name())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Label::new(&name))
    }
}

/// Multiset of labels applied to an owner.
///
/// Adding the same label twice requires removing it twice before
/// [`LabelSet::has_label`] reports `false` again, so independent sources
/// (an ability's activation labels, an effect's granted labels) never stomp
/// on each other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    counts: HashMap<Label, u32>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_label(&mut self, label: Label) {
        *self.counts.entry(label).or_insert(0) += 1;
    }

    /// Remove one occurrence of `label`. Returns false if it wasn't present.
    pub fn remove_label(&mut self, label: Label) -> bool {
        match self.counts.get_mut(&label) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.counts.remove(&label);
                true
            }
            None => false,
        }
    }

    /// Bulk add, one occurrence per entry.
    pub fn add_labels<'a>(&mut self, labels: impl IntoIterator<Item = &'a Label>) {
        for label in labels {
            self.add_label(*label);
        }
    }

    /// Bulk remove, one occurrence per entry. Missing labels are ignored.
    pub fn remove_labels<'a>(&mut self, labels: impl IntoIterator<Item = &'a Label>) {
        for label in labels {
            self.remove_label(*label);
        }
    }

    pub fn has_label(&self, label: Label) -> bool {
        self.counts.contains_key(&label)
    }

    pub fn has_all<'a>(&self, labels: impl IntoIterator<Item = &'a Label>) -> bool {
        labels.into_iter().all(|label| self.has_label(*label))
    }

    pub fn has_any<'a>(&self, labels: impl IntoIterator<Item = &'a Label>) -> bool {
        labels.into_iter().any(|label| self.has_label(*label))
    }

    /// How many times `label` has been added and not yet removed.
    pub fn count(&self, label: Label) -> u32 {
        self.counts.get(&label).copied().unwrap_or(0)
    }

    /// Number of distinct labels
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Label> + '_ {
        self.counts.keys().copied()
    }
}

impl FromIterator<Label> for LabelSet {
    fn from_iter<I: IntoIterator<Item = Label>>(iter: I) -> Self {
        let mut set = LabelSet::new();
        for label in iter {
            set.add_label(label);
        }
        set
    }
}
