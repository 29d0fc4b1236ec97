//! Generic tag-keyed record table. Insertion-only with get-or-create
//! semantics; the table owns its records and lookups hand out borrows.

use std::collections::BTreeMap;

use crate::domain::Tag;

/// A record kind stored in a [`Table`]. The tag is fixed at creation and the
/// table never exposes a way to change it.
pub trait Keyed {
    fn with_tag(tag: Tag) -> Self;
    fn tag(&self) -> Tag;
}

#[derive(Debug)]
pub struct Table<R> {
    records: BTreeMap<Tag, R>,
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }
}

impl<R: Keyed> Table<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record for `tag`, creating it first if absent.
    pub fn create(&mut self, tag: Tag) -> &mut R {
        self.records.entry(tag).or_insert_with(|| R::with_tag(tag))
    }

    pub fn get(&self, tag: &Tag) -> Option<&R> {
        self.records.get(tag)
    }

    pub fn get_mut(&mut self, tag: &Tag) -> Option<&mut R> {
        self.records.get_mut(tag)
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.records.values()
    }

    pub fn filter<'a, F>(&'a self, predicate: F) -> impl Iterator<Item = &'a R>
    where
        F: Fn(&R) -> bool + 'a,
    {
        self.records.values().filter(move |r| predicate(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TagKind;

    #[derive(Debug)]
    struct Dummy {
        tag: Tag,
        touched: u32,
    }

    impl Keyed for Dummy {
        fn with_tag(tag: Tag) -> Self {
            Self { tag, touched: 0 }
        }

        fn tag(&self) -> Tag {
            self.tag
        }
    }

    #[test]
    fn create_is_idempotent() {
        let mut table: Table<Dummy> = Table::new();
        table.create(Tag::new(TagKind::Season, "1987")).touched = 3;
        let again = table.create(Tag::new(TagKind::Season, "1987"));
        assert_eq!(again.touched, 3);
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn lookup_folds_case() {
        let mut table: Table<Dummy> = Table::new();
        table.create(Tag::player("BONDB001"));
        assert!(table.get(&Tag::player("bondb001")).is_some());
        assert!(table.get(&Tag::player("ruthb101")).is_none());
    }

    #[test]
    fn filtered_iteration() {
        let mut table: Table<Dummy> = Table::new();
        table.create(Tag::player("aaaa0001")).touched = 1;
        table.create(Tag::player("bbbb0001")).touched = 2;
        table.create(Tag::player("cccc0001")).touched = 2;
        assert_eq!(table.filter(|d| d.touched == 2).count(), 2);
        assert_eq!(table.iter().count(), 3);
    }
}
