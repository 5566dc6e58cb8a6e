use crate::elements::{ElementId, VisualId};

/// Ordering record of one attached representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderedEntry {
    pub visual: VisualId,
    pub element: ElementId,
    pub z_index: i32,
}

/// Attached representations sorted ascending by z-index.
///
/// Equal z-indices keep insertion order: a new entry goes before the first
/// entry with a strictly greater z-index.
#[derive(Debug, Clone, Default)]
pub struct RenderedSet {
    entries: Vec<RenderedEntry>,
}

impl RenderedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entry` at its rank and returns that position
    pub fn insert(&mut self, entry: RenderedEntry) -> usize {
        let position = self.rank_of(entry.z_index);
        self.entries.insert(position, entry);
        position
    }

    /// Removes by identity, returning where the entry was
    pub fn remove(&mut self, visual: VisualId) -> Option<(usize, RenderedEntry)> {
        let position = self.position(visual)?;
        Some((position, self.entries.remove(position)))
    }

    /// Swaps the entry for `old` with `new`.
    ///
    /// With an unchanged z-index the new entry takes the exact same position;
    /// otherwise it moves to the rank of its new z-index. Returns the position
    /// the new entry occupies.
    pub fn replace(&mut self, old: VisualId, new: RenderedEntry) -> Option<usize> {
        let position = self.position(old)?;
        if self.entries[position].z_index == new.z_index {
            self.entries[position] = new;
            Some(position)
        } else {
            self.entries.remove(position);
            Some(self.insert(new))
        }
    }

    pub fn position(&self, visual: VisualId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.visual == visual)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderedEntry> {
        self.entries.iter()
    }

    pub fn is_sorted(&self) -> bool {
        self.entries
            .windows(2)
            .all(|pair| pair[0].z_index <= pair[1].z_index)
    }

    fn rank_of(&self, z_index: i32) -> usize {
        self.entries.partition_point(|entry| entry.z_index <= z_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64, z_index: i32) -> RenderedEntry {
        RenderedEntry {
            visual: VisualId(id),
            element: ElementId(id),
            z_index,
        }
    }

    fn visuals(set: &RenderedSet) -> Vec<u64> {
        set.iter().map(|e| e.visual.0).collect()
    }

    #[test]
    fn test_insert_keeps_order_and_stability() {
        let mut set = RenderedSet::new();
        assert_eq!(set.insert(entry(1, 0)), 0);
        assert_eq!(set.insert(entry(2, -10)), 0);
        assert_eq!(set.insert(entry(3, 0)), 2);
        assert_eq!(set.insert(entry(4, 5)), 3);
        assert_eq!(set.insert(entry(5, -10)), 1);

        assert_eq!(visuals(&set), vec![2, 5, 1, 3, 4]);
        assert!(set.is_sorted());
    }

    #[test]
    fn test_remove_by_identity() {
        let mut set = RenderedSet::new();
        set.insert(entry(1, 0));
        set.insert(entry(2, 0));

        assert_eq!(set.remove(VisualId(1)), Some((0, entry(1, 0))));
        assert_eq!(set.remove(VisualId(1)), None);
        assert_eq!(visuals(&set), vec![2]);
    }

    #[test]
    fn test_replace_in_place() {
        let mut set = RenderedSet::new();
        set.insert(entry(1, 0));
        set.insert(entry(2, 0));
        set.insert(entry(3, 0));

        assert_eq!(set.replace(VisualId(2), entry(9, 0)), Some(1));
        assert_eq!(visuals(&set), vec![1, 9, 3]);

        // A changed z-index moves the entry to its new rank
        assert_eq!(set.replace(VisualId(1), entry(8, 7)), Some(2));
        assert_eq!(visuals(&set), vec![9, 3, 8]);
        assert!(set.is_sorted());
    }
}
