//! Group scopes.

use std::cell::OnceCell;

#[derive(Debug)]
struct Group {
    parent: Option<usize>,
    filters: Vec<String>,
    in_scope: OnceCell<Vec<String>>,
}

/// Arena of nested groups, addressed by index.
#[derive(Debug, Default)]
pub struct GroupTree {
    groups: Vec<Group>,
}

impl GroupTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group below `parent` and return its index.
    pub fn open(&mut self, parent: Option<usize>, filters: Vec<String>) -> usize {
        self.groups.push(Group {
            parent,
            filters,
            in_scope: OnceCell::new(),
        });
        self.groups.len() - 1
    }

    /// Ancestors' filters root-first, then the group's own. Computed once.
    pub fn in_scope_filters(&self, group: usize) -> &[String] {
        let entry = &self.groups[group];
        entry.in_scope.get_or_init(|| {
            let mut filters = entry
                .parent
                .map(|p| self.in_scope_filters(p).to_vec())
                .unwrap_or_default();
            filters.extend(entry.filters.iter().cloned());
            filters
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_in_scope_filters_root_first() {
        let mut tree = GroupTree::new();
        let root = tree.open(None, names(&["r1", "r2"]));
        let a = tree.open(Some(root), names(&["a"]));
        let b = tree.open(Some(a), names(&["b1", "b2"]));

        assert_eq!(tree.in_scope_filters(b), names(&["r1", "r2", "a", "b1", "b2"]).as_slice());
        assert_eq!(tree.in_scope_filters(a), names(&["r1", "r2", "a"]).as_slice());
    }

    #[test]
    fn test_in_scope_filters_memoized() {
        let mut tree = GroupTree::new();
        let root = tree.open(None, names(&["r"]));
        let first = tree.in_scope_filters(root).as_ptr();
        let second = tree.in_scope_filters(root).as_ptr();
        assert_eq!(first, second);
    }

    #[test]
    fn test_siblings_do_not_leak() {
        let mut tree = GroupTree::new();
        let root = tree.open(None, names(&["r"]));
        let left = tree.open(Some(root), names(&["left"]));
        let right = tree.open(Some(root), names(&["right"]));

        assert_eq!(tree.in_scope_filters(left), names(&["r", "left"]).as_slice());
        assert_eq!(tree.in_scope_filters(right), names(&["r", "right"]).as_slice());
    }
}
