//! Index-based disjoint-set forest with path compression.

#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    /// `len` singleton sets, `0..len`.
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Hang `child`'s set under `parent`'s root. Returns the surviving root.
    pub fn attach(&mut self, child: usize, parent: usize) -> usize {
        let child_root = self.find(child);
        let parent_root = self.find(parent);
        if child_root != parent_root {
            self.parent[child_root] = parent_root;
        }
        parent_root
    }

    pub fn same(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }
}
