//! Dendrogram (linkage tree) for agglomerative clustering.
//!
//! A dendrogram records the nested merges produced by agglomerative
//! (bottom-up) clustering. Node ids follow the SciPy/MATLAB convention:
//!
//! - leaves: `0..n`
//! - merge `k` creates node `n + k`
//!
//! so a complete tree over `n` items has `n - 1` merges and root `2n - 2`.
//! Children always have smaller ids than their parent, which lets most
//! passes walk the merge list front to back instead of recursing.

use crate::cluster::ClusterLabeling;

/// A dendrogram representing hierarchical cluster merges.
///
/// Each merge combines two clusters into one, recording:
/// - Which clusters were merged
/// - The distance at which they merged
/// - The size of the resulting cluster
#[derive(Debug, Clone)]
pub struct Dendrogram {
    /// Merge history, in merge order.
    merges: Vec<Merge>,
    /// Number of original items.
    n_items: usize,
}

/// A single merge operation in the dendrogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    /// First (left) node being merged.
    pub cluster_a: usize,
    /// Second (right) node being merged.
    pub cluster_b: usize,
    /// Distance/dissimilarity at which merge occurred.
    pub distance: f64,
    /// Number of original items under the resulting node.
    pub size: usize,
}

/// A node looked up by id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DendrogramNode<'a> {
    /// An original item, by index.
    Leaf(usize),
    /// A merge node.
    Internal(&'a Merge),
}

impl Dendrogram {
    /// Create a new dendrogram for n items.
    pub fn new(n_items: usize) -> Self {
        Self {
            merges: Vec::with_capacity(n_items.saturating_sub(1)),
            n_items,
        }
    }

    /// Record a merge operation.
    pub fn add_merge(&mut self, cluster_a: usize, cluster_b: usize, distance: f64, size: usize) {
        self.merges.push(Merge {
            cluster_a,
            cluster_b,
            distance,
            size,
        });
    }

    /// Number of original items.
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Number of merges recorded.
    pub fn n_merges(&self) -> usize {
        self.merges.len()
    }

    /// Total number of nodes (leaves plus merges).
    pub fn n_nodes(&self) -> usize {
        self.n_items + self.merges.len()
    }

    /// Iterate over merges.
    pub fn merges(&self) -> impl Iterator<Item = &Merge> {
        self.merges.iter()
    }

    /// Get the merge distances, in merge order.
    pub fn distances(&self) -> Vec<f64> {
        self.merges.iter().map(|m| m.distance).collect()
    }

    /// Largest merge distance (0 for a tree without merges).
    pub fn max_distance(&self) -> f64 {
        self.merges.iter().map(|m| m.distance).fold(0.0, f64::max)
    }

    /// Whether the merges join all items into one tree.
    pub fn is_complete(&self) -> bool {
        self.n_items > 0 && self.merges.len() + 1 == self.n_items
    }

    /// Look up a node by id.
    pub fn node(&self, id: usize) -> Option<DendrogramNode<'_>> {
        if id < self.n_items {
            Some(DendrogramNode::Leaf(id))
        } else {
            self.merges.get(id - self.n_items).map(DendrogramNode::Internal)
        }
    }

    /// Number of items under node `id`.
    pub fn count(&self, id: usize) -> usize {
        match self.node(id) {
            Some(DendrogramNode::Leaf(_)) => 1,
            Some(DendrogramNode::Internal(m)) => m.size,
            None => 0,
        }
    }

    /// Root node id of a complete tree.
    pub fn root(&self) -> Option<usize> {
        self.is_complete().then(|| self.n_nodes() - 1)
    }

    /// Top-level nodes (never merged into a parent), ascending.
    ///
    /// A complete tree has exactly one; a partial merge history is a forest.
    pub fn roots(&self) -> Vec<usize> {
        let mut has_parent = vec![false; self.n_nodes()];
        for m in &self.merges {
            if let Some(slot) = has_parent.get_mut(m.cluster_a) {
                *slot = true;
            }
            if let Some(slot) = has_parent.get_mut(m.cluster_b) {
                *slot = true;
            }
        }
        (0..self.n_nodes()).filter(|&id| !has_parent[id]).collect()
    }

    /// Leaf indices under node `id`, left to right.
    pub fn leaves_under(&self, id: usize) -> Vec<usize> {
        let mut leaves = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            match self.node(node) {
                Some(DendrogramNode::Leaf(i)) => leaves.push(i),
                Some(DendrogramNode::Internal(m)) => {
                    stack.push(m.cluster_b);
                    stack.push(m.cluster_a);
                }
                None => {}
            }
        }
        leaves
    }

    /// Largest merge distance within each node's subtree, indexed by node id.
    ///
    /// Equals the node's own distance when merge heights are monotone.
    fn subtree_max_distances(&self) -> Vec<f64> {
        let mut max_below = vec![0.0f64; self.n_nodes()];
        for (k, m) in self.merges.iter().enumerate() {
            let below = max_below
                .get(m.cluster_a)
                .copied()
                .unwrap_or(0.0)
                .max(max_below.get(m.cluster_b).copied().unwrap_or(0.0));
            max_below[self.n_items + k] = m.distance.max(below);
        }
        max_below
    }

    /// Get cluster assignments at a given distance threshold.
    ///
    /// A node becomes one flat cluster when no merge in its subtree happened
    /// above `threshold`; merges above it are "cut", leaving their subtrees
    /// as separate clusters. Labels start at 1 and are issued in
    /// left-to-right order of the leaves (SciPy `fcluster(t, "distance")`).
    ///
    /// `threshold <= 0` with distinct points isolates every item;
    /// `threshold >= max_distance()` yields a single cluster.
    pub fn cut_at_distance(&self, threshold: f64) -> ClusterLabeling {
        let max_below = self.subtree_max_distances();
        let mut labels = vec![0usize; self.n_items];
        let mut next_label = 1;

        let mut stack: Vec<usize> = self.roots().into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            match self.node(id) {
                Some(DendrogramNode::Internal(m)) if max_below[id] > threshold => {
                    stack.push(m.cluster_b);
                    stack.push(m.cluster_a);
                }
                Some(_) => {
                    for leaf in self.leaves_under(id) {
                        labels[leaf] = next_label;
                    }
                    next_label += 1;
                }
                None => {}
            }
        }

        ClusterLabeling::new(labels)
    }

    /// Smallest threshold at which a cut leaves at most `k` clusters.
    ///
    /// `None` when `k == 0`. Ties in merge height can leave fewer than `k`.
    pub fn threshold_for_k(&self, k: usize) -> Option<f64> {
        if k == 0 {
            return None;
        }
        let mut heights = self.distances();
        heights.sort_by(|a, b| a.total_cmp(b));
        let n_merges = self.n_items.saturating_sub(k);
        if n_merges == 0 {
            return Some(0.0);
        }
        heights.get(n_merges - 1).copied().or(heights.last().copied())
    }
}
