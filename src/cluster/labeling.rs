//! Flat cluster assignments.

use std::collections::BTreeMap;

/// Assignment of every item index to a cluster id.
///
/// Ids are opaque: they are not guaranteed to be contiguous or zero-based
/// (threshold cuts issue 1-based ids). The number of distinct ids is the
/// cluster count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterLabeling {
    labels: Vec<usize>,
}

impl ClusterLabeling {
    /// Wrap a label vector (`labels[i]` is the cluster of item `i`).
    pub fn new(labels: Vec<usize>) -> Self {
        Self { labels }
    }

    /// Per-item labels.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Label of item `index`.
    pub fn label(&self, index: usize) -> usize {
        self.labels[index]
    }

    /// Number of labelled items.
    pub fn n_items(&self) -> usize {
        self.labels.len()
    }

    /// Number of distinct clusters.
    pub fn n_clusters(&self) -> usize {
        self.sizes().len()
    }

    /// Distinct cluster ids in ascending order.
    pub fn cluster_ids(&self) -> Vec<usize> {
        self.sizes().into_keys().collect()
    }

    /// Cluster id -> member count.
    pub fn sizes(&self) -> BTreeMap<usize, usize> {
        let mut sizes = BTreeMap::new();
        for &l in &self.labels {
            *sizes.entry(l).or_insert(0) += 1;
        }
        sizes
    }

    /// Item indices with label `label`, in input order.
    pub fn members(&self, label: usize) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == label)
            .map(|(i, _)| i)
            .collect()
    }

    /// Consume into the raw label vector.
    pub fn into_labels(self) -> Vec<usize> {
        self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labeling_accessors() {
        let l = ClusterLabeling::new(vec![3, 1, 3, 7, 1, 3]);
        assert_eq!(l.n_items(), 6);
        assert_eq!(l.n_clusters(), 3);
        assert_eq!(l.cluster_ids(), vec![1, 3, 7]);
        assert_eq!(l.sizes()[&3], 3);
        assert_eq!(l.members(1), vec![1, 4]);
        assert_eq!(l.label(3), 7);
        assert!(l.members(42).is_empty());
    }
}
