//! Hierarchical (agglomerative) clustering.
//!
//! Bottom-up clustering that builds a **dendrogram** by iteratively
//! merging the closest clusters. Unlike K-means, you don't specify k:
//! the tree is cut at a distance threshold instead.
//!
//! # Algorithm
//!
//! Every item starts as a singleton cluster occupying one *slot*. Each step
//! merges the closest active pair `(i, j)`, `i < j`, into slot `i`, then
//! rewrites slot `i`'s distances with the linkage's Lance–Williams update
//! (see [`Linkage`]).
//!
//! Finding the closest pair is done through a per-slot nearest-neighbour
//! cache over higher slots. After a merge only rows whose cached neighbour
//! was `i` or `j` are rescanned; others just compare against the new
//! distance to `i`. Typical cost is O(N²), worst case O(N³), memory O(N²).
//!
//! # Determinism
//!
//! A slot's index is always the smallest original item index in its
//! cluster. Among pairs at the minimal distance, the lexicographically
//! smallest `(i, j)` wins, i.e. ties are broken by lowest original index.
//!
//! # Node ids
//!
//! Leaves are `0..n`; merge `k` creates node `n + k`. Each merge records the
//! smaller child id first.

use super::labeling::ClusterLabeling;
use super::linkage::Linkage;
use super::traits::Clustering;
use crate::distance::DistanceMatrix;
use crate::error::{Error, Result};
use crate::hierarchy::Dendrogram;

/// Hierarchical (agglomerative) clustering with a distance-threshold cut.
#[derive(Debug, Clone)]
pub struct HierarchicalClustering {
    /// Merges above this distance are cut.
    distance_threshold: f64,
    /// Linkage method.
    linkage: Linkage,
}

impl HierarchicalClustering {
    /// Create a new hierarchical clusterer (average linkage).
    pub fn new(distance_threshold: f64) -> Self {
        Self {
            distance_threshold,
            linkage: Linkage::Average,
        }
    }

    /// Set linkage method.
    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    /// Linkage method.
    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    /// Cut threshold.
    pub fn distance_threshold(&self) -> f64 {
        self.distance_threshold
    }

    /// Build the full dendrogram from pairwise distances.
    pub fn fit_dendrogram(&self, distances: &DistanceMatrix) -> Result<Dendrogram> {
        let n = distances.n_items();
        if n < 2 {
            return Err(Error::insufficient_data(2, n));
        }
        Ok(Agglomeration::new(distances.condensed(), n, self.linkage).run())
    }

    /// Build the dendrogram and cut it at the configured threshold.
    pub fn fit_cut(&self, distances: &DistanceMatrix) -> Result<(Dendrogram, ClusterLabeling)> {
        let dendro = self.fit_dendrogram(distances)?;
        let labels = dendro.cut_at_distance(self.distance_threshold);
        Ok((dendro, labels))
    }
}

impl Clustering for HierarchicalClustering {
    /// Cosine distances, agglomeration, threshold cut.
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        let distances = DistanceMatrix::cosine(data)?;
        let (_, labels) = self.fit_cut(&distances)?;
        Ok(labels.into_labels())
    }
}

/// Working state of one agglomeration run.
struct Agglomeration {
    n: usize,
    linkage: Linkage,
    /// Condensed working distances; entries of inactive slots are stale.
    dist: Vec<f64>,
    active: Vec<bool>,
    size: Vec<usize>,
    /// Dendrogram node currently held by each slot.
    node: Vec<usize>,
    /// Nearest active higher slot, `usize::MAX` if none.
    nn: Vec<usize>,
    nn_dist: Vec<f64>,
}

impl Agglomeration {
    fn new(condensed: &[f64], n: usize, linkage: Linkage) -> Self {
        let mut state = Self {
            n,
            linkage,
            dist: condensed.to_vec(),
            active: vec![true; n],
            size: vec![1; n],
            node: (0..n).collect(),
            nn: vec![usize::MAX; n],
            nn_dist: vec![f64::INFINITY; n],
        };
        for i in 0..n {
            state.rescan(i);
        }
        state
    }

    #[inline]
    fn d(&self, a: usize, b: usize) -> f64 {
        let (i, j) = if a < b { (a, b) } else { (b, a) };
        self.dist[DistanceMatrix::condensed_index(self.n, i, j)]
    }

    #[inline]
    fn set_d(&mut self, a: usize, b: usize, value: f64) {
        let (i, j) = if a < b { (a, b) } else { (b, a) };
        self.dist[DistanceMatrix::condensed_index(self.n, i, j)] = value;
    }

    /// Recompute the nearest higher neighbour of slot `i` (lowest slot on ties).
    fn rescan(&mut self, i: usize) {
        let mut best = usize::MAX;
        let mut best_d = f64::INFINITY;
        for j in (i + 1)..self.n {
            if !self.active[j] {
                continue;
            }
            let d = self.d(i, j);
            if best == usize::MAX || d < best_d {
                best = j;
                best_d = d;
            }
        }
        self.nn[i] = best;
        self.nn_dist[i] = best_d;
    }

    /// Closest active pair; lowest `i` on ties.
    fn closest_pair(&self) -> Option<(usize, usize, f64)> {
        let mut found: Option<(usize, usize, f64)> = None;
        for i in 0..self.n {
            if !self.active[i] || self.nn[i] == usize::MAX {
                continue;
            }
            match found {
                Some((_, _, d)) if self.nn_dist[i] >= d => {}
                _ => found = Some((i, self.nn[i], self.nn_dist[i])),
            }
        }
        found
    }

    fn run(mut self) -> Dendrogram {
        let n = self.n;
        let mut dendro = Dendrogram::new(n);

        for step in 0..n - 1 {
            let Some((i, j, d_ij)) = self.closest_pair() else {
                break;
            };

            let (a, b) = (self.node[i], self.node[j]);
            let merged_size = self.size[i] + self.size[j];
            dendro.add_merge(a.min(b), a.max(b), d_ij, merged_size);

            for k in 0..n {
                if !self.active[k] || k == i || k == j {
                    continue;
                }
                let updated = self.linkage.update(
                    self.d(k, i),
                    self.d(k, j),
                    d_ij,
                    self.size[i],
                    self.size[j],
                    self.size[k],
                );
                self.set_d(k, i, updated);
            }

            self.active[j] = false;
            self.nn[j] = usize::MAX;
            self.nn_dist[j] = f64::INFINITY;
            self.size[i] = merged_size;
            self.node[i] = n + step;

            for k in 0..j {
                if !self.active[k] || k == i {
                    continue;
                }
                if self.nn[k] == i || self.nn[k] == j {
                    self.rescan(k);
                } else if k < i {
                    let d = self.d(k, i);
                    if d < self.nn_dist[k] || (d == self.nn_dist[k] && i < self.nn[k]) {
                        self.nn[k] = i;
                        self.nn_dist[k] = d;
                    }
                }
            }
            self.rescan(i);
        }

        dendro
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn euclidean_condensed(points: &[f64]) -> Vec<f64> {
        let n = points.len();
        let mut out = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                out.push((points[i] - points[j]).abs());
            }
        }
        out
    }

    /// Direct definition of single/complete/average linkage, O(N^4).
    fn naive_heights(condensed: &[f64], n: usize, linkage: Linkage) -> Vec<(usize, usize, f64)> {
        let d = |a: usize, b: usize| {
            let (i, j) = if a < b { (a, b) } else { (b, a) };
            condensed[DistanceMatrix::condensed_index(n, i, j)]
        };
        let mut clusters: Vec<Option<(usize, Vec<usize>)>> =
            (0..n).map(|i| Some((i, vec![i]))).collect();
        let mut out = Vec::new();
        for step in 0..n - 1 {
            let mut best: Option<(usize, usize, f64)> = None;
            for a in 0..n {
                for b in (a + 1)..n {
                    let (Some((_, ma)), Some((_, mb))) = (&clusters[a], &clusters[b]) else {
                        continue;
                    };
                    let pairs: Vec<f64> = ma
                        .iter()
                        .flat_map(|&x| mb.iter().map(move |&y| (x, y)))
                        .map(|(x, y)| d(x, y))
                        .collect();
                    let dist = match linkage {
                        Linkage::Single => pairs.iter().copied().fold(f64::INFINITY, f64::min),
                        Linkage::Complete => pairs.iter().copied().fold(0.0, f64::max),
                        _ => pairs.iter().sum::<f64>() / pairs.len() as f64,
                    };
                    if best.map_or(true, |(_, _, bd)| dist < bd) {
                        best = Some((a, b, dist));
                    }
                }
            }
            let (a, b, dist) = best.unwrap();
            let (na, ma) = clusters[a].take().unwrap();
            let (nb, mb) = clusters[b].take().unwrap();
            out.push((na.min(nb), na.max(nb), dist));
            clusters[a] = Some((n + step, ma.into_iter().chain(mb).collect()));
        }
        out
    }

    #[test]
    fn test_hierarchical_basic() {
        let data = vec![
            vec![1.0, 0.0],
            vec![0.99, 0.05],
            vec![0.0, 1.0],
            vec![0.05, 0.99],
        ];

        let hc = HierarchicalClustering::new(0.4);
        let labels = hc.fit_predict(&data).unwrap();

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
    }

    #[test]
    fn test_dendrogram_shape() {
        let dm = DistanceMatrix::from_condensed(euclidean_condensed(&[0.0, 1.0, 10.0]), 3).unwrap();
        let dendro = HierarchicalClustering::new(0.5).fit_dendrogram(&dm).unwrap();

        assert_eq!(dendro.n_items(), 3);
        assert_eq!(dendro.n_merges(), 2);
        let merges: Vec<_> = dendro.merges().copied().collect();
        assert_eq!((merges[0].cluster_a, merges[0].cluster_b), (0, 1));
        assert_eq!(merges[0].distance, 1.0);
        assert_eq!((merges[1].cluster_a, merges[1].cluster_b), (2, 3));
        assert_eq!(merges[1].size, 3);
        assert_eq!(dendro.root(), Some(4));
    }

    #[test]
    fn test_linkage_heights_on_line() {
        // Points 0, 1, 3: first merge {0,1} at 1, then {2} joins.
        let dm = DistanceMatrix::from_condensed(euclidean_condensed(&[0.0, 1.0, 3.0]), 3).unwrap();
        let top = |l: Linkage| {
            HierarchicalClustering::new(0.0)
                .with_linkage(l)
                .fit_dendrogram(&dm)
                .unwrap()
                .max_distance()
        };
        assert_eq!(top(Linkage::Single), 2.0);
        assert_eq!(top(Linkage::Complete), 3.0);
        assert_eq!(top(Linkage::Average), 2.5);
        let ward = (4.0f64 / 3.0).sqrt() * 2.5;
        assert!((top(Linkage::Ward) - ward).abs() < 1e-12);
    }

    #[test]
    fn test_ties_prefer_lowest_index() {
        // Four points, all pairwise distances equal.
        let dm = DistanceMatrix::from_condensed(vec![1.0; 6], 4).unwrap();
        let dendro = HierarchicalClustering::new(0.5).fit_dendrogram(&dm).unwrap();
        let pairs: Vec<(usize, usize)> = dendro
            .merges()
            .map(|m| (m.cluster_a, m.cluster_b))
            .collect();
        assert_eq!(pairs, vec![(0, 1), (2, 4), (3, 5)]);

        // Equal-distance pairs (2,3) and (0,1): (0,1) first.
        let dm = DistanceMatrix::from_condensed(euclidean_condensed(&[0.0, 1.0, 5.0, 6.0]), 4)
            .unwrap();
        let dendro = HierarchicalClustering::new(0.5).fit_dendrogram(&dm).unwrap();
        let first = dendro.merges().next().copied().unwrap();
        assert_eq!((first.cluster_a, first.cluster_b), (0, 1));
    }

    fn assert_matches_definition(points: &[f64], linkages: &[Linkage]) {
        let condensed = euclidean_condensed(points);
        let dm = DistanceMatrix::from_condensed(condensed.clone(), points.len()).unwrap();

        for &linkage in linkages {
            let dendro = HierarchicalClustering::new(0.0)
                .with_linkage(linkage)
                .fit_dendrogram(&dm)
                .unwrap();
            let got: Vec<(usize, usize, f64)> = dendro
                .merges()
                .map(|m| (m.cluster_a, m.cluster_b, m.distance))
                .collect();
            let want = naive_heights(&condensed, points.len(), linkage);
            assert_eq!(got.len(), want.len());
            for (g, w) in got.iter().zip(&want) {
                assert_eq!((g.0, g.1), (w.0, w.1), "{linkage}: {got:?} vs {want:?}");
                assert!((g.2 - w.2).abs() < 1e-9, "{linkage}: {got:?} vs {want:?}");
            }
        }
    }

    #[test]
    fn test_matches_definition_with_ties() {
        // Integer coordinates produce many exactly equal min/max distances.
        assert_matches_definition(
            &[0.0, 2.0, 3.0, 5.0, 7.0, 8.0, 10.0, 13.0],
            &[Linkage::Single, Linkage::Complete],
        );
    }

    #[test]
    fn test_matches_definition_random() {
        let mut rng = StdRng::seed_from_u64(11);
        let points: Vec<f64> = (0..25).map(|_| rng.random_range(0.0..100.0)).collect();
        assert_matches_definition(
            &points,
            &[Linkage::Single, Linkage::Complete, Linkage::Average],
        );
    }

    #[test]
    fn test_heights_match_kodama() {
        let mut rng = StdRng::seed_from_u64(7);
        let data: Vec<Vec<f32>> = (0..40)
            .map(|_| (0..6).map(|_| rng.random_range(0.01f32..1.0)).collect())
            .collect();
        let dm = DistanceMatrix::cosine(&data).unwrap();

        for (linkage, method) in [
            (Linkage::Single, kodama::Method::Single),
            (Linkage::Complete, kodama::Method::Complete),
            (Linkage::Average, kodama::Method::Average),
            (Linkage::Ward, kodama::Method::Ward),
        ] {
            let ours = HierarchicalClustering::new(0.0)
                .with_linkage(linkage)
                .fit_dendrogram(&dm)
                .unwrap();
            let mut condensed = dm.condensed().to_vec();
            let reference = kodama::linkage(&mut condensed, data.len(), method);

            let mut a = ours.distances();
            let mut b: Vec<f64> = reference.steps().iter().map(|s| s.dissimilarity).collect();
            a.sort_by(|x, y| x.total_cmp(y));
            b.sort_by(|x, y| x.total_cmp(y));
            assert_eq!(a.len(), b.len());
            for (x, y) in a.iter().zip(&b) {
                assert!((x - y).abs() < 1e-9, "{linkage}: {x} vs {y}");
            }
        }
    }

    #[test]
    fn test_threshold_extremes() {
        let data: Vec<Vec<f32>> = (0..12)
            .map(|i| vec![1.0, i as f32 * 0.3, (i % 3) as f32])
            .collect();
        let dm = DistanceMatrix::cosine(&data).unwrap();

        for linkage in Linkage::ALL {
            let dendro = HierarchicalClustering::new(0.0)
                .with_linkage(linkage)
                .fit_dendrogram(&dm)
                .unwrap();
            assert_eq!(dendro.cut_at_distance(0.0).n_clusters(), 12, "{linkage}");
            assert_eq!(
                dendro.cut_at_distance(dendro.max_distance()).n_clusters(),
                1,
                "{linkage}"
            );
        }
    }

    proptest! {
        #[test]
        fn tree_has_n_minus_one_merges_and_full_root(
            data in proptest::collection::vec(
                proptest::collection::vec(0.05f32..1.0, 3),
                2..30,
            ),
            which in 0usize..4,
        ) {
            let n = data.len();
            let dm = DistanceMatrix::cosine(&data).unwrap();
            let dendro = HierarchicalClustering::new(0.3)
                .with_linkage(Linkage::ALL[which])
                .fit_dendrogram(&dm)
                .unwrap();

            prop_assert_eq!(dendro.n_merges(), n - 1);
            let root = dendro.root().unwrap();
            prop_assert_eq!(dendro.count(root), n);
            let mut leaves = dendro.leaves_under(root);
            leaves.sort_unstable();
            prop_assert_eq!(leaves, (0..n).collect::<Vec<_>>());

            let heights = dendro.distances();
            prop_assert!(heights.windows(2).all(|w| w[0] <= w[1] + 1e-12));
        }
    }
}
