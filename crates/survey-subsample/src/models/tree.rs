//! Weighted binary classification tree (CART, Gini impurity).
//!
//! Trees are grown to purity unless limited by depth or leaf size. Every
//! split draws its candidate features from the caller's RNG, and the
//! `Random` splitter also draws its thresholds from it, so a tree is a pure
//! function of its inputs and seed.

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

/// Values closer than this are treated as identical when searching splits.
const FEATURE_THRESHOLD: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Splitter {
    /// Exhaustive search over midpoints between sorted feature values.
    Best,
    /// One uniformly drawn threshold per candidate feature.
    Random,
}

#[derive(Debug, Clone)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: usize,
    pub splitter: Splitter,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        proba: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Weighted class totals at a node.
#[derive(Debug, Clone, Copy, Default)]
struct ClassWeights {
    neg: f64,
    pos: f64,
}

impl ClassWeights {
    fn total(&self) -> f64 {
        self.neg + self.pos
    }

    fn gini(&self) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        let p = self.pos / total;
        let q = self.neg / total;
        1.0 - p * p - q * q
    }

    fn add(&mut self, label: u8, weight: f64) {
        if label == 1 {
            self.pos += weight;
        } else {
            self.neg += weight;
        }
    }

    fn sub(&self, other: &ClassWeights) -> ClassWeights {
        ClassWeights {
            neg: self.neg - other.neg,
            pos: self.pos - other.pos,
        }
    }
}

#[derive(Debug, Clone)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Weighted impurity decrease of the split (unnormalised).
    improvement: f64,
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl DecisionTree {
    /// Grow a tree on the samples with positive weight.
    pub fn fit(
        x: ArrayView2<f64>,
        y: &[u8],
        weights: &[f64],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        assert_eq!(x.nrows(), y.len());
        assert_eq!(x.nrows(), weights.len());

        let indices: Vec<usize> = (0..x.nrows()).filter(|&i| weights[i] > 0.0).collect();
        let mut builder = TreeBuilder {
            x,
            y,
            weights,
            params,
            rng,
            nodes: Vec::new(),
            importances: vec![0.0; x.ncols()],
        };
        builder.build_node(indices, 0);

        let mut importances = builder.importances;
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        DecisionTree {
            nodes: builder.nodes,
            importances,
        }
    }

    /// Weighted fraction of positives in the leaf reached by `row`.
    pub fn predict_proba_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { proba } => return *proba,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Impurity-decrease importances normalised to sum 1 (all zero for a
    /// single-leaf tree).
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

// The view gets its own lifetime; `ArrayView` is invariant over it.
struct TreeBuilder<'x, 'a> {
    x: ArrayView2<'x, f64>,
    y: &'a [u8],
    weights: &'a [f64],
    params: &'a TreeParams,
    rng: &'a mut StdRng,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl<'x, 'a> TreeBuilder<'x, 'a> {
    fn class_weights(&self, indices: &[usize]) -> ClassWeights {
        let mut cw = ClassWeights::default();
        for &i in indices {
            cw.add(self.y[i], self.weights[i]);
        }
        cw
    }

    /// Recursively build tree nodes, returning the index of the new node.
    fn build_node(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let current = self.nodes.len();
        let stats = self.class_weights(&indices);
        let proba = if stats.total() > 0.0 {
            stats.pos / stats.total()
        } else {
            0.0
        };

        let depth_reached = self.params.max_depth.map_or(false, |d| depth >= d);
        if depth_reached
            || indices.len() < self.params.min_samples_split
            || indices.len() < 2 * self.params.min_samples_leaf
            || stats.gini() <= f64::EPSILON
        {
            self.nodes.push(Node::Leaf { proba });
            return current;
        }

        let split = match self.find_split(&indices, &stats) {
            Some(s) => s,
            None => {
                self.nodes.push(Node::Leaf { proba });
                return current;
            }
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[[i, split.feature]] <= split.threshold);

        self.importances[split.feature] += split.improvement;

        // Reserve space for current node
        self.nodes.push(Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: 0,
            right: 0,
        });

        let left_idx = self.build_node(left, depth + 1);
        let right_idx = self.build_node(right, depth + 1);

        if let Node::Split { left, right, .. } = &mut self.nodes[current] {
            *left = left_idx;
            *right = right_idx;
        }

        current
    }

    /// Visit features in random order until `max_features` non-constant
    /// ones have been examined and keep the best valid split among them.
    fn find_split(&mut self, indices: &[usize], parent: &ClassWeights) -> Option<SplitCandidate> {
        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(&mut *self.rng);

        let mut best: Option<SplitCandidate> = None;
        let mut visited = 0;
        for feature in features {
            if visited >= self.params.max_features {
                break;
            }
            let candidate = match self.params.splitter {
                Splitter::Best => self.best_threshold(indices, feature, parent),
                Splitter::Random => self.random_threshold(indices, feature, parent),
            };
            let candidate = match candidate {
                FeatureScan::Constant => continue,
                FeatureScan::Scanned(c) => c,
            };
            visited += 1;

            if let Some(c) = candidate {
                if best.as_ref().map_or(true, |b| c.improvement > b.improvement) {
                    best = Some(c);
                }
            }
        }
        best
    }

    fn improvement(parent: &ClassWeights, left: &ClassWeights, right: &ClassWeights) -> f64 {
        parent.total() * parent.gini() - left.total() * left.gini() - right.total() * right.gini()
    }

    fn best_threshold(&self, indices: &[usize], feature: usize, parent: &ClassWeights) -> FeatureScan {
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

        let first = self.x[[sorted[0], feature]];
        let last = self.x[[sorted[sorted.len() - 1], feature]];
        if last - first <= FEATURE_THRESHOLD {
            return FeatureScan::Constant;
        }

        let min_leaf = self.params.min_samples_leaf;
        let mut left = ClassWeights::default();
        let mut best: Option<SplitCandidate> = None;
        for pos in 0..sorted.len() - 1 {
            let i = sorted[pos];
            left.add(self.y[i], self.weights[i]);

            let here = self.x[[i, feature]];
            let next = self.x[[sorted[pos + 1], feature]];
            if next - here <= FEATURE_THRESHOLD {
                continue;
            }
            let n_left = pos + 1;
            if n_left < min_leaf || sorted.len() - n_left < min_leaf {
                continue;
            }

            let right = parent.sub(&left);
            let improvement = Self::improvement(parent, &left, &right);
            if best.as_ref().map_or(true, |b| improvement > b.improvement) {
                let mut threshold = here / 2.0 + next / 2.0;
                if threshold >= next || !threshold.is_finite() {
                    threshold = here;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    improvement,
                });
            }
        }
        FeatureScan::Scanned(best)
    }

    fn random_threshold(&mut self, indices: &[usize], feature: usize, parent: &ClassWeights) -> FeatureScan {
        let (min, max) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
            let v = self.x[[i, feature]];
            (lo.min(v), hi.max(v))
        });
        if max - min <= FEATURE_THRESHOLD {
            return FeatureScan::Constant;
        }

        let threshold = self.rng.gen_range(min..max);
        let mut left = ClassWeights::default();
        let mut n_left = 0;
        for &i in indices {
            if self.x[[i, feature]] <= threshold {
                left.add(self.y[i], self.weights[i]);
                n_left += 1;
            }
        }
        let min_leaf = self.params.min_samples_leaf;
        if n_left < min_leaf || indices.len() - n_left < min_leaf {
            return FeatureScan::Scanned(None);
        }

        let right = parent.sub(&left);
        FeatureScan::Scanned(Some(SplitCandidate {
            feature,
            threshold,
            improvement: Self::improvement(parent, &left, &right),
        }))
    }
}

enum FeatureScan {
    Constant,
    Scanned(Option<SplitCandidate>),
}
