//! CART regression tree (variance reduction).
//!
//! `linfa-trees` only ships a classifier, so the regressor is grown here. Every
//! feature is sorted once up front and stable partitioning keeps each node's rows
//! in that order, so a split search is one sweep per feature with running sums.
//! Thresholds sit halfway between consecutive distinct values and leaves predict
//! the mean.
//!
//! Nodes live in a flat arena and are grown from an explicit work stack: a
//! degenerate tree that peels one row per level costs heap, not call stack.

use crate::config::TreeSettings;
use ndarray::{Array2, ArrayView1};

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    n_features: usize,
    importances: Vec<f64>,
}

/// Rows reaching a node, plus the same rows ordered by each feature.
struct Part {
    rows: Vec<usize>,
    by_feature: Vec<Vec<usize>>,
}

/// A node waiting to be grown into arena slot `slot`.
struct Pending {
    slot: usize,
    depth: usize,
    part: Part,
}

struct Grower<'a> {
    x: &'a Array2<f64>,
    y: &'a [f64],
    settings: &'a TreeSettings,
    importances: Vec<f64>,
    /// Scratch flags, indexed by row, for the split being applied
    goes_left: Vec<bool>,
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Sum of squared deviations from the mean, from running sums.
fn sse(sum: f64, sq_sum: f64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    (sq_sum - sum * sum / n as f64).max(0.0)
}

impl Grower<'_> {
    fn value(&self, row: usize, feature: usize) -> f64 {
        self.x.get((row, feature)).copied().unwrap_or(f64::NAN)
    }

    fn target(&self, row: usize) -> f64 {
        self.y.get(row).copied().unwrap_or(0.0)
    }

    fn grow(&mut self) -> Vec<Node> {
        let n = self.x.nrows();
        let by_feature: Vec<Vec<usize>> = (0..self.x.ncols())
            .map(|feature| {
                let mut order: Vec<usize> = (0..n).collect();
                order.sort_by(|&a, &b| self.value(a, feature).total_cmp(&self.value(b, feature)));
                order
            })
            .collect();

        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut stack = vec![Pending {
            slot: 0,
            depth: 0,
            part: Part {
                rows: (0..n).collect(),
                by_feature,
            },
        }];

        while let Some(pending) = stack.pop() {
            let node = match self.try_split(&pending) {
                Some((best, left, right)) => {
                    let left_slot = nodes.len();
                    let right_slot = left_slot + 1;
                    nodes.push(Node::Leaf { value: 0.0 });
                    nodes.push(Node::Leaf { value: 0.0 });
                    stack.push(Pending {
                        slot: right_slot,
                        depth: pending.depth + 1,
                        part: right,
                    });
                    stack.push(Pending {
                        slot: left_slot,
                        depth: pending.depth + 1,
                        part: left,
                    });
                    Node::Split {
                        feature: best.feature,
                        threshold: best.threshold,
                        left: left_slot,
                        right: right_slot,
                    }
                }
                None => Node::Leaf {
                    value: mean(pending.part.rows.iter().map(|&i| self.target(i))),
                },
            };
            if let Some(slot) = nodes.get_mut(pending.slot) {
                *slot = node;
            }
        }
        nodes
    }

    /// Splits the node's rows, or `None` when it should stay a leaf.
    fn try_split(&mut self, pending: &Pending) -> Option<(BestSplit, Part, Part)> {
        let part = &pending.part;
        let at_max_depth = self
            .settings
            .max_depth
            .is_some_and(|d| pending.depth >= d);
        if part.rows.len() < self.settings.min_samples_split.max(2) || at_max_depth {
            return None;
        }

        let best = self.best_split(part)?;

        for &row in &part.rows {
            let left = self.value(row, best.feature) <= best.threshold;
            if let Some(flag) = self.goes_left.get_mut(row) {
                *flag = left;
            }
        }
        let flags = &self.goes_left;
        let is_left = |row: usize| flags.get(row).copied().unwrap_or(false);

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            part.rows.iter().partition(|&&row| is_left(row));
        let (left_by, right_by): (Vec<Vec<usize>>, Vec<Vec<usize>>) = part
            .by_feature
            .iter()
            .map(|order| order.iter().partition::<Vec<usize>, _>(|&&row| is_left(row)))
            .unzip();

        if let Some(imp) = self.importances.get_mut(best.feature) {
            *imp += best.gain;
        }

        Some((
            best,
            Part {
                rows: left_rows,
                by_feature: left_by,
            },
            Part {
                rows: right_rows,
                by_feature: right_by,
            },
        ))
    }

    fn best_split(&self, part: &Part) -> Option<BestSplit> {
        let n = part.rows.len();
        let min_leaf = self.settings.min_samples_leaf.max(1);
        let (total_sum, total_sq) = part.rows.iter().fold((0.0, 0.0), |(s, q), &i| {
            let v = self.target(i);
            (s + v, q + v * v)
        });
        let parent_sse = sse(total_sum, total_sq, n);
        if parent_sse <= f64::EPSILON {
            return None;
        }

        let mut best: Option<BestSplit> = None;
        for (feature, order) in part.by_feature.iter().enumerate() {
            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for (pos, pair) in order.windows(2).enumerate() {
                let &[cur, next] = pair else {
                    continue;
                };
                let v = self.target(cur);
                left_sum += v;
                left_sq += v * v;

                let left_n = pos + 1;
                let right_n = n - left_n;
                let (cur_x, next_x) = (self.value(cur, feature), self.value(next, feature));
                if left_n < min_leaf || right_n < min_leaf || cur_x == next_x {
                    continue;
                }

                let children = sse(left_sum, left_sq, left_n)
                    + sse(total_sum - left_sum, total_sq - left_sq, right_n);
                let gain = parent_sse - children;
                if gain > 1e-12 && best.is_none_or(|b| gain > b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: cur_x.midpoint(next_x),
                        gain,
                    });
                }
            }
        }
        best
    }
}

impl RegressionTree {
    /// Grows a tree on `x` (rows = samples) and `y`. Inputs are assumed finite
    /// and consistent; the learner wrapper checks that.
    pub fn fit(x: &Array2<f64>, y: &[f64], settings: &TreeSettings) -> Self {
        let mut grower = Grower {
            x,
            y,
            settings,
            importances: vec![0.0; x.ncols()],
            goes_left: vec![false; x.nrows()],
        };
        let nodes = grower.grow();

        let mut importances = grower.importances;
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }

        Self {
            nodes,
            n_features: x.ncols(),
            importances,
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn feature_importance(&self) -> &[f64] {
        &self.importances
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = row.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if v <= *threshold { *left } else { *right };
                }
                None => return f64::NAN,
            }
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Vec<f64> {
        x.rows().into_iter().map(|r| self.predict_row(r)).collect()
    }

    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            match self.nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
                Some(Node::Leaf { .. }) => deepest = deepest.max(depth),
                None => {}
            }
        }
        deepest
    }
}
