//! Second-order regression tree
//!
//! Fitted to per-row gradients and hessians of the loss. With L2 penalty
//! `lambda` a leaf holding gradient sum G and hessian sum H takes the value
//! `-G / (H + lambda)`, and a split is worth
//! `G_L^2/(H_L+lambda) + G_R^2/(H_R+lambda) - G^2/(H+lambda)`.

use serde::{Deserialize, Serialize};

/// Tree growth limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub reg_lambda: f64,
    /// Minimum hessian sum on each side of a split
    pub min_child_weight: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        TreeParams {
            max_depth: 3,
            reg_lambda: 1.0,
            min_child_weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        /// Rows with `x[feature] < threshold` go left
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Node,
}

/// Training data shared by every node of one tree
struct FitContext<'a> {
    x: &'a [Vec<f64>],
    grad: &'a [f64],
    hess: &'a [f64],
    features: &'a [usize],
    params: &'a TreeParams,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    /// Grow a tree over `rows` of `x`, searching splits only on `features`.
    /// Split gains are added to `gains[feature]`.
    pub fn fit(
        x: &[Vec<f64>],
        grad: &[f64],
        hess: &[f64],
        rows: &[usize],
        features: &[usize],
        params: &TreeParams,
        gains: &mut [f64],
    ) -> Self {
        let ctx = FitContext {
            x,
            grad,
            hess,
            features,
            params,
        };
        let mut rows = rows.to_vec();
        RegressionTree {
            root: ctx.grow(&mut rows, 0, gains),
        }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = row.get(*feature).copied().unwrap_or(0.0);
                    node = if v < *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn depth(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        depth(&self.root)
    }
}

impl FitContext<'_> {
    fn grow(&self, rows: &mut [usize], depth: usize, gains: &mut [f64]) -> Node {
        let (g, h) = self.sums(rows);
        let leaf = Node::Leaf {
            value: -g / (h + self.params.reg_lambda),
        };
        if depth >= self.params.max_depth || rows.len() < 2 {
            return leaf;
        }

        let Some(best) = self.best_split(rows, g, h) else {
            return leaf;
        };
        if let Some(total) = gains.get_mut(best.feature) {
            *total += best.gain;
        }

        // Partition in place: left rows first
        let mut split_at = 0;
        for i in 0..rows.len() {
            if self.x[rows[i]][best.feature] < best.threshold {
                rows.swap(i, split_at);
                split_at += 1;
            }
        }
        let (left_rows, right_rows) = rows.split_at_mut(split_at);

        Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.grow(left_rows, depth + 1, gains)),
            right: Box::new(self.grow(right_rows, depth + 1, gains)),
        }
    }

    fn sums(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter().fold((0.0, 0.0), |(g, h), &r| {
            (g + self.grad[r], h + self.hess[r])
        })
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.reg_lambda)
    }

    /// Exhaustive search over sorted values of each candidate feature
    fn best_split(&self, rows: &[usize], g_total: f64, h_total: f64) -> Option<BestSplit> {
        let parent = self.score(g_total, h_total);
        let min_child = self.params.min_child_weight;
        let mut best: Option<BestSplit> = None;
        let mut order = rows.to_vec();

        for &feature in self.features {
            order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let (mut g_left, mut h_left) = (0.0, 0.0);
            for i in 0..order.len() - 1 {
                let r = order[i];
                g_left += self.grad[r];
                h_left += self.hess[r];

                let here = self.x[r][feature];
                let next = self.x[order[i + 1]][feature];
                if next <= here {
                    continue;
                }
                let (g_right, h_right) = (g_total - g_left, h_total - h_left);
                if h_left < min_child || h_right < min_child {
                    continue;
                }

                let gain = self.score(g_left, h_left) + self.score(g_right, h_right) - parent;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: here + (next - here) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }
}
