//! Tree-ensemble regressors loaded from JSON tree dumps.
//!
//! Nodes use the XGBoost `dump_model(..., dump_format="json")` shape:
//! `{"nodeid", "split", "split_condition", "yes", "no", "missing", "children"}`
//! for internal nodes and `{"nodeid", "leaf"}` for leaves. Random forests are
//! exported in the same shape and averaged instead of summed.

use super::{FeatureSchema, Regressor};
use crate::error::ModelError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsembleKind {
    GradientBoosted,
    RandomForest,
}

/// Which side of the threshold goes to the `yes` child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// `x < threshold` (XGBoost)
    Lt,
    /// `x <= threshold` (scikit-learn)
    Le,
}

#[derive(Debug, Deserialize)]
struct RawEnsemble {
    kind: EnsembleKind,
    #[serde(default)]
    base_score: f64,
    #[serde(default)]
    comparison: Option<Comparison>,
    trees: Vec<RawNode>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    nodeid: u32,
    #[serde(default)]
    split: Option<String>,
    #[serde(default)]
    split_condition: Option<f64>,
    #[serde(default)]
    yes: Option<u32>,
    #[serde(default)]
    no: Option<u32>,
    #[serde(default)]
    missing: Option<u32>,
    #[serde(default)]
    children: Vec<RawNode>,
    #[serde(default)]
    leaf: Option<f64>,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        yes: usize,
        no: usize,
        missing: usize,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn eval(&self, features: &[f64], cmp: Comparison) -> Result<f64, String> {
        let mut idx = 0;
        // a well-formed tree never revisits a node
        for _ in 0..=self.nodes.len() {
            match &self.nodes[idx] {
                Node::Leaf(v) => return Ok(*v),
                Node::Split {
                    feature,
                    threshold,
                    yes,
                    no,
                    missing,
                } => {
                    let x = features[*feature];
                    idx = if x.is_nan() {
                        *missing
                    } else {
                        let go_yes = match cmp {
                            Comparison::Lt => x < *threshold,
                            Comparison::Le => x <= *threshold,
                        };
                        if go_yes {
                            *yes
                        } else {
                            *no
                        }
                    };
                }
            }
        }
        Err("tree contains a cycle".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    name: String,
    kind: EnsembleKind,
    base_score: f64,
    comparison: Comparison,
    width: usize,
    trees: Vec<Tree>,
}

/// `"MinTemp"` by schema name, or `"f3"` by position.
fn resolve_feature(split: &str, schema: &FeatureSchema) -> Option<usize> {
    if let Some(i) = schema.index_of(split) {
        return Some(i);
    }
    split
        .strip_prefix('f')
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|i| *i < schema.len())
}

fn flatten(root: &RawNode, schema: &FeatureSchema) -> Result<Tree, String> {
    let mut raw: Vec<&RawNode> = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        raw.push(node);
        stack.extend(node.children.iter());
    }
    // root first so evaluation starts at index 0
    let index: HashMap<u32, usize> = raw.iter().enumerate().map(|(i, n)| (n.nodeid, i)).collect();
    if index.len() != raw.len() {
        return Err("duplicate node id".to_string());
    }
    let child = |id: Option<u32>, what: &str, at: u32| -> Result<usize, String> {
        let id = id.ok_or_else(|| format!("node {} has no '{}' child", at, what))?;
        index
            .get(&id)
            .copied()
            .ok_or_else(|| format!("node {} points to missing node {}", at, id))
    };

    let mut nodes = Vec::with_capacity(raw.len());
    for n in &raw {
        if let Some(v) = n.leaf {
            nodes.push(Node::Leaf(v));
            continue;
        }
        let split = n
            .split
            .as_deref()
            .ok_or_else(|| format!("node {} is neither leaf nor split", n.nodeid))?;
        let feature = resolve_feature(split, schema)
            .ok_or_else(|| format!("node {} splits on unknown feature '{}'", n.nodeid, split))?;
        let threshold = n
            .split_condition
            .ok_or_else(|| format!("node {} has no split_condition", n.nodeid))?;
        let yes = child(n.yes, "yes", n.nodeid)?;
        let no = child(n.no, "no", n.nodeid)?;
        let missing = match n.missing {
            Some(_) => child(n.missing, "missing", n.nodeid)?,
            None => yes,
        };
        nodes.push(Node::Split {
            feature,
            threshold,
            yes,
            no,
            missing,
        });
    }
    Ok(Tree { nodes })
}

impl TreeEnsemble {
    pub fn from_json(name: &str, json: &str, schema: &FeatureSchema) -> Result<Self, String> {
        let raw: RawEnsemble = serde_json::from_str(json).map_err(|e| e.to_string())?;
        if raw.trees.is_empty() {
            return Err("ensemble has no trees".to_string());
        }
        let trees = raw
            .trees
            .iter()
            .map(|t| flatten(t, schema))
            .collect::<Result<Vec<_>, _>>()?;
        let comparison = raw.comparison.unwrap_or(match raw.kind {
            EnsembleKind::GradientBoosted => Comparison::Lt,
            EnsembleKind::RandomForest => Comparison::Le,
        });
        Ok(Self {
            name: name.to_string(),
            kind: raw.kind,
            base_score: raw.base_score,
            comparison,
            width: schema.len(),
            trees,
        })
    }

    pub fn load(path: &Path, schema: &FeatureSchema) -> Result<Self, ModelError> {
        let json = std::fs::read_to_string(path).map_err(|source| ModelError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model")
            .to_string();
        Self::from_json(&name, &json, schema).map_err(|message| ModelError::Invalid {
            path: path.display().to_string(),
            message,
        })
    }

    pub fn kind(&self) -> EnsembleKind {
        self.kind
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for TreeEnsemble {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        if features.len() != self.width {
            return Err(ModelError::Width {
                expected: self.width,
                got: features.len(),
            });
        }
        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree
                .eval(features, self.comparison)
                .map_err(|message| ModelError::Invalid {
                    path: self.name.clone(),
                    message,
                })?;
        }
        Ok(match self.kind {
            EnsembleKind::GradientBoosted => self.base_score + sum,
            EnsembleKind::RandomForest => sum / self.trees.len() as f64,
        })
    }
}
