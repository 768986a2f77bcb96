//! Nested dendrogram export.
//!
//! The merge list is turned into a nested tree whose leaves carry the
//! original item and its flat cluster label:
//!
//! ```text
//! internal {id: 0, distance: 0.9, count: 3}
//! ├── internal {id: 1, distance: 0.2, count: 2}
//! │   ├── leaf {id: 2, sample_index: 0}
//! │   └── leaf {id: 3, sample_index: 1}
//! └── leaf {id: 4, sample_index: 2}
//! ```
//!
//! Ids are issued in pre-order (a parent before its children, left before
//! right) from a counter starting at 0. They depend only on the tree shape,
//! so exporting the same tree twice gives identical output.
//!
//! Chaining data (single linkage over a gradient, near-duplicate runs) yields
//! trees as deep as they are wide. Building, dropping and reading back a
//! tree never recurse on the Rust stack; writing one grows the stack on
//! demand with `stacker`.

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use super::RunSnapshot;
use crate::cluster::{ClusterLabeling, Linkage};
use crate::error::{Error, Result};
use crate::hierarchy::{Dendrogram, DendrogramNode};
use crate::item::Item;

/// Stack left free before `stacker` allocates a new segment.
const STACK_RED_ZONE: usize = 64 * 1024;
/// Size of each new stack segment.
const STACK_SEGMENT: usize = 1024 * 1024;

/// A node of the exported tree.
///
/// Serialized internally tagged: `{"type": "leaf", ...}` or
/// `{"type": "internal", ..., "children": [left, right]}`.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    /// An original item.
    Leaf {
        /// Pre-order node id.
        id: usize,
        /// Index of the item in the input.
        sample_index: usize,
        /// Item text.
        text: String,
        /// Item metadata.
        metadata: Value,
        /// Flat cluster label of the item.
        cluster_label: usize,
        /// Always 0.
        distance: f64,
        /// Always 1.
        count: usize,
    },
    /// A merge of two subtrees.
    Internal {
        /// Pre-order node id.
        id: usize,
        /// Merge distance.
        distance: f64,
        /// Number of items below.
        count: usize,
        /// Left and right subtrees.
        children: Box<[TreeNode; 2]>,
    },
}

impl TreeNode {
    /// Pre-order id.
    pub fn id(&self) -> usize {
        match self {
            TreeNode::Leaf { id, .. } | TreeNode::Internal { id, .. } => *id,
        }
    }

    /// Number of items below (1 for a leaf).
    pub fn count(&self) -> usize {
        match self {
            TreeNode::Leaf { count, .. } | TreeNode::Internal { count, .. } => *count,
        }
    }

    /// Whether this is a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }

    /// Depth of the tree (1 for a leaf), computed without recursion.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let TreeNode::Internal { children, .. } = node {
                stack.extend(children.iter().map(|c| (c, depth + 1)));
            }
        }
        deepest
    }

    /// Rebuild a tree from its JSON value.
    ///
    /// Works bottom-up with an explicit stack, so the depth of the input is
    /// bounded by memory rather than by the thread's stack. Anything other
    /// than a well-formed `leaf`/`internal` node is a [`Error::MalformedTree`]
    /// or a [`Error::Json`] naming the bad field.
    pub fn from_value(value: Value) -> Result<Self> {
        enum Frame {
            Visit(Value),
            Join(InternalFields),
        }

        let mut work = vec![Frame::Visit(value)];
        let mut built: Vec<TreeNode> = Vec::new();
        while let Some(frame) = work.pop() {
            match frame {
                Frame::Visit(value) => {
                    let mut map = match value {
                        Value::Object(map) => map,
                        other => {
                            return Err(Error::MalformedTree(format!(
                                "tree node must be an object, got {other}"
                            )))
                        }
                    };
                    match map.get("type").and_then(Value::as_str) {
                        Some("leaf") => {
                            let leaf: LeafFields = serde_json::from_value(Value::Object(map))?;
                            built.push(leaf.into());
                        }
                        Some("internal") => {
                            let children = match map.remove("children") {
                                Some(Value::Array(children)) => children,
                                _ => {
                                    return Err(Error::MalformedTree(
                                        "internal node without a children array".to_string(),
                                    ))
                                }
                            };
                            let [left, right]: [Value; 2] =
                                children.try_into().map_err(|c: Vec<Value>| {
                                    Error::MalformedTree(format!(
                                        "internal node has {} children, expected 2",
                                        c.len()
                                    ))
                                })?;
                            let fields: InternalFields =
                                serde_json::from_value(Value::Object(map))?;
                            work.push(Frame::Join(fields));
                            work.push(Frame::Visit(right));
                            work.push(Frame::Visit(left));
                        }
                        other => {
                            return Err(Error::MalformedTree(format!(
                                "unknown node type {other:?}"
                            )))
                        }
                    }
                }
                Frame::Join(fields) => {
                    let (right, left) = match (built.pop(), built.pop()) {
                        (Some(right), Some(left)) => (right, left),
                        _ => return Err(Error::MalformedTree("missing subtree".to_string())),
                    };
                    built.push(TreeNode::Internal {
                        id: fields.id,
                        distance: fields.distance,
                        count: fields.count,
                        children: Box::new([left, right]),
                    });
                }
            }
        }

        match (built.pop(), built.is_empty()) {
            (Some(root), true) => Ok(root),
            _ => Err(Error::MalformedTree("expected exactly one root".to_string())),
        }
    }

    fn placeholder() -> Self {
        TreeNode::Leaf {
            id: 0,
            sample_index: 0,
            text: String::new(),
            metadata: Value::Null,
            cluster_label: 0,
            distance: 0.0,
            count: 0,
        }
    }

    /// Move the children of an internal node onto `stack`.
    fn detach_children(&mut self, stack: &mut Vec<TreeNode>) {
        if let TreeNode::Internal { children, .. } = self {
            let [left, right] = std::mem::replace(
                &mut **children,
                [TreeNode::placeholder(), TreeNode::placeholder()],
            );
            stack.push(left);
            stack.push(right);
        }
    }
}

impl Drop for TreeNode {
    fn drop(&mut self) {
        if self.is_leaf() {
            return;
        }
        let mut stack = Vec::new();
        self.detach_children(&mut stack);
        while let Some(mut node) = stack.pop() {
            node.detach_children(&mut stack);
        }
    }
}

impl Serialize for TreeNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || match self {
            TreeNode::Leaf {
                id,
                sample_index,
                text,
                metadata,
                cluster_label,
                distance,
                count,
            } => {
                let mut s = serializer.serialize_struct("TreeNode", 8)?;
                s.serialize_field("type", "leaf")?;
                s.serialize_field("id", id)?;
                s.serialize_field("sample_index", sample_index)?;
                s.serialize_field("text", text)?;
                s.serialize_field("metadata", metadata)?;
                s.serialize_field("cluster_label", cluster_label)?;
                s.serialize_field("distance", distance)?;
                s.serialize_field("count", count)?;
                s.end()
            }
            TreeNode::Internal {
                id,
                distance,
                count,
                children,
            } => {
                let mut s = serializer.serialize_struct("TreeNode", 5)?;
                s.serialize_field("type", "internal")?;
                s.serialize_field("id", id)?;
                s.serialize_field("distance", distance)?;
                s.serialize_field("count", count)?;
                s.serialize_field("children", &**children)?;
                s.end()
            }
        })
    }
}

#[derive(Deserialize)]
struct LeafFields {
    id: usize,
    sample_index: usize,
    text: String,
    metadata: Value,
    cluster_label: usize,
    distance: f64,
    count: usize,
}

impl From<LeafFields> for TreeNode {
    fn from(f: LeafFields) -> Self {
        TreeNode::Leaf {
            id: f.id,
            sample_index: f.sample_index,
            text: f.text,
            metadata: f.metadata,
            cluster_label: f.cluster_label,
            distance: f.distance,
            count: f.count,
        }
    }
}

#[derive(Deserialize)]
struct InternalFields {
    id: usize,
    distance: f64,
    count: usize,
}

/// Header of the dendrogram document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DendrogramInfo {
    /// When the run started.
    pub timestamp: DateTime<Utc>,
    /// Embedding model identifier.
    pub model_id: String,
    /// Cut threshold.
    pub distance_threshold: f64,
    /// Linkage method.
    pub linkage_method: Linkage,
    /// Number of items.
    pub n_samples: usize,
    /// Number of flat clusters at the threshold.
    pub n_clusters: usize,
    /// Largest merge distance.
    pub max_distance: f64,
}

/// The dendrogram document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DendrogramExport {
    /// Run header.
    pub dendrogram_info: DendrogramInfo,
    /// Root of the tree.
    pub tree: TreeNode,
}

impl DendrogramExport {
    /// Read a dendrogram document back from JSON text.
    ///
    /// serde_json's nesting limit is lifted and the parser grows its stack
    /// through `serde_stacker`, so any tree this crate writes can be read.
    pub fn from_json(text: &str) -> Result<Self> {
        let mut de = serde_json::Deserializer::from_str(text);
        de.disable_recursion_limit();
        let value = Value::deserialize(serde_stacker::Deserializer::new(&mut de))?;
        de.end()?;
        Self::from_value(value)
    }

    /// Rebuild a document from a parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut doc) = value else {
            return Err(Error::MalformedTree(
                "dendrogram document must be an object".to_string(),
            ));
        };
        let info = doc
            .remove("dendrogram_info")
            .ok_or_else(|| Error::MalformedTree("missing dendrogram_info".to_string()))?;
        let tree = doc
            .remove("tree")
            .ok_or_else(|| Error::MalformedTree("missing tree".to_string()))?;
        Ok(Self {
            dendrogram_info: serde_json::from_value(info)?,
            tree: TreeNode::from_value(tree)?,
        })
    }
}

/// Build the nested tree for a complete dendrogram.
///
/// `items` and `labeling` must cover the same `n` items as the tree.
pub fn export_dendrogram(
    dendro: &Dendrogram,
    items: &[Item],
    labeling: &ClusterLabeling,
    snapshot: &RunSnapshot,
) -> Result<DendrogramExport> {
    let n = dendro.n_items();
    let root = dendro.root().ok_or_else(|| {
        Error::MalformedTree(format!(
            "{} merges cannot join {n} items into one tree",
            dendro.n_merges()
        ))
    })?;
    if items.len() != n || labeling.n_items() != n {
        return Err(Error::invalid_config(
            "items",
            format!(
                "tree has {n} leaves but got {} items and {} labels",
                items.len(),
                labeling.n_items()
            ),
        ));
    }

    let ids = preorder_ids(dendro, root);

    let mut built: Vec<Option<TreeNode>> = Vec::with_capacity(dendro.n_nodes());
    for (i, item) in items.iter().enumerate() {
        built.push(Some(TreeNode::Leaf {
            id: ids[i],
            sample_index: i,
            text: item.text.clone(),
            metadata: item.metadata.clone(),
            cluster_label: labeling.label(i),
            distance: 0.0,
            count: 1,
        }));
    }
    for (k, m) in dendro.merges().enumerate() {
        let mut take = |child: usize| {
            built
                .get_mut(child)
                .and_then(Option::take)
                .ok_or_else(|| Error::MalformedTree(format!("node {} reuses child {child}", n + k)))
        };
        let left = take(m.cluster_a)?;
        let right = take(m.cluster_b)?;
        built.push(Some(TreeNode::Internal {
            id: ids[n + k],
            distance: m.distance,
            count: m.size,
            children: Box::new([left, right]),
        }));
    }

    let tree = built[root]
        .take()
        .ok_or_else(|| Error::MalformedTree("root consumed by another merge".to_string()))?;

    Ok(DendrogramExport {
        dendrogram_info: DendrogramInfo {
            timestamp: snapshot.timestamp,
            model_id: snapshot.model_id.clone(),
            distance_threshold: snapshot.distance_threshold,
            linkage_method: snapshot.linkage_method,
            n_samples: n,
            n_clusters: labeling.n_clusters(),
            max_distance: dendro.max_distance(),
        },
        tree,
    })
}

/// Pre-order ids indexed by dendrogram node id.
fn preorder_ids(dendro: &Dendrogram, root: usize) -> Vec<usize> {
    let mut ids = vec![0usize; dendro.n_nodes()];
    let mut counter = 0;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        ids[node] = counter;
        counter += 1;
        if let Some(DendrogramNode::Internal(m)) = dendro.node(node) {
            stack.push(m.cluster_b);
            stack.push(m.cluster_a);
        }
    }
    ids
}
