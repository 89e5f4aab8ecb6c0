use std::collections::BTreeMap;
use std::fmt;

use tracing::trace;
use trellis_types::{ArrayValue, BuilderId, DType, ScalarValue};

use crate::chunks::DataChunkIterator;
use crate::error::{BuilderError, BuilderResult};

/// Kind tag for the one-name-one-kind index of a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildKind {
    Group,
    Dataset,
    Link,
    Attribute,
}

impl ChildKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Dataset => "dataset",
            Self::Link => "link",
            Self::Attribute => "attribute",
        }
    }
}

impl fmt::Display for ChildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Attribute value on a group or dataset builder. Object references are
/// builder handles; the backend turns them into storage references.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Scalar(ScalarValue),
    Array(ArrayValue),
    Ref(BuilderId),
    RefList(Vec<BuilderId>),
}

impl AttrValue {
    /// Text convenience constructor.
    pub fn text(v: impl Into<String>) -> Self {
        Self::Scalar(ScalarValue::Text(v.into()))
    }

    /// The scalar text payload, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Scalar(ScalarValue::Text(t)) => Some(t),
            _ => None,
        }
    }
}

impl From<ScalarValue> for AttrValue {
    fn from(v: ScalarValue) -> Self {
        Self::Scalar(v)
    }
}

impl From<ArrayValue> for AttrValue {
    fn from(v: ArrayValue) -> Self {
        Self::Array(v)
    }
}

/// Data carried by a dataset builder.
///
/// `Chunked` holds a live chunk producer and is drained (not cloned) by
/// the backend; everything else is plain materialized data.
pub enum DatasetValue {
    Empty,
    Scalar(ScalarValue),
    Array(ArrayValue),
    Ref(BuilderId),
    RefList(Vec<BuilderId>),
    Chunked(Box<dyn DataChunkIterator + Send>),
}

impl fmt::Debug for DatasetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Scalar(v) => f.debug_tuple("Scalar").field(v).finish(),
            Self::Array(v) => f.debug_tuple("Array").field(v).finish(),
            Self::Ref(id) => f.debug_tuple("Ref").field(id).finish(),
            Self::RefList(ids) => f.debug_tuple("RefList").field(ids).finish(),
            Self::Chunked(_) => write!(f, "Chunked(..)"),
        }
    }
}

/// Group node payload: named children plus attributes, with a shared
/// name-to-kind index so one name never spans two kinds.
#[derive(Debug, Default)]
pub struct GroupData {
    pub children: BTreeMap<String, BuilderId>,
    pub attributes: BTreeMap<String, AttrValue>,
    pub kinds: BTreeMap<String, ChildKind>,
}

impl GroupData {
    fn claim_name(&mut self, name: &str, kind: ChildKind) -> BuilderResult<()> {
        match self.kinds.get(name) {
            Some(existing) if *existing != kind => Err(BuilderError::NameConflict {
                name: name.to_string(),
                existing: existing.name(),
                offered: kind.name(),
            }),
            _ => {
                self.kinds.insert(name.to_string(), kind);
                Ok(())
            }
        }
    }
}

/// Dataset node payload.
#[derive(Debug)]
pub struct DatasetData {
    pub data: DatasetValue,
    pub dtype: Option<DType>,
    pub maxshape: Option<Vec<Option<u64>>>,
    pub chunked: bool,
    pub attributes: BTreeMap<String, AttrValue>,
}

impl DatasetData {
    pub fn new(data: DatasetValue) -> Self {
        let chunked = matches!(data, DatasetValue::Chunked(_));
        Self {
            data,
            dtype: None,
            maxshape: None,
            chunked,
            attributes: BTreeMap::new(),
        }
    }
}

/// Link node payload: a name pointing at another builder, used for both
/// same-file and cross-file links. The distinction is made at write time
/// by comparing the recorded sources of the link's parent and target.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkData {
    pub target: BuilderId,
}

/// Payload variants of a builder node.
#[derive(Debug)]
pub enum BuilderKind {
    Group(GroupData),
    Dataset(DatasetData),
    Link(LinkData),
}

impl BuilderKind {
    fn name(&self) -> &'static str {
        match self {
            Self::Group(_) => "group",
            Self::Dataset(_) => "dataset",
            Self::Link(_) => "link",
        }
    }

    fn child_kind(&self) -> ChildKind {
        match self {
            Self::Group(_) => ChildKind::Group,
            Self::Dataset(_) => ChildKind::Dataset,
            Self::Link(_) => ChildKind::Link,
        }
    }
}

/// One node of the builder tree.
#[derive(Debug)]
pub struct BuilderNode {
    pub name: String,
    /// Weak back-reference for path reconstruction only; children are
    /// exclusively owned through their parent's child map.
    pub parent: Option<BuilderId>,
    /// Path of the file this node was read from or will be written to.
    pub source: Option<String>,
    pub kind: BuilderKind,
}

/// Arena of builder nodes forming one or more rooted trees.
///
/// Handles index into the arena. A node's place in a tree is defined by
/// its parent group's child map; unattached nodes (built ahead of their
/// owner, e.g. link targets) simply have no parent yet.
#[derive(Debug, Default)]
pub struct BuilderTree {
    nodes: Vec<BuilderNode>,
}

impl BuilderTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// The node behind a handle, if it belongs to this tree.
    pub fn node(&self, id: BuilderId) -> Option<&BuilderNode> {
        self.nodes.get(id.index())
    }

    /// Like [`node`](Self::node) but failing on a foreign handle.
    pub fn require(&self, id: BuilderId) -> BuilderResult<&BuilderNode> {
        self.node(id).ok_or(BuilderError::DanglingHandle(id))
    }

    fn require_mut(&mut self, id: BuilderId) -> BuilderResult<&mut BuilderNode> {
        self.nodes
            .get_mut(id.index())
            .ok_or(BuilderError::DanglingHandle(id))
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, node: BuilderNode) -> BuilderId {
        let id = BuilderId::from_index(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn insert_child(
        &mut self,
        parent: Option<BuilderId>,
        name: &str,
        mut node: BuilderNode,
    ) -> BuilderResult<BuilderId> {
        if let Some(parent_id) = parent {
            let parent_source = self.require(parent_id)?.source.clone();
            let kind = node.kind.child_kind();
            self.group_mut(parent_id)?.claim_name(name, kind)?;
            // children inherit the owning file at creation time
            if node.source.is_none() {
                node.source = parent_source;
            }
            node.parent = Some(parent_id);
            let id = self.push(node);
            self.group_mut(parent_id)?
                .children
                .insert(name.to_string(), id);
            trace!(builder = %id, name = %name, kind = %kind, parent = %parent_id, "added builder");
            Ok(id)
        } else {
            let id = self.push(node);
            trace!(builder = %id, name = %name, "added root builder");
            Ok(id)
        }
    }

    /// Create a group node, attached under `parent` when given.
    pub fn add_group(
        &mut self,
        parent: Option<BuilderId>,
        name: impl Into<String>,
    ) -> BuilderResult<BuilderId> {
        let name = name.into();
        self.insert_child(
            parent,
            &name.clone(),
            BuilderNode {
                name,
                parent: None,
                source: None,
                kind: BuilderKind::Group(GroupData::default()),
            },
        )
    }

    /// Create a dataset node, attached under `parent` when given.
    pub fn add_dataset(
        &mut self,
        parent: Option<BuilderId>,
        name: impl Into<String>,
        data: DatasetValue,
    ) -> BuilderResult<BuilderId> {
        let name = name.into();
        self.insert_child(
            parent,
            &name.clone(),
            BuilderNode {
                name,
                parent: None,
                source: None,
                kind: BuilderKind::Dataset(DatasetData::new(data)),
            },
        )
    }

    /// Create a link node under `parent` pointing at `target`.
    pub fn add_link(
        &mut self,
        parent: BuilderId,
        name: impl Into<String>,
        target: BuilderId,
    ) -> BuilderResult<BuilderId> {
        self.require(target)?;
        let name = name.into();
        self.insert_child(
            Some(parent),
            &name.clone(),
            BuilderNode {
                name,
                parent: None,
                source: None,
                kind: BuilderKind::Link(LinkData { target }),
            },
        )
    }

    /// Attach an existing unattached node under a group.
    pub fn attach(&mut self, parent: BuilderId, child: BuilderId) -> BuilderResult<()> {
        let child_node = self.require(child)?;
        if child_node.parent.is_some() {
            return Err(BuilderError::AlreadyAttached { child });
        }
        let name = child_node.name.clone();
        let kind = child_node.kind.child_kind();
        let parent_source = self.require(parent)?.source.clone();
        {
            let group = self.group_mut(parent)?;
            group.claim_name(&name, kind)?;
            group.children.insert(name, child);
        }
        let child_node = self.require_mut(child)?;
        child_node.parent = Some(parent);
        if child_node.source.is_none() {
            child_node.source = parent_source;
        }
        Ok(())
    }

    /// Set or replace an attribute on a group or dataset node.
    pub fn set_attribute(
        &mut self,
        id: BuilderId,
        name: impl Into<String>,
        value: AttrValue,
    ) -> BuilderResult<()> {
        let name = name.into();
        match &mut self.require_mut(id)?.kind {
            BuilderKind::Group(group) => {
                group.claim_name(&name, ChildKind::Attribute)?;
                group.attributes.insert(name, value);
                Ok(())
            }
            BuilderKind::Dataset(dataset) => {
                dataset.attributes.insert(name, value);
                Ok(())
            }
            BuilderKind::Link(_) => Err(BuilderError::KindMismatch {
                id,
                expected: "group or dataset",
                actual: "link",
            }),
        }
    }

    /// The group payload of a node.
    pub fn group(&self, id: BuilderId) -> BuilderResult<&GroupData> {
        match &self.require(id)?.kind {
            BuilderKind::Group(g) => Ok(g),
            other => Err(BuilderError::KindMismatch {
                id,
                expected: "group",
                actual: other.name(),
            }),
        }
    }

    /// Mutable group payload of a node.
    pub fn group_mut(&mut self, id: BuilderId) -> BuilderResult<&mut GroupData> {
        match &mut self.require_mut(id)?.kind {
            BuilderKind::Group(g) => Ok(g),
            other => Err(BuilderError::KindMismatch {
                id,
                expected: "group",
                actual: other.name(),
            }),
        }
    }

    /// The dataset payload of a node.
    pub fn dataset(&self, id: BuilderId) -> BuilderResult<&DatasetData> {
        match &self.require(id)?.kind {
            BuilderKind::Dataset(d) => Ok(d),
            other => Err(BuilderError::KindMismatch {
                id,
                expected: "dataset",
                actual: other.name(),
            }),
        }
    }

    /// Mutable dataset payload of a node.
    pub fn dataset_mut(&mut self, id: BuilderId) -> BuilderResult<&mut DatasetData> {
        match &mut self.require_mut(id)?.kind {
            BuilderKind::Dataset(d) => Ok(d),
            other => Err(BuilderError::KindMismatch {
                id,
                expected: "dataset",
                actual: other.name(),
            }),
        }
    }

    /// The link payload of a node.
    pub fn link(&self, id: BuilderId) -> BuilderResult<&LinkData> {
        match &self.require(id)?.kind {
            BuilderKind::Link(l) => Ok(l),
            other => Err(BuilderError::KindMismatch {
                id,
                expected: "link",
                actual: other.name(),
            }),
        }
    }

    /// The attribute value on a group or dataset node, if set.
    pub fn attribute(&self, id: BuilderId, name: &str) -> Option<&AttrValue> {
        match &self.node(id)?.kind {
            BuilderKind::Group(g) => g.attributes.get(name),
            BuilderKind::Dataset(d) => d.attributes.get(name),
            BuilderKind::Link(_) => None,
        }
    }

    /// The child of a group with the given name, if any.
    pub fn child(&self, parent: BuilderId, name: &str) -> Option<BuilderId> {
        match &self.node(parent)?.kind {
            BuilderKind::Group(g) => g.children.get(name).copied(),
            _ => None,
        }
    }

    /// `/`-joined path from the tree root down to this node.
    pub fn path(&self, id: BuilderId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.node(node_id) else { break };
            parts.push(node.name.clone());
            current = node.parent;
        }
        parts.reverse();
        parts.join("/")
    }

    /// Walk a `/`-separated path of child names downward from `root`.
    pub fn resolve_path(&self, root: BuilderId, path: &str) -> Option<BuilderId> {
        let mut current = root;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current = self.child(current, part)?;
        }
        Some(current)
    }

    /// Record the owning file for a node and every descendant that has
    /// none yet.
    pub fn set_source(&mut self, id: BuilderId, source: &str) -> BuilderResult<()> {
        let mut stack = vec![id];
        self.require(id)?;
        while let Some(current) = stack.pop() {
            let node = self.require_mut(current)?;
            if node.source.is_none() || current == id {
                node.source = Some(source.to_string());
            }
            if let BuilderKind::Group(group) = &node.kind {
                stack.extend(group.children.values().copied());
            }
        }
        Ok(())
    }

    /// The recorded owning file of a node.
    pub fn source(&self, id: BuilderId) -> Option<&str> {
        self.node(id)?.source.as_deref()
    }
}
