use std::collections::BTreeMap;

use tracing::{debug, trace};
use trellis_build::{AttrValue, BuilderKind, BuilderTree, DatasetValue};
use trellis_types::{ArrayValue, BuilderId, DType, ScalarValue};

use crate::backend::StorageBackend;
use crate::error::{IoError, IoResult};

/// How a stored link reaches its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LinkKind {
    /// Target lives in the same storage; stored by path and re-bound on
    /// read.
    Soft,
    /// Target lives in another file. The memory backend cannot open
    /// other files, so these fail to resolve on read.
    External,
}

#[derive(Clone, Debug)]
enum StoredAttr {
    Scalar(ScalarValue),
    Array(ArrayValue),
    Ref(String),
    RefList(Vec<String>),
}

#[derive(Clone, Debug)]
enum StoredData {
    Empty,
    Scalar(ScalarValue),
    Array(ArrayValue),
    Ref(String),
    RefList(Vec<String>),
}

/// Deep-copied builder node, with every builder handle replaced by a
/// root-relative path.
#[derive(Clone, Debug)]
enum StoredNode {
    Group {
        name: String,
        attributes: BTreeMap<String, StoredAttr>,
        children: Vec<StoredNode>,
    },
    Dataset {
        name: String,
        data: StoredData,
        dtype: Option<DType>,
        maxshape: Option<Vec<Option<u64>>>,
        attributes: BTreeMap<String, StoredAttr>,
    },
    Link {
        name: String,
        kind: LinkKind,
        target_source: String,
        target_path: String,
    },
}

/// Reference backend holding one written tree in memory.
///
/// Writing deep-copies the tree into a stored form: chunked datasets are
/// materialized by assembling their chunks, and links and object
/// references are classified and stored as paths. Reading materializes a
/// fresh tree with fresh handles, re-binding soft links by path.
pub struct MemoryBackend {
    source: String,
    stored: Option<StoredNode>,
}

impl MemoryBackend {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            stored: None,
        }
    }

    /// Whether anything has been written.
    pub fn is_written(&self) -> bool {
        self.stored.is_some()
    }

    fn unresolved(&self, path: impl Into<String>) -> IoError {
        IoError::UnresolvedLink {
            path: path.into(),
            source_name: self.source.clone(),
        }
    }

    /// Root-relative path of a node, failing for nodes outside the
    /// written subtree.
    fn relative_path(&self, tree: &BuilderTree, root: BuilderId, id: BuilderId) -> IoResult<String> {
        if id == root {
            return Ok(String::new());
        }
        let full = tree.path(id);
        let root_name = &tree.require(root)?.name;
        match full.strip_prefix(&format!("{root_name}/")) {
            Some(relative) => Ok(relative.to_string()),
            None => Err(self.unresolved(full)),
        }
    }

    fn freeze_attrs(
        &self,
        tree: &BuilderTree,
        root: BuilderId,
        attributes: &BTreeMap<String, AttrValue>,
    ) -> IoResult<BTreeMap<String, StoredAttr>> {
        let mut out = BTreeMap::new();
        for (name, value) in attributes {
            let stored = match value {
                AttrValue::Scalar(s) => StoredAttr::Scalar(s.clone()),
                AttrValue::Array(a) => StoredAttr::Array(a.clone()),
                AttrValue::Ref(target) => {
                    StoredAttr::Ref(self.relative_path(tree, root, *target)?)
                }
                AttrValue::RefList(targets) => StoredAttr::RefList(
                    targets
                        .iter()
                        .map(|t| self.relative_path(tree, root, *t))
                        .collect::<IoResult<Vec<_>>>()?,
                ),
            };
            out.insert(name.clone(), stored);
        }
        Ok(out)
    }

    fn freeze(&self, tree: &BuilderTree, root: BuilderId, id: BuilderId) -> IoResult<StoredNode> {
        let node = tree.require(id)?;
        match &node.kind {
            BuilderKind::Group(group) => {
                let children = group
                    .children
                    .values()
                    .map(|&child| self.freeze(tree, root, child))
                    .collect::<IoResult<Vec<_>>>()?;
                Ok(StoredNode::Group {
                    name: node.name.clone(),
                    attributes: self.freeze_attrs(tree, root, &group.attributes)?,
                    children,
                })
            }
            BuilderKind::Dataset(dataset) => {
                let data = match &dataset.data {
                    DatasetValue::Empty => StoredData::Empty,
                    DatasetValue::Scalar(s) => StoredData::Scalar(s.clone()),
                    DatasetValue::Array(a) => StoredData::Array(a.clone()),
                    DatasetValue::Ref(target) => {
                        StoredData::Ref(self.relative_path(tree, root, *target)?)
                    }
                    DatasetValue::RefList(targets) => StoredData::RefList(
                        targets
                            .iter()
                            .map(|t| self.relative_path(tree, root, *t))
                            .collect::<IoResult<Vec<_>>>()?,
                    ),
                    // materialized before freezing
                    DatasetValue::Chunked(_) => StoredData::Empty,
                };
                Ok(StoredNode::Dataset {
                    name: node.name.clone(),
                    data,
                    dtype: dataset.dtype.clone(),
                    maxshape: dataset.maxshape.clone(),
                    attributes: self.freeze_attrs(tree, root, &dataset.attributes)?,
                })
            }
            BuilderKind::Link(link) => {
                let target = link.target;
                let target_source = tree
                    .source(target)
                    .unwrap_or(self.source.as_str())
                    .to_string();
                let kind = if target_source == self.source {
                    LinkKind::Soft
                } else {
                    LinkKind::External
                };
                // external targets keep their full foreign path; soft
                // targets are stored root-relative for rebinding
                let target_path = match kind {
                    LinkKind::Soft => self.relative_path(tree, root, target)?,
                    LinkKind::External => tree.path(target),
                };
                trace!(name = %node.name, kind = ?kind, "storing link");
                Ok(StoredNode::Link {
                    name: node.name.clone(),
                    kind,
                    target_source,
                    target_path,
                })
            }
        }
    }

    /// Replace every chunked dataset under `id` with its assembled
    /// array.
    fn materialize_chunks(&self, tree: &mut BuilderTree, id: BuilderId) -> IoResult<()> {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let needs_assembly = match &tree.require(current)?.kind {
                BuilderKind::Group(group) => {
                    stack.extend(group.children.values().copied());
                    false
                }
                BuilderKind::Dataset(dataset) => dataset.chunked,
                BuilderKind::Link(_) => false,
            };
            if needs_assembly {
                let payload = tree.dataset_mut(current)?;
                let taken = std::mem::replace(&mut payload.data, DatasetValue::Empty);
                if let DatasetValue::Chunked(iter) = taken {
                    let assembled = assemble_chunks(iter)?;
                    let payload = tree.dataset_mut(current)?;
                    payload.data = DatasetValue::Array(assembled);
                    payload.chunked = false;
                }
            }
        }
        Ok(())
    }

    fn thaw(
        &self,
        tree: &mut BuilderTree,
        parent: Option<BuilderId>,
        stored: &StoredNode,
        links: &mut Vec<PendingLink>,
        refs: &mut Vec<PendingRef>,
    ) -> IoResult<BuilderId> {
        match stored {
            StoredNode::Group {
                name,
                attributes,
                children,
            } => {
                let id = tree.add_group(parent, name.clone())?;
                self.thaw_attrs(tree, id, attributes, refs)?;
                for child in children {
                    self.thaw(tree, Some(id), child, links, refs)?;
                }
                Ok(id)
            }
            StoredNode::Dataset {
                name,
                data,
                dtype,
                maxshape,
                attributes,
            } => {
                let (value, pending) = match data {
                    StoredData::Empty => (DatasetValue::Empty, None),
                    StoredData::Scalar(s) => (DatasetValue::Scalar(s.clone()), None),
                    StoredData::Array(a) => (DatasetValue::Array(a.clone()), None),
                    StoredData::Ref(path) => {
                        (DatasetValue::Empty, Some(PendingRefTarget::One(path.clone())))
                    }
                    StoredData::RefList(paths) => {
                        (DatasetValue::Empty, Some(PendingRefTarget::Many(paths.clone())))
                    }
                };
                let id = tree.add_dataset(parent, name.clone(), value)?;
                let payload = tree.dataset_mut(id)?;
                payload.dtype = dtype.clone();
                payload.maxshape = maxshape.clone();
                if let Some(target) = pending {
                    refs.push(PendingRef {
                        node: id,
                        attr: None,
                        target,
                    });
                }
                self.thaw_attrs(tree, id, attributes, refs)?;
                Ok(id)
            }
            StoredNode::Link {
                name,
                kind,
                target_source,
                target_path,
            } => {
                let owner = parent.ok_or_else(|| self.unresolved(target_path.clone()))?;
                // link nodes are created in the second pass, once their
                // targets exist
                links.push(PendingLink {
                    parent: owner,
                    name: name.clone(),
                    kind: *kind,
                    target_source: target_source.clone(),
                    target_path: target_path.clone(),
                });
                Ok(owner)
            }
        }
    }

    fn thaw_attrs(
        &self,
        tree: &mut BuilderTree,
        node: BuilderId,
        attributes: &BTreeMap<String, StoredAttr>,
        refs: &mut Vec<PendingRef>,
    ) -> IoResult<()> {
        for (name, stored) in attributes {
            match stored {
                StoredAttr::Scalar(s) => {
                    tree.set_attribute(node, name.clone(), AttrValue::Scalar(s.clone()))?
                }
                StoredAttr::Array(a) => {
                    tree.set_attribute(node, name.clone(), AttrValue::Array(a.clone()))?
                }
                StoredAttr::Ref(path) => refs.push(PendingRef {
                    node,
                    attr: Some(name.clone()),
                    target: PendingRefTarget::One(path.clone()),
                }),
                StoredAttr::RefList(paths) => refs.push(PendingRef {
                    node,
                    attr: Some(name.clone()),
                    target: PendingRefTarget::Many(paths.clone()),
                }),
            }
        }
        Ok(())
    }

    fn resolve(&self, tree: &BuilderTree, root: BuilderId, path: &str) -> IoResult<BuilderId> {
        if path.is_empty() {
            return Ok(root);
        }
        tree.resolve_path(root, path)
            .ok_or_else(|| self.unresolved(path))
    }
}

struct PendingLink {
    parent: BuilderId,
    name: String,
    kind: LinkKind,
    target_source: String,
    target_path: String,
}

enum PendingRefTarget {
    One(String),
    Many(Vec<String>),
}

struct PendingRef {
    node: BuilderId,
    /// `None` re-binds the node's dataset data rather than an attribute.
    attr: Option<String>,
    target: PendingRefTarget,
}

fn assemble_chunks(
    iter: Box<dyn trellis_build::DataChunkIterator + Send>,
) -> IoResult<ArrayValue> {
    let mut parts: Vec<(u64, ArrayValue)> = iter
        .map(|chunk| {
            let start = chunk.selection.first().map_or(0, |range| range.start);
            (start, chunk.data)
        })
        .collect();
    parts.sort_by_key(|(start, _)| *start);
    Ok(ArrayValue::concat_rows(
        parts.into_iter().map(|(_, data)| data).collect(),
    )?)
}

impl StorageBackend for MemoryBackend {
    fn source(&self) -> &str {
        &self.source
    }

    fn write_builder(&mut self, tree: &mut BuilderTree, root: BuilderId) -> IoResult<()> {
        self.materialize_chunks(tree, root)?;
        let snapshot = self.freeze(tree, root, root)?;
        debug!(source = %self.source, "stored builder tree");
        self.stored = Some(snapshot);
        Ok(())
    }

    fn read_builder(&self) -> IoResult<(BuilderTree, BuilderId)> {
        let stored = self.stored.as_ref().ok_or_else(|| IoError::Empty {
            source_name: self.source.clone(),
        })?;
        let mut tree = BuilderTree::new();
        let mut links = Vec::new();
        let mut refs = Vec::new();
        let root = self.thaw(&mut tree, None, stored, &mut links, &mut refs)?;
        tree.set_source(root, &self.source)?;

        for pending in links {
            if pending.kind == LinkKind::External {
                return Err(IoError::UnresolvedLink {
                    path: pending.target_path,
                    source_name: pending.target_source,
                });
            }
            let target = self.resolve(&tree, root, &pending.target_path)?;
            tree.add_link(pending.parent, pending.name, target)?;
        }
        for pending in refs {
            match (&pending.attr, pending.target) {
                (Some(attr), PendingRefTarget::One(path)) => {
                    let target = self.resolve(&tree, root, &path)?;
                    tree.set_attribute(pending.node, attr.clone(), AttrValue::Ref(target))?;
                }
                (Some(attr), PendingRefTarget::Many(paths)) => {
                    let targets = paths
                        .iter()
                        .map(|p| self.resolve(&tree, root, p))
                        .collect::<IoResult<Vec<_>>>()?;
                    tree.set_attribute(pending.node, attr.clone(), AttrValue::RefList(targets))?;
                }
                (None, PendingRefTarget::One(path)) => {
                    let target = self.resolve(&tree, root, &path)?;
                    tree.dataset_mut(pending.node)?.data = DatasetValue::Ref(target);
                }
                (None, PendingRefTarget::Many(paths)) => {
                    let targets = paths
                        .iter()
                        .map(|p| self.resolve(&tree, root, p))
                        .collect::<IoResult<Vec<_>>>()?;
                    tree.dataset_mut(pending.node)?.data = DatasetValue::RefList(targets);
                }
            }
        }
        debug!(source = %self.source, nodes = tree.len(), "materialized stored tree");
        Ok((tree, root))
    }
}
