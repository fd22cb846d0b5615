//! In-memory ontology DAG.
//!
//! `OntologyGraph` is assembled once through `OntologyGraphBuilder`, which
//! rejects dangling references, cycles and ambiguous sibling names. After
//! `build()` the graph is read-only and can be shared by any number of
//! concurrent searches.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Well-known IRI of the implicit top class.
pub const OWL_THING: &str = "http://www.w3.org/2002/07/owl#Thing";

/// Errors raised while assembling an ontology graph.
#[derive(Debug, Error)]
pub enum OntologyError {
    /// No root class was supplied to the builder
    #[error("ontology has no root class")]
    MissingRoot,

    /// The same class id was declared twice
    #[error("duplicate class id: {0}")]
    DuplicateClass(ClassId),

    /// An edge references a class that was never declared
    #[error("edge {parent} -> {child} references an unknown class")]
    DanglingReference { parent: ClassId, child: ClassId },

    /// The root appears as a child of another class
    #[error("root class {0} must not have a parent")]
    RootHasParent(ClassId),

    /// Two children of the same parent share a display name
    #[error("children of {parent} share the name '{name}'")]
    DuplicateSiblingName { parent: ClassId, name: String },

    /// Subclass edges form a cycle through the named class
    #[error("subclass cycle detected at {0}")]
    Cycle(ClassId),

    /// Reading the ontology source failed
    #[error("failed to read ontology source {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON ontology document could not be decoded
    #[error("invalid JSON ontology: {0}")]
    Json(#[source] serde_json::Error),

    /// RDF/XML ontology document could not be decoded
    #[error("invalid RDF/XML ontology: {0}")]
    Xml(#[source] quick_xml::Error),

    /// The source format could not be determined
    #[error("unsupported ontology format: {0}")]
    UnsupportedFormat(String),
}

/// Stable identifier of an ontology class (usually an IRI).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(String);

impl ClassId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A single ontology class.
///
/// `name` is what the oracle sees and answers with, so it must be unique
/// among siblings. `label` and `comment` are informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntologyNode {
    pub id: ClassId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl OntologyNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ClassId::new(id),
            name: name.into(),
            label: None,
            comment: None,
        }
    }
}

/// Summary numbers used by the `inspect` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OntologyStats {
    pub classes: usize,
    pub edges: usize,
    pub max_depth: usize,
    pub unreachable: usize,
    /// Number of classes at each shortest-path depth from the root.
    pub depth_counts: BTreeMap<usize, usize>,
}

/// Immutable class hierarchy with parent -> children edges.
#[derive(Debug, Clone)]
pub struct OntologyGraph {
    nodes: HashMap<ClassId, OntologyNode>,
    children: HashMap<ClassId, Vec<ClassId>>,
    root: ClassId,
}

impl OntologyGraph {
    pub fn root_id(&self) -> &ClassId {
        &self.root
    }

    /// Children of `id` in declaration order; empty for leaves and unknown ids.
    pub fn children_of(&self, id: &ClassId) -> &[ClassId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn node(&self, id: &ClassId) -> Option<&OntologyNode> {
        self.nodes.get(id)
    }

    pub fn name_of(&self, id: &ClassId) -> Option<&str> {
        self.nodes.get(id).map(|n| n.name.as_str())
    }

    /// Looks up the child of `parent` whose display name is exactly `name`.
    pub fn child_by_name(&self, parent: &ClassId, name: &str) -> Option<&ClassId> {
        self.children_of(parent)
            .iter()
            .find(|child| self.name_of(child) == Some(name))
    }

    /// Number of classes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.children.values().map(Vec::len).sum()
    }

    /// Shortest distances from the root for every reachable class.
    pub fn depths(&self) -> HashMap<&ClassId, usize> {
        let mut depths = HashMap::new();
        let mut queue = VecDeque::new();
        depths.insert(&self.root, 0);
        queue.push_back(&self.root);

        while let Some(id) = queue.pop_front() {
            let depth = depths[id];
            for child in self.children_of(id) {
                if !depths.contains_key(child) {
                    depths.insert(child, depth + 1);
                    queue.push_back(child);
                }
            }
        }
        depths
    }

    pub fn depth_of(&self, id: &ClassId) -> Option<usize> {
        self.depths().get(id).copied()
    }

    /// Classes that cannot be reached from the root, sorted by id.
    pub fn unreachable(&self) -> Vec<&ClassId> {
        let depths = self.depths();
        let mut orphans: Vec<&ClassId> = self
            .nodes
            .keys()
            .filter(|id| !depths.contains_key(id))
            .collect();
        orphans.sort();
        orphans
    }

    pub fn stats(&self) -> OntologyStats {
        let depths = self.depths();
        let mut depth_counts = BTreeMap::new();
        for depth in depths.values() {
            *depth_counts.entry(*depth).or_insert(0) += 1;
        }
        OntologyStats {
            classes: self.nodes.len(),
            edges: self.edge_count(),
            max_depth: depths.values().copied().max().unwrap_or(0),
            unreachable: self.nodes.len() - depths.len(),
            depth_counts,
        }
    }
}

/// Collects classes and subclass edges, then validates them into a graph.
#[derive(Debug, Default)]
pub struct OntologyGraphBuilder {
    root: Option<OntologyNode>,
    nodes: Vec<OntologyNode>,
    edges: Vec<(ClassId, ClassId)>,
}

impl OntologyGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the root class, which stands for "no class chosen yet".
    pub fn root(mut self, node: OntologyNode) -> Self {
        self.root = Some(node);
        self
    }

    pub fn class(mut self, node: OntologyNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn edge(mut self, parent: impl Into<ClassId>, child: impl Into<ClassId>) -> Self {
        self.edges.push((parent.into(), child.into()));
        self
    }

    pub fn add_class(&mut self, node: OntologyNode) {
        self.nodes.push(node);
    }

    pub fn add_edge(&mut self, parent: ClassId, child: ClassId) {
        self.edges.push((parent, child));
    }

    /// Validates the collected classes and edges.
    ///
    /// # Errors
    ///
    /// Fails on a missing root, duplicate ids, dangling edge endpoints, edges
    /// into the root, duplicate sibling names, or cycles.
    pub fn build(self) -> Result<OntologyGraph, OntologyError> {
        let root = self.root.ok_or(OntologyError::MissingRoot)?;
        let root_id = root.id.clone();

        let mut nodes = HashMap::with_capacity(self.nodes.len() + 1);
        nodes.insert(root_id.clone(), root);
        for node in self.nodes {
            if nodes.contains_key(&node.id) {
                return Err(OntologyError::DuplicateClass(node.id));
            }
            nodes.insert(node.id.clone(), node);
        }

        let mut children: HashMap<ClassId, Vec<ClassId>> = HashMap::new();
        for (parent, child) in self.edges {
            if !nodes.contains_key(&parent) || !nodes.contains_key(&child) {
                return Err(OntologyError::DanglingReference { parent, child });
            }
            if child == root_id {
                return Err(OntologyError::RootHasParent(root_id));
            }
            let siblings = children.entry(parent).or_default();
            if !siblings.contains(&child) {
                siblings.push(child);
            }
        }

        for (parent, siblings) in &children {
            let mut seen = HashSet::new();
            for child in siblings {
                let name = &nodes[child].name;
                if !seen.insert(name.as_str()) {
                    return Err(OntologyError::DuplicateSiblingName {
                        parent: parent.clone(),
                        name: name.clone(),
                    });
                }
            }
        }

        detect_cycle(&nodes, &children)?;

        Ok(OntologyGraph {
            nodes,
            children,
            root: root_id,
        })
    }
}

/// Iterative three-colour DFS over every class.
fn detect_cycle(
    nodes: &HashMap<ClassId, OntologyNode>,
    children: &HashMap<ClassId, Vec<ClassId>>,
) -> Result<(), OntologyError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        InProgress,
        Done,
    }

    let mut marks: HashMap<&ClassId, Mark> = HashMap::with_capacity(nodes.len());
    let mut starts: Vec<&ClassId> = nodes.keys().collect();
    starts.sort();

    for start in starts {
        if marks.contains_key(start) {
            continue;
        }
        // (node, index of the next child to visit)
        let mut stack: Vec<(&ClassId, usize)> = vec![(start, 0)];
        marks.insert(start, Mark::InProgress);

        while let Some((id, next)) = stack.pop() {
            let kids = children.get(id).map(Vec::as_slice).unwrap_or(&[]);
            if let Some(child) = kids.get(next) {
                stack.push((id, next + 1));
                match marks.get(child) {
                    Some(Mark::InProgress) => return Err(OntologyError::Cycle(child.clone())),
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(child, Mark::InProgress);
                        stack.push((child, 0));
                    }
                }
            } else {
                marks.insert(id, Mark::Done);
            }
        }
    }
    Ok(())
}
