//! Ontology hierarchy used as the search space.
//!
//! The hierarchy is a DAG of classes with parent -> children edges and a
//! designated root meaning "no class chosen yet". It is loaded once, validated,
//! and never mutated afterwards.
//!
//! # Examples
//!
//! ```
//! use ontopath::ontology::{OntologyGraphBuilder, OntologyNode, OWL_THING};
//!
//! let graph = OntologyGraphBuilder::new()
//!     .root(OntologyNode::new(OWL_THING, "Thing"))
//!     .class(OntologyNode::new("ex:Agent", "Agent"))
//!     .class(OntologyNode::new("ex:Person", "Person"))
//!     .edge(OWL_THING, "ex:Agent")
//!     .edge("ex:Agent", "ex:Person")
//!     .build()
//!     .unwrap();
//!
//! let top = graph.children_of(graph.root_id());
//! assert_eq!(graph.name_of(&top[0]), Some("Agent"));
//! ```

mod graph;
mod loader;

pub use graph::{
    ClassId, OWL_THING, OntologyError, OntologyGraph, OntologyGraphBuilder, OntologyNode,
    OntologyStats,
};
pub use loader::{fragment, from_json_str, from_rdf_xml_str, load};
