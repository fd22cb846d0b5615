//! Ontology sources: a JSON class list and OWL in RDF/XML.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Deserialize;
use tracing::{debug, info};

use super::graph::{ClassId, OWL_THING, OntologyError, OntologyGraph, OntologyGraphBuilder, OntologyNode};

#[derive(Debug, Deserialize)]
struct JsonOntology {
    #[serde(default)]
    root: Option<JsonClass>,
    classes: Vec<JsonClass>,
}

#[derive(Debug, Deserialize)]
struct JsonClass {
    id: String,
    name: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    parents: Vec<String>,
}

impl JsonClass {
    fn into_node(self) -> (OntologyNode, Vec<String>) {
        let node = OntologyNode {
            id: ClassId::new(self.id),
            name: self.name,
            label: self.label,
            comment: self.comment,
        };
        (node, self.parents)
    }
}

/// Loads an ontology file, choosing the parser from the file extension.
///
/// `.json` files use the class-list format; `.rdf`, `.owl` and `.xml` files
/// are read as OWL in RDF/XML.
///
/// # Errors
///
/// Any read, parse or validation failure is returned; callers treat it as fatal.
pub fn load(path: &Path) -> Result<OntologyGraph, OntologyError> {
    let content = fs::read_to_string(path).map_err(|source| OntologyError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let graph = match extension.as_str() {
        "json" => from_json_str(&content)?,
        "rdf" | "owl" | "xml" => from_rdf_xml_str(&content)?,
        other => return Err(OntologyError::UnsupportedFormat(other.to_string())),
    };

    info!(
        path = %path.display(),
        classes = graph.len(),
        edges = graph.edge_count(),
        "Loaded ontology"
    );
    Ok(graph)
}

/// Parses the JSON class-list format.
///
/// ```
/// let graph = ontopath::ontology::from_json_str(r#"{
///     "classes": [
///         {"id": "ex:Agent", "name": "Agent"},
///         {"id": "ex:Person", "name": "Person", "parents": ["ex:Agent"]}
///     ]
/// }"#).unwrap();
/// assert_eq!(graph.children_of(graph.root_id()).len(), 1);
/// ```
///
/// Classes without parents hang off the root. When no root is given,
/// `owl:Thing` is used.
pub fn from_json_str(content: &str) -> Result<OntologyGraph, OntologyError> {
    let doc: JsonOntology = serde_json::from_str(content).map_err(OntologyError::Json)?;

    let root = doc
        .root
        .map(|r| r.into_node().0)
        .unwrap_or_else(|| OntologyNode::new(OWL_THING, "Thing"));
    let root_id = root.id.clone();

    let mut builder = OntologyGraphBuilder::new().root(root);
    for class in doc.classes {
        let (node, parents) = class.into_node();
        let id = node.id.clone();
        builder.add_class(node);
        if parents.is_empty() {
            builder.add_edge(root_id.clone(), id);
        } else {
            for parent in parents {
                builder.add_edge(ClassId::new(parent), id.clone());
            }
        }
    }
    builder.build()
}

#[derive(Debug, Default)]
struct PendingClass {
    id: String,
    label: Option<String>,
    comment: Option<String>,
    parents: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Capture {
    Label,
    Comment,
}

/// Parses `owl:Class` declarations from an RDF/XML document.
///
/// Recognised inside a class: `rdfs:subClassOf` (via `rdf:resource` or a
/// nested named class), `rdfs:label`, `rdfs:comment`. Anonymous classes and
/// restrictions are skipped. Named parents that are never declared as classes
/// are treated as dangling references; `owl:Thing` as a parent means "top level".
pub fn from_rdf_xml_str(content: &str) -> Result<OntologyGraph, OntologyError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut base: Option<String> = None;
    let mut classes: Vec<PendingClass> = Vec::new();
    let mut current: Option<PendingClass> = None;
    // depth of the currently open owl:Class, and of an open rdfs:subClassOf
    let mut depth = 0usize;
    let mut class_depth = 0usize;
    let mut subclass_depth: Option<usize> = None;
    let mut capture: Option<(Capture, usize)> = None;

    loop {
        let event = reader.read_event().map_err(OntologyError::Xml)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                depth += 1;
                let local = local_name(e);

                match local.as_str() {
                    "RDF" if base.is_none() => base = attribute(e, "base")?,
                    "Class" => {
                        if let Some(class) = current.as_mut() {
                            // nested named class inside rdfs:subClassOf is a parent reference
                            if subclass_depth.is_some()
                                && let Some(parent) = class_iri(e, base.as_deref())?
                            {
                                class.parents.push(parent);
                            }
                        } else if let Some(id) = class_iri(e, base.as_deref())? {
                            current = Some(PendingClass {
                                id,
                                ..PendingClass::default()
                            });
                            class_depth = depth;
                        }
                    }
                    "subClassOf" if current.is_some() && depth == class_depth + 1 => {
                        if let Some(parent) = attribute(e, "resource")? {
                            if let Some(class) = current.as_mut() {
                                class.parents.push(parent);
                            }
                        } else if !is_empty {
                            subclass_depth = Some(depth);
                        }
                    }
                    "label" if current.is_some() && depth == class_depth + 1 => {
                        capture = Some((Capture::Label, depth));
                    }
                    "comment" if current.is_some() && depth == class_depth + 1 => {
                        capture = Some((Capture::Comment, depth));
                    }
                    _ => {}
                }

                if is_empty {
                    close_element(
                        &mut depth,
                        &mut current,
                        &mut classes,
                        class_depth,
                        &mut subclass_depth,
                        &mut capture,
                    );
                }
            }
            Event::Text(ref t) => {
                if let (Some((kind, at)), Some(class)) = (capture, current.as_mut())
                    && at == depth
                {
                    let text = t.unescape().map_err(OntologyError::Xml)?;
                    append_text(class, kind, &text);
                }
            }
            Event::CData(ref c) => {
                if let (Some((kind, at)), Some(class)) = (capture, current.as_mut())
                    && at == depth
                {
                    append_text(class, kind, &String::from_utf8_lossy(c));
                }
            }
            Event::End(_) => close_element(
                &mut depth,
                &mut current,
                &mut classes,
                class_depth,
                &mut subclass_depth,
                &mut capture,
            ),
            Event::Eof => break,
            _ => {}
        }
    }

    debug!(classes = classes.len(), "Parsed RDF/XML class declarations");
    build_from_pending(classes)
}

fn close_element(
    depth: &mut usize,
    current: &mut Option<PendingClass>,
    classes: &mut Vec<PendingClass>,
    class_depth: usize,
    subclass_depth: &mut Option<usize>,
    capture: &mut Option<(Capture, usize)>,
) {
    if capture.is_some_and(|(_, at)| at == *depth) {
        *capture = None;
    }
    if *subclass_depth == Some(*depth) {
        *subclass_depth = None;
    }
    if current.is_some() && *depth == class_depth {
        if let Some(class) = current.take() {
            classes.push(class);
        }
    }
    *depth = depth.saturating_sub(1);
}

fn append_text(class: &mut PendingClass, kind: Capture, text: &str) {
    let slot = match kind {
        Capture::Label => &mut class.label,
        Capture::Comment => &mut class.comment,
    };
    slot.get_or_insert_with(String::new).push_str(text);
}

fn build_from_pending(classes: Vec<PendingClass>) -> Result<OntologyGraph, OntologyError> {
    let root_id = ClassId::new(OWL_THING);
    let mut builder = OntologyGraphBuilder::new().root(OntologyNode::new(OWL_THING, "Thing"));

    // A class may be declared in several places; merge by IRI.
    let mut merged: Vec<PendingClass> = Vec::new();
    for class in classes {
        if class.id == OWL_THING {
            continue;
        }
        match merged.iter_mut().find(|c| c.id == class.id) {
            Some(existing) => {
                existing.parents.extend(class.parents);
                if existing.label.is_none() {
                    existing.label = class.label;
                }
                if existing.comment.is_none() {
                    existing.comment = class.comment;
                }
            }
            None => merged.push(class),
        }
    }

    for class in merged {
        let id = ClassId::new(class.id.as_str());
        let parents: Vec<&String> = class
            .parents
            .iter()
            .filter(|p| p.as_str() != OWL_THING && **p != class.id)
            .collect();
        if parents.is_empty() {
            builder.add_edge(root_id.clone(), id.clone());
        } else {
            for parent in parents {
                builder.add_edge(ClassId::new(parent.as_str()), id.clone());
            }
        }
        builder.add_class(OntologyNode {
            name: fragment(&class.id).to_string(),
            id,
            label: class.label,
            comment: class.comment,
        });
    }
    builder.build()
}

/// The last segment of an IRI, after `#` or `/`.
pub fn fragment(iri: &str) -> &str {
    iri.rsplit(['#', '/']).next().filter(|s| !s.is_empty()).unwrap_or(iri)
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, wanted: &str) -> Result<Option<String>, OntologyError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| OntologyError::Xml(err.into()))?;
        if attr.key.local_name().as_ref() == wanted.as_bytes() {
            let value: Cow<'_, str> = attr.unescape_value().map_err(OntologyError::Xml)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// IRI of a class element from `rdf:about`, or `rdf:ID` resolved against `xml:base`.
fn class_iri(e: &BytesStart<'_>, base: Option<&str>) -> Result<Option<String>, OntologyError> {
    if let Some(about) = attribute(e, "about")? {
        return Ok(Some(about));
    }
    Ok(attribute(e, "ID")?.map(|id| format!("{}#{}", base.unwrap_or(""), id)))
}
