//! Knowledge-graph records and their node-link serialization.
//!
//! The on-disk shape is the generic node-link form:
//!
//! ```text
//! { "directed": true, "multigraph": false, "graph": {},
//!   "nodes": [ { "id": "...", "name": "...", ... } ],
//!   "links": [ { "source": "...", "target": "...", "relation": "...", ... } ] }
//! ```
//!
//! Attributes this crate does not know about are kept in `extra` so a
//! load/save cycle is lossless.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use graphrag_core::types::ChunkId;

/// Normalized node key: trimmed, whitespace-collapsed, lowercased.
pub fn node_key(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Entity {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_chunks: Vec<ChunkId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Relation {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub relation: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Absent in foreign files; read through [`Relation::weight`].
    #[serde(rename = "weight", default, skip_serializing_if = "Option::is_none")]
    pub stored_weight: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_chunks: Vec<ChunkId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Relation {
    pub fn weight(&self) -> f32 {
        self.stored_weight.unwrap_or(1.0)
    }
}

/// A graph node. Ids are compared as text; integer ids are written back as
/// integers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub struct NodeRecord {
    pub id: String,
    pub entity: Entity,
    numeric_id: bool,
}

impl NodeRecord {
    pub fn new(id: impl Into<String>, entity: Entity) -> Self {
        Self { id: id.into(), entity, numeric_id: false }
    }

    /// The entity name, or the id for nodes that carry no name.
    pub fn display_name(&self) -> &str {
        if self.entity.name.is_empty() { &self.id } else { &self.entity.name }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLink", into = "RawLink")]
pub struct LinkRecord {
    pub source: String,
    pub target: String,
    pub relation: Relation,
    numeric_ends: (bool, bool),
}

impl LinkRecord {
    pub fn new(source: impl Into<String>, target: impl Into<String>, relation: Relation) -> Self {
        Self { source: source.into(), target: target.into(), relation, numeric_ends: (false, false) }
    }
}

#[derive(Serialize, Deserialize)]
struct RawNode {
    id: Value,
    #[serde(flatten)]
    entity: Entity,
}

#[derive(Serialize, Deserialize)]
struct RawLink {
    source: Value,
    target: Value,
    #[serde(flatten)]
    relation: Relation,
}

impl TryFrom<RawNode> for NodeRecord {
    type Error = String;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let (id, numeric_id) = id_text(raw.id)?;
        Ok(Self { id, entity: raw.entity, numeric_id })
    }
}

impl From<NodeRecord> for RawNode {
    fn from(node: NodeRecord) -> Self {
        Self { id: id_value(node.id, node.numeric_id), entity: node.entity }
    }
}

impl TryFrom<RawLink> for LinkRecord {
    type Error = String;

    fn try_from(raw: RawLink) -> Result<Self, Self::Error> {
        let (source, source_numeric) = id_text(raw.source)?;
        let (target, target_numeric) = id_text(raw.target)?;
        Ok(Self { source, target, relation: raw.relation, numeric_ends: (source_numeric, target_numeric) })
    }
}

impl From<LinkRecord> for RawLink {
    fn from(link: LinkRecord) -> Self {
        let (source_numeric, target_numeric) = link.numeric_ends;
        Self {
            source: id_value(link.source, source_numeric),
            target: id_value(link.target, target_numeric),
            relation: link.relation,
        }
    }
}

fn id_text(value: Value) -> Result<(String, bool), String> {
    match value {
        Value::String(s) => Ok((s, false)),
        Value::Number(n) => Ok((n.to_string(), true)),
        other => Err(format!("node id must be a string or a number, got {other}")),
    }
}

fn id_value(id: String, numeric: bool) -> Value {
    if numeric {
        if let Ok(n) = id.parse::<serde_json::Number>() {
            return Value::Number(n);
        }
    }
    Value::String(id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLinkGraph {
    #[serde(default = "default_directed")]
    pub directed: bool,
    #[serde(default)]
    pub multigraph: bool,
    #[serde(default)]
    pub graph: Map<String, Value>,
    pub nodes: Vec<NodeRecord>,
    #[serde(alias = "edges")]
    pub links: Vec<LinkRecord>,
}

fn default_directed() -> bool {
    true
}

impl Default for NodeLinkGraph {
    fn default() -> Self {
        Self { directed: true, multigraph: false, graph: Map::new(), nodes: Vec::new(), links: Vec::new() }
    }
}
