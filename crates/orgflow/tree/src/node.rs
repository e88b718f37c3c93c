use chrono::{DateTime, Utc};
use orgflow_types::{MembershipId, NodeId, NodeType, PersonId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Path of a root node. Every other path is `parent.path + parent.id + "/"`.
pub const ROOT_PATH: &str = "/";

/// A node of the organization tree.
///
/// `path` and `depth` are cached derived values with a strict write-time
/// maintenance contract: every create and move recomputes them for the
/// affected node and all of its active descendants inside the same guarded
/// mutation. They are never derived lazily at read time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrgNode {
    pub id: NodeId,
    pub name: String,
    /// Unique per tree among active nodes.
    pub code: String,
    pub node_type: NodeType,
    pub parent_id: Option<NodeId>,
    /// Slash-delimited ancestor id list, `"/"` for the root.
    pub path: String,
    pub depth: u32,
    pub manager_id: Option<PersonId>,
    pub sort_order: i32,
    pub is_active: bool,
    pub metadata: HashMap<String, serde_json::Value>,
    pub is_portfolio_area: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrgNode {
    /// The path a direct child of this node carries.
    pub fn child_path(&self) -> String {
        format!("{}{}/", self.path, self.id)
    }

    /// Ancestor ids encoded in `path`, root first, immediate parent last.
    pub fn ancestor_ids(&self) -> Vec<NodeId> {
        self.path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(NodeId::new)
            .collect()
    }
}

/// Input for creating a node.
#[derive(Clone, Debug)]
pub struct NewNode {
    pub name: String,
    pub code: String,
    pub node_type: NodeType,
    pub parent_id: Option<NodeId>,
    pub manager_id: Option<PersonId>,
    pub sort_order: i32,
    pub metadata: HashMap<String, serde_json::Value>,
    pub is_portfolio_area: bool,
}

impl NewNode {
    /// Minimal input with defaults for the optional fields.
    pub fn new(name: &str, code: &str, node_type: NodeType, parent_id: Option<NodeId>) -> Self {
        Self {
            name: name.to_string(),
            code: code.to_string(),
            node_type,
            parent_id,
            manager_id: None,
            sort_order: 0,
            metadata: HashMap::new(),
            is_portfolio_area: false,
        }
    }

    pub fn with_manager(mut self, manager_id: PersonId) -> Self {
        self.manager_id = Some(manager_id);
        self
    }
}

/// Patch for the mutable fields of a node. Type, parent, and path are never
/// mutated directly; structure changes go through `move_node`.
#[derive(Clone, Debug, Default)]
pub struct NodeUpdate {
    pub name: Option<String>,
    pub code: Option<String>,
    /// `Some(None)` clears the manager.
    pub manager_id: Option<Option<PersonId>>,
    pub sort_order: Option<i32>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// A subtree of the assembled forest view.
#[derive(Clone, Debug, Serialize)]
pub struct TreeView {
    pub node: OrgNode,
    pub children: Vec<TreeView>,
}

/// An active person-to-node assignment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub person_id: PersonId,
    pub node_id: NodeId,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Staffing and policy coverage counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    pub employee_count: usize,
    pub employees_without_membership: usize,
    pub nodes_without_policy: usize,
}
