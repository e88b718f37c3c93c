//! Orgflow Tree - the organization hierarchy
//!
//! Owns [`OrgNode`] entities and their materialized path/depth, enforces the
//! single-root and parent-liveness invariants, and guards move/soft-delete
//! against dependent entities. Ancestry reads parse the materialized path and
//! batch-fetch, so no recursive queries are ever needed.

#![deny(unsafe_code)]

mod node;

pub use node::{CoverageReport, Membership, NewNode, NodeUpdate, OrgNode, TreeView, ROOT_PATH};

use chrono::{DateTime, Utc};
use orgflow_policy::PolicyStore;
use orgflow_types::{
    CoreError, CoreResult, MembershipId, NodeId, NodeType, PersonDirectory, PersonId,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

#[derive(Default)]
struct TreeState {
    nodes: HashMap<NodeId, OrgNode>,
    memberships: HashMap<MembershipId, Membership>,
}

/// Service owning the organization tree and its membership records.
///
/// Every mutating operation runs under a single write guard; the multi-step
/// path rewrite of a move and the dependent-count checks of a delete are
/// never interleaved with a concurrent write to the same subtree.
pub struct OrgTree {
    state: RwLock<TreeState>,
    directory: Arc<dyn PersonDirectory>,
}

impl OrgTree {
    pub fn new(directory: Arc<dyn PersonDirectory>) -> Self {
        Self {
            state: RwLock::new(TreeState::default()),
            directory,
        }
    }

    /// Create a node. ROOT forbids a parent and may exist only once among
    /// active nodes; every other type requires an active parent.
    pub fn create_node(&self, input: NewNode, now: DateTime<Utc>) -> CoreResult<OrgNode> {
        if input.name.trim().is_empty() {
            return Err(CoreError::validation("node name must not be empty"));
        }
        if input.code.trim().is_empty() {
            return Err(CoreError::validation("node code must not be empty"));
        }
        if let Some(manager_id) = &input.manager_id {
            self.directory
                .get(manager_id)
                .ok_or_else(|| CoreError::not_found("person", manager_id))?;
        }

        let mut state = self.write_guard()?;
        if state
            .nodes
            .values()
            .any(|node| node.is_active && node.code == input.code)
        {
            return Err(CoreError::validation(format!(
                "node code '{}' is already in use",
                input.code
            )));
        }

        let (parent_id, path, depth) = match (input.node_type, &input.parent_id) {
            (NodeType::Root, Some(_)) => {
                return Err(CoreError::validation("a ROOT node cannot have a parent"));
            }
            (NodeType::Root, None) => {
                if state
                    .nodes
                    .values()
                    .any(|node| node.is_active && node.node_type == NodeType::Root)
                {
                    return Err(CoreError::validation("an active ROOT node already exists"));
                }
                (None, ROOT_PATH.to_string(), 0)
            }
            (_, None) => {
                return Err(CoreError::validation(format!(
                    "a {:?} node requires a parent",
                    input.node_type
                )));
            }
            (_, Some(parent_id)) => {
                let parent = state
                    .nodes
                    .get(parent_id)
                    .filter(|parent| parent.is_active)
                    .ok_or_else(|| CoreError::not_found("org node", parent_id))?;
                (
                    Some(parent.id.clone()),
                    parent.child_path(),
                    parent.depth + 1,
                )
            }
        };

        let node = OrgNode {
            id: NodeId::generate(),
            name: input.name,
            code: input.code,
            node_type: input.node_type,
            parent_id,
            path,
            depth,
            manager_id: input.manager_id,
            sort_order: input.sort_order,
            is_active: true,
            metadata: input.metadata,
            is_portfolio_area: input.is_portfolio_area,
            created_at: now,
            updated_at: now,
        };
        info!(node_id = %node.id, code = %node.code, depth = node.depth, "org node created");
        state.nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    /// Update the mutable fields of an active node. Type, parent, and path
    /// are structural and only change through [`OrgTree::move_node`].
    pub fn update_node(
        &self,
        id: &NodeId,
        patch: NodeUpdate,
        now: DateTime<Utc>,
    ) -> CoreResult<OrgNode> {
        if let Some(Some(manager_id)) = &patch.manager_id {
            self.directory
                .get(manager_id)
                .ok_or_else(|| CoreError::not_found("person", manager_id))?;
        }

        let mut state = self.write_guard()?;
        if let Some(code) = &patch.code {
            if state
                .nodes
                .values()
                .any(|other| other.is_active && &other.id != id && &other.code == code)
            {
                return Err(CoreError::validation(format!(
                    "node code '{code}' is already in use"
                )));
            }
        }

        let node = state
            .nodes
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("org node", id))?;
        if !node.is_active {
            return Err(CoreError::validation(format!(
                "node {id} is inactive and cannot be updated"
            )));
        }

        if let Some(name) = patch.name {
            node.name = name;
        }
        if let Some(code) = patch.code {
            node.code = code;
        }
        if let Some(manager_id) = patch.manager_id {
            node.manager_id = manager_id;
        }
        if let Some(sort_order) = patch.sort_order {
            node.sort_order = sort_order;
        }
        if let Some(metadata) = patch.metadata {
            node.metadata = metadata;
        }
        node.updated_at = now;
        Ok(node.clone())
    }

    /// Re-parent a node, recomputing path and depth for it and every active
    /// descendant breadth-first. Policies attached to the moved subtree are
    /// deactivated: the approval context they were written for no longer
    /// exists.
    ///
    /// Returns the number of rewritten node records.
    pub fn move_node(
        &self,
        id: &NodeId,
        new_parent_id: &NodeId,
        policies: &PolicyStore,
        now: DateTime<Utc>,
    ) -> CoreResult<usize> {
        let moved: Vec<NodeId> = {
            let mut state = self.write_guard()?;

            let (subtree_prefix, node_type, node_active) = {
                let node = state
                    .nodes
                    .get(id)
                    .ok_or_else(|| CoreError::not_found("org node", id))?;
                (node.child_path(), node.node_type, node.is_active)
            };
            if !node_active {
                return Err(CoreError::not_found("org node", id));
            }
            if node_type == NodeType::Root {
                return Err(CoreError::validation("the ROOT node cannot be moved"));
            }

            let (parent_id, parent_child_path, parent_depth) = {
                let parent = state
                    .nodes
                    .get(new_parent_id)
                    .filter(|parent| parent.is_active)
                    .ok_or_else(|| CoreError::not_found("org node", new_parent_id))?;
                if &parent.id == id || parent.path.starts_with(&subtree_prefix) {
                    return Err(CoreError::validation(format!(
                        "moving {id} under {new_parent_id} would create a cycle"
                    )));
                }
                (parent.id.clone(), parent.child_path(), parent.depth)
            };

            {
                let node = state
                    .nodes
                    .get_mut(id)
                    .ok_or_else(|| CoreError::not_found("org node", id))?;
                node.parent_id = Some(parent_id);
                node.path = parent_child_path;
                node.depth = parent_depth + 1;
                node.updated_at = now;
            }

            // Breadth-first path rewrite; each child reads its parent's
            // freshly rewritten path.
            let mut moved = vec![id.clone()];
            let mut queue = VecDeque::from([id.clone()]);
            while let Some(current) = queue.pop_front() {
                let (current_child_path, current_depth) = {
                    let current_node = state
                        .nodes
                        .get(&current)
                        .ok_or_else(|| CoreError::not_found("org node", &current))?;
                    (current_node.child_path(), current_node.depth)
                };
                let child_ids: Vec<NodeId> = state
                    .nodes
                    .values()
                    .filter(|child| child.is_active && child.parent_id.as_ref() == Some(&current))
                    .map(|child| child.id.clone())
                    .collect();
                for child_id in child_ids {
                    if let Some(child) = state.nodes.get_mut(&child_id) {
                        child.path = current_child_path.clone();
                        child.depth = current_depth + 1;
                        child.updated_at = now;
                    }
                    moved.push(child_id.clone());
                    queue.push_back(child_id);
                }
            }
            moved
        };

        let deactivated = policies.deactivate_for_nodes(&moved, now)?;
        info!(
            node_id = %id,
            new_parent = %new_parent_id,
            rewritten = moved.len(),
            policies_deactivated = deactivated,
            "org node moved"
        );
        Ok(moved.len())
    }

    /// Soft-delete a node with zero active children and zero active
    /// memberships, deactivating its policies. Deleting an already-inactive
    /// node is a no-op. Data is retained for audit and history.
    pub fn delete_node(
        &self,
        id: &NodeId,
        policies: &PolicyStore,
        now: DateTime<Utc>,
    ) -> CoreResult<OrgNode> {
        let deleted = {
            let mut state = self.write_guard()?;
            let node = state
                .nodes
                .get(id)
                .ok_or_else(|| CoreError::not_found("org node", id))?;
            if !node.is_active {
                return Ok(node.clone());
            }
            if node.node_type == NodeType::Root {
                return Err(CoreError::validation("the ROOT node cannot be deleted"));
            }

            let active_children = state
                .nodes
                .values()
                .filter(|child| child.is_active && child.parent_id.as_ref() == Some(id))
                .count();
            if active_children > 0 {
                return Err(CoreError::validation(format!(
                    "node {id} has {active_children} active child(ren)"
                )));
            }
            let active_memberships = state
                .memberships
                .values()
                .filter(|membership| membership.is_active && &membership.node_id == id)
                .count();
            if active_memberships > 0 {
                return Err(CoreError::validation(format!(
                    "node {id} has {active_memberships} active membership(s)"
                )));
            }

            let node = state
                .nodes
                .get_mut(id)
                .ok_or_else(|| CoreError::not_found("org node", id))?;
            node.is_active = false;
            node.updated_at = now;
            node.clone()
        };

        policies.deactivate_for_nodes(std::slice::from_ref(id), now)?;
        info!(node_id = %id, "org node soft-deleted");
        Ok(deleted)
    }

    /// Fetch one node, active or not.
    pub fn get_node(&self, id: &NodeId) -> CoreResult<OrgNode> {
        let state = self.read_guard()?;
        state
            .nodes
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("org node", id))
    }

    /// Ancestors of a node in root-to-leaf order, excluding the node itself.
    ///
    /// Parses the materialized path into an ordered id list and batch-fetches
    /// those nodes; this is why the path is maintained eagerly on every write
    /// instead of being derived at read time.
    pub fn get_ancestors(&self, id: &NodeId) -> CoreResult<Vec<OrgNode>> {
        let state = self.read_guard()?;
        let node = state
            .nodes
            .get(id)
            .ok_or_else(|| CoreError::not_found("org node", id))?;

        node.ancestor_ids()
            .iter()
            .map(|ancestor_id| {
                state
                    .nodes
                    .get(ancestor_id)
                    .cloned()
                    .ok_or_else(|| CoreError::not_found("org node", ancestor_id))
            })
            .collect()
    }

    /// Assemble the forest of active nodes in a single pass over the node
    /// set. Children are ordered by sort order, then code.
    pub fn get_full_tree(&self) -> CoreResult<Vec<TreeView>> {
        let state = self.read_guard()?;

        let mut children_of: HashMap<NodeId, Vec<OrgNode>> = HashMap::new();
        let mut roots: Vec<OrgNode> = Vec::new();
        for node in state.nodes.values().filter(|node| node.is_active) {
            match &node.parent_id {
                Some(parent_id) => children_of
                    .entry(parent_id.clone())
                    .or_default()
                    .push(node.clone()),
                None => roots.push(node.clone()),
            }
        }
        for siblings in children_of.values_mut() {
            siblings.sort_by(|a, b| (a.sort_order, &a.code).cmp(&(b.sort_order, &b.code)));
        }
        roots.sort_by(|a, b| (a.sort_order, &a.code).cmp(&(b.sort_order, &b.code)));

        fn build(node: OrgNode, children_of: &mut HashMap<NodeId, Vec<OrgNode>>) -> TreeView {
            let children = children_of
                .remove(&node.id)
                .unwrap_or_default()
                .into_iter()
                .map(|child| build(child, children_of))
                .collect();
            TreeView { node, children }
        }

        Ok(roots
            .into_iter()
            .map(|root| build(root, &mut children_of))
            .collect())
    }

    /// Assign a person to a node.
    pub fn add_membership(
        &self,
        person_id: &PersonId,
        node_id: &NodeId,
        now: DateTime<Utc>,
    ) -> CoreResult<Membership> {
        self.directory
            .get(person_id)
            .ok_or_else(|| CoreError::not_found("person", person_id))?;

        let mut state = self.write_guard()?;
        state
            .nodes
            .get(node_id)
            .filter(|node| node.is_active)
            .ok_or_else(|| CoreError::not_found("org node", node_id))?;
        if state.memberships.values().any(|membership| {
            membership.is_active
                && &membership.person_id == person_id
                && &membership.node_id == node_id
        }) {
            return Err(CoreError::validation(format!(
                "person {person_id} already has an active membership in node {node_id}"
            )));
        }

        let membership = Membership {
            id: MembershipId::generate(),
            person_id: person_id.clone(),
            node_id: node_id.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        debug!(person = %person_id, node = %node_id, "membership added");
        state
            .memberships
            .insert(membership.id.clone(), membership.clone());
        Ok(membership)
    }

    /// End a membership; ending an already-ended membership is a no-op.
    pub fn end_membership(&self, id: &MembershipId, now: DateTime<Utc>) -> CoreResult<Membership> {
        let mut state = self.write_guard()?;
        let membership = state
            .memberships
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("membership", id))?;
        if membership.is_active {
            membership.is_active = false;
            membership.updated_at = now;
        }
        Ok(membership.clone())
    }

    pub fn active_membership_count(&self, node_id: &NodeId) -> CoreResult<usize> {
        let state = self.read_guard()?;
        Ok(state
            .memberships
            .values()
            .filter(|membership| membership.is_active && &membership.node_id == node_id)
            .count())
    }

    /// Staffing and policy coverage counters across the directory and tree.
    pub fn coverage_report(&self, policies: &PolicyStore) -> CoreResult<CoverageReport> {
        let employees = self.directory.list_active();
        let state = self.read_guard()?;

        let covered: std::collections::HashSet<&PersonId> = state
            .memberships
            .values()
            .filter(|membership| membership.is_active)
            .map(|membership| &membership.person_id)
            .collect();
        let employees_without_membership = employees
            .iter()
            .filter(|person| !covered.contains(&person.id))
            .count();

        let mut nodes_without_policy = 0;
        for node in state.nodes.values().filter(|node| node.is_active) {
            if !policies.has_active_for_node(&node.id)? {
                nodes_without_policy += 1;
            }
        }

        Ok(CoverageReport {
            employee_count: employees.len(),
            employees_without_membership,
            nodes_without_policy,
        })
    }

    fn read_guard(&self) -> CoreResult<RwLockReadGuard<'_, TreeState>> {
        self.state
            .read()
            .map_err(|_| CoreError::conflict("tree lock poisoned"))
    }

    fn write_guard(&self) -> CoreResult<RwLockWriteGuard<'_, TreeState>> {
        self.state
            .write()
            .map_err(|_| CoreError::conflict("tree lock poisoned"))
    }
}
