//! In-memory CRUD and query engine over entries and groups.
//!
//! The repository owns its maps exclusively; every object is cloned
//! on the way in and out, so callers never hold live references to
//! internal state. Insertion order is preserved and is the result
//! order for listing and search.

use chrono::Utc;
use std::collections::HashMap;
use tracing::debug;

use genpwd_common::{Error, Result};

use crate::io::VaultPayload;
use crate::model::{Tag, VaultEntry, VaultGroup};
use crate::query::{filter_matches, SearchFilter, SearchQuery};

/// A node in the materialized group tree.
#[derive(Debug, Clone)]
pub struct GroupNode {
    pub group: VaultGroup,
    pub children: Vec<GroupNode>,
}

/// In-memory repository for one unlocked vault.
#[derive(Debug, Default)]
pub struct VaultRepository {
    entries: HashMap<String, VaultEntry>,
    entry_order: Vec<String>,
    groups: HashMap<String, VaultGroup>,
    group_order: Vec<String>,
    tags: Vec<Tag>,
}

impl VaultRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a repository from a decrypted payload, preserving the
    /// payload's entry and group order.
    ///
    /// Imported payloads are taken as-is: entries kept with a
    /// deserialize-error marker may carry dangling references, so no
    /// referential validation runs here.
    pub fn restore(payload: VaultPayload) -> Self {
        let mut repo = Self::new();
        for group in payload.groups {
            if !repo.groups.contains_key(&group.id) {
                repo.group_order.push(group.id.clone());
                repo.groups.insert(group.id.clone(), group);
            }
        }
        for entry in payload.entries {
            if !repo.entries.contains_key(&entry.id) {
                repo.entry_order.push(entry.id.clone());
                repo.entries.insert(entry.id.clone(), entry);
            }
        }
        repo.tags = payload.tags;
        repo
    }

    /// Snapshot the repository into a serializable payload.
    pub fn snapshot(&self, metadata: serde_json::Value) -> VaultPayload {
        VaultPayload {
            metadata,
            entries: self.list_entries(),
            groups: self.list_groups(),
            tags: self.tags.clone(),
        }
    }

    // ----- entries -----

    /// Insert a new entry.
    ///
    /// # Errors
    /// - `Validation` if the id is already taken
    /// - `NotFound` if the entry references a missing group
    pub fn create_entry(&mut self, entry: VaultEntry) -> Result<VaultEntry> {
        if self.entries.contains_key(&entry.id) {
            return Err(Error::Validation(format!(
                "Entry id already exists: {}",
                entry.id
            )));
        }
        self.check_group_ref(&entry)?;

        debug!(id = %entry.id, "Entry created");
        self.entry_order.push(entry.id.clone());
        self.entries.insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    /// Fetch an entry by id (cloned).
    pub fn get_entry(&self, id: &str) -> Result<VaultEntry> {
        self.entries
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Entry not found: {}", id)))
    }

    /// Replace an entry wholesale, bumping its modification time.
    ///
    /// # Errors
    /// - `NotFound` if the id does not exist; state is unchanged
    pub fn update_entry(&mut self, entry: VaultEntry) -> Result<VaultEntry> {
        if !self.entries.contains_key(&entry.id) {
            return Err(Error::NotFound(format!("Entry not found: {}", entry.id)));
        }
        self.check_group_ref(&entry)?;

        let mut entry = entry;
        entry.metadata.modified_at = Utc::now();

        debug!(id = %entry.id, "Entry updated");
        self.entries.insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    /// Remove an entry. Its secret buffers are wiped on drop.
    pub fn delete_entry(&mut self, id: &str) -> Result<()> {
        if self.entries.remove(id).is_none() {
            return Err(Error::NotFound(format!("Entry not found: {}", id)));
        }
        self.entry_order.retain(|e| e != id);
        debug!(id = %id, "Entry deleted");
        Ok(())
    }

    /// All entries in insertion order (cloned).
    pub fn list_entries(&self) -> Vec<VaultEntry> {
        self.entry_order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .cloned()
            .collect()
    }

    /// Number of entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn check_group_ref(&self, entry: &VaultEntry) -> Result<()> {
        if let Some(group_id) = &entry.group_id {
            if !self.groups.contains_key(group_id) {
                return Err(Error::NotFound(format!("Group not found: {}", group_id)));
            }
        }
        Ok(())
    }

    // ----- groups -----

    /// Insert a new group.
    ///
    /// # Errors
    /// - `Validation` if the id is already taken
    /// - `NotFound` if the parent does not exist
    pub fn create_group(&mut self, group: VaultGroup) -> Result<VaultGroup> {
        if self.groups.contains_key(&group.id) {
            return Err(Error::Validation(format!(
                "Group id already exists: {}",
                group.id
            )));
        }
        if let Some(parent) = &group.parent_id {
            if !self.groups.contains_key(parent) {
                return Err(Error::NotFound(format!("Group not found: {}", parent)));
            }
        }

        debug!(id = %group.id, "Group created");
        self.group_order.push(group.id.clone());
        self.groups.insert(group.id.clone(), group.clone());
        Ok(group)
    }

    /// Fetch a group by id (cloned).
    pub fn get_group(&self, id: &str) -> Result<VaultGroup> {
        self.groups
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Group not found: {}", id)))
    }

    /// Replace a group wholesale.
    ///
    /// Reparenting goes through the same cycle check as
    /// [`VaultRepository::move_group`]; on failure the tree is
    /// unchanged.
    pub fn update_group(&mut self, group: VaultGroup) -> Result<VaultGroup> {
        if !self.groups.contains_key(&group.id) {
            return Err(Error::NotFound(format!("Group not found: {}", group.id)));
        }
        self.check_move(&group.id, group.parent_id.as_deref())?;

        debug!(id = %group.id, "Group updated");
        self.groups.insert(group.id.clone(), group.clone());
        Ok(group)
    }

    /// Remove a group. Child groups and member entries reparent to
    /// the deleted group's parent.
    pub fn delete_group(&mut self, id: &str) -> Result<()> {
        let removed = self
            .groups
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("Group not found: {}", id)))?;
        self.group_order.retain(|g| g != id);

        for group in self.groups.values_mut() {
            if group.parent_id.as_deref() == Some(id) {
                group.parent_id = removed.parent_id.clone();
            }
        }
        for entry in self.entries.values_mut() {
            if entry.group_id.as_deref() == Some(id) {
                entry.group_id = removed.parent_id.clone();
            }
        }

        debug!(id = %id, "Group deleted");
        Ok(())
    }

    /// All groups in insertion order (cloned).
    pub fn list_groups(&self) -> Vec<VaultGroup> {
        self.group_order
            .iter()
            .filter_map(|id| self.groups.get(id))
            .cloned()
            .collect()
    }

    /// Reparent a group.
    ///
    /// # Errors
    /// - `NotFound` if the group or the new parent is missing
    /// - `Cycle` if the group would become its own ancestor; the
    ///   tree is left unchanged
    pub fn move_group(&mut self, group_id: &str, new_parent: Option<&str>) -> Result<()> {
        if !self.groups.contains_key(group_id) {
            return Err(Error::NotFound(format!("Group not found: {}", group_id)));
        }
        self.check_move(group_id, new_parent)?;

        if let Some(group) = self.groups.get_mut(group_id) {
            group.parent_id = new_parent.map(String::from);
        }
        debug!(id = %group_id, parent = ?new_parent, "Group moved");
        Ok(())
    }

    /// Validate a reparent against the no-cycle invariant by walking
    /// the ancestor chain of the prospective parent.
    fn check_move(&self, group_id: &str, new_parent: Option<&str>) -> Result<()> {
        let Some(parent) = new_parent else {
            return Ok(());
        };
        if !self.groups.contains_key(parent) {
            return Err(Error::NotFound(format!("Group not found: {}", parent)));
        }

        let mut current = Some(parent.to_string());
        while let Some(id) = current {
            if id == group_id {
                return Err(Error::Cycle(format!(
                    "Group {} would become its own ancestor",
                    group_id
                )));
            }
            current = self.groups.get(&id).and_then(|g| g.parent_id.clone());
        }
        Ok(())
    }

    /// Ids of all groups below the given group, breadth-first.
    pub fn descendant_group_ids(&self, id: &str) -> Result<Vec<String>> {
        if !self.groups.contains_key(id) {
            return Err(Error::NotFound(format!("Group not found: {}", id)));
        }

        let mut result = Vec::new();
        let mut frontier = vec![id.to_string()];
        while let Some(current) = frontier.pop() {
            for gid in &self.group_order {
                let group = &self.groups[gid];
                if group.parent_id.as_deref() == Some(current.as_str()) {
                    result.push(gid.clone());
                    frontier.push(gid.clone());
                }
            }
        }
        Ok(result)
    }

    /// The root-to-leaf path of group names, joined with "/".
    pub fn group_path(&self, id: &str) -> Result<String> {
        let mut names = Vec::new();
        let mut current = Some(id.to_string());
        while let Some(gid) = current {
            let group = self
                .groups
                .get(&gid)
                .ok_or_else(|| Error::NotFound(format!("Group not found: {}", gid)))?;
            names.push(group.name.clone());
            current = group.parent_id.clone();
        }
        names.reverse();
        Ok(names.join("/"))
    }

    /// Materialize the group adjacency data as a forest, roots in
    /// insertion order.
    pub fn group_tree(&self) -> Vec<GroupNode> {
        self.group_order
            .iter()
            .filter(|id| self.groups[*id].parent_id.is_none())
            .map(|id| self.build_node(id))
            .collect()
    }

    fn build_node(&self, id: &str) -> GroupNode {
        let children = self
            .group_order
            .iter()
            .filter(|gid| self.groups[*gid].parent_id.as_deref() == Some(id))
            .map(|gid| self.build_node(gid))
            .collect();
        GroupNode {
            group: self.groups[id].clone(),
            children,
        }
    }

    // ----- tags -----

    /// Replace the tag definitions.
    pub fn set_tags(&mut self, tags: Vec<Tag>) {
        self.tags = tags;
    }

    /// The tag definitions (cloned).
    pub fn tags(&self) -> Vec<Tag> {
        self.tags.clone()
    }

    // ----- search -----

    /// Run the query language plus structured filters over the
    /// entries. Results keep backing-store insertion order and are
    /// never re-sorted by relevance.
    pub fn search_entries(&self, query: &str, filter: &SearchFilter) -> Vec<VaultEntry> {
        let parsed = SearchQuery::parse(query);
        let now = Utc::now();

        self.entry_order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .filter(|entry| {
                let group_name = entry
                    .group_id
                    .as_deref()
                    .and_then(|gid| self.groups.get(gid))
                    .map(|g| g.name.as_str());
                filter_matches(entry, filter) && parsed.matches(entry, group_name, now)
            })
            .cloned()
            .collect()
    }
}
