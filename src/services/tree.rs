//! Hostgroup tree store
//!
//! Parent-pointer hierarchy indexed by id, with a parent -> children adjacency
//! index and materialized titles. Titles are recomputed explicitly when a
//! hostgroup is renamed or moved; deletion never relabels anything because a
//! hostgroup with children cannot be removed.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use uuid::Uuid;

use crate::models::{Hostgroup, TreeIntegrity, TITLE_SEPARATOR};
use crate::utils::HostgroupError;

/// In-memory index of persisted hostgroups
#[derive(Debug, Clone, Default)]
pub struct HostgroupTree {
    nodes: HashMap<Uuid, Hostgroup>,
    children: HashMap<Uuid, BTreeSet<Uuid>>,
    roots: BTreeSet<Uuid>,
    /// Rows whose stored parent was missing at load
    reattached: BTreeSet<Uuid>,
}

impl HostgroupTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from stored rows, recomputing every title from the names.
    ///
    /// Rows whose parent is missing are attached as roots.
    pub fn from_hostgroups(hostgroups: impl IntoIterator<Item = Hostgroup>) -> Self {
        let mut tree = Self::new();
        for hostgroup in hostgroups {
            tree.nodes.insert(hostgroup.id, hostgroup);
        }
        let ids: Vec<Uuid> = tree.nodes.keys().copied().collect();
        for id in ids {
            let parent_id = tree.nodes[&id].parent_id;
            match parent_id {
                Some(parent_id) if tree.nodes.contains_key(&parent_id) && parent_id != id => {
                    tree.children.entry(parent_id).or_default().insert(id);
                }
                Some(_) => {
                    tracing::warn!(hostgroup = %id, "Parent not found, attaching hostgroup as root");
                    if let Some(node) = tree.nodes.get_mut(&id) {
                        node.parent_id = None;
                    }
                    tree.roots.insert(id);
                    tree.reattached.insert(id);
                }
                None => {
                    tree.roots.insert(id);
                }
            }
        }
        let roots: Vec<Uuid> = tree.roots.iter().copied().collect();
        for root in roots {
            tree.relabel(root);
        }
        tree
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Hostgroup> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: Uuid) -> Option<&mut Hostgroup> {
        self.nodes.get_mut(&id)
    }

    pub fn find_by_title(&self, title: &str) -> Option<&Hostgroup> {
        self.nodes.values().find(|h| h.title == title)
    }

    /// Resolve an external path token (`{id}-{slug}`). Only the id prefix is used.
    pub fn find_by_param(&self, token: &str) -> Option<&Hostgroup> {
        let id = token.get(..36).and_then(|prefix| Uuid::parse_str(prefix).ok())?;
        let rest = &token[36..];
        if !rest.is_empty() && !rest.starts_with('-') {
            return None;
        }
        self.get(id)
    }

    /// All hostgroups ordered by title
    pub fn iter(&self) -> impl Iterator<Item = &Hostgroup> {
        let mut all: Vec<&Hostgroup> = self.nodes.values().collect();
        all.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        all.into_iter()
    }

    pub fn roots(&self) -> Vec<&Hostgroup> {
        self.roots.iter().filter_map(|id| self.nodes.get(id)).collect()
    }

    /// Ancestors of `node`, root first, direct parent last.
    ///
    /// Works for hostgroups that are not (yet) in the tree, such as drafts.
    pub fn ancestors<'a>(&'a self, node: &Hostgroup) -> Vec<&'a Hostgroup> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([node.id]);
        let mut current = node.parent_id;
        while let Some(parent_id) = current {
            if !seen.insert(parent_id) {
                break;
            }
            match self.nodes.get(&parent_id) {
                Some(parent) => {
                    chain.push(parent);
                    current = parent.parent_id;
                }
                None => break,
            }
        }
        chain.reverse();
        chain
    }

    pub fn ancestor_ids(&self, node: &Hostgroup) -> Vec<Uuid> {
        self.ancestors(node).into_iter().map(|h| h.id).collect()
    }

    /// Ancestors followed by the node itself
    pub fn path<'a>(&'a self, node: &'a Hostgroup) -> Vec<&'a Hostgroup> {
        let mut path = self.ancestors(node);
        path.push(node);
        path
    }

    pub fn parent(&self, node: &Hostgroup) -> Option<&Hostgroup> {
        node.parent_id.and_then(|id| self.nodes.get(&id))
    }

    /// Direct children of the hostgroup with `id`, ordered by name
    pub fn children(&self, id: Uuid) -> Vec<&Hostgroup> {
        let mut children: Vec<&Hostgroup> = self
            .children
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|child| self.nodes.get(child))
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        children
    }

    pub fn has_children(&self, id: Uuid) -> bool {
        self.children.get(&id).is_some_and(|c| !c.is_empty())
    }

    /// All descendants of `id`, breadth first
    pub fn descendant_ids(&self, id: Uuid) -> Vec<Uuid> {
        let mut result = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut queue: VecDeque<Uuid> = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            if let Some(children) = self.children.get(&current) {
                for child in children {
                    if seen.insert(*child) {
                        result.push(*child);
                        queue.push_back(*child);
                    }
                }
            }
        }
        result
    }

    pub fn descendants(&self, id: Uuid) -> Vec<&Hostgroup> {
        self.descendant_ids(id)
            .into_iter()
            .filter_map(|d| self.nodes.get(&d))
            .collect()
    }

    /// Hosts assigned anywhere below `id`, excluding its own
    pub fn children_hosts_count(&self, id: Uuid) -> u64 {
        self.descendants(id)
            .iter()
            .map(|h| u64::from(h.hosts_count))
            .sum()
    }

    /// Siblings of a (possibly unsaved) hostgroup, excluding itself
    pub fn siblings<'a>(&'a self, node: &Hostgroup) -> Vec<&'a Hostgroup> {
        let ids = match node.parent_id {
            Some(parent_id) => self.children.get(&parent_id),
            None => Some(&self.roots),
        };
        ids.into_iter()
            .flatten()
            .filter(|id| **id != node.id)
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    /// Title a hostgroup named `name` gets below `parent_id`
    pub fn compose_title(&self, parent_id: Option<Uuid>, name: &str) -> String {
        match parent_id.and_then(|id| self.nodes.get(&id)) {
            Some(parent) => format!("{}{}{}", parent.title, TITLE_SEPARATOR, name),
            None => name.to_string(),
        }
    }

    /// True when making `candidate_parent` the parent of `id` would create a cycle
    pub fn would_create_cycle(&self, id: Uuid, candidate_parent: Uuid) -> bool {
        if id == candidate_parent {
            return true;
        }
        let mut seen = HashSet::new();
        let mut current = Some(candidate_parent);
        while let Some(cursor) = current {
            if cursor == id {
                return true;
            }
            if !seen.insert(cursor) {
                return true;
            }
            current = self.nodes.get(&cursor).and_then(|h| h.parent_id);
        }
        false
    }

    /// Insert a new hostgroup, computing its title from the parent
    pub(crate) fn insert(&mut self, mut hostgroup: Hostgroup) -> &Hostgroup {
        hostgroup.title = self.compose_title(hostgroup.parent_id, &hostgroup.name);
        let id = hostgroup.id;
        self.attach(id, hostgroup.parent_id);
        self.nodes.insert(id, hostgroup);
        &self.nodes[&id]
    }

    /// Replace a stored hostgroup, moving it in the adjacency index when its
    /// parent changed. Titles are not touched; call [`Self::relabel`] afterwards.
    pub(crate) fn replace(&mut self, hostgroup: Hostgroup) {
        let id = hostgroup.id;
        if let Some(previous) = self.nodes.get(&id) {
            if previous.parent_id != hostgroup.parent_id {
                let old_parent = previous.parent_id;
                self.detach(id, old_parent);
                self.attach(id, hostgroup.parent_id);
            }
        } else {
            self.attach(id, hostgroup.parent_id);
        }
        self.nodes.insert(id, hostgroup);
    }

    /// Recompute the title of `id` and every descendant.
    ///
    /// Returns the ids whose title changed.
    pub(crate) fn relabel(&mut self, id: Uuid) -> Vec<Uuid> {
        let mut changed = Vec::new();
        let mut queue: VecDeque<Uuid> = VecDeque::from([id]);
        let mut seen = HashSet::new();
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            let title = self.compose_title(node.parent_id, &node.name);
            if let Some(node) = self.nodes.get_mut(&current) {
                if node.title != title {
                    node.title = title;
                    changed.push(current);
                }
            }
            if let Some(children) = self.children.get(&current) {
                queue.extend(children.iter().copied());
            }
        }
        changed
    }

    /// Titles the subtree of `id` would get if it were renamed/moved as in `updated`.
    ///
    /// Pure preview used to validate and persist a cascade before applying it.
    pub fn preview_relabel(&self, updated: &Hostgroup) -> Vec<(Uuid, String)> {
        let mut titles: HashMap<Uuid, String> = HashMap::new();
        let root_title = self.compose_title(updated.parent_id, &updated.name);
        titles.insert(updated.id, root_title.clone());
        let mut result = vec![(updated.id, root_title)];
        for descendant in self.descendant_ids(updated.id) {
            let Some(node) = self.nodes.get(&descendant) else {
                continue;
            };
            let parent_title = node
                .parent_id
                .and_then(|p| titles.get(&p).cloned())
                .unwrap_or_default();
            let title = format!("{}{}{}", parent_title, TITLE_SEPARATOR, node.name);
            titles.insert(descendant, title.clone());
            result.push((descendant, title));
        }
        result
    }

    /// Hostgroups that no root reaches, i.e. stored parent chains that loop
    pub fn unreachable_ids(&self) -> Vec<Uuid> {
        let mut reached: HashSet<Uuid> = self.roots.iter().copied().collect();
        for root in &self.roots {
            reached.extend(self.descendant_ids(*root));
        }
        let mut ids: Vec<Uuid> = self
            .nodes
            .keys()
            .filter(|id| !reached.contains(id))
            .copied()
            .collect();
        ids.sort();
        ids
    }

    /// Titles carried by more than one hostgroup
    pub fn duplicate_titles(&self) -> Vec<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for node in self.nodes.values() {
            *counts.entry(node.title.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(title, _)| title.to_string())
            .collect()
    }

    pub fn integrity(&self) -> TreeIntegrity {
        TreeIntegrity {
            hostgroups: self.nodes.len(),
            roots: self.roots.len(),
            reattached: self.reattached.iter().copied().collect(),
            unreachable: self.unreachable_ids(),
            duplicate_titles: self.duplicate_titles(),
        }
    }

    /// Remove a hostgroup. Refused while it has children.
    pub(crate) fn remove(&mut self, id: Uuid) -> Result<Hostgroup, HostgroupError> {
        let node = self
            .nodes
            .get(&id)
            .ok_or_else(|| HostgroupError::NotFound(format!("Hostgroup {} not found", id)))?;
        if self.has_children(id) {
            return Err(HostgroupError::HasChildren {
                id,
                name: node.name.clone(),
            });
        }
        let parent_id = node.parent_id;
        self.detach(id, parent_id);
        self.children.remove(&id);
        self.reattached.remove(&id);
        self.nodes
            .remove(&id)
            .ok_or_else(|| HostgroupError::NotFound(format!("Hostgroup {} not found", id)))
    }

    fn attach(&mut self, id: Uuid, parent_id: Option<Uuid>) {
        match parent_id {
            Some(parent_id) => {
                self.children.entry(parent_id).or_default().insert(id);
            }
            None => {
                self.roots.insert(id);
            }
        }
    }

    fn detach(&mut self, id: Uuid, parent_id: Option<Uuid>) {
        match parent_id {
            Some(parent_id) => {
                if let Some(children) = self.children.get_mut(&parent_id) {
                    children.remove(&id);
                    if children.is_empty() {
                        self.children.remove(&parent_id);
                    }
                }
            }
            None => {
                self.roots.remove(&id);
            }
        }
    }
}
