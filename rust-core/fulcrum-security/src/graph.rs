// SPDX-License-Identifier: PMPL-1.0-or-later
//! Edge store for the security graph.
//!
//! Nodes are identified by [`EntityId`] only; the entities themselves live in
//! the managers. Every relation keeps a forward and a reverse index and each
//! insert or remove updates both in the same call, so the two directions
//! cannot drift apart.
//!
//! The graph does not enforce which edge kinds the configured
//! [`ModelVariant`] allows. That is the model manager's job. The derived
//! queries (`groups_of_user`, `roles_of_group`, ...) do read the variant so
//! that callers get the same answer regardless of how the edge is stored.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::ModelVariant;
use crate::entity::EntityId;

/// A many-to-many relation indexed in both directions.
///
/// Empty adjacency sets are pruned, so two relations holding the same edges
/// compare equal regardless of history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    forward: BTreeMap<EntityId, BTreeSet<EntityId>>,
    reverse: BTreeMap<EntityId, BTreeSet<EntityId>>,
}

impl Relation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the edge `left -> right`. Returns `false` if it already existed.
    pub fn insert(&mut self, left: EntityId, right: EntityId) -> bool {
        let added = self.forward.entry(left).or_default().insert(right);
        self.reverse.entry(right).or_default().insert(left);
        added
    }

    /// Remove the edge `left -> right`. Returns `false` if it was absent.
    pub fn remove(&mut self, left: EntityId, right: EntityId) -> bool {
        let removed = detach(&mut self.forward, left, right);
        detach(&mut self.reverse, right, left);
        removed
    }

    pub fn contains(&self, left: EntityId, right: EntityId) -> bool {
        self.forward
            .get(&left)
            .map_or(false, |rights| rights.contains(&right))
    }

    pub fn right_of(&self, left: EntityId) -> Vec<EntityId> {
        self.forward
            .get(&left)
            .map(|rights| rights.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn left_of(&self, right: EntityId) -> Vec<EntityId> {
        self.reverse
            .get(&right)
            .map(|lefts| lefts.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Remove every edge leaving `left`. Returns the detached right ends.
    pub fn remove_left(&mut self, left: EntityId) -> Vec<EntityId> {
        let rights = self.forward.remove(&left).unwrap_or_default();
        for right in &rights {
            detach(&mut self.reverse, *right, left);
        }
        rights.into_iter().collect()
    }

    /// Remove every edge arriving at `right`. Returns the detached left ends.
    pub fn remove_right(&mut self, right: EntityId) -> Vec<EntityId> {
        let lefts = self.reverse.remove(&right).unwrap_or_default();
        for left in &lefts {
            detach(&mut self.forward, *left, right);
        }
        lefts.into_iter().collect()
    }

    /// Both indexes hold exactly the same edges and no empty sets.
    pub fn is_consistent(&self) -> bool {
        let no_empty = self
            .forward
            .values()
            .chain(self.reverse.values())
            .all(|set| !set.is_empty());
        let forward_mirrored = self.forward.iter().all(|(left, rights)| {
            rights.iter().all(|right| {
                self.reverse
                    .get(right)
                    .map_or(false, |lefts| lefts.contains(left))
            })
        });
        let reverse_mirrored = self
            .reverse
            .iter()
            .all(|(right, lefts)| lefts.iter().all(|left| self.contains(*left, *right)));
        no_empty && forward_mirrored && reverse_mirrored
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.forward.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

fn detach(index: &mut BTreeMap<EntityId, BTreeSet<EntityId>>, from: EntityId, to: EntityId) -> bool {
    let Some(targets) = index.get_mut(&from) else {
        return false;
    };
    let removed = targets.remove(&to);
    if targets.is_empty() {
        index.remove(&from);
    }
    removed
}

/// A (user, group, role) assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Assignment {
    pub user: EntityId,
    pub group: EntityId,
    pub role: EntityId,
}

/// Set of (user, group, role) assignments used by the turbine model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentSet {
    assignments: BTreeSet<Assignment>,
}

impl AssignmentSet {
    pub fn insert(&mut self, assignment: Assignment) -> bool {
        self.assignments.insert(assignment)
    }

    pub fn remove(&mut self, assignment: &Assignment) -> bool {
        self.assignments.remove(assignment)
    }

    /// Remove every assignment matching `predicate`, returning them.
    pub fn remove_where<F>(&mut self, predicate: F) -> Vec<Assignment>
    where
        F: Fn(&Assignment) -> bool,
    {
        let (removed, kept): (BTreeSet<_>, BTreeSet<_>) =
            self.assignments.iter().copied().partition(|a| predicate(a));
        self.assignments = kept;
        removed.into_iter().collect()
    }

    /// Distinct projections of the assignments matching `predicate`.
    fn project<F, P>(&self, predicate: F, project: P) -> Vec<EntityId>
    where
        F: Fn(&Assignment) -> bool,
        P: Fn(&Assignment) -> EntityId,
    {
        self.assignments
            .iter()
            .filter(|a| predicate(*a))
            .map(project)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// All edges of one security model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityGraph {
    variant: ModelVariant,
    /// user -> group (basic, dynamic)
    pub(crate) user_groups: Relation,
    /// group -> role (dynamic)
    pub(crate) group_roles: Relation,
    /// role -> permission (dynamic, turbine)
    pub(crate) role_permissions: Relation,
    /// (user, group, role) (turbine)
    pub(crate) assignments: AssignmentSet,
}

impl EntityGraph {
    pub fn new(variant: ModelVariant) -> Self {
        Self {
            variant,
            user_groups: Relation::new(),
            group_roles: Relation::new(),
            role_permissions: Relation::new(),
            assignments: AssignmentSet::default(),
        }
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn groups_of_user(&self, user: EntityId) -> Vec<EntityId> {
        if self.variant.has_user_group_role_triples() {
            self.assignments.project(|a| a.user == user, |a| a.group)
        } else {
            self.user_groups.right_of(user)
        }
    }

    pub fn users_of_group(&self, group: EntityId) -> Vec<EntityId> {
        if self.variant.has_user_group_role_triples() {
            self.assignments.project(|a| a.group == group, |a| a.user)
        } else {
            self.user_groups.left_of(group)
        }
    }

    pub fn roles_of_group(&self, group: EntityId) -> Vec<EntityId> {
        match self.variant {
            ModelVariant::Basic => Vec::new(),
            ModelVariant::Dynamic => self.group_roles.right_of(group),
            ModelVariant::Turbine => self.assignments.project(|a| a.group == group, |a| a.role),
        }
    }

    pub fn groups_of_role(&self, role: EntityId) -> Vec<EntityId> {
        match self.variant {
            ModelVariant::Basic => Vec::new(),
            ModelVariant::Dynamic => self.group_roles.left_of(role),
            ModelVariant::Turbine => self.assignments.project(|a| a.role == role, |a| a.group),
        }
    }

    /// Roles a user holds: through its groups (dynamic) or directly
    /// (turbine).
    pub fn roles_of_user(&self, user: EntityId) -> Vec<EntityId> {
        match self.variant {
            ModelVariant::Basic => Vec::new(),
            ModelVariant::Dynamic => self
                .user_groups
                .right_of(user)
                .into_iter()
                .flat_map(|group| self.group_roles.right_of(group))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            ModelVariant::Turbine => self.assignments.project(|a| a.user == user, |a| a.role),
        }
    }

    /// Turbine: roles a user holds within one group.
    pub fn roles_of_user_in_group(&self, user: EntityId, group: EntityId) -> Vec<EntityId> {
        self.assignments
            .project(|a| a.user == user && a.group == group, |a| a.role)
    }

    pub fn users_of_role(&self, role: EntityId) -> Vec<EntityId> {
        match self.variant {
            ModelVariant::Basic => Vec::new(),
            ModelVariant::Dynamic => self
                .group_roles
                .left_of(role)
                .into_iter()
                .flat_map(|group| self.user_groups.left_of(group))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            ModelVariant::Turbine => self.assignments.project(|a| a.role == role, |a| a.user),
        }
    }

    pub fn permissions_of_role(&self, role: EntityId) -> Vec<EntityId> {
        self.role_permissions.right_of(role)
    }

    pub fn roles_of_permission(&self, permission: EntityId) -> Vec<EntityId> {
        self.role_permissions.left_of(permission)
    }

    /// Drop every edge touching `user`. Returns how many were removed.
    pub(crate) fn detach_user(&mut self, user: EntityId) -> usize {
        self.user_groups.remove_left(user).len()
            + self.assignments.remove_where(|a| a.user == user).len()
    }

    pub(crate) fn detach_group(&mut self, group: EntityId) -> usize {
        self.user_groups.remove_right(group).len()
            + self.group_roles.remove_left(group).len()
            + self.assignments.remove_where(|a| a.group == group).len()
    }

    pub(crate) fn detach_role(&mut self, role: EntityId) -> usize {
        self.group_roles.remove_right(role).len()
            + self.role_permissions.remove_left(role).len()
            + self.assignments.remove_where(|a| a.role == role).len()
    }

    pub(crate) fn detach_permission(&mut self, permission: EntityId) -> usize {
        self.role_permissions.remove_right(permission).len()
    }

    /// Whether every relation's forward and reverse indexes describe the
    /// same edges.
    pub fn is_consistent(&self) -> bool {
        [&self.user_groups, &self.group_roles, &self.role_permissions]
            .iter()
            .all(|relation| relation.is_consistent())
    }

    /// Total number of stored edges and assignments.
    pub fn edge_count(&self) -> usize {
        self.user_groups.len()
            + self.group_roles.len()
            + self.role_permissions.len()
            + self.assignments.len()
    }
}
