// SPDX-License-Identifier: PMPL-1.0-or-later
//! Access control lists.
//!
//! An [`AccessControlList`] is computed once per authorization context (for
//! example at login) by walking the graph from a user:
//!
//! 1. for each group `g` of the user, record the roles held through `g`;
//! 2. for each such role `r`, record the permissions of `r`.
//!
//! In the dynamic model "roles held through `g`" are the roles granted to
//! the group; in the turbine model they are the roles assigned to the user
//! within `g`. A basic ACL only knows groups.
//!
//! The ACL owns copies of every set it holds. Later grants and revokes are
//! not visible through it; compute a new one to pick them up.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::ModelVariant;
use crate::entity::{name_key, Group, Permission, Role, SecurityEntity, User};
use crate::error::Result;
use crate::model::{collect, resolve, ModelManager};
use crate::set::{GroupSet, PermissionSet, RoleSet};

/// Immutable snapshot of what one user may do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlList {
    user: String,
    variant: ModelVariant,
    groups: GroupSet,
    /// group key -> roles held through that group
    role_sets: BTreeMap<String, RoleSet>,
    /// role key -> permissions of that role
    permission_sets: BTreeMap<String, PermissionSet>,
    global_group: String,
}

impl AccessControlList {
    /// Name of the user this list was computed for.
    pub fn user_name(&self) -> &str {
        &self.user
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn groups(&self) -> &GroupSet {
        &self.groups
    }

    /// Union of the roles held through every group.
    pub fn roles(&self) -> RoleSet {
        self.role_sets.values().flat_map(|set| set.iter().cloned()).collect()
    }

    /// Union of the permissions of every role held.
    pub fn permissions(&self) -> PermissionSet {
        self.permission_sets
            .values()
            .flat_map(|set| set.iter().cloned())
            .collect()
    }

    pub fn has_group(&self, group: &Group) -> bool {
        self.has_group_name(group.name())
    }

    pub fn has_group_name(&self, name: &str) -> bool {
        self.groups.contains_name(name)
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.has_role_name(role.name())
    }

    /// Whether any group grants the named role. Case-insensitive.
    pub fn has_role_name(&self, name: &str) -> bool {
        self.role_sets.values().any(|set| set.contains_name(name))
    }

    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.has_permission_name(permission.name())
    }

    /// Whether any held role carries the named permission. Case-insensitive.
    pub fn has_permission_name(&self, name: &str) -> bool {
        self.permission_sets.values().any(|set| set.contains_name(name))
    }

    /// Roles held through one group, if the user is in it.
    pub fn roles_in(&self, group_name: &str) -> Option<&RoleSet> {
        self.role_sets.get(&name_key(group_name))
    }

    pub fn has_role_in(&self, role_name: &str, group_name: &str) -> bool {
        self.roles_in(group_name)
            .map_or(false, |roles| roles.contains_name(role_name))
    }

    /// Permissions reachable through the roles held in one group.
    pub fn permissions_in(&self, group_name: &str) -> PermissionSet {
        let Some(roles) = self.roles_in(group_name) else {
            return PermissionSet::new();
        };
        roles
            .iter()
            .filter_map(|role| self.permission_sets.get(&role.key()))
            .flat_map(|set| set.iter().cloned())
            .collect()
    }

    pub fn has_permission_in(&self, permission_name: &str, group_name: &str) -> bool {
        self.roles_in(group_name).map_or(false, |roles| {
            roles.iter().any(|role| {
                self.permission_sets
                    .get(&role.key())
                    .map_or(false, |perms| perms.contains_name(permission_name))
            })
        })
    }

    /// Name of the group whose roles apply regardless of context.
    pub fn global_group(&self) -> &str {
        &self.global_group
    }

    pub fn has_role_globally(&self, role_name: &str) -> bool {
        self.has_role_in(role_name, &self.global_group)
    }

    pub fn has_permission_globally(&self, permission_name: &str) -> bool {
        self.has_permission_in(permission_name, &self.global_group)
    }
}

/// Builds [`AccessControlList`]s from the current graph.
#[derive(Debug, Clone)]
pub struct AclFactory {
    model: Arc<ModelManager>,
    global_group: String,
}

impl AclFactory {
    pub fn new(model: Arc<ModelManager>, global_group: impl Into<String>) -> Self {
        Self {
            model,
            global_group: global_group.into(),
        }
    }

    /// Walk the graph from `user` under the graph read lock.
    ///
    /// Fails with [`SecurityError::UnknownEntity`](crate::SecurityError) if
    /// the user does not exist.
    pub fn compute(&self, user: &User) -> Result<AccessControlList> {
        let managers = self.model.managers();
        let graph = self.model.read_graph()?;
        let variant = graph.variant();

        let user_id = resolve(&*managers.users, user)?;
        let groups = collect(&*managers.groups, graph.groups_of_user(user_id))?;

        let mut role_sets = BTreeMap::new();
        let mut permission_sets: BTreeMap<String, PermissionSet> = BTreeMap::new();

        if variant != ModelVariant::Basic {
            for group in &groups {
                let Some(group_id) = group.id() else { continue };
                let role_ids = match variant {
                    ModelVariant::Turbine => graph.roles_of_user_in_group(user_id, group_id),
                    _ => graph.roles_of_group(group_id),
                };
                let roles = collect(&*managers.roles, role_ids)?;

                for role in &roles {
                    if permission_sets.contains_key(&role.key()) {
                        continue;
                    }
                    let Some(role_id) = role.id() else { continue };
                    let permissions =
                        collect(&*managers.permissions, graph.permissions_of_role(role_id))?;
                    permission_sets.insert(role.key(), permissions);
                }
                role_sets.insert(group.key(), roles);
            }
        }

        let acl = AccessControlList {
            user: user.name().to_string(),
            variant,
            groups,
            role_sets,
            permission_sets,
            global_group: self.global_group.clone(),
        };
        debug!(
            user = %acl.user,
            variant = %variant,
            groups = acl.groups.len(),
            roles = acl.roles().len(),
            permissions = acl.permissions().len(),
            "computed access control list"
        );
        Ok(acl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{EntityManager, Managers, UserManager};
    use crate::SecurityError;

    fn factory(variant: ModelVariant) -> (Arc<ModelManager>, AclFactory) {
        let managers = Managers::in_memory("plain").unwrap();
        let model = Arc::new(ModelManager::new(variant, managers));
        let factory = AclFactory::new(Arc::clone(&model), "global");
        (model, factory)
    }

    #[test]
    fn test_unknown_user_fails() {
        let (_, factory) = factory(ModelVariant::Dynamic);
        let err = factory.compute(&User::new("nobody")).unwrap_err();
        assert!(matches!(err, SecurityError::UnknownEntity { .. }));
    }

    #[test]
    fn test_user_without_edges_has_empty_acl() {
        let (model, factory) = factory(ModelVariant::Dynamic);
        let bob = model.managers().users.add_user(User::new("bob"), "pw").unwrap();

        let acl = factory.compute(&bob).unwrap();
        assert_eq!(acl.user_name(), "bob");
        assert!(acl.groups().is_empty());
        assert!(acl.roles().is_empty());
        assert!(!acl.has_permission_name("anything"));
    }

    #[test]
    fn test_basic_acl_knows_groups_only() {
        let (model, factory) = factory(ModelVariant::Basic);
        let m = model.managers();
        let bob = m.users.add_user(User::new("bob"), "pw").unwrap();
        let staff = m.groups.add(Group::new("staff")).unwrap();
        model.grant_user_group(&bob, &staff).unwrap();

        let acl = factory.compute(&bob).unwrap();
        assert!(acl.has_group(&staff));
        assert!(acl.has_group_name("STAFF"));
        assert!(!acl.has_role_name("staff"));
        assert_eq!(acl.variant(), ModelVariant::Basic);
    }

    #[test]
    fn test_dynamic_per_group_queries() {
        let (model, factory) = factory(ModelVariant::Dynamic);
        let m = model.managers();
        let bob = m.users.add_user(User::new("bob"), "pw").unwrap();
        let staff = m.groups.add(Group::new("staff")).unwrap();
        let ops = m.groups.add(Group::new("ops")).unwrap();
        let editor = m.roles.add(Role::new("editor")).unwrap();
        let deployer = m.roles.add(Role::new("deployer")).unwrap();
        let publish = m.permissions.add(Permission::new("publish")).unwrap();
        let deploy = m.permissions.add(Permission::new("deploy")).unwrap();

        model.grant_user_group(&bob, &staff).unwrap();
        model.grant_user_group(&bob, &ops).unwrap();
        model.grant_group_role(&staff, &editor).unwrap();
        model.grant_group_role(&ops, &deployer).unwrap();
        model.grant_role_permission(&editor, &publish).unwrap();
        model.grant_role_permission(&deployer, &deploy).unwrap();

        let acl = factory.compute(&bob).unwrap();
        assert_eq!(acl.roles().names(), vec!["deployer", "editor"]);
        assert_eq!(acl.permissions().names(), vec!["deploy", "publish"]);
        assert!(acl.has_role_in("editor", "staff"));
        assert!(!acl.has_role_in("editor", "ops"));
        assert!(acl.has_permission_in("deploy", "ops"));
        assert!(!acl.has_permission_in("deploy", "staff"));
        assert_eq!(acl.permissions_in("staff").names(), vec!["publish"]);
        assert!(acl.permissions_in("nowhere").is_empty());
    }

    #[test]
    fn test_turbine_global_group() {
        let (model, factory) = factory(ModelVariant::Turbine);
        let m = model.managers();
        let bob = m.users.add_user(User::new("bob"), "pw").unwrap();
        let global = m.groups.add(Group::new("global")).unwrap();
        let project = m.groups.add(Group::new("project-x")).unwrap();
        let admin = m.roles.add(Role::new("admin")).unwrap();
        let viewer = m.roles.add(Role::new("viewer")).unwrap();
        let view = m.permissions.add(Permission::new("view")).unwrap();
        let manage = m.permissions.add(Permission::new("manage")).unwrap();

        model.grant_user_group_role(&bob, &global, &viewer).unwrap();
        model.grant_user_group_role(&bob, &project, &admin).unwrap();
        model.grant_role_permission(&viewer, &view).unwrap();
        model.grant_role_permission(&admin, &manage).unwrap();

        let acl = factory.compute(&bob).unwrap();
        assert_eq!(acl.global_group(), "global");
        assert!(acl.has_role_globally("viewer"));
        assert!(!acl.has_role_globally("admin"));
        assert!(acl.has_permission_globally("view"));
        assert!(!acl.has_permission_globally("manage"));
        assert!(acl.has_role(&admin));
        assert!(acl.has_permission(&manage));
    }

    #[test]
    fn test_acl_serde_roundtrip() {
        let (model, factory) = factory(ModelVariant::Dynamic);
        let m = model.managers();
        let bob = m.users.add_user(User::new("bob"), "pw").unwrap();
        let staff = m.groups.add(Group::new("staff")).unwrap();
        model.grant_user_group(&bob, &staff).unwrap();

        let acl = factory.compute(&bob).unwrap();
        let json = serde_json::to_string(&acl).unwrap();
        let parsed: AccessControlList = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, acl);
    }
}
