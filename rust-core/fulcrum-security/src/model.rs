// SPDX-License-Identifier: PMPL-1.0-or-later
//! Grant and revoke operations on the security graph.
//!
//! The [`ModelManager`] is the only component that mutates edges. Every
//! operation:
//!
//! 1. checks the edge kind is available in the configured [`ModelVariant`],
//! 2. takes the graph write lock,
//! 3. checks that each endpoint exists via its manager, in argument order,
//!    failing with [`SecurityError::UnknownEntity`] on the first miss,
//! 4. mutates both directions of the edge in one call.
//!
//! Nothing is changed when a check fails. Granting an existing edge and
//! revoking a missing one are no-ops.
//!
//! Lock order is always graph, then manager.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use crate::config::ModelVariant;
use crate::entity::{EntityId, Group, Permission, Role, SecurityEntity, User};
use crate::error::{Result, SecurityError};
use crate::graph::{Assignment, EntityGraph};
use crate::manager::{EntityManager, Managers};
use crate::set::{GroupSet, PermissionSet, RoleSet, SecuritySet, UserSet};

/// Owner of the entity graph.
#[derive(Debug)]
pub struct ModelManager {
    variant: ModelVariant,
    managers: Managers,
    graph: RwLock<EntityGraph>,
}

impl ModelManager {
    pub fn new(variant: ModelVariant, managers: Managers) -> Self {
        Self {
            variant,
            managers,
            graph: RwLock::new(EntityGraph::new(variant)),
        }
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn managers(&self) -> &Managers {
        &self.managers
    }

    pub(crate) fn read_graph(&self) -> Result<RwLockReadGuard<'_, EntityGraph>> {
        self.graph
            .read()
            .map_err(|_| SecurityError::backend("entity graph lock poisoned"))
    }

    fn write_graph(&self) -> Result<RwLockWriteGuard<'_, EntityGraph>> {
        self.graph
            .write()
            .map_err(|_| SecurityError::backend("entity graph lock poisoned"))
    }

    /// A copy of the current edges.
    pub fn graph_snapshot(&self) -> Result<EntityGraph> {
        Ok(self.read_graph()?.clone())
    }

    fn require(&self, supported: bool, operation: &'static str) -> Result<()> {
        if supported {
            Ok(())
        } else {
            warn!(operation, variant = %self.variant, "operation not available in model");
            Err(SecurityError::UnsupportedOperation {
                operation,
                variant: self.variant,
            })
        }
    }

    fn user_id(&self, user: &User) -> Result<EntityId> {
        resolve(&*self.managers.users, user)
    }

    fn group_id(&self, group: &Group) -> Result<EntityId> {
        resolve(&*self.managers.groups, group)
    }

    fn role_id(&self, role: &Role) -> Result<EntityId> {
        resolve(&*self.managers.roles, role)
    }

    fn permission_id(&self, permission: &Permission) -> Result<EntityId> {
        resolve(&*self.managers.permissions, permission)
    }

    // -----------------------------------------------------------------------
    // user <-> group (basic, dynamic)
    // -----------------------------------------------------------------------

    pub fn grant_user_group(&self, user: &User, group: &Group) -> Result<()> {
        self.require(self.variant.has_user_group_edges(), "grant_user_group")?;
        let mut graph = self.write_graph()?;
        let (u, g) = (self.user_id(user)?, self.group_id(group)?);
        let changed = graph.user_groups.insert(u, g);
        debug!(user = %user.name(), group = %group.name(), changed, "granted group to user");
        Ok(())
    }

    pub fn revoke_user_group(&self, user: &User, group: &Group) -> Result<()> {
        self.require(self.variant.has_user_group_edges(), "revoke_user_group")?;
        let mut graph = self.write_graph()?;
        let (u, g) = (self.user_id(user)?, self.group_id(group)?);
        let changed = graph.user_groups.remove(u, g);
        debug!(user = %user.name(), group = %group.name(), changed, "revoked group from user");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // group <-> role (dynamic)
    // -----------------------------------------------------------------------

    pub fn grant_group_role(&self, group: &Group, role: &Role) -> Result<()> {
        self.require(self.variant.has_group_role_edges(), "grant_group_role")?;
        let mut graph = self.write_graph()?;
        let (g, r) = (self.group_id(group)?, self.role_id(role)?);
        let changed = graph.group_roles.insert(g, r);
        debug!(group = %group.name(), role = %role.name(), changed, "granted role to group");
        Ok(())
    }

    pub fn revoke_group_role(&self, group: &Group, role: &Role) -> Result<()> {
        self.require(self.variant.has_group_role_edges(), "revoke_group_role")?;
        let mut graph = self.write_graph()?;
        let (g, r) = (self.group_id(group)?, self.role_id(role)?);
        let changed = graph.group_roles.remove(g, r);
        debug!(group = %group.name(), role = %role.name(), changed, "revoked role from group");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // (user, group, role) (turbine)
    // -----------------------------------------------------------------------

    pub fn grant_user_group_role(&self, user: &User, group: &Group, role: &Role) -> Result<()> {
        self.require(
            self.variant.has_user_group_role_triples(),
            "grant_user_group_role",
        )?;
        let mut graph = self.write_graph()?;
        let assignment = Assignment {
            user: self.user_id(user)?,
            group: self.group_id(group)?,
            role: self.role_id(role)?,
        };
        let changed = graph.assignments.insert(assignment);
        debug!(
            user = %user.name(),
            group = %group.name(),
            role = %role.name(),
            changed,
            "granted role to user in group"
        );
        Ok(())
    }

    pub fn revoke_user_group_role(&self, user: &User, group: &Group, role: &Role) -> Result<()> {
        self.require(
            self.variant.has_user_group_role_triples(),
            "revoke_user_group_role",
        )?;
        let mut graph = self.write_graph()?;
        let assignment = Assignment {
            user: self.user_id(user)?,
            group: self.group_id(group)?,
            role: self.role_id(role)?,
        };
        let changed = graph.assignments.remove(&assignment);
        debug!(
            user = %user.name(),
            group = %group.name(),
            role = %role.name(),
            changed,
            "revoked role from user in group"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // role <-> permission (dynamic, turbine)
    // -----------------------------------------------------------------------

    pub fn grant_role_permission(&self, role: &Role, permission: &Permission) -> Result<()> {
        self.require(
            self.variant.has_role_permission_edges(),
            "grant_role_permission",
        )?;
        let mut graph = self.write_graph()?;
        let (r, p) = (self.role_id(role)?, self.permission_id(permission)?);
        let changed = graph.role_permissions.insert(r, p);
        debug!(role = %role.name(), permission = %permission.name(), changed, "granted permission to role");
        Ok(())
    }

    pub fn revoke_role_permission(&self, role: &Role, permission: &Permission) -> Result<()> {
        self.require(
            self.variant.has_role_permission_edges(),
            "revoke_role_permission",
        )?;
        let mut graph = self.write_graph()?;
        let (r, p) = (self.role_id(role)?, self.permission_id(permission)?);
        let changed = graph.role_permissions.remove(r, p);
        debug!(role = %role.name(), permission = %permission.name(), changed, "revoked permission from role");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // revoke all
    // -----------------------------------------------------------------------

    /// Remove every edge incident to `user`.
    pub fn revoke_all_user(&self, user: &User) -> Result<()> {
        let mut graph = self.write_graph()?;
        let edges = graph.detach_user(self.user_id(user)?);
        debug!(user = %user.name(), edges, "revoked everything from user");
        Ok(())
    }

    /// Remove every edge incident to `group`.
    pub fn revoke_all_group(&self, group: &Group) -> Result<()> {
        let mut graph = self.write_graph()?;
        let edges = graph.detach_group(self.group_id(group)?);
        debug!(group = %group.name(), edges, "revoked everything from group");
        Ok(())
    }

    /// Remove every edge incident to `role`.
    pub fn revoke_all_role(&self, role: &Role) -> Result<()> {
        self.require(self.variant != ModelVariant::Basic, "revoke_all_role")?;
        let mut graph = self.write_graph()?;
        let edges = graph.detach_role(self.role_id(role)?);
        debug!(role = %role.name(), edges, "revoked everything from role");
        Ok(())
    }

    /// Remove `permission` from every role holding it.
    pub fn revoke_all_permission(&self, permission: &Permission) -> Result<()> {
        self.require(
            self.variant.has_role_permission_edges(),
            "revoke_all_permission",
        )?;
        let mut graph = self.write_graph()?;
        let edges = graph.detach_permission(self.permission_id(permission)?);
        debug!(permission = %permission.name(), edges, "revoked permission from every role");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // removal
    // -----------------------------------------------------------------------
    //
    // Edges are detached and the entity deleted under one graph write lock,
    // so no grant can attach a new edge in between. If the manager fails to
    // delete, the edges are already gone.

    /// Revoke every edge of `user`, then delete it from the user manager.
    pub fn remove_user(&self, user: &User) -> Result<()> {
        let mut graph = self.write_graph()?;
        let edges = graph.detach_user(self.user_id(user)?);
        self.managers.users.remove(user)?;
        debug!(user = %user.name(), edges, "removed user");
        Ok(())
    }

    pub fn remove_group(&self, group: &Group) -> Result<()> {
        let mut graph = self.write_graph()?;
        let edges = graph.detach_group(self.group_id(group)?);
        self.managers.groups.remove(group)?;
        debug!(group = %group.name(), edges, "removed group");
        Ok(())
    }

    pub fn remove_role(&self, role: &Role) -> Result<()> {
        let mut graph = self.write_graph()?;
        let edges = graph.detach_role(self.role_id(role)?);
        self.managers.roles.remove(role)?;
        debug!(role = %role.name(), edges, "removed role");
        Ok(())
    }

    pub fn remove_permission(&self, permission: &Permission) -> Result<()> {
        let mut graph = self.write_graph()?;
        let edges = graph.detach_permission(self.permission_id(permission)?);
        self.managers.permissions.remove(permission)?;
        debug!(permission = %permission.name(), edges, "removed permission");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // read side
    // -----------------------------------------------------------------------

    pub fn groups_of(&self, user: &User) -> Result<GroupSet> {
        let graph = self.read_graph()?;
        let ids = graph.groups_of_user(self.user_id(user)?);
        collect(&*self.managers.groups, ids)
    }

    pub fn users_of(&self, group: &Group) -> Result<UserSet> {
        let graph = self.read_graph()?;
        let ids = graph.users_of_group(self.group_id(group)?);
        collect(&*self.managers.users, ids)
    }

    pub fn roles_of_group(&self, group: &Group) -> Result<RoleSet> {
        let graph = self.read_graph()?;
        let ids = graph.roles_of_group(self.group_id(group)?);
        collect(&*self.managers.roles, ids)
    }

    pub fn groups_of_role(&self, role: &Role) -> Result<GroupSet> {
        let graph = self.read_graph()?;
        let ids = graph.groups_of_role(self.role_id(role)?);
        collect(&*self.managers.groups, ids)
    }

    /// Dynamic: roles reachable through the user's groups. Turbine: roles
    /// assigned in any group.
    pub fn roles_of_user(&self, user: &User) -> Result<RoleSet> {
        let graph = self.read_graph()?;
        let ids = graph.roles_of_user(self.user_id(user)?);
        collect(&*self.managers.roles, ids)
    }

    /// Dynamic: users reaching `role` through a group. Turbine: users
    /// assigned `role` in any group.
    pub fn users_of_role(&self, role: &Role) -> Result<UserSet> {
        let graph = self.read_graph()?;
        let ids = graph.users_of_role(self.role_id(role)?);
        collect(&*self.managers.users, ids)
    }

    /// Turbine: roles assigned to `user` within `group`.
    pub fn roles_of_user_in_group(&self, user: &User, group: &Group) -> Result<RoleSet> {
        let graph = self.read_graph()?;
        let ids = graph.roles_of_user_in_group(self.user_id(user)?, self.group_id(group)?);
        collect(&*self.managers.roles, ids)
    }

    pub fn permissions_of(&self, role: &Role) -> Result<PermissionSet> {
        let graph = self.read_graph()?;
        let ids = graph.permissions_of_role(self.role_id(role)?);
        collect(&*self.managers.permissions, ids)
    }

    pub fn roles_of_permission(&self, permission: &Permission) -> Result<RoleSet> {
        let graph = self.read_graph()?;
        let ids = graph.roles_of_permission(self.permission_id(permission)?);
        collect(&*self.managers.roles, ids)
    }
}

/// Existence-check `entity` and return its stored id.
pub(crate) fn resolve<E, M>(manager: &M, entity: &E) -> Result<EntityId>
where
    E: SecurityEntity,
    M: EntityManager<E> + ?Sized,
{
    if !manager.check_exists(entity)? {
        warn!(kind = %E::KIND, name = %entity.name(), "unknown entity");
        return Err(SecurityError::unknown(E::KIND, entity.name()));
    }
    manager.get_by_name(entity.name())?.id().ok_or_else(|| {
        SecurityError::backend(format!("stored {} '{}' has no id", E::KIND, entity.name()))
    })
}

/// Resolve graph ids to entities. Ids whose entity has since been removed
/// from its manager are skipped.
pub(crate) fn collect<E, M>(manager: &M, ids: Vec<EntityId>) -> Result<SecuritySet<E>>
where
    E: SecurityEntity,
    M: EntityManager<E> + ?Sized,
{
    let mut set = SecuritySet::new();
    for id in ids {
        match manager.get_by_id(id) {
            Ok(entity) => {
                set.add(entity);
            }
            Err(SecurityError::UnknownEntity { .. }) => {
                warn!(kind = %E::KIND, id = %id, "dangling edge to removed entity");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(set)
}
