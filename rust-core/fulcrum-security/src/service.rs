// SPDX-License-Identifier: PMPL-1.0-or-later
//! Explicit handle tying configuration, managers, model and ACL factory
//! together. Clone it or share it behind an `Arc`; there is no global
//! instance.

use std::sync::Arc;

use tracing::info;

use crate::acl::{AccessControlList, AclFactory};
use crate::config::{ModelVariant, SecurityConfig};
use crate::entity::{Group, Permission, Role, User};
use crate::error::{Result, SecurityError};
use crate::manager::{EntityManager, Managers, UserManager};
use crate::model::ModelManager;

#[derive(Debug, Clone)]
pub struct SecurityService {
    config: SecurityConfig,
    model: Arc<ModelManager>,
    acl_factory: AclFactory,
}

impl SecurityService {
    /// Validate `config` and build in-memory managers for it.
    pub fn new(config: SecurityConfig) -> Result<Self> {
        config.validate()?;
        let managers = Managers::in_memory(&config.password_hasher)?;
        Ok(Self::with_managers(config, managers))
    }

    /// Build a service over caller-supplied managers, e.g. a persistent
    /// backend. The config is not re-validated against the managers.
    pub fn with_managers(config: SecurityConfig, managers: Managers) -> Self {
        let model = Arc::new(ModelManager::new(config.model, managers));
        let acl_factory = AclFactory::new(Arc::clone(&model), config.global_group.clone());
        info!(
            model = %config.model,
            password_hasher = %config.password_hasher,
            "security service ready"
        );
        Self {
            config,
            model,
            acl_factory,
        }
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    pub fn variant(&self) -> ModelVariant {
        self.config.model
    }

    pub fn users(&self) -> &dyn UserManager {
        &*self.model.managers().users
    }

    pub fn groups(&self) -> &dyn EntityManager<Group> {
        &*self.model.managers().groups
    }

    pub fn roles(&self) -> &dyn EntityManager<Role> {
        &*self.model.managers().roles
    }

    pub fn permissions(&self) -> &dyn EntityManager<Permission> {
        &*self.model.managers().permissions
    }

    pub fn model(&self) -> &ModelManager {
        &self.model
    }

    pub fn acl_factory(&self) -> &AclFactory {
        &self.acl_factory
    }

    /// Compute a fresh ACL for `user`.
    pub fn acl(&self, user: &User) -> Result<AccessControlList> {
        self.acl_factory.compute(user)
    }

    /// The turbine global group, created on first use.
    pub fn global_group(&self) -> Result<Group> {
        if self.config.model != ModelVariant::Turbine {
            return Err(SecurityError::UnsupportedOperation {
                operation: "global_group",
                variant: self.config.model,
            });
        }
        let groups = self.groups();
        let name = &self.config.global_group;
        if groups.check_exists_name(name)? {
            groups.get_by_name(name)
        } else {
            groups.add(Group::new(name.as_str()))
        }
    }

    /// Revoke every edge of `user`, then delete it.
    pub fn remove_user(&self, user: &User) -> Result<()> {
        self.model.remove_user(user)
    }

    /// Revoke every edge of `group`, then delete it.
    pub fn remove_group(&self, group: &Group) -> Result<()> {
        self.model.remove_group(group)
    }

    /// Revoke every edge of `role`, then delete it.
    pub fn remove_role(&self, role: &Role) -> Result<()> {
        self.model.remove_role(role)
    }

    /// Revoke `permission` from every role, then delete it.
    pub fn remove_permission(&self, permission: &Permission) -> Result<()> {
        self.model.remove_permission(permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = SecurityConfig::default();
        config.password_hasher = "rot13".to_string();
        assert!(matches!(
            SecurityService::new(config),
            Err(SecurityError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_global_group_is_created_once() {
        let service = SecurityService::new(SecurityConfig::for_model(ModelVariant::Turbine)).unwrap();
        let first = service.global_group().unwrap();
        let second = service.global_group().unwrap();
        assert_eq!(first, second);
        assert_eq!(service.groups().all().unwrap().len(), 1);
    }

    #[test]
    fn test_global_group_requires_turbine() {
        let service = SecurityService::new(SecurityConfig::default()).unwrap();
        assert!(matches!(
            service.global_group(),
            Err(SecurityError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_remove_group_drops_edges_first() {
        let service = SecurityService::new(SecurityConfig::default()).unwrap();
        let bob = service.users().add_user(User::new("bob"), "pw").unwrap();
        let staff = service.groups().add(Group::new("staff")).unwrap();
        service.model().grant_user_group(&bob, &staff).unwrap();

        service.remove_group(&staff).unwrap();
        assert!(!service.groups().check_exists_name("staff").unwrap());
        assert!(service.model().groups_of(&bob).unwrap().is_empty());
        assert_eq!(service.model().graph_snapshot().unwrap().edge_count(), 0);
    }

    #[test]
    fn test_remove_role_in_basic_model() {
        let service = SecurityService::new(SecurityConfig::for_model(ModelVariant::Basic)).unwrap();
        let role = service.roles().add(Role::new("unused")).unwrap();
        service.remove_role(&role).unwrap();
        assert!(service.roles().all().unwrap().is_empty());
    }

    #[test]
    fn test_acl_through_service() {
        let service = SecurityService::new(SecurityConfig::default()).unwrap();
        let bob = service.users().add_user(User::new("bob"), "pw").unwrap();
        let staff = service.groups().add(Group::new("staff")).unwrap();
        let editor = service.roles().add(Role::new("editor")).unwrap();
        service.model().grant_user_group(&bob, &staff).unwrap();
        service.model().grant_group_role(&staff, &editor).unwrap();

        let acl = service.acl(&bob).unwrap();
        assert!(acl.has_role(&editor));
    }
}
