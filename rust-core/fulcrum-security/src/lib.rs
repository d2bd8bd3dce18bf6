// SPDX-License-Identifier: PMPL-1.0-or-later
//! Fulcrum Security
//!
//! Users, groups, roles and permissions, the grants between them, and
//! per-user access control lists computed from those grants.
//!
//! Three model variants share one API:
//!
//! - **basic**: users belong to groups.
//! - **dynamic**: users belong to groups, groups hold roles, roles hold
//!   permissions.
//! - **turbine**: a user holds a role *within* a group; roles hold
//!   permissions. One configured group acts as the global context.
//!
//! ```no_run
//! use fulcrum_security::{EntityManager, Group, SecurityConfig, SecurityService, User, UserManager};
//!
//! # fn main() -> fulcrum_security::Result<()> {
//! let service = SecurityService::new(SecurityConfig::default())?;
//! let bob = service.users().add_user(User::new("bob"), "secret")?;
//! let staff = service.groups().add(Group::new("staff"))?;
//! service.model().grant_user_group(&bob, &staff)?;
//! assert!(service.acl(&bob)?.has_group_name("staff"));
//! # Ok(())
//! # }
//! ```

pub mod acl;
pub mod config;
pub mod crypto;
pub mod entity;
pub mod error;
pub mod graph;
pub mod manager;
pub mod model;
pub mod service;
pub mod set;

pub use acl::{AccessControlList, AclFactory};
pub use config::{ModelVariant, SecurityConfig};
pub use crypto::{hasher_for, PasswordHasher};
pub use entity::{EntityId, EntityKind, Group, Permission, Role, SecurityEntity, User};
pub use error::{Result, SecurityError};
pub use graph::{Assignment, EntityGraph};
pub use manager::{EntityManager, InMemoryManager, InMemoryUserManager, Managers, UserManager};
pub use model::ModelManager;
pub use service::SecurityService;
pub use set::{GroupSet, PermissionSet, RoleSet, SecuritySet, UserSet};
