// SPDX-License-Identifier: PMPL-1.0-or-later
//! Security entities: users, groups, roles and permissions.
//!
//! Entities carry identity only (name, id and, for users, credentials).
//! Relationships between them are owned by the
//! [`EntityGraph`](crate::graph::EntityGraph), never by the entities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, ordered identifier assigned by an entity manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(raw: u64) -> Self {
        EntityId(raw)
    }
}

/// The four kinds of node in the security graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Group,
    Role,
    Permission,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::User => write!(f, "user"),
            EntityKind::Group => write!(f, "group"),
            EntityKind::Role => write!(f, "role"),
            EntityKind::Permission => write!(f, "permission"),
        }
    }
}

/// Common behaviour of everything that can live in a
/// [`SecuritySet`](crate::set::SecuritySet).
///
/// An entity without an id is an unsaved placeholder. Names compare
/// case-insensitively wherever entities are looked up.
pub trait SecurityEntity: Clone + fmt::Debug + Send + Sync + 'static {
    /// Kind tag used in errors and logs.
    const KIND: EntityKind;

    /// Build an unsaved entity with the given name.
    fn from_name(name: &str) -> Self;

    fn id(&self) -> Option<EntityId>;

    fn name(&self) -> &str;

    /// Assign the id handed out by a manager.
    fn set_id(&mut self, id: EntityId);

    fn set_name(&mut self, name: &str);

    /// Lower-cased name used as the lookup key.
    fn key(&self) -> String {
        name_key(self.name())
    }
}

/// Normalise a name for case-insensitive storage and lookup.
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

/// A permission is a leaf of the graph: a name and an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    id: Option<EntityId>,
    name: String,
}

impl Permission {
    /// Create an unsaved permission.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

impl SecurityEntity for Permission {
    const KIND: EntityKind = EntityKind::Permission;

    fn from_name(name: &str) -> Self {
        Permission::new(name)
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }
}

/// A role bundles permissions. Which permissions is recorded in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: Option<EntityId>,
    name: String,
}

impl Role {
    /// Create an unsaved role.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

impl SecurityEntity for Role {
    const KIND: EntityKind = EntityKind::Role;

    fn from_name(name: &str) -> Self {
        Role::new(name)
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }
}

/// A group of users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    id: Option<EntityId>,
    name: String,
}

impl Group {
    /// Create an unsaved group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

impl SecurityEntity for Group {
    const KIND: EntityKind = EntityKind::Group;

    fn from_name(name: &str) -> Self {
        Group::new(name)
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }
}

/// A user account.
///
/// The password is opaque to this crate: it is whatever the configured
/// [`PasswordHasher`](crate::crypto::PasswordHasher) produced.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: Option<EntityId>,
    name: String,
    #[serde(default)]
    password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

impl User {
    /// Create an unsaved user with an empty password.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            password: String::new(),
            first_name: None,
            last_name: None,
            email: None,
        }
    }

    pub fn with_first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self
    }

    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// The stored (possibly hashed) password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Replace the stored password. Callers pass an already-hashed value.
    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    pub fn first_name(&self) -> Option<&str> {
        self.first_name.as_deref()
    }

    pub fn last_name(&self) -> Option<&str> {
        self.last_name.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

impl SecurityEntity for User {
    const KIND: EntityKind = EntityKind::User;

    fn from_name(name: &str) -> Self {
        User::new(name)
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }
}
