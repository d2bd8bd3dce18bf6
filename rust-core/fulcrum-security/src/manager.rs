// SPDX-License-Identifier: PMPL-1.0-or-later
//! Entity managers.
//!
//! Managers own the entities themselves (names, ids, credentials). The model
//! manager only asks them whether an entity exists and resolves names to
//! ids. Persistent backends plug in by implementing [`EntityManager`] and
//! [`UserManager`]; this module ships the in-memory implementations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{info, warn};

use crate::crypto::{self, PasswordHasher};
use crate::entity::{EntityId, EntityKind, Group, Permission, Role, SecurityEntity, User};
use crate::error::{Result, SecurityError};
use crate::set::SecuritySet;

/// Storage-agnostic access to one kind of entity.
///
/// Existence and lookups are by case-insensitive name unless stated
/// otherwise. Backend failures surface as [`SecurityError::DataBackend`].
pub trait EntityManager<E: SecurityEntity>: Send + Sync {
    /// A new, unsaved entity. Nothing is stored.
    fn instance(&self, name: &str) -> E {
        E::from_name(name)
    }

    /// Store `entity` and return it with its assigned id.
    ///
    /// Fails with [`SecurityError::EntityExists`] if the name is taken and
    /// with [`SecurityError::InvalidName`] if it is blank.
    fn add(&self, entity: E) -> Result<E>;

    /// Replace the stored entity with the same name, keeping its id.
    fn save(&self, entity: &E) -> Result<()>;

    fn remove(&self, entity: &E) -> Result<()>;

    /// Rename a stored entity. Its id, and therefore its graph edges, are
    /// preserved.
    fn rename(&self, entity: &E, new_name: &str) -> Result<E>;

    fn check_exists(&self, entity: &E) -> Result<bool> {
        self.check_exists_name(entity.name())
    }

    fn check_exists_name(&self, name: &str) -> Result<bool>;

    /// Fails with [`SecurityError::UnknownEntity`] on a miss.
    fn get_by_name(&self, name: &str) -> Result<E>;

    /// Fails with [`SecurityError::UnknownEntity`] on a miss.
    fn get_by_id(&self, id: EntityId) -> Result<E>;

    fn all(&self) -> Result<SecuritySet<E>>;
}

/// User management: entity storage plus credentials.
pub trait UserManager: EntityManager<User> {
    /// Hash `password` and store the user.
    fn add_user(&self, user: User, password: &str) -> Result<User>;

    /// Check a clear-text password against the stored one.
    ///
    /// Fails with [`SecurityError::UnknownEntity`] if the user is not stored
    /// and [`SecurityError::PasswordMismatch`] if the password is wrong.
    fn authenticate(&self, user: &User, password: &str) -> Result<()>;

    /// Look a user up and authenticate in one call.
    fn get_user_with_password(&self, name: &str, password: &str) -> Result<User> {
        let user = self.get_by_name(name)?;
        self.authenticate(&user, password)?;
        Ok(user)
    }

    /// Replace the password after checking the old one.
    fn change_password(&self, user: &User, old_password: &str, new_password: &str) -> Result<()>;

    /// Replace the password without checking the old one.
    fn force_password(&self, user: &User, new_password: &str) -> Result<()>;
}

/// In-memory [`EntityManager`] backed by a [`SecuritySet`].
#[derive(Debug)]
pub struct InMemoryManager<E: SecurityEntity> {
    entities: RwLock<SecuritySet<E>>,
    next_id: AtomicU64,
}

impl<E: SecurityEntity> InMemoryManager<E> {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(SecuritySet::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, SecuritySet<E>>> {
        self.entities
            .read()
            .map_err(|_| SecurityError::backend(format!("{} store lock poisoned", E::KIND)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, SecuritySet<E>>> {
        self.entities
            .write()
            .map_err(|_| SecurityError::backend(format!("{} store lock poisoned", E::KIND)))
    }
}

impl<E: SecurityEntity> Default for InMemoryManager<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: SecurityEntity> EntityManager<E> for InMemoryManager<E> {
    fn add(&self, mut entity: E) -> Result<E> {
        if entity.name().trim().is_empty() {
            return Err(SecurityError::InvalidName(entity.name().to_string()));
        }
        let mut entities = self.write()?;
        if entities.contains(&entity) {
            return Err(SecurityError::EntityExists {
                kind: E::KIND,
                name: entity.name().to_string(),
            });
        }
        let id = EntityId(self.next_id.fetch_add(1, Ordering::Relaxed));
        entity.set_id(id);
        entities.add(entity.clone());
        info!(kind = %E::KIND, name = %entity.name(), id = %id, "entity added");
        Ok(entity)
    }

    fn save(&self, entity: &E) -> Result<()> {
        let mut entities = self.write()?;
        let stored_id = entities
            .get_by_name(entity.name())
            .and_then(SecurityEntity::id)
            .ok_or_else(|| SecurityError::unknown(E::KIND, entity.name()))?;
        let mut updated = entity.clone();
        updated.set_id(stored_id);
        entities.add(updated);
        Ok(())
    }

    fn remove(&self, entity: &E) -> Result<()> {
        let mut entities = self.write()?;
        if !entities.remove(entity) {
            return Err(SecurityError::unknown(E::KIND, entity.name()));
        }
        info!(kind = %E::KIND, name = %entity.name(), "entity removed");
        Ok(())
    }

    fn rename(&self, entity: &E, new_name: &str) -> Result<E> {
        if new_name.trim().is_empty() {
            return Err(SecurityError::InvalidName(new_name.to_string()));
        }
        let mut entities = self.write()?;
        let mut stored = entities
            .get_by_name(entity.name())
            .cloned()
            .ok_or_else(|| SecurityError::unknown(E::KIND, entity.name()))?;
        // A case-only rename keeps the same key and is allowed.
        if stored.key() != crate::entity::name_key(new_name) && entities.contains_name(new_name) {
            return Err(SecurityError::EntityExists {
                kind: E::KIND,
                name: new_name.to_string(),
            });
        }
        entities.remove(&stored);
        let old_name = stored.name().to_string();
        stored.set_name(new_name);
        entities.add(stored.clone());
        info!(kind = %E::KIND, from = %old_name, to = %new_name, "entity renamed");
        Ok(stored)
    }

    fn check_exists_name(&self, name: &str) -> Result<bool> {
        Ok(self.read()?.contains_name(name))
    }

    fn get_by_name(&self, name: &str) -> Result<E> {
        self.read()?
            .get_by_name(name)
            .cloned()
            .ok_or_else(|| SecurityError::unknown(E::KIND, name))
    }

    fn get_by_id(&self, id: EntityId) -> Result<E> {
        self.read()?
            .get_by_id(id)
            .cloned()
            .ok_or_else(|| SecurityError::unknown(E::KIND, format!("#{}", id)))
    }

    fn all(&self) -> Result<SecuritySet<E>> {
        Ok(self.read()?.clone())
    }
}

/// In-memory [`UserManager`] hashing passwords with a registry hasher.
pub struct InMemoryUserManager {
    store: InMemoryManager<User>,
    hasher: Box<dyn PasswordHasher>,
}

impl InMemoryUserManager {
    pub fn new(hasher: Box<dyn PasswordHasher>) -> Self {
        Self {
            store: InMemoryManager::new(),
            hasher,
        }
    }

    /// Build with a hasher looked up by registry name.
    pub fn with_hasher_name(name: &str) -> Result<Self> {
        Ok(Self::new(crypto::hasher_for(name)?))
    }

    /// Replace the stored user named like `user` under one write lock.
    /// `merge` sees the stored record and the replacement, which already
    /// carries the stored id.
    fn store_user<F>(&self, user: &User, merge: F) -> Result<()>
    where
        F: FnOnce(&User, &mut User),
    {
        let mut users = self.store.write()?;
        let stored = users
            .get_by_name(user.name())
            .cloned()
            .ok_or_else(|| SecurityError::unknown(EntityKind::User, user.name()))?;
        let id = stored.id().ok_or_else(|| {
            SecurityError::backend(format!("stored user '{}' has no id", stored.name()))
        })?;
        let mut updated = user.clone();
        updated.set_id(id);
        merge(&stored, &mut updated);
        users.add(updated);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryUserManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryUserManager")
            .field("store", &self.store)
            .field("hasher", &self.hasher.name())
            .finish()
    }
}

impl EntityManager<User> for InMemoryUserManager {
    fn add(&self, entity: User) -> Result<User> {
        self.store.add(entity)
    }

    /// Profile fields only. The stored password is kept; use
    /// [`UserManager::force_password`] to replace it.
    fn save(&self, entity: &User) -> Result<()> {
        self.store_user(entity, |stored, updated| {
            updated.set_password(stored.password());
        })
    }

    fn remove(&self, entity: &User) -> Result<()> {
        self.store.remove(entity)
    }

    fn rename(&self, entity: &User, new_name: &str) -> Result<User> {
        self.store.rename(entity, new_name)
    }

    fn check_exists_name(&self, name: &str) -> Result<bool> {
        self.store.check_exists_name(name)
    }

    fn get_by_name(&self, name: &str) -> Result<User> {
        self.store.get_by_name(name)
    }

    fn get_by_id(&self, id: EntityId) -> Result<User> {
        self.store.get_by_id(id)
    }

    fn all(&self) -> Result<SecuritySet<User>> {
        self.store.all()
    }
}

impl UserManager for InMemoryUserManager {
    fn add_user(&self, mut user: User, password: &str) -> Result<User> {
        user.set_password(self.hasher.hash(password));
        self.store.add(user)
    }

    fn authenticate(&self, user: &User, password: &str) -> Result<()> {
        let stored = self.store.get_by_name(user.name())?;
        if self.hasher.verify(password, stored.password()) {
            info!(user = %stored.name(), "authentication succeeded");
            Ok(())
        } else {
            warn!(user = %stored.name(), "authentication failed");
            Err(SecurityError::PasswordMismatch(stored.name().to_string()))
        }
    }

    fn change_password(&self, user: &User, old_password: &str, new_password: &str) -> Result<()> {
        self.authenticate(user, old_password)?;
        self.force_password(user, new_password)
    }

    fn force_password(&self, user: &User, new_password: &str) -> Result<()> {
        let hashed = self.hasher.hash(new_password);
        self.store_user(user, |stored, updated| {
            *updated = stored.clone();
            updated.set_password(hashed.as_str());
        })
    }
}

/// The four managers a model manager and ACL factory consult.
#[derive(Clone)]
pub struct Managers {
    pub users: Arc<dyn UserManager>,
    pub groups: Arc<dyn EntityManager<Group>>,
    pub roles: Arc<dyn EntityManager<Role>>,
    pub permissions: Arc<dyn EntityManager<Permission>>,
}

impl Managers {
    /// In-memory managers with the named password hasher.
    pub fn in_memory(password_hasher: &str) -> Result<Self> {
        Ok(Self {
            users: Arc::new(InMemoryUserManager::with_hasher_name(password_hasher)?),
            groups: Arc::new(InMemoryManager::<Group>::new()),
            roles: Arc::new(InMemoryManager::<Role>::new()),
            permissions: Arc::new(InMemoryManager::<Permission>::new()),
        })
    }
}

impl std::fmt::Debug for Managers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Managers").finish_non_exhaustive()
    }
}
