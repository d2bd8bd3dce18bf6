// SPDX-License-Identifier: PMPL-1.0-or-later
//! Name- and id-keyed entity sets.
//!
//! A [`SecuritySet`] keeps its entities in two ordered maps: lower-cased name
//! to entity, and id to lower-cased name. Iteration is in name order, which
//! callers rely on when rendering or comparing sets.
//!
//! The set is typed per entity kind, so a [`RoleSet`] can only ever hold
//! roles. There is no intersection: [`SecuritySet::retain_all`] fails fast.

use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::entity::{name_key, EntityId, Group, Permission, Role, SecurityEntity, User};
use crate::error::{Result, SecurityError};

/// Ordered, de-duplicating collection of security entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    from = "Vec<E>",
    into = "Vec<E>",
    bound(
        serialize = "E: SecurityEntity + Serialize",
        deserialize = "E: SecurityEntity + Deserialize<'de>"
    )
)]
pub struct SecuritySet<E: SecurityEntity> {
    by_name: BTreeMap<String, E>,
    by_id: BTreeMap<EntityId, String>,
}

pub type PermissionSet = SecuritySet<Permission>;
pub type RoleSet = SecuritySet<Role>;
pub type GroupSet = SecuritySet<Group>;
pub type UserSet = SecuritySet<User>;

impl<E: SecurityEntity> SecuritySet<E> {
    pub fn new() -> Self {
        Self {
            by_name: BTreeMap::new(),
            by_id: BTreeMap::new(),
        }
    }

    /// Insert `entity`, replacing any entity with the same name.
    ///
    /// Returns `true` if no entity with this name was present before. If
    /// another entity already holds the same id under a different name, it
    /// is evicted so that ids stay unique.
    pub fn add(&mut self, entity: E) -> bool {
        let key = entity.key();
        let id = entity.id();

        if let Some(id) = id {
            if let Some(holder) = self.by_id.get(&id) {
                if *holder != key {
                    let holder = holder.clone();
                    self.by_name.remove(&holder);
                }
            }
        }

        let previous = self.by_name.insert(key.clone(), entity);
        if let Some(old_id) = previous.as_ref().and_then(SecurityEntity::id) {
            self.by_id.remove(&old_id);
        }
        if let Some(id) = id {
            self.by_id.insert(id, key);
        }
        previous.is_none()
    }

    /// Add every entity from `entities`. Returns `true` if any name was new.
    pub fn add_all<I>(&mut self, entities: I) -> bool
    where
        I: IntoIterator<Item = E>,
    {
        entities
            .into_iter()
            .fold(false, |changed, entity| self.add(entity) | changed)
    }

    /// Remove the entity whose name matches `entity`'s.
    pub fn remove(&mut self, entity: &E) -> bool {
        self.remove_name(entity.name())
    }

    /// Remove by (case-insensitive) name.
    pub fn remove_name(&mut self, name: &str) -> bool {
        match self.by_name.remove(&name_key(name)) {
            Some(removed) => {
                if let Some(id) = removed.id() {
                    self.by_id.remove(&id);
                }
                true
            }
            None => false,
        }
    }

    /// Remove every entity named in `entities`. Returns `true` if anything
    /// was removed.
    pub fn remove_all<'a, I>(&mut self, entities: I) -> bool
    where
        I: IntoIterator<Item = &'a E>,
    {
        entities
            .into_iter()
            .fold(false, |changed, entity| self.remove(entity) | changed)
    }

    /// Set intersection is not supported and always fails.
    ///
    /// The set is left untouched.
    pub fn retain_all(&mut self, _keep: &SecuritySet<E>) -> Result<bool> {
        Err(SecurityError::Unsupported("retain_all"))
    }

    /// Membership by name.
    pub fn contains(&self, entity: &E) -> bool {
        self.contains_name(entity.name())
    }

    /// Case-insensitive name membership. An empty name is never contained.
    pub fn contains_name(&self, name: &str) -> bool {
        !name.is_empty() && self.by_name.contains_key(&name_key(name))
    }

    /// Id membership. `None` is never contained.
    pub fn contains_id(&self, id: Option<EntityId>) -> bool {
        id.map_or(false, |id| self.by_id.contains_key(&id))
    }

    pub fn get_by_name(&self, name: &str) -> Option<&E> {
        if name.is_empty() {
            return None;
        }
        self.by_name.get(&name_key(name))
    }

    pub fn get_by_id(&self, id: EntityId) -> Option<&E> {
        self.by_id.get(&id).and_then(|key| self.by_name.get(key))
    }

    /// Entities in name order.
    pub fn iter(&self) -> Iter<'_, E> {
        Iter {
            inner: self.by_name.values(),
        }
    }

    /// Display names in name order.
    pub fn names(&self) -> Vec<String> {
        self.iter().map(|e| e.name().to_string()).collect()
    }

    /// Ids of all saved entities, in id order.
    pub fn ids(&self) -> Vec<EntityId> {
        self.by_id.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_name.clear();
        self.by_id.clear();
    }
}

impl<E: SecurityEntity> Default for SecuritySet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: SecurityEntity + PartialEq> PartialEq for SecuritySet<E> {
    fn eq(&self, other: &Self) -> bool {
        self.by_name == other.by_name
    }
}

impl<E: SecurityEntity + Eq> Eq for SecuritySet<E> {}

/// Name-ordered iterator over a [`SecuritySet`].
pub struct Iter<'a, E> {
    inner: btree_map::Values<'a, String, E>,
}

impl<'a, E> Iterator for Iter<'a, E> {
    type Item = &'a E;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, E> ExactSizeIterator for Iter<'a, E> {}

impl<'a, E: SecurityEntity> IntoIterator for &'a SecuritySet<E> {
    type Item = &'a E;
    type IntoIter = Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<E: SecurityEntity> IntoIterator for SecuritySet<E> {
    type Item = E;
    type IntoIter = btree_map::IntoValues<String, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.by_name.into_values()
    }
}

impl<E: SecurityEntity> FromIterator<E> for SecuritySet<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let mut set = SecuritySet::new();
        set.add_all(iter);
        set
    }
}

impl<E: SecurityEntity> Extend<E> for SecuritySet<E> {
    fn extend<I: IntoIterator<Item = E>>(&mut self, iter: I) {
        self.add_all(iter);
    }
}

impl<E: SecurityEntity> From<Vec<E>> for SecuritySet<E> {
    fn from(entities: Vec<E>) -> Self {
        entities.into_iter().collect()
    }
}

impl<E: SecurityEntity> From<SecuritySet<E>> for Vec<E> {
    fn from(set: SecuritySet<E>) -> Self {
        set.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved<E: SecurityEntity>(mut entity: E, id: u64) -> E {
        entity.set_id(EntityId(id));
        entity
    }

    #[test]
    fn test_iteration_is_name_ordered() {
        let mut set = PermissionSet::new();
        set.add(saved(Permission::new("write"), 1));
        set.add(saved(Permission::new("Admin"), 2));
        set.add(saved(Permission::new("read"), 3));

        assert_eq!(set.names(), vec!["Admin", "read", "write"]);
    }

    #[test]
    fn test_add_reports_new_names_only() {
        let mut set = RoleSet::new();
        assert!(set.add(saved(Role::new("editor"), 1)));
        assert!(!set.add(saved(Role::new("EDITOR"), 1)));
        assert_eq!(set.len(), 1);
        // Last write wins on the stored display name.
        assert_eq!(set.names(), vec!["EDITOR"]);
    }

    #[test]
    fn test_readd_with_new_id_replaces_id_mapping() {
        let mut set = GroupSet::new();
        set.add(saved(Group::new("staff"), 1));
        set.add(saved(Group::new("staff"), 9));

        assert!(!set.contains_id(Some(EntityId(1))));
        assert!(set.contains_id(Some(EntityId(9))));
        assert_eq!(set.get_by_id(EntityId(9)).map(|g| g.name()), Some("staff"));
    }

    #[test]
    fn test_id_collision_evicts_previous_holder() {
        let mut set = GroupSet::new();
        set.add(saved(Group::new("staff"), 1));
        set.add(saved(Group::new("renamed"), 1));

        assert_eq!(set.len(), 1);
        assert!(!set.contains_name("staff"));
        assert_eq!(set.get_by_id(EntityId(1)).map(|g| g.name()), Some("renamed"));
    }

    #[test]
    fn test_contains_name_is_case_insensitive() {
        let mut set = PermissionSet::new();
        set.add(saved(Permission::new("Publish"), 4));

        assert!(set.contains_name("publish"));
        assert!(set.contains_name("PUBLISH"));
        assert!(set.get_by_name("pUbLiSh").is_some());
    }

    #[test]
    fn test_empty_name_and_missing_id_never_match() {
        let mut set = PermissionSet::new();
        set.add(Permission::new(""));

        assert_eq!(set.len(), 1);
        assert!(!set.contains_name(""));
        assert!(!set.contains_id(None));
        assert!(set.get_by_name("").is_none());
    }

    #[test]
    fn test_unsaved_placeholder_has_no_id_entry() {
        let mut set = UserSet::new();
        set.add(User::new("pending"));
        assert!(set.contains_name("pending"));
        assert!(set.ids().is_empty());
    }

    #[test]
    fn test_remove_and_remove_all() {
        let mut set: RoleSet = vec![
            saved(Role::new("a"), 1),
            saved(Role::new("b"), 2),
            saved(Role::new("c"), 3),
        ]
        .into();

        assert!(set.remove(&Role::new("A")));
        assert!(!set.remove(&Role::new("a")));
        assert!(!set.contains_id(Some(EntityId(1))));

        let doomed = vec![Role::new("b"), Role::new("zzz")];
        assert!(set.remove_all(&doomed));
        assert_eq!(set.names(), vec!["c"]);
        assert!(!set.remove_all(&doomed));
    }

    #[test]
    fn test_add_all_is_union() {
        let mut left: PermissionSet = vec![saved(Permission::new("read"), 1)].into();
        let right: PermissionSet = vec![
            saved(Permission::new("read"), 1),
            saved(Permission::new("write"), 2),
        ]
        .into();

        assert!(left.add_all(right.clone()));
        assert_eq!(left, right);
        assert!(!left.add_all(right));
    }

    #[test]
    fn test_retain_all_is_unsupported() {
        let mut set: PermissionSet = vec![saved(Permission::new("read"), 1)].into();
        let other = PermissionSet::new();

        let err = set.retain_all(&other).unwrap_err();
        assert!(matches!(err, SecurityError::Unsupported("retain_all")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_serde_roundtrip_preserves_order() {
        let set: GroupSet = vec![
            saved(Group::new("zeta"), 2),
            saved(Group::new("alpha"), 1),
        ]
        .into();

        let json = serde_json::to_string(&set).unwrap();
        assert!(json.find("alpha").unwrap() < json.find("zeta").unwrap());

        let parsed: GroupSet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, set);
        assert!(parsed.contains_id(Some(EntityId(2))));
    }
}
