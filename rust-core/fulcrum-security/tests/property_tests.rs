// SPDX-License-Identifier: PMPL-1.0-or-later
//! Property-based tests for sets and graph mutations

use std::collections::BTreeSet;

use fulcrum_security::{
    EntityManager, Group, GroupSet, ModelVariant, SecurityConfig, SecurityError, SecurityService,
    User, UserManager,
};
use proptest::prelude::*;

/// Generate arbitrary entity names
fn arb_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_]{0,8}"
}

/// Generate a batch of group names, possibly colliding case-insensitively
fn arb_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arb_name(), 0..20)
}

fn service_with_groups(variant: ModelVariant, count: usize) -> (SecurityService, User, Vec<Group>) {
    let service = SecurityService::new(SecurityConfig::for_model(variant)).unwrap();
    let user = service.users().add_user(User::new("bob"), "pw").unwrap();
    let groups = (0..count)
        .map(|i| service.groups().add(Group::new(format!("group{}", i))).unwrap())
        .collect();
    (service, user, groups)
}

proptest! {
    #[test]
    fn test_set_grows_by_distinct_names(names in arb_names()) {
        let mut set = GroupSet::new();
        for name in &names {
            set.add(Group::new(name.clone()));
        }

        let distinct: BTreeSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
        prop_assert_eq!(set.len(), distinct.len());
    }

    #[test]
    fn test_contains_name_ignores_case(names in arb_names(), probe in arb_name()) {
        let set: GroupSet = names.iter().map(|n| Group::new(n.clone())).collect();

        prop_assert_eq!(
            set.contains_name(&probe.to_uppercase()),
            set.contains_name(&probe.to_lowercase())
        );
        for name in &names {
            prop_assert!(set.contains_name(&name.to_uppercase()));
        }
    }

    #[test]
    fn test_retain_all_always_fails(names in arb_names(), keep in arb_names()) {
        let mut set: GroupSet = names.iter().map(|n| Group::new(n.clone())).collect();
        let keep: GroupSet = keep.iter().map(|n| Group::new(n.clone())).collect();
        let before = set.clone();

        let result = set.retain_all(&keep);
        prop_assert!(matches!(result, Err(SecurityError::Unsupported(_))));
        prop_assert_eq!(set, before);
    }

    #[test]
    fn test_grant_then_revoke_restores_graph(
        preset in prop::collection::vec(any::<bool>(), 4),
        target in 0usize..4
    ) {
        let (service, bob, groups) = service_with_groups(ModelVariant::Dynamic, 4);
        for (i, (group, granted)) in groups.iter().zip(&preset).enumerate() {
            if *granted && i != target {
                service.model().grant_user_group(&bob, group).unwrap();
            }
        }
        let before = service.model().graph_snapshot().unwrap();

        service.model().grant_user_group(&bob, &groups[target]).unwrap();
        service.model().revoke_user_group(&bob, &groups[target]).unwrap();

        prop_assert_eq!(service.model().graph_snapshot().unwrap(), before);
    }

    #[test]
    fn test_grant_is_idempotent(times in 1usize..5, target in 0usize..3) {
        let (service, bob, groups) = service_with_groups(ModelVariant::Basic, 3);

        service.model().grant_user_group(&bob, &groups[target]).unwrap();
        let once = service.model().graph_snapshot().unwrap();
        for _ in 0..times {
            service.model().grant_user_group(&bob, &groups[target]).unwrap();
        }

        prop_assert_eq!(service.model().graph_snapshot().unwrap(), once);
    }

    #[test]
    fn test_revoke_all_user_clears_both_directions(count in 3usize..8) {
        let (service, bob, groups) = service_with_groups(ModelVariant::Dynamic, count);
        for group in &groups {
            service.model().grant_user_group(&bob, group).unwrap();
        }

        service.model().revoke_all_user(&bob).unwrap();

        prop_assert!(service.model().groups_of(&bob).unwrap().is_empty());
        for group in &groups {
            prop_assert!(service.model().users_of(group).unwrap().is_empty());
        }
    }

    #[test]
    fn test_unknown_group_is_reported_and_changes_nothing(
        ghost in "ghost_[a-z]{1,6}",
        revoke in any::<bool>()
    ) {
        let (service, bob, groups) = service_with_groups(ModelVariant::Dynamic, 2);
        service.model().grant_user_group(&bob, &groups[0]).unwrap();
        let before = service.model().graph_snapshot().unwrap();

        let missing = Group::new(ghost.clone());
        let result = if revoke {
            service.model().revoke_user_group(&bob, &missing)
        } else {
            service.model().grant_user_group(&bob, &missing)
        };

        match result {
            Err(SecurityError::UnknownEntity { name, .. }) => prop_assert_eq!(name, ghost),
            other => prop_assert!(false, "expected unknown group, got {:?}", other),
        }
        prop_assert_eq!(service.model().graph_snapshot().unwrap(), before);
    }
}
