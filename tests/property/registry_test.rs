// tests/property/registry_test.rs

//! Property-based tests for registry invariants
//! Tests that groups exist iff non-empty and usernames stay unique

use crate::test_helpers::TestHub;
use proptest::prelude::*;
use relaychat::core::hub::HubEvent;
use relaychat::core::state::{GroupRegistry, SessionRegistry};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
enum GroupOp {
    Join(u64, String),
    Leave(u64, String),
    RemoveEverywhere(u64),
}

fn group_op() -> impl Strategy<Value = GroupOp> {
    let id = 1u64..=4;
    let group = prop::sample::select(vec!["a", "b", "c"]).prop_map(String::from);
    prop_oneof![
        (id.clone(), group.clone()).prop_map(|(id, g)| GroupOp::Join(id, g)),
        (id.clone(), group).prop_map(|(id, g)| GroupOp::Leave(id, g)),
        id.prop_map(GroupOp::RemoveEverywhere),
    ]
}

#[derive(Debug, Clone)]
enum SessionOp {
    Register(u64, String),
    Remove(u64),
}

fn session_op() -> impl Strategy<Value = SessionOp> {
    let id = 1u64..=6;
    let name = prop::sample::select(vec!["alice", "bob", "carol", "Alice"]).prop_map(String::from);
    prop_oneof![
        3 => (id.clone(), name).prop_map(|(id, n)| SessionOp::Register(id, n)),
        1 => id.prop_map(SessionOp::Remove),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 500,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_groups_exist_iff_non_empty(ops in prop::collection::vec(group_op(), 1..60)) {
        let mut groups = GroupRegistry::new();
        let mut model: HashMap<String, HashSet<u64>> = HashMap::new();

        for op in ops {
            match op {
                GroupOp::Join(id, g) => {
                    let expected_ok = model.entry(g.clone()).or_default().insert(id);
                    prop_assert_eq!(groups.join(&g, id).is_ok(), expected_ok);
                }
                GroupOp::Leave(id, g) => {
                    let expected_ok = model.get_mut(&g).is_some_and(|m| m.remove(&id));
                    prop_assert_eq!(groups.leave(&g, id).is_ok(), expected_ok);
                }
                GroupOp::RemoveEverywhere(id) => {
                    for members in model.values_mut() {
                        members.remove(&id);
                    }
                    groups.remove_everywhere(id);
                }
            }
            model.retain(|_, members| !members.is_empty());

            prop_assert_eq!(groups.len(), model.len());
            for (name, members) in &model {
                prop_assert_eq!(groups.members(name), Some(members));
            }
            for name in groups.names() {
                prop_assert!(groups.members(name).is_some_and(|m| !m.is_empty()));
            }
        }
    }

    #[test]
    fn test_usernames_stay_unique(ops in prop::collection::vec(session_op(), 1..60)) {
        let mut sessions = SessionRegistry::new();

        for op in ops {
            match op {
                SessionOp::Register(id, name) => {
                    let taken = sessions.lookup(&name).is_some();
                    let named = sessions.is_registered(id);
                    let result = sessions.register(id, &name);
                    prop_assert_eq!(result.is_ok(), !taken && !named);
                }
                SessionOp::Remove(id) => {
                    let name = sessions.username(id).map(str::to_string);
                    prop_assert_eq!(sessions.remove(id), name);
                }
            }

            let ids: Vec<u64> = sessions.ids().collect();
            let names: HashSet<&str> = ids.iter().filter_map(|id| sessions.username(*id)).collect();
            prop_assert_eq!(names.len(), ids.len());
            for id in ids {
                let name = sessions.username(id).unwrap();
                prop_assert_eq!(sessions.lookup(name), Some(id));
            }
        }
    }

    #[test]
    fn test_hub_cleanup_keeps_groups_consistent(ops in prop::collection::vec(group_op(), 1..40)) {
        let mut t = TestHub::new();
        t.login_all(&[(1, "u1"), (2, "u2"), (3, "u3"), (4, "u4")]);

        for op in ops {
            match op {
                GroupOp::Join(id, g) => t.send(id, &format!("/join {g}")),
                GroupOp::Leave(id, g) => t.send(id, &format!("/leave {g}")),
                GroupOp::RemoveEverywhere(id) => t.hub.handle_event(HubEvent::Closed { id }),
            }

            let groups = t.hub.groups();
            let names: Vec<String> = groups.names().map(String::from).collect();
            for name in names {
                let members = groups.members(&name).unwrap();
                prop_assert!(!members.is_empty());
                for id in members {
                    prop_assert!(t.hub.sessions().is_registered(*id));
                }
            }
        }
    }
}
