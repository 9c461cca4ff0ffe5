//! Additive policy merge
//!
//! [`merge`] unions desired bindings into a policy without ever removing a
//! role or member. The result is independent of the order of the desired
//! bindings, and merging the same bindings twice changes nothing the second
//! time.

pub use reconflow_cloud::normalize_member;
use reconflow_cloud::{Binding, BindingKey, Policy};
use std::collections::{BTreeMap, BTreeSet};

type BindingMap = BTreeMap<BindingKey, BTreeSet<String>>;

/// Union `desired` into `current`
///
/// Returns the policy to submit (carrying `current`'s etag unchanged) and
/// whether any member or binding was added. `current` is not modified.
pub fn merge(current: &Policy, desired: &[Binding]) -> (Policy, bool) {
    let mut map = bindings_map(&current.bindings);
    let mut changed = false;

    for binding in desired {
        // An empty binding grants nothing.
        if binding.members.is_empty() {
            continue;
        }
        let members = map.entry(binding.key()).or_default();
        for member in &binding.members {
            changed |= members.insert(normalize_member(member));
        }
    }

    let policy = Policy {
        etag: current.etag.clone(),
        bindings: list_from_map(map),
        extra: current.extra.clone(),
    };
    (policy, changed)
}

/// Whether every desired member is already granted by `policy`
pub fn is_satisfied(policy: &Policy, desired: &[Binding]) -> bool {
    !merge(policy, desired).1
}

/// Flatten bindings so each (role, condition) appears once with combined members
pub fn merge_bindings(bindings: &[Binding]) -> Vec<Binding> {
    list_from_map(bindings_map(bindings))
}

fn bindings_map(bindings: &[Binding]) -> BindingMap {
    let mut map = BindingMap::new();
    for binding in bindings {
        map.entry(binding.key())
            .or_default()
            .extend(binding.members.iter().map(|m| normalize_member(m)));
    }
    map
}

fn list_from_map(map: BindingMap) -> Vec<Binding> {
    map.into_iter()
        .filter(|(_, members)| !members.is_empty())
        .map(|(key, members)| Binding {
            role: key.role,
            members,
            condition: key.condition,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconflow_cloud::Condition;
    use serde_json::json;

    fn viewer(members: &[&str]) -> Binding {
        Binding::new("viewer", members.iter().copied())
    }

    #[test]
    fn test_merge_into_empty_policy() {
        let current = Policy::new("e1");

        let (merged, changed) = merge(&current, &[viewer(&["user:a"])]);

        assert!(changed);
        assert_eq!(merged.bindings, vec![viewer(&["user:a"])]);
        assert_eq!(merged.etag, "e1");
    }

    #[test]
    fn test_already_present_is_unchanged() {
        let current = Policy::new("e1").with_binding(viewer(&["user:a"]));

        let (merged, changed) = merge(&current, &[viewer(&["user:a"])]);

        assert!(!changed);
        assert_eq!(merged.bindings, current.bindings);
        assert!(is_satisfied(&current, &[viewer(&["user:a"])]));
    }

    #[test]
    fn test_member_added_to_existing_role() {
        let current = Policy::new("e1").with_binding(viewer(&["user:a"]));

        let (merged, changed) = merge(&current, &[viewer(&["group:g"])]);

        assert!(changed);
        assert_eq!(merged.bindings, vec![viewer(&["user:a", "group:g"])]);
    }

    #[test]
    fn test_never_removes() {
        let current = Policy::new("e1")
            .with_binding(viewer(&["user:a", "user:b"]))
            .with_binding(Binding::new("owner", ["user:root"]));

        let (merged, changed) = merge(&current, &[viewer(&["user:c"])]);

        assert!(changed);
        assert!(merged.has_member("viewer", "user:a"));
        assert!(merged.has_member("viewer", "user:b"));
        assert!(merged.has_member("viewer", "user:c"));
        assert!(merged.has_member("owner", "user:root"));
    }

    #[test]
    fn test_input_policy_untouched() {
        let current = Policy::new("e1");
        let before = current.clone();
        let _ = merge(&current, &[viewer(&["user:a"])]);
        assert_eq!(current, before);
    }

    #[test]
    fn test_empty_desired_binding_has_no_effect() {
        let current = Policy::new("e1");
        let empty = Binding::new("viewer", Vec::<String>::new());

        let (merged, changed) = merge(&current, &[empty]);

        assert!(!changed);
        assert!(merged.bindings.is_empty());
    }

    #[test]
    fn test_order_independent() {
        let start = Policy::new("e1").with_binding(Binding::new("owner", ["user:root"]));
        let a = viewer(&["user:a"]);
        let b = Binding::new("editor", ["group:eng"]);
        let c = viewer(&["serviceAccount:ci@p.iam.gserviceaccount.com"]);

        let (step, _) = merge(&start, &[a.clone(), b.clone()]);
        let (left, _) = merge(&step, &[c.clone()]);

        let (step, _) = merge(&start, &[c, b]);
        let (right, _) = merge(&step, &[a]);

        assert_eq!(left, right);
    }

    #[test]
    fn test_idempotent() {
        let start = Policy::new("e1");
        let desired = [viewer(&["user:a"]), Binding::new("editor", ["user:b"])];

        let (once, changed_once) = merge(&start, &desired);
        let (twice, changed_twice) = merge(&once, &desired);

        assert!(changed_once);
        assert!(!changed_twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_conditional_binding_is_separate_key() {
        let cond = Condition::new("expires", "request.time < timestamp('2030-01-01T00:00:00Z')");
        let current = Policy::new("e1").with_binding(viewer(&["user:a"]));
        let conditional = viewer(&["user:a"]).with_condition(cond.clone());

        let (merged, changed) = merge(&current, &[conditional]);

        assert!(changed);
        assert_eq!(merged.bindings.len(), 2);
        assert!(
            merged
                .bindings
                .iter()
                .any(|b| b.condition.as_ref() == Some(&cond))
        );
    }

    #[test]
    fn test_member_casing() {
        assert_eq!(normalize_member("user:Alice@Example.com"), "user:alice@example.com");
        assert_eq!(normalize_member("allUsers"), "allUsers");
        assert_eq!(
            normalize_member("principalSet://iam.googleapis.com/Pools/X"),
            "principalSet://iam.googleapis.com/Pools/X"
        );
        assert_eq!(
            normalize_member("deleted:user:Bob@Example.com?uid=123"),
            "deleted:user:bob@example.com?uid=123"
        );
        assert_eq!(
            normalize_member("deleted:principal://Pools/X"),
            "deleted:principal://Pools/X"
        );
    }

    #[test]
    fn test_casing_difference_is_not_a_change() {
        let current = Policy::new("e1").with_binding(viewer(&["user:alice@example.com"]));

        let (_, changed) = merge(&current, &[viewer(&["user:Alice@Example.com"])]);

        assert!(!changed);
    }

    #[test]
    fn test_extra_fields_carried() {
        let mut current = Policy::new("e1");
        current.extra.insert("version".into(), json!(3));

        let (merged, _) = merge(&current, &[viewer(&["user:a"])]);

        assert_eq!(merged.extra.get("version"), Some(&json!(3)));
    }

    #[test]
    fn test_merge_bindings_flattens_duplicates() {
        let flat = merge_bindings(&[
            viewer(&["user:a"]),
            Binding::new("editor", ["user:b"]),
            viewer(&["user:c"]),
            Binding::new("empty", Vec::<String>::new()),
        ]);

        assert_eq!(
            flat,
            vec![
                Binding::new("editor", ["user:b"]),
                viewer(&["user:a", "user:c"]),
            ]
        );
    }
}
