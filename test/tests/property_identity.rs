/// PROPERTY-BASED TESTS: component identity
///
/// Key invariants:
/// 1. An id depends only on parent, type and key, so every render agrees
/// 2. Siblings of one type with different keys never share an id
/// 3. Derived ids are valid on the wire

use proptest::prelude::*;
use tether_shared::{derive_id, is_already_rendered, placeholder, ComponentId};

fn parent_strategy() -> impl Strategy<Value = String> {
    "[0-9a-f]{32}"
}

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,15}"
}

proptest! {
    /// Deriving twice gives the same id
    #[test]
    fn prop_derivation_is_deterministic(
        parent in parent_strategy(),
        name in name_strategy(),
        key in proptest::option::of("[a-zA-Z0-9]{1,12}"),
    ) {
        let first = derive_id(&parent, &name, key.as_deref());
        let second = derive_id(&parent, &name, key.as_deref());
        prop_assert_eq!(first, second);
    }

    /// Different keys under one parent give different ids
    #[test]
    fn prop_keys_separate_siblings(
        parent in parent_strategy(),
        name in name_strategy(),
        a in "[a-z0-9]{1,12}",
        b in "[a-z0-9]{1,12}",
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(
            derive_id(&parent, &name, Some(&a)),
            derive_id(&parent, &name, Some(&b))
        );
    }

    /// The same type and key under different parents gives different ids
    #[test]
    fn prop_parents_separate_subtrees(
        a in parent_strategy(),
        b in parent_strategy(),
        name in name_strategy(),
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(derive_id(&a, &name, None), derive_id(&b, &name, None));
    }

    /// Derived ids parse back from the wire unchanged
    #[test]
    fn prop_derived_ids_are_wire_safe(
        parent in parent_strategy(),
        name in name_strategy(),
        key in proptest::option::of("[a-z0-9]{1,12}"),
    ) {
        let id = derive_id(&parent, &name, key.as_deref());
        prop_assert_eq!(id.as_str().len(), 33);
        prop_assert!(id.as_str().starts_with('W'));
        let parsed = ComponentId::try_from_wire(id.as_str()).unwrap();
        prop_assert_eq!(&parsed, &id);
    }

    /// A nested id the client reports is answered with a placeholder for it
    #[test]
    fn prop_reported_ids_are_already_rendered(
        parent in parent_strategy(),
        names in proptest::collection::vec(name_strategy(), 1..6),
    ) {
        let ids: Vec<ComponentId> = names.iter().map(|name| derive_id(&parent, name, None)).collect();
        for id in &ids {
            prop_assert!(is_already_rendered(id, &ids));
            let markup = placeholder(id);
            let expected = format!("id=\"{}\"", id);
            prop_assert!(markup.contains(&expected));
        }
        let stranger = derive_id(&parent, "stranger_type_name_", Some("x"));
        prop_assume!(!ids.contains(&stranger));
        prop_assert!(!is_already_rendered(&stranger, &ids));
    }
}
