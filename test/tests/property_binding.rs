/// PROPERTY-BASED TESTS: property binding
///
/// Key invariants:
/// 1. Binding the same value twice leaves the same result as binding once
/// 2. Form text of a number binds to that number
/// 3. An indexed path touches only the addressed item

use proptest::prelude::*;
use tether_server::{BindCx, Bindable, BindingError, Converters, WireValue};
use tether_shared::{PropertyPath, Segment};

fn bind<T: Bindable>(target: &mut T, raw_path: &str, value: &WireValue) -> Result<(), BindingError> {
    let converters = Converters::new();
    let path = PropertyPath::parse(raw_path).unwrap();
    let cx = BindCx::new(&converters, &path);
    target.bind(path.rest(), value, &cx)
}

proptest! {
    /// Rebinding a string is idempotent
    #[test]
    fn prop_string_binding_is_idempotent(initial in ".{0,12}", text in ".{0,24}") {
        let value = WireValue::Text(text.clone());
        let mut once = initial.clone();
        bind(&mut once, "name", &value).unwrap();
        let mut twice = initial;
        bind(&mut twice, "name", &value).unwrap();
        bind(&mut twice, "name", &value).unwrap();
        prop_assert_eq!(&once, &text);
        prop_assert_eq!(once, twice);
    }

    /// Numbers survive the trip through form text
    #[test]
    fn prop_number_text_binds_to_the_number(number in any::<i64>(), padding in " {0,2}") {
        let mut target = 0i64;
        bind(&mut target, "count", &WireValue::Text(format!("{padding}{number}{padding}"))).unwrap();
        prop_assert_eq!(target, number);
    }

    /// Every spelling of a boolean a form may send binds
    #[test]
    fn prop_boolean_spellings_bind(
        spelling in prop_oneof![
            Just(("true", true)), Just(("on", true)), Just(("1", true)),
            Just(("false", false)), Just(("off", false)), Just(("0", false)),
        ],
        upper in any::<bool>(),
    ) {
        let (text, expected) = spelling;
        let text = if upper { text.to_uppercase() } else { text.to_string() };
        let mut target = !expected;
        bind(&mut target, "subscribed", &WireValue::Text(text)).unwrap();
        prop_assert_eq!(target, expected);
    }

    /// items[i] replaces item i and nothing else, however often it is bound
    #[test]
    fn prop_indexed_binding_touches_one_item(
        items in proptest::collection::vec(any::<i32>(), 1..8),
        pick in any::<prop::sample::Index>(),
        number in any::<i32>(),
        repeats in 1usize..4,
    ) {
        let index = pick.index(items.len());
        let path = format!("items[{index}]");
        let value = WireValue::Text(number.to_string());

        let mut target = items.clone();
        for _ in 0..repeats {
            bind(&mut target, &path, &value).unwrap();
        }
        for (position, item) in target.iter().enumerate() {
            if position == index {
                prop_assert_eq!(*item, number);
            } else {
                prop_assert_eq!(*item, items[position]);
            }
        }
    }

    /// An index past the end fails and leaves the list as it was
    #[test]
    fn prop_out_of_range_index_changes_nothing(
        items in proptest::collection::vec(any::<i32>(), 0..6),
        beyond in 0usize..4,
    ) {
        let index = items.len() + beyond;
        let mut target = items.clone();
        let result = bind(&mut target, &format!("items[{index}]"), &WireValue::Text("7".into()));
        let out_of_range = matches!(result, Err(BindingError::IndexOutOfRange { .. }));
        prop_assert!(out_of_range);
        prop_assert_eq!(target, items);
    }

    /// Paths print back to what was parsed
    #[test]
    fn prop_paths_print_back(
        root in "[a-z][a-z0-9_]{0,8}",
        indices in proptest::collection::vec(0usize..100, 0..3),
        leaf in proptest::option::of("[a-z]{1,8}"),
    ) {
        let mut raw = root.clone();
        for index in &indices {
            raw.push_str(&format!("[{index}]"));
        }
        if let Some(leaf) = &leaf {
            raw.push('.');
            raw.push_str(leaf);
        }
        let path = PropertyPath::parse(&raw).unwrap();
        prop_assert_eq!(path.root(), root.as_str());
        prop_assert_eq!(path.to_string(), raw);
        let expected_len = 1 + indices.len() + usize::from(leaf.is_some());
        prop_assert_eq!(path.segments().len(), expected_len);
        prop_assert_eq!(&path.segments()[0], &Segment::Field(root));
    }
}
