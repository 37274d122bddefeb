/// PROPERTY-BASED TESTS: state token round trip
///
/// Key invariants:
/// 1. Decoding a token restores exactly the state that was encoded
/// 2. A token only opens with the secret that sealed it
/// 3. Compression is invisible to the decoder

use proptest::prelude::*;
use serde_json::{json, Value};
use tether_shared::{CodecConfig, ComponentState, CompressionMode, StateCodec, StateMap};

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,24}".prop_map(Value::from),
        proptest::collection::vec(any::<i32>(), 0..5).prop_map(|items| json!(items)),
        Just(Value::Null),
    ]
}

fn state_strategy() -> impl Strategy<Value = ComponentState> {
    (
        proptest::collection::btree_map("[a-z][a-z0-9_]{0,10}", value_strategy(), 0..8),
        proptest::option::of("[a-z0-9]{1,8}"),
        proptest::collection::btree_set("[a-z]{1,6}", 0..4),
        any::<bool>(),
    )
        .prop_map(|(properties, key, touched, model_touched)| ComponentState {
            state: properties.into_iter().collect::<StateMap>(),
            key,
            touched,
            model_touched,
        })
}

fn codec(passphrase: &str, compression: CompressionMode) -> StateCodec {
    let mut config = CodecConfig::from_passphrase(passphrase);
    config.compression = compression;
    StateCodec::new(&config)
}

proptest! {
    /// decode(encode(state)) == state
    #[test]
    fn prop_round_trip_restores_state(state in state_strategy()) {
        let codec = codec("property-tests", CompressionMode::Disabled);
        let token = codec.encode(&state).unwrap();
        prop_assert_eq!(codec.decode(token.as_str()).unwrap(), state);
    }

    /// Compressed tokens open with a codec configured without compression
    #[test]
    fn prop_compression_is_transparent(state in state_strategy()) {
        let sealing = codec("property-tests", CompressionMode::Zstd { level: 3 });
        let opening = codec("property-tests", CompressionMode::Disabled);
        let token = sealing.encode(&state).unwrap();
        prop_assert_eq!(opening.decode(token.as_str()).unwrap(), state);
    }

    /// Another secret never opens the token
    #[test]
    fn prop_foreign_secret_is_rejected(
        state in state_strategy(),
        a in "[a-z]{8,16}",
        b in "[a-z]{8,16}",
    ) {
        prop_assume!(a != b);
        let token = codec(&a, CompressionMode::Disabled).encode(&state).unwrap();
        prop_assert!(codec(&b, CompressionMode::Disabled).decode(token.as_str()).is_err());
    }
}
