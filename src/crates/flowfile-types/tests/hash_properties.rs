//! Property tests for the content-addressing primitives (spec §3's
//! effective-hash cache key): determinism, sensitivity to input changes,
//! and order-sensitivity of `EffectiveHash::compose`.

use flowfile_types::{ContentHash, Digest, EffectiveHash, SettingsHash};
use proptest::prelude::*;

proptest! {
    #[test]
    fn digest_of_is_deterministic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        prop_assert_eq!(Digest::of(&bytes), Digest::of(&bytes));
    }

    #[test]
    fn digest_of_differs_for_different_input(
        a in prop::collection::vec(any::<u8>(), 1..64),
        b in prop::collection::vec(any::<u8>(), 1..64),
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(Digest::of(&a), Digest::of(&b));
    }

    #[test]
    fn settings_hash_is_sensitive_to_kind(kind_a in "[a-z_]{1,16}", kind_b in "[a-z_]{1,16}", bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        prop_assume!(kind_a != kind_b);
        let a = SettingsHash::compute(&kind_a, &bytes);
        let b = SettingsHash::compute(&kind_b, &bytes);
        prop_assert_ne!(a, b);
    }

    #[test]
    fn effective_hash_compose_is_deterministic(
        settings_bytes in prop::collection::vec(any::<u8>(), 0..32),
        upstream_bytes in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..16), 0..4),
    ) {
        let settings = SettingsHash::compute("select", &settings_bytes);
        let upstream: Vec<ContentHash> = upstream_bytes
            .iter()
            .map(|b| ContentHash(Digest::of(b)))
            .collect();
        let first = EffectiveHash::compose(settings, &upstream);
        let second = EffectiveHash::compose(settings, &upstream);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn effective_hash_compose_is_order_sensitive(
        settings_bytes in prop::collection::vec(any::<u8>(), 0..32),
        a in prop::collection::vec(any::<u8>(), 1..16),
        b in prop::collection::vec(any::<u8>(), 1..16),
    ) {
        prop_assume!(a != b);
        let settings = SettingsHash::compute("join", &settings_bytes);
        let forward = vec![ContentHash(Digest::of(&a)), ContentHash(Digest::of(&b))];
        let reversed = vec![ContentHash(Digest::of(&b)), ContentHash(Digest::of(&a))];
        prop_assert_ne!(
            EffectiveHash::compose(settings, &forward),
            EffectiveHash::compose(settings, &reversed)
        );
    }

    #[test]
    fn digest_hex_prefix_is_a_prefix_of_the_full_hex(bytes in prop::collection::vec(any::<u8>(), 0..64), n in 0usize..64) {
        let digest = Digest::of(&bytes);
        let full = digest.to_hex();
        let prefix = digest.hex_prefix(n);
        prop_assert!(full.starts_with(&prefix));
        prop_assert_eq!(prefix.len(), n.min(full.len()));
    }
}
