//! Property-based tests for the container codec.

use emma_crypto::{derive_key, KdfParams, Salt};
use emma_format::{decode, encode, FormatError};
use emma_store::{MemoryMetadata, RecordStore};
use proptest::prelude::*;

fn params() -> KdfParams {
    KdfParams::fast_insecure()
}

fn content_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[\\x20-\\x7E]{1,200}").unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any store built from valid mutations survives an encode/decode
    /// round trip under the passphrase that derived the key.
    #[test]
    fn roundtrip_for_arbitrary_contents(
        contents in prop::collection::vec(content_strategy(), 0..8),
        passphrase in "[a-zA-Z0-9 ]{8,40}",
    ) {
        let mut store = RecordStore::new();
        for content in contents {
            store
                .add_memory(content, MemoryMetadata::default(), vec![])
                .unwrap();
        }

        let salt = Salt::random();
        let key = derive_key(&passphrase, &salt, &params());
        let bytes = encode(&store, &salt, &key).unwrap();
        let decoded = decode(&bytes, &passphrase, &params()).unwrap();

        prop_assert_eq!(decoded.records, store);
    }

    /// A passphrase that differs in any way fails authentication.
    #[test]
    fn wrong_passphrase_never_decodes(
        passphrase in "[a-z]{8,20}",
        wrong in "[A-Z]{8,20}",
    ) {
        let store = RecordStore::new();
        let salt = Salt::random();
        let key = derive_key(&passphrase, &salt, &params());
        let bytes = encode(&store, &salt, &key).unwrap();

        let result = decode(&bytes, &wrong, &params());
        prop_assert!(matches!(result, Err(FormatError::Authentication)));
    }
}
