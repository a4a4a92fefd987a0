//! Property-based tests using proptest
//!
//! Digest and value-object invariants, plus reference counting checked
//! against a simple model over random retain/free sequences.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use proptest::prelude::*;

use tagstore::api::cache::{etag, parse_if_none_match};
use tagstore::application::blob_store::BlobStore;
use tagstore::domain::digest::{digest, verify, DigestWriter};
use tagstore::domain::value_objects::{ContentTag, MediaType, OwnerKey, MAX_POST_SLOTS};
use tagstore::infrastructure::persistence::MemoryStore;

/// Retain or free one of a small pool of payloads
#[derive(Debug, Clone)]
enum Op {
    Retain(usize),
    Free(usize),
}

fn op_strategy(pool: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..pool).prop_map(Op::Retain),
        (0..pool).prop_map(Op::Free),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    /// The same bytes always produce the same 64-character lowercase tag
    #[test]
    fn digest_is_deterministic_lowercase_hex(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let first = digest(&data);
        let second = digest(&data);

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.as_str().len(), 64);
        prop_assert!(first
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        prop_assert!(verify(&first, &data));
    }

    /// Distinct payloads produce distinct tags
    #[test]
    fn digest_separates_distinct_payloads(
        a in proptest::collection::vec(any::<u8>(), 0..256),
        b in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(digest(&a), digest(&b));
    }

    /// Chunked hashing matches one-shot hashing wherever the split falls
    #[test]
    fn digest_writer_matches_digest(
        data in proptest::collection::vec(any::<u8>(), 0..2048),
        split in any::<prop::sample::Index>(),
    ) {
        let at = split.index(data.len() + 1);
        let mut writer = DigestWriter::new();
        writer.update(&data[..at]);
        writer.update(&data[at..]);

        prop_assert_eq!(writer.total_bytes(), data.len() as u64);
        prop_assert_eq!(writer.finish(), digest(&data));
    }

    /// Tags parse case-insensitively and normalize to lowercase
    #[test]
    fn tag_parse_normalizes_case(hex in "[0-9a-fA-F]{64}") {
        let tag = ContentTag::parse(hex.clone()).unwrap();
        prop_assert_eq!(tag.as_str(), hex.to_ascii_lowercase());
    }

    /// Anything that is not exactly 64 hex characters is rejected
    #[test]
    fn tag_parse_rejects_wrong_length(hex in "[0-9a-f]{0,63}|[0-9a-f]{65,80}") {
        prop_assert!(ContentTag::parse(hex).is_err());
    }

    /// Every tag survives being sent back as an If-None-Match value
    #[test]
    fn etag_round_trips_through_if_none_match(data in proptest::collection::vec(any::<u8>(), 0..64)) {
        let tag = digest(&data);
        let condition = parse_if_none_match(&etag(&tag)).unwrap();
        prop_assert!(condition.matches(&tag));
    }

    /// Media type parameters never change the stored label
    #[test]
    fn media_type_ignores_parameters(charset in "[a-zA-Z0-9-]{1,16}") {
        let plain = MediaType::parse("text/plain").unwrap();
        let with_params = MediaType::parse(&format!("Text/Plain; charset={}", charset)).unwrap();
        prop_assert_eq!(plain, with_params);
    }

    /// Post data slots exist exactly for indices 0..MAX_POST_SLOTS
    #[test]
    fn post_slot_range(index in -10i32..200) {
        let valid = (0..MAX_POST_SLOTS).contains(&index);
        prop_assert_eq!(OwnerKey::post_data(1, index).is_ok(), valid);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// After any retain/free sequence the store holds exactly the payloads
    /// whose model count is positive, each with that count.
    #[test]
    fn ref_counts_follow_model(ops in proptest::collection::vec(op_strategy(4), 1..40)) {
        let payloads: Vec<Bytes> = (0..4)
            .map(|i| Bytes::from(format!("payload-{}", i)))
            .collect();

        let (model, memory) = runtime().block_on(async {
            let memory = MemoryStore::new();
            let store = BlobStore::new(Arc::new(memory.clone()));
            let mut model: HashMap<usize, i64> = HashMap::new();

            for op in &ops {
                match *op {
                    Op::Retain(i) => {
                        store.retain(payloads[i].clone()).await.unwrap();
                        *model.entry(i).or_default() += 1;
                    }
                    Op::Free(i) => {
                        store.free(&digest(&payloads[i])).await.unwrap();
                        if let Some(count) = model.get_mut(&i) {
                            *count -= 1;
                            if *count == 0 {
                                model.remove(&i);
                            }
                        }
                    }
                }
            }
            (model, memory)
        });

        let rt = runtime();
        prop_assert_eq!(rt.block_on(memory.entry_count()), model.len());
        for (i, payload) in payloads.iter().enumerate() {
            let stored = rt.block_on(memory.ref_count(&digest(payload)));
            prop_assert_eq!(stored, model.get(&i).copied());
        }
    }
}
