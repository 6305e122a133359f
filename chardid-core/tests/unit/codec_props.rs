//! Property coverage for the codec bijection.

use chardid_core::domain::codec::{decode_operation, encode_operation};
use chardid_core::domain::document::PURPOSE_MASK_ALL;
use chardid_core::domain::{
    CreateOp, Delta, KeyType, Operation, Patch, Proof, PublicKey, ServiceEndpoint, SingleReveal, UpdateOp, VerificationMethod,
};
use chardid_core::foundation::DidSuffix;
use proptest::collection::{btree_set, vec as prop_vec};
use proptest::prelude::*;

fn arb_key_type() -> impl Strategy<Value = KeyType> {
    prop_oneof![
        Just(KeyType::Ed25519),
        Just(KeyType::Secp256k1),
        Just(KeyType::P256),
        Just(KeyType::Bls12381G1),
    ]
}

fn arb_public_key() -> impl Strategy<Value = PublicKey> {
    (arb_key_type(), any::<u8>()).prop_map(|(key_type, byte)| {
        PublicKey::new(key_type, vec![byte; key_type.public_key_len()]).expect("key width")
    })
}

fn arb_id_set(max: usize) -> impl Strategy<Value = Vec<String>> {
    btree_set("[a-z][a-z0-9]{0,6}", 0..=max).prop_map(|set| set.into_iter().collect())
}

fn arb_methods() -> impl Strategy<Value = Vec<VerificationMethod>> {
    (arb_id_set(4), prop_vec((arb_public_key(), 0u8..=PURPOSE_MASK_ALL), 4)).prop_map(|(ids, pool)| {
        ids.into_iter()
            .zip(pool)
            .map(|(id, (key, purposes))| VerificationMethod { id, key, purposes })
            .collect()
    })
}

fn arb_services() -> impl Strategy<Value = Vec<ServiceEndpoint>> {
    (arb_id_set(3), prop_vec("[ -~]{0,40}", 3)).prop_map(|(ids, endpoints)| {
        ids.into_iter()
            .zip(endpoints)
            .map(|(id, endpoint)| ServiceEndpoint { id, service_type: "API".to_string(), endpoint })
            .collect()
    })
}

fn arb_patch() -> impl Strategy<Value = Patch> {
    prop_oneof![
        arb_methods().prop_map(Patch::AddKeys),
        arb_id_set(3).prop_map(Patch::RemoveKeys),
        arb_services().prop_map(Patch::AddServices),
        arb_id_set(3).prop_map(Patch::RemoveServices),
    ]
}

fn arb_create() -> impl Strategy<Value = Operation> {
    (any::<[u8; 32]>(), any::<[u8; 32]>(), any::<[u8; 32]>(), arb_methods(), arb_services()).prop_map(
        |(suffix_data_hash, update_commitment, recovery_commitment, verification_methods, services)| {
            Operation::Create(CreateOp {
                suffix_data_hash,
                update_commitment,
                recovery_commitment,
                threshold: None,
                verification_methods,
                services,
            })
        },
    )
}

fn arb_update() -> impl Strategy<Value = Operation> {
    (any::<[u8; 32]>(), arb_public_key(), any::<[u8; 32]>(), any::<[u8; 32]>(), prop_vec(arb_patch(), 0..4)).prop_map(
        |(suffix, key, reveal_value, new_update_commitment, patches)| {
            let signature = vec![0x5A; key.key_type.signature_len()];
            Operation::Update(UpdateOp {
                suffix: DidSuffix::new(suffix),
                proof: Proof::Single(SingleReveal { reveal_value, key, signature }),
                new_update_commitment,
                delta: Delta { patches },
            })
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_codec_round_trip_create(op in arb_create()) {
        let bytes = encode_operation(&op).expect("encode");
        let decoded = decode_operation(&bytes).expect("decode");
        prop_assert_eq!(&decoded, &op);
        prop_assert_eq!(encode_operation(&decoded).expect("re-encode"), bytes);
    }

    #[test]
    fn prop_codec_round_trip_update(op in arb_update()) {
        let bytes = encode_operation(&op).expect("encode");
        let decoded = decode_operation(&bytes).expect("decode");
        prop_assert_eq!(&decoded, &op);
        prop_assert_eq!(encode_operation(&decoded).expect("re-encode"), bytes);
    }

    /// Second half of the bijection: arbitrary bytes either fail to decode
    /// or re-encode to the identical byte string.
    #[test]
    fn prop_codec_accepts_only_canonical_bytes(bytes in prop_vec(any::<u8>(), 0..512)) {
        if let Ok(op) = decode_operation(&bytes) {
            prop_assert_eq!(encode_operation(&op).expect("re-encode"), bytes);
        }
    }

    /// Same property on byte strings that start with a plausible header,
    /// which reach much deeper into the decoder than fully random noise.
    #[test]
    fn prop_codec_accepts_only_canonical_bytes_with_header(
        op_type in 1u8..=4,
        flags in 0u8..=3,
        body in prop_vec(any::<u8>(), 0..256),
    ) {
        let mut bytes = vec![0x02, op_type, flags];
        bytes.extend_from_slice(&body);
        if let Ok(op) = decode_operation(&bytes) {
            prop_assert_eq!(encode_operation(&op).expect("re-encode"), bytes);
        }
    }
}
