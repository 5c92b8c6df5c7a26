use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Serialize to deterministic bincode bytes
pub fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CoreError> {
    bincode::serialize(value).map_err(|e| CoreError::Serialization(e.to_string()))
}

/// Deserialize from bincode bytes
pub fn from_bytes<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, CoreError> {
    bincode::deserialize(bytes).map_err(|e| CoreError::Deserialization(e.to_string()))
}

/// Serialize to a compact JSON string
pub fn to_json<T: Serialize>(value: &T) -> Result<String, CoreError> {
    serde_json::to_string(value).map_err(|e| CoreError::Serialization(e.to_string()))
}

/// Deserialize from JSON string
pub fn from_json<'a, T: Deserialize<'a>>(json: &'a str) -> Result<T, CoreError> {
    serde_json::from_str(json).map_err(|e| CoreError::Deserialization(e.to_string()))
}

/// Serde adapter for `Amount` fields of internally tagged enums.
///
/// Tagged enums are buffered before dispatch and the buffer has no `u128`.
/// Human-readable formats therefore carry amounts up to `u64::MAX` as
/// numbers and larger ones as decimal strings; both forms are accepted back.
/// Binary formats carry the raw `u128`.
pub mod amount {
    use std::fmt;

    use serde::de::{self, Unexpected, Visitor};
    use serde::{Deserializer, Serializer};

    use crate::types::Amount;

    pub fn serialize<S: Serializer>(value: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        if !serializer.is_human_readable() {
            return serializer.serialize_u128(*value);
        }
        match u64::try_from(*value) {
            Ok(small) => serializer.serialize_u64(small),
            Err(_) => serializer.collect_str(value),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(AmountVisitor)
        } else {
            deserializer.deserialize_u128(AmountVisitor)
        }
    }

    struct AmountVisitor;

    impl<'de> Visitor<'de> for AmountVisitor {
        type Value = Amount;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an unsigned integer or a decimal string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
            Ok(Amount::from(v))
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
            Amount::try_from(v).map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
            v.parse()
                .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Amount, Reserves};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "snake_case")]
    enum Tagged {
        Value {
            #[serde(with = "amount")]
            value: Amount,
        },
    }

    #[test]
    fn test_reserves_bincode_is_fixed_width() {
        let reserves = Reserves::new(1, u128::MAX);
        let bytes = to_bytes(&reserves).unwrap();
        assert_eq!(bytes.len(), 32);
        let recovered: Reserves = from_bytes(&bytes).unwrap();
        assert_eq!(recovered, reserves);
    }

    #[test]
    fn test_truncated_bytes_rejected() {
        let bytes = to_bytes(&Reserves::new(7, 8)).unwrap();
        let result: Result<Reserves, _> = from_bytes(&bytes[..10]);
        assert!(matches!(result, Err(CoreError::Deserialization(_))));
    }

    #[test]
    fn test_large_amounts_survive_json() {
        let reserves = Reserves::new(u128::MAX, 0);
        let json = to_json(&reserves).unwrap();
        let recovered: Reserves = from_json(&json).unwrap();
        assert_eq!(recovered, reserves);
    }

    #[test]
    fn test_tagged_amounts_survive_json() {
        for value in [0, 42, u64::MAX as Amount, u64::MAX as Amount + 1, Amount::MAX] {
            let tagged = Tagged::Value { value };
            let json = to_json(&tagged).unwrap();
            let recovered: Tagged = from_json(&json).unwrap();
            assert_eq!(recovered, tagged);
        }
    }

    #[test]
    fn test_tagged_amount_wire_forms() {
        let small = to_json(&Tagged::Value { value: 7 }).unwrap();
        assert_eq!(small, r#"{"kind":"value","value":7}"#);
        let large = to_json(&Tagged::Value { value: Amount::MAX }).unwrap();
        assert!(large.contains(&format!("\"{}\"", Amount::MAX)));

        let parsed: Tagged = from_json(r#"{"kind":"value","value":"1000"}"#).unwrap();
        assert_eq!(parsed, Tagged::Value { value: 1000 });
        assert!(from_json::<Tagged>(r#"{"kind":"value","value":-1}"#).is_err());
        assert!(from_json::<Tagged>(r#"{"kind":"value","value":"ten"}"#).is_err());
    }
}
