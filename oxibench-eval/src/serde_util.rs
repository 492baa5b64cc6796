//! Serde adapters for values JSON cannot carry directly.

/// `f64` fields that may be infinite (PSNR of identical images, ratio of an
/// empty stream). Finite values stay numbers; the rest become `"inf"`,
/// `"-inf"` or `"nan"`.
pub mod float {
    use serde::de::{self, Deserializer, Visitor};
    use serde::ser::Serializer;
    use std::fmt;

    /// Serialize a possibly non-finite float.
    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if *value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    struct FloatVisitor;

    impl Visitor<'_> for FloatVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number or one of \"inf\", \"-inf\", \"nan\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }

    /// Deserialize a float written by [`serialize`].
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(FloatVisitor)
    }
}

/// Wavelet families by registry name.
pub mod wavelet {
    use oxibench_dwt::WaveletFamily;
    use serde::de::{self, Deserialize, Deserializer};
    use serde::ser::Serializer;

    /// Serialize a family as its name.
    pub fn serialize<S: Serializer>(family: &WaveletFamily, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(family.name())
    }

    /// Deserialize a family from its name.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<WaveletFamily, D::Error> {
        let name = String::deserialize(deserializer)?;
        WaveletFamily::from_name(&name).map_err(de::Error::custom)
    }
}

/// Durations as fractional seconds.
pub mod duration_secs {
    use serde::de::{self, Deserialize, Deserializer};
    use serde::ser::Serializer;
    use std::time::Duration;

    /// Serialize as seconds.
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    /// Deserialize from seconds.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "super::float")]
        value: f64,
    }

    #[test]
    fn test_non_finite_floats() {
        let json = serde_json::to_string(&Sample {
            value: f64::INFINITY,
        })
        .unwrap();
        assert_eq!(json, r#"{"value":"inf"}"#);
        let back: Sample = serde_json::from_str(&json).unwrap();
        assert_eq!(back.value, f64::INFINITY);

        let finite: Sample = serde_json::from_str(r#"{"value":31.5}"#).unwrap();
        assert_eq!(finite.value, 31.5);
        let integer: Sample = serde_json::from_str(r#"{"value":40}"#).unwrap();
        assert_eq!(integer.value, 40.0);
        assert!(serde_json::from_str::<Sample>(r#"{"value":"big"}"#).is_err());
    }
}
