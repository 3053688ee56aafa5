//! Serde support for human-readable durations (`"30s"`, `"1m 30s"`).
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Foo {
//!     #[serde(with = "storefront_http::humantime_serde")]
//!     timeout: Duration,
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer, de};

/// Serializes a `Duration` as a humantime string.
///
/// # Errors
///
/// Propagates serializer errors.
pub fn serialize<S>(duration: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.collect_str(&humantime::format_duration(*duration))
}

/// Deserializes a `Duration` from a humantime string.
///
/// # Errors
///
/// Fails when the input is not a valid humantime duration.
pub fn deserialize<'de, D>(d: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(d)?;
    humantime::parse_duration(&raw).map_err(de::Error::custom)
}

/// Same as the parent module, for `Option<Duration>`.
pub mod option {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    /// Serializes an optional `Duration`; `None` becomes `null`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::ref_option)]
    pub fn serialize<S>(duration: &Option<Duration>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => s.collect_str(&humantime::format_duration(*d)),
            None => s.serialize_none(),
        }
    }

    /// Deserializes an optional `Duration`.
    ///
    /// # Errors
    ///
    /// Fails when a present value is not a valid humantime duration.
    pub fn deserialize<'de, D>(d: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|s| humantime::parse_duration(&s).map_err(de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Holder {
        #[serde(with = "super")]
        timeout: Duration,
        #[serde(with = "super::option", default)]
        idle: Option<Duration>,
    }

    #[test]
    fn parses_humantime_strings() {
        let h: Holder = serde_json::from_str(r#"{"timeout":"1m 30s","idle":"250ms"}"#).unwrap();
        assert_eq!(h.timeout, Duration::from_secs(90));
        assert_eq!(h.idle, Some(Duration::from_millis(250)));
    }

    #[test]
    fn null_option_is_none() {
        let h: Holder = serde_json::from_str(r#"{"timeout":"5s","idle":null}"#).unwrap();
        assert_eq!(h.idle, None);
    }

    #[test]
    fn rejects_bare_numbers_without_unit() {
        let r: Result<Holder, _> = serde_json::from_str(r#"{"timeout":"15"}"#);
        assert!(r.is_err());
    }

    #[test]
    fn serializes_back_to_humantime() {
        let h = Holder {
            timeout: Duration::from_secs(15),
            idle: None,
        };
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, r#"{"timeout":"15s","idle":null}"#);
    }
}
