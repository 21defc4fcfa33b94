//! State-change events decoded from `PropertiesChanged` signals.
//!
//! Property values are decoded into [`PropertyValue`] once, at the bus
//! boundary. Everything downstream works on the already-tagged value and
//! never re-interprets the wire representation.

use std::{collections::HashMap, num::ParseIntError};

use thiserror::Error;

/// Object path prefix for link objects exposed by systemd-networkd.
///
/// networkd escapes the leading digit of the ifindex in the object path, so
/// ifindex 12 appears as `/org/freedesktop/network1/link/_312` (`_31` being
/// the escaped `'1'`). Stripping this prefix leaves the decimal index.
pub const LINK_OBJECT_PREFIX: &str = "/org/freedesktop/network1/link/_3";

/// Whether a notification pertains to one link or to networkd as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventScope {
    Link,
    Manager,
}

/// A property value as seen on the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Str(String),
    Num(i64),
    Other(String),
}

impl PropertyValue {
    /// String rendering handed to hook scripts.
    pub fn render(&self) -> String {
        match self {
            PropertyValue::Str(s) => s.clone(),
            PropertyValue::Num(n) => n.to_string(),
            PropertyValue::Other(s) => s.clone(),
        }
    }
}

/// A single state-change notification.
#[derive(Debug, Clone)]
pub struct StateEvent {
    pub scope: EventScope,
    /// D-Bus object path of the subject; encodes the ifindex for link scope.
    pub path: String,
    pub properties: HashMap<String, PropertyValue>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("'{0}' is not a link object path")]
    Shape(String),

    #[error("link object path '{path}' has a non-numeric index")]
    Index {
        path: String,
        #[source]
        source: ParseIntError,
    },
}

/// Decodes the interface index encoded in a link object path.
pub fn link_index_from_path(path: &str) -> Result<u32, DecodeError> {
    let suffix = path
        .strip_prefix(LINK_OBJECT_PREFIX)
        .ok_or_else(|| DecodeError::Shape(path.to_string()))?;

    suffix.parse::<u32>().map_err(|source| DecodeError::Index {
        path: path.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::{DecodeError, PropertyValue, link_index_from_path};

    #[test]
    fn decodes_single_digit_index() {
        assert_eq!(
            link_index_from_path("/org/freedesktop/network1/link/_32").unwrap(),
            2
        );
    }

    #[test]
    fn decodes_multi_digit_index() {
        assert_eq!(
            link_index_from_path("/org/freedesktop/network1/link/_312").unwrap(),
            12
        );
    }

    #[test]
    fn round_trips_every_encoded_index() {
        for index in [1u32, 7, 10, 99, 128, 65535] {
            let path = format!("/org/freedesktop/network1/link/_3{index}");
            assert_eq!(link_index_from_path(&path).unwrap(), index);
        }
    }

    #[test]
    fn rejects_paths_without_link_prefix() {
        let err = link_index_from_path("/org/freedesktop/network1/network/_31").unwrap_err();
        assert!(matches!(err, DecodeError::Shape(_)));
    }

    #[test]
    fn rejects_non_numeric_index() {
        let err = link_index_from_path("/org/freedesktop/network1/link/_3eth0").unwrap_err();
        assert!(matches!(err, DecodeError::Index { .. }));
    }

    #[test]
    fn rejects_empty_index() {
        let err = link_index_from_path("/org/freedesktop/network1/link/_3").unwrap_err();
        assert!(matches!(err, DecodeError::Index { .. }));
    }

    #[test]
    fn renders_values_for_script_environment() {
        assert_eq!(PropertyValue::Str("routable".into()).render(), "routable");
        assert_eq!(PropertyValue::Num(42).render(), "42");
        assert_eq!(PropertyValue::Other("(1, 2)".into()).render(), "(1, 2)");
    }
}
