//! Subscription to systemd-networkd's `PropertiesChanged` signals.
//!
//! The broker only needs three things from the bus: a scope discriminator
//! derived from the interface string in the signal body, the subject object
//! path, and the changed-properties mapping. Signals that do not fit that
//! shape are dropped, never escalated.

mod error;
mod event;

use std::collections::HashMap;

pub use error::BusError;
pub use event::{
    DecodeError, EventScope, LINK_OBJECT_PREFIX, PropertyValue, StateEvent, link_index_from_path,
};
use futures::TryStreamExt;
use tracing::debug;
use zbus::{
    Connection, MatchRule, MessageStream,
    message::{Message, Type},
    zvariant::{OwnedValue, Value},
};

const NETWORKD_SERVICE: &str = "org.freedesktop.network1";
const LINK_INTERFACE: &str = "org.freedesktop.network1.Link";
const MANAGER_INTERFACE: &str = "org.freedesktop.network1.Manager";
const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
const PROPERTIES_CHANGED: &str = "PropertiesChanged";

/// An ordered stream of state-change notifications from systemd-networkd.
pub struct Subscription {
    stream: MessageStream,
}

impl Subscription {
    /// Connects to the system bus and installs a match for networkd's
    /// `PropertiesChanged` signals.
    pub async fn connect(capacity: usize) -> Result<Self, BusError> {
        let conn = Connection::system().await.map_err(BusError::Connect)?;

        let rule = MatchRule::builder()
            .msg_type(Type::Signal)
            .sender(NETWORKD_SERVICE)
            .map_err(BusError::MatchRule)?
            .interface(PROPERTIES_INTERFACE)
            .map_err(BusError::MatchRule)?
            .member(PROPERTIES_CHANGED)
            .map_err(BusError::MatchRule)?
            .build();

        let stream = MessageStream::for_match_rule(rule, &conn, Some(capacity))
            .await
            .map_err(BusError::Subscribe)?;

        Ok(Self { stream })
    }

    /// Yields the next well-formed state event.
    ///
    /// Malformed signals are dropped here; `None` means the bus connection
    /// is gone.
    pub async fn next_event(&mut self) -> Option<StateEvent> {
        loop {
            match self.stream.try_next().await {
                Ok(Some(msg)) => {
                    if let Some(event) = decode_signal(&msg) {
                        return Some(event);
                    }
                }
                Ok(None) => return None,
                Err(e) => {
                    debug!(
                        event.name = "bus.signal_dropped",
                        error = %e,
                        "dropping undecodable bus message"
                    );
                }
            }
        }
    }
}

/// Extracts a [`StateEvent`] from a `PropertiesChanged` signal, or `None`
/// when the message does not have the expected shape.
fn decode_signal(msg: &Message) -> Option<StateEvent> {
    let header = msg.header();
    let path = header.path()?.to_string();

    let body = msg.body();
    let (interface, changed, _invalidated) = body
        .deserialize::<(String, HashMap<String, OwnedValue>, Vec<String>)>()
        .ok()?;

    let scope = if interface.starts_with(LINK_INTERFACE) {
        EventScope::Link
    } else if interface.starts_with(MANAGER_INTERFACE) {
        EventScope::Manager
    } else {
        return None;
    };

    let properties = changed
        .into_iter()
        .map(|(key, value)| (key, property_value(&value)))
        .collect();

    Some(StateEvent {
        scope,
        path,
        properties,
    })
}

fn property_value(value: &Value<'_>) -> PropertyValue {
    match value {
        Value::Str(s) => PropertyValue::Str(s.as_str().to_string()),
        Value::U8(n) => PropertyValue::Num(i64::from(*n)),
        Value::I16(n) => PropertyValue::Num(i64::from(*n)),
        Value::U16(n) => PropertyValue::Num(i64::from(*n)),
        Value::I32(n) => PropertyValue::Num(i64::from(*n)),
        Value::U32(n) => PropertyValue::Num(i64::from(*n)),
        Value::I64(n) => PropertyValue::Num(*n),
        other => PropertyValue::Other(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use zbus::zvariant::Value;

    use super::{PropertyValue, property_value};

    #[test]
    fn strings_decode_without_quoting() {
        let value = Value::from("routable");
        assert_eq!(
            property_value(&value),
            PropertyValue::Str("routable".to_string())
        );
    }

    #[test]
    fn integers_decode_as_numbers() {
        assert_eq!(property_value(&Value::from(7u32)), PropertyValue::Num(7));
        assert_eq!(property_value(&Value::from(-3i32)), PropertyValue::Num(-3));
    }

    #[test]
    fn unhandled_shapes_fall_back_to_other() {
        let value = Value::from(true);
        assert!(matches!(property_value(&value), PropertyValue::Other(_)));
    }
}
