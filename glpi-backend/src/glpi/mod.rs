//! GLPI webservices plugin: wire codec, client and typed shapes.

pub mod client;
pub mod methods;
pub mod types;
pub mod xmlrpc;

pub use client::{GlpiClient, RemoteGateway, RpcError};
pub use methods::GlpiMethod;
pub use xmlrpc::Value;

use crate::error::GatewayError;
use serde::Deserialize;
use serde::de::{self, Deserializer, Unexpected, Visitor};
use std::collections::BTreeMap;
use types::LoginInfo;

/// Parameters of one call: members of the single XML-RPC struct argument
pub type Params = BTreeMap<String, Value>;

/// Build call parameters from `(name, value)` pairs
pub fn params<I, K, V>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Decode a successful payload into a typed shape. A struct shape only
/// accepts a struct payload; serde alone would fill one from an array.
pub fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, GatewayError> {
    T::deserialize(StrictPayload(value.into_json()))
        .map_err(|e| GatewayError::Decode(e.to_string()))
}

/// Top-level payload that refuses to deserialize a struct from anything but
/// an object. Nested values keep serde_json's rules.
struct StrictPayload(serde_json::Value);

fn unexpected(json: &serde_json::Value) -> Unexpected<'_> {
    use serde_json::Value as Json;
    match json {
        Json::Null => Unexpected::Unit,
        Json::Bool(b) => Unexpected::Bool(*b),
        Json::Number(_) => Unexpected::Other("number"),
        Json::String(s) => Unexpected::Str(s),
        Json::Array(_) => Unexpected::Seq,
        Json::Object(_) => Unexpected::Map,
    }
}

macro_rules! delegate {
    ($($method:ident)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                self.0.$method(visitor)
            }
        )*
    };
}

impl<'de> Deserializer<'de> for StrictPayload {
    type Error = serde_json::Error;

    delegate! {
        deserialize_any deserialize_bool
        deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
        deserialize_f32 deserialize_f64 deserialize_char
        deserialize_str deserialize_string deserialize_bytes deserialize_byte_buf
        deserialize_option deserialize_unit deserialize_seq deserialize_map
        deserialize_identifier deserialize_ignored_any
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.0.deserialize_unit_struct(name, visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.0.deserialize_newtype_struct(name, visitor)
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.0.deserialize_tuple(len, visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.0.deserialize_tuple_struct(name, len, visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.0.deserialize_enum(name, variants, visitor)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        if !self.0.is_object() {
            return Err(de::Error::invalid_type(unexpected(&self.0), &visitor));
        }
        self.0.deserialize_struct(name, fields, visitor)
    }
}

/// Log in with GLPI user credentials. Runs without a session.
pub async fn connect(
    gateway: &dyn RemoteGateway,
    login_name: &str,
    login_password: &str,
) -> Result<LoginInfo, GatewayError> {
    let params = params([("login_name", login_name), ("login_password", login_password)]);
    match gateway.call(GlpiMethod::DoLogin, params).await {
        Ok(value) => decode(value),
        Err(RpcError::Fault { code, message }) => {
            log::error!("GLPI: FaultCode: {}, FaultString: {}", code, message);
            Err(GatewayError::Rejected { code, message })
        }
        Err(RpcError::Transport(msg)) => {
            log::error!("GLPI: login transport error: {}", msg);
            Err(GatewayError::Transport(msg))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ok_json;
    use serde_json::json;
    use types::{List, Ticket, TicketCount};

    fn payload(json: serde_json::Value) -> Value {
        ok_json(json).unwrap()
    }

    #[test]
    fn test_struct_shape_needs_struct_payload() {
        let err = decode::<Ticket>(payload(json!(["not", "a", "ticket"]))).unwrap_err();
        assert!(matches!(err, GatewayError::Decode(ref m) if m.contains("sequence")), "{}", err);

        assert!(matches!(
            decode::<TicketCount>(payload(json!("12"))),
            Err(GatewayError::Decode(_))
        ));
        assert!(decode::<TicketCount>(payload(json!({"count": "12"}))).is_ok());
    }

    #[test]
    fn test_list_and_scalar_shapes_still_decode() {
        let tickets: List<Ticket> = decode(payload(json!([{"id": "1"}, {"id": "2"}]))).unwrap();
        assert_eq!(tickets.0.len(), 2);
        assert!(decode::<bool>(payload(json!(true))).unwrap());
    }
}
