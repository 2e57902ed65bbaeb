//! Request/reply protocol spoken over a proxy connection
//!
//! Every message starts with a kind byte and a sequence number. Values are
//! carried through a boxing layer: dumpable values are serialized, tuples
//! holding remote references are boxed element-wise, and references travel as
//! their object id plus type name.

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec::{CodecRegistry, Decoder, Encoder};
use crate::error::WireError;
use crate::value::{RemoteRef, Value};

/// Protocol version for proxy connections and readiness reports
pub const PROTOCOL_VERSION: u32 = 1;

/// Object id of the wrapped target in the worker's object table
pub const ROOT_OBJECT: u64 = 0;

const REQ_HELLO: u8 = 0x01;
const REQ_GETATTR: u8 = 0x02;
const REQ_SETATTR: u8 = 0x03;
const REQ_CALL: u8 = 0x04;
const REQ_RELEASE: u8 = 0x05;
const REQ_STOP: u8 = 0x06;

const REP_HELLO: u8 = 0x81;
const REP_VALUE: u8 = 0x82;
const REP_ERROR: u8 = 0x83;

const LABEL_VALUE: u8 = 0x01;
const LABEL_TUPLE: u8 = 0x02;
const LABEL_REMOTE_REF: u8 = 0x03;

/// Error raised by the wrapped target, carried back verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Error class, e.g. `AttributeError`
    pub kind: String,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RemoteError {}

/// Messages sent by the host
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// First request on every connection
    Hello {
        version: u32,
        codecs: Vec<String>,
        allow_public_attrs: bool,
    },
    GetAttr {
        object: u64,
        name: String,
    },
    SetAttr {
        object: u64,
        name: String,
        value: Value,
    },
    Call {
        object: u64,
        name: String,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        /// `false` for fire-and-forget calls
        reply: bool,
    },
    /// Drop an object from the worker's table
    Release {
        object: u64,
    },
    Stop,
}

impl Request {
    /// Whether the worker answers this request
    pub fn expects_reply(&self) -> bool {
        match self {
            Request::Call { reply, .. } => *reply,
            Request::Release { .. } | Request::Stop => false,
            _ => true,
        }
    }
}

/// Messages sent by the worker
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Hello { version: u32, codecs: Vec<String> },
    Value(Value),
    Error(RemoteError),
}

/// Envelope for out-of-band JSON messages (readiness reports)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    pub protocol_version: u32,
    pub timestamp: DateTime<Utc>,
    pub message: T,
}

impl<T> MessageEnvelope<T> {
    pub fn new(message: T) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            timestamp: Utc::now(),
            message,
        }
    }

    pub fn is_compatible(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
    }
}

/// Write a value through the boxing layer
pub fn box_value(enc: &mut Encoder<'_>, value: &Value) -> Result<(), WireError> {
    match value {
        Value::Remote(r) => {
            enc.put_u8(LABEL_REMOTE_REF);
            enc.put_u64(r.id);
            enc.encode_str(&r.type_name)
        }
        Value::Tuple(items) if !enc.registry().dumpable(value) => enc.nested(|enc| {
            enc.put_u8(LABEL_TUPLE);
            enc.put_len(items.len())?;
            for item in items {
                box_value(enc, item)?;
            }
            Ok(())
        }),
        _ => {
            enc.put_u8(LABEL_VALUE);
            enc.encode(value)
        }
    }
}

/// Read a value written by [`box_value`]
pub fn unbox_value(dec: &mut Decoder<'_>) -> Result<Value, WireError> {
    match dec.get_u8()? {
        LABEL_VALUE => dec.decode(),
        LABEL_TUPLE => dec.nested(|dec| {
            let count = dec.get_u32()? as usize;
            let mut items = Vec::with_capacity(count.min(dec.remaining()));
            for _ in 0..count {
                items.push(unbox_value(dec)?);
            }
            Ok(Value::Tuple(items))
        }),
        LABEL_REMOTE_REF => {
            let id = dec.get_u64()?;
            let type_name = dec.decode_string()?;
            Ok(Value::Remote(RemoteRef { id, type_name }))
        }
        other => Err(WireError::Decode(format!("unknown box label 0x{:02x}", other))),
    }
}

fn put_strings(enc: &mut Encoder<'_>, items: &[String]) -> Result<(), WireError> {
    enc.put_len(items.len())?;
    for item in items {
        enc.encode_str(item)?;
    }
    Ok(())
}

fn get_strings(dec: &mut Decoder<'_>) -> Result<Vec<String>, WireError> {
    let count = dec.get_u32()? as usize;
    let mut items = Vec::with_capacity(count.min(dec.remaining()));
    for _ in 0..count {
        items.push(dec.decode_string()?);
    }
    Ok(items)
}

/// Serialize a request. Nothing is produced if any value fails to encode.
pub fn encode_request(
    registry: &CodecRegistry,
    seq: u32,
    request: &Request,
) -> Result<BytesMut, WireError> {
    let mut buf = BytesMut::new();
    let mut enc = Encoder::new(registry, &mut buf);
    match request {
        Request::Hello {
            version,
            codecs,
            allow_public_attrs,
        } => {
            enc.put_u8(REQ_HELLO);
            enc.put_u32(seq);
            enc.put_u32(*version);
            put_strings(&mut enc, codecs)?;
            enc.put_u8(u8::from(*allow_public_attrs));
        }
        Request::GetAttr { object, name } => {
            enc.put_u8(REQ_GETATTR);
            enc.put_u32(seq);
            enc.put_u64(*object);
            enc.encode_str(name)?;
        }
        Request::SetAttr {
            object,
            name,
            value,
        } => {
            enc.put_u8(REQ_SETATTR);
            enc.put_u32(seq);
            enc.put_u64(*object);
            enc.encode_str(name)?;
            box_value(&mut enc, value)?;
        }
        Request::Call {
            object,
            name,
            args,
            kwargs,
            reply,
        } => {
            enc.put_u8(REQ_CALL);
            enc.put_u32(seq);
            enc.put_u64(*object);
            enc.encode_str(name)?;
            enc.put_u8(u8::from(*reply));
            enc.put_len(args.len())?;
            for arg in args {
                box_value(&mut enc, arg)?;
            }
            enc.put_len(kwargs.len())?;
            for (key, value) in kwargs {
                enc.encode_str(key)?;
                box_value(&mut enc, value)?;
            }
        }
        Request::Release { object } => {
            enc.put_u8(REQ_RELEASE);
            enc.put_u32(seq);
            enc.put_u64(*object);
        }
        Request::Stop => {
            enc.put_u8(REQ_STOP);
            enc.put_u32(seq);
        }
    }
    Ok(buf)
}

pub fn decode_request(registry: &CodecRegistry, data: &[u8]) -> Result<(u32, Request), WireError> {
    let mut dec = Decoder::new(registry, data);
    let kind = dec.get_u8()?;
    let seq = dec.get_u32()?;
    let request = match kind {
        REQ_HELLO => {
            let version = dec.get_u32()?;
            let codecs = get_strings(&mut dec)?;
            let allow_public_attrs = dec.get_u8()? != 0;
            Request::Hello {
                version,
                codecs,
                allow_public_attrs,
            }
        }
        REQ_GETATTR => Request::GetAttr {
            object: dec.get_u64()?,
            name: dec.decode_string()?,
        },
        REQ_SETATTR => Request::SetAttr {
            object: dec.get_u64()?,
            name: dec.decode_string()?,
            value: unbox_value(&mut dec)?,
        },
        REQ_CALL => {
            let object = dec.get_u64()?;
            let name = dec.decode_string()?;
            let reply = dec.get_u8()? != 0;
            let count = dec.get_u32()? as usize;
            let mut args = Vec::with_capacity(count.min(dec.remaining()));
            for _ in 0..count {
                args.push(unbox_value(&mut dec)?);
            }
            let count = dec.get_u32()? as usize;
            let mut kwargs = Vec::with_capacity(count.min(dec.remaining()));
            for _ in 0..count {
                let key = dec.decode_string()?;
                kwargs.push((key, unbox_value(&mut dec)?));
            }
            Request::Call {
                object,
                name,
                args,
                kwargs,
                reply,
            }
        }
        REQ_RELEASE => Request::Release {
            object: dec.get_u64()?,
        },
        REQ_STOP => Request::Stop,
        other => {
            return Err(WireError::InvalidMessage(format!(
                "unknown request kind 0x{:02x}",
                other
            )))
        }
    };
    dec.finish()?;
    Ok((seq, request))
}

/// Sequence number of a message whose body may not decode
pub fn peek_seq(data: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = data.get(1..5)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// Serialize a reply; like [`encode_request`] this is all or nothing
pub fn encode_reply(registry: &CodecRegistry, seq: u32, reply: &Reply) -> Result<BytesMut, WireError> {
    let mut buf = BytesMut::new();
    let mut enc = Encoder::new(registry, &mut buf);
    match reply {
        Reply::Hello { version, codecs } => {
            enc.put_u8(REP_HELLO);
            enc.put_u32(seq);
            enc.put_u32(*version);
            put_strings(&mut enc, codecs)?;
        }
        Reply::Value(value) => {
            enc.put_u8(REP_VALUE);
            enc.put_u32(seq);
            box_value(&mut enc, value)?;
        }
        Reply::Error(err) => {
            enc.put_u8(REP_ERROR);
            enc.put_u32(seq);
            enc.encode_str(&err.kind)?;
            enc.encode_str(&err.message)?;
        }
    }
    Ok(buf)
}

pub fn decode_reply(registry: &CodecRegistry, data: &[u8]) -> Result<(u32, Reply), WireError> {
    let mut dec = Decoder::new(registry, data);
    let kind = dec.get_u8()?;
    let seq = dec.get_u32()?;
    let reply = match kind {
        REP_HELLO => Reply::Hello {
            version: dec.get_u32()?,
            codecs: get_strings(&mut dec)?,
        },
        REP_VALUE => Reply::Value(unbox_value(&mut dec)?),
        REP_ERROR => Reply::Error(RemoteError {
            kind: dec.decode_string()?,
            message: dec.decode_string()?,
        }),
        other => {
            return Err(WireError::InvalidMessage(format!(
                "unknown reply kind 0x{:02x}",
                other
            )))
        }
    };
    dec.finish()?;
    Ok((seq, reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::NdArray;
    use ndarray::array;

    fn figure_ref() -> Value {
        Value::Remote(RemoteRef {
            id: 3,
            type_name: "Figure".to_string(),
        })
    }

    #[test]
    fn test_call_round_trip_with_boxed_references() {
        let registry = CodecRegistry::standard();
        let request = Request::Call {
            object: ROOT_OBJECT,
            name: "plot".to_string(),
            args: vec![
                Value::from(array![1.0f64, 2.0, 3.0]),
                Value::Tuple(vec![figure_ref(), Value::Int(2)]),
            ],
            kwargs: vec![("color".to_string(), Value::from("red"))],
            reply: true,
        };
        let bytes = encode_request(&registry, 9, &request).unwrap();
        assert_eq!(decode_request(&registry, &bytes).unwrap(), (9, request));
    }

    #[test]
    fn test_reply_round_trip() {
        let registry = CodecRegistry::standard();
        for reply in [
            Reply::Hello {
                version: PROTOCOL_VERSION,
                codecs: registry.fingerprint(),
            },
            Reply::Value(figure_ref()),
            Reply::Value(Value::ext(NdArray::from(array![[1u8, 2], [3, 4]]))),
            Reply::Error(RemoteError::new("AttributeError", "no attribute 'nope'")),
        ] {
            let bytes = encode_reply(&registry, 1, &reply).unwrap();
            assert_eq!(decode_reply(&registry, &bytes).unwrap(), (1, reply));
        }
    }

    #[test]
    fn test_unencodable_argument_fails_whole_message() {
        #[derive(Debug, PartialEq)]
        struct OpenFile;

        let registry = CodecRegistry::standard();
        let request = Request::Call {
            object: ROOT_OBJECT,
            name: "savefig".to_string(),
            args: vec![Value::ext(OpenFile)],
            kwargs: vec![],
            reply: true,
        };
        let err = encode_request(&registry, 1, &request).unwrap_err();
        assert!(err.to_string().contains("OpenFile"));
    }

    #[test]
    fn test_fire_and_forget_requests() {
        assert!(!Request::Stop.expects_reply());
        assert!(!Request::Release { object: 4 }.expects_reply());
        assert!(Request::GetAttr {
            object: 0,
            name: "x".into()
        }
        .expects_reply());
    }

    #[test]
    fn test_envelope_version() {
        let env = MessageEnvelope::new("ready");
        assert!(env.is_compatible());
        let json = serde_json::to_string(&env).unwrap();
        let back: MessageEnvelope<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.message, "ready");
    }

    #[test]
    fn test_peek_seq() {
        let registry = CodecRegistry::standard();
        let frame = encode_request(&registry, 41, &Request::Stop).unwrap();
        assert_eq!(peek_seq(&frame), Some(41));
        assert_eq!(peek_seq(&[0x04, 1, 0]), None);
    }

    #[test]
    fn test_deeply_boxed_tuples_are_rejected() {
        let registry = CodecRegistry::standard();
        let mut buf = BytesMut::new();
        let mut enc = Encoder::new(&registry, &mut buf);
        enc.put_u8(REQ_SETATTR);
        enc.put_u32(5);
        enc.put_u64(ROOT_OBJECT);
        enc.encode_str("data").unwrap();
        for _ in 0..100_000 {
            enc.put_u8(LABEL_TUPLE);
            enc.put_u32(1);
        }
        enc.put_u8(LABEL_VALUE);
        enc.encode(&Value::None).unwrap();

        let err = decode_request(&registry, &buf).unwrap_err();
        assert!(matches!(err, WireError::Decode(_)), "{:?}", err);
    }

    #[test]
    fn test_deeply_nested_references_are_not_boxed() {
        let registry = CodecRegistry::standard();
        let mut value = figure_ref();
        for _ in 0..(crate::codec::MAX_DEPTH + 1) {
            value = Value::Tuple(vec![value]);
        }
        let request = Request::SetAttr {
            object: ROOT_OBJECT,
            name: "data".to_string(),
            value,
        };
        let err = encode_request(&registry, 1, &request).unwrap_err();
        assert!(err.is_value_error(), "{:?}", err);

        let mut shallow = figure_ref();
        for _ in 0..8 {
            shallow = Value::Tuple(vec![shallow, Value::Int(1)]);
        }
        let request = Request::SetAttr {
            object: ROOT_OBJECT,
            name: "data".to_string(),
            value: shallow,
        };
        let bytes = encode_request(&registry, 2, &request).unwrap();
        assert_eq!(decode_request(&registry, &bytes).unwrap(), (2, request));
    }
}
