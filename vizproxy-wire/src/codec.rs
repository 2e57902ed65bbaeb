//! Base binary serializer and the codec registry layered on top of it
//!
//! The base serializer only knows the native [`Value`] variants. A rich value
//! (`Value::Ext`) is handed to the first registered [`Codec`] whose predicate
//! accepts it. Tagged codecs write [`TAG_CUSTOM`] followed by their position in
//! the registry as a `u32`; the decoder reads that index and dispatches straight
//! to the codec at the same position of its own registry.
//!
//! Registration order is therefore part of the wire format. Host and worker
//! must build their registries with the identical sequence of `register` calls;
//! [`CodecRegistry::standard`] is the one sequence both sides use, and
//! [`CodecRegistry::verify_fingerprint`] lets a connection reject a peer whose
//! order differs before any value is exchanged.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_complex::Complex64;
use std::fmt;

use crate::error::WireError;
use crate::value::{Slice, Value};

pub const TAG_NONE: u8 = 0x01;
pub const TAG_TRUE: u8 = 0x02;
pub const TAG_FALSE: u8 = 0x03;
pub const TAG_INT: u8 = 0x04;
pub const TAG_FLOAT: u8 = 0x05;
pub const TAG_COMPLEX: u8 = 0x06;
pub const TAG_STR: u8 = 0x07;
pub const TAG_BYTES: u8 = 0x08;
pub const TAG_TUPLE: u8 = 0x09;
pub const TAG_FROZENSET: u8 = 0x0a;
pub const TAG_SLICE: u8 = 0x0b;
/// The single tag claimed by extension codecs
pub const TAG_CUSTOM: u8 = 0x1c;

/// Nesting limit for values on the wire, in both directions
pub const MAX_DEPTH: usize = 128;

/// How a codec puts its values on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// `TAG_CUSTOM`, the registry index, then the codec's payload
    Tagged,
    /// The codec re-expresses the value as some other value and never
    /// appears as an index on the wire
    Native,
}

/// One extension entry: predicate, encoder and decoder for a value family
pub trait Codec: Send + Sync {
    /// Stable name, part of the registry fingerprint
    fn name(&self) -> &'static str;

    fn representation(&self) -> Representation {
        Representation::Tagged
    }

    /// Whether this codec claims `value`
    fn accepts(&self, value: &Value, registry: &CodecRegistry) -> bool;

    /// Write the payload. For tagged codecs the header is already written.
    fn encode(&self, value: &Value, enc: &mut Encoder<'_>) -> Result<(), WireError>;

    /// Read the payload written by [`Codec::encode`]
    fn decode(&self, _dec: &mut Decoder<'_>) -> Result<Value, WireError> {
        Err(WireError::NoWireForm(self.name()))
    }
}

/// Immutable, ordered set of codecs
///
/// Built once per process and shared by reference (`Arc<CodecRegistry>`).
pub struct CodecRegistry {
    codecs: Vec<Box<dyn Codec>>,
}

/// Append-only builder for [`CodecRegistry`]
#[derive(Default)]
pub struct CodecRegistryBuilder {
    codecs: Vec<Box<dyn Codec>>,
}

impl CodecRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a codec; its index is the number of codecs registered before it
    pub fn register<C: Codec + 'static>(mut self, codec: C) -> Self {
        self.codecs.push(Box::new(codec));
        self
    }

    pub fn build(self) -> CodecRegistry {
        CodecRegistry {
            codecs: self.codecs,
        }
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("codecs", &self.fingerprint())
            .finish()
    }
}

impl CodecRegistry {
    pub fn builder() -> CodecRegistryBuilder {
        CodecRegistryBuilder::new()
    }

    /// Registry that only understands native values
    pub fn empty() -> Self {
        CodecRegistryBuilder::new().build()
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    pub fn codec(&self, index: u32) -> Option<&dyn Codec> {
        self.codecs.get(index as usize).map(|c| c.as_ref())
    }

    pub fn index_of(&self, name: &str) -> Option<u32> {
        self.codecs
            .iter()
            .position(|c| c.name() == name)
            .map(|i| i as u32)
    }

    /// Ordered codec names; two registries are wire compatible iff these match
    pub fn fingerprint(&self) -> Vec<String> {
        self.codecs.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn verify_fingerprint(&self, remote: &[String]) -> Result<(), WireError> {
        let local = self.fingerprint();
        if local.as_slice() == remote {
            Ok(())
        } else {
            Err(WireError::RegistryMismatch {
                local,
                remote: remote.to_vec(),
            })
        }
    }

    /// True iff the value is natively representable or a codec claims it.
    /// Remote references are never dumpable.
    pub fn dumpable(&self, value: &Value) -> bool {
        self.dumpable_within(value, MAX_DEPTH)
    }

    fn dumpable_within(&self, value: &Value, depth: usize) -> bool {
        if depth == 0 {
            return false;
        }
        let depth = depth - 1;
        match value {
            Value::Tuple(items) | Value::FrozenSet(items) => {
                items.iter().all(|item| self.dumpable_within(item, depth))
            }
            Value::Slice(s) => {
                self.dumpable_within(&s.start, depth)
                    && self.dumpable_within(&s.stop, depth)
                    && self.dumpable_within(&s.step, depth)
            }
            Value::Remote(_) => false,
            Value::Ext(_) => self.codecs.iter().any(|c| c.accepts(value, self)),
            _ => true,
        }
    }

    /// Append the encoding of `value` to `buf`.
    ///
    /// On failure `buf` is left exactly as it was.
    pub fn encode(&self, value: &Value, buf: &mut BytesMut) -> Result<(), WireError> {
        let start = buf.len();
        let result = Encoder::new(self, buf).encode(value);
        if result.is_err() {
            buf.truncate(start);
        }
        result
    }

    pub fn dumps(&self, value: &Value) -> Result<Bytes, WireError> {
        let mut buf = BytesMut::new();
        self.encode(value, &mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode exactly one value; trailing bytes are an error
    pub fn loads(&self, data: &[u8]) -> Result<Value, WireError> {
        let mut dec = Decoder::new(self, data);
        let value = dec.decode()?;
        dec.finish()?;
        Ok(value)
    }
}

/// Output side of the serializer, handed to codecs for nested values
pub struct Encoder<'a> {
    registry: &'a CodecRegistry,
    buf: &'a mut BytesMut,
    depth: usize,
}

impl<'a> Encoder<'a> {
    pub fn new(registry: &'a CodecRegistry, buf: &'a mut BytesMut) -> Self {
        Self {
            registry,
            buf,
            depth: 0,
        }
    }

    pub fn registry(&self) -> &'a CodecRegistry {
        self.registry
    }

    /// Run `f` one nesting level deeper; fails past [`MAX_DEPTH`]
    pub fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, WireError>,
    ) -> Result<T, WireError> {
        if self.depth >= MAX_DEPTH {
            return Err(WireError::Unencodable {
                value: format!("value nested deeper than {} levels", MAX_DEPTH),
                type_name: "tuple".to_string(),
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Encode a complete value, tag included
    pub fn encode(&mut self, value: &Value) -> Result<(), WireError> {
        self.nested(|enc| enc.encode_tagged(value))
    }

    fn encode_tagged(&mut self, value: &Value) -> Result<(), WireError> {
        match value {
            Value::None => self.buf.put_u8(TAG_NONE),
            Value::Bool(true) => self.buf.put_u8(TAG_TRUE),
            Value::Bool(false) => self.buf.put_u8(TAG_FALSE),
            Value::Int(i) => {
                self.buf.put_u8(TAG_INT);
                self.buf.put_i64_le(*i);
            }
            Value::Float(f) => {
                self.buf.put_u8(TAG_FLOAT);
                self.buf.put_f64_le(*f);
            }
            Value::Complex(c) => {
                self.buf.put_u8(TAG_COMPLEX);
                self.buf.put_f64_le(c.re);
                self.buf.put_f64_le(c.im);
            }
            Value::Str(s) => self.encode_str(s)?,
            Value::Bytes(b) => self.encode_bytes(b)?,
            Value::Tuple(items) => self.encode_seq(TAG_TUPLE, items)?,
            Value::FrozenSet(items) => self.encode_seq(TAG_FROZENSET, items)?,
            Value::Slice(s) => {
                self.buf.put_u8(TAG_SLICE);
                self.encode(&s.start)?;
                self.encode(&s.stop)?;
                self.encode(&s.step)?;
            }
            Value::Remote(_) => return Err(WireError::unencodable(value, value.type_name())),
            Value::Ext(_) => self.encode_extension(value)?,
        }
        Ok(())
    }

    pub fn encode_str(&mut self, s: &str) -> Result<(), WireError> {
        self.buf.put_u8(TAG_STR);
        self.put_len(s.len())?;
        self.buf.put_slice(s.as_bytes());
        Ok(())
    }

    pub fn encode_bytes(&mut self, data: &[u8]) -> Result<(), WireError> {
        self.buf.put_u8(TAG_BYTES);
        self.put_len(data.len())?;
        self.buf.put_slice(data);
        Ok(())
    }

    /// Encode a shape as a tuple of ints
    pub fn encode_shape(&mut self, shape: &[usize]) -> Result<(), WireError> {
        self.buf.put_u8(TAG_TUPLE);
        self.put_len(shape.len())?;
        for dim in shape {
            self.buf.put_u8(TAG_INT);
            self.buf.put_i64_le(*dim as i64);
        }
        Ok(())
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.put_u64_le(v);
    }

    /// Raw `u32` length prefix, as used by sequences
    pub fn put_len(&mut self, len: usize) -> Result<(), WireError> {
        let len = u32::try_from(len)
            .map_err(|_| WireError::InvalidMessage(format!("length {} exceeds u32", len)))?;
        self.buf.put_u32_le(len);
        Ok(())
    }

    fn encode_seq(&mut self, tag: u8, items: &[Value]) -> Result<(), WireError> {
        self.buf.put_u8(tag);
        self.put_len(items.len())?;
        for item in items {
            self.encode(item)?;
        }
        Ok(())
    }

    fn encode_extension(&mut self, value: &Value) -> Result<(), WireError> {
        let registry = self.registry;
        for (index, codec) in registry.codecs.iter().enumerate() {
            if !codec.accepts(value, registry) {
                continue;
            }
            if codec.representation() == Representation::Tagged {
                self.buf.put_u8(TAG_CUSTOM);
                self.buf.put_u32_le(index as u32);
            }
            return codec.encode(value, self);
        }
        Err(WireError::unencodable(value, value.type_name()))
    }
}

/// Input side of the serializer
pub struct Decoder<'a> {
    registry: &'a CodecRegistry,
    buf: &'a [u8],
    depth: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(registry: &'a CodecRegistry, buf: &'a [u8]) -> Self {
        Self {
            registry,
            buf,
            depth: 0,
        }
    }

    pub fn registry(&self) -> &'a CodecRegistry {
        self.registry
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Fails if any input is left over
    pub fn finish(&self) -> Result<(), WireError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(WireError::Decode(format!(
                "{} trailing bytes after value",
                self.buf.len()
            )))
        }
    }

    /// Run `f` one nesting level deeper; fails past [`MAX_DEPTH`]
    pub fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, WireError>,
    ) -> Result<T, WireError> {
        if self.depth >= MAX_DEPTH {
            return Err(WireError::Decode("value nested too deeply".to_string()));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Decode one complete value
    pub fn decode(&mut self) -> Result<Value, WireError> {
        self.nested(|dec| dec.decode_tagged())
    }

    fn decode_tagged(&mut self) -> Result<Value, WireError> {
        let tag = self.get_u8()?;
        let value = match tag {
            TAG_NONE => Value::None,
            TAG_TRUE => Value::Bool(true),
            TAG_FALSE => Value::Bool(false),
            TAG_INT => {
                self.need(8)?;
                Value::Int(self.buf.get_i64_le())
            }
            TAG_FLOAT => {
                self.need(8)?;
                Value::Float(self.buf.get_f64_le())
            }
            TAG_COMPLEX => {
                self.need(16)?;
                let re = self.buf.get_f64_le();
                let im = self.buf.get_f64_le();
                Value::Complex(Complex64::new(re, im))
            }
            TAG_STR => {
                let raw = self.get_len_prefixed()?;
                let s = std::str::from_utf8(raw)
                    .map_err(|e| WireError::Decode(format!("invalid utf-8 in str: {}", e)))?;
                Value::Str(s.to_string())
            }
            TAG_BYTES => Value::Bytes(self.get_len_prefixed()?.to_vec()),
            TAG_TUPLE => Value::Tuple(self.decode_seq()?),
            TAG_FROZENSET => Value::FrozenSet(self.decode_seq()?),
            TAG_SLICE => {
                let start = self.decode()?;
                let stop = self.decode()?;
                let step = self.decode()?;
                Value::Slice(Box::new(Slice { start, stop, step }))
            }
            TAG_CUSTOM => {
                let index = self.get_u32()?;
                let codec = self
                    .registry
                    .codec(index)
                    .ok_or(WireError::UnknownCodec(index))?;
                codec.decode(self)?
            }
            other => {
                return Err(WireError::Decode(format!("unknown tag 0x{:02x}", other)));
            }
        };
        Ok(value)
    }

    /// Decode a str value
    pub fn decode_string(&mut self) -> Result<String, WireError> {
        match self.decode()? {
            Value::Str(s) => Ok(s),
            other => Err(WireError::Decode(format!(
                "expected str, found {}",
                other.type_name()
            ))),
        }
    }

    /// Decode a bytes value
    pub fn decode_bytes(&mut self) -> Result<Vec<u8>, WireError> {
        match self.decode()? {
            Value::Bytes(b) => Ok(b),
            other => Err(WireError::Decode(format!(
                "expected bytes, found {}",
                other.type_name()
            ))),
        }
    }

    /// Decode a tuple of non-negative ints
    pub fn decode_shape(&mut self) -> Result<Vec<usize>, WireError> {
        let items = match self.decode()? {
            Value::Tuple(items) => items,
            other => {
                return Err(WireError::Decode(format!(
                    "expected shape tuple, found {}",
                    other.type_name()
                )))
            }
        };
        items
            .iter()
            .map(|item| match item {
                Value::Int(i) if *i >= 0 => Ok(*i as usize),
                other => Err(WireError::Decode(format!("invalid dimension {:?}", other))),
            })
            .collect()
    }

    pub fn get_u8(&mut self) -> Result<u8, WireError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn get_u32(&mut self) -> Result<u32, WireError> {
        self.need(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn get_u64(&mut self) -> Result<u64, WireError> {
        self.need(8)?;
        Ok(self.buf.get_u64_le())
    }

    fn decode_seq(&mut self) -> Result<Vec<Value>, WireError> {
        let count = self.get_u32()? as usize;
        // Every item takes at least one byte
        let mut items = Vec::with_capacity(count.min(self.buf.len()));
        for _ in 0..count {
            items.push(self.decode()?);
        }
        Ok(items)
    }

    fn get_len_prefixed(&mut self) -> Result<&'a [u8], WireError> {
        let len = self.get_u32()? as usize;
        self.need(len)?;
        let buf: &'a [u8] = self.buf;
        let (head, tail) = buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn need(&self, n: usize) -> Result<(), WireError> {
        if self.buf.len() < n {
            Err(WireError::Decode(format!(
                "truncated input: need {} bytes, have {}",
                n,
                self.buf.len()
            )))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Handle(u32);

    #[derive(Debug, PartialEq)]
    struct Celsius(f64);

    struct CelsiusCodec;

    impl Codec for CelsiusCodec {
        fn name(&self) -> &'static str {
            "celsius"
        }

        fn accepts(&self, value: &Value, _registry: &CodecRegistry) -> bool {
            value.downcast_ref::<Celsius>().is_some()
        }

        fn encode(&self, value: &Value, enc: &mut Encoder<'_>) -> Result<(), WireError> {
            let c = value
                .downcast_ref::<Celsius>()
                .ok_or_else(|| WireError::unencodable(value, value.type_name()))?;
            enc.encode(&Value::Float(c.0))
        }

        fn decode(&self, dec: &mut Decoder<'_>) -> Result<Value, WireError> {
            let v = dec.decode()?;
            let f = v
                .as_f64()
                .ok_or_else(|| WireError::Decode("expected float".to_string()))?;
            Ok(Value::ext(Celsius(f)))
        }
    }

    struct Kelvin;

    impl Codec for Kelvin {
        fn name(&self) -> &'static str {
            "kelvin"
        }

        fn accepts(&self, _value: &Value, _registry: &CodecRegistry) -> bool {
            false
        }

        fn encode(&self, _value: &Value, _enc: &mut Encoder<'_>) -> Result<(), WireError> {
            Ok(())
        }
    }

    #[test]
    fn test_native_values_round_trip() {
        let registry = CodecRegistry::empty();
        let value = Value::Tuple(vec![
            Value::None,
            Value::Bool(true),
            Value::Int(-7),
            Value::Float(2.5),
            Value::Complex(Complex64::new(1.0, -1.0)),
            Value::Str("héllo".to_string()),
            Value::bytes(vec![0u8, 255]),
            Value::FrozenSet(vec![Value::Int(1)]),
            Value::slice(1, Value::None, 2),
        ]);
        let bytes = registry.dumps(&value).unwrap();
        assert_eq!(registry.loads(&bytes).unwrap(), value);
    }

    #[test]
    fn test_custom_tag_carries_registry_index() {
        let registry = CodecRegistry::builder()
            .register(Kelvin)
            .register(CelsiusCodec)
            .build();
        let bytes = registry.dumps(&Value::ext(Celsius(21.5))).unwrap();
        assert_eq!(bytes[0], TAG_CUSTOM);
        assert_eq!(u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]), 1);
        assert_eq!(
            registry.loads(&bytes).unwrap(),
            Value::ext(Celsius(21.5))
        );
    }

    #[test]
    fn test_misordered_registry_fails_loudly() {
        let writer = CodecRegistry::builder()
            .register(Kelvin)
            .register(CelsiusCodec)
            .build();
        let reader = CodecRegistry::builder()
            .register(CelsiusCodec)
            .register(Kelvin)
            .build();
        let bytes = writer.dumps(&Value::ext(Celsius(1.0))).unwrap();
        assert!(matches!(reader.loads(&bytes), Err(WireError::NoWireForm("kelvin"))));
        assert!(matches!(
            reader.verify_fingerprint(&writer.fingerprint()),
            Err(WireError::RegistryMismatch { .. })
        ));

        let shorter = CodecRegistry::empty();
        assert!(matches!(shorter.loads(&bytes), Err(WireError::UnknownCodec(1))));
    }

    #[test]
    fn test_unknown_extension_is_not_dumpable() {
        let registry = CodecRegistry::builder().register(CelsiusCodec).build();
        let value = Value::ext(Handle(3));
        assert!(!registry.dumpable(&value));
        let err = registry.dumps(&value).unwrap_err();
        assert!(matches!(err, WireError::Unencodable { .. }));
        assert!(err.to_string().contains("Handle"));
    }

    #[test]
    fn test_remote_refs_are_never_dumpable() {
        let registry = CodecRegistry::empty();
        let remote = Value::Remote(crate::value::RemoteRef {
            id: 4,
            type_name: "Figure".to_string(),
        });
        assert!(!registry.dumpable(&remote));
        assert!(!registry.dumpable(&Value::Tuple(vec![Value::Int(1), remote.clone()])));
        assert!(registry.dumps(&remote).is_err());
    }

    #[test]
    fn test_failed_encode_leaves_buffer_untouched() {
        let registry = CodecRegistry::empty();
        let mut buf = BytesMut::from(&b"abc"[..]);
        let value = Value::Tuple(vec![Value::Int(1), Value::ext(Handle(1))]);
        assert!(registry.encode(&value, &mut buf).is_err());
        assert_eq!(&buf[..], b"abc");
    }

    #[test]
    fn test_truncated_input_is_an_error() {
        let registry = CodecRegistry::empty();
        let bytes = registry.dumps(&Value::Str("truncate me".to_string())).unwrap();
        let err = registry.loads(&bytes[..bytes.len() - 2]).unwrap_err();
        assert!(matches!(err, WireError::Decode(_)));
        assert!(registry.loads(&[0xff]).is_err());
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let registry = CodecRegistry::empty();
        let mut data = Vec::new();
        for _ in 0..(MAX_DEPTH + 1) {
            data.push(TAG_TUPLE);
            data.extend_from_slice(&1u32.to_le_bytes());
        }
        data.push(TAG_NONE);
        assert!(registry.loads(&data).is_err());
    }

    #[test]
    fn test_deep_values_are_not_dumped() {
        let registry = CodecRegistry::empty();
        let mut value = Value::None;
        for _ in 0..(MAX_DEPTH + 1) {
            value = Value::Tuple(vec![value]);
        }
        assert!(!registry.dumpable(&value));
        let err = registry.dumps(&value).unwrap_err();
        assert!(err.is_value_error());

        let mut shallow = Value::None;
        for _ in 0..(MAX_DEPTH - 1) {
            shallow = Value::Tuple(vec![shallow]);
        }
        assert!(registry.dumpable(&shallow));
        assert_eq!(registry.loads(&registry.dumps(&shallow).unwrap()).unwrap(), shallow);
    }
}
