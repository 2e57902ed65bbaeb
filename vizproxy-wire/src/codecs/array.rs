//! N-dimensional arrays and numeric scalars
//!
//! A homogeneous array travels as `(shape, dtype name, raw bytes)`: the shape
//! is a tuple of ints, the dtype one of the names in [`DType`], and the buffer
//! the flattened data in row-major order, little-endian. Object arrays carry
//! their shape followed by every element encoded on its own.

use half::{bf16, f16};
use ndarray::{Array, ArrayD, Dimension, IxDyn};
use num_complex::{Complex32, Complex64};
use std::fmt;

use crate::codec::{Codec, CodecRegistry, Decoder, Encoder, Representation};
use crate::error::WireError;
use crate::value::Value;

/// Element type vocabulary shared by both ends of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    BFloat16,
    Float32,
    Float64,
    /// Two `f32` components
    Complex64,
    /// Two `f64` components
    Complex128,
    Object,
}

impl DType {
    pub const NUMERIC: [DType; 15] = [
        DType::Bool,
        DType::Int8,
        DType::Int16,
        DType::Int32,
        DType::Int64,
        DType::UInt8,
        DType::UInt16,
        DType::UInt32,
        DType::UInt64,
        DType::Float16,
        DType::BFloat16,
        DType::Float32,
        DType::Float64,
        DType::Complex64,
        DType::Complex128,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::UInt8 => "uint8",
            DType::UInt16 => "uint16",
            DType::UInt32 => "uint32",
            DType::UInt64 => "uint64",
            DType::Float16 => "float16",
            DType::BFloat16 => "bfloat16",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Complex64 => "complex64",
            DType::Complex128 => "complex128",
            DType::Object => "object",
        }
    }

    pub fn from_name(name: &str) -> Option<DType> {
        if name == "object" {
            return Some(DType::Object);
        }
        DType::NUMERIC.iter().copied().find(|d| d.name() == name)
    }

    /// Bytes per element; `None` for object arrays
    pub fn item_size(self) -> Option<usize> {
        match self {
            DType::Bool | DType::Int8 | DType::UInt8 => Some(1),
            DType::Int16 | DType::UInt16 | DType::Float16 | DType::BFloat16 => Some(2),
            DType::Int32 | DType::UInt32 | DType::Float32 => Some(4),
            DType::Int64 | DType::UInt64 | DType::Float64 | DType::Complex64 => Some(8),
            DType::Complex128 => Some(16),
            DType::Object => None,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element types with a fixed little-endian byte form
pub trait Element: Clone + Send + Sync + 'static {
    const DTYPE: DType;

    fn wrap(array: ArrayD<Self>) -> NdArray;
    fn view(array: &NdArray) -> Option<&ArrayD<Self>>;
    fn write_le(&self, out: &mut Vec<u8>);
    /// `raw` holds exactly one element
    fn read_le(raw: &[u8]) -> Self;
}

/// An owned n-dimensional array of any supported dtype
#[derive(Debug, Clone, PartialEq)]
pub enum NdArray {
    Bool(ArrayD<bool>),
    Int8(ArrayD<i8>),
    Int16(ArrayD<i16>),
    Int32(ArrayD<i32>),
    Int64(ArrayD<i64>),
    UInt8(ArrayD<u8>),
    UInt16(ArrayD<u16>),
    UInt32(ArrayD<u32>),
    UInt64(ArrayD<u64>),
    Float16(ArrayD<f16>),
    BFloat16(ArrayD<bf16>),
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
    Complex64(ArrayD<Complex32>),
    Complex128(ArrayD<Complex64>),
    Object(ArrayD<Value>),
}

macro_rules! le_element {
    ($t:ty, $variant:ident, $size:literal) => {
        impl Element for $t {
            const DTYPE: DType = DType::$variant;

            fn wrap(array: ArrayD<Self>) -> NdArray {
                NdArray::$variant(array)
            }

            fn view(array: &NdArray) -> Option<&ArrayD<Self>> {
                match array {
                    NdArray::$variant(a) => Some(a),
                    _ => None,
                }
            }

            fn write_le(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(raw: &[u8]) -> Self {
                let mut bytes = [0u8; $size];
                bytes.copy_from_slice(&raw[..$size]);
                <$t>::from_le_bytes(bytes)
            }
        }
    };
}

le_element!(i8, Int8, 1);
le_element!(i16, Int16, 2);
le_element!(i32, Int32, 4);
le_element!(i64, Int64, 8);
le_element!(u8, UInt8, 1);
le_element!(u16, UInt16, 2);
le_element!(u32, UInt32, 4);
le_element!(u64, UInt64, 8);
le_element!(f16, Float16, 2);
le_element!(bf16, BFloat16, 2);
le_element!(f32, Float32, 4);
le_element!(f64, Float64, 8);

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn wrap(array: ArrayD<Self>) -> NdArray {
        NdArray::Bool(array)
    }

    fn view(array: &NdArray) -> Option<&ArrayD<Self>> {
        match array {
            NdArray::Bool(a) => Some(a),
            _ => None,
        }
    }

    fn write_le(&self, out: &mut Vec<u8>) {
        out.push(*self as u8);
    }

    fn read_le(raw: &[u8]) -> Self {
        raw[0] != 0
    }
}

impl Element for Complex32 {
    const DTYPE: DType = DType::Complex64;

    fn wrap(array: ArrayD<Self>) -> NdArray {
        NdArray::Complex64(array)
    }

    fn view(array: &NdArray) -> Option<&ArrayD<Self>> {
        match array {
            NdArray::Complex64(a) => Some(a),
            _ => None,
        }
    }

    fn write_le(&self, out: &mut Vec<u8>) {
        self.re.write_le(out);
        self.im.write_le(out);
    }

    fn read_le(raw: &[u8]) -> Self {
        Complex32::new(f32::read_le(&raw[..4]), f32::read_le(&raw[4..8]))
    }
}

impl Element for Complex64 {
    const DTYPE: DType = DType::Complex128;

    fn wrap(array: ArrayD<Self>) -> NdArray {
        NdArray::Complex128(array)
    }

    fn view(array: &NdArray) -> Option<&ArrayD<Self>> {
        match array {
            NdArray::Complex128(a) => Some(a),
            _ => None,
        }
    }

    fn write_le(&self, out: &mut Vec<u8>) {
        self.re.write_le(out);
        self.im.write_le(out);
    }

    fn read_le(raw: &[u8]) -> Self {
        Complex64::new(f64::read_le(&raw[..8]), f64::read_le(&raw[8..16]))
    }
}

/// Runs `$body` with `$a` bound to the typed array of every homogeneous
/// variant, and `$obj_body` for object arrays
macro_rules! dispatch {
    ($array:expr, $a:ident => $body:expr, $obj:ident => $obj_body:expr) => {
        match $array {
            NdArray::Bool($a) => $body,
            NdArray::Int8($a) => $body,
            NdArray::Int16($a) => $body,
            NdArray::Int32($a) => $body,
            NdArray::Int64($a) => $body,
            NdArray::UInt8($a) => $body,
            NdArray::UInt16($a) => $body,
            NdArray::UInt32($a) => $body,
            NdArray::UInt64($a) => $body,
            NdArray::Float16($a) => $body,
            NdArray::BFloat16($a) => $body,
            NdArray::Float32($a) => $body,
            NdArray::Float64($a) => $body,
            NdArray::Complex64($a) => $body,
            NdArray::Complex128($a) => $body,
            NdArray::Object($obj) => $obj_body,
        }
    };
}

fn element_count(shape: &[usize]) -> Result<usize, WireError> {
    shape
        .iter()
        .try_fold(1usize, |acc, dim| acc.checked_mul(*dim))
        .ok_or_else(|| WireError::Decode(format!("shape {:?} overflows", shape)))
}

fn decode_elements<T: Element>(shape: &[usize], raw: &[u8]) -> Result<NdArray, WireError> {
    let size = T::DTYPE.item_size().unwrap_or(1);
    let count = element_count(shape)?;
    let expected = count
        .checked_mul(size)
        .ok_or_else(|| WireError::Decode(format!("shape {:?} overflows", shape)))?;
    if raw.len() != expected {
        return Err(WireError::Decode(format!(
            "{} buffer of {} bytes does not fit shape {:?}",
            T::DTYPE,
            raw.len(),
            shape
        )));
    }
    let data: Vec<T> = raw.chunks_exact(size).map(T::read_le).collect();
    NdArray::from_elements(shape, data)
}

impl NdArray {
    /// Build from a shape and row-major elements
    pub fn from_elements<T: Element>(shape: &[usize], data: Vec<T>) -> Result<Self, WireError> {
        ArrayD::from_shape_vec(IxDyn(shape), data)
            .map(T::wrap)
            .map_err(|e| WireError::Decode(format!("cannot shape array as {:?}: {}", shape, e)))
    }

    /// Object array from a shape and row-major elements
    pub fn from_values(shape: &[usize], data: Vec<Value>) -> Result<Self, WireError> {
        ArrayD::from_shape_vec(IxDyn(shape), data)
            .map(NdArray::Object)
            .map_err(|e| WireError::Decode(format!("cannot shape array as {:?}: {}", shape, e)))
    }

    /// Reinterpret a little-endian buffer as an array
    pub fn from_le_bytes(dtype: DType, shape: &[usize], raw: &[u8]) -> Result<Self, WireError> {
        match dtype {
            DType::Bool => decode_elements::<bool>(shape, raw),
            DType::Int8 => decode_elements::<i8>(shape, raw),
            DType::Int16 => decode_elements::<i16>(shape, raw),
            DType::Int32 => decode_elements::<i32>(shape, raw),
            DType::Int64 => decode_elements::<i64>(shape, raw),
            DType::UInt8 => decode_elements::<u8>(shape, raw),
            DType::UInt16 => decode_elements::<u16>(shape, raw),
            DType::UInt32 => decode_elements::<u32>(shape, raw),
            DType::UInt64 => decode_elements::<u64>(shape, raw),
            DType::Float16 => decode_elements::<f16>(shape, raw),
            DType::BFloat16 => decode_elements::<bf16>(shape, raw),
            DType::Float32 => decode_elements::<f32>(shape, raw),
            DType::Float64 => decode_elements::<f64>(shape, raw),
            DType::Complex64 => decode_elements::<Complex32>(shape, raw),
            DType::Complex128 => decode_elements::<Complex64>(shape, raw),
            DType::Object => Err(WireError::Decode(
                "object arrays have no raw buffer form".to_string(),
            )),
        }
    }

    /// Flattened row-major little-endian bytes; `None` for object arrays
    pub fn to_le_bytes(&self) -> Option<Vec<u8>> {
        fn collect<T: Element>(a: &ArrayD<T>) -> Vec<u8> {
            let mut out = Vec::with_capacity(a.len() * T::DTYPE.item_size().unwrap_or(1));
            for x in a.iter() {
                x.write_le(&mut out);
            }
            out
        }
        dispatch!(self, a => Some(collect(a)), _obj => None)
    }

    pub fn dtype(&self) -> DType {
        dispatch!(self, a => element_dtype(a), _obj => DType::Object)
    }

    pub fn shape(&self) -> &[usize] {
        dispatch!(self, a => a.shape(), obj => obj.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    pub fn len(&self) -> usize {
        dispatch!(self, a => a.len(), obj => obj.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn view<T: Element>(&self) -> Option<&ArrayD<T>> {
        T::view(self)
    }

    /// Real-valued copy as `f64`; `None` for complex and object arrays
    pub fn to_f64(&self) -> Option<ArrayD<f64>> {
        let converted = match self {
            NdArray::Bool(a) => a.mapv(|x| if x { 1.0 } else { 0.0 }),
            NdArray::Int8(a) => a.mapv(f64::from),
            NdArray::Int16(a) => a.mapv(f64::from),
            NdArray::Int32(a) => a.mapv(f64::from),
            NdArray::Int64(a) => a.mapv(|x| x as f64),
            NdArray::UInt8(a) => a.mapv(f64::from),
            NdArray::UInt16(a) => a.mapv(f64::from),
            NdArray::UInt32(a) => a.mapv(f64::from),
            NdArray::UInt64(a) => a.mapv(|x| x as f64),
            NdArray::Float16(a) => a.mapv(f64::from),
            NdArray::BFloat16(a) => a.mapv(f64::from),
            NdArray::Float32(a) => a.mapv(f64::from),
            NdArray::Float64(a) => a.clone(),
            NdArray::Complex64(_) | NdArray::Complex128(_) | NdArray::Object(_) => return None,
        };
        Some(converted)
    }
}

fn element_dtype<T: Element>(_: &ArrayD<T>) -> DType {
    T::DTYPE
}

impl<T: Element, D: Dimension> From<Array<T, D>> for NdArray {
    fn from(array: Array<T, D>) -> Self {
        T::wrap(array.into_dyn())
    }
}

impl From<NdArray> for Value {
    fn from(array: NdArray) -> Self {
        Value::ext(array)
    }
}

impl<T: Element, D: Dimension> From<Array<T, D>> for Value {
    fn from(array: Array<T, D>) -> Self {
        Value::ext(NdArray::from(array))
    }
}

impl Value {
    /// Flat `f64` view of a numeric array or a tuple of numbers
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Value::Tuple(items) => items.iter().map(Value::as_f64).collect(),
            Value::Ext(_) => {
                let array = self.downcast_ref::<NdArray>()?.to_f64()?;
                Some(array.iter().copied().collect())
            }
            other => other.as_f64().map(|x| vec![x]),
        }
    }
}

/// Homogeneous numeric arrays
pub struct NdArrayCodec;

impl Codec for NdArrayCodec {
    fn name(&self) -> &'static str {
        "ndarray"
    }

    fn accepts(&self, value: &Value, _registry: &CodecRegistry) -> bool {
        value
            .downcast_ref::<NdArray>()
            .is_some_and(|a| a.dtype() != DType::Object)
    }

    fn encode(&self, value: &Value, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        let array = value
            .downcast_ref::<NdArray>()
            .ok_or_else(|| WireError::unencodable(value, value.type_name()))?;
        let raw = array
            .to_le_bytes()
            .ok_or_else(|| WireError::unencodable(value, value.type_name()))?;
        enc.encode_shape(array.shape())?;
        enc.encode_str(array.dtype().name())?;
        enc.encode_bytes(&raw)
    }

    fn decode(&self, dec: &mut Decoder<'_>) -> Result<Value, WireError> {
        let shape = dec.decode_shape()?;
        let name = dec.decode_string()?;
        let dtype = DType::from_name(&name)
            .ok_or_else(|| WireError::Decode(format!("unknown dtype '{}'", name)))?;
        let raw = dec.decode_bytes()?;
        Ok(Value::ext(NdArray::from_le_bytes(dtype, &shape, &raw)?))
    }
}

/// Arrays whose elements are arbitrary values
pub struct ObjectArrayCodec;

impl Codec for ObjectArrayCodec {
    fn name(&self) -> &'static str {
        "ndarray.object"
    }

    fn accepts(&self, value: &Value, registry: &CodecRegistry) -> bool {
        match value.downcast_ref::<NdArray>() {
            Some(NdArray::Object(elements)) => elements.iter().all(|e| registry.dumpable(e)),
            _ => false,
        }
    }

    fn encode(&self, value: &Value, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        let elements = match value.downcast_ref::<NdArray>() {
            Some(NdArray::Object(elements)) => elements,
            _ => return Err(WireError::unencodable(value, value.type_name())),
        };
        enc.encode_shape(elements.shape())?;
        for element in elements.iter() {
            enc.encode(element)?;
        }
        Ok(())
    }

    fn decode(&self, dec: &mut Decoder<'_>) -> Result<Value, WireError> {
        let shape = dec.decode_shape()?;
        let count = element_count(&shape)?;
        let mut elements = Vec::with_capacity(count.min(dec.remaining()));
        for _ in 0..count {
            elements.push(dec.decode()?);
        }
        Ok(Value::ext(NdArray::from_values(&shape, elements)?))
    }
}

/// Numeric scalars re-expressed as native int, float or complex values
pub struct ScalarCodec;

impl ScalarCodec {
    fn lower(value: &Value) -> Option<Value> {
        let Value::Ext(ext) = value else {
            return None;
        };
        macro_rules! lower_as {
            ($($t:ty => $conv:expr),* $(,)?) => {
                $(if let Some(x) = ext.downcast_ref::<$t>() {
                    return $conv(*x);
                })*
            };
        }
        lower_as!(
            bool => |x: bool| Some(Value::Bool(x)),
            i8 => |x: i8| Some(Value::Int(x.into())),
            i16 => |x: i16| Some(Value::Int(x.into())),
            i32 => |x: i32| Some(Value::Int(x.into())),
            i64 => |x: i64| Some(Value::Int(x)),
            u8 => |x: u8| Some(Value::Int(x.into())),
            u16 => |x: u16| Some(Value::Int(x.into())),
            u32 => |x: u32| Some(Value::Int(x.into())),
            u64 => |x: u64| i64::try_from(x).ok().map(Value::Int),
            f16 => |x: f16| Some(Value::Float(x.into())),
            bf16 => |x: bf16| Some(Value::Float(x.into())),
            f32 => |x: f32| Some(Value::Float(x.into())),
            f64 => |x: f64| Some(Value::Float(x)),
            Complex32 => |x: Complex32| Some(Value::Complex(Complex64::new(x.re.into(), x.im.into()))),
            Complex64 => |x: Complex64| Some(Value::Complex(x)),
        );
        None
    }
}

impl Codec for ScalarCodec {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn representation(&self) -> Representation {
        Representation::Native
    }

    fn accepts(&self, value: &Value, _registry: &CodecRegistry) -> bool {
        Self::lower(value).is_some()
    }

    fn encode(&self, value: &Value, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        let lowered =
            Self::lower(value).ok_or_else(|| WireError::unencodable(value, value.type_name()))?;
        enc.encode(&lowered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    fn round_trip(value: &Value) -> Value {
        let registry = CodecRegistry::standard();
        let bytes = registry.dumps(value).unwrap();
        registry.loads(&bytes).unwrap()
    }

    #[test]
    fn test_float32_matrix_round_trip() {
        let original = NdArray::from(array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let back = round_trip(&Value::ext(original.clone()));
        let back = back.downcast_ref::<NdArray>().unwrap();
        assert_eq!(back.shape(), &[2, 3]);
        assert_eq!(back.dtype(), DType::Float32);
        assert_eq!(back, &original);
    }

    #[test]
    fn test_zero_dimensional_and_empty_arrays() {
        let scalar = NdArray::from_elements(&[], vec![7i16]).unwrap();
        assert_eq!(scalar.ndim(), 0);
        assert_eq!(round_trip(&Value::ext(scalar.clone())), Value::ext(scalar));

        let empty = NdArray::from_elements::<f64>(&[0, 3], vec![]).unwrap();
        assert!(empty.is_empty());
        assert_eq!(round_trip(&Value::ext(empty.clone())), Value::ext(empty));
    }

    #[test]
    fn test_buffer_is_little_endian_row_major() {
        let a = NdArray::from(array![[1u16, 2], [3, 4]]);
        assert_eq!(a.to_le_bytes().unwrap(), vec![1, 0, 2, 0, 3, 0, 4, 0]);

        // A transposed view still serialises in logical order
        let t = NdArray::from(array![[1u8, 2], [3, 4]].reversed_axes());
        assert_eq!(t.to_le_bytes().unwrap(), vec![1, 3, 2, 4]);
    }

    #[test]
    fn test_object_array_round_trip() {
        let objects = NdArray::from_values(
            &[2],
            vec![Value::Str("a".into()), Value::ext(NdArray::from(array![1i32, 2]))],
        )
        .unwrap();
        assert_eq!(round_trip(&Value::ext(objects.clone())), Value::ext(objects));
    }

    #[test]
    fn test_object_array_with_undumpable_element_fails() {
        #[derive(Debug, PartialEq)]
        struct FileHandle;

        let registry = CodecRegistry::standard();
        let objects = Value::ext(
            NdArray::from_values(&[2], vec![Value::Int(1), Value::ext(FileHandle)]).unwrap(),
        );
        assert!(!registry.dumpable(&objects));
        assert!(matches!(
            registry.dumps(&objects),
            Err(WireError::Unencodable { .. })
        ));
    }

    #[test]
    fn test_scalars_lower_to_native_values() {
        let registry = CodecRegistry::standard();
        assert_eq!(
            registry.dumps(&Value::ext(5u8)).unwrap(),
            registry.dumps(&Value::Int(5)).unwrap()
        );
        assert_eq!(round_trip(&Value::ext(1.5f32)), Value::Float(1.5));
        assert_eq!(round_trip(&Value::ext(f16::from_f32(0.5))), Value::Float(0.5));
        assert_eq!(
            round_trip(&Value::ext(Complex32::new(1.0, 2.0))),
            Value::Complex(Complex64::new(1.0, 2.0))
        );
        assert!(!registry.dumpable(&Value::ext(u64::MAX)));
    }

    #[test]
    fn test_bad_buffer_length_is_rejected() {
        assert!(NdArray::from_le_bytes(DType::Float64, &[2], &[0u8; 15]).is_err());
        assert!(NdArray::from_le_bytes(DType::Object, &[1], &[]).is_err());
    }

    #[test]
    fn test_to_f64_vec() {
        let v = Value::ext(NdArray::from(array![1i32, 2, 3]));
        assert_eq!(v.to_f64_vec(), Some(vec![1.0, 2.0, 3.0]));
        let t = Value::tuple([1.0, 2.5]);
        assert_eq!(t.to_f64_vec(), Some(vec![1.0, 2.5]));
        assert_eq!(Value::Str("x".into()).to_f64_vec(), None);
    }

    fn build(dtype: DType, shape: &[usize], data: &[i64]) -> NdArray {
        macro_rules! cast {
            ($conv:expr) => {
                NdArray::from_elements(shape, data.iter().map($conv).collect()).unwrap()
            };
        }
        match dtype {
            DType::Bool => cast!(|x: &i64| x % 2 == 0),
            DType::Int8 => cast!(|x: &i64| *x as i8),
            DType::Int16 => cast!(|x: &i64| *x as i16),
            DType::Int32 => cast!(|x: &i64| *x as i32),
            DType::Int64 => cast!(|x: &i64| *x),
            DType::UInt8 => cast!(|x: &i64| *x as u8),
            DType::UInt16 => cast!(|x: &i64| *x as u16),
            DType::UInt32 => cast!(|x: &i64| *x as u32),
            DType::UInt64 => cast!(|x: &i64| *x as u64),
            DType::Float16 => cast!(|x: &i64| f16::from_f64((*x % 1000) as f64)),
            DType::BFloat16 => cast!(|x: &i64| bf16::from_f64((*x % 1000) as f64)),
            DType::Float32 => cast!(|x: &i64| *x as f32),
            DType::Float64 => cast!(|x: &i64| *x as f64),
            DType::Complex64 => cast!(|x: &i64| Complex32::new(*x as f32, -(*x as f32))),
            DType::Complex128 => cast!(|x: &i64| Complex64::new(*x as f64, 0.5)),
            DType::Object => {
                NdArray::from_values(shape, data.iter().map(|x| Value::Int(*x)).collect()).unwrap()
            }
        }
    }

    fn shape_and_data() -> impl Strategy<Value = (Vec<usize>, Vec<i64>)> {
        prop::collection::vec(0usize..4, 0..4).prop_flat_map(|shape| {
            let n = shape.iter().product::<usize>();
            (Just(shape), prop::collection::vec(any::<i64>(), n))
        })
    }

    proptest! {
        #[test]
        fn prop_numeric_arrays_round_trip(
            (shape, data) in shape_and_data(),
            dtype in prop::sample::select(DType::NUMERIC.to_vec()),
        ) {
            let array = build(dtype, &shape, &data);
            let back = round_trip(&Value::ext(array.clone()));
            let back = back.downcast_ref::<NdArray>().unwrap();
            prop_assert_eq!(back.dtype(), dtype);
            prop_assert_eq!(back.shape(), shape.as_slice());
            prop_assert_eq!(back, &array);
        }
    }
}
