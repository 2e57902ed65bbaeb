//! 3D geometry primitives
//!
//! Vector lists travel as `(N, 3)` arrays (`int32` or `float64`). A triangle
//! mesh is its triangle list followed by its vertex list; a point cloud is
//! its points followed by its colors. Nested lists are complete tagged values,
//! so each decoder simply decodes two values in the order they were written.

use ndarray::Array2;

use crate::codec::{Codec, CodecRegistry, Decoder, Encoder};
use crate::codecs::array::{Element, NdArray};
use crate::error::WireError;
use crate::value::Value;

/// List of integer triples, e.g. triangle vertex indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vector3iVector(pub Vec<[i32; 3]>);

/// List of double triples, e.g. positions, normals or colors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vector3dVector(pub Vec<[f64; 3]>);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    pub vertices: Vector3dVector,
    pub triangles: Vector3iVector,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vector3dVector,
    pub colors: Vector3dVector,
}

fn triples_to_array<T: Element + Copy>(triples: &[[T; 3]]) -> NdArray {
    T::wrap(Array2::from_shape_fn((triples.len(), 3), |(i, j)| triples[i][j]).into_dyn())
}

fn array_to_triples<T: Element + Copy>(value: &Value) -> Result<Vec<[T; 3]>, WireError> {
    let array = value
        .downcast_ref::<NdArray>()
        .and_then(|a| a.view::<T>())
        .ok_or_else(|| {
            WireError::Decode(format!(
                "expected {} array, found {}",
                T::DTYPE,
                value.type_name()
            ))
        })?;
    match array.shape() {
        [_, 3] => {}
        shape => {
            return Err(WireError::Decode(format!(
                "expected shape (N, 3), found {:?}",
                shape
            )))
        }
    }
    let flat: Vec<T> = array.iter().copied().collect();
    Ok(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

impl Vector3iVector {
    pub fn to_array(&self) -> NdArray {
        triples_to_array(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Vector3dVector {
    pub fn to_array(&self) -> NdArray {
        triples_to_array(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<[i32; 3]>> for Vector3iVector {
    fn from(v: Vec<[i32; 3]>) -> Self {
        Self(v)
    }
}

impl From<Vec<[f64; 3]>> for Vector3dVector {
    fn from(v: Vec<[f64; 3]>) -> Self {
        Self(v)
    }
}

macro_rules! into_value {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::ext(v)
            }
        })*
    };
}

into_value!(Vector3iVector, Vector3dVector, TriangleMesh, PointCloud);

fn downcast<'v, T: 'static>(value: &'v Value) -> Result<&'v T, WireError> {
    value
        .downcast_ref::<T>()
        .ok_or_else(|| WireError::unencodable(value, value.type_name()))
}

pub struct Vector3iCodec;

impl Codec for Vector3iCodec {
    fn name(&self) -> &'static str {
        "geometry.vector3i"
    }

    fn accepts(&self, value: &Value, _registry: &CodecRegistry) -> bool {
        value.downcast_ref::<Vector3iVector>().is_some()
    }

    fn encode(&self, value: &Value, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        let v = downcast::<Vector3iVector>(value)?;
        enc.encode(&Value::ext(v.to_array()))
    }

    fn decode(&self, dec: &mut Decoder<'_>) -> Result<Value, WireError> {
        let array = dec.decode()?;
        Ok(Value::ext(Vector3iVector(array_to_triples(&array)?)))
    }
}

pub struct Vector3dCodec;

impl Codec for Vector3dCodec {
    fn name(&self) -> &'static str {
        "geometry.vector3d"
    }

    fn accepts(&self, value: &Value, _registry: &CodecRegistry) -> bool {
        value.downcast_ref::<Vector3dVector>().is_some()
    }

    fn encode(&self, value: &Value, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        let v = downcast::<Vector3dVector>(value)?;
        enc.encode(&Value::ext(v.to_array()))
    }

    fn decode(&self, dec: &mut Decoder<'_>) -> Result<Value, WireError> {
        let array = dec.decode()?;
        Ok(Value::ext(Vector3dVector(array_to_triples(&array)?)))
    }
}

fn decode_field<T: Clone + 'static>(dec: &mut Decoder<'_>, field: &str) -> Result<T, WireError> {
    let value = dec.decode()?;
    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| WireError::Decode(format!("{} has type {}", field, value.type_name())))
}

pub struct TriangleMeshCodec;

impl Codec for TriangleMeshCodec {
    fn name(&self) -> &'static str {
        "geometry.triangle_mesh"
    }

    fn accepts(&self, value: &Value, _registry: &CodecRegistry) -> bool {
        value.downcast_ref::<TriangleMesh>().is_some()
    }

    fn encode(&self, value: &Value, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        let mesh = downcast::<TriangleMesh>(value)?;
        enc.encode(&Value::ext(mesh.triangles.clone()))?;
        enc.encode(&Value::ext(mesh.vertices.clone()))
    }

    fn decode(&self, dec: &mut Decoder<'_>) -> Result<Value, WireError> {
        let triangles = decode_field::<Vector3iVector>(dec, "triangles")?;
        let vertices = decode_field::<Vector3dVector>(dec, "vertices")?;
        Ok(Value::ext(TriangleMesh {
            vertices,
            triangles,
        }))
    }
}

pub struct PointCloudCodec;

impl Codec for PointCloudCodec {
    fn name(&self) -> &'static str {
        "geometry.point_cloud"
    }

    fn accepts(&self, value: &Value, _registry: &CodecRegistry) -> bool {
        value.downcast_ref::<PointCloud>().is_some()
    }

    fn encode(&self, value: &Value, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        let cloud = downcast::<PointCloud>(value)?;
        enc.encode(&Value::ext(cloud.points.clone()))?;
        enc.encode(&Value::ext(cloud.colors.clone()))
    }

    fn decode(&self, dec: &mut Decoder<'_>) -> Result<Value, WireError> {
        let points = decode_field::<Vector3dVector>(dec, "points")?;
        let colors = decode_field::<Vector3dVector>(dec, "colors")?;
        Ok(Value::ext(PointCloud { points, colors }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::array::DType;

    fn round_trip(value: &Value) -> Value {
        let registry = CodecRegistry::standard();
        let bytes = registry.dumps(value).unwrap();
        registry.loads(&bytes).unwrap()
    }

    fn tetrahedron() -> TriangleMesh {
        TriangleMesh {
            vertices: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ]
            .into(),
            triangles: vec![[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]].into(),
        }
    }

    #[test]
    fn test_vector_lists_are_n_by_3_arrays() {
        let v = Vector3iVector(vec![[1, 2, 3], [4, 5, 6]]);
        let array = v.to_array();
        assert_eq!(array.shape(), &[2, 3]);
        assert_eq!(array.dtype(), DType::Int32);
        assert_eq!(Vector3dVector::default().to_array().shape(), &[0, 3]);
    }

    #[test]
    fn test_mesh_round_trip() {
        let mesh = Value::from(tetrahedron());
        assert_eq!(round_trip(&mesh), mesh);
    }

    #[test]
    fn test_point_cloud_round_trip() {
        let cloud = Value::from(PointCloud {
            points: vec![[0.5, 1.5, -2.0]].into(),
            colors: vec![[1.0, 0.0, 0.0]].into(),
        });
        assert_eq!(round_trip(&cloud), cloud);
    }

    #[test]
    fn test_wrong_shape_is_rejected() {
        let flat = Value::ext(NdArray::from_elements(&[6], vec![0i32; 6]).unwrap());
        assert!(array_to_triples::<i32>(&flat).is_err());
        let floats = Value::ext(NdArray::from_elements(&[1, 3], vec![0f64; 3]).unwrap());
        assert!(array_to_triples::<i32>(&floats).is_err());
    }
}
