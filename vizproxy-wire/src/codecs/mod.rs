//! Built-in codecs and the standard registration order

pub mod array;
pub mod geometry;
pub mod image;
pub mod tensor;

use crate::codec::CodecRegistry;

pub use array::{DType, Element, NdArray, NdArrayCodec, ObjectArrayCodec, ScalarCodec};
pub use geometry::{
    PointCloud, PointCloudCodec, TriangleMesh, TriangleMeshCodec, Vector3dCodec, Vector3dVector,
    Vector3iCodec, Vector3iVector,
};
pub use image::{array_to_image, image_to_array, ImageCodec};
pub use tensor::{Device, Tensor, TensorCodec};

impl CodecRegistry {
    /// The registry both host and worker build.
    ///
    /// The order below is the wire format: never reorder entries, only append.
    pub fn standard() -> Self {
        CodecRegistry::builder()
            .register(NdArrayCodec)
            .register(ObjectArrayCodec)
            .register(ScalarCodec)
            .register(TensorCodec)
            .register(ImageCodec)
            .register(Vector3iCodec)
            .register(Vector3dCodec)
            .register(TriangleMeshCodec)
            .register(PointCloudCodec)
            .build()
    }
}
