//! Wire layer for vizproxy
//!
//! This crate provides the value model, the extensible binary serializer and
//! its codec registry, the request/reply protocol with reference boxing, the
//! framed connection, and the worker readiness handshake.

pub mod codec;
pub mod codecs;
pub mod error;
pub mod protocol;
pub mod readiness;
pub mod transport;
pub mod value;

// Re-export commonly used types
pub use codec::{
    Codec, CodecRegistry, CodecRegistryBuilder, Decoder, Encoder, Representation, TAG_CUSTOM,
};
pub use codecs::{
    Device, DType, NdArray, PointCloud, Tensor, TriangleMesh, Vector3dVector, Vector3iVector,
};
pub use error::WireError;
pub use protocol::{
    decode_reply, decode_request, encode_reply, encode_request, peek_seq, MessageEnvelope,
    RemoteError, Reply, Request, PROTOCOL_VERSION, ROOT_OBJECT,
};
pub use readiness::{read_report, write_report, Readiness, ReadinessCell, ReadinessReport};
pub use transport::{Connection, MAX_FRAME_SIZE};
pub use value::{Extension, ExtensionValue, RemoteRef, Slice, Value};

// Rich payload crates, so downstream crates build values with matching versions
pub use half;
pub use image;
pub use ndarray;
pub use num_complex;
