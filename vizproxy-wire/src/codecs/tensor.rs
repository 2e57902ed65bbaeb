//! Tensors from a compute library
//!
//! A tensor has no wire form of its own: it is detached, copied to host
//! memory and sent as an ordinary [`NdArray`]. The peer receives an array.

use crate::codec::{Codec, CodecRegistry, Encoder, Representation};
use crate::codecs::array::NdArray;
use crate::error::WireError;
use crate::value::Value;

/// Where a tensor's storage lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Accelerator(u32),
}

/// Dense tensor with device placement and autograd flag
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: NdArray,
    device: Device,
    requires_grad: bool,
}

impl Tensor {
    pub fn new(data: impl Into<NdArray>) -> Self {
        Self {
            data: data.into(),
            device: Device::Cpu,
            requires_grad: false,
        }
    }

    pub fn to_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn with_requires_grad(mut self, requires_grad: bool) -> Self {
        self.requires_grad = requires_grad;
        self
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Same data, outside any computation graph
    pub fn detach(&self) -> Tensor {
        Tensor {
            data: self.data.clone(),
            device: self.device,
            requires_grad: false,
        }
    }

    /// Host-memory copy
    pub fn cpu(&self) -> Tensor {
        Tensor {
            data: self.data.clone(),
            device: Device::Cpu,
            requires_grad: self.requires_grad,
        }
    }

    /// Host array view; only valid for detached CPU tensors
    pub fn to_array(&self) -> Result<NdArray, WireError> {
        if self.requires_grad {
            return Err(WireError::InvalidMessage(
                "tensor requires grad; detach it first".to_string(),
            ));
        }
        if self.device != Device::Cpu {
            return Err(WireError::InvalidMessage(format!(
                "tensor lives on {:?}; copy it to the cpu first",
                self.device
            )));
        }
        Ok(self.data.clone())
    }
}

impl From<Tensor> for Value {
    fn from(tensor: Tensor) -> Self {
        Value::ext(tensor)
    }
}

pub struct TensorCodec;

impl Codec for TensorCodec {
    fn name(&self) -> &'static str {
        "tensor"
    }

    fn representation(&self) -> Representation {
        Representation::Native
    }

    fn accepts(&self, value: &Value, _registry: &CodecRegistry) -> bool {
        value.downcast_ref::<Tensor>().is_some()
    }

    fn encode(&self, value: &Value, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        let tensor = value
            .downcast_ref::<Tensor>()
            .ok_or_else(|| WireError::unencodable(value, value.type_name()))?;
        let array = tensor.detach().cpu().to_array()?;
        enc.encode(&Value::ext(array))
    }
}
