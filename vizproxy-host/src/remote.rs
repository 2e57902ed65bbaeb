//! Host-side handles on objects living in the worker

use vizproxy_wire::{RemoteRef, Request, Value, ROOT_OBJECT};

use crate::client::RemoteClient;
use crate::error::HostError;

/// A reference to a worker object plus the client that reaches it.
///
/// Cheap to clone; every clone talks over the same connection.
#[derive(Debug, Clone)]
pub struct RemoteObject {
    client: RemoteClient,
    reference: RemoteRef,
}

impl RemoteObject {
    /// The wrapped target itself
    pub fn root(client: RemoteClient) -> Self {
        Self {
            client,
            reference: RemoteRef {
                id: ROOT_OBJECT,
                type_name: "root".to_string(),
            },
        }
    }

    pub fn id(&self) -> u64 {
        self.reference.id
    }

    pub fn type_name(&self) -> &str {
        &self.reference.type_name
    }

    pub fn client(&self) -> &RemoteClient {
        &self.client
    }

    /// Pass this object back to the worker as an argument
    pub fn as_value(&self) -> Value {
        Value::Remote(self.reference.clone())
    }

    /// Wrap a reference returned by the worker
    pub fn from_value(&self, value: Value) -> Result<RemoteObject, HostError> {
        match value {
            Value::Remote(reference) => Ok(RemoteObject {
                client: self.client.clone(),
                reference,
            }),
            other => Err(HostError::UnexpectedReply(format!(
                "expected a remote object, got {}",
                other.type_name()
            ))),
        }
    }

    pub async fn getattr(&self, name: &str) -> Result<Value, HostError> {
        self.client
            .request(&Request::GetAttr {
                object: self.reference.id,
                name: name.to_string(),
            })
            .await
    }

    pub async fn setattr(&self, name: &str, value: impl Into<Value>) -> Result<(), HostError> {
        self.client
            .request(&Request::SetAttr {
                object: self.reference.id,
                name: name.to_string(),
                value: value.into(),
            })
            .await
            .map(drop)
    }

    pub async fn call(
        &self,
        name: &str,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, HostError> {
        self.client
            .request(&Request::Call {
                object: self.reference.id,
                name: name.to_string(),
                args,
                kwargs,
                reply: true,
            })
            .await
    }

    /// Call with positional arguments only
    pub async fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Value, HostError> {
        self.call(name, args, Vec::new()).await
    }

    /// Call that returns a remote object
    pub async fn invoke_object(
        &self,
        name: &str,
        args: Vec<Value>,
    ) -> Result<RemoteObject, HostError> {
        let value = self.invoke(name, args).await?;
        self.from_value(value)
    }

    /// Fire-and-forget call; failures are only logged by the worker
    pub async fn notify(&self, name: &str, args: Vec<Value>) -> Result<(), HostError> {
        self.client
            .request(&Request::Call {
                object: self.reference.id,
                name: name.to_string(),
                args,
                kwargs: Vec::new(),
                reply: false,
            })
            .await
            .map(drop)
    }

    /// Drop the worker's entry for this object
    pub async fn release(self) -> Result<(), HostError> {
        self.client
            .request(&Request::Release {
                object: self.reference.id,
            })
            .await
            .map(drop)
    }
}
