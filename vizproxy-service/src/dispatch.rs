//! Request dispatch against the wrapped target and its object table

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vizproxy_wire::{
    CodecRegistry, RemoteError, RemoteRef, Reply, Request, Value, PROTOCOL_VERSION, ROOT_OBJECT,
};

use crate::target::{CallArgs, ErrorKind, RemoteTarget, Returned, TargetError};

/// Name intercepted on the root object and mapped to service termination.
///
/// Calls to it, with or without the `exposed_` prefix, stop the service and
/// never reach the target. Attribute reads and writes of it are refused.
pub const STOP_NAME: &str = "stop";

/// Prefix that marks a name as explicitly exposed
pub const EXPOSED_PREFIX: &str = "exposed_";

/// Whether `name` on `object` designates the service's own stop
fn is_root_stop(object: u64, name: &str) -> bool {
    object == ROOT_OBJECT && name.strip_prefix(EXPOSED_PREFIX).unwrap_or(name) == STOP_NAME
}

/// What the service should do after a request
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Reply(Reply),
    NoReply,
    /// Terminate the service without replying
    Stop,
    /// Send the reply, then close the connection
    Reject(Reply),
}

/// Routes requests to the objects served on one connection.
///
/// Object 0 is the wrapped target. Objects returned by it are registered
/// under fresh ids and live until the host releases them or the service
/// closes.
pub struct Dispatcher {
    registry: Arc<CodecRegistry>,
    objects: HashMap<u64, Box<dyn RemoteTarget>>,
    next_id: u64,
    allow_public_attrs: bool,
    greeted: bool,
    closed: bool,
}

impl Dispatcher {
    pub fn new(root: Box<dyn RemoteTarget>, registry: Arc<CodecRegistry>) -> Self {
        let mut objects = HashMap::new();
        objects.insert(ROOT_OBJECT, root);
        Self {
            registry,
            objects,
            next_id: ROOT_OBJECT + 1,
            allow_public_attrs: true,
            greeted: false,
            closed: false,
        }
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    /// Number of live objects, the root included
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn dispatch(&mut self, request: Request) -> Dispatch {
        if self.closed {
            return Dispatch::Stop;
        }
        match request {
            Request::Hello {
                version,
                codecs,
                allow_public_attrs,
            } => self.hello(version, &codecs, allow_public_attrs),
            Request::Stop => {
                info!("stop requested by client");
                Dispatch::Stop
            }
            _ if !self.greeted => Dispatch::Reject(Reply::Error(RemoteError::new(
                "ProtocolError",
                "expected hello as the first request",
            ))),
            Request::GetAttr { object, name } => into_dispatch(self.get_attr(object, &name)),
            Request::SetAttr {
                object,
                name,
                value,
            } => into_dispatch(self.set_attr(object, &name, value).map(|_| Value::None)),
            Request::Call {
                object,
                name,
                args,
                kwargs,
                reply,
            } => {
                if is_root_stop(object, &name) {
                    info!(name = %name, "stop called on the root object");
                    return Dispatch::Stop;
                }
                let result = self.call(object, &name, CallArgs::new(args, kwargs));
                if reply {
                    into_dispatch(result)
                } else {
                    if let Err(e) = result {
                        warn!(object, name = %name, error = %e, "fire-and-forget call failed");
                    }
                    Dispatch::NoReply
                }
            }
            Request::Release { object } => {
                self.release(object);
                Dispatch::NoReply
            }
        }
    }

    /// Close the wrapped target once and drop every served object
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(root) = self.objects.get_mut(&ROOT_OBJECT) {
            debug!(type_name = root.type_name(), "closing wrapped target");
            root.close();
        }
        self.objects.clear();
    }

    fn hello(&mut self, version: u32, codecs: &[String], allow_public_attrs: bool) -> Dispatch {
        if version != PROTOCOL_VERSION {
            warn!(expected = PROTOCOL_VERSION, actual = version, "protocol version mismatch");
            return Dispatch::Reject(Reply::Error(RemoteError::new(
                "ProtocolError",
                format!(
                    "protocol version mismatch: expected {}, got {}",
                    PROTOCOL_VERSION, version
                ),
            )));
        }
        if let Err(e) = self.registry.verify_fingerprint(codecs) {
            warn!(error = %e, "client codec registry differs");
            return Dispatch::Reject(Reply::Error(RemoteError::new(
                "RegistryMismatch",
                e.to_string(),
            )));
        }
        if !allow_public_attrs {
            debug!("client restricted lookups to exposed names");
        }
        self.allow_public_attrs = allow_public_attrs;
        self.greeted = true;
        Dispatch::Reply(Reply::Hello {
            version: PROTOCOL_VERSION,
            codecs: self.registry.fingerprint(),
        })
    }

    fn get_attr(&mut self, object: u64, name: &str) -> Result<Value, RemoteError> {
        let name = self.resolve_name(object, name)?;
        let returned = self.object(object)?.get_attr(&name)?;
        Ok(self.register(returned))
    }

    fn set_attr(&mut self, object: u64, name: &str, value: Value) -> Result<(), RemoteError> {
        let name = self.resolve_name(object, name)?;
        let value = self.resolve_value(value);
        self.object_mut(object)?.set_attr(&name, value)?;
        Ok(())
    }

    fn call(&mut self, object: u64, name: &str, args: CallArgs) -> Result<Value, RemoteError> {
        let name = self.resolve_name(object, name)?;
        let args = CallArgs {
            args: args
                .args
                .into_iter()
                .map(|v| self.resolve_value(v))
                .collect(),
            kwargs: args
                .kwargs
                .into_iter()
                .map(|(k, v)| (k, self.resolve_value(v)))
                .collect(),
        };
        let returned = self.object_mut(object)?.call(&name, args)?;
        Ok(self.register(returned))
    }

    fn release(&mut self, object: u64) {
        if object == ROOT_OBJECT {
            debug!("ignoring release of the root object");
            return;
        }
        if self.objects.remove(&object).is_some() {
            debug!(object, "released remote object");
        }
    }

    /// Apply the name policy and strip the `exposed_` prefix
    fn resolve_name(&self, object: u64, name: &str) -> Result<String, RemoteError> {
        if is_root_stop(object, name) {
            return Err(TargetError::new(
                ErrorKind::Attribute,
                "'stop' is reserved by the proxy service",
            )
            .into());
        }
        if let Some(exposed) = name.strip_prefix(EXPOSED_PREFIX) {
            return Ok(exposed.to_string());
        }
        if name.starts_with('_') {
            return Err(TargetError::new(
                ErrorKind::Attribute,
                format!("cannot access private attribute '{}'", name),
            )
            .into());
        }
        if !self.allow_public_attrs {
            return Err(TargetError::new(
                ErrorKind::Attribute,
                format!("cannot access '{}': public attributes are not allowed", name),
            )
            .into());
        }
        Ok(name.to_string())
    }

    /// Replace references to served objects with their local handles
    fn resolve_value(&self, value: Value) -> Value {
        match value {
            Value::Remote(r) => match self.objects.get(&r.id).and_then(|t| t.handle()) {
                Some(handle) => handle,
                None => Value::Remote(r),
            },
            Value::Tuple(items) => {
                Value::Tuple(items.into_iter().map(|v| self.resolve_value(v)).collect())
            }
            other => other,
        }
    }

    fn register(&mut self, returned: Returned) -> Value {
        match returned {
            Returned::Value(value) => value,
            Returned::Object(target) => {
                let id = self.next_id;
                self.next_id += 1;
                let type_name = target.type_name().to_string();
                debug!(id, type_name = %type_name, "registered remote object");
                self.objects.insert(id, target);
                Value::Remote(RemoteRef { id, type_name })
            }
            Returned::Tuple(items) => {
                Value::Tuple(items.into_iter().map(|r| self.register(r)).collect())
            }
        }
    }

    fn object(&self, id: u64) -> Result<&dyn RemoteTarget, RemoteError> {
        self.objects
            .get(&id)
            .map(|t| t.as_ref())
            .ok_or_else(|| unknown_object(id))
    }

    fn object_mut(&mut self, id: u64) -> Result<&mut Box<dyn RemoteTarget>, RemoteError> {
        self.objects.get_mut(&id).ok_or_else(|| unknown_object(id))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("objects", &self.objects.len())
            .field("allow_public_attrs", &self.allow_public_attrs)
            .field("greeted", &self.greeted)
            .field("closed", &self.closed)
            .finish()
    }
}

fn unknown_object(id: u64) -> RemoteError {
    RemoteError::new("ReferenceError", format!("no remote object with id {}", id))
}

fn into_dispatch(result: Result<Value, RemoteError>) -> Dispatch {
    match result {
        Ok(value) => Dispatch::Reply(Reply::Value(value)),
        Err(e) => Dispatch::Reply(Reply::Error(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hello, Counter};

    fn dispatcher() -> (Dispatcher, crate::testing::Probe) {
        let (counter, probe) = Counter::new();
        let mut d = Dispatcher::new(Box::new(counter), Arc::new(CodecRegistry::standard()));
        assert!(matches!(
            d.dispatch(hello(d.registry(), true)),
            Dispatch::Reply(Reply::Hello { .. })
        ));
        (d, probe)
    }

    fn call(object: u64, name: &str, args: Vec<Value>) -> Request {
        Request::Call {
            object,
            name: name.to_string(),
            args,
            kwargs: Vec::new(),
            reply: true,
        }
    }

    fn value(dispatch: Dispatch) -> Value {
        match dispatch {
            Dispatch::Reply(Reply::Value(v)) => v,
            other => panic!("expected a value reply, got {:?}", other),
        }
    }

    fn error(dispatch: Dispatch) -> RemoteError {
        match dispatch {
            Dispatch::Reply(Reply::Error(e)) => e,
            other => panic!("expected an error reply, got {:?}", other),
        }
    }

    #[test]
    fn test_requests_before_hello_are_rejected() {
        let (counter, _) = Counter::new();
        let mut d = Dispatcher::new(Box::new(counter), Arc::new(CodecRegistry::standard()));
        let out = d.dispatch(Request::GetAttr {
            object: ROOT_OBJECT,
            name: "count".into(),
        });
        assert!(matches!(out, Dispatch::Reject(Reply::Error(_))));
    }

    #[test]
    fn test_hello_with_other_registry_is_rejected() {
        let (counter, _) = Counter::new();
        let mut d = Dispatcher::new(Box::new(counter), Arc::new(CodecRegistry::standard()));
        let out = d.dispatch(Request::Hello {
            version: PROTOCOL_VERSION,
            codecs: vec!["ndarray.object".into(), "ndarray".into()],
            allow_public_attrs: true,
        });
        match out {
            Dispatch::Reject(Reply::Error(e)) => assert_eq!(e.kind, "RegistryMismatch"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_attributes_and_calls_reach_the_target() {
        let (mut d, _) = dispatcher();
        assert_eq!(value(d.dispatch(call(0, "increment", vec![Value::from(5)]))), Value::Int(5));
        assert_eq!(
            value(d.dispatch(Request::GetAttr {
                object: 0,
                name: "count".into()
            })),
            Value::Int(5)
        );
        assert_eq!(
            value(d.dispatch(Request::SetAttr {
                object: 0,
                name: "count".into(),
                value: Value::from(1),
            })),
            Value::None
        );
        assert_eq!(value(d.dispatch(call(0, "increment", vec![]))), Value::Int(2));
    }

    #[test]
    fn test_missing_names_keep_the_target_error() {
        let (mut d, _) = dispatcher();
        let err = error(d.dispatch(call(0, "frobnicate", vec![])));
        assert_eq!(err.kind, "AttributeError");
        assert_eq!(err.message, "'Counter' object has no attribute 'frobnicate'");
    }

    #[test]
    fn test_stop_is_intercepted() {
        let (mut d, probe) = dispatcher();
        assert_eq!(d.dispatch(call(0, "stop", vec![])), Dispatch::Stop);
        assert_eq!(probe.stop_calls(), 0);
        let err = error(d.dispatch(Request::GetAttr {
            object: 0,
            name: "stop".into(),
        }));
        assert_eq!(err.kind, "AttributeError");
    }

    #[test]
    fn test_exposed_stop_is_intercepted() {
        let (mut d, probe) = dispatcher();
        let err = error(d.dispatch(Request::GetAttr {
            object: 0,
            name: "exposed_stop".into(),
        }));
        assert_eq!(err.kind, "AttributeError");
        let err = error(d.dispatch(Request::SetAttr {
            object: 0,
            name: "exposed_stop".into(),
            value: Value::None,
        }));
        assert_eq!(err.kind, "AttributeError");

        assert_eq!(d.dispatch(call(0, "exposed_stop", vec![])), Dispatch::Stop);
        assert_eq!(probe.stop_calls(), 0);
    }

    #[test]
    fn test_name_policy() {
        let (mut d, _) = dispatcher();
        let err = error(d.dispatch(call(0, "_secret", vec![])));
        assert!(err.message.contains("private"));
        assert_eq!(
            value(d.dispatch(call(0, "exposed_increment", vec![]))),
            Value::Int(1)
        );

        let (counter, _) = Counter::new();
        let mut strict = Dispatcher::new(Box::new(counter), Arc::new(CodecRegistry::standard()));
        strict.dispatch(hello(strict.registry(), false));
        assert_eq!(error(strict.dispatch(call(0, "increment", vec![]))).kind, "AttributeError");
        assert_eq!(
            value(strict.dispatch(call(0, "exposed_increment", vec![]))),
            Value::Int(1)
        );
    }

    #[test]
    fn test_returned_objects_are_registered_and_released() {
        let (mut d, _) = dispatcher();
        let child = value(d.dispatch(call(0, "child", vec![Value::from("left")])));
        let remote = child.as_remote().cloned().unwrap();
        assert_eq!(remote.type_name, "Child");
        assert_eq!(d.object_count(), 2);

        let name = value(d.dispatch(Request::GetAttr {
            object: remote.id,
            name: "name".into(),
        }));
        assert_eq!(name, Value::from("left"));

        // handed back as an argument, the reference resolves to the local handle
        let echoed = value(d.dispatch(call(0, "echo", vec![child.clone()])));
        assert_eq!(echoed, Value::from("child:left"));

        assert_eq!(d.dispatch(Request::Release { object: remote.id }), Dispatch::NoReply);
        assert_eq!(d.object_count(), 1);
        let err = error(d.dispatch(Request::GetAttr {
            object: remote.id,
            name: "name".into(),
        }));
        assert_eq!(err.kind, "ReferenceError");
    }

    #[test]
    fn test_fire_and_forget_failures_are_swallowed() {
        let (mut d, _) = dispatcher();
        let out = d.dispatch(Request::Call {
            object: 0,
            name: "explode".into(),
            args: vec![],
            kwargs: vec![],
            reply: false,
        });
        assert_eq!(out, Dispatch::NoReply);
    }

    #[test]
    fn test_close_runs_once() {
        let (mut d, probe) = dispatcher();
        d.close();
        d.close();
        assert_eq!(probe.close_calls(), 1);
        assert!(d.is_closed());
        assert_eq!(d.dispatch(call(0, "increment", vec![])), Dispatch::Stop);
    }
}
