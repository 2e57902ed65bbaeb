//! The wrapped-target seam
//!
//! A [`RemoteTarget`] is the object that lives only in the worker. The
//! dispatcher resolves every remote attribute access and call against it by
//! name. Targets are owned by the worker's single thread, so the trait does
//! not require `Send`.

use std::fmt;
use vizproxy_wire::{RemoteError, Value};

/// Kind of failure raised by a wrapped target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Attribute,
    Type,
    Value,
    Runtime,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Attribute => "AttributeError",
            ErrorKind::Type => "TypeError",
            ErrorKind::Value => "ValueError",
            ErrorKind::Runtime => "RuntimeError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error produced by a wrapped target; travels back to the host verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TargetError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The lookup error for a name the target does not have
    pub fn no_attribute(type_name: &str, name: &str) -> Self {
        Self::new(
            ErrorKind::Attribute,
            format!("'{}' object has no attribute '{}'", type_name, name),
        )
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Value, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TargetError {}

impl From<TargetError> for RemoteError {
    fn from(err: TargetError) -> Self {
        RemoteError::new(err.kind.as_str(), err.message)
    }
}

/// Positional and keyword arguments of a remote call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub args: Vec<Value>,
    pub kwargs: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn new(args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Self {
        Self { args, kwargs }
    }

    pub fn positional(args: Vec<Value>) -> Self {
        Self {
            args,
            kwargs: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }

    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.kwargs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Argument by position, or by keyword when not given positionally
    pub fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.args.get(index).or_else(|| self.kwarg(name))
    }

    pub fn require(&self, index: usize, name: &str) -> Result<&Value, TargetError> {
        self.get(index, name).ok_or_else(|| {
            TargetError::type_error(format!("missing required argument '{}'", name))
        })
    }

    pub fn f64_or(&self, index: usize, name: &str, default: f64) -> Result<f64, TargetError> {
        match self.get(index, name) {
            None | Some(Value::None) => Ok(default),
            Some(value) => value.as_f64().ok_or_else(|| {
                TargetError::type_error(format!(
                    "argument '{}' must be a number, not {}",
                    name,
                    value.type_name()
                ))
            }),
        }
    }

    pub fn str_arg(&self, index: usize, name: &str) -> Result<Option<&str>, TargetError> {
        match self.get(index, name) {
            None | Some(Value::None) => Ok(None),
            Some(value) => value.as_str().map(Some).ok_or_else(|| {
                TargetError::type_error(format!(
                    "argument '{}' must be str, not {}",
                    name,
                    value.type_name()
                ))
            }),
        }
    }
}

/// What a target hands back from an attribute access or a call
pub enum Returned {
    /// A dumpable value, copied to the host
    Value(Value),
    /// An object that stays in the worker and is referenced remotely
    Object(Box<dyn RemoteTarget>),
    /// A tuple mixing values and objects
    Tuple(Vec<Returned>),
}

impl Returned {
    pub fn none() -> Self {
        Returned::Value(Value::None)
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Returned::Value(value.into())
    }

    pub fn object(target: impl RemoteTarget + 'static) -> Self {
        Returned::Object(Box::new(target))
    }
}

impl From<Value> for Returned {
    fn from(value: Value) -> Self {
        Returned::Value(value)
    }
}

impl fmt::Debug for Returned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Returned::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Returned::Object(t) => write!(f, "Object(<{}>)", t.type_name()),
            Returned::Tuple(items) => f.debug_tuple("Tuple").field(items).finish(),
        }
    }
}

/// An object served through the proxy
pub trait RemoteTarget {
    /// Runtime type name, shown in lookup errors and remote references
    fn type_name(&self) -> &str;

    fn get_attr(&self, name: &str) -> Result<Returned, TargetError>;

    fn set_attr(&mut self, name: &str, value: Value) -> Result<(), TargetError> {
        let _ = value;
        Err(TargetError::no_attribute(self.type_name(), name))
    }

    fn call(&mut self, name: &str, args: CallArgs) -> Result<Returned, TargetError>;

    /// Local stand-in used when the host passes this object back as an argument
    fn handle(&self) -> Option<Value> {
        None
    }

    /// Release resources; called once when the worker shuts down
    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_args_lookup() {
        let args = CallArgs::new(
            vec![Value::from(1.5)],
            vec![("label".to_string(), Value::from("line"))],
        );
        assert_eq!(args.f64_or(0, "x", 0.0).unwrap(), 1.5);
        assert_eq!(args.f64_or(3, "alpha", 0.25).unwrap(), 0.25);
        assert_eq!(args.str_arg(1, "label").unwrap(), Some("line"));
        assert!(args.str_arg(0, "x").is_err());
        assert_eq!(
            args.require(2, "fname").unwrap_err().kind,
            ErrorKind::Type
        );
    }

    #[test]
    fn test_no_attribute_message() {
        let err = TargetError::no_attribute("Figure", "frobnicate");
        assert_eq!(
            err.to_string(),
            "AttributeError: 'Figure' object has no attribute 'frobnicate'"
        );
        let remote: RemoteError = err.into();
        assert_eq!(remote.kind, "AttributeError");
    }
}
