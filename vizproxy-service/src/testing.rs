//! Targets shared by the unit tests

use std::cell::Cell;
use std::rc::Rc;
use tokio::io::DuplexStream;
use vizproxy_wire::{
    decode_reply, encode_request, CodecRegistry, Connection, Reply, Request, Value,
    PROTOCOL_VERSION,
};

use crate::target::{CallArgs, RemoteTarget, Returned, TargetError};

/// A value no codec accepts
#[derive(Debug, PartialEq)]
pub struct OpenFile(pub u32);

pub fn hello(registry: &CodecRegistry, allow_public_attrs: bool) -> Request {
    Request::Hello {
        version: PROTOCOL_VERSION,
        codecs: registry.fingerprint(),
        allow_public_attrs,
    }
}

/// Minimal host side of a connection
pub struct Client {
    pub conn: Connection<DuplexStream>,
    pub registry: CodecRegistry,
    seq: u32,
}

impl Client {
    pub fn new(stream: DuplexStream) -> Self {
        Self {
            conn: Connection::new(stream),
            registry: CodecRegistry::standard(),
            seq: 0,
        }
    }

    pub async fn send(&mut self, request: &Request) -> u32 {
        self.seq += 1;
        let frame = encode_request(&self.registry, self.seq, request).unwrap();
        self.conn.send_frame(&frame).await.unwrap();
        self.seq
    }

    pub async fn recv(&mut self) -> (u32, Reply) {
        let frame = self.conn.recv_frame().await.unwrap();
        decode_reply(&self.registry, &frame).unwrap()
    }

    pub async fn request(&mut self, request: &Request) -> Reply {
        let seq = self.send(request).await;
        let (got, reply) = self.recv().await;
        assert_eq!(got, seq);
        reply
    }

    /// Queue a hello without waiting for the reply
    pub async fn send_hello(&mut self) -> u32 {
        let hello = hello(&self.registry, true);
        self.send(&hello).await
    }

    pub async fn greet(&mut self) {
        let hello = hello(&self.registry, true);
        assert!(matches!(self.request(&hello).await, Reply::Hello { .. }));
    }
}

pub fn call(name: &str, args: Vec<Value>) -> Request {
    Request::Call {
        object: 0,
        name: name.to_string(),
        args,
        kwargs: Vec::new(),
        reply: true,
    }
}

/// Observes a [`Counter`] after it moved into a dispatcher
#[derive(Clone, Default)]
pub struct Probe {
    closes: Rc<Cell<u32>>,
    stops: Rc<Cell<u32>>,
    ticks: Rc<Cell<u32>>,
}

impl Probe {
    pub fn close_calls(&self) -> u32 {
        self.closes.get()
    }

    pub fn stop_calls(&self) -> u32 {
        self.stops.get()
    }

    pub fn ticks(&self) -> u32 {
        self.ticks.get()
    }

    pub fn tick(&self) {
        self.ticks.set(self.ticks.get() + 1);
    }
}

pub struct Counter {
    count: i64,
    probe: Probe,
}

impl Counter {
    pub fn new() -> (Self, Probe) {
        let probe = Probe::default();
        (
            Self {
                count: 0,
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl RemoteTarget for Counter {
    fn type_name(&self) -> &str {
        "Counter"
    }

    fn get_attr(&self, name: &str) -> Result<Returned, TargetError> {
        match name {
            "count" => Ok(Returned::value(self.count)),
            "ticks" => Ok(Returned::value(self.probe.ticks())),
            _ => Err(TargetError::no_attribute(self.type_name(), name)),
        }
    }

    fn set_attr(&mut self, name: &str, value: Value) -> Result<(), TargetError> {
        match name {
            "count" => {
                self.count = value
                    .as_i64()
                    .ok_or_else(|| TargetError::type_error("count must be an int"))?;
                Ok(())
            }
            _ => Err(TargetError::no_attribute(self.type_name(), name)),
        }
    }

    fn call(&mut self, name: &str, args: CallArgs) -> Result<Returned, TargetError> {
        match name {
            "increment" => {
                let by = args.get(0, "by").and_then(Value::as_i64).unwrap_or(1);
                self.count += by;
                Ok(Returned::value(self.count))
            }
            "child" => {
                let name = args.str_arg(0, "name")?.unwrap_or("anonymous").to_string();
                Ok(Returned::object(Child { name }))
            }
            "echo" => Ok(Returned::Value(args.require(0, "value")?.clone())),
            "opaque" => Ok(Returned::Value(Value::ext(OpenFile(3)))),
            "explode" => Err(TargetError::runtime("boom")),
            "stop" => {
                self.probe.stops.set(self.probe.stops.get() + 1);
                Ok(Returned::none())
            }
            _ => Err(TargetError::no_attribute(self.type_name(), name)),
        }
    }

    fn close(&mut self) {
        self.probe.closes.set(self.probe.closes.get() + 1);
    }
}

pub struct Child {
    name: String,
}

impl RemoteTarget for Child {
    fn type_name(&self) -> &str {
        "Child"
    }

    fn get_attr(&self, name: &str) -> Result<Returned, TargetError> {
        match name {
            "name" => Ok(Returned::value(self.name.as_str())),
            _ => Err(TargetError::no_attribute(self.type_name(), name)),
        }
    }

    fn call(&mut self, name: &str, _args: CallArgs) -> Result<Returned, TargetError> {
        Err(TargetError::no_attribute(self.type_name(), name))
    }

    fn handle(&self) -> Option<Value> {
        Some(Value::from(format!("child:{}", self.name)))
    }
}
