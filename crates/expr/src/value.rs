//! Values flowing through expression evaluation and the calling convention
//! shared by builtin and user-registered functions.
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

static NULL: Value = Value::Null;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The error a function body reports. The evaluator attaches the function name.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct FunctionError {
    pub message: String,
}

impl FunctionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for FunctionError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for FunctionError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

pub type FunctionResult = Result<Value, FunctionError>;

/// What a function invocation hands back: a value now, or one to be awaited.
pub enum Returned<'a> {
    Ready(FunctionResult),
    Deferred(BoxFuture<'a, FunctionResult>),
}

impl<'a> Returned<'a> {
    /// Awaits the deferred result, if any.
    pub async fn resolve(self) -> FunctionResult {
        match self {
            Returned::Ready(result) => result,
            Returned::Deferred(future) => future.await,
        }
    }
}

impl From<FunctionResult> for Returned<'_> {
    fn from(result: FunctionResult) -> Self {
        Returned::Ready(result)
    }
}

/// The fixed-shape callable stored in a function table.
pub type NativeFn = Arc<dyn for<'a> Fn(Args<'a>) -> Returned<'a> + Send + Sync>;

/// Wraps a closure as a [`NativeFn`], pinning down its higher-ranked signature.
pub fn native<F>(f: F) -> NativeFn
where
    F: for<'a> Fn(Args<'a>) -> Returned<'a> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A function resolved from a bare identifier, passed around as a value.
#[derive(Clone)]
pub struct FunctionRef {
    name: String,
    func: NativeFn,
}

impl FunctionRef {
    pub fn new(name: impl Into<String>, func: NativeFn) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call<'a>(&self, args: Args<'a>) -> Returned<'a> {
        (self.func)(args)
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRef").field("name", &self.name).finish()
    }
}

/// An intermediate result of expression evaluation.
#[derive(Debug, Clone)]
pub enum Datum {
    /// The absent-value sentinel. Distinct from JSON `null`.
    Absent,
    Json(Value),
    Function(FunctionRef),
}

impl Datum {
    /// Converts to a JSON value; functions have no JSON form and become absent.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Datum::Json(value) => Some(value),
            Datum::Absent | Datum::Function(_) => None,
        }
    }

    /// Borrows the JSON view of this datum, reading anything else as `null`.
    pub fn as_value(&self) -> &Value {
        match self {
            Datum::Json(value) => value,
            Datum::Absent | Datum::Function(_) => &NULL,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Datum::Absent)
    }
}

impl From<Value> for Datum {
    fn from(value: Value) -> Self {
        Datum::Json(value)
    }
}

impl From<Option<Value>> for Datum {
    fn from(value: Option<Value>) -> Self {
        value.map(Datum::Json).unwrap_or(Datum::Absent)
    }
}

/// Evaluated arguments of a single call, in source order.
///
/// `root` is the document the transform started from; it is never rebound
/// by nested template dispatch.
#[derive(Debug, Clone)]
pub struct Args<'a> {
    items: Vec<Datum>,
    root: &'a Value,
}

impl<'a> Args<'a> {
    pub fn new(items: Vec<Datum>, root: &'a Value) -> Self {
        Self { items, root }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The argument at `index` as JSON; absent, missing and function
    /// arguments read as `null`.
    pub fn get(&self, index: usize) -> &Value {
        self.items.get(index).map(Datum::as_value).unwrap_or(&NULL)
    }

    /// True when the argument was supplied and is not absent.
    pub fn is_present(&self, index: usize) -> bool {
        self.items.get(index).is_some_and(|d| !d.is_absent())
    }

    pub fn function(&self, index: usize) -> Option<&FunctionRef> {
        match self.items.get(index) {
            Some(Datum::Function(f)) => Some(f),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter().map(Datum::as_value)
    }

    pub fn root(&self) -> &'a Value {
        self.root
    }

    pub fn to_values(&self) -> Vec<Value> {
        self.iter().cloned().collect()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.items
            .into_iter()
            .map(|d| d.into_value().unwrap_or(Value::Null))
            .collect()
    }
}
