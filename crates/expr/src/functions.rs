//! Defines the registry that maps function names to callables.
use crate::builtins;
use crate::value::{Args, FunctionRef, FunctionResult, NativeFn, Returned, native};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// A name → function table.
///
/// Cloning is cheap: the table is shared until one of the clones is mutated,
/// at which point that clone takes a private copy. A transform therefore works
/// on a snapshot that later registrations cannot disturb.
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: Arc<HashMap<String, NativeFn>>,
}

impl FunctionRegistry {
    /// Creates a new, empty function registry.
    pub fn new() -> Self {
        Self {
            functions: Arc::new(HashMap::new()),
        }
    }

    /// Registers a function, replacing (shadowing) any previous one with that name.
    pub fn register(&mut self, name: impl Into<String>, func: NativeFn) {
        Arc::make_mut(&mut self.functions).insert(name.into(), func);
    }

    /// Registers a synchronous function over plain JSON arguments.
    /// Absent arguments are passed as `null`.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> FunctionResult + Send + Sync + 'static,
    {
        self.register(name, native(move |args: Args<'_>| Returned::Ready(f(&args.to_values()))));
    }

    /// Registers a function whose result is produced by a future.
    pub fn register_async<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FunctionResult> + Send + 'static,
    {
        self.register(
            name,
            native(move |args: Args<'_>| Returned::Deferred(Box::pin(f(args.into_values())))),
        );
    }

    /// Removes a function. Returns whether it was present.
    pub fn unregister(&mut self, name: &str) -> bool {
        if !self.functions.contains_key(name) {
            return false;
        }
        Arc::make_mut(&mut self.functions).remove(name).is_some()
    }

    /// Finds a function by name (case-sensitive).
    pub fn get(&self, name: &str) -> Option<FunctionRef> {
        self.functions
            .get(name)
            .map(|func| FunctionRef::new(name, Arc::clone(func)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for FunctionRegistry {
    /// Creates a new registry populated with all built-in functions.
    fn default() -> Self {
        let mut registry = Self::new();
        builtins::install(&mut registry);
        registry
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}
