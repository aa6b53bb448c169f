//! Runtime state
//!
//! `Vm` owns the value stack, the call frames, the globals table and the
//! registry of named type metatables. Native functions see a window of the
//! stack (their frame): arguments start at index 1 and results are pushed
//! on top.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::config::VmConfig;
use crate::error::{VmError, VmResult};
use crate::function::Function;
use crate::table::Table;
use crate::userdata::UserData;
use crate::value::Value;

/// Longest `__index` / `__newindex` chain followed before giving up
const MAX_META_CHAIN: usize = 100;

struct Frame {
    /// Stack index of the first argument
    base: usize,
    function: Function,
}

struct VmState {
    config: VmConfig,
    stack: RefCell<Vec<Value>>,
    frames: RefCell<Vec<Frame>>,
    globals: Table,
    type_metatables: RefCell<FxHashMap<String, Table>>,
    preload: Table,
    loaded: Table,
}

/// Handle to a runtime instance.
///
/// Cloning is cheap and every clone refers to the same state.
#[derive(Clone)]
pub struct Vm(Rc<VmState>);

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// Create a runtime with the default limits
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// Create a runtime with explicit limits
    pub fn with_config(config: VmConfig) -> Self {
        let vm = Vm(Rc::new(VmState {
            config,
            stack: RefCell::new(Vec::new()),
            frames: RefCell::new(Vec::new()),
            globals: Table::new(),
            type_metatables: RefCell::new(FxHashMap::default()),
            preload: Table::new(),
            loaded: Table::new(),
        }));
        vm.open_base();
        vm
    }

    /// Runtime limits
    pub fn config(&self) -> &VmConfig {
        &self.0.config
    }

    /// Check whether two handles refer to the same runtime
    pub fn ptr_eq(&self, other: &Vm) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ========================================================================
    // Frame access
    // ========================================================================

    fn base(&self) -> usize {
        self.0.frames.borrow().last().map(|f| f.base).unwrap_or(0)
    }

    /// Number of values in the current frame
    pub fn top(&self) -> usize {
        self.0.stack.borrow().len() - self.base()
    }

    /// Get the value at 1-based frame position `n` (nil past the top)
    pub fn arg(&self, n: usize) -> Value {
        if n == 0 {
            return Value::Nil;
        }
        let index = self.base() + n - 1;
        self.0.stack.borrow().get(index).cloned().unwrap_or_default()
    }

    /// Alias of [`arg`](Self::arg) for reading values pushed by the caller
    pub fn get(&self, n: usize) -> Value {
        self.arg(n)
    }

    /// All values in the current frame
    pub fn args(&self) -> Vec<Value> {
        let base = self.base();
        self.0.stack.borrow()[base..].to_vec()
    }

    /// Push a value on top of the current frame
    pub fn push(&self, value: impl Into<Value>) {
        self.0.stack.borrow_mut().push(value.into());
    }

    /// Name of the function owning the current frame
    pub fn current_function_name(&self) -> String {
        self.0
            .frames
            .borrow()
            .last()
            .map(|f| f.function.name().to_string())
            .unwrap_or_else(|| "?".to_string())
    }

    /// Current call depth
    pub fn depth(&self) -> usize {
        self.0.frames.borrow().len()
    }

    /// Build an argument error for the current function
    pub fn arg_error(&self, position: usize, message: impl Into<String>) -> VmError {
        VmError::Argument {
            position,
            function: self.current_function_name(),
            message: message.into(),
        }
    }

    /// Build a runtime error
    pub fn runtime_error(&self, message: impl Into<String>) -> VmError {
        VmError::runtime(message)
    }

    /// Require argument `n` to be a userdata
    pub fn check_userdata(&self, n: usize) -> VmResult<UserData> {
        match self.arg(n) {
            Value::UserData(ud) => Ok(ud),
            other => Err(self.arg_error(
                n,
                format!("userdata expected, got {}", other.type_name()),
            )),
        }
    }

    /// Require argument `n` to be a table
    pub fn check_table(&self, n: usize) -> VmResult<Table> {
        match self.arg(n) {
            Value::Table(t) => Ok(t),
            other => Err(self.arg_error(n, format!("table expected, got {}", other.type_name()))),
        }
    }

    /// Require argument `n` to be a string
    pub fn check_string(&self, n: usize) -> VmResult<Rc<str>> {
        match self.arg(n) {
            Value::String(s) => Ok(s),
            other => Err(self.arg_error(
                n,
                format!("string expected, got {}", other.type_name()),
            )),
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Call a value.
    ///
    /// Results are adjusted to `nret` values when given (padding with nil),
    /// otherwise every pushed result is returned. The stack is restored to its
    /// previous height whether the call succeeds or fails.
    pub fn call(&self, func: &Value, args: &[Value], nret: Option<usize>) -> VmResult<Vec<Value>> {
        let (function, args) = self.resolve_callable(func, args)?;

        if self.depth() >= self.0.config.max_call_depth {
            return Err(VmError::StackOverflow(self.0.config.max_call_depth));
        }
        let base = {
            let mut stack = self.0.stack.borrow_mut();
            if stack.len() + args.len() > self.0.config.max_stack {
                return Err(VmError::runtime("value stack overflow"));
            }
            let base = stack.len();
            stack.extend(args.iter().cloned());
            base
        };
        self.0.frames.borrow_mut().push(Frame {
            base,
            function: function.clone(),
        });

        let outcome = function.invoke(self);

        self.0.frames.borrow_mut().pop();
        let mut stack = self.0.stack.borrow_mut();
        let result = outcome.map(|pushed| {
            let available = stack.len().saturating_sub(base);
            let start = stack.len() - pushed.min(available);
            let mut results: Vec<Value> = stack[start..].to_vec();
            if let Some(n) = nret {
                results.resize(n, Value::Nil);
            }
            results
        });
        stack.truncate(base);
        result
    }

    /// Protected call.
    ///
    /// Like [`call`](Self::call), but a panic raised by a native function is
    /// caught and reported as [`VmError::Panic`], and the frames are unwound
    /// to where they were.
    pub fn pcall(&self, func: &Value, args: &[Value], nret: Option<usize>) -> VmResult<Vec<Value>> {
        let stack_height = self.0.stack.borrow().len();
        let depth = self.depth();

        match panic::catch_unwind(AssertUnwindSafe(|| self.call(func, args, nret))) {
            Ok(result) => result,
            Err(payload) => {
                self.0.frames.borrow_mut().truncate(depth);
                self.0.stack.borrow_mut().truncate(stack_height);
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::warn!(%message, "native function panicked inside pcall");
                Err(VmError::Panic(message))
            }
        }
    }

    /// Call `obj:name(args...)`
    pub fn call_method(
        &self,
        obj: &Value,
        name: &str,
        args: &[Value],
        nret: Option<usize>,
    ) -> VmResult<Vec<Value>> {
        let method = self.get_field(obj, name)?;
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(obj.clone());
        full.extend_from_slice(args);
        self.call(&method, &full, nret)
    }

    fn resolve_callable(&self, func: &Value, args: &[Value]) -> VmResult<(Function, Vec<Value>)> {
        match func {
            Value::Function(f) => Ok((f.clone(), args.to_vec())),
            Value::Table(_) | Value::UserData(_) => match self.metamethod(func, "__call") {
                Value::Function(f) => {
                    let mut full = Vec::with_capacity(args.len() + 1);
                    full.push(func.clone());
                    full.extend_from_slice(args);
                    Ok((f, full))
                }
                _ => Err(VmError::NotCallable(func.value_type())),
            },
            other => Err(VmError::NotCallable(other.value_type())),
        }
    }

    // ========================================================================
    // Indexing
    // ========================================================================

    fn metamethod(&self, value: &Value, event: &str) -> Value {
        match value {
            Value::Table(t) => t.metamethod(event),
            Value::UserData(ud) => ud.metamethod(event),
            _ => Value::Nil,
        }
    }

    /// `obj[key]`, honoring `__index`
    pub fn index(&self, obj: &Value, key: &Value) -> VmResult<Value> {
        let mut current = obj.clone();
        for _ in 0..MAX_META_CHAIN {
            let handler = match &current {
                Value::Table(t) => {
                    let raw = t.raw_get(key);
                    if !raw.is_nil() {
                        return Ok(raw);
                    }
                    match t.metamethod("__index") {
                        Value::Nil => return Ok(Value::Nil),
                        h => h,
                    }
                }
                Value::UserData(ud) => match ud.metamethod("__index") {
                    Value::Nil => return Err(VmError::NotIndexable(current.value_type())),
                    h => h,
                },
                other => return Err(VmError::NotIndexable(other.value_type())),
            };
            if let Value::Function(_) = handler {
                let mut out = self.call(&handler, &[current, key.clone()], Some(1))?;
                return Ok(out.pop().unwrap_or_default());
            }
            current = handler;
        }
        Err(VmError::runtime("'__index' chain too long; possible loop"))
    }

    /// `obj[key] = value`, honoring `__newindex`
    pub fn set_index(&self, obj: &Value, key: Value, value: Value) -> VmResult<()> {
        let mut current = obj.clone();
        for _ in 0..MAX_META_CHAIN {
            let handler = match &current {
                Value::Table(t) => {
                    let handler = t.metamethod("__newindex");
                    if handler.is_nil() || !t.raw_get(&key).is_nil() {
                        return t.raw_set(key, value);
                    }
                    handler
                }
                Value::UserData(ud) => match ud.metamethod("__newindex") {
                    Value::Nil => return Err(VmError::NotIndexable(current.value_type())),
                    h => h,
                },
                other => return Err(VmError::NotIndexable(other.value_type())),
            };
            if let Value::Function(_) = handler {
                self.call(&handler, &[current, key, value], Some(0))?;
                return Ok(());
            }
            current = handler;
        }
        Err(VmError::runtime("'__newindex' chain too long; possible loop"))
    }

    /// `obj.name`
    pub fn get_field(&self, obj: &Value, name: &str) -> VmResult<Value> {
        self.index(obj, &Value::string(name))
    }

    /// `obj.name = value`
    pub fn set_field(&self, obj: &Value, name: &str, value: impl Into<Value>) -> VmResult<()> {
        self.set_index(obj, Value::string(name), value.into())
    }

    // ========================================================================
    // Globals and metatables
    // ========================================================================

    /// The globals table
    pub fn globals(&self) -> Table {
        self.0.globals.clone()
    }

    /// Read a global
    pub fn get_global(&self, name: &str) -> Value {
        self.0.globals.get(name)
    }

    /// Write a global
    pub fn set_global(&self, name: &str, value: impl Into<Value>) {
        self.0.globals.set(name, value);
    }

    /// Install a native function as a global
    pub fn register<F>(&self, name: &str, body: F)
    where
        F: Fn(&Vm) -> VmResult<usize> + 'static,
    {
        self.set_global(name, Function::new(name, body));
    }

    /// Get or create the metatable registered under `name`.
    ///
    /// Returns the table and whether it was newly created.
    pub fn new_type_metatable(&self, name: &str) -> (Table, bool) {
        let mut metatables = self.0.type_metatables.borrow_mut();
        if let Some(existing) = metatables.get(name) {
            return (existing.clone(), false);
        }
        let mt = Table::new();
        metatables.insert(name.to_string(), mt.clone());
        (mt, true)
    }

    /// Get the metatable registered under `name`
    pub fn type_metatable(&self, name: &str) -> Option<Table> {
        self.0.type_metatables.borrow().get(name).cloned()
    }

    // ========================================================================
    // Modules
    // ========================================================================

    /// Register a loader for `require(name)`
    pub fn preload(&self, name: &str, loader: Function) {
        tracing::debug!(module = name, "preloading module");
        self.0.preload.set(name, loader);
    }

    /// Load a module once and return its value
    pub fn require(&self, name: &str) -> VmResult<Value> {
        let cached = self.0.loaded.get(name);
        if !cached.is_nil() {
            return Ok(cached);
        }
        let loader = self.0.preload.get(name);
        if loader.is_nil() {
            return Err(VmError::ModuleNotFound(name.to_string()));
        }
        tracing::debug!(module = name, "loading module");
        let mut out = self.call(&loader, &[Value::string(name)], Some(1))?;
        let module = match out.pop().unwrap_or_default() {
            Value::Nil => Value::Bool(true),
            v => v,
        };
        self.0.loaded.set(name, module.clone());
        Ok(module)
    }

    fn open_base(&self) {
        self.register("require", |vm| {
            let name = vm.check_string(1)?;
            let module = vm.require(&name)?;
            vm.push(module);
            Ok(1)
        });
        self.register("type", |vm| {
            if vm.top() == 0 {
                return Err(vm.arg_error(1, "value expected"));
            }
            vm.push(vm.arg(1).type_name());
            Ok(1)
        });
        self.register("pcall", |vm| {
            if vm.top() == 0 {
                return Err(vm.arg_error(1, "value expected"));
            }
            let args = vm.args();
            match vm.pcall(&args[0], &args[1..], None) {
                Ok(results) => {
                    vm.push(true);
                    let n = results.len();
                    for r in results {
                        vm.push(r);
                    }
                    Ok(n + 1)
                }
                Err(e) => {
                    vm.push(false);
                    vm.push(e.to_string());
                    Ok(2)
                }
            }
        });
    }
}
