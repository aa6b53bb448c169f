//! Script value representation
//!
//! `Value` is the tagged union every runtime primitive produces and
//! consumes. Primitive variants are stored inline; reference variants
//! (tables, functions, userdata, channels) are reference-counted handles
//! that compare by identity.

use std::fmt;
use std::rc::Rc;

use crate::channel::Channel;
use crate::function::Function;
use crate::table::Table;
use crate::userdata::UserData;

/// Type tag of a script value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// The absent value
    Nil,
    /// `true` / `false`
    Bool,
    /// Double precision number
    Number,
    /// Immutable string
    String,
    /// Associative array
    Table,
    /// Callable
    Function,
    /// Opaque host handle
    UserData,
    /// Builtin channel
    Channel,
}

impl ValueType {
    /// Script-visible name of the type
    pub const fn name(self) -> &'static str {
        match self {
            ValueType::Nil => "nil",
            ValueType::Bool => "boolean",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Table => "table",
            ValueType::Function => "function",
            ValueType::UserData => "userdata",
            ValueType::Channel => "channel",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A script value.
#[derive(Clone, Default)]
pub enum Value {
    /// Nil
    #[default]
    Nil,
    /// Boolean
    Bool(bool),
    /// Number
    Number(f64),
    /// String
    String(Rc<str>),
    /// Table handle
    Table(Table),
    /// Function handle
    Function(Function),
    /// Userdata handle
    UserData(UserData),
    /// Channel handle
    Channel(Channel),
}

impl Value {
    /// Create a string value
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    /// Get the type tag
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Nil => ValueType::Nil,
            Value::Bool(_) => ValueType::Bool,
            Value::Number(_) => ValueType::Number,
            Value::String(_) => ValueType::String,
            Value::Table(_) => ValueType::Table,
            Value::Function(_) => ValueType::Function,
            Value::UserData(_) => ValueType::UserData,
            Value::Channel(_) => ValueType::Channel,
        }
    }

    /// Get the script-visible type name
    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    /// Check if this is nil
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Everything except nil and false is truthy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Get as boolean if this is a bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as number if this is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as string slice if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as table if this is a table
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Get as function if this is a function
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Get as userdata if this is a userdata
    pub fn as_userdata(&self) -> Option<&UserData> {
        match self {
            Value::UserData(u) => Some(u),
            _ => None,
        }
    }

    /// Get as channel if this is a channel
    pub fn as_channel(&self) -> Option<&Channel> {
        match self {
            Value::Channel(c) => Some(c),
            _ => None,
        }
    }

    /// Identity of a reference value, used for hashing table keys
    pub(crate) fn ref_id(&self) -> Option<usize> {
        match self {
            Value::Table(t) => Some(t.id()),
            Value::Function(f) => Some(f.id()),
            Value::UserData(u) => Some(u.id()),
            Value::Channel(c) => Some(c.id()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::UserData(a), Value::UserData(b)) => a.ptr_eq(b),
            (Value::Channel(a), Value::Channel(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Table(t) => fmt::Debug::fmt(t, f),
            Value::Function(func) => write!(f, "function '{}': {:#x}", func.name(), func.id()),
            Value::UserData(u) => fmt::Debug::fmt(u, f),
            Value::Channel(c) => fmt::Debug::fmt(c, f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Table> for Value {
    fn from(t: Table) -> Self {
        Value::Table(t)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<UserData> for Value {
    fn from(u: UserData) -> Self {
        Value::UserData(u)
    }
}

impl From<Channel> for Value {
    fn from(c: Channel) -> Self {
        Value::Channel(c)
    }
}
