//! Tables
//!
//! A table has an array part for the keys `1..=n` and a hash part that
//! remembers insertion order, so iteration is deterministic: array part
//! first, then hash entries in the order their keys were inserted. Removing
//! a key drops it from the order; assigning it again appends it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{VmError, VmResult};
use crate::value::Value;

/// Hashable projection of a non-nil key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(Rc<str>),
    Ref(usize),
}

impl Key {
    fn from_value(value: &Value) -> VmResult<Key> {
        match value {
            Value::Nil => Err(VmError::InvalidKey("nil")),
            Value::Bool(b) => Ok(Key::Bool(*b)),
            Value::Number(n) => {
                if n.is_nan() {
                    Err(VmError::InvalidKey("NaN"))
                } else {
                    Ok(number_key(*n))
                }
            }
            Value::String(s) => Ok(Key::Str(s.clone())),
            other => Ok(Key::Ref(other.ref_id().unwrap_or_default())),
        }
    }
}

fn number_key(n: f64) -> Key {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Key::Int(n as i64)
    } else {
        Key::Float(n.to_bits())
    }
}

/// Array index addressed by a numeric value, if any
fn array_index(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) if n.fract() == 0.0 && *n >= 1.0 && *n < i64::MAX as f64 => {
            Some(*n as i64)
        }
        _ => None,
    }
}

#[derive(Default)]
struct TableInner {
    array: Vec<Value>,
    entries: Vec<(Value, Value)>,
    index: FxHashMap<Key, usize>,
    /// Dead slots in `entries`
    tombstones: usize,
    metatable: Option<Table>,
}

/// Dead slots tolerated before the hash part is compacted
const MIN_TOMBSTONES: usize = 8;

impl TableInner {
    fn get(&self, key: &Value) -> Value {
        if let Some(i) = array_index(key) {
            if let Some(v) = self.array.get((i - 1) as usize) {
                return v.clone();
            }
        }
        match Key::from_value(key) {
            Ok(k) => self
                .index
                .get(&k)
                .map(|&slot| self.entries[slot].1.clone())
                .unwrap_or_default(),
            Err(_) => Value::Nil,
        }
    }

    fn set(&mut self, key: Value, value: Value) -> VmResult<()> {
        if let Some(i) = array_index(&key) {
            let len = self.array.len() as i64;
            if i <= len {
                self.array[(i - 1) as usize] = value;
                self.trim_array();
                return Ok(());
            }
            if i == len + 1 && !value.is_nil() {
                self.array.push(value);
                self.remove_entry(&Key::Int(i));
                self.migrate();
                return Ok(());
            }
        }

        let k = Key::from_value(&key)?;
        match self.index.get(&k).copied() {
            Some(_) if value.is_nil() => self.remove_entry(&k),
            Some(slot) => self.entries[slot].1 = value,
            None if value.is_nil() => {}
            None => {
                self.index.insert(k, self.entries.len());
                self.entries.push((key, value));
            }
        }
        Ok(())
    }

    /// Keep the array part free of trailing nils
    fn trim_array(&mut self) {
        while matches!(self.array.last(), Some(Value::Nil)) {
            self.array.pop();
        }
    }

    /// Move `n+1, n+2, ..` from the hash part into the array part
    fn migrate(&mut self) {
        loop {
            let next = Key::Int(self.array.len() as i64 + 1);
            let Some(slot) = self.index.remove(&next) else {
                break;
            };
            let value = std::mem::take(&mut self.entries[slot].1);
            self.tombstones += 1;
            self.array.push(value);
        }
        self.compact();
    }

    fn remove_entry(&mut self, key: &Key) {
        if let Some(slot) = self.index.remove(key) {
            self.entries[slot].1 = Value::Nil;
            self.tombstones += 1;
            self.compact();
        }
    }

    /// Drop dead slots once they make up half of the hash part
    fn compact(&mut self) {
        if self.tombstones < MIN_TOMBSTONES || self.tombstones * 2 < self.entries.len() {
            return;
        }
        self.entries.retain(|(_, v)| !v.is_nil());
        self.index.clear();
        for (slot, (key, _)) in self.entries.iter().enumerate() {
            if let Ok(k) = Key::from_value(key) {
                self.index.insert(k, slot);
            }
        }
        self.tombstones = 0;
    }
}

/// Shared handle to a table.
#[derive(Clone, Default)]
pub struct Table(Rc<RefCell<TableInner>>);

impl Table {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with room for `narr` array slots and `nrec` hash entries
    pub fn with_capacity(narr: usize, nrec: usize) -> Self {
        let mut index = FxHashMap::default();
        index.reserve(nrec);
        Table(Rc::new(RefCell::new(TableInner {
            array: Vec::with_capacity(narr),
            entries: Vec::with_capacity(nrec),
            index,
            tombstones: 0,
            metatable: None,
        })))
    }

    /// Read a key without consulting the metatable
    pub fn raw_get(&self, key: &Value) -> Value {
        self.0.borrow().get(key)
    }

    /// Write a key without consulting the metatable.
    ///
    /// Assigning nil removes the key. Nil and NaN keys are rejected.
    pub fn raw_set(&self, key: impl Into<Value>, value: impl Into<Value>) -> VmResult<()> {
        self.0.borrow_mut().set(key.into(), value.into())
    }

    /// Read a string key without consulting the metatable
    pub fn get(&self, name: &str) -> Value {
        self.raw_get(&Value::string(name))
    }

    /// Write a string key without consulting the metatable
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        // string keys are always valid
        let _ = self.raw_set(Value::string(name), value);
    }

    /// Read the integer key `i`
    pub fn get_index(&self, i: i64) -> Value {
        self.raw_get(&Value::Number(i as f64))
    }

    /// Append a value after the last array element
    pub fn push(&self, value: impl Into<Value>) {
        let value = value.into();
        let next = self.len() as f64 + 1.0;
        // integer keys are always valid
        let _ = self.raw_set(Value::Number(next), value);
    }

    /// Length of the array part
    pub fn len(&self) -> usize {
        self.0.borrow().array.len()
    }

    /// True when the table has no live entries
    pub fn is_empty(&self) -> bool {
        let inner = self.0.borrow();
        inner.array.is_empty() && inner.entries.iter().all(|(_, v)| v.is_nil())
    }

    /// Largest positive integer key holding a value.
    ///
    /// Returns `None` when some live key is not a positive integer, i.e.
    /// the table is not a sequence. Holes below the result read as nil.
    pub fn sequence_len(&self) -> Option<usize> {
        let inner = self.0.borrow();
        let mut len = inner.array.len();
        for (k, v) in &inner.entries {
            if v.is_nil() {
                continue;
            }
            let i = usize::try_from(array_index(k)?).ok()?;
            len = len.max(i);
        }
        Some(len)
    }

    /// Number of slots held by the hash part, dead ones included
    pub fn hash_capacity(&self) -> usize {
        self.0.borrow().entries.len()
    }

    /// Snapshot of all live key/value pairs in iteration order
    pub fn pairs(&self) -> Vec<(Value, Value)> {
        let inner = self.0.borrow();
        let mut out = Vec::with_capacity(inner.array.len() + inner.entries.len());
        for (i, v) in inner.array.iter().enumerate() {
            if !v.is_nil() {
                out.push((Value::Number((i + 1) as f64), v.clone()));
            }
        }
        for (k, v) in &inner.entries {
            if !v.is_nil() {
                out.push((k.clone(), v.clone()));
            }
        }
        out
    }

    /// Get the metatable
    pub fn metatable(&self) -> Option<Table> {
        self.0.borrow().metatable.clone()
    }

    /// Set or clear the metatable
    pub fn set_metatable(&self, metatable: Option<Table>) {
        self.0.borrow_mut().metatable = metatable;
    }

    /// Look up a metamethod (e.g. `__index`) on the metatable
    pub fn metamethod(&self, event: &str) -> Value {
        self.metatable()
            .map(|mt| mt.get(event))
            .unwrap_or_default()
    }

    /// Identity of the underlying allocation
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Check whether two handles refer to the same table
    pub fn ptr_eq(&self, other: &Table) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table: {:#x}", self.id())
    }
}
