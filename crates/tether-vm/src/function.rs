//! Callable values
//!
//! Every function in the runtime has a native body with the calling
//! convention `fn(&Vm) -> VmResult<usize>`: arguments are read from the
//! current frame with [`Vm::arg`], results are pushed with [`Vm::push`] and
//! the body returns how many values it pushed.

use std::fmt;
use std::rc::Rc;

use crate::error::VmResult;
use crate::state::Vm;

/// Native function body
pub type NativeFn = dyn Fn(&Vm) -> VmResult<usize>;

struct FunctionInner {
    name: String,
    body: Box<NativeFn>,
}

/// Shared handle to a callable.
#[derive(Clone)]
pub struct Function(Rc<FunctionInner>);

impl Function {
    /// Create a function from a named native body
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Vm) -> VmResult<usize> + 'static,
    {
        Function(Rc::new(FunctionInner {
            name: name.into(),
            body: Box::new(body),
        }))
    }

    /// Name used in error messages
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Identity of the underlying allocation
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Check whether two handles refer to the same function
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn invoke(&self, vm: &Vm) -> VmResult<usize> {
        (self.0.body)(vm)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").field("name", &self.0.name).finish()
    }
}
