//! Userdata: opaque host payloads with a metatable

use std::any::{type_name, Any};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::table::Table;

struct UserDataInner {
    payload: Box<dyn Any>,
    payload_type: &'static str,
    metatable: RefCell<Option<Table>>,
}

/// Shared handle to a host payload.
///
/// The runtime never looks inside the payload; behavior comes entirely from
/// the metatable.
#[derive(Clone)]
pub struct UserData(Rc<UserDataInner>);

/// Non-owning reference to a [`UserData`]
#[derive(Clone, Default)]
pub struct WeakUserData(Weak<UserDataInner>);

impl UserData {
    /// Wrap a payload without a metatable
    pub fn new<T: 'static>(payload: T) -> Self {
        UserData(Rc::new(UserDataInner {
            payload: Box::new(payload),
            payload_type: type_name::<T>(),
            metatable: RefCell::new(None),
        }))
    }

    /// Wrap a payload and attach a metatable
    pub fn with_metatable<T: 'static>(payload: T, metatable: Table) -> Self {
        let ud = Self::new(payload);
        ud.set_metatable(Some(metatable));
        ud
    }

    /// Borrow the payload if it is a `T`
    pub fn payload<T: 'static>(&self) -> Option<&T> {
        self.0.payload.downcast_ref::<T>()
    }

    /// Check the payload type
    pub fn is<T: 'static>(&self) -> bool {
        self.0.payload.is::<T>()
    }

    /// Rust type name of the payload
    pub fn payload_type_name(&self) -> &'static str {
        self.0.payload_type
    }

    /// Get the metatable
    pub fn metatable(&self) -> Option<Table> {
        self.0.metatable.borrow().clone()
    }

    /// Set or clear the metatable
    pub fn set_metatable(&self, metatable: Option<Table>) {
        *self.0.metatable.borrow_mut() = metatable;
    }

    /// Look up a metamethod on the metatable
    pub fn metamethod(&self, event: &str) -> crate::Value {
        self.metatable()
            .map(|mt| mt.get(event))
            .unwrap_or_default()
    }

    /// Create a weak reference
    pub fn downgrade(&self) -> WeakUserData {
        WeakUserData(Rc::downgrade(&self.0))
    }

    /// Identity of the underlying allocation
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Check whether two handles refer to the same userdata
    pub fn ptr_eq(&self, other: &UserData) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl WeakUserData {
    /// Upgrade to a strong handle if the userdata is still alive
    pub fn upgrade(&self) -> Option<UserData> {
        self.0.upgrade().map(UserData)
    }
}

impl fmt::Debug for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "userdata<{}>: {:#x}", self.payload_type_name(), self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_downcast() {
        let ud = UserData::new(42u32);
        assert!(ud.is::<u32>());
        assert_eq!(ud.payload::<u32>(), Some(&42));
        assert!(ud.payload::<i64>().is_none());
        assert_eq!(ud.payload_type_name(), "u32");
    }

    #[test]
    fn test_weak_reference() {
        let ud = UserData::new("payload");
        let weak = ud.downgrade();
        assert!(weak.upgrade().unwrap().ptr_eq(&ud));
        drop(ud);
        assert!(weak.upgrade().is_none());
        assert!(WeakUserData::default().upgrade().is_none());
    }
}
