//! Builtin channels
//!
//! A bounded FIFO of values shared between the host and scripts. The runtime
//! is single threaded, so sending never blocks: a full channel rejects the
//! value instead.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::error::{VmError, VmResult};
use crate::value::Value;

struct ChannelInner {
    buffer: RefCell<VecDeque<Value>>,
    capacity: usize,
    closed: Cell<bool>,
}

/// Shared handle to a channel.
#[derive(Clone)]
pub struct Channel(Rc<ChannelInner>);

impl Channel {
    /// Create a channel holding at most `capacity` values
    pub fn new(capacity: usize) -> Self {
        Channel(Rc::new(ChannelInner {
            buffer: RefCell::new(VecDeque::with_capacity(capacity)),
            capacity,
            closed: Cell::new(false),
        }))
    }

    /// Enqueue a value
    pub fn send(&self, value: Value) -> VmResult<()> {
        if self.0.closed.get() {
            return Err(VmError::runtime("send on closed channel"));
        }
        let mut buffer = self.0.buffer.borrow_mut();
        if buffer.len() >= self.0.capacity {
            return Err(VmError::runtime("channel is full"));
        }
        buffer.push_back(value);
        Ok(())
    }

    /// Dequeue a value if one is available
    pub fn try_recv(&self) -> Option<Value> {
        self.0.buffer.borrow_mut().pop_front()
    }

    /// Close the channel; buffered values can still be received
    pub fn close(&self) {
        self.0.closed.set(true);
    }

    /// Whether [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        self.0.closed.get()
    }

    /// Number of buffered values
    pub fn len(&self) -> usize {
        self.0.buffer.borrow().len()
    }

    /// True when nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of buffered values
    pub fn capacity(&self) -> usize {
        self.0.capacity
    }

    /// Identity of the underlying allocation
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Check whether two handles refer to the same channel
    pub fn ptr_eq(&self, other: &Channel) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel: {:#x}", self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_recv_fifo() {
        let ch = Channel::new(2);
        ch.send(Value::from(1)).unwrap();
        ch.send(Value::from(2)).unwrap();
        assert!(ch.send(Value::from(3)).is_err());
        assert_eq!(ch.try_recv(), Some(Value::Number(1.0)));
        assert_eq!(ch.try_recv(), Some(Value::Number(2.0)));
        assert_eq!(ch.try_recv(), None);
    }

    #[test]
    fn test_closed_channel() {
        let ch = Channel::new(1);
        ch.send(Value::from("last")).unwrap();
        ch.close();
        assert_eq!(
            ch.send(Value::Nil),
            Err(VmError::runtime("send on closed channel"))
        );
        assert_eq!(ch.try_recv(), Some(Value::string("last")));
    }
}
