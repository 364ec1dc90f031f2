use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// Error a memory handler may return; logged by the dispatcher.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of memory handlers.
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Callback receiving memory values for one address.
pub type MemoryHandler = Arc<dyn Fn(MemoryValue) -> HandlerResult + Send + Sync>;

/// A value delivered to a memory handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryValue {
    /// Answer to a single 8/16/32-bit read or subscription.
    Single(u32),
    /// Bytes of a multi-byte subscription, in address order.
    Multi(Vec<u8>),
}

impl MemoryValue {
    /// The single value, if this is one.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            MemoryValue::Single(value) => Some(*value),
            MemoryValue::Multi(_) => None,
        }
    }

    /// The byte sequence, if this is one.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            MemoryValue::Single(_) => None,
            MemoryValue::Multi(values) => Some(values),
        }
    }
}

/// A handler registered for an address.
#[derive(Clone)]
pub enum Registration {
    /// Removed from the registry on first delivery.
    OneShot(MemoryHandler),
    /// Stays until explicitly removed.
    Subscription(MemoryHandler),
}

impl Registration {
    pub fn handler(&self) -> &MemoryHandler {
        match self {
            Registration::OneShot(handler) | Registration::Subscription(handler) => handler,
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, Registration::Subscription(_))
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Registration::OneShot(_) => f.write_str("OneShot(<handler>)"),
            Registration::Subscription(_) => f.write_str("Subscription(<handler>)"),
        }
    }
}

/// Address → handler table shared between callers and the receive loop.
#[derive(Default)]
pub struct CallbackRegistry {
    entries: Mutex<HashMap<u32, Registration>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any existing entry for `addr`.
    pub fn register(&self, addr: u32, registration: Registration) -> Option<Registration> {
        let replaced = self.lock().insert(addr, registration);
        if replaced.is_some() {
            debug!(addr = format_args!("{addr:#x}"), "replaced existing memory handler");
        }
        replaced
    }

    /// Remove the entry for `addr`.
    pub fn remove(&self, addr: u32) -> Option<Registration> {
        self.lock().remove(&addr)
    }

    /// Look up the handler for a delivery, removing one-shot entries first.
    pub fn take_for_delivery(&self, addr: u32) -> Option<MemoryHandler> {
        let mut entries = self.lock();
        match entries.get(&addr)? {
            Registration::Subscription(handler) => Some(Arc::clone(handler)),
            Registration::OneShot(_) => match entries.remove(&addr) {
                Some(Registration::OneShot(handler)) => Some(handler),
                _ => None,
            },
        }
    }

    pub fn contains(&self, addr: u32) -> bool {
        self.lock().contains_key(&addr)
    }

    pub fn is_persistent(&self, addr: u32) -> Option<bool> {
        self.lock().get(&addr).map(Registration::is_persistent)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u32, Registration>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn counting_handler(counter: &Arc<AtomicU32>) -> MemoryHandler {
        let counter = Arc::clone(counter);
        Arc::new(move |_value: MemoryValue| -> HandlerResult {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn one_shot_is_removed_on_delivery() {
        let registry = CallbackRegistry::new();
        let counter = Arc::new(AtomicU32::new(0));
        registry.register(8, Registration::OneShot(counting_handler(&counter)));

        let handler = registry.take_for_delivery(8).unwrap();
        assert!(!registry.contains(8));
        handler(MemoryValue::Single(1)).unwrap();

        assert!(registry.take_for_delivery(8).is_none());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscription_survives_delivery() {
        let registry = CallbackRegistry::new();
        let counter = Arc::new(AtomicU32::new(0));
        registry.register(8, Registration::Subscription(counting_handler(&counter)));

        for value in 0..3 {
            let handler = registry.take_for_delivery(8).unwrap();
            handler(MemoryValue::Single(value)).unwrap();
        }

        assert!(registry.contains(8));
        assert_eq!(registry.is_persistent(8), Some(true));
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        assert!(registry.remove(8).is_some());
        assert!(registry.take_for_delivery(8).is_none());
    }

    #[test]
    fn later_registration_overwrites() {
        let registry = CallbackRegistry::new();
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        registry.register(4, Registration::Subscription(counting_handler(&first)));
        let replaced = registry.register(4, Registration::OneShot(counting_handler(&second)));

        assert!(matches!(replaced, Some(Registration::Subscription(_))));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.is_persistent(4), Some(false));

        registry.take_for_delivery(4).unwrap()(MemoryValue::Single(0)).unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_address_yields_nothing() {
        let registry = CallbackRegistry::new();
        assert!(registry.take_for_delivery(0x8000_0000).is_none());
        assert!(registry.remove(0x8000_0000).is_none());
    }

    #[test]
    fn memory_value_accessors() {
        assert_eq!(MemoryValue::Single(7).as_u32(), Some(7));
        assert_eq!(MemoryValue::Single(7).as_bytes(), None);
        assert_eq!(MemoryValue::Multi(vec![1, 2]).as_bytes(), Some(&[1u8, 2][..]));
        assert_eq!(MemoryValue::Multi(vec![]).as_u32(), None);
    }
}
