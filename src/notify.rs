//! Destroy notifiers shared by both containers.
//!
//! A container owns its keys and values. When an entry is removed (as
//! opposed to stolen), displaced by an insert, or torn down with the
//! container, each owned part is passed to the matching notifier, or
//! simply dropped when none is registered.

/// Callback receiving ownership of a key or value being destroyed.
pub type DestroyNotify<T> = Box<dyn Fn(T) + Send + Sync>;

pub(crate) struct Destroyers<K, V> {
    key: Option<DestroyNotify<K>>,
    value: Option<DestroyNotify<V>>,
}

impl<K, V> Destroyers<K, V> {
    pub(crate) const fn none() -> Self {
        Self {
            key: None,
            value: None,
        }
    }

    pub(crate) fn new(key: Option<DestroyNotify<K>>, value: Option<DestroyNotify<V>>) -> Self {
        Self { key, value }
    }

    pub(crate) fn into_key(self) -> Option<DestroyNotify<K>> {
        self.key
    }

    pub(crate) fn into_value(self) -> Option<DestroyNotify<V>> {
        self.value
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.key.is_none() && self.value.is_none()
    }

    #[inline]
    pub(crate) fn key(&self, k: K) {
        match &self.key {
            Some(f) => f(k),
            None => drop(k),
        }
    }

    #[inline]
    pub(crate) fn value(&self, v: V) {
        match &self.value {
            Some(f) => f(v),
            None => drop(v),
        }
    }

    /// Key first, then value.
    #[inline]
    pub(crate) fn entry(&self, k: K, v: V) {
        self.key(k);
        self.value(v);
    }
}

impl<K, V> core::fmt::Debug for Destroyers<K, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Destroyers")
            .field("key", &self.key.is_some())
            .field("value", &self.value.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn missing_notifier_drops_silently() {
        let d: Destroyers<String, Vec<u8>> = Destroyers::none();
        assert!(d.is_empty());
        d.entry("k".to_string(), vec![1, 2, 3]);
    }

    /// Key notifier runs before the value notifier for a full entry.
    #[test]
    fn entry_notifies_key_then_value() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (lk, lv) = (log.clone(), log.clone());
        let d: Destroyers<&'static str, &'static str> = Destroyers::new(
            Some(Box::new(move |k| lk.lock().unwrap().push(format!("key:{k}")))),
            Some(Box::new(move |v| lv.lock().unwrap().push(format!("value:{v}")))),
        );
        assert!(!d.is_empty());
        d.entry("a", "1");
        assert_eq!(*log.lock().unwrap(), vec!["key:a", "value:1"]);
    }
}
