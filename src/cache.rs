use crate::jvm::BinaryName;
use crate::Error;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;

/// Class that has been generated and serialized
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedClass {
    pub name: BinaryName,
    pub bytes: Vec<u8>,
}

type Slot = Arc<Mutex<Option<Arc<CachedClass>>>>;

/// Generated classes, keyed by whatever identifies a generation request
///
/// At most one generation per key is ever in flight: callers asking for a key that is being
/// generated block until it is done and then share the result. Failed generations aren't cached,
/// so the next caller tries again.
///
/// Class names are tracked apart from the slots, so that a name can be reserved before the class
/// using it is generated.
pub struct ClassCache<K> {
    slots: Mutex<HashMap<K, Slot>>,
    names: Mutex<HashSet<BinaryName>>,
}

impl<K: Hash + Eq + Clone> Default for ClassCache<K> {
    fn default() -> Self {
        ClassCache {
            slots: Mutex::new(HashMap::new()),
            names: Mutex::new(HashSet::new()),
        }
    }
}

impl<K: Hash + Eq + Clone> ClassCache<K> {
    pub fn new() -> ClassCache<K> {
        ClassCache::default()
    }

    /// Get the class for `key`, generating it with `generate` if it isn't there yet
    pub fn get_or_generate<F>(&self, key: &K, generate: F) -> Result<Arc<CachedClass>, Error>
    where
        F: FnOnce() -> Result<CachedClass, Error>,
    {
        let slot: Slot = self
            .slots
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        // Held across generation so that concurrent callers for the same key wait
        let mut entry = slot.lock();
        if let Some(class) = entry.as_ref() {
            return Ok(class.clone());
        }
        let class = Arc::new(generate()?);
        self.names.lock().insert(class.name.clone());
        log::debug!("Cached {} ({} bytes)", class.name, class.bytes.len());
        *entry = Some(class.clone());
        Ok(class)
    }

    /// Get the class for `key`, if it has already been generated
    pub fn get(&self, key: &K) -> Option<Arc<CachedClass>> {
        let slot = self.slots.lock().get(key)?.clone();
        let class = slot.lock().clone();
        class
    }

    /// Is this name reserved, or used by a finished class?
    pub fn is_name_taken(&self, name: &BinaryName) -> bool {
        self.names.lock().contains(name)
    }

    /// Claim a name for a class about to be generated
    ///
    /// Returns `false` if the name was already taken. Checking and claiming happen under one lock,
    /// so two generations can't both get the same name.
    pub fn reserve_name(&self, name: &BinaryName) -> bool {
        self.names.lock().insert(name.clone())
    }

    /// Give back a reserved name whose generation failed
    pub fn release_name(&self, name: &BinaryName) {
        self.names.lock().remove(name);
    }

    /// Number of finished classes
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = self.slots.lock().values().cloned().collect();
        slots
            .iter()
            .filter(|slot| slot.try_lock().map_or(false, |entry| entry.is_some()))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::Name;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn class(name: &str) -> CachedClass {
        CachedClass {
            name: BinaryName::from_string(name.to_owned()).unwrap(),
            bytes: vec![0xCA, 0xFE, 0xBA, 0xBE],
        }
    }

    #[test]
    fn generates_once_per_key() {
        let cache: ClassCache<u32> = ClassCache::new();
        let calls = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let result = cache
                        .get_or_generate(&1, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(10));
                            Ok(class("demo/One"))
                        })
                        .unwrap();
                    assert_eq!(result.name.as_str(), "demo/One");
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.is_name_taken(&class("demo/One").name));
        assert!(!cache.is_name_taken(&class("demo/Two").name));
    }

    #[test]
    fn failures_are_not_cached() {
        let cache: ClassCache<&str> = ClassCache::new();
        let failed = cache.get_or_generate(&"key", || Err(Error::UnexpectedEvent("boom")));
        assert!(failed.is_err());
        assert!(cache.get(&"key").is_none());
        assert!(cache.is_empty());

        let generated = cache
            .get_or_generate(&"key", || Ok(class("demo/Key")))
            .unwrap();
        assert_eq!(cache.get(&"key"), Some(generated));
    }

    #[test]
    fn names_are_taken_while_generating() {
        let cache = &ClassCache::<u32>::new();
        let name = class("demo/Slow").name;

        thread::scope(|scope| {
            let (started, wait) = std::sync::mpsc::channel();
            let (finish, finished) = std::sync::mpsc::channel::<()>();
            scope.spawn(move || {
                cache
                    .get_or_generate(&1, || {
                        assert!(cache.reserve_name(&class("demo/Slow").name));
                        started.send(()).unwrap();
                        finished.recv().unwrap();
                        Ok(class("demo/Slow"))
                    })
                    .unwrap();
            });

            wait.recv().unwrap();
            assert!(cache.is_name_taken(&name));
            assert!(!cache.reserve_name(&name));
            assert!(cache.is_empty());
            finish.send(()).unwrap();
        });

        assert!(cache.is_name_taken(&name));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn released_names_can_be_reserved_again() {
        let cache: ClassCache<u32> = ClassCache::new();
        let name = class("demo/Retry").name;
        assert!(cache.reserve_name(&name));
        assert!(!cache.reserve_name(&name));
        cache.release_name(&name);
        assert!(!cache.is_name_taken(&name));
        assert!(cache.reserve_name(&name));
    }
}
