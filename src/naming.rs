use crate::jvm::{BinaryName, Name};
use crate::Error;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Picks the names of generated classes
///
/// Names look like `<prefix>$$<source>By<tag>$$<hash>`, where the hash is that of the key that
/// identifies the generation request. Equal keys always get the same name. If a name is already
/// taken (by a different key with a colliding hash), `_<n>` is appended.
#[derive(Clone, Debug)]
pub struct NamingPolicy {
    tag: String,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        NamingPolicy::new("JvmProxy")
    }
}

impl NamingPolicy {
    pub fn new(tag: impl Into<String>) -> NamingPolicy {
        NamingPolicy { tag: tag.into() }
    }

    /// Name for a class generated from `key`
    ///
    /// `prefix` is usually the name of the class being proxied or copied. Classes can't be
    /// defined in `java/` packages, so such prefixes are moved out of them.
    pub fn class_name<K: Hash + ?Sized>(
        &self,
        prefix: Option<&BinaryName>,
        source: &str,
        key: &K,
        is_taken: impl Fn(&BinaryName) -> bool,
    ) -> Result<BinaryName, Error> {
        let prefix = match prefix {
            None => String::from("jvmproxy/empty/Object"),
            Some(prefix) if prefix.as_str().starts_with("java/") => {
                format!("$/{}", prefix.as_str())
            }
            Some(prefix) => prefix.as_str().to_owned(),
        };
        let source = source.rsplit('/').next().unwrap_or(source);

        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let hash = hasher.finish() as u32;

        let base = format!("{}$${}By{}$${:08x}", prefix, source, self.tag, hash);
        let mut candidate = base.clone();
        let mut index = 2;
        loop {
            let name = BinaryName::from_string(candidate).map_err(Error::MalformedName)?;
            if !is_taken(&name) {
                return Ok(name);
            }
            candidate = format!("{}_{}", base, index);
            index += 1;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names_are_deterministic() {
        let policy = NamingPolicy::default();
        let prefix = BinaryName::from_string(String::from("demo/Person")).unwrap();
        let first = policy
            .class_name(Some(&prefix), "jvmproxy/BeanCopier", &("a", 1), |_| false)
            .unwrap();
        let second = policy
            .class_name(Some(&prefix), "jvmproxy/BeanCopier", &("a", 1), |_| false)
            .unwrap();
        let other = policy
            .class_name(Some(&prefix), "jvmproxy/BeanCopier", &("b", 1), |_| false)
            .unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert!(first
            .as_str()
            .starts_with("demo/Person$$BeanCopierByJvmProxy$$"));
    }

    #[test]
    fn taken_names_get_a_suffix() {
        let policy = NamingPolicy::new("Test");
        let first = policy.class_name(None, "Mixin", &7u32, |_| false).unwrap();
        let second = policy
            .class_name(None, "Mixin", &7u32, |name| name == &first)
            .unwrap();
        assert_eq!(second.as_str(), format!("{}_2", first.as_str()));
    }

    #[test]
    fn java_packages_are_avoided() {
        let policy = NamingPolicy::default();
        let name = policy
            .class_name(Some(&BinaryName::STRING), "Proxy", &0u8, |_| false)
            .unwrap();
        assert!(name.as_str().starts_with("$/java/lang/String$$"));
    }
}
