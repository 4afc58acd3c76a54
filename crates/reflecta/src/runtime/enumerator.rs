//! Enumerator and class-info handles.

use crate::runtime::meta_object::{EnumKeyRecord, EnumRecord, MetaObject};
use std::fmt;

/// Handle to an enumerator of a class table.
///
/// # Example
///
/// ```rust
/// use reflecta::runtime::{EnumSpec, MetaObjectBuilder};
///
/// let class = MetaObjectBuilder::new("enumerator::Doc")
///     .enumerator(
///         EnumSpec::new("Options")
///             .flag()
///             .key("Bold", 1)
///             .key("Italic", 2)
///             .key("Underline", 4),
///     )
///     .build()
///     .unwrap();
///
/// let options = class.enumerator(0).unwrap();
/// assert_eq!(options.keys_to_value("Bold|Underline"), Some(5));
/// assert_eq!(options.value_to_keys(3), "Bold|Italic");
/// ```
#[derive(Clone, Copy)]
pub struct MetaEnum {
    class: &'static MetaObject,
    local: usize,
}

impl MetaEnum {
    pub(crate) fn new(class: &'static MetaObject, local: usize) -> Self {
        MetaEnum { class, local }
    }

    fn record(&self) -> &'static EnumRecord {
        &self.class.enums[self.local]
    }

    fn keys(&self) -> &'static [EnumKeyRecord] {
        let record = self.record();
        let start = record.keys_start as usize;
        &self.class.enum_keys[start..start + record.key_count as usize]
    }

    /// Strips an optional `Scope::` or `Enum::` qualifier from a key.
    fn unqualified<'k>(&self, key: &'k str) -> &'k str {
        match key.rsplit_once("::") {
            Some((scope, rest))
                if scope == self.scope()
                    || scope == self.name()
                    || scope == self.enum_name()
                    || scope.ends_with(&format!("::{}", self.name())) =>
            {
                rest
            }
            _ => key,
        }
    }

    /// Enumerator name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.class.string(self.record().name)
    }

    /// Name of the underlying enum type; equals [`name`](Self::name) unless
    /// an alias was declared.
    #[must_use]
    pub fn enum_name(&self) -> &'static str {
        let record = self.record();
        if record.enum_name.is_empty() {
            self.name()
        } else {
            self.class.string(record.enum_name)
        }
    }

    /// Name of the declaring class.
    #[must_use]
    pub fn scope(&self) -> &'static str {
        self.class.class_name()
    }

    /// Returns true if values combine as bit flags.
    #[must_use]
    pub fn is_flag(&self) -> bool {
        self.record().is_flag
    }

    /// Returns true if keys are scoped to the enum name.
    #[must_use]
    pub fn is_scoped(&self) -> bool {
        self.record().is_scoped
    }

    /// Number of keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.record().key_count as usize
    }

    /// Key at `index`.
    #[must_use]
    pub fn key(&self, index: usize) -> Option<&'static str> {
        self.keys().get(index).map(|k| self.class.string(k.key))
    }

    /// Value at `index`.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<i64> {
        self.keys().get(index).map(|k| k.value)
    }

    /// Value of `key`, accepting a `Scope::` qualified key.
    #[must_use]
    pub fn key_to_value(&self, key: &str) -> Option<i64> {
        let key = self.unqualified(key.trim());
        self.keys()
            .iter()
            .find(|k| self.class.string(k.key) == key)
            .map(|k| k.value)
    }

    /// First key whose value is `value`.
    #[must_use]
    pub fn value_to_key(&self, value: i64) -> Option<&'static str> {
        self.keys()
            .iter()
            .find(|k| k.value == value)
            .map(|k| self.class.string(k.key))
    }

    /// ORs the values of a `|`-separated key list.
    ///
    /// Returns `None` if any key is unknown.
    #[must_use]
    pub fn keys_to_value(&self, keys: &str) -> Option<i64> {
        keys.split('|')
            .try_fold(0i64, |acc, key| self.key_to_value(key).map(|v| acc | v))
    }

    /// Renders `value` as a `|`-separated key list.
    ///
    /// Keys are taken in declaration order; a key is used when all of its
    /// bits are present and it adds at least one bit not yet covered.
    /// Zero renders as the key whose value is zero, if any.
    #[must_use]
    pub fn value_to_keys(&self, value: i64) -> String {
        if value == 0 {
            return self.value_to_key(0).unwrap_or_default().to_string();
        }

        let mut keys = Vec::new();
        let mut covered = 0i64;
        for k in self.keys() {
            if k.value != 0 && value & k.value == k.value && covered & k.value != k.value {
                keys.push(self.class.string(k.key));
                covered |= k.value;
            }
        }
        keys.join("|")
    }
}

impl PartialEq for MetaEnum {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.class, other.class) && self.local == other.local
    }
}

impl Eq for MetaEnum {}

impl fmt::Debug for MetaEnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaEnum")
            .field("scope", &self.scope())
            .field("name", &self.name())
            .field("keys", &self.key_count())
            .finish()
    }
}

/// Handle to a class-info name/value pair.
#[derive(Clone, Copy)]
pub struct MetaClassInfo {
    class: &'static MetaObject,
    local: usize,
}

impl MetaClassInfo {
    pub(crate) fn new(class: &'static MetaObject, local: usize) -> Self {
        MetaClassInfo { class, local }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.class.string(self.class.class_infos[self.local].name)
    }

    #[must_use]
    pub fn value(&self) -> &'static str {
        self.class.string(self.class.class_infos[self.local].value)
    }
}

impl fmt::Debug for MetaClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name(), self.value())
    }
}
