use crate::Endian;
use serde::{Deserialize, Serialize};

/// What happens when a type that already has an entry is registered again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail with [`Error::AlreadyRegistered`](crate::Error::AlreadyRegistered) and keep the
    /// existing entry
    #[default]
    Reject,
    /// Replace the existing entry with the new one
    Replace,
}

/// Configuration of a [`Registry`](crate::Registry)
///
/// Can be embedded in an application's configuration file:
///
/// ```
/// # use dbus_metatype::{DuplicatePolicy, RegistryOptions};
/// let options: RegistryOptions = serde_json::from_str(r#"{ "duplicate_policy": "replace" }"#).unwrap();
/// assert_eq!(options.duplicate_policy, DuplicatePolicy::Replace);
/// assert!(options.register_builtins);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryOptions {
    /// Policy for re-registering a type
    pub duplicate_policy: DuplicatePolicy,
    /// Register codecs for the built-in types when the registry is created
    pub register_builtins: bool,
    /// Byte order of writers created with [`Writer::new`](crate::Writer::new)
    pub endian: Endian,
}

impl RegistryOptions {
    /// Set the [`DuplicatePolicy`]
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Set whether built-in types are registered on creation
    pub fn register_builtins(mut self, register: bool) -> Self {
        self.register_builtins = register;
        self
    }

    /// Set the default byte order of writers
    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Reject,
            register_builtins: true,
            endian: Endian::Little,
        }
    }
}
