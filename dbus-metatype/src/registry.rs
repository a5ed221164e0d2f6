mod builtin;
mod codec;
mod dispatch;
mod entry;
mod options;

pub use options::{DuplicatePolicy, RegistryOptions};

use crate::error::{Error, Result};
use crate::signature::Signature;
use crate::{MetaType, Reader, Writer};
use entry::{Codec, MarshallEntry, TypeRecord};
use parking_lot::RwLock;
use std::any::{type_name, Any, TypeId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::hash::Hash;
use tracing::debug;

#[derive(Debug)]
struct Tables {
    next_id: u32,
    types: HashMap<MetaType, TypeRecord>,
    by_type_id: HashMap<TypeId, MetaType>,
    by_name: HashMap<&'static str, MetaType>,
    entries: HashMap<MetaType, MarshallEntry>,
    by_signature: HashMap<Signature, MetaType>,
}

impl Tables {
    fn new() -> Self {
        Self {
            next_id: MetaType::FIRST_USER_ID,
            types: HashMap::new(),
            by_type_id: HashMap::new(),
            by_name: HashMap::new(),
            entries: HashMap::new(),
            by_signature: HashMap::new(),
        }
    }

    fn insert_record(&mut self, meta_type: MetaType, record: TypeRecord) {
        self.by_type_id.insert(record.type_id, meta_type);
        self.by_name.entry(record.name).or_insert(meta_type);
        self.types.insert(meta_type, record);
    }

    fn allocate(&mut self, type_id: TypeId, name: &'static str) -> MetaType {
        if let Some(meta_type) = self.by_type_id.get(&type_id) {
            return *meta_type;
        }

        let meta_type = MetaType::from_id(self.next_id);
        self.next_id += 1;
        self.insert_record(
            meta_type,
            TypeRecord {
                type_id,
                name,
                native: None,
            },
        );

        meta_type
    }
}

/// The registry of D-Bus marshallable types
///
/// Every Rust type that should travel over D-Bus gets a [`MetaType`] descriptor and a
/// pair of marshall/demarshall functions that write it to a [`Writer`] and read it back
/// from a [`Reader`]. The registry maps descriptors to those functions and to the D-Bus
/// signature of the type.
///
/// The registry is `Send + Sync` and is meant to be shared by reference or in an `Arc`.
/// Lookups only take a read lock, and marshall functions run without any lock held.
///
/// ```
/// use dbus_metatype::{Endian, Reader, Registry, Writer};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Point {
///     x: i32,
///     label: String,
/// }
///
/// let registry = Registry::new();
/// let meta_type = registry
///     .register(
///         |writer: &mut Writer, point: &Point| {
///             writer.begin_structure();
///             writer.append(&point.x)?;
///             writer.append(&point.label)?;
///             writer.end_structure()
///         },
///         |reader: &mut Reader| {
///             reader.begin_structure()?;
///             let point = Point {
///                 x: reader.read()?,
///                 label: reader.read()?,
///             };
///             reader.end_structure()?;
///             Ok(point)
///         },
///     )
///     .unwrap();
///
/// assert_eq!(registry.type_to_signature(meta_type).unwrap(), "(is)");
/// assert_eq!(registry.signature_to_meta_type("(is)").unwrap(), meta_type);
///
/// let point = Point { x: 42, label: "x".to_string() };
/// let mut writer = Writer::new(&registry);
/// writer.append(&point).unwrap();
/// let (data, _) = writer.finish().unwrap();
///
/// let mut reader = Reader::new(&registry, data, Endian::Little);
/// assert_eq!(reader.read::<Point>().unwrap(), point);
/// ```
pub struct Registry {
    options: RegistryOptions,
    tables: RwLock<Tables>,
}

impl Registry {
    /// Create a registry with the default options
    pub fn new() -> Self {
        Self::with_options(RegistryOptions::default())
    }

    /// Create a registry with the specified options
    pub fn with_options(options: RegistryOptions) -> Self {
        let mut tables = Tables::new();

        for builtin in builtin::builtins() {
            if options.register_builtins {
                tables
                    .by_signature
                    .insert(builtin.codec.signature.clone(), builtin.meta_type);
                tables.entries.insert(
                    builtin.meta_type,
                    MarshallEntry {
                        meta_type: builtin.meta_type,
                        type_id: builtin.type_id,
                        name: builtin.name,
                        codec: builtin.codec.clone(),
                    },
                );
            }

            tables.insert_record(
                builtin.meta_type,
                TypeRecord {
                    type_id: builtin.type_id,
                    name: builtin.name,
                    native: Some(builtin.codec),
                },
            );
        }

        debug!(
            "Created registry with {} built-in types registered",
            tables.entries.len()
        );

        Self {
            options,
            tables: RwLock::new(tables),
        }
    }

    /// The options this registry was created with
    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    /// Return the descriptor of `T`, allocating one if `T` was never seen before
    pub fn meta_type<T: Any>(&self) -> MetaType {
        let type_id = TypeId::of::<T>();
        let known = self.tables.read().by_type_id.get(&type_id).copied();
        if let Some(meta_type) = known {
            return meta_type;
        }

        self.tables.write().allocate(type_id, type_name::<T>())
    }

    /// Return the descriptor of the runtime type of `value`, if that type is known
    pub fn meta_type_of(&self, value: &dyn Any) -> Option<MetaType> {
        self.tables
            .read()
            .by_type_id
            .get(&value.type_id())
            .copied()
    }

    /// Return the descriptor of `T` only if `T` has registered marshall functions
    pub fn lookup<T: Any>(&self) -> Option<MetaType> {
        let tables = self.tables.read();
        tables
            .by_type_id
            .get(&TypeId::of::<T>())
            .copied()
            .filter(|meta_type| tables.entries.contains_key(meta_type))
    }

    /// The Rust type name of a descriptor
    pub fn type_name(&self, meta_type: MetaType) -> Option<&'static str> {
        self.tables
            .read()
            .types
            .get(&meta_type)
            .map(|record| record.name)
    }

    /// Look up a descriptor by its Rust type name, as returned by [`Self::type_name`]
    pub fn meta_type_by_name(&self, name: &str) -> Option<MetaType> {
        self.tables.read().by_name.get(name).copied()
    }

    /// Whether marshall functions are registered for the descriptor
    pub fn is_registered(&self, meta_type: MetaType) -> bool {
        self.tables.read().entries.contains_key(&meta_type)
    }

    /// All descriptors with registered marshall functions, in ascending order
    pub fn registered_types(&self) -> Vec<MetaType> {
        let mut types: Vec<MetaType> = self.tables.read().entries.keys().copied().collect();
        types.sort();
        types
    }

    /// Make the zvariant encoding of `T` known as its native codec without registering it
    ///
    /// The type can then be registered with [`Self::register_meta_type`]. Fails with
    /// [`Error::UnsupportedType`] if `T` does not map to a single complete D-Bus type.
    pub fn declare_native<T>(&self) -> Result<MetaType>
    where
        T: zvariant::Type + serde::Serialize + serde::de::DeserializeOwned + Any + Send,
    {
        let codec = Codec::native::<T>()?;
        let mut tables = self.tables.write();
        let meta_type = tables.allocate(TypeId::of::<T>(), type_name::<T>());
        if let Some(record) = tables.types.get_mut(&meta_type) {
            record.native.get_or_insert(codec);
        }

        Ok(meta_type)
    }

    /// Register a type with custom marshall and demarshall functions
    ///
    /// `marshall` writes a `T` to the stream, `demarshall` reads a `U` back. Both must be
    /// the same type, otherwise this fails with [`Error::TypeMismatch`] and nothing is
    /// registered. The D-Bus signature of the type is derived by marshalling
    /// `T::default()`, which must produce exactly one complete type.
    pub fn register<T, U, M, D>(&self, marshall: M, demarshall: D) -> Result<MetaType>
    where
        T: Any + Default,
        U: Any + Send,
        M: Fn(&mut Writer<'_>, &T) -> Result<()> + Send + Sync + 'static,
        D: Fn(&mut Reader<'_>) -> Result<U> + Send + Sync + 'static,
    {
        check_same_type::<T, U>()?;

        let mut writer = Writer::new(self);
        marshall(&mut writer, &T::default())?;
        let (_, signature) = writer.finish()?;

        self.register_with_signature(signature, marshall, demarshall)
    }

    /// Register a type with custom marshall and demarshall functions and a known signature
    ///
    /// Use this for types without a [`Default`] value. The signature must be a single
    /// complete type and is trusted to match what `marshall` writes.
    pub fn register_with_signature<T, U, M, D>(
        &self,
        signature: Signature,
        marshall: M,
        demarshall: D,
    ) -> Result<MetaType>
    where
        T: Any,
        U: Any + Send,
        M: Fn(&mut Writer<'_>, &T) -> Result<()> + Send + Sync + 'static,
        D: Fn(&mut Reader<'_>) -> Result<U> + Send + Sync + 'static,
    {
        check_same_type::<T, U>()?;
        if !signature.is_single_complete_type() {
            return Err(Error::InvalidSignature(signature.to_string()));
        }

        let meta_type = self.meta_type::<T>();
        self.insert_entry(MarshallEntry {
            meta_type,
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            codec: Codec::custom(marshall, demarshall, signature),
        })?;

        Ok(meta_type)
    }

    /// Register a descriptor with its native codec
    ///
    /// Fails with [`Error::UnknownType`] if the descriptor was never allocated, and with
    /// [`Error::UnsupportedType`] if the type has no native codec.
    pub fn register_meta_type(&self, meta_type: MetaType) -> Result<()> {
        let entry = {
            let tables = self.tables.read();
            let record = tables
                .types
                .get(&meta_type)
                .ok_or_else(|| Error::UnknownType(meta_type.to_string()))?;
            let codec = record
                .native
                .clone()
                .ok_or_else(|| Error::UnsupportedType(record.name.to_string()))?;

            MarshallEntry {
                meta_type,
                type_id: record.type_id,
                name: record.name,
                codec,
            }
        };

        self.insert_entry(entry)
    }

    /// Register `T` with its zvariant encoding
    pub fn register_native<T>(&self) -> Result<MetaType>
    where
        T: zvariant::Type + serde::Serialize + serde::de::DeserializeOwned + Any + Send,
    {
        let meta_type = self.declare_native::<T>()?;
        self.register_meta_type(meta_type)?;
        Ok(meta_type)
    }

    /// Register `Vec<T>` as an array of the registered type `T`
    ///
    /// Elements are dispatched through the registry, so `T` may have custom functions.
    pub fn register_array<T>(&self) -> Result<MetaType>
    where
        T: Any + Send + Sync,
    {
        let element = self.signature_of::<T>()?;
        let signature = Signature::new_array(&element)?;

        let marshall_element = element.clone();
        self.register_with_signature(
            signature,
            move |writer: &mut Writer<'_>, items: &Vec<T>| -> Result<()> {
                writer.begin_array(&marshall_element)?;
                for item in items {
                    writer.append(item)?;
                }
                writer.end_array()
            },
            move |reader: &mut Reader<'_>| -> Result<Vec<T>> {
                let mut items = Vec::new();
                reader.begin_array(&element)?;
                while !reader.at_end() {
                    items.push(reader.read::<T>()?);
                }
                reader.end_array()?;
                Ok(items)
            },
        )
    }

    /// Register `HashMap<K, V>` as a dictionary of the registered types `K` and `V`
    ///
    /// Fails with [`Error::InvalidSignature`] if `K` is not a basic type.
    pub fn register_dict<K, V>(&self) -> Result<MetaType>
    where
        K: Any + Eq + Hash + Send + Sync,
        V: Any + Send + Sync,
    {
        let key = self.signature_of::<K>()?;
        let value = self.signature_of::<V>()?;
        let signature = Signature::new_dict(&key, &value)?;

        let (marshall_key, marshall_value) = (key.clone(), value.clone());
        self.register_with_signature(
            signature,
            move |writer: &mut Writer<'_>, map: &HashMap<K, V>| -> Result<()> {
                writer.begin_map(&marshall_key, &marshall_value)?;
                for (key, value) in map {
                    writer.begin_map_entry()?;
                    writer.append(key)?;
                    writer.append(value)?;
                    writer.end_map_entry()?;
                }
                writer.end_map()
            },
            move |reader: &mut Reader<'_>| -> Result<HashMap<K, V>> {
                let mut map = HashMap::new();
                reader.begin_map(&key, &value)?;
                while !reader.at_end() {
                    reader.begin_map_entry()?;
                    let key = reader.read::<K>()?;
                    let value = reader.read::<V>()?;
                    reader.end_map_entry()?;
                    map.insert(key, value);
                }
                reader.end_map()?;
                Ok(map)
            },
        )
    }

    fn insert_entry(&self, entry: MarshallEntry) -> Result<()> {
        let mut guard = self.tables.write();
        let tables = &mut *guard;
        let meta_type = entry.meta_type;

        if let Some(existing) = tables.entries.get(&meta_type) {
            match self.options.duplicate_policy {
                DuplicatePolicy::Reject => {
                    debug!("Rejecting duplicate registration of {}", entry.name);
                    return Err(Error::AlreadyRegistered(entry.name.to_string()));
                }
                DuplicatePolicy::Replace => {
                    debug!("Replacing registration of {}", entry.name);
                    let old = existing.codec.signature.clone();
                    if old != entry.codec.signature
                        && tables.by_signature.get(&old) == Some(&meta_type)
                    {
                        tables.by_signature.remove(&old);
                        let successor = tables
                            .entries
                            .values()
                            .filter(|other| other.meta_type != meta_type && other.codec.signature == old)
                            .map(|other| other.meta_type)
                            .min();
                        if let Some(successor) = successor {
                            debug!("Signature '{}' is now owned by {}", old, successor);
                            tables.by_signature.insert(old, successor);
                        }
                    }
                }
            }
        }

        match tables.by_signature.entry(entry.codec.signature.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(meta_type);
            }
            Entry::Occupied(occupied) if *occupied.get() != meta_type => {
                debug!(
                    "{} shares signature '{}' with {}, keeping {} as its owner",
                    entry.name,
                    occupied.key(),
                    occupied.get(),
                    occupied.get()
                );
            }
            Entry::Occupied(_) => {}
        }

        debug!(
            "Registered {} as {} with signature '{}'",
            entry.name, meta_type, entry.codec.signature
        );
        tables.entries.insert(meta_type, entry);
        Ok(())
    }

    pub(crate) fn entry_codec(&self, meta_type: MetaType) -> Option<(&'static str, TypeId, Codec)> {
        self.tables
            .read()
            .entries
            .get(&meta_type)
            .map(|entry| (entry.name, entry.type_id, entry.codec.clone()))
    }
}

fn check_same_type<T: Any, U: Any>() -> Result<()> {
    if TypeId::of::<T>() == TypeId::of::<U>() {
        Ok(())
    } else {
        Err(Error::TypeMismatch {
            marshalled: type_name::<T>().to_string(),
            demarshalled: type_name::<U>().to_string(),
        })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("Registry")
            .field("options", &self.options)
            .field("types", &tables.types.len())
            .field("registered", &tables.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Endian;
    use matches::assert_matches;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
    struct Pair {
        number: i32,
        text: String,
    }

    fn write_pair(writer: &mut Writer<'_>, pair: &Pair) -> Result<()> {
        writer.begin_structure();
        writer.append(&pair.number)?;
        writer.append(&pair.text)?;
        writer.end_structure()
    }

    fn read_pair(reader: &mut Reader<'_>) -> Result<Pair> {
        reader.begin_structure()?;
        let number = reader.read()?;
        let text = reader.read()?;
        reader.end_structure()?;
        Ok(Pair { number, text })
    }

    #[test]
    fn builtins_registered() {
        let registry = Registry::new();
        assert_eq!(registry.lookup::<i32>(), Some(MetaType::INT32));
        assert_eq!(registry.lookup::<String>(), Some(MetaType::STRING));
        assert_eq!(registry.registered_types().len(), 16);
        assert_eq!(registry.type_name(MetaType::BOOL), Some("bool"));
        assert_eq!(registry.meta_type_by_name("u64"), Some(MetaType::UINT64));
    }

    #[test]
    fn builtins_disabled() {
        let registry = Registry::with_options(RegistryOptions::default().register_builtins(false));
        assert!(registry.registered_types().is_empty());
        assert_eq!(registry.lookup::<i32>(), None);
        assert_eq!(registry.meta_type::<i32>(), MetaType::INT32);

        registry.register_meta_type(MetaType::INT32).unwrap();
        assert_eq!(registry.lookup::<i32>(), Some(MetaType::INT32));
        assert_eq!(registry.type_to_signature(MetaType::INT32).unwrap(), "i");
    }

    #[test]
    fn allocate_descriptors() {
        let registry = Registry::new();
        let pair = registry.meta_type::<Pair>();
        assert_eq!(pair.id(), MetaType::FIRST_USER_ID);
        assert_eq!(registry.meta_type::<Pair>(), pair);
        assert_eq!(registry.meta_type::<Vec<Pair>>().id(), MetaType::FIRST_USER_ID + 1);

        assert!(!registry.is_registered(pair));
        assert_eq!(registry.lookup::<Pair>(), None);
        assert_eq!(registry.meta_type_of(&Pair::default()), Some(pair));
        assert_eq!(registry.meta_type_of(&1.5f32), None);
        assert_eq!(registry.type_name(pair), Some(type_name::<Pair>()));
        assert_eq!(registry.meta_type_by_name(type_name::<Pair>()), Some(pair));
    }

    #[test]
    fn register_custom() {
        let registry = Registry::new();
        let pair = registry.register(write_pair, read_pair).unwrap();
        assert!(registry.is_registered(pair));
        assert_eq!(registry.lookup::<Pair>(), Some(pair));
        assert_eq!(registry.type_to_signature(pair).unwrap(), "(is)");
        assert_eq!(registry.signature_to_meta_type("(is)").unwrap(), pair);
    }

    #[test]
    fn register_mismatch() {
        let registry = Registry::new();
        let before = registry.registered_types();
        let result = registry.register(write_pair, |reader: &mut Reader<'_>| reader.read::<i32>());
        assert_matches!(result, Err(Error::TypeMismatch { .. }));
        if let Err(Error::TypeMismatch {
            marshalled,
            demarshalled,
        }) = result
        {
            assert!(marshalled.ends_with("Pair"));
            assert_eq!(demarshalled, "i32");
        }

        assert_eq!(registry.registered_types(), before);
        assert_eq!(registry.lookup::<Pair>(), None);
    }

    #[test]
    fn register_without_value() {
        let registry = Registry::new();
        let result = registry.register(
            |_: &mut Writer<'_>, _: &Pair| Ok(()),
            |_: &mut Reader<'_>| Ok(Pair::default()),
        );
        assert_matches!(result, Err(Error::InvalidSignature(_)));
        assert_eq!(registry.lookup::<Pair>(), None);
    }

    #[test]
    fn duplicate_policy() {
        let registry = Registry::new();
        let pair = registry.register(write_pair, read_pair).unwrap();
        assert_matches!(
            registry.register(write_pair, read_pair),
            Err(Error::AlreadyRegistered(_))
        );
        assert_matches!(
            registry.register_meta_type(MetaType::INT32),
            Err(Error::AlreadyRegistered(_))
        );

        let registry =
            Registry::with_options(RegistryOptions::default().duplicate_policy(DuplicatePolicy::Replace));
        let first = registry.register(write_pair, read_pair).unwrap();
        let second = registry
            .register_with_signature(
                Signature::new("i").unwrap(),
                |writer: &mut Writer<'_>, pair: &Pair| writer.append(&pair.number),
                |reader: &mut Reader<'_>| {
                    Ok(Pair {
                        number: reader.read()?,
                        text: String::new(),
                    })
                },
            )
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first, pair);
        assert_eq!(registry.type_to_signature(first).unwrap(), "i");
        assert_matches!(
            registry.signature_to_meta_type("(is)"),
            Err(Error::UnknownType(_))
        );
        // i32 keeps ownership of its signature
        assert_eq!(registry.signature_to_meta_type("i").unwrap(), MetaType::INT32);
    }

    #[test]
    fn replace_hands_signature_to_next_owner() {
        #[derive(Debug, Default, PartialEq)]
        struct Twin(i32, String);

        let registry =
            Registry::with_options(RegistryOptions::default().duplicate_policy(DuplicatePolicy::Replace));
        let pair = registry.register(write_pair, read_pair).unwrap();
        let twin = registry
            .register(
                |writer: &mut Writer<'_>, twin: &Twin| {
                    writer.begin_structure();
                    writer.append(&twin.0)?;
                    writer.append(&twin.1)?;
                    writer.end_structure()
                },
                |reader: &mut Reader<'_>| {
                    reader.begin_structure()?;
                    let twin = Twin(reader.read()?, reader.read()?);
                    reader.end_structure()?;
                    Ok(twin)
                },
            )
            .unwrap();
        assert_eq!(registry.signature_to_meta_type("(is)").unwrap(), pair);

        registry
            .register_with_signature(
                Signature::new("i").unwrap(),
                |writer: &mut Writer<'_>, pair: &Pair| writer.append(&pair.number),
                |reader: &mut Reader<'_>| {
                    Ok(Pair {
                        number: reader.read()?,
                        text: String::new(),
                    })
                },
            )
            .unwrap();

        assert_eq!(registry.type_to_signature(twin).unwrap(), "(is)");
        assert_eq!(registry.signature_to_meta_type("(is)").unwrap(), twin);
        assert_eq!(registry.signature_to_meta_type("i").unwrap(), MetaType::INT32);
    }

    #[test]
    fn register_meta_type_errors() {
        let registry = Registry::new();
        assert_matches!(
            registry.register_meta_type(MetaType::from_id(4242)),
            Err(Error::UnknownType(_))
        );

        let pair = registry.meta_type::<Pair>();
        assert_matches!(
            registry.register_meta_type(pair),
            Err(Error::UnsupportedType(_))
        );
        assert!(!registry.is_registered(pair));
    }

    #[test]
    fn native_types() {
        let registry = Registry::new();
        let meta_type = registry.register_native::<(u32, String)>().unwrap();
        assert_eq!(registry.type_to_signature(meta_type).unwrap(), "(us)");

        let declared = registry.declare_native::<(bool, f64)>().unwrap();
        assert!(!registry.is_registered(declared));
        registry.register_meta_type(declared).unwrap();
        assert_eq!(registry.type_to_signature(declared).unwrap(), "(bd)");

        assert_matches!(
            registry.register_native::<()>(),
            Err(Error::UnsupportedType(_))
        );
    }

    #[test]
    fn containers() {
        let registry = Registry::new();
        registry.register(write_pair, read_pair).unwrap();
        let list = registry.register_array::<Pair>().unwrap();
        assert_eq!(registry.type_to_signature(list).unwrap(), "a(is)");

        let map = registry.register_dict::<u32, Pair>().unwrap();
        assert_eq!(registry.type_to_signature(map).unwrap(), "a{u(is)}");

        assert_matches!(
            registry.register_dict::<Pair, u32>(),
            Err(Error::InvalidSignature(_))
        );
        assert_matches!(
            registry.register_array::<f32>(),
            Err(Error::UnsupportedOperation(_))
        );

        let pairs = vec![
            Pair {
                number: 1,
                text: "one".to_string(),
            },
            Pair {
                number: 2,
                text: "two".to_string(),
            },
        ];
        let mut dict = HashMap::new();
        dict.insert(7u32, pairs[0].clone());

        let mut writer = Writer::with_endian(&registry, Endian::Big);
        writer.append(&pairs).unwrap();
        writer.append(&dict).unwrap();
        let (data, signature) = writer.finish().unwrap();
        assert_eq!(signature.as_str(), "a(is)a{u(is)}");

        let mut reader = Reader::new(&registry, data, Endian::Big);
        assert_eq!(reader.read::<Vec<Pair>>().unwrap(), pairs);
        assert_eq!(reader.read::<HashMap<u32, Pair>>().unwrap(), dict);
        assert!(reader.at_end());
    }
}
