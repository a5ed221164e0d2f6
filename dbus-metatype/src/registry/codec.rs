use super::Registry;
use crate::error::{Error, Result};
use crate::signature::{Signature, SignatureTy};
use crate::MetaType;
use std::any::{type_name, Any, TypeId};

impl Registry {
    /// The D-Bus signature of a registered descriptor
    ///
    /// Fails with [`Error::UnknownType`] if no marshall functions are registered for it.
    pub fn type_to_signature(&self, meta_type: MetaType) -> Result<Signature> {
        let tables = self.tables.read();
        match tables.entries.get(&meta_type) {
            Some(entry) => Ok(entry.codec.signature.clone()),
            None => Err(Error::UnknownType(
                tables
                    .types
                    .get(&meta_type)
                    .map_or_else(|| meta_type.to_string(), |record| record.name.to_string()),
            )),
        }
    }

    /// The registered descriptor that owns a D-Bus signature
    ///
    /// Fails with [`Error::InvalidSignature`] if `signature` is not a single complete type
    /// and with [`Error::UnknownType`] if no registered type has this signature. When
    /// several types share a signature the first one registered owns it.
    pub fn signature_to_meta_type(&self, signature: &str) -> Result<MetaType> {
        let signature = SignatureTy::new_single(signature)?;
        self.tables
            .read()
            .by_signature
            .get(signature)
            .copied()
            .ok_or_else(|| Error::UnknownType(signature.to_string()))
    }

    /// The D-Bus signature of the registered type `T`
    ///
    /// Fails with [`Error::UnsupportedOperation`] if `T` is not registered.
    pub fn signature_of<T: Any>(&self) -> Result<Signature> {
        let tables = self.tables.read();
        tables
            .by_type_id
            .get(&TypeId::of::<T>())
            .and_then(|meta_type| tables.entries.get(meta_type))
            .map(|entry| entry.codec.signature.clone())
            .ok_or_else(|| Error::UnsupportedOperation(type_name::<T>().to_string()))
    }
}

#[cfg(test)]
mod test {
    use crate::{Error, MetaType, Registry, RegistryOptions};
    use matches::assert_matches;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_signatures() {
        let registry = Registry::new();
        let expected = [
            (MetaType::BOOL, "b"),
            (MetaType::BYTE, "y"),
            (MetaType::INT16, "n"),
            (MetaType::UINT16, "q"),
            (MetaType::INT32, "i"),
            (MetaType::UINT32, "u"),
            (MetaType::INT64, "x"),
            (MetaType::UINT64, "t"),
            (MetaType::DOUBLE, "d"),
            (MetaType::STRING, "s"),
            (MetaType::OBJECT_PATH, "o"),
            (MetaType::SIGNATURE, "g"),
            (MetaType::VARIANT, "v"),
            (MetaType::STRING_LIST, "as"),
            (MetaType::BYTE_ARRAY, "ay"),
            (MetaType::VARIANT_MAP, "a{sv}"),
        ];

        for (meta_type, signature) in expected {
            assert_eq!(registry.type_to_signature(meta_type).unwrap(), signature);
            assert_eq!(registry.signature_to_meta_type(signature).unwrap(), meta_type);
        }
    }

    #[test]
    fn round_trip_all_registered() {
        let registry = Registry::new();
        registry.register_array::<i32>().unwrap();
        registry.register_dict::<String, u64>().unwrap();

        for meta_type in registry.registered_types() {
            let signature = registry.type_to_signature(meta_type).unwrap();
            assert_eq!(
                registry.signature_to_meta_type(signature.as_str()).unwrap(),
                meta_type
            );
        }
    }

    #[test]
    fn lookup_errors() {
        let registry = Registry::new();
        assert_matches!(
            registry.signature_to_meta_type("zzz"),
            Err(Error::InvalidSignature(_))
        );
        assert_matches!(
            registry.signature_to_meta_type("ii"),
            Err(Error::InvalidSignature(_))
        );
        assert_matches!(
            registry.signature_to_meta_type(""),
            Err(Error::InvalidSignature(_))
        );
        assert_matches!(
            registry.signature_to_meta_type("(xxx)"),
            Err(Error::UnknownType(_))
        );
        assert_matches!(
            registry.type_to_signature(MetaType::from_id(9999)),
            Err(Error::UnknownType(_))
        );
        assert_matches!(registry.signature_of::<f32>(), Err(Error::UnsupportedOperation(_)));

        let registry = Registry::with_options(RegistryOptions::default().register_builtins(false));
        assert_matches!(
            registry.type_to_signature(MetaType::INT32),
            Err(Error::UnknownType(name)) if name == "i32"
        );
        assert_matches!(
            registry.signature_to_meta_type("i"),
            Err(Error::UnknownType(_))
        );
    }
}
