use crate::error::{Error, Result};
use crate::signature::Signature;
use crate::{MetaType, Reader, Writer};
use std::any::{type_name, Any, TypeId};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Type-erased marshall function
pub(crate) type MarshallFn = Arc<dyn Fn(&mut Writer<'_>, &dyn Any) -> Result<()> + Send + Sync>;

/// Type-erased demarshall function
pub(crate) type DemarshallFn =
    Arc<dyn Fn(&mut Reader<'_>) -> Result<Box<dyn Any + Send>> + Send + Sync>;

/// A marshall/demarshall pair together with the signature it produces
#[derive(Clone)]
pub(crate) struct Codec {
    pub marshall: MarshallFn,
    pub demarshall: DemarshallFn,
    pub signature: Signature,
}

impl Codec {
    /// Wrap typed functions into type-erased trampolines
    ///
    /// `T` and `U` are checked for equality by the caller.
    pub fn custom<T, U, M, D>(marshall: M, demarshall: D, signature: Signature) -> Self
    where
        T: Any,
        U: Any + Send,
        M: Fn(&mut Writer<'_>, &T) -> Result<()> + Send + Sync + 'static,
        D: Fn(&mut Reader<'_>) -> Result<U> + Send + Sync + 'static,
    {
        let marshall: MarshallFn = Arc::new(
            move |writer: &mut Writer<'_>, value: &dyn Any| -> Result<()> {
                let value = value.downcast_ref::<T>().ok_or_else(|| Error::TypeMismatch {
                    marshalled: type_name::<T>().to_string(),
                    demarshalled: "a value of a different type".to_string(),
                })?;
                marshall(writer, value)
            },
        );

        let demarshall: DemarshallFn = Arc::new(
            move |reader: &mut Reader<'_>| -> Result<Box<dyn Any + Send>> {
                Ok(Box::new(demarshall(reader)?))
            },
        );

        Self {
            marshall,
            demarshall,
            signature,
        }
    }

    /// A codec that uses the zvariant encoding of `T` with a known signature
    pub fn native_with_signature<T>(signature: Signature) -> Self
    where
        T: zvariant::Type + serde::Serialize + serde::de::DeserializeOwned + Any + Send,
    {
        Self::custom::<T, T, _, _>(
            |writer, value: &T| writer.append_native(value),
            |reader| reader.read_native::<T>(),
            signature,
        )
    }

    /// A codec that uses the zvariant encoding of `T`
    ///
    /// Fails with [`Error::UnsupportedType`] if `T` does not map to a single complete type.
    pub fn native<T>() -> Result<Self>
    where
        T: zvariant::Type + serde::Serialize + serde::de::DeserializeOwned + Any + Send,
    {
        let signature = Signature::of::<T>()
            .ok()
            .filter(|signature| signature.is_single_complete_type())
            .ok_or_else(|| Error::UnsupportedType(type_name::<T>().to_string()))?;
        Ok(Self::native_with_signature::<T>(signature))
    }
}

impl Debug for Codec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// A registered type: its descriptor, identity and codec
#[derive(Debug, Clone)]
pub(crate) struct MarshallEntry {
    pub meta_type: MetaType,
    pub type_id: TypeId,
    pub name: &'static str,
    pub codec: Codec,
}

/// A row of the descriptor table. Every allocated descriptor has one, registered or not
#[derive(Debug, Clone)]
pub(crate) struct TypeRecord {
    pub type_id: TypeId,
    pub name: &'static str,
    pub native: Option<Codec>,
}
