use super::entry::Codec;
use super::Registry;
use crate::error::{Error, Result};
use crate::{MetaType, Reader, Writer};
use std::any::{type_name, Any, TypeId};
use tracing::trace;

impl Registry {
    fn codec_for(&self, meta_type: MetaType) -> Result<(&'static str, TypeId, Codec)> {
        self.entry_codec(meta_type).ok_or_else(|| {
            Error::UnsupportedOperation(
                self.type_name(meta_type)
                    .map_or_else(|| meta_type.to_string(), ToString::to_string),
            )
        })
    }

    fn registered<T: Any>(&self) -> Result<MetaType> {
        self.lookup::<T>()
            .ok_or_else(|| Error::UnsupportedOperation(type_name::<T>().to_string()))
    }

    /// Write `value` to the stream with the functions registered for its type
    ///
    /// If `meta_type` is `None` it is inferred from the runtime type of `value`. Fails with
    /// [`Error::UnsupportedOperation`] if the type is not registered, and with
    /// [`Error::TypeMismatch`] if `meta_type` describes a different type than `value` has.
    pub fn marshall(
        &self,
        writer: &mut Writer<'_>,
        meta_type: Option<MetaType>,
        value: &dyn Any,
    ) -> Result<()> {
        let meta_type = match meta_type {
            Some(meta_type) => meta_type,
            None => self.meta_type_of(value).ok_or_else(|| {
                Error::UnsupportedOperation(format!("{:?}", value.type_id()))
            })?,
        };

        let (name, type_id, codec) = self.codec_for(meta_type)?;
        if type_id != value.type_id() {
            return Err(Error::TypeMismatch {
                marshalled: name.to_string(),
                demarshalled: self
                    .meta_type_of(value)
                    .and_then(|meta_type| self.type_name(meta_type))
                    .unwrap_or("an unknown type")
                    .to_string(),
            });
        }

        trace!("Marshalling {} at offset {}", name, writer.len());
        (codec.marshall)(writer, value)
    }

    /// Write `value` to the stream with the functions registered for `T`
    pub fn marshall_value<T: Any>(&self, writer: &mut Writer<'_>, value: &T) -> Result<()> {
        let meta_type = self.registered::<T>()?;
        self.marshall(writer, Some(meta_type), value)
    }

    /// Read one value of the registered type `meta_type` from the stream
    ///
    /// Fails with [`Error::UnsupportedOperation`] if the type is not registered. On failure
    /// the stream position is unspecified.
    pub fn demarshall(
        &self,
        reader: &mut Reader<'_>,
        meta_type: MetaType,
    ) -> Result<Box<dyn Any + Send>> {
        let (name, _, codec) = self.codec_for(meta_type)?;
        trace!("Demarshalling {} at offset {}", name, reader.position());
        (codec.demarshall)(reader)
    }

    /// Read one value of the registered type `T` from the stream
    pub fn demarshall_value<T: Any>(&self, reader: &mut Reader<'_>) -> Result<T> {
        let meta_type = self.registered::<T>()?;
        let value = self.demarshall(reader, meta_type)?;
        match value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(_) => Err(Error::TypeMismatch {
                marshalled: type_name::<T>().to_string(),
                demarshalled: "a value of a different type".to_string(),
            }),
        }
    }
}
