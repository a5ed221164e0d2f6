use super::entry::Codec;
use crate::signature::{Signature, SignatureTy};
use crate::MetaType;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use zvariant::{OwnedObjectPath, OwnedValue};

/// A type with a fixed descriptor and a native codec
pub(super) struct Builtin {
    pub meta_type: MetaType,
    pub type_id: TypeId,
    pub name: &'static str,
    pub codec: Codec,
}

fn native<T>(meta_type: MetaType, signature: &SignatureTy) -> Builtin
where
    T: zvariant::Type + serde::Serialize + serde::de::DeserializeOwned + Any + Send,
{
    Builtin {
        meta_type,
        type_id: TypeId::of::<T>(),
        name: type_name::<T>(),
        codec: Codec::native_with_signature::<T>(signature.to_owned()),
    }
}

/// The built-in types known to every registry
pub(super) fn builtins() -> Vec<Builtin> {
    vec![
        native::<bool>(MetaType::BOOL, SignatureTy::BOOLEAN),
        native::<u8>(MetaType::BYTE, SignatureTy::BYTE),
        native::<i16>(MetaType::INT16, SignatureTy::INT16),
        native::<u16>(MetaType::UINT16, SignatureTy::UINT16),
        native::<i32>(MetaType::INT32, SignatureTy::INT32),
        native::<u32>(MetaType::UINT32, SignatureTy::UINT32),
        native::<i64>(MetaType::INT64, SignatureTy::INT64),
        native::<u64>(MetaType::UINT64, SignatureTy::UINT64),
        native::<f64>(MetaType::DOUBLE, SignatureTy::DOUBLE),
        native::<String>(MetaType::STRING, SignatureTy::STRING),
        native::<OwnedObjectPath>(MetaType::OBJECT_PATH, SignatureTy::OBJECT_PATH),
        Builtin {
            meta_type: MetaType::SIGNATURE,
            type_id: TypeId::of::<Signature>(),
            name: type_name::<Signature>(),
            codec: Codec::custom::<Signature, Signature, _, _>(
                |writer, signature| writer.append_signature(signature),
                |reader| reader.read_signature(),
                SignatureTy::SIGNATURE.to_owned(),
            ),
        },
        native::<OwnedValue>(MetaType::VARIANT, SignatureTy::VARIANT),
        native::<Vec<String>>(MetaType::STRING_LIST, SignatureTy::STRING_ARRAY),
        native::<Vec<u8>>(MetaType::BYTE_ARRAY, SignatureTy::BYTE_ARRAY),
        native::<HashMap<String, OwnedValue>>(MetaType::VARIANT_MAP, SignatureTy::VARDICT),
    ]
}
