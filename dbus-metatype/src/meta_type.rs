use std::fmt::{Display, Formatter};

/// An opaque identifier for a concrete data type known to a [`Registry`](crate::Registry)
///
/// Descriptors are allocated per Rust type on first use and stay stable for the lifetime of
/// the registry. Built-in types have fixed ids that are the same in every registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetaType(u32);

impl MetaType {
    /// The invalid descriptor. Never allocated
    pub const INVALID: MetaType = MetaType(0);

    /// `bool`, signature `b`
    pub const BOOL: MetaType = MetaType(1);
    /// [`u8`], signature `y`
    pub const BYTE: MetaType = MetaType(2);
    /// [`i16`], signature `n`
    pub const INT16: MetaType = MetaType(3);
    /// [`u16`], signature `q`
    pub const UINT16: MetaType = MetaType(4);
    /// [`i32`], signature `i`
    pub const INT32: MetaType = MetaType(5);
    /// [`u32`], signature `u`
    pub const UINT32: MetaType = MetaType(6);
    /// [`i64`], signature `x`
    pub const INT64: MetaType = MetaType(7);
    /// [`u64`], signature `t`
    pub const UINT64: MetaType = MetaType(8);
    /// [`f64`], signature `d`
    pub const DOUBLE: MetaType = MetaType(9);
    /// [`String`], signature `s`
    pub const STRING: MetaType = MetaType(10);
    /// [`zvariant::OwnedObjectPath`], signature `o`
    pub const OBJECT_PATH: MetaType = MetaType(11);
    /// [`Signature`](crate::Signature), signature `g`
    pub const SIGNATURE: MetaType = MetaType(12);
    /// [`zvariant::OwnedValue`], signature `v`
    pub const VARIANT: MetaType = MetaType(13);
    /// `Vec<String>`, signature `as`
    pub const STRING_LIST: MetaType = MetaType(14);
    /// `Vec<u8>`, signature `ay`
    pub const BYTE_ARRAY: MetaType = MetaType(15);
    /// `HashMap<String, OwnedValue>`, signature `a{sv}`
    pub const VARIANT_MAP: MetaType = MetaType(16);

    /// The first id handed out to types that are not built in
    pub const FIRST_USER_ID: u32 = 1024;

    pub(crate) const fn from_id(id: u32) -> Self {
        Self(id)
    }

    /// The numeric id of this descriptor
    pub fn id(self) -> u32 {
        self.0
    }

    /// Whether this is not [`MetaType::INVALID`]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Whether this descriptor belongs to one of the built-in types
    pub fn is_builtin(self) -> bool {
        self.is_valid() && self.0 < Self::FIRST_USER_ID
    }
}

impl Display for MetaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MetaType({})", self.0)
    }
}
