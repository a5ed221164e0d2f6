use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;

/// Maximum length of a D-Bus signature in bytes
pub const MAX_SIGNATURE_LEN: usize = 255;

/// Maximum nesting depth of arrays in a D-Bus signature
pub const MAX_ARRAY_DEPTH: usize = 32;

/// Maximum nesting depth of structs and dict entries in a D-Bus signature
pub const MAX_STRUCT_DEPTH: usize = 32;

/// A borrowed D-Bus type signature
///
/// Internally this is just a byte string that meets the D-Bus signature grammar. It may
/// contain zero or more complete types, like the signature of a message body.
#[derive(PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SignatureTy([u8]);

impl SignatureTy {
    // basic type codes
    /// The type code for a byte
    pub const CODE_BYTE: u8 = b'y';

    /// The type code for a bool
    pub const CODE_BOOLEAN: u8 = b'b';

    /// The type code for an i16
    pub const CODE_INT16: u8 = b'n';

    /// The type code for an u16
    pub const CODE_UINT16: u8 = b'q';

    /// The type code for an i32
    pub const CODE_INT32: u8 = b'i';

    /// The type code for an u32
    pub const CODE_UINT32: u8 = b'u';

    /// The type code for an i64
    pub const CODE_INT64: u8 = b'x';

    /// The type code for an u64
    pub const CODE_UINT64: u8 = b't';

    /// The type code for an f64
    pub const CODE_DOUBLE: u8 = b'd';

    /// The type code for a unix file descriptor index
    pub const CODE_UNIX_FD: u8 = b'h';

    /// The type code for a string
    pub const CODE_STRING: u8 = b's';

    /// The type code for an object path
    pub const CODE_OBJECT_PATH: u8 = b'o';

    /// The type code for a signature
    pub const CODE_SIGNATURE: u8 = b'g';

    // container type codes
    /// The type code for a variant container
    pub const CODE_VARIANT: u8 = b'v';

    /// The type code for an array
    pub const CODE_ARRAY: u8 = b'a';

    /// The opening type code of a struct
    pub const CODE_STRUCT_BEGIN: u8 = b'(';

    /// The closing type code of a struct
    pub const CODE_STRUCT_END: u8 = b')';

    /// The opening type code of a dict entry
    pub const CODE_DICT_ENTRY_BEGIN: u8 = b'{';

    /// The closing type code of a dict entry
    pub const CODE_DICT_ENTRY_END: u8 = b'}';

    /// The empty signature of a message without arguments
    pub const EMPTY: &'static SignatureTy = unsafe { SignatureTy::from_slice_unchecked(b"") };

    /// `bool`
    pub const BOOLEAN: &'static SignatureTy = unsafe { SignatureTy::from_slice_unchecked(b"b") };

    /// [`u8`]
    pub const BYTE: &'static SignatureTy = unsafe { SignatureTy::from_slice_unchecked(b"y") };

    /// [`i16`]
    pub const INT16: &'static SignatureTy = unsafe { SignatureTy::from_slice_unchecked(b"n") };

    /// [`u16`]
    pub const UINT16: &'static SignatureTy = unsafe { SignatureTy::from_slice_unchecked(b"q") };

    /// [`i32`]
    pub const INT32: &'static SignatureTy = unsafe { SignatureTy::from_slice_unchecked(b"i") };

    /// [`u32`]
    pub const UINT32: &'static SignatureTy = unsafe { SignatureTy::from_slice_unchecked(b"u") };

    /// [`i64`]
    pub const INT64: &'static SignatureTy = unsafe { SignatureTy::from_slice_unchecked(b"x") };

    /// [`u64`]
    pub const UINT64: &'static SignatureTy = unsafe { SignatureTy::from_slice_unchecked(b"t") };

    /// [`f64`]
    pub const DOUBLE: &'static SignatureTy = unsafe { SignatureTy::from_slice_unchecked(b"d") };

    /// [`String`]
    pub const STRING: &'static SignatureTy = unsafe { SignatureTy::from_slice_unchecked(b"s") };

    /// An object path
    pub const OBJECT_PATH: &'static SignatureTy =
        unsafe { SignatureTy::from_slice_unchecked(b"o") };

    /// A signature
    pub const SIGNATURE: &'static SignatureTy =
        unsafe { SignatureTy::from_slice_unchecked(b"g") };

    /// A container with associated type information
    pub const VARIANT: &'static SignatureTy = unsafe { SignatureTy::from_slice_unchecked(b"v") };

    /// An array of strings
    pub const STRING_ARRAY: &'static SignatureTy =
        unsafe { SignatureTy::from_slice_unchecked(b"as") };

    /// An array of bytes
    pub const BYTE_ARRAY: &'static SignatureTy =
        unsafe { SignatureTy::from_slice_unchecked(b"ay") };

    /// A dictionary of variants keyed by string
    pub const VARDICT: &'static SignatureTy =
        unsafe { SignatureTy::from_slice_unchecked(b"a{sv}") };

    /// Create a SignatureTy without checking if the signature is valid
    ///
    /// # Safety
    ///
    /// This may not actually cause undefined behavior. The only reason this function is marked
    /// unsafe is because it is possible to invalidate the signature invariants with this
    /// function.
    pub const unsafe fn from_slice_unchecked(signature: &[u8]) -> &SignatureTy {
        std::mem::transmute::<&[u8], &SignatureTy>(signature)
    }

    /// Parse a signature made of zero or more complete types
    pub fn new(signature: &str) -> Result<&Self> {
        if Self::signature_is_valid(signature) {
            Ok(unsafe { Self::from_slice_unchecked(signature.as_bytes()) })
        } else {
            Err(Error::InvalidSignature(signature.to_string()))
        }
    }

    /// Parse a signature that must contain exactly one complete type
    pub fn new_single(signature: &str) -> Result<&Self> {
        let ty = Self::new(signature)?;
        if ty.is_single_complete_type() {
            Ok(ty)
        } else {
            Err(Error::InvalidSignature(signature.to_string()))
        }
    }

    /// Return the bytes that compose this signature
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Return the signature string
    pub fn as_str(&self) -> &str {
        // Only ascii type codes pass validation
        unsafe { std::str::from_utf8_unchecked(&self.0) }
    }

    /// Length of the signature in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the empty signature
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `code` is the type code of a basic type
    pub fn is_basic_code(code: u8) -> bool {
        matches!(
            code,
            Self::CODE_BYTE
                | Self::CODE_BOOLEAN
                | Self::CODE_INT16
                | Self::CODE_UINT16
                | Self::CODE_INT32
                | Self::CODE_UINT32
                | Self::CODE_INT64
                | Self::CODE_UINT64
                | Self::CODE_DOUBLE
                | Self::CODE_UNIX_FD
                | Self::CODE_STRING
                | Self::CODE_OBJECT_PATH
                | Self::CODE_SIGNATURE
        )
    }

    /// Return whether this signature is a single basic / non-container type (like int or string)
    pub fn is_basic(&self) -> bool {
        self.0.len() == 1 && Self::is_basic_code(self.0[0])
    }

    /// Return whether this signature starts with a container type
    pub fn is_container(&self) -> bool {
        matches!(
            self.0.first(),
            Some(&Self::CODE_ARRAY | &Self::CODE_STRUCT_BEGIN | &Self::CODE_VARIANT)
        )
    }

    /// Return whether this signature starts with an array type (including dictionaries)
    pub fn is_array(&self) -> bool {
        self.0.first() == Some(&Self::CODE_ARRAY)
    }

    /// Return whether this signature starts with a dictionary (an array of dict entries)
    pub fn is_dict(&self) -> bool {
        self.0.starts_with(b"a{")
    }

    /// Return whether this signature starts with a struct
    pub fn is_struct(&self) -> bool {
        self.0.first() == Some(&Self::CODE_STRUCT_BEGIN)
    }

    /// Return whether this signature starts with a variant
    pub fn is_variant(&self) -> bool {
        self.0.first() == Some(&Self::CODE_VARIANT)
    }

    /// Whether this signature consists of exactly one complete type
    pub fn is_single_complete_type(&self) -> bool {
        !self.0.is_empty() && self.first_type_length() == self.0.len()
    }

    /// The wire alignment of the first type in this signature
    ///
    /// Returns 1 for the empty signature.
    pub fn alignment(&self) -> usize {
        self.0.first().map(|c| Self::alignment_of_code(*c)).unwrap_or(1)
    }

    /// The wire alignment of values whose type starts with `code`
    pub fn alignment_of_code(code: u8) -> usize {
        match code {
            Self::CODE_BYTE | Self::CODE_SIGNATURE | Self::CODE_VARIANT => 1,
            Self::CODE_INT16 | Self::CODE_UINT16 => 2,
            Self::CODE_INT64
            | Self::CODE_UINT64
            | Self::CODE_DOUBLE
            | Self::CODE_STRUCT_BEGIN
            | Self::CODE_DICT_ENTRY_BEGIN => 8,
            _ => 4,
        }
    }

    fn type_length_inner(signature: &[u8]) -> usize {
        let mut brackets = 0i32;
        let mut index = 0;
        loop {
            let mut chr = signature[index];
            while chr == Self::CODE_ARRAY {
                index += 1;
                chr = signature[index];
            }

            if chr == Self::CODE_STRUCT_BEGIN || chr == Self::CODE_DICT_ENTRY_BEGIN {
                brackets += 1;
            } else if chr == Self::CODE_STRUCT_END || chr == Self::CODE_DICT_ENTRY_END {
                brackets -= 1;
            }

            index += 1;

            if brackets == 0 {
                break;
            }
        }

        index
    }

    /// Length of the first complete type in this signature
    ///
    /// Returns 0 for the empty signature.
    pub fn first_type_length(&self) -> usize {
        if self.0.is_empty() {
            0
        } else {
            Self::type_length_inner(&self.0)
        }
    }

    /// The first complete type in this signature, if any
    pub fn first(&self) -> Option<&SignatureTy> {
        if self.0.is_empty() {
            None
        } else {
            Some(unsafe { Self::from_slice_unchecked(&self.0[..self.first_type_length()]) })
        }
    }

    /// Iterate over the complete types of this signature
    pub fn complete_types(&self) -> SignatureIter<'_> {
        SignatureIter { rest: &self.0 }
    }

    /// Return the element type of this array signature.
    ///
    /// For dictionaries this is the dict entry type, e.g. `{sv}` for `a{sv}`.
    ///
    /// # Panics
    ///
    /// This function panics if not called with an array type.
    pub fn element(&self) -> &SignatureTy {
        assert!(self.is_array(), "SignatureTy does not represent an array");
        let rest = unsafe { Self::from_slice_unchecked(&self.0[1..]) };
        let len = rest.first_type_length();
        unsafe { Self::from_slice_unchecked(&rest.0[..len]) }
    }

    /// Iterate over the member types of this struct or dict entry signature.
    ///
    /// # Panics
    ///
    /// This function panics if not called with a struct or dict entry type.
    pub fn members(&self) -> SignatureIter<'_> {
        assert!(
            matches!(
                self.0.first(),
                Some(&Self::CODE_STRUCT_BEGIN | &Self::CODE_DICT_ENTRY_BEGIN)
            ),
            "SignatureTy does not represent a struct or dict entry"
        );
        let len = self.first_type_length();
        SignatureIter {
            rest: &self.0[1..len - 1],
        }
    }

    /// Return the key and value types of this dictionary signature.
    ///
    /// # Panics
    ///
    /// This function panics if not called with a dictionary type.
    pub fn key_value(&self) -> (&SignatureTy, &SignatureTy) {
        assert!(self.is_dict(), "SignatureTy does not represent a dictionary");
        let mut members = self.element().members();
        let key = members.next().unwrap();
        let value = members.next().unwrap();
        (key, value)
    }

    fn complete_type_is_valid(
        signature: &mut &[u8],
        array_depth: usize,
        struct_depth: usize,
    ) -> Option<()> {
        let code = *signature.first()?;

        // Advance the pointer for next invocation
        *signature = &signature[1..];

        if Self::is_basic_code(code) || code == Self::CODE_VARIANT {
            Some(())
        } else if code == Self::CODE_ARRAY {
            if array_depth >= MAX_ARRAY_DEPTH {
                return None;
            }

            if *signature.first()? == Self::CODE_DICT_ENTRY_BEGIN {
                if struct_depth >= MAX_STRUCT_DEPTH {
                    return None;
                }

                *signature = &signature[1..];
                if !Self::is_basic_code(*signature.first()?) {
                    return None;
                }

                *signature = &signature[1..];
                Self::complete_type_is_valid(signature, array_depth + 1, struct_depth + 1)?;

                if *signature.first()? != Self::CODE_DICT_ENTRY_END {
                    return None;
                }

                *signature = &signature[1..];
                Some(())
            } else {
                Self::complete_type_is_valid(signature, array_depth + 1, struct_depth)
            }
        } else if code == Self::CODE_STRUCT_BEGIN {
            if struct_depth >= MAX_STRUCT_DEPTH {
                return None;
            }

            // Structs must have at least one member
            if *signature.first()? == Self::CODE_STRUCT_END {
                return None;
            }

            while *signature.first()? != Self::CODE_STRUCT_END {
                Self::complete_type_is_valid(signature, array_depth, struct_depth + 1)?;
            }

            *signature = &signature[1..];
            Some(())
        } else {
            None
        }
    }

    /// Is this a valid D-Bus signature of zero or more complete types?
    pub fn signature_is_valid(signature: &str) -> bool {
        if signature.len() > MAX_SIGNATURE_LEN {
            return false;
        }

        let mut rest = signature.as_bytes();
        while !rest.is_empty() {
            if Self::complete_type_is_valid(&mut rest, 0, 0).is_none() {
                return false;
            }
        }

        true
    }
}

impl Debug for SignatureTy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Signature").field(&self.as_str()).finish()
    }
}

impl Display for SignatureTy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<SignatureTy> for SignatureTy {
    fn as_ref(&self) -> &SignatureTy {
        self
    }
}

impl ToOwned for SignatureTy {
    type Owned = Signature;

    fn to_owned(&self) -> Self::Owned {
        let owned: Box<[u8]> = self.0.to_vec().into_boxed_slice();

        Signature {
            inner: unsafe { Box::from_raw(Box::into_raw(owned) as *mut SignatureTy) },
        }
    }
}

impl PartialEq<str> for SignatureTy {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for SignatureTy {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// An Iterator over the complete types of a signature
pub struct SignatureIter<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for SignatureIter<'a> {
    type Item = &'a SignatureTy;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }

        let len = SignatureTy::type_length_inner(self.rest);
        let (item, rest) = self.rest.split_at(len);
        self.rest = rest;
        Some(unsafe { SignatureTy::from_slice_unchecked(item) })
    }
}

/// An owned version of [`SignatureTy`]
#[repr(transparent)]
#[derive(PartialEq, Eq, Hash)]
pub struct Signature {
    inner: Box<SignatureTy>,
}

impl Signature {
    /// Create a new Signature by copying a signature string of zero or more complete types.
    pub fn new(signature: &str) -> Result<Self> {
        SignatureTy::new(signature).map(ToOwned::to_owned)
    }

    /// Create a new Signature that must contain exactly one complete type.
    pub fn new_single(signature: &str) -> Result<Self> {
        SignatureTy::new_single(signature).map(ToOwned::to_owned)
    }

    /// The signature of a zvariant type
    pub fn of<T: zvariant::Type + ?Sized>() -> Result<Self> {
        Self::new(&T::SIGNATURE.to_string())
    }

    /// Constructs the signature of an array of `element`
    pub fn new_array(element: &SignatureTy) -> Result<Self> {
        Self::new(&format!("a{element}"))
    }

    /// Constructs the signature of a dictionary from `key` to `value`
    ///
    /// Fails if `key` is not a basic type.
    pub fn new_dict(key: &SignatureTy, value: &SignatureTy) -> Result<Self> {
        Self::new_single(&format!("a{{{key}{value}}}"))
    }

    /// Constructs a struct signature from its members
    pub fn new_struct<T: AsRef<SignatureTy>, I: IntoIterator<Item = T>>(members: I) -> Result<Self> {
        let mut signature = String::from('(');

        for member in members {
            signature.push_str(member.as_ref().as_str());
        }

        signature.push(')');
        Self::new_single(&signature)
    }
}

impl Clone for Signature {
    fn clone(&self) -> Self {
        self.inner.to_owned()
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&*self.inner, f)
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&*self.inner, f)
    }
}

impl AsRef<SignatureTy> for Signature {
    fn as_ref(&self) -> &SignatureTy {
        self
    }
}

impl Borrow<SignatureTy> for Signature {
    fn borrow(&self) -> &SignatureTy {
        self
    }
}

impl Deref for Signature {
    type Target = SignatureTy;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl PartialEq<str> for Signature {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Signature {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl TryFrom<&str> for Signature {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}
