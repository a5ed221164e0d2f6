use crate::error::{Error, Result};
use crate::signature::{Signature, SignatureTy};
use crate::util::padding_for;
use crate::write::MAX_ARRAY_LEN;
use crate::{Endian, Registry};
use std::any::Any;
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq)]
enum Frame {
    Structure,
    Array { end: usize, dict: bool },
    DictEntry,
    Variant,
}

/// A D-Bus argument stream that values are demarshalled from
///
/// The reader walks a message body in D-Bus wire format. Every read consumes exactly one
/// value and leaves the stream at the next value boundary. After a failed read the position
/// is unspecified and the reader must be discarded.
///
/// ```
/// use dbus_metatype::{Endian, Reader, Registry};
///
/// let registry = Registry::new();
/// let data = [42u8, 0, 0, 0, 1, 0, 0, 0, b'x', 0];
/// let mut reader = Reader::new(&registry, &data[..], Endian::Little);
///
/// reader.begin_structure().unwrap();
/// let number: i32 = reader.read().unwrap();
/// let string: String = reader.read().unwrap();
/// reader.end_structure().unwrap();
///
/// assert_eq!((number, string.as_str()), (42, "x"));
/// assert!(reader.at_end());
/// ```
#[derive(Debug)]
pub struct Reader<'a> {
    registry: &'a Registry,
    endian: Endian,
    data: Cow<'a, [u8]>,
    pos: usize,
    frames: Vec<Frame>,
}

impl<'a> Reader<'a> {
    /// Create a reader over a message body encoded with the specified byte order
    pub fn new(registry: &'a Registry, data: impl Into<Cow<'a, [u8]>>, endian: Endian) -> Self {
        Self {
            registry,
            endian,
            data: data.into(),
            pos: 0,
            frames: Vec::new(),
        }
    }

    /// The registry used for nested dispatch
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// The byte order of this reader
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// The current read offset into the message body
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The number of unread bytes in the message body
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn limit(&self) -> usize {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| match frame {
                Frame::Array { end, .. } => Some(*end),
                _ => None,
            })
            .unwrap_or(self.data.len())
    }

    /// Whether the innermost array (or the whole body, outside of arrays) has no more elements
    pub fn at_end(&self) -> bool {
        self.pos >= self.limit()
    }

    fn take(&mut self, len: usize) -> Result<&[u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.limit())
            .ok_or_else(|| {
                Error::Data(format!(
                    "Missing {} bytes at offset {}",
                    (self.pos + len).saturating_sub(self.limit()),
                    self.pos
                ))
            })?;

        let start = self.pos;
        self.pos = end;
        Ok(&self.data[start..end])
    }

    fn skip_padding(&mut self, alignment: usize) -> Result<()> {
        let padding = padding_for(self.pos, alignment);
        let offset = self.pos;
        if self.take(padding)?.iter().any(|byte| *byte != 0) {
            return Err(Error::Data(format!("Non-zero padding at offset {offset}")));
        }

        Ok(())
    }

    fn read_u32(&mut self) -> Result<u32> {
        self.skip_padding(4)?;
        let bytes = self.take(4)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(bytes);
        Ok(self.endian.read_u32(word))
    }

    fn pop_frame(&mut self, expected: &Frame, what: &str) -> Result<()> {
        match self.frames.pop() {
            Some(frame) if std::mem::discriminant(&frame) == std::mem::discriminant(expected) => {
                Ok(())
            }
            Some(frame) => Err(Error::Consistency(format!(
                "{what} called while {frame:?} is open"
            ))),
            None => Err(Error::Consistency(format!(
                "{what} without matching begin"
            ))),
        }
    }

    /// Read any registered value, dispatching through the registry
    pub fn read<T: Any>(&mut self) -> Result<T> {
        let registry = self.registry;
        registry.demarshall_value(self)
    }

    /// Read a value using its zvariant decoding directly, bypassing the registry
    pub fn read_native<T>(&mut self) -> Result<T>
    where
        T: zvariant::Type + serde::de::DeserializeOwned,
    {
        let signature = Signature::of::<T>()?;
        if signature.is_empty() {
            return Err(Error::InvalidSignature(String::new()));
        }

        self.skip_padding(signature.alignment())?;
        let limit = self.limit();
        let context = zvariant::serialized::Context::new_dbus(self.endian.into(), self.pos);
        let data = zvariant::serialized::Data::new(&self.data[self.pos..limit], context);
        let (value, consumed) = data.deserialize::<T>()?;
        self.pos += consumed;
        Ok(value)
    }

    /// Read a signature value (type code `g`)
    pub fn read_signature(&mut self) -> Result<Signature> {
        let len = self.take(1)?[0] as usize;
        let bytes = self.take(len + 1)?;
        if bytes[len] != 0 {
            return Err(Error::Data("Signature is not nul-terminated".to_string()));
        }

        let signature = std::str::from_utf8(&bytes[..len])?.to_string();
        Signature::new(&signature)
    }

    /// Enter a struct
    pub fn begin_structure(&mut self) -> Result<()> {
        self.skip_padding(8)?;
        self.frames.push(Frame::Structure);
        Ok(())
    }

    /// Leave the innermost struct
    pub fn end_structure(&mut self) -> Result<()> {
        self.pop_frame(&Frame::Structure, "end_structure")
    }

    fn begin_array_inner(&mut self, element: &SignatureTy, dict: bool) -> Result<()> {
        let length = self.read_u32()? as usize;
        if length > MAX_ARRAY_LEN {
            return Err(Error::Data(format!(
                "Array length {length} exceeds the maximum of {MAX_ARRAY_LEN}"
            )));
        }

        self.skip_padding(element.alignment())?;
        let end = self.pos + length;
        if end > self.limit() {
            return Err(Error::Data(format!(
                "Array of {length} bytes at offset {} exceeds the available data",
                self.pos
            )));
        }

        self.frames.push(Frame::Array { end, dict });
        Ok(())
    }

    fn end_array_inner(&mut self, want_dict: bool) -> Result<()> {
        let what = if want_dict { "end_map" } else { "end_array" };
        match self.frames.last() {
            Some(Frame::Array { end, dict }) if *dict == want_dict => {
                if self.pos != *end {
                    return Err(Error::Data(format!(
                        "Array ends at offset {end} but reading stopped at {}",
                        self.pos
                    )));
                }

                self.frames.pop();
                Ok(())
            }
            other => Err(Error::Consistency(format!(
                "{what} called while {other:?} is open"
            ))),
        }
    }

    /// Enter an array of `element` values. Use [`at_end`](Self::at_end) to detect the last element
    pub fn begin_array(&mut self, element: &SignatureTy) -> Result<()> {
        if !element.is_single_complete_type() {
            return Err(Error::InvalidSignature(element.to_string()));
        }

        self.begin_array_inner(element, false)
    }

    /// Leave the innermost array. All elements must have been read
    pub fn end_array(&mut self) -> Result<()> {
        self.end_array_inner(false)
    }

    /// Enter a dictionary from `key` to `value`
    pub fn begin_map(&mut self, key: &SignatureTy, value: &SignatureTy) -> Result<()> {
        let dict = Signature::new_dict(key, value)?;
        self.begin_array_inner(dict.element(), true)
    }

    /// Enter the next dictionary entry
    pub fn begin_map_entry(&mut self) -> Result<()> {
        match self.frames.last() {
            Some(Frame::Array { dict: true, .. }) => {
                self.skip_padding(8)?;
                self.frames.push(Frame::DictEntry);
                Ok(())
            }
            _ => Err(Error::Consistency(
                "begin_map_entry called outside of a map".to_string(),
            )),
        }
    }

    /// Leave the innermost dictionary entry
    pub fn end_map_entry(&mut self) -> Result<()> {
        self.pop_frame(&Frame::DictEntry, "end_map_entry")
    }

    /// Leave the innermost dictionary. All entries must have been read
    pub fn end_map(&mut self) -> Result<()> {
        self.end_array_inner(true)
    }

    /// Enter a variant and return the signature of the value it holds
    pub fn begin_variant(&mut self) -> Result<Signature> {
        let signature = self.read_signature()?;
        if !signature.is_single_complete_type() {
            return Err(Error::Data(format!(
                "Variant holds signature '{signature}' which is not a single complete type"
            )));
        }

        self.frames.push(Frame::Variant);
        Ok(signature)
    }

    /// Leave the innermost variant
    pub fn end_variant(&mut self) -> Result<()> {
        self.pop_frame(&Frame::Variant, "end_variant")
    }

    /// Read a variant holding a value of the registered type `T`
    pub fn read_variant<T: Any>(&mut self) -> Result<T> {
        let registry = self.registry;
        let expected = registry.signature_of::<T>()?;
        let signature = self.begin_variant()?;
        if signature != expected {
            return Err(Error::TypeMismatch {
                marshalled: signature.to_string(),
                demarshalled: expected.to_string(),
            });
        }

        let value = registry.demarshall_value(self)?;
        self.end_variant()?;
        Ok(value)
    }
}
