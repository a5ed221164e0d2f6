use crate::error::{Error, Result};
use crate::signature::{Signature, SignatureTy};
use crate::util::padding_for;
use crate::{Endian, Registry};
use std::any::Any;

/// D-Bus limits arrays to 64 MiB of element data
pub(crate) const MAX_ARRAY_LEN: usize = 1 << 26;

#[derive(Debug)]
enum FrameKind {
    Structure,
    Array {
        element: Signature,
        length_offset: usize,
        start: usize,
        dict: bool,
    },
    DictEntry,
    Variant {
        expected: Signature,
    },
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    signature: String,
}

/// A D-Bus argument stream that values are marshalled into
///
/// The writer produces a message body in D-Bus wire format and records the body signature
/// as values are appended. Custom types are dispatched through the [`Registry`] the writer
/// was created for.
///
/// ```
/// use dbus_metatype::{Registry, Writer};
///
/// let registry = Registry::new();
/// let mut writer = Writer::new(&registry);
/// writer.begin_structure();
/// writer.append(&42i32).unwrap();
/// writer.append(&String::from("x")).unwrap();
/// writer.end_structure().unwrap();
///
/// let (data, signature) = writer.finish().unwrap();
/// assert_eq!(signature.as_str(), "(is)");
/// assert_eq!(data, [42, 0, 0, 0, 1, 0, 0, 0, b'x', 0]);
/// ```
#[derive(Debug)]
pub struct Writer<'r> {
    registry: &'r Registry,
    endian: Endian,
    data: Vec<u8>,
    signature: String,
    frames: Vec<Frame>,
}

impl<'r> Writer<'r> {
    /// Create a new writer with the byte order configured in the registry options
    pub fn new(registry: &'r Registry) -> Self {
        Self::with_endian(registry, registry.options().endian)
    }

    /// Create a new writer for the specified byte order
    pub fn with_endian(registry: &'r Registry, endian: Endian) -> Self {
        Self {
            registry,
            endian,
            data: Vec::new(),
            signature: String::new(),
            frames: Vec::new(),
        }
    }

    /// The registry used for nested dispatch
    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// The byte order of this writer
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// The number of bytes written so far
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing was written yet
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The bytes written so far
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The signature of all complete values written at the top level so far
    pub fn current_signature(&self) -> &str {
        &self.signature
    }

    fn record(&mut self, signature: &str) {
        match self.frames.last_mut() {
            Some(frame) => frame.signature.push_str(signature),
            None => self.signature.push_str(signature),
        }
    }

    fn pad(&mut self, alignment: usize) {
        let padding = padding_for(self.data.len(), alignment);
        self.data.resize(self.data.len() + padding, 0);
    }

    fn pop_frame(&mut self, what: &str) -> Result<Frame> {
        self.frames
            .pop()
            .ok_or_else(|| Error::Consistency(format!("{what} without matching begin")))
    }

    /// Append any registered value, dispatching through the registry
    pub fn append<T: Any>(&mut self, value: &T) -> Result<()> {
        let registry = self.registry;
        registry.marshall_value(self, value)
    }

    /// Append a value using its zvariant encoding directly, bypassing the registry
    pub fn append_native<T>(&mut self, value: &T) -> Result<()>
    where
        T: zvariant::Type + serde::Serialize + ?Sized,
    {
        let signature = Signature::of::<T>()?;
        if signature.is_empty() {
            return Err(Error::InvalidSignature(String::new()));
        }

        self.pad(signature.alignment());
        let context = zvariant::serialized::Context::new_dbus(self.endian.into(), self.data.len());
        let bytes = zvariant::to_bytes(context, value)?;
        self.data.extend_from_slice(&bytes);
        self.record(signature.as_str());
        Ok(())
    }

    /// Append a signature value (type code `g`)
    pub fn append_signature(&mut self, signature: &SignatureTy) -> Result<()> {
        // Validated signatures never exceed 255 bytes
        let len = u8::try_from(signature.len())
            .map_err(|_| Error::InvalidSignature(signature.to_string()))?;
        self.data.push(len);
        self.data.extend_from_slice(signature.as_bytes());
        self.data.push(0);
        self.record("g");
        Ok(())
    }

    /// Open a struct. Every value appended until [`end_structure`](Self::end_structure)
    /// becomes a member
    pub fn begin_structure(&mut self) {
        self.pad(8);
        self.frames.push(Frame {
            kind: FrameKind::Structure,
            signature: String::new(),
        });
    }

    /// Close the innermost struct
    pub fn end_structure(&mut self) -> Result<()> {
        let frame = self.pop_frame("end_structure")?;
        match frame.kind {
            FrameKind::Structure if !frame.signature.is_empty() => {
                self.record(&format!("({})", frame.signature));
                Ok(())
            }
            FrameKind::Structure => Err(Error::Consistency(
                "D-Bus structs must have at least one member".to_string(),
            )),
            other => Err(Error::Consistency(format!(
                "end_structure called while {other:?} is open"
            ))),
        }
    }

    /// Open an array of `element` values
    pub fn begin_array(&mut self, element: &SignatureTy) -> Result<()> {
        if !element.is_single_complete_type() || element.as_bytes()[0] == b'{' {
            return Err(Error::InvalidSignature(element.to_string()));
        }

        self.begin_array_inner(element.to_owned(), false);
        Ok(())
    }

    fn begin_array_inner(&mut self, element: Signature, dict: bool) {
        self.pad(4);
        let length_offset = self.data.len();
        self.data.extend_from_slice(&[0; 4]);
        // The padding before the first element is not part of the array length
        self.pad(element.alignment());
        let start = self.data.len();

        self.frames.push(Frame {
            kind: FrameKind::Array {
                element,
                length_offset,
                start,
                dict,
            },
            signature: String::new(),
        });
    }

    fn end_array_inner(&mut self, want_dict: bool) -> Result<()> {
        let what = if want_dict { "end_map" } else { "end_array" };
        let frame = self.pop_frame(what)?;
        let (element, length_offset, start, dict) = match frame.kind {
            FrameKind::Array {
                element,
                length_offset,
                start,
                dict,
            } => (element, length_offset, start, dict),
            other => {
                return Err(Error::Consistency(format!(
                    "{what} called while {other:?} is open"
                )))
            }
        };

        if dict != want_dict {
            return Err(Error::Consistency(format!(
                "{what} called for an array of {element}"
            )));
        }

        let written = frame.signature.as_bytes();
        let element_bytes = element.as_bytes();
        if written.len() % element_bytes.len() != 0
            || written
                .chunks(element_bytes.len())
                .any(|chunk| chunk != element_bytes)
        {
            return Err(Error::Consistency(format!(
                "Array of {element} contains values of signature '{}'",
                frame.signature
            )));
        }

        let length = self.data.len() - start;
        if length > MAX_ARRAY_LEN {
            return Err(Error::Consistency(format!(
                "Array of {length} bytes exceeds the maximum of {MAX_ARRAY_LEN}"
            )));
        }

        let length = self.endian.write_u32(length as u32);
        self.data[length_offset..length_offset + 4].copy_from_slice(&length);
        self.record(&format!("a{element}"));
        Ok(())
    }

    /// Close the innermost array
    pub fn end_array(&mut self) -> Result<()> {
        self.end_array_inner(false)
    }

    /// Open a dictionary from `key` to `value`. `key` must be a basic type
    pub fn begin_map(&mut self, key: &SignatureTy, value: &SignatureTy) -> Result<()> {
        let dict = Signature::new_dict(key, value)?;
        self.begin_array_inner(dict.element().to_owned(), true);
        Ok(())
    }

    /// Open an entry of the innermost dictionary. Append the key, then the value
    pub fn begin_map_entry(&mut self) -> Result<()> {
        match self.frames.last() {
            Some(Frame {
                kind: FrameKind::Array { dict: true, .. },
                ..
            }) => {
                self.pad(8);
                self.frames.push(Frame {
                    kind: FrameKind::DictEntry,
                    signature: String::new(),
                });
                Ok(())
            }
            _ => Err(Error::Consistency(
                "begin_map_entry called outside of a map".to_string(),
            )),
        }
    }

    /// Close the innermost dictionary entry
    pub fn end_map_entry(&mut self) -> Result<()> {
        let frame = self.pop_frame("end_map_entry")?;
        match frame.kind {
            FrameKind::DictEntry => {
                self.record(&format!("{{{}}}", frame.signature));
                Ok(())
            }
            other => Err(Error::Consistency(format!(
                "end_map_entry called while {other:?} is open"
            ))),
        }
    }

    /// Close the innermost dictionary
    pub fn end_map(&mut self) -> Result<()> {
        self.end_array_inner(true)
    }

    /// Open a variant holding a single value of type `signature`
    pub fn begin_variant(&mut self, signature: &SignatureTy) -> Result<()> {
        if !signature.is_single_complete_type() {
            return Err(Error::InvalidSignature(signature.to_string()));
        }

        // The inner signature is written as data, it does not count towards the body signature
        let len = signature.len() as u8;
        self.data.push(len);
        self.data.extend_from_slice(signature.as_bytes());
        self.data.push(0);

        self.frames.push(Frame {
            kind: FrameKind::Variant {
                expected: signature.to_owned(),
            },
            signature: String::new(),
        });
        Ok(())
    }

    /// Close the innermost variant
    pub fn end_variant(&mut self) -> Result<()> {
        let frame = self.pop_frame("end_variant")?;
        match frame.kind {
            FrameKind::Variant { expected } if expected == frame.signature.as_str() => {
                self.record("v");
                Ok(())
            }
            FrameKind::Variant { expected } => Err(Error::Consistency(format!(
                "Variant declared as {expected} but holds '{}'",
                frame.signature
            ))),
            other => Err(Error::Consistency(format!(
                "end_variant called while {other:?} is open"
            ))),
        }
    }

    /// Append any registered value wrapped in a variant
    pub fn append_variant<T: Any>(&mut self, value: &T) -> Result<()> {
        let registry = self.registry;
        let signature = registry.signature_of::<T>()?;
        self.begin_variant(&signature)?;
        registry.marshall_value(self, value)?;
        self.end_variant()
    }

    /// Finish writing and return the message body and its signature
    ///
    /// Fails if a struct, array, map or variant is still open.
    pub fn finish(self) -> Result<(Vec<u8>, Signature)> {
        if let Some(frame) = self.frames.last() {
            return Err(Error::Consistency(format!(
                "{:?} was never closed",
                frame.kind
            )));
        }

        let signature = Signature::new(&self.signature)?;
        Ok((self.data, signature))
    }
}
