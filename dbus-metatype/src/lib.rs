//! # D-Bus meta-type registry
//!
//! This crate lets an application register its own data types for D-Bus transport. Every
//! registered type gets a [`MetaType`] descriptor, a D-Bus type [`Signature`] and a pair of
//! marshall/demarshall functions. Values are written to a [`Writer`] and read back from a
//! [`Reader`], which produce and consume D-Bus message bodies byte-for-byte identical to the
//! zvariant encoding.
//!
//! ## Examples
//!
//! Register a struct with custom functions and send it through a message body
//!
//! ```
//! use dbus_metatype::{Endian, Reader, Registry, Writer};
//!
//! #[derive(Debug, Default, Clone, PartialEq)]
//! struct Track {
//!     number: u32,
//!     title: String,
//! }
//!
//! let registry = Registry::new();
//! registry
//!     .register(
//!         |writer: &mut Writer, track: &Track| {
//!             writer.begin_structure();
//!             writer.append(&track.number)?;
//!             writer.append(&track.title)?;
//!             writer.end_structure()
//!         },
//!         |reader: &mut Reader| {
//!             reader.begin_structure()?;
//!             let track = Track {
//!                 number: reader.read()?,
//!                 title: reader.read()?,
//!             };
//!             reader.end_structure()?;
//!             Ok(track)
//!         },
//!     )
//!     .unwrap();
//! let playlist = registry.register_array::<Track>().unwrap();
//! assert_eq!(registry.type_to_signature(playlist).unwrap(), "a(us)");
//!
//! let tracks = vec![Track { number: 1, title: "Intro".to_string() }];
//! let mut writer = Writer::new(&registry);
//! writer.append(&tracks).unwrap();
//! let (body, signature) = writer.finish().unwrap();
//! assert_eq!(signature.as_str(), "a(us)");
//!
//! let mut reader = Reader::new(&registry, body, Endian::Little);
//! assert_eq!(reader.read::<Vec<Track>>().unwrap(), tracks);
//! ```
//!
//! Types that already implement [`serde`] and [`zvariant::Type`] can use their zvariant
//! encoding directly
//!
//! ```
//! use dbus_metatype::Registry;
//!
//! #[derive(serde::Serialize, serde::Deserialize, zvariant::Type)]
//! struct Size {
//!     width: u32,
//!     height: u32,
//! }
//!
//! let registry = Registry::new();
//! let meta_type = registry.register_native::<Size>().unwrap();
//! assert_eq!(registry.type_to_signature(meta_type).unwrap(), "(uu)");
//! ```

#![warn(missing_docs)]
#![allow(unknown_lints, clippy::assigning_clones)]

/// Demarshall values from D-Bus message bodies
///
/// See the documentation of [`Reader`](crate::read::Reader) to get started
pub mod read;

/// Marshall values into D-Bus message bodies
///
/// See the documentation of [`Writer`](crate::write::Writer) to get started
pub mod write;

/// D-Bus type signatures
pub mod signature;

#[cfg(test)]
pub(crate) mod test;

mod endian;
mod error;
mod meta_type;
mod registry;
mod util;

pub use endian::Endian;
pub use error::{Error, Result};
pub use meta_type::MetaType;
pub use read::Reader;
pub use registry::{DuplicatePolicy, Registry, RegistryOptions};
pub use signature::{Signature, SignatureTy};
pub use write::Writer;
