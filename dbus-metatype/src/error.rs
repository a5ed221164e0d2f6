use std::fmt::{Display, Formatter};
use std::str::Utf8Error;

/// An error that can occur while registering, looking up, marshalling or demarshalling types
#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// The type descriptor or signature is not known to the registry
    UnknownType(String),

    /// The string is not a valid single complete D-Bus type signature
    InvalidSignature(String),

    /// The marshall and demarshall functions of a registration disagree on the value type,
    /// or a value was passed with a descriptor of a different type
    TypeMismatch {
        /// The type accepted by the marshall function (or the descriptor's type)
        marshalled: String,
        /// The type returned by the demarshall function (or the value's type)
        demarshalled: String,
    },

    /// No marshall/demarshall functions are registered for the type
    UnsupportedOperation(String),

    /// The type has no native codec and no custom functions were supplied
    UnsupportedType(String),

    /// The type is already registered and the registry rejects duplicates
    AlreadyRegistered(String),

    /// Read invalid or truncated data with context information in the provided string
    Data(String),

    /// The stream was driven inconsistently, e.g. unbalanced begin/end calls
    Consistency(String),

    /// Error converting a string to UTF-8
    Utf8(Utf8Error),

    /// An error occured when encoding or decoding a basic value with zvariant
    ZVariant(zvariant::Error),
}

impl std::error::Error for Error {}

impl From<Utf8Error> for Error {
    fn from(err: Utf8Error) -> Self {
        Self::Utf8(err)
    }
}

impl From<zvariant::Error> for Error {
    fn from(err: zvariant::Error) -> Self {
        Self::ZVariant(err)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnknownType(name) => write!(f, "Unknown type: {name}"),
            Error::InvalidSignature(signature) => {
                write!(f, "Invalid D-Bus signature: '{signature}'")
            }
            Error::TypeMismatch {
                marshalled,
                demarshalled,
            } => write!(
                f,
                "Marshalled type {marshalled} is different from demarshalled type {demarshalled}"
            ),
            Error::UnsupportedOperation(name) => {
                write!(f, "No D-Bus marshalling registered for type {name}")
            }
            Error::UnsupportedType(name) => {
                write!(f, "Type {name} has no native D-Bus codec")
            }
            Error::AlreadyRegistered(name) => {
                write!(f, "Type {name} is already registered")
            }
            Error::Data(msg) => write!(f, "Invalid D-Bus data: {msg}"),
            Error::Consistency(context) => write!(f, "Inconsistent stream usage: {context}"),
            Error::Utf8(err) => write!(f, "Error converting string to UTF-8: {err}"),
            Error::ZVariant(err) => write!(f, "Error in ZVariant data: {err}"),
        }
    }
}

/// The Result type for [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod test {
    use super::Error;
    use matches::assert_matches;

    #[test]
    fn from() {
        let err = Error::from(zvariant::Error::Message("test".to_string()));
        assert_matches!(err, Error::ZVariant(_));
        assert!(format!("{err}").contains("test"));

        let utf8_err = std::str::from_utf8(&[0xC3, 0x28]).unwrap_err();
        let err = Error::from(utf8_err);
        assert!(format!("{err}").contains("UTF-8"));
    }

    #[test]
    fn display() {
        let err = Error::TypeMismatch {
            marshalled: "i32".to_string(),
            demarshalled: "u32".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("i32"));
        assert!(msg.contains("u32"));

        let err = Error::InvalidSignature("zzz".to_string());
        assert!(format!("{err}").contains("'zzz'"));

        let err = Error::UnsupportedOperation("my::Type".to_string());
        assert!(format!("{err}").contains("my::Type"));
    }
}
