#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
/// The byte order of a D-Bus message body
pub enum Endian {
    /// Values encoded in little endian representation (`l` in the message header)
    #[default]
    Little,
    /// Values encoded in big endian representation (`B` in the message header)
    Big,
}

impl Endian {
    /// The native endianness of the target platform
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            Self::Little
        } else {
            Self::Big
        }
    }

    pub(crate) fn read_u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            Endian::Little => u32::from_le_bytes(bytes),
            Endian::Big => u32::from_be_bytes(bytes),
        }
    }

    pub(crate) fn write_u32(self, value: u32) -> [u8; 4] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }
}

impl From<Endian> for zvariant::Endian {
    fn from(value: Endian) -> Self {
        match value {
            Endian::Little => zvariant::Endian::Little,
            Endian::Big => zvariant::Endian::Big,
        }
    }
}

#[cfg(test)]
mod test {
    use super::Endian;

    #[test]
    fn native() {
        let expected = if u16::from_ne_bytes([1, 0]) == 1 {
            Endian::Little
        } else {
            Endian::Big
        };
        assert_eq!(Endian::native(), expected);
    }

    #[test]
    fn serde_names() {
        assert_eq!(serde_json::to_string(&Endian::Big).unwrap(), r#""big""#);
        assert_eq!(
            serde_json::from_str::<Endian>(r#""little""#).unwrap(),
            Endian::Little
        );
    }

    #[test]
    fn u32_order() {
        assert_eq!(Endian::Little.write_u32(1), [1, 0, 0, 0]);
        assert_eq!(Endian::Big.write_u32(1), [0, 0, 0, 1]);
        assert_eq!(Endian::Big.read_u32([0, 0, 1, 0]), 256);
    }
}
