/// Align an arbitrary offset to a multiple of 2
/// The result is undefined for alignments that are not a power of 2
pub fn align_offset(offset: usize, alignment: usize) -> usize {
    (offset + alignment - 1) & !(alignment - 1)
}

/// Number of padding bytes needed to bring `offset` to `alignment`
pub fn padding_for(offset: usize, alignment: usize) -> usize {
    align_offset(offset, alignment) - offset
}

#[cfg(test)]
mod test {
    use super::{align_offset, padding_for};

    #[test]
    fn align() {
        assert_eq!(align_offset(17, 16), 32);
        assert_eq!(align_offset(13, 8), 16);

        assert_eq!(align_offset(1, 8), 8);
        assert_eq!(align_offset(7, 8), 8);
        assert_eq!(align_offset(8, 8), 8);

        assert_eq!(align_offset(1, 4), 4);
        assert_eq!(align_offset(4, 4), 4);

        assert_eq!(align_offset(0, 2), 0);
        assert_eq!(align_offset(3, 2), 4);

        assert_eq!(align_offset(0, 1), 0);
        assert_eq!(align_offset(1, 1), 1);
    }

    #[test]
    fn padding() {
        assert_eq!(padding_for(0, 8), 0);
        assert_eq!(padding_for(5, 8), 3);
        assert_eq!(padding_for(6, 4), 2);
        assert_eq!(padding_for(9, 1), 0);
    }
}
