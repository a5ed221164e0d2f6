mod writer;

pub(crate) use writer::MAX_ARRAY_LEN;
pub use writer::Writer;
