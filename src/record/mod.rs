pub mod codec;
pub mod reader;
pub mod writer;

pub use codec::{decode, encode, encoded_size, read_frame};
pub use reader::{FileRecordReader, RecordReader};
pub use writer::RecordWriter;
