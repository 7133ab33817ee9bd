mod delimiter;
mod writer;

pub use delimiter::parse_delimiter;
pub use writer::CsvRowWriter;
