pub mod format;
pub mod opener;
pub mod options;

/// How many records should be read in order to infer the CSV schema.
pub const MAX_INFER_RECORDS: usize = 100;

/// How many leading bytes are sniffed to recognize a CSV file.
pub const SNIFF_BYTES: usize = 1024;
