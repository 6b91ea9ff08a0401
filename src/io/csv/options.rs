use arrow::{csv::reader::Format, datatypes::SchemaRef};

/// A builder for [`CsvReadOptions`].
#[derive(Debug)]
pub struct CsvReadOptionsBuilder {
    /// An explicit schema; inferred from the data if `None`.
    schema: Option<SchemaRef>,
    /// Whether the first row should be treated as a header.
    has_header: bool,
    /// The byte used as a field delimiter.
    delimiter: u8,
    /// The byte used for quoting fields.
    quote: u8,
}

impl CsvReadOptionsBuilder {
    /// Creates a [`CsvReadOptionsBuilder`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an explicit schema, skipping inference.
    pub fn with_schema(mut self, schema: Option<SchemaRef>) -> Self {
        self.schema = schema;
        self
    }

    /// Adds a boolean flag, whether a header is present or not.
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Adds a byte for the `delimiter`.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Adds a byte for the `quote`.
    pub fn with_quote(mut self, quote: u8) -> Self {
        self.quote = quote;
        self
    }

    /// Builds the final [`CsvReadOptions`].
    pub fn build(self) -> CsvReadOptions {
        CsvReadOptions {
            schema: self.schema,
            has_header: self.has_header,
            delimiter: self.delimiter,
            quote: self.quote,
        }
    }
}

impl Default for CsvReadOptionsBuilder {
    fn default() -> Self {
        Self {
            schema: None,
            has_header: true,
            delimiter: b',',
            quote: b'"',
        }
    }
}

/// How CSV files are parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvReadOptions {
    schema: Option<SchemaRef>,
    has_header: bool,
    delimiter: u8,
    quote: u8,
}

impl CsvReadOptions {
    /// Creates a [`CsvReadOptions`] instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a [`CsvReadOptionsBuilder`].
    pub fn builder() -> CsvReadOptionsBuilder {
        CsvReadOptionsBuilder::default()
    }

    pub fn schema(&self) -> Option<SchemaRef> {
        self.schema.clone()
    }

    pub fn has_header(&self) -> bool {
        self.has_header
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn quote(&self) -> u8 {
        self.quote
    }

    /// The arrow [`Format`] used for schema inference.
    pub(crate) fn format(&self) -> Format {
        Format::default()
            .with_header(self.has_header)
            .with_delimiter(self.delimiter)
            .with_quote(self.quote)
    }
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        CsvReadOptionsBuilder::new().build()
    }
}
