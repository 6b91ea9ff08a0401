use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("TypeError: {message}, {location}"))]
    Type {
        message: String,
        location: snafu::Location,
    },
    #[snafu(display("DiscoveryError: {message}, {location}"))]
    Discovery {
        message: String,
        location: snafu::Location,
    },
    #[snafu(display("IoError: {message}, {location}"))]
    Io {
        message: String,
        location: snafu::Location,
    },
    #[snafu(display("NotSupportedError: {message}, {location}"))]
    NotSupported {
        message: String,
        location: snafu::Location,
    },
    #[snafu(display("ProjectionError: {message}, {location}"))]
    Projection {
        message: String,
        location: snafu::Location,
    },
    #[snafu(display("InvalidDataError: {message}, {location}"))]
    InvalidData {
        message: String,
        location: snafu::Location,
    },
    #[snafu(display("InvalidOperationError: {message}, {location}"))]
    InvalidOperation {
        message: String,
        location: snafu::Location,
    },
    #[snafu(display("FmtError: {message}, {location}"))]
    Fmt {
        message: String,
        location: snafu::Location,
    },
    #[snafu(display("ArrowError: {message}, {location}"))]
    Arrow {
        message: String,
        location: snafu::Location,
    },
    #[snafu(display("ParquetError: {message}, {location}"))]
    Parquet {
        message: String,
        location: snafu::Location,
    },
    #[snafu(display("ExecutionError: {message}, {location}"))]
    Execution {
        message: String,
        location: snafu::Location,
    },
}

trait ToSnafuLocation {
    fn to_snafu_location(&'static self) -> snafu::Location;
}

impl ToSnafuLocation for std::panic::Location<'static> {
    fn to_snafu_location(&'static self) -> snafu::Location {
        snafu::Location::new(self.file(), self.line(), self.column())
    }
}

macro_rules! make_error_from {
    ($from:ty, $to:ident) => {
        impl From<$from> for Error {
            #[track_caller]
            fn from(value: $from) -> Self {
                Self::$to {
                    message: value.to_string(),
                    location: std::panic::Location::caller().to_snafu_location(),
                }
            }
        }
    };
}

make_error_from!(std::io::Error, Io);
make_error_from!(std::fmt::Error, Fmt);
make_error_from!(arrow::error::ArrowError, Arrow);
make_error_from!(parquet::errors::ParquetError, Parquet);
make_error_from!(tokio::task::JoinError, Execution);
