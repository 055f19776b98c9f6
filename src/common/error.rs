use thiserror::Error;
use tracing::error;
use warp::http::StatusCode;

/// geoimage-api error
#[must_use]
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    StdIo(#[from] std::io::Error),
    #[error(transparent)]
    StdAddrParse(#[from] std::net::AddrParseError),
    #[error(transparent)]
    SeaOrm(#[from] sea_orm::DbErr),
    #[error(transparent)]
    Semver(#[from] semver::Error),
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
    #[error(transparent)]
    Warp(#[from] warp::Error),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
}

impl Error {
    /// Status the error maps to at the HTTP boundary
    ///
    /// A missing record answers `400`, not `404`, per the upload api contract
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::NotFound(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl warp::reject::Reject for Error {}

/// Source code location
#[must_use]
pub struct Location {
    pub file: &'static str,
    pub function_name: &'static str,
    pub line: u32,
    pub column: u32,
}

/// Attach a source location to a failure, logging it before propagation
pub trait ErrorLocation<T> {
    fn location(self, location: Location) -> Result<T, Error>;
}

impl<T, E> ErrorLocation<T> for Result<T, E>
where
    E: Into<Error>,
{
    fn location(self, location: Location) -> Result<T, Error> {
        self.map_err(|err| {
            let err = err.into();
            error!(
                "`{err}` in `{}`, at `{}:{}:{}`",
                location.function_name, location.file, location.line, location.column
            );

            err
        })
    }
}

#[macro_export]
macro_rules! here {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        let name = type_name_of(f);

        $crate::Location {
            file: file!(),
            function_name: &name[..name.len() - 3],
            line: line!(),
            column: column!(),
        }
    }};
}
