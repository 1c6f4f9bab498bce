use std::io::ErrorKind as StdIoErrorKind;

use serde::{Serialize, Deserialize};
use strum::{AsRefStr as StrumAsRefStr};
use vfs_lib::path::PathError;
use vfs_lib::token::TokenError;

use super::base::Er;

#[derive(
    Debug, Clone, PartialEq, Eq,
    StrumAsRefStr,
    Serialize, Deserialize
)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    CantDeleteSharedItem,
    CannotCopyOrMoveItemToItself,
    QuotaExceeded,
    OverQuota,
    InvalidInput,
    BadToken,
    PermissionDenied,
    MaxSize,
    Vetoed,
    InternalFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self.as_ref(), f)
    }
}

pub type OpError = Er<ErrorKind>;

pub type OpResult<T> = std::result::Result<T, OpError>;

impl Er<ErrorKind> {
    pub fn kind(&self) -> &ErrorKind {
        &self.inner
    }
}

impl From<StdIoErrorKind> for ErrorKind {
    fn from(kind: StdIoErrorKind) -> Self {
        match kind {
            StdIoErrorKind::NotFound => ErrorKind::NotFound,
            StdIoErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
            StdIoErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::InternalFailure,
        }
    }
}

impl From<std::io::Error> for OpError {
    fn from(err: std::io::Error) -> Self {
        Er::new(ErrorKind::from(err.kind()))
            .source(err)
    }
}

impl From<PathError> for OpError {
    fn from(err: PathError) -> Self {
        Er::new(ErrorKind::InvalidInput)
            .source(err)
    }
}

impl From<TokenError> for OpError {
    fn from(err: TokenError) -> Self {
        Er::new(ErrorKind::BadToken)
            .source(err)
    }
}

impl From<tokio::task::JoinError> for OpError {
    fn from(err: tokio::task::JoinError) -> Self {
        Er::new(ErrorKind::InternalFailure)
            .context("blocking task failed")
            .source(err)
    }
}

impl From<walkdir::Error> for OpError {
    fn from(err: walkdir::Error) -> Self {
        let kind = err.io_error()
            .map(|io| ErrorKind::from(io.kind()))
            .unwrap_or(ErrorKind::InternalFailure);

        Er::new(kind)
            .context("directory walk failed")
            .source(err)
    }
}

/// attaches an [`ErrorKind`] to a failed `Result` or an empty `Option`
pub trait Kind<T> {
    fn kind(self, kind: ErrorKind) -> OpResult<T>;
}

impl<T> Kind<T> for Option<T> {
    fn kind(self, kind: ErrorKind) -> OpResult<T> {
        match self {
            Some(v) => Ok(v),
            None => Err(Er::new(kind)),
        }
    }
}

impl<T, E> Kind<T> for Result<T, E>
where
    E: Into<super::BoxDynError>
{
    fn kind(self, kind: ErrorKind) -> OpResult<T> {
        match self {
            Ok(v) => Ok(v),
            Err(err) => Err(Er::new(kind).source(err)),
        }
    }
}
