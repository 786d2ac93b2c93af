use std::fmt::{self, Display, Formatter};
use std::result;

#[derive(Debug, PartialEq)]
pub enum Error {
    UnknownAlgorithm(String),
    BadQop(String),
    MissingRequired(&'static str, String),
    InvalidHeaderSyntax(String),
    /// The `nc` directive was not a base-16 number; a protocol error,
    /// deliberately distinct from the security verdicts.
    InvalidNonceCount(String),
    /// Configuration rejected at construction time.
    EmptyDomains,
    EmptyQops,
    /// The credential back-end failed; not the same as "user unknown".
    Resolver(String),
}

pub type Result<T> = result::Result<T, Error>;

use Error::*;

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            UnknownAlgorithm(ctx) => write!(f, "Unknown algorithm: {}", ctx),
            BadQop(ctx) => write!(f, "Bad Qop option: {}", ctx),
            MissingRequired(what, ctx) => write!(f, "Missing \"{}\" in header: {}", what, ctx),
            InvalidHeaderSyntax(ctx) => write!(f, "Invalid header syntax: {}", ctx),
            InvalidNonceCount(ctx) => write!(f, "Invalid nonce count: {}", ctx),
            EmptyDomains => write!(f, "Domain list must not be empty."),
            EmptyQops => write!(f, "Qop list must not be empty."),
            Resolver(ctx) => write!(f, "Credential resolution failed: {}", ctx),
        }
    }
}

impl std::error::Error for Error {}
