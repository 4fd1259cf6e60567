use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};

use clap::{builder::PathBufValueParser, error::ErrorKind};

/// Path that existed at parse time, stored as an absolute path so it stays
/// valid once the pipeline works inside its output directory.
#[derive(Clone, Debug)]
pub struct ValidPathBuf(pub PathBuf);

impl ValidPathBuf {
    pub fn into_inner(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for ValidPathBuf {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl AsRef<OsStr> for ValidPathBuf {
    fn as_ref(&self) -> &OsStr {
        self.0.as_ref()
    }
}

impl clap::builder::ValueParserFactory for ValidPathBuf {
    type Parser = ValidPathBufParser;
    fn value_parser() -> Self::Parser {
        ValidPathBufParser
    }
}

#[derive(Clone)]
pub struct ValidPathBufParser;

impl clap::builder::TypedValueParser for ValidPathBufParser {
    type Value = ValidPathBuf;

    fn parse_ref(
        &self,
        cmd: &clap::Command,
        arg: Option<&clap::Arg>,
        value: &OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let val = PathBufValueParser::new().parse_ref(cmd, arg, value)?;
        match fs::canonicalize(&val) {
            Ok(abs) => Ok(ValidPathBuf(abs)),
            Err(_) => Err(clap::Error::raw(
                ErrorKind::ValueValidation,
                format!("Path {value:?} does not exist\n"),
            )
            .with_cmd(cmd)),
        }
    }
}
