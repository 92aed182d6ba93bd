use std::io::{self, Write};

use serde::Serialize;

use crate::app::{CountsResult, PackageResult};
use crate::domain::ObjectReference;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_counts(result: &CountsResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_package(result: &PackageResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_reference(reference: &ObjectReference) -> io::Result<()> {
        Self::print_json(reference)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
