//! CSV archiving of flat records into the session's archive directory.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use csv::WriterBuilder;
pub use csv::Writer;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
pub struct Archiver<W: Write = File> {
    writer: Writer<W>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver<File> {
    /// Create a new archiver from a paricular path relative to the session's
    /// archive root.
    ///
    /// Any missing parent directories are created.
    pub fn from_path<P: AsRef<Path>>(
        session: &Session,
        path: P,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session_path = session.arch_root.join(path);

        if let Some(parent) = session_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Create the file, truncating any existing archive, then open in
        // append mode
        File::create(&session_path)?;
        let file = OpenOptions::new().append(true).open(session_path)?;

        Ok(Self::from_writer(file))
    }
}

impl<W: Write> Archiver<W> {
    /// Create an archiver on top of any writer.
    pub fn from_writer(w: W) -> Self {
        Self {
            writer: WriterBuilder::new().has_headers(true).from_writer(w),
        }
    }

    /// Serialise a record into the archive.
    ///
    /// Records must be flat structs, csv cannot write nested fields.
    pub fn serialise<T: Serialize>(&mut self, record: T) -> Result<(), Box<dyn std::error::Error>> {
        self.writer.serialize(record)?;
        self.writer.flush()?;

        Ok(())
    }

    /// Consume the archiver, returning the underlying writer.
    pub fn into_inner(self) -> Result<W, Box<dyn std::error::Error>> {
        self.writer
            .into_inner()
            .map_err(|e| Box::new(e.into_error()) as Box<dyn std::error::Error>)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        x_cm: f64,
        heading_rad: f64,
    }

    #[test]
    fn test_serialise_to_buffer() {
        let mut arch = Archiver::from_writer(Vec::new());

        arch.serialise(Row {
            x_cm: 1.5,
            heading_rad: 0.25,
        })
        .unwrap();
        arch.serialise(Row {
            x_cm: 2.0,
            heading_rad: 0.5,
        })
        .unwrap();

        let out = String::from_utf8(arch.into_inner().unwrap()).unwrap();

        assert_eq!(out, "x_cm,heading_rad\n1.5,0.25\n2.0,0.5\n");
    }
}
