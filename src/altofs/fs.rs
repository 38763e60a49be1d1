//! The filesystem object: page store, error type and the public facade
//! for whole-file operations.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use super::disk::{Geometry, Page, SerialNumber, PAGE_DATA_SIZE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsError {
  /// Bad argument at a public entry point (geometry, path syntax, range).
  Invalid(String),
  /// Host file failure while loading, saving, extracting or replacing.
  Io(String),
  /// On-disk format violation.
  Format(String),
  /// Pathname resolution or scavenge miss.
  NotFound(String),
  /// No free page left for an extending write.
  DiskFull(String),
  /// The cursor latched an error in a previous operation.
  Cursor(String),
}

impl fmt::Display for FsError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FsError::Invalid(message) => write!(f, "invalid argument: {message}"),
      FsError::Io(message) => write!(f, "i/o error: {message}"),
      FsError::Format(message) => write!(f, "format violation: {message}"),
      FsError::NotFound(message) => write!(f, "not found: {message}"),
      FsError::DiskFull(message) => write!(f, "disk full: {message}"),
      FsError::Cursor(message) => write!(f, "cursor invalidated: {message}"),
    }
  }
}

impl std::error::Error for FsError {}

impl From<std::io::Error> for FsError {
  fn from(err: std::io::Error) -> Self {
    FsError::Io(err.to_string())
  }
}

/// Identity handle of a file: serial number, version and the virtual
/// address of its leader page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileEntry {
  pub sn: SerialNumber,
  pub version: u16,
  pub leader_vda: u16,
}

/// An Alto filesystem held fully in memory. The dense page array is
/// indexed by VDA and owns every page for the lifetime of the object;
/// labels reference each other by RDA only, never by pointer.
pub struct AltoFilesystem {
  pub dg: Geometry,
  pub pages: Vec<Page>,
}

impl AltoFilesystem {
  /// Creates an empty (all pages zeroed) filesystem for the geometry.
  pub fn new(dg: Geometry) -> Result<Self, FsError> {
    dg.validate()?;

    let pages = (0..dg.length()).map(Page::new).collect();
    Ok(Self { dg, pages })
  }

  /// Total number of pages.
  pub fn length(&self) -> u16 {
    self.dg.length()
  }

  pub fn page(&self, vda: u16) -> Result<&Page, FsError> {
    self
      .pages
      .get(vda as usize)
      .ok_or_else(|| FsError::Invalid(format!("page {vda} out of range")))
  }

  pub fn page_mut(&mut self, vda: u16) -> Result<&mut Page, FsError> {
    self
      .pages
      .get_mut(vda as usize)
      .ok_or_else(|| FsError::Invalid(format!("page {vda} out of range")))
  }

  /// Builds the file entry for the leader at `leader_vda`.
  pub fn file_entry(&self, leader_vda: u16) -> Result<FileEntry, FsError> {
    let page = self.page(leader_vda)?;

    Ok(FileEntry {
      sn: page.label.sn,
      version: page.label.version,
      leader_vda,
    })
  }

  /// Meters the file length by walking the chain without copying bytes.
  pub fn file_length(&self, fe: &FileEntry) -> Result<usize, FsError> {
    let mut of = self.open(fe, false)?;

    let mut length = 0;
    loop {
      let nbytes = self.read(&mut of, None, PAGE_DATA_SIZE);
      length += nbytes;
      if nbytes != PAGE_DATA_SIZE {
        break;
      }
    }

    match of.error {
      Some(err) => Err(err),
      None => Ok(length),
    }
  }

  /// Copies the file's data pages to a host file. Returns the number of
  /// bytes written.
  pub fn extract_file(&self, fe: &FileEntry, output: &Path) -> Result<usize, FsError> {
    let mut of = self.open(fe, false)?;
    let mut fp = BufWriter::new(File::create(output)?);

    let mut buffer = [0u8; PAGE_DATA_SIZE];
    let mut total = 0;
    loop {
      let nbytes = self.read(&mut of, Some(&mut buffer), PAGE_DATA_SIZE);
      if nbytes > 0 {
        fp.write_all(&buffer[..nbytes])?;
        total += nbytes;
      }
      if nbytes < PAGE_DATA_SIZE {
        break;
      }
    }

    if let Some(err) = of.error {
      return Err(err);
    }
    fp.flush()?;
    Ok(total)
  }

  /// Replaces the file's contents with the bytes of a host file,
  /// extending or trimming the chain as needed.
  pub fn replace_file(&mut self, fe: &FileEntry, input: &Path) -> Result<usize, FsError> {
    let mut of = self.open(fe, false)?;
    let mut fp = File::open(input)?;

    let mut buffer = [0u8; PAGE_DATA_SIZE];
    let mut total = 0;
    loop {
      let nbytes = fp.read(&mut buffer)?;
      if nbytes == 0 {
        break;
      }

      let written = self.write(&mut of, &buffer[..nbytes], true);
      total += written;
      if written != nbytes {
        return Err(
          of.error
            .clone()
            .unwrap_or_else(|| FsError::DiskFull(format!("replace fell short after {total} bytes"))),
        );
      }
    }

    self.trim(&mut of)?;
    Ok(total)
  }
}


// vim:ts=2 sw=2
