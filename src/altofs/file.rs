//! Open-file cursors and chain I/O.
//!
//! A cursor is a position within a file's page chain. Reads and writes
//! return short counts at the end of the chain instead of failing; a
//! consistency violation latches a sticky error on the cursor, which then
//! refuses further I/O until the file is reopened.

use super::disk::{real_to_virtual, virtual_to_real, Label, PAGE_DATA_SIZE, VERSION_FREE};
use super::fs::{AltoFilesystem, FileEntry, FsError};

/// A position inside a file: current page, page index within the file,
/// and the offset into that page's data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
  pub vda: u16,
  pub pgnum: u16,
  pub pos: u16,
}

#[derive(Debug, Clone)]
pub struct OpenFile {
  pub fe: FileEntry,
  pub pos: Position,
  pub error: Option<FsError>,
}

impl OpenFile {
  fn fail(&mut self, err: FsError) {
    if self.error.is_none() {
      self.error = Some(err);
    }
  }
}

impl AltoFilesystem {
  /// Opens a file for chain I/O. The normal open positions the cursor at
  /// the first data page; `include_leader` starts at the leader itself so
  /// its metadata page can be streamed too.
  pub fn open(&self, fe: &FileEntry, include_leader: bool) -> Result<OpenFile, FsError> {
    if fe.leader_vda >= self.length() {
      return Err(FsError::Invalid(format!(
        "leader page {} out of range",
        fe.leader_vda
      )));
    }

    let pos = if include_leader {
      Position {
        vda: fe.leader_vda,
        pgnum: 0,
        pos: 0,
      }
    } else {
      let next_rda = self.pages[fe.leader_vda as usize].label.next_rda;
      let vda = real_to_virtual(&self.dg, next_rda).map_err(|_| {
        FsError::Format(format!(
          "leader page {}: unmappable first data link {next_rda:#06x}",
          fe.leader_vda
        ))
      })?;
      Position { vda, pgnum: 1, pos: 0 }
    };

    Ok(OpenFile {
      fe: *fe,
      pos,
      error: None,
    })
  }

  /// Reads up to `len` bytes at the cursor, advancing through the chain.
  /// Returns the number of bytes actually read; a short count means the
  /// chain ended. With `dst` absent the bytes are only counted, which is
  /// how file lengths are metered.
  pub fn read(&self, of: &mut OpenFile, mut dst: Option<&mut [u8]>, mut len: usize) -> usize {
    if of.error.is_some() {
      return 0;
    }
    if let Some(dst) = dst.as_deref() {
      len = len.min(dst.len());
    }

    let mut total = 0;
    while len > 0 {
      let vda = of.pos.vda;
      if vda == 0 {
        of.pos.pgnum = 0;
        break;
      }
      if vda >= self.length() {
        of.fail(FsError::Format(format!("cursor page {vda} out of range")));
        break;
      }

      let page = &self.pages[vda as usize];
      if page.label.file_pgnum != of.pos.pgnum {
        of.fail(FsError::Format(format!(
          "page {vda} carries file page {} where {} was expected",
          page.label.file_pgnum, of.pos.pgnum
        )));
        break;
      }

      let pos = of.pos.pos as usize;
      let nbytes = page.label.nbytes as usize;
      if pos < nbytes {
        let count = (nbytes - pos).min(len);
        if let Some(dst) = dst.as_deref_mut() {
          dst[total..total + count].copy_from_slice(&page.data[pos..pos + count]);
        }
        of.pos.pos += count as u16;
        total += count;
        len -= count;
      } else if pos > nbytes {
        of.fail(FsError::Format(format!(
          "cursor offset {pos} beyond the {nbytes} used bytes of page {vda}"
        )));
        break;
      } else {
        if !self.advance(of) {
          break;
        }
      }
    }

    total
  }

  /// Writes `src` at the cursor, mirroring `read`. Writing may raise the
  /// current page's used-byte count up to the page size; with `extend`
  /// the chain grows by freshly allocated pages once it runs out. Returns
  /// the number of bytes written; a short count means the chain ended (or
  /// the disk filled up, which latches the error).
  pub fn write(&mut self, of: &mut OpenFile, src: &[u8], extend: bool) -> usize {
    if of.error.is_some() {
      return 0;
    }

    let mut total = 0;
    let mut len = src.len();
    while len > 0 {
      let vda = of.pos.vda;
      if vda == 0 {
        // The chain terminates here. With `extend` the file grows at its
        // tail, which is the leader itself when the file is empty; the
        // cursor resumes at the tail's end and the normal loop takes it
        // from there (filling a partial tail page before allocating).
        if extend && of.fe.leader_vda != 0 {
          match self.chain_tail(of.fe.leader_vda) {
            Ok(tail) => {
              let label = self.pages[tail as usize].label;
              of.pos.vda = tail;
              of.pos.pgnum = label.file_pgnum;
              of.pos.pos = label.nbytes;
              continue;
            }
            Err(err) => {
              of.fail(err);
              break;
            }
          }
        }
        of.pos.pgnum = 0;
        break;
      }
      if vda >= self.length() {
        of.fail(FsError::Format(format!("cursor page {vda} out of range")));
        break;
      }

      let label = self.pages[vda as usize].label;
      if label.file_pgnum != of.pos.pgnum {
        of.fail(FsError::Format(format!(
          "page {vda} carries file page {} where {} was expected",
          label.file_pgnum, of.pos.pgnum
        )));
        break;
      }

      let pos = of.pos.pos as usize;
      let nbytes = label.nbytes as usize;
      if pos > nbytes {
        of.fail(FsError::Format(format!(
          "cursor offset {pos} beyond the {nbytes} used bytes of page {vda}"
        )));
        break;
      }

      if pos < PAGE_DATA_SIZE {
        let count = (PAGE_DATA_SIZE - pos).min(len);
        let page = &mut self.pages[vda as usize];
        page.data[pos..pos + count].copy_from_slice(&src[total..total + count]);
        if pos + count > nbytes {
          page.label.nbytes = (pos + count) as u16;
        }
        of.pos.pos += count as u16;
        total += count;
        len -= count;
      } else {
        let next_rda = self.pages[vda as usize].label.next_rda;
        if next_rda == 0 && extend {
          match self.extend_chain(vda) {
            Ok(new_vda) => {
              of.pos.vda = new_vda;
              of.pos.pgnum += 1;
              of.pos.pos = 0;
            }
            Err(err) => {
              of.fail(err);
              break;
            }
          }
        } else if !self.advance(of) {
          break;
        }
      }
    }

    total
  }

  /// Truncates the file at the cursor. The current page keeps the bytes
  /// before the cursor; everything past it is unlinked and the remainder
  /// of the chain is marked free.
  pub fn trim(&mut self, of: &mut OpenFile) -> Result<(), FsError> {
    if let Some(err) = &of.error {
      return Err(FsError::Cursor(err.to_string()));
    }

    let vda = of.pos.vda;
    if vda == 0 {
      // Already past the end of the chain, nothing to cut.
      return Ok(());
    }
    if vda >= self.length() {
      return Err(FsError::Invalid(format!("cursor page {vda} out of range")));
    }

    let page = &mut self.pages[vda as usize];
    page.label.nbytes = of.pos.pos;
    let mut next_rda = page.label.next_rda;
    page.label.next_rda = 0;

    while next_rda != 0 {
      let next_vda = real_to_virtual(&self.dg, next_rda)
        .map_err(|_| FsError::Format(format!("unmappable link {next_rda:#06x} while trimming")))?;
      if next_vda == 0 {
        break;
      }

      let page = &mut self.pages[next_vda as usize];
      next_rda = page.label.next_rda;
      page.label = Label {
        version: VERSION_FREE,
        ..Label::default()
      };
    }

    Ok(())
  }

  /// Linear scan for a free page. VDA 0 is skipped: its address doubles
  /// as the chain terminator, so it can never join a file.
  pub fn allocate_page(&self) -> Option<u16> {
    (1..self.length()).find(|&vda| self.pages[vda as usize].label.is_free())
  }

  /// Advances the cursor to the successor of the current page. Returns
  /// false when the walk must stop (end of chain or latched error).
  fn advance(&self, of: &mut OpenFile) -> bool {
    let vda = of.pos.vda;
    let next_rda = self.pages[vda as usize].label.next_rda;
    match real_to_virtual(&self.dg, next_rda) {
      Ok(0) => {
        of.pos.vda = 0;
        of.pos.pgnum = 0;
        of.pos.pos = 0;
        false
      }
      Ok(next_vda) => {
        of.pos.vda = next_vda;
        of.pos.pgnum += 1;
        of.pos.pos = 0;
        true
      }
      Err(_) => {
        of.fail(FsError::Format(format!(
          "unmappable next link {next_rda:#06x} at page {vda}"
        )));
        false
      }
    }
  }

  /// Walks a file's chain from the leader to its last page.
  fn chain_tail(&self, leader_vda: u16) -> Result<u16, FsError> {
    let mut vda = leader_vda;
    let mut steps = 0usize;
    loop {
      let next_rda = self.page(vda)?.label.next_rda;
      let next_vda = real_to_virtual(&self.dg, next_rda).map_err(|_| {
        FsError::Format(format!("unmappable next link {next_rda:#06x} at page {vda}"))
      })?;
      if next_vda == 0 {
        return Ok(vda);
      }

      vda = next_vda;
      steps += 1;
      if steps > self.pages.len() {
        return Err(FsError::Format(format!(
          "cyclic chain behind leader page {leader_vda}"
        )));
      }
    }
  }

  /// Allocates a free page and links it behind `prev_vda`, inheriting the
  /// file identity from its predecessor.
  fn extend_chain(&mut self, prev_vda: u16) -> Result<u16, FsError> {
    let new_vda = self
      .allocate_page()
      .ok_or_else(|| FsError::DiskFull(String::from("no free page left")))?;

    let prev_rda = virtual_to_real(&self.dg, prev_vda)?;
    let new_rda = virtual_to_real(&self.dg, new_vda)?;

    let prev_label = {
      let prev = self.page_mut(prev_vda)?;
      prev.label.next_rda = new_rda;
      prev.label
    };

    let page = &mut self.pages[new_vda as usize];
    page.header = [0, new_rda];
    page.label = Label {
      next_rda: 0,
      prev_rda,
      unused: 0,
      nbytes: 0,
      file_pgnum: prev_label.file_pgnum + 1,
      version: prev_label.version,
      sn: prev_label.sn,
    };
    page.data.fill(0);

    Ok(new_vda)
  }
}


// vim:ts=2 sw=2
