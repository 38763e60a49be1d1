//! Decoding of the leader page, the metadata page every file starts with.
//!
//! The leader's data area is laid out at fixed offsets: three timestamps,
//! the filename, an opaque property block, a handful of single-byte
//! fields, and two hints (the containing directory and the last page of
//! the file). Words inside page data decode big-endian; the byte-pair
//! swap of the image codec already put them in that order in memory.

use super::disk::{SerialNumber, FILENAME_LENGTH};
use super::file::Position;
use super::fs::{AltoFilesystem, FileEntry, FsError};

pub const LEADER_CREATED: usize = 0;
pub const LEADER_WRITTEN: usize = 4;
pub const LEADER_READ: usize = 8;
pub const LEADER_FILENAME: usize = 12;
pub const LEADER_PROPS: usize = 52;
pub const LEADER_SPARE: usize = 472;
pub const LEADER_PROPBEGIN: usize = 492;
pub const LEADER_PROPLENGTH: usize = 493;
pub const LEADER_CONSECUTIVE: usize = 494;
pub const LEADER_CHANGE_SN: usize = 495;
pub const LEADER_DIR_FP_HINT: usize = 496;
pub const LEADER_LAST_PAGE_HINT: usize = 506;

/// Seconds between the Alto time base and the Unix epoch.
pub const ALTO_EPOCH_OFFSET: i64 = 2117503696;

/// File metadata as recorded on the leader page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
  pub filename: String,
  pub created: i64,
  pub written: i64,
  pub read: i64,
  pub props: Vec<u8>,
  pub spare: Vec<u8>,
  pub propbegin: u8,
  pub proplength: u8,
  pub consecutive: u8,
  pub change_sn: u8,
  /// Back-pointer to the directory the file was entered in.
  pub dir_fp_hint: FileEntry,
  /// Where the file ended the last time it was written.
  pub last_page_hint: Position,
}

/// Reads one big-endian word out of page data.
pub fn read_word_be(data: &[u8], offset: usize) -> u16 {
  ((data[offset] as u16) << 8) | data[offset + 1] as u16
}

/// Decodes a 32-bit Alto timestamp (two big-endian words, high first)
/// into Unix seconds.
pub fn read_alto_time(data: &[u8], offset: usize) -> i64 {
  let raw = ((read_word_be(data, offset) as u32) << 16) | read_word_be(data, offset + 2) as u32;
  raw as i32 as i64 + ALTO_EPOCH_OFFSET
}

/// Decodes a length-prefixed filename. The stored length counts a
/// trailing terminator character, which is dropped.
pub fn decode_name(data: &[u8], offset: usize) -> String {
  let mut slen = data[offset] as usize;
  if slen >= FILENAME_LENGTH {
    slen = FILENAME_LENGTH - 1;
  }
  if slen == 0 {
    return String::new();
  }
  String::from_utf8_lossy(&data[offset + 1..offset + slen]).into_owned()
}

impl AltoFilesystem {
  /// Decodes the metadata on a file's leader page.
  pub fn file_info(&self, fe: &FileEntry) -> Result<FileInfo, FsError> {
    let page = self.page(fe.leader_vda)?;
    let data = &page.data;

    let hint = LEADER_DIR_FP_HINT;
    let dir_fp_hint = FileEntry {
      sn: SerialNumber {
        word1: read_word_be(data, hint),
        word2: read_word_be(data, hint + 2),
      },
      version: read_word_be(data, hint + 4),
      // One blank word sits between the version and the leader address.
      leader_vda: read_word_be(data, hint + 8),
    };

    let hint = LEADER_LAST_PAGE_HINT;
    let last_page_hint = Position {
      vda: read_word_be(data, hint),
      pgnum: read_word_be(data, hint + 2),
      pos: read_word_be(data, hint + 4),
    };

    Ok(FileInfo {
      filename: decode_name(data, LEADER_FILENAME),
      created: read_alto_time(data, LEADER_CREATED),
      written: read_alto_time(data, LEADER_WRITTEN),
      read: read_alto_time(data, LEADER_READ),
      props: data[LEADER_PROPS..LEADER_SPARE].to_vec(),
      spare: data[LEADER_SPARE..LEADER_PROPBEGIN].to_vec(),
      propbegin: data[LEADER_PROPBEGIN],
      proplength: data[LEADER_PROPLENGTH],
      consecutive: data[LEADER_CONSECUTIVE],
      change_sn: data[LEADER_CHANGE_SN],
      dir_fp_hint,
      last_page_hint,
    })
  }
}


// vim:ts=2 sw=2
