//! Synthetic filesystems for the test suite.
//!
//! `populated_fs` builds a small image with a root directory, a nested
//! directory, a multi-page file, a zero-byte file and a bad-sector
//! marker, all with consistent chains so the integrity checker accepts
//! it. The encoding helpers are also used directly by tests that need
//! odd directory contents.

use super::disk::{
  virtual_to_real, Geometry, Label, SerialNumber, PAGE_DATA_SIZE, SN_DIRECTORY, VERSION_BAD,
  VERSION_FREE,
};
use super::fs::{AltoFilesystem, FileEntry};
use super::leader::{
  LEADER_CREATED, LEADER_DIR_FP_HINT, LEADER_FILENAME, LEADER_LAST_PAGE_HINT, LEADER_READ,
  LEADER_WRITTEN,
};

pub const SMALL_GEOMETRY: Geometry = Geometry {
  num_cylinders: 6,
  num_heads: 2,
  num_sectors: 6,
};

pub const ROOT_LEADER_VDA: u16 = 1;
pub const DOCS_LEADER_VDA: u16 = 3;
pub const MEMO_LEADER_VDA: u16 = 5;
pub const EMPTY_LEADER_VDA: u16 = 11;
pub const EMPTY2_LEADER_VDA: u16 = 12;
pub const BAD_PAGE_VDA: u16 = 14;

pub const MEMO_CONTENT_LEN: usize = 2050;

/// Raw Alto words 0x1234/0x5678 decode to this Unix time.
pub const MEMO_CREATED_UNIX: i64 = 2422923592;
pub const MEMO_WRITTEN_UNIX: i64 = 2422923593;
/// Raw 0xFFFFFFFF reads as -1 once reinterpreted as signed.
pub const MEMO_READ_UNIX: i64 = 2117503695;

const ROOT_SN: SerialNumber = SerialNumber { word1: SN_DIRECTORY, word2: 100 };
const DOCS_SN: SerialNumber = SerialNumber { word1: SN_DIRECTORY, word2: 200 };
const MEMO_SN: SerialNumber = SerialNumber { word1: 0, word2: 300 };
const EMPTY_SN: SerialNumber = SerialNumber { word1: 0, word2: 400 };
const EMPTY2_SN: SerialNumber = SerialNumber { word1: 0, word2: 500 };

pub fn memo_content() -> Vec<u8> {
  (0..MEMO_CONTENT_LEN).map(|i| (i * 7 % 251) as u8).collect()
}

pub fn memo_data_vdas() -> Vec<u16> {
  (6..=10).collect()
}

/// Stamps every page with a correct header and a free label, the state
/// the integrity checker expects of an unused disk.
pub fn format_headers(fs: &mut AltoFilesystem) {
  for vda in 0..fs.length() {
    let rda = virtual_to_real(&fs.dg, vda).unwrap();
    let page = &mut fs.pages[vda as usize];
    page.header = [0, rda];
    page.label = Label {
      version: VERSION_FREE,
      ..Label::default()
    };
  }
}

pub fn write_word_be(data: &mut [u8], offset: usize, word: u16) {
  data[offset] = (word >> 8) as u8;
  data[offset + 1] = word as u8;
}

fn write_alto_time(data: &mut [u8], offset: usize, raw: u32) {
  write_word_be(data, offset, (raw >> 16) as u16);
  write_word_be(data, offset + 2, raw as u16);
}

/// Encodes a length-prefixed name with its trailing terminator char.
fn encode_name(data: &mut [u8], offset: usize, name: &str) {
  assert!(name.len() <= 38, "sample names must fit the 39-byte field");
  data[offset] = (name.len() + 1) as u8;
  data[offset + 1..offset + 1 + name.len()].copy_from_slice(name.as_bytes());
  data[offset + 1 + name.len()] = b'.';
}

/// Encodes one directory entry padded (or sized) to `total_words`.
pub fn encode_dir_entry_padded(
  sn: SerialNumber,
  version: u16,
  leader_vda: u16,
  name: &str,
  valid: bool,
  total_words: usize,
) -> Vec<u8> {
  let mut buffer = vec![0u8; total_words * 2];
  let word0 = ((valid as u16) << 10) | total_words as u16;
  write_word_be(&mut buffer, 0, word0);
  write_word_be(&mut buffer, 2, sn.word1);
  write_word_be(&mut buffer, 4, sn.word2);
  write_word_be(&mut buffer, 6, version);
  write_word_be(&mut buffer, 8, 0);
  write_word_be(&mut buffer, 10, leader_vda);
  encode_name(&mut buffer, 12, name);
  buffer
}

/// Encodes one directory entry at its natural length.
pub fn encode_dir_entry(
  sn: SerialNumber,
  version: u16,
  leader_vda: u16,
  name: &str,
  valid: bool,
) -> Vec<u8> {
  let bytes = 12 + 1 + name.len() + 1;
  let total_words = (bytes + 1) / 2;
  encode_dir_entry_padded(sn, version, leader_vda, name, valid, total_words)
}

/// Overwrites the data and used-byte count of one page.
pub fn set_file_data(fs: &mut AltoFilesystem, vda: u16, contents: &[u8]) {
  assert!(contents.len() <= PAGE_DATA_SIZE);
  let page = &mut fs.pages[vda as usize];
  page.data = [0; PAGE_DATA_SIZE];
  page.data[..contents.len()].copy_from_slice(contents);
  page.label.nbytes = contents.len() as u16;
}

struct FileSpec<'a> {
  leader_vda: u16,
  data_vdas: &'a [u16],
  sn: SerialNumber,
  name: &'a str,
  content: &'a [u8],
  times: [u32; 3],
  dir_hint: Option<FileEntry>,
}

fn build_file(fs: &mut AltoFilesystem, spec: FileSpec<'_>) {
  let FileSpec {
    leader_vda,
    data_vdas,
    sn,
    name,
    content,
    times,
    dir_hint,
  } = spec;

  let rda_of = |fs: &AltoFilesystem, vda: u16| virtual_to_real(&fs.dg, vda).unwrap();

  // Leader label and data.
  let first_data_rda = data_vdas.first().map(|&vda| rda_of(fs, vda)).unwrap_or(0);
  let leader = &mut fs.pages[leader_vda as usize];
  leader.label = Label {
    next_rda: first_data_rda,
    prev_rda: 0,
    unused: 0,
    nbytes: PAGE_DATA_SIZE as u16,
    file_pgnum: 0,
    version: 1,
    sn,
  };
  leader.data = [0; PAGE_DATA_SIZE];
  write_alto_time(&mut leader.data, LEADER_CREATED, times[0]);
  write_alto_time(&mut leader.data, LEADER_WRITTEN, times[1]);
  write_alto_time(&mut leader.data, LEADER_READ, times[2]);
  encode_name(&mut leader.data, LEADER_FILENAME, name);

  if let Some(hint) = dir_hint {
    let at = LEADER_DIR_FP_HINT;
    write_word_be(&mut leader.data, at, hint.sn.word1);
    write_word_be(&mut leader.data, at + 2, hint.sn.word2);
    write_word_be(&mut leader.data, at + 4, hint.version);
    write_word_be(&mut leader.data, at + 8, hint.leader_vda);
  }

  if let Some(&last_vda) = data_vdas.last() {
    let last_nbytes = content.len() - PAGE_DATA_SIZE * (data_vdas.len() - 1);
    let at = LEADER_LAST_PAGE_HINT;
    write_word_be(&mut leader.data, at, last_vda);
    write_word_be(&mut leader.data, at + 2, data_vdas.len() as u16);
    write_word_be(&mut leader.data, at + 4, last_nbytes as u16);
  }

  // Data pages, chained behind the leader.
  assert_eq!(
    data_vdas.len(),
    content.chunks(PAGE_DATA_SIZE).count(),
    "data pages must match the content size"
  );
  let mut prev_vda = leader_vda;
  for (index, (&vda, chunk)) in data_vdas.iter().zip(content.chunks(PAGE_DATA_SIZE)).enumerate() {
    let prev_rda = rda_of(fs, prev_vda);
    let next_rda = data_vdas.get(index + 1).map(|&next| rda_of(fs, next)).unwrap_or(0);
    let page = &mut fs.pages[vda as usize];
    page.label = Label {
      next_rda,
      prev_rda,
      unused: 0,
      nbytes: chunk.len() as u16,
      file_pgnum: (index + 1) as u16,
      version: 1,
      sn,
    };
    page.data = [0; PAGE_DATA_SIZE];
    page.data[..chunk.len()].copy_from_slice(chunk);
    prev_vda = vda;
  }
}

fn file_entry(sn: SerialNumber, leader_vda: u16) -> FileEntry {
  FileEntry {
    sn,
    version: 1,
    leader_vda,
  }
}

fn root_dir_data() -> Vec<u8> {
  let mut data = encode_dir_entry(ROOT_SN, 1, ROOT_LEADER_VDA, "SysDir", true);
  data.extend(encode_dir_entry(DOCS_SN, 1, DOCS_LEADER_VDA, "Docs", true));
  // A deleted file leaves an invalid entry behind.
  data.extend(encode_dir_entry(SerialNumber { word1: 0, word2: 999 }, 1, 0, "Old.mem", false));
  data.extend(encode_dir_entry(EMPTY_SN, 1, EMPTY_LEADER_VDA, "Empty", true));
  data
}

fn docs_dir_data() -> Vec<u8> {
  let mut data = encode_dir_entry(MEMO_SN, 1, MEMO_LEADER_VDA, "Memo.txt", true);
  data.extend(encode_dir_entry(EMPTY2_SN, 1, EMPTY2_LEADER_VDA, "Empty2", true));
  data
}

/// A checker-clean image holding:
///
/// ```text
/// <SysDir>            directory, VDA 1-2, lists itself, Docs, Empty
///   Docs              directory, VDA 3-4
///     Memo.txt        2050 bytes over five pages, VDA 5-10
///     Empty2          3 bytes, VDA 12-13
///   Empty             zero bytes, VDA 11
/// (bad-sector marker at VDA 14)
/// ```
pub fn populated_fs() -> AltoFilesystem {
  let mut fs = AltoFilesystem::new(SMALL_GEOMETRY).unwrap();
  format_headers(&mut fs);

  let root_fe = file_entry(ROOT_SN, ROOT_LEADER_VDA);
  let docs_fe = file_entry(DOCS_SN, DOCS_LEADER_VDA);

  let root_data = root_dir_data();
  build_file(
    &mut fs,
    FileSpec {
      leader_vda: ROOT_LEADER_VDA,
      data_vdas: &[2],
      sn: ROOT_SN,
      name: "SysDir",
      content: &root_data,
      times: [0x1000_0000, 0x1000_0001, 0x1000_0002],
      dir_hint: Some(root_fe),
    },
  );

  let docs_data = docs_dir_data();
  build_file(
    &mut fs,
    FileSpec {
      leader_vda: DOCS_LEADER_VDA,
      data_vdas: &[4],
      sn: DOCS_SN,
      name: "Docs",
      content: &docs_data,
      times: [0x1000_0010, 0x1000_0011, 0x1000_0012],
      dir_hint: Some(root_fe),
    },
  );

  let memo_data = memo_content();
  build_file(
    &mut fs,
    FileSpec {
      leader_vda: MEMO_LEADER_VDA,
      data_vdas: &memo_data_vdas(),
      sn: MEMO_SN,
      name: "Memo.txt",
      content: &memo_data,
      times: [0x1234_5678, 0x1234_5679, 0xFFFF_FFFF],
      dir_hint: Some(docs_fe),
    },
  );

  build_file(
    &mut fs,
    FileSpec {
      leader_vda: EMPTY_LEADER_VDA,
      data_vdas: &[],
      sn: EMPTY_SN,
      name: "Empty",
      content: &[],
      times: [0x1000_0020, 0x1000_0021, 0x1000_0022],
      dir_hint: Some(root_fe),
    },
  );

  build_file(
    &mut fs,
    FileSpec {
      leader_vda: EMPTY2_LEADER_VDA,
      data_vdas: &[13],
      sn: EMPTY2_SN,
      name: "Empty2",
      content: b"abc",
      times: [0x1000_0030, 0x1000_0031, 0x1000_0032],
      dir_hint: Some(docs_fe),
    },
  );

  fs.pages[BAD_PAGE_VDA as usize].label = Label {
    version: VERSION_BAD,
    sn: SerialNumber { word1: VERSION_BAD, word2: VERSION_BAD },
    ..Label::default()
  };

  fs
}


// vim:ts=2 sw=2
