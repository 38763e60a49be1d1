//! Directory files, pathname resolution and the scavenger.
//!
//! A directory is an ordinary file whose data is a stream of
//! variable-length entries. Pathnames use `<` to reset to the root
//! directory (the leader at VDA 1) and `>` to descend; lookups use a
//! byte-wise prefix match over the query length, the same rule the
//! Alto's own software applied (stored names carry a trailing
//! terminator character, so exact names still resolve).

use super::disk::{SerialNumber, FILENAME_LENGTH};
use super::fs::{AltoFilesystem, FileEntry, FsError};
use super::leader::{decode_name, read_word_be, LEADER_FILENAME};

/// The root directory's leader page.
pub const ROOT_DIRECTORY_VDA: u16 = 1;

/// Entry type field marking a live entry.
const DIR_ENTRY_VALID: u16 = 1;
/// Low ten bits of the first word: entry length in words.
const DIR_ENTRY_LEN_MASK: u16 = 0x3FF;
/// Entries longer than this keep their decodable head; the tail is
/// skipped.
const DIR_ENTRY_BUFFER: usize = 128;

/// Byte offsets within a directory entry.
const DIRECTORY_SN: usize = 2;
const DIRECTORY_VERSION: usize = 6;
const DIRECTORY_LEADER_VDA: usize = 10;
const DIRECTORY_FILENAME: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
  pub fe: FileEntry,
  pub filename: String,
}

fn name_matches(entry_name: &str, query: &str) -> bool {
  entry_name.as_bytes().starts_with(query.as_bytes())
}

impl AltoFilesystem {
  /// Visits every live leader page in address order. The callback
  /// returns positive to continue, zero to stop cleanly, negative to
  /// abort the scan.
  pub fn scan_files<F>(&self, mut cb: F) -> Result<(), FsError>
  where
    F: FnMut(&AltoFilesystem, &FileEntry) -> i32,
  {
    for vda in 0..self.length() {
      let label = &self.pages[vda as usize].label;
      if !label.is_live() || label.file_pgnum != 0 {
        continue;
      }

      let fe = FileEntry {
        sn: label.sn,
        version: label.version,
        leader_vda: vda,
      };
      let ret = cb(self, &fe);
      if ret < 0 {
        return Err(FsError::Invalid(String::from("file scan aborted by the callback")));
      }
      if ret == 0 {
        break;
      }
    }

    Ok(())
  }

  /// Streams the entries of one directory file. Invalid (deleted)
  /// entries are skipped; the callback contract matches `scan_files`.
  pub fn scan_directory<F>(&self, fe: &FileEntry, mut cb: F) -> Result<(), FsError>
  where
    F: FnMut(&AltoFilesystem, &DirectoryEntry) -> i32,
  {
    let mut of = self.open(fe, false)?;

    loop {
      let mut buffer = [0u8; DIR_ENTRY_BUFFER];
      let nbytes = self.read(&mut of, Some(&mut buffer[..2]), 2);
      if nbytes == 0 {
        if let Some(err) = of.error {
          return Err(err);
        }
        break;
      }
      if nbytes != 2 {
        return Err(FsError::Format(String::from("directory ends inside an entry word")));
      }

      let word = read_word_be(&buffer, 0);
      let is_valid = (word >> 10) == DIR_ENTRY_VALID;
      let length_words = (word & DIR_ENTRY_LEN_MASK) as usize;
      if length_words == 0 {
        return Err(FsError::Format(String::from("zero-length directory entry")));
      }

      let entry_bytes = 2 * length_words;
      if entry_bytes > DIR_ENTRY_BUFFER {
        let head = DIR_ENTRY_BUFFER - 2;
        if self.read(&mut of, Some(&mut buffer[2..]), head) != head {
          return Err(FsError::Format(String::from("directory ends inside an entry")));
        }
        let tail = entry_bytes - DIR_ENTRY_BUFFER;
        if self.read(&mut of, None, tail) != tail {
          return Err(FsError::Format(String::from("directory ends inside an entry")));
        }
      } else {
        let rest = entry_bytes - 2;
        if self.read(&mut of, Some(&mut buffer[2..entry_bytes]), rest) != rest {
          return Err(FsError::Format(String::from("directory ends inside an entry")));
        }
      }

      if !is_valid {
        continue;
      }

      let de = DirectoryEntry {
        fe: FileEntry {
          sn: SerialNumber {
            word1: read_word_be(&buffer, DIRECTORY_SN),
            word2: read_word_be(&buffer, DIRECTORY_SN + 2),
          },
          version: read_word_be(&buffer, DIRECTORY_VERSION),
          leader_vda: read_word_be(&buffer, DIRECTORY_LEADER_VDA),
        },
        filename: decode_name(&buffer, DIRECTORY_FILENAME),
      };

      let ret = cb(self, &de);
      if ret < 0 {
        return Err(FsError::Invalid(String::from("directory scan aborted by the callback")));
      }
      if ret == 0 {
        break;
      }
    }

    Ok(())
  }

  /// Finds `name` in one directory by prefix match. The first matching
  /// entry wins.
  pub fn lookup_directory_entry(&self, dir: &FileEntry, name: &str) -> Result<FileEntry, FsError> {
    if name.is_empty() {
      return Err(FsError::Invalid(String::from("empty name component")));
    }
    if name.len() >= FILENAME_LENGTH {
      return Err(FsError::Invalid(format!("name `{name}` is too long")));
    }

    let mut found = None;
    self.scan_directory(dir, |_, de| {
      if name_matches(&de.filename, name) {
        found = Some(de.fe);
        0
      } else {
        1
      }
    })?;

    found.ok_or_else(|| FsError::NotFound(format!("{name}: no such file")))
  }

  /// Resolves a hierarchical pathname. `<` resets to the root directory,
  /// `>` descends into the component before it; a bare name resolves
  /// from the root implicitly. A path ending right after `<` or `>`
  /// names the directory itself, so `<<A>` equals `<A>`.
  pub fn find_file(&self, pathname: &str) -> Result<FileEntry, FsError> {
    if pathname.is_empty() {
      return Err(FsError::Invalid(String::from("empty pathname")));
    }

    let root = self.file_entry(ROOT_DIRECTORY_VDA)?;
    let mut current = root;
    let bytes = pathname.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
      if bytes[i] == b'<' {
        current = root;
        i += 1;
        continue;
      }
      if bytes[i] == b'>' {
        return Err(FsError::Invalid(format!("malformed pathname `{pathname}`")));
      }

      let start = i;
      while i < bytes.len() && bytes[i] != b'<' && bytes[i] != b'>' {
        i += 1;
      }
      let name = &pathname[start..i];
      if name.len() >= FILENAME_LENGTH {
        return Err(FsError::Invalid(format!("name `{name}` is too long")));
      }

      let entry = self.lookup_directory_entry(&current, name)?;
      if i == bytes.len() {
        return Ok(entry);
      }
      if bytes[i] == b'>' {
        if !entry.sn.is_directory() {
          return Err(FsError::Invalid(format!("`{name}` is not a directory")));
        }
        current = entry;
        i += 1;
        continue;
      }
      // A `<` right after a name means the name was the final component.
      return Ok(entry);
    }

    Ok(current)
  }

  /// Locates a file by scanning every live leader, ignoring directories
  /// entirely. Succeeds only when exactly one leader matches; used when
  /// directory linkage cannot be trusted.
  pub fn scavenge_file(&self, name: &str) -> Result<FileEntry, FsError> {
    if name.is_empty() {
      return Err(FsError::Invalid(String::from("empty name")));
    }
    if name.len() >= FILENAME_LENGTH {
      return Err(FsError::Invalid(format!("name `{name}` is too long")));
    }

    let mut matches = Vec::new();
    self.scan_files(|fs, fe| {
      let leader = &fs.pages[fe.leader_vda as usize];
      if name_matches(&decode_name(&leader.data, LEADER_FILENAME), name) {
        matches.push(*fe);
      }
      1
    })?;

    match matches.len() {
      0 => Err(FsError::NotFound(format!("{name}: no leader page carries this name"))),
      1 => Ok(matches[0]),
      n => Err(FsError::NotFound(format!("{name}: ambiguous, {n} leader pages match"))),
    }
  }
}

#[cfg(test)]
mod directory_tests {
  use super::super::samples;
  use super::*;

  fn entry_names(fs: &AltoFilesystem, dir: &FileEntry) -> Vec<String> {
    let mut names = Vec::new();
    fs.scan_directory(dir, |_, de| {
      names.push(de.filename.clone());
      1
    })
    .unwrap();
    names
  }

  #[test]
  fn scanning_the_root_lists_live_entries_only() {
    let fs = samples::populated_fs();
    let root = fs.file_entry(ROOT_DIRECTORY_VDA).unwrap();

    // The deleted entry between Docs and Empty must not show up.
    assert_eq!(entry_names(&fs, &root), vec!["SysDir", "Docs", "Empty"]);
  }

  #[test]
  fn scan_decodes_entry_fields() {
    let fs = samples::populated_fs();
    let root = fs.file_entry(ROOT_DIRECTORY_VDA).unwrap();

    let mut docs = None;
    fs.scan_directory(&root, |_, de| {
      if de.filename == "Docs" {
        docs = Some(de.fe);
        0
      } else {
        1
      }
    })
    .unwrap();

    let docs = docs.expect("Docs is present in the root");
    assert_eq!(docs.leader_vda, samples::DOCS_LEADER_VDA);
    assert!(docs.sn.is_directory());
    assert_eq!(docs.version, 1);
  }

  #[test]
  fn callback_stop_and_abort() {
    let fs = samples::populated_fs();
    let root = fs.file_entry(ROOT_DIRECTORY_VDA).unwrap();

    let mut seen = 0;
    fs.scan_directory(&root, |_, _| {
      seen += 1;
      0
    })
    .unwrap();
    assert_eq!(seen, 1, "a zero return stops after the first entry");

    assert!(fs.scan_directory(&root, |_, _| -1).is_err());
    assert!(fs.scan_files(|_, _| -1).is_err());
  }

  #[test]
  fn scan_files_visits_every_leader() {
    let fs = samples::populated_fs();
    let mut leaders = Vec::new();
    fs.scan_files(|_, fe| {
      leaders.push(fe.leader_vda);
      1
    })
    .unwrap();

    assert_eq!(
      leaders,
      vec![
        samples::ROOT_LEADER_VDA,
        samples::DOCS_LEADER_VDA,
        samples::MEMO_LEADER_VDA,
        samples::EMPTY_LEADER_VDA,
        samples::EMPTY2_LEADER_VDA,
      ]
    );
  }

  #[test]
  fn zero_length_entry_is_a_format_error() {
    let mut fs = samples::populated_fs();
    // Two zero bytes inside the directory's used region read as a
    // zero-length entry.
    let data_vda = samples::ROOT_LEADER_VDA + 1;
    fs.pages[data_vda as usize].label.nbytes += 2;

    let root = fs.file_entry(ROOT_DIRECTORY_VDA).unwrap();
    assert!(matches!(
      fs.scan_directory(&root, |_, _| 1),
      Err(FsError::Format(_))
    ));
  }

  #[test]
  fn truncated_entry_is_a_format_error() {
    let mut fs = samples::populated_fs();
    // Claim two more words than the directory actually holds.
    let data_vda = samples::ROOT_LEADER_VDA + 1;
    let page = &mut fs.pages[data_vda as usize];
    let nbytes = page.label.nbytes as usize;
    let length_word = ((DIR_ENTRY_VALID << 10) | 4) as u16;
    page.data[nbytes] = (length_word >> 8) as u8;
    page.data[nbytes + 1] = length_word as u8;
    page.label.nbytes += 2;

    let root = fs.file_entry(ROOT_DIRECTORY_VDA).unwrap();
    assert!(matches!(
      fs.scan_directory(&root, |_, _| 1),
      Err(FsError::Format(_))
    ));
  }

  #[test]
  fn oversized_entries_keep_their_head_and_skip_the_tail() {
    let mut fs = samples::populated_fs();

    // Rebuild the Docs directory with one 140-byte entry before a
    // normal one; the scanner must decode both names.
    let huge = samples::encode_dir_entry_padded(
      SerialNumber { word1: 0, word2: 0x999 },
      1,
      samples::MEMO_LEADER_VDA,
      "Huge.bin",
      true,
      70,
    );
    let normal = samples::encode_dir_entry(
      fs.file_entry(samples::EMPTY2_LEADER_VDA).unwrap().sn,
      1,
      samples::EMPTY2_LEADER_VDA,
      "Empty2",
      true,
    );
    let mut contents = huge;
    contents.extend_from_slice(&normal);
    samples::set_file_data(&mut fs, samples::DOCS_LEADER_VDA + 1, &contents);

    let docs = fs.file_entry(samples::DOCS_LEADER_VDA).unwrap();
    assert_eq!(entry_names(&fs, &docs), vec!["Huge.bin", "Empty2"]);
  }

  #[test]
  fn path_descent() {
    let fs = samples::populated_fs();

    let memo = fs.find_file("<Docs>Memo.txt").unwrap();
    assert_eq!(memo.leader_vda, samples::MEMO_LEADER_VDA);

    // A leading `<` may be omitted.
    let docs = fs.find_file("Docs").unwrap();
    assert_eq!(docs.leader_vda, samples::DOCS_LEADER_VDA);

    let docs = fs.find_file("Docs>Memo.txt").unwrap();
    assert_eq!(docs.leader_vda, samples::MEMO_LEADER_VDA);

    assert!(matches!(
      fs.find_file("<Docs>Missing"),
      Err(FsError::NotFound(_))
    ));
  }

  #[test]
  fn repeated_resets_are_idempotent() {
    let fs = samples::populated_fs();
    let once = fs.find_file("<Docs>").unwrap();
    let twice = fs.find_file("<<Docs>").unwrap();
    assert_eq!(once, twice);
    assert_eq!(once.leader_vda, samples::DOCS_LEADER_VDA);
  }

  #[test]
  fn lookup_is_a_prefix_match() {
    let fs = samples::populated_fs();
    // "Memo" matches "Memo.txt" by prefix; that is the historical
    // behavior, not an accident.
    let memo = fs.find_file("<Docs>Memo").unwrap();
    assert_eq!(memo.leader_vda, samples::MEMO_LEADER_VDA);
  }

  #[test]
  fn descending_into_a_plain_file_fails() {
    let fs = samples::populated_fs();
    assert!(matches!(
      fs.find_file("Empty>Anything"),
      Err(FsError::Invalid(_))
    ));
  }

  #[test]
  fn malformed_pathnames_are_rejected() {
    let fs = samples::populated_fs();
    assert!(fs.find_file("").is_err());
    assert!(fs.find_file(">Docs").is_err());

    let long_name = "x".repeat(FILENAME_LENGTH);
    assert!(matches!(
      fs.find_file(&long_name),
      Err(FsError::Invalid(_))
    ));
  }

  #[test]
  fn scavenge_finds_a_unique_leader() {
    let fs = samples::populated_fs();
    let memo = fs.scavenge_file("Memo.txt").unwrap();
    assert_eq!(memo.leader_vda, samples::MEMO_LEADER_VDA);
  }

  #[test]
  fn scavenge_rejects_misses_and_ambiguity() {
    let fs = samples::populated_fs();
    assert!(matches!(
      fs.scavenge_file("Nowhere"),
      Err(FsError::NotFound(_))
    ));

    // Both `Empty` and `Empty2` start with `Empty`.
    match fs.scavenge_file("Empty") {
      Err(FsError::NotFound(message)) => assert!(message.contains("ambiguous"), "got: {message}"),
      other => panic!("expected an ambiguity error, got {other:?}"),
    }
    assert!(fs.scavenge_file("Empty2").is_ok());
  }

  #[test]
  fn scavenge_rejects_overlong_names_without_scanning() {
    let fs = samples::populated_fs();
    let long_name = "x".repeat(FILENAME_LENGTH);
    assert!(matches!(
      fs.scavenge_file(&long_name),
      Err(FsError::Invalid(_))
    ));
  }
}

// vim:ts=2 sw=2
