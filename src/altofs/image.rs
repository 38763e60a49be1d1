//! The disk image codec.
//!
//! An image holds one record per page, in VDA order. Each record is a
//! word that only echoes the address (discarded on load, synthesized on
//! save), ten little-endian metadata words (header, then label), and 512
//! data bytes stored with the two bytes of every word swapped relative
//! to memory.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::disk::{Label, Page, SerialNumber, PAGE_DATA_SIZE};
use super::fs::{AltoFilesystem, FsError};

/// Header plus label, in 16-bit words.
pub const META_WORDS: usize = 10;
/// On-disk size of one page record.
pub const RECORD_SIZE: usize = 2 + META_WORDS * 2 + PAGE_DATA_SIZE;

impl AltoFilesystem {
  /// Reads a whole disk image into the page array. The file must hold
  /// exactly `length` records; anything shorter or longer is an error.
  pub fn load_image(&mut self, path: &Path) -> Result<(), FsError> {
    let fp = File::open(path)
      .map_err(|err| FsError::Io(format!("{}: {err}", path.display())))?;
    let mut fp = BufReader::new(fp);

    let mut record = [0u8; RECORD_SIZE];
    for vda in 0..self.length() {
      fp.read_exact(&mut record).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => {
          FsError::Io(format!("{}: premature end of image at page {vda}", path.display()))
        }
        _ => FsError::Io(format!("{}: {err}", path.display())),
      })?;

      decode_record(vda, &record, &mut self.pages[vda as usize]);
    }

    let mut extra = [0u8; 1];
    match fp.read(&mut extra)? {
      0 => Ok(()),
      _ => Err(FsError::Io(format!("{}: extra data at end of image", path.display()))),
    }
  }

  /// Writes the page array back out as a disk image.
  pub fn save_image(&self, path: &Path) -> Result<(), FsError> {
    let fp = File::create(path)
      .map_err(|err| FsError::Io(format!("{}: {err}", path.display())))?;
    let mut fp = BufWriter::new(fp);

    let mut record = [0u8; RECORD_SIZE];
    for vda in 0..self.length() {
      encode_record(vda, &self.pages[vda as usize], &mut record);
      fp.write_all(&record)?;
    }

    fp.flush()?;
    Ok(())
  }
}

fn decode_record(vda: u16, record: &[u8; RECORD_SIZE], page: &mut Page) {
  // The leading word only echoes the address; trust the loop index.
  page.page_vda = vda;

  let word = |index: usize| {
    let at = 2 + 2 * index;
    u16::from_le_bytes([record[at], record[at + 1]])
  };

  page.header = [word(0), word(1)];
  page.label = Label {
    next_rda: word(2),
    prev_rda: word(3),
    unused: word(4),
    nbytes: word(5),
    file_pgnum: word(6),
    version: word(7),
    sn: SerialNumber {
      word1: word(8),
      word2: word(9),
    },
  };

  let data = &record[2 + 2 * META_WORDS..];
  for (k, &byte) in data.iter().enumerate() {
    page.data[k ^ 1] = byte;
  }
}

fn encode_record(vda: u16, page: &Page, record: &mut [u8; RECORD_SIZE]) {
  record[0..2].copy_from_slice(&vda.to_le_bytes());

  let words = [
    page.header[0],
    page.header[1],
    page.label.next_rda,
    page.label.prev_rda,
    page.label.unused,
    page.label.nbytes,
    page.label.file_pgnum,
    page.label.version,
    page.label.sn.word1,
    page.label.sn.word2,
  ];
  for (index, word) in words.iter().enumerate() {
    let at = 2 + 2 * index;
    record[at..at + 2].copy_from_slice(&word.to_le_bytes());
  }

  let data = &mut record[2 + 2 * META_WORDS..];
  for (k, byte) in data.iter_mut().enumerate() {
    *byte = page.data[k ^ 1];
  }
}

#[cfg(test)]
mod image_tests {
  use super::super::disk::{virtual_to_real, Geometry};
  use super::super::samples;
  use super::*;

  fn tiny_geometry() -> Geometry {
    Geometry {
      num_cylinders: 2,
      num_heads: 1,
      num_sectors: 2,
    }
  }

  /// Builds one well-formed record for `vda`: correct header, the given
  /// label words, and data bytes already in on-disk (swapped) order.
  fn build_record(dg: &Geometry, vda: u16, label_words: [u16; 8], data: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(RECORD_SIZE);
    record.extend_from_slice(&vda.to_le_bytes());
    record.extend_from_slice(&0u16.to_le_bytes());
    record.extend_from_slice(&virtual_to_real(dg, vda).unwrap().to_le_bytes());
    for word in label_words {
      record.extend_from_slice(&word.to_le_bytes());
    }
    let mut payload = [0u8; PAGE_DATA_SIZE];
    payload[..data.len()].copy_from_slice(data);
    record.extend_from_slice(&payload);
    record
  }

  fn build_image(dg: &Geometry) -> Vec<u8> {
    (0..dg.length())
      .flat_map(|vda| build_record(dg, vda, [0, 0, 0, 0, 0, 0xFFFF, 0, 0], &[vda as u8, !vda as u8]))
      .collect()
  }

  #[test]
  fn load_decodes_meta_and_swaps_data() {
    let dg = tiny_geometry();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tiny.dsk");
    std::fs::write(&path, build_image(&dg)).unwrap();

    let mut fs = AltoFilesystem::new(dg).unwrap();
    fs.load_image(&path).unwrap();

    for vda in 0..dg.length() {
      let page = fs.page(vda).unwrap();
      assert_eq!(page.page_vda, vda);
      assert_eq!(page.header[0], 0);
      assert_eq!(page.header[1], virtual_to_real(&dg, vda).unwrap());
      assert!(page.label.is_free());
      // On-disk bytes 0 and 1 land at memory offsets 1 and 0.
      assert_eq!(page.data[1], vda as u8);
      assert_eq!(page.data[0], !vda as u8);
    }
  }

  #[test]
  fn save_after_load_is_byte_identical() {
    let dg = tiny_geometry();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tiny.dsk");
    let original = build_image(&dg);
    std::fs::write(&path, &original).unwrap();

    let mut fs = AltoFilesystem::new(dg).unwrap();
    fs.load_image(&path).unwrap();

    let saved_path = dir.path().join("copy.dsk");
    fs.save_image(&saved_path).unwrap();

    assert_eq!(std::fs::read(&saved_path).unwrap(), original);
  }

  #[test]
  fn populated_fs_survives_a_save_load_cycle() {
    let fs = samples::populated_fs();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.dsk");
    fs.save_image(&path).unwrap();

    let mut reloaded = AltoFilesystem::new(fs.dg).unwrap();
    reloaded.load_image(&path).unwrap();
    assert_eq!(reloaded.pages, fs.pages);
  }

  #[test]
  fn a_full_size_formatted_disk_round_trips_and_checks_clean() {
    let mut fs = AltoFilesystem::new(Geometry::DEFAULT).unwrap();
    samples::format_headers(&mut fs);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("formatted.dsk");
    fs.save_image(&path).unwrap();
    assert_eq!(
      std::fs::metadata(&path).unwrap().len(),
      4872 * RECORD_SIZE as u64
    );

    let mut reloaded = AltoFilesystem::new(Geometry::DEFAULT).unwrap();
    reloaded.load_image(&path).unwrap();
    assert!(reloaded.check_integrity());
    assert_eq!(reloaded.pages, fs.pages);
  }

  #[test]
  fn truncated_image_is_a_premature_end() {
    let dg = tiny_geometry();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.dsk");
    let mut bytes = build_image(&dg);
    bytes.truncate(bytes.len() - 7);
    std::fs::write(&path, bytes).unwrap();

    let mut fs = AltoFilesystem::new(dg).unwrap();
    match fs.load_image(&path) {
      Err(FsError::Io(message)) => assert!(message.contains("premature"), "got: {message}"),
      other => panic!("expected an i/o error, got {other:?}"),
    }
  }

  #[test]
  fn trailing_bytes_are_rejected() {
    let dg = tiny_geometry();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("long.dsk");
    let mut bytes = build_image(&dg);
    bytes.push(0);
    std::fs::write(&path, bytes).unwrap();

    let mut fs = AltoFilesystem::new(dg).unwrap();
    match fs.load_image(&path) {
      Err(FsError::Io(message)) => assert!(message.contains("extra data"), "got: {message}"),
      other => panic!("expected an i/o error, got {other:?}"),
    }
  }

  #[test]
  fn missing_image_file_is_an_error() {
    let mut fs = AltoFilesystem::new(tiny_geometry()).unwrap();
    assert!(matches!(
      fs.load_image(Path::new("/nonexistent/image.dsk")),
      Err(FsError::Io(_))
    ));
  }
}

// vim:ts=2 sw=2
