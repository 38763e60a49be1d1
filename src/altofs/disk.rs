//! Disk geometry and the on-disk page/label structures.
//!
//! Pages are addressed two ways: a virtual disk address (VDA) is a dense
//! index into the page array, a real disk address (RDA) is the bit-packed
//! cylinder/head/sector word the labels store. VDA 0 is addressable but
//! also serves as the chain terminator, so no file chain may contain it.

use std::fmt;
use std::str::FromStr;

use fancy_regex::Regex;

use super::fs::FsError;

pub const PAGE_DATA_SIZE: usize = 512;
pub const FILENAME_LENGTH: usize = 40;

/// Label version sentinel for free pages.
pub const VERSION_FREE: u16 = 0xFFFF;
/// Label version sentinel for bad sectors (serial number words match it).
pub const VERSION_BAD: u16 = 0xFFFE;
/// Serial number bit distinguishing directories from regular files.
pub const SN_DIRECTORY: u16 = 0x8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
  pub num_cylinders: u16,
  pub num_heads: u16,
  pub num_sectors: u16,
}

impl Geometry {
  /// The standard Diablo 31 pack: 203 cylinders, 2 heads, 12 sectors.
  pub const DEFAULT: Geometry = Geometry {
    num_cylinders: 203,
    num_heads: 2,
    num_sectors: 12,
  };

  /// Total number of pages on a disk with this geometry.
  pub fn length(&self) -> u16 {
    self.num_cylinders * self.num_heads * self.num_sectors
  }

  pub fn validate(&self) -> Result<(), FsError> {
    match *self {
      Geometry { num_cylinders, .. } if num_cylinders >= 512 => Err(FsError::Invalid(
        format!("geometry: {num_cylinders} cylinders, maximum is 511"),
      )),
      Geometry { num_heads, .. } if num_heads == 0 || num_heads > 2 => Err(FsError::Invalid(
        format!("geometry: {num_heads} heads, must be 1 or 2"),
      )),
      Geometry { num_sectors, .. } if num_sectors == 0 || num_sectors > 15 => Err(FsError::Invalid(
        format!("geometry: {num_sectors} sectors, must be in 1..=15"),
      )),
      _ => Ok(()),
    }
  }
}

impl fmt::Display for Geometry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}/{}/{}",
      self.num_cylinders, self.num_heads, self.num_sectors
    )
  }
}

impl FromStr for Geometry {
  type Err = FsError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let pattern = Regex::new(r"^(\d+)/(\d+)/(\d+)$").expect("geometry pattern is well formed");
    let captures = pattern
      .captures(s)
      .ok()
      .flatten()
      .ok_or_else(|| FsError::Invalid(format!("geometry: `{s}` does not match C/H/S")))?;

    let field = |index: usize| -> Result<u16, FsError> {
      captures
        .get(index)
        .expect("group exists in a matched pattern")
        .as_str()
        .parse::<u16>()
        .map_err(|_| FsError::Invalid(format!("geometry: `{s}`: field {index} out of range")))
    };

    let dg = Geometry {
      num_cylinders: field(1)?,
      num_heads: field(2)?,
      num_sectors: field(3)?,
    };
    dg.validate()?;
    Ok(dg)
  }
}

/// Two-word file identifier. One bit of the first word carries the
/// directory flag, the rest form the unique file id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerialNumber {
  pub word1: u16,
  pub word2: u16,
}

impl SerialNumber {
  pub fn is_directory(&self) -> bool {
    self.word1 & SN_DIRECTORY != 0
  }

  pub fn file_id(&self) -> u32 {
    (((self.word1 & !SN_DIRECTORY) as u32) << 16) | self.word2 as u32
  }
}

/// The per-page label, 8 words on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Label {
  pub next_rda: u16,
  pub prev_rda: u16,
  pub unused: u16,
  pub nbytes: u16,
  pub file_pgnum: u16,
  pub version: u16,
  pub sn: SerialNumber,
}

impl Label {
  pub fn is_free(&self) -> bool {
    self.version == VERSION_FREE
  }

  pub fn is_bad(&self) -> bool {
    self.version == VERSION_BAD
  }

  pub fn is_live(&self) -> bool {
    !matches!(self.version, 0 | VERSION_BAD | VERSION_FREE)
  }
}

/// One disk page: redundant virtual address, header, label, 512 data bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Page {
  pub page_vda: u16,
  pub header: [u16; 2],
  pub label: Label,
  pub data: [u8; PAGE_DATA_SIZE],
}

impl Page {
  pub fn new(page_vda: u16) -> Self {
    Self {
      page_vda,
      header: [0; 2],
      label: Label::default(),
      data: [0; PAGE_DATA_SIZE],
    }
  }
}

impl fmt::Debug for Page {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Page")
      .field("page_vda", &self.page_vda)
      .field("header", &self.header)
      .field("label", &self.label)
      .finish_non_exhaustive()
  }
}

/// Converts a real disk address to a virtual one. Fails when a field
/// exceeds the geometry or the two low bits are set.
pub fn real_to_virtual(dg: &Geometry, rda: u16) -> Result<u16, FsError> {
  let cylinder = (rda >> 3) & 0x1FF;
  let head = (rda >> 2) & 1;
  let sector = (rda >> 12) & 0xF;

  if cylinder >= dg.num_cylinders
    || head >= dg.num_heads
    || sector >= dg.num_sectors
    || (rda & 3) != 0
  {
    return Err(FsError::Invalid(format!(
      "disk address {rda:#06x} does not map into geometry {dg}"
    )));
  }

  Ok(((cylinder * dg.num_heads) + head) * dg.num_sectors + sector)
}

/// Converts a virtual disk address to a real one. Fails when `vda` is
/// outside the disk.
pub fn virtual_to_real(dg: &Geometry, vda: u16) -> Result<u16, FsError> {
  if vda >= dg.length() {
    return Err(FsError::Invalid(format!(
      "virtual address {vda} out of range for geometry {dg}"
    )));
  }

  let sector = vda % dg.num_sectors;
  let rest = vda / dg.num_sectors;
  let head = rest % dg.num_heads;
  let cylinder = rest / dg.num_heads;

  Ok((cylinder << 3) | (head << 2) | (sector << 12))
}

#[cfg(test)]
mod disk_tests {
  use super::*;

  #[test]
  fn address_round_trip_covers_the_disk() {
    let dg = Geometry::DEFAULT;
    assert_eq!(dg.length(), 4872);

    for vda in 0..dg.length() {
      let rda = virtual_to_real(&dg, vda).unwrap();
      assert_eq!(rda & 3, 0, "low bits of rda must stay clear");
      let back = real_to_virtual(&dg, rda).unwrap();
      assert_eq!(back, vda, "vda {vda} should survive the round trip");
    }
  }

  #[test]
  fn rda_round_trip() {
    let dg = Geometry {
      num_cylinders: 5,
      num_heads: 2,
      num_sectors: 7,
    };

    for vda in 0..dg.length() {
      let rda = virtual_to_real(&dg, vda).unwrap();
      assert_eq!(virtual_to_real(&dg, real_to_virtual(&dg, rda).unwrap()).unwrap(), rda);
    }
  }

  #[test]
  fn rda_with_low_bits_set_is_rejected() {
    let dg = Geometry::DEFAULT;
    let rda = virtual_to_real(&dg, 100).unwrap();
    assert!(real_to_virtual(&dg, rda | 1).is_err());
    assert!(real_to_virtual(&dg, rda | 2).is_err());
  }

  #[test]
  fn out_of_geometry_addresses_are_rejected() {
    let dg = Geometry {
      num_cylinders: 10,
      num_heads: 1,
      num_sectors: 4,
    };
    assert!(virtual_to_real(&dg, dg.length()).is_err());
    // Cylinder 10 of 10, sector 0, head 0.
    assert!(real_to_virtual(&dg, 10 << 3).is_err());
    // Head 1 on a single-head drive.
    assert!(real_to_virtual(&dg, 1 << 2).is_err());
    // Sector 4 of 4.
    assert!(real_to_virtual(&dg, 4 << 12).is_err());
  }

  #[test]
  fn geometry_validation() {
    assert!(Geometry::DEFAULT.validate().is_ok());
    assert!(Geometry { num_cylinders: 512, num_heads: 2, num_sectors: 12 }.validate().is_err());
    assert!(Geometry { num_cylinders: 203, num_heads: 0, num_sectors: 12 }.validate().is_err());
    assert!(Geometry { num_cylinders: 203, num_heads: 3, num_sectors: 12 }.validate().is_err());
    assert!(Geometry { num_cylinders: 203, num_heads: 2, num_sectors: 0 }.validate().is_err());
    assert!(Geometry { num_cylinders: 203, num_heads: 2, num_sectors: 16 }.validate().is_err());
  }

  #[test]
  fn geometry_parses_from_option_syntax() {
    let dg: Geometry = "203/2/12".parse().unwrap();
    assert_eq!(dg, Geometry::DEFAULT);
    assert_eq!(dg.to_string(), "203/2/12");

    assert!("203-2-12".parse::<Geometry>().is_err());
    assert!("203/2".parse::<Geometry>().is_err());
    assert!("99999/2/12".parse::<Geometry>().is_err());
    assert!("203/9/12".parse::<Geometry>().is_err());
  }

  #[test]
  fn serial_number_fields() {
    let sn = SerialNumber { word1: SN_DIRECTORY | 0x12, word2: 0x3456 };
    assert!(sn.is_directory());
    assert_eq!(sn.file_id(), 0x0012_3456);

    let plain = SerialNumber { word1: 0x12, word2: 0x3456 };
    assert!(!plain.is_directory());
    assert_eq!(plain.file_id(), sn.file_id());
  }

  #[test]
  fn label_vitality() {
    let mut label = Label::default();
    assert!(!label.is_live(), "zero version is invalid, not live");

    label.version = VERSION_FREE;
    assert!(label.is_free());

    label.version = VERSION_BAD;
    assert!(label.is_bad());

    label.version = 1;
    assert!(label.is_live());
  }
}

// vim:ts=2 sw=2
