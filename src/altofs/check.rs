//! Whole-image consistency checking.
//!
//! The checker visits every page once and keeps going past defects so a
//! single pass reports everything it can find. Diagnostics go to the log
//! sink; the return value is the overall verdict.

use log::error;

use super::disk::{real_to_virtual, virtual_to_real, FILENAME_LENGTH, PAGE_DATA_SIZE, VERSION_BAD};
use super::fs::AltoFilesystem;
use super::leader::LEADER_FILENAME;

impl AltoFilesystem {
  /// Validates headers, labels, leader shapes and chain links across the
  /// whole image. Returns false when any page is inconsistent.
  pub fn check_integrity(&self) -> bool {
    let mut success = true;
    for vda in 0..self.length() {
      if !self.check_page(vda) {
        success = false;
      }
    }
    success
  }

  fn check_page(&self, vda: u16) -> bool {
    let page = &self.pages[vda as usize];
    let rda = virtual_to_real(&self.dg, vda).expect("vda below length always maps");

    if page.header[0] != 0 || page.header[1] != rda {
      error!("check: bad sector header at page {vda}");
      return false;
    }

    let label = &page.label;
    if label.is_free() {
      return true;
    }
    if label.is_bad() {
      if label.sn.word1 != VERSION_BAD || label.sn.word2 != VERSION_BAD {
        error!("check: bad-sector marker without its serial sentinel at page {vda}");
        return false;
      }
      return true;
    }
    if label.version == 0 {
      error!("check: zero version at page {vda}");
      return false;
    }
    if label.nbytes as usize > PAGE_DATA_SIZE {
      error!("check: {} used bytes exceed the page size at page {vda}", label.nbytes);
      return false;
    }

    if label.prev_rda != 0 {
      let prev_vda = match real_to_virtual(&self.dg, label.prev_rda) {
        Ok(prev_vda) => prev_vda,
        Err(_) => {
          error!("check: unmappable backward link at page {vda}");
          return false;
        }
      };

      let prev = &self.pages[prev_vda as usize].label;
      if prev.sn != label.sn {
        error!("check: differing serial numbers (backwards) at page {vda}");
        return false;
      }
      if prev.file_pgnum.wrapping_add(1) != label.file_pgnum {
        error!("check: discontiguous file page numbers (backwards) at page {vda}");
        return false;
      }
      // Page 0 doubles as the terminator, so its back-link is not
      // required to be mirrored.
      if prev.next_rda != rda && vda != 0 {
        error!("check: broken backward link at page {vda}");
        return false;
      }
    } else {
      // No predecessor: this must be a well-formed leader page.
      if (label.nbytes as usize) < PAGE_DATA_SIZE {
        error!("check: short leader page at page {vda}");
        return false;
      }
      if label.file_pgnum != 0 {
        error!("check: leader page with nonzero file page number at page {vda}");
        return false;
      }
      let slen = page.data[LEADER_FILENAME] as usize;
      if slen == 0 || slen >= FILENAME_LENGTH {
        error!("check: invalid filename length at page {vda}");
        return false;
      }
    }

    if label.next_rda != 0 {
      if (label.nbytes as usize) < PAGE_DATA_SIZE {
        error!("check: short page in the middle of a chain at page {vda}");
        return false;
      }

      let next_vda = match real_to_virtual(&self.dg, label.next_rda) {
        Ok(next_vda) => next_vda,
        Err(_) => {
          error!("check: unmappable forward link at page {vda}");
          return false;
        }
      };

      let next = &self.pages[next_vda as usize].label;
      if next.sn != label.sn {
        error!("check: differing serial numbers (forward) at page {vda}");
        return false;
      }
      if next.file_pgnum != label.file_pgnum.wrapping_add(1) {
        error!("check: discontiguous file page numbers (forward) at page {vda}");
        return false;
      }
      if next.prev_rda != rda && vda != 0 {
        error!("check: broken forward link at page {vda}");
        return false;
      }
    }

    true
  }
}


// vim:ts=2 sw=2
