//! Command drivers for the CLI: each takes a loaded filesystem, prints
//! its results, and returns a process exit status.

use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::warn;

use crate::altofs::directory::ROOT_DIRECTORY_VDA;
use crate::altofs::disk::Geometry;
use crate::altofs::fs::{AltoFilesystem, FileEntry, FsError};
use crate::util::format_time;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// Creates the filesystem, loads the image and runs the integrity check.
/// A failed check is fatal unless `tolerate_damage` is set (scavenging
/// exists precisely for images with broken directory linkage).
pub fn load_image(image: &Path, dg: Geometry, tolerate_damage: bool) -> Option<AltoFilesystem> {
  let mut fs = match AltoFilesystem::new(dg) {
    Ok(fs) => fs,
    Err(err) => {
      println!("altofs: {err}");
      return None;
    }
  };

  if let Err(err) = fs.load_image(image) {
    println!("altofs: {err}");
    return None;
  }

  if !fs.check_integrity() {
    if tolerate_damage {
      warn!("{}: integrity check failed, continuing for scavenge", image.display());
    } else {
      println!("altofs: {}: integrity check failed", image.display());
      return None;
    }
  }

  Some(fs)
}

fn locate(fs: &AltoFilesystem, path: &str, scavenge: bool) -> Result<FileEntry, FsError> {
  if scavenge {
    fs.scavenge_file(path)
  } else {
    fs.find_file(path)
  }
}

/// `-s`: geometry, page usage, the file listing and the root directory.
pub fn summary(fs: &AltoFilesystem) -> i32 {
  let live = fs.pages.iter().filter(|page| page.label.is_live()).count();
  let free = fs.pages.iter().filter(|page| page.label.is_free()).count();
  let bad = fs.pages.iter().filter(|page| page.label.is_bad()).count();

  println!("Geometry {} ({} pages)", fs.dg, fs.length());
  println!("Pages: {live} live, {free} free, {bad} bad");
  println!();
  println!("Files:");

  let mut rows = Vec::new();
  let scanned = fs.scan_files(|fs, fe| {
    match (fs.file_info(fe), fs.file_length(fe)) {
      (Ok(info), Ok(length)) => {
        rows.push((info.filename, length, info.written, fe.sn.is_directory()));
      }
      (Err(err), _) | (_, Err(err)) => {
        warn!("leader page {}: {err}", fe.leader_vda);
      }
    }
    1
  });
  if let Err(err) = scanned {
    println!("altofs: {err}");
    return EXIT_FAILURE;
  }

  for (filename, length, written, is_directory) in
    rows.into_iter().sorted_by(|a, b| a.0.cmp(&b.0))
  {
    let marker = if is_directory { "<dir>" } else { "" };
    println!("  {filename:<40} {length:>8}  {}  {marker}", format_time(written));
  }

  println!();
  println!("Root directory:");
  let root = match fs.file_entry(ROOT_DIRECTORY_VDA) {
    Ok(root) => root,
    Err(err) => {
      println!("altofs: {err}");
      return EXIT_FAILURE;
    }
  };
  let listed = fs.scan_directory(&root, |_, de| {
    let marker = if de.fe.sn.is_directory() { "<dir>" } else { "" };
    println!("  {:<40} leader page {:>5}  {marker}", de.filename, de.fe.leader_vda);
    1
  });
  if let Err(err) = listed {
    println!("altofs: {err}");
    return EXIT_FAILURE;
  }

  EXIT_SUCCESS
}

/// `-e`: extract one file, named by pathname, to the host filesystem
/// under the file's own (leader) name.
pub fn extract(fs: &AltoFilesystem, path: &str, scavenge: bool) -> i32 {
  let fe = match locate(fs, path, scavenge) {
    Ok(fe) => fe,
    Err(err) => {
      println!("altofs: extract: {err}");
      return EXIT_FAILURE;
    }
  };

  let info = match fs.file_info(&fe) {
    Ok(info) => info,
    Err(err) => {
      println!("altofs: extract: {err}");
      return EXIT_FAILURE;
    }
  };
  if info.filename.is_empty() {
    println!("altofs: extract: leader page {} has no filename", fe.leader_vda);
    return EXIT_FAILURE;
  }

  let output = PathBuf::from(&info.filename);
  match fs.extract_file(&fe, &output) {
    Ok(nbytes) => {
      println!("altofs: extracted `{}` ({nbytes} bytes)", output.display());
      EXIT_SUCCESS
    }
    Err(err) => {
      println!("altofs: extract: {err}");
      EXIT_FAILURE
    }
  }
}

/// `-i`: print the decoded leader metadata of one file.
pub fn info(fs: &AltoFilesystem, path: &str, scavenge: bool) -> i32 {
  let fe = match locate(fs, path, scavenge) {
    Ok(fe) => fe,
    Err(err) => {
      println!("altofs: info: {err}");
      return EXIT_FAILURE;
    }
  };

  let info = match fs.file_info(&fe) {
    Ok(info) => info,
    Err(err) => {
      println!("altofs: info: {err}");
      return EXIT_FAILURE;
    }
  };
  let length = match fs.file_length(&fe) {
    Ok(length) => length,
    Err(err) => {
      println!("altofs: info: {err}");
      return EXIT_FAILURE;
    }
  };

  let kind = if fe.sn.is_directory() { "directory" } else { "regular file" };
  println!("    Name: {}", info.filename);
  println!("    Type: {kind}");
  println!("  Serial: {:#010x} version {}", fe.sn.file_id(), fe.version);
  println!("  Leader: page {}", fe.leader_vda);
  println!("  Length: {length} bytes");
  println!(" Created: {}", format_time(info.created));
  println!(" Written: {}", format_time(info.written));
  println!("    Read: {}", format_time(info.read));
  println!(
    "   Props: begin {} length {}, consecutive {}, change serial {}",
    info.propbegin, info.proplength, info.consecutive, info.change_sn
  );
  println!(
    "  In dir: serial {:#010x}, leader page {}",
    info.dir_fp_hint.sn.file_id(),
    info.dir_fp_hint.leader_vda
  );
  println!(
    "Last page: vda {} number {} offset {}",
    info.last_page_hint.vda, info.last_page_hint.pgnum, info.last_page_hint.pos
  );

  EXIT_SUCCESS
}

/// `-r`: replace one file's contents with a host file.
pub fn replace(fs: &mut AltoFilesystem, path: &str, host_file: &Path, scavenge: bool) -> i32 {
  let fe = match locate(fs, path, scavenge) {
    Ok(fe) => fe,
    Err(err) => {
      println!("altofs: replace: {err}");
      return EXIT_FAILURE;
    }
  };

  match fs.replace_file(&fe, host_file) {
    Ok(nbytes) => {
      println!("altofs: replaced `{path}` with {nbytes} bytes");
      EXIT_SUCCESS
    }
    Err(err) => {
      println!("altofs: replace: {err}");
      EXIT_FAILURE
    }
  }
}

/// `-o`: write the image back out.
pub fn save(fs: &AltoFilesystem, output: &Path) -> i32 {
  match fs.save_image(output) {
    Ok(()) => {
      println!("altofs: wrote image `{}`", output.display());
      EXIT_SUCCESS
    }
    Err(err) => {
      println!("altofs: save: {err}");
      EXIT_FAILURE
    }
  }
}

// vim:ts=2 sw=2
