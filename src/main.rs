mod altofs;
mod commands;
mod util;

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::altofs::disk::Geometry;

#[derive(Debug, Parser)]
#[command(
  name = "altofs",
  about = "Read, verify and extract files from Xerox Alto disk images",
  version
)]
struct Args {
  /// Disk image to operate on.
  image: PathBuf,

  /// Print a filesystem summary (files and root directory listing).
  #[arg(short, long)]
  summary: bool,

  /// Extract the named file to the host filesystem using its own name.
  #[arg(short, long, value_name = "PATH")]
  extract: Option<String>,

  /// Print the leader metadata of the named file.
  #[arg(short, long, value_name = "PATH")]
  info: Option<String>,

  /// Replace the named file's contents with a host file (needs --output).
  #[arg(short, long, num_args = 2, value_names = ["PATH", "HOST_FILE"])]
  replace: Option<Vec<String>>,

  /// Write the (possibly modified) image to this file.
  #[arg(short, long, value_name = "FILE")]
  output: Option<PathBuf>,

  /// Locate files by scanning leader pages instead of directories.
  #[arg(long)]
  scavenge: bool,

  /// Disk geometry as cylinders/heads/sectors.
  #[arg(short, long, default_value_t = Geometry::DEFAULT)]
  geometry: Geometry,
}

fn run() -> i32 {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
  let args = Args::parse();

  let mut fs = match commands::load_image(&args.image, args.geometry, args.scavenge) {
    Some(fs) => fs,
    None => return commands::EXIT_FAILURE,
  };

  let mut status = commands::EXIT_SUCCESS;
  let mut acted = false;

  if args.summary {
    acted = true;
    status = status.max(commands::summary(&fs));
  }
  if let Some(path) = &args.info {
    acted = true;
    status = status.max(commands::info(&fs, path, args.scavenge));
  }
  if let Some(path) = &args.extract {
    acted = true;
    status = status.max(commands::extract(&fs, path, args.scavenge));
  }
  if let Some(replace) = &args.replace {
    acted = true;
    if args.output.is_none() {
      println!("altofs: --replace needs --output, the input image is never rewritten in place");
      return commands::EXIT_FAILURE;
    }
    status = status.max(commands::replace(
      &mut fs,
      &replace[0],
      Path::new(&replace[1]),
      args.scavenge,
    ));
  }
  if let Some(output) = &args.output {
    status = status.max(commands::save(&fs, output));
  }

  if !acted && args.output.is_none() {
    // A bare invocation: the load and the integrity check were the work.
    println!("altofs: {}: image is consistent", args.image.display());
  }

  status
}

fn main() {
  std::process::exit(run());
}

// vim:ts=2 sw=2
