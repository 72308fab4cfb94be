#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use std::env;
use std::io::Write;
use std::path::Path;
use ufsview::Volume;

fn main() {
    ufsview_cli::init_tracing();
    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let (Some(image_path), Some(path)) = (args.next(), args.next()) else {
        bail!("usage: ufs-cat <image-path> <path>");
    };
    if args.next().is_some() {
        bail!("usage: ufs-cat <image-path> <path>");
    }

    let image = ufsview_cli::read_image(Path::new(&image_path))?;
    let volume = Volume::open(&image)
        .with_context(|| format!("failed to open UFS2 volume in {image_path}"))?;
    let (_, inode) = volume
        .resolve_path(&path)
        .with_context(|| format!("cannot resolve {path}"))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    volume
        .extract_to(&inode, &mut out)
        .with_context(|| format!("cannot extract {path}"))?;
    out.flush()?;
    Ok(())
}
