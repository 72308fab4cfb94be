#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use std::env;
use std::io::{BufWriter, Write};
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
    let Some(image_path) = args.next() else {
        bail!("usage: ufs-find <image-path>");
    };
    if args.next().is_some() {
        bail!("usage: ufs-find <image-path>");
    }

    let image = ufsview_cli::read_image(Path::new(&image_path))?;
    let volume = Volume::open(&image)
        .with_context(|| format!("failed to open UFS2 volume in {image_path}"))?;

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    volume
        .walk_tree(&mut out)
        .context("directory walk failed")?;
    out.flush()?;
    Ok(())
}
