#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use std::env;
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
        bail!("usage: ufs-inspect <image-path> [--json]");
    };
    let json = args.any(|arg| arg == "--json");

    let image = ufsview_cli::read_image(Path::new(&image_path))?;
    let volume = Volume::open(&image)
        .with_context(|| format!("failed to open UFS2 volume in {image_path}"))?;
    let sb = volume.superblock();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(sb).context("serialize superblock")?
        );
    } else {
        println!("filesystem: ufs2");
        println!("volume_name: {}", sb.volname);
        println!("block_size: {}", sb.bsize);
        println!("fragment_size: {}", sb.fsize);
        println!("frags_per_block: {}", sb.frag);
        println!("cylinder_groups: {}", sb.ncg);
        println!("inodes_per_group: {}", sb.ipg);
        println!("frags_per_group: {}", sb.fpg);
        println!("total_fragments: {}", sb.size);
        println!("data_fragments: {}", sb.dsize);
    }

    Ok(())
}
