use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;

#[derive(Args, Debug)]
pub struct ManArgs {
    /// Output directory (default: dist/share/man/man1)
    #[arg(long = "out-dir", default_value = "dist/share/man/man1")]
    pub out_dir: PathBuf,
}

pub fn cmd_man(args: ManArgs) -> Result<(), String> {
    let out_dir = crate::output_dir(&args.out_dir)?;
    let cmd = keeplog::command();
    let bin_name = cmd.get_name().to_string();

    write_page(cmd.clone(), &out_dir.join(format!("{bin_name}.1")))?;

    // One page per subcommand: keeplog-bump.1, keeplog-query.1, ...
    for subcommand in cmd.get_subcommands() {
        let page = format!("{bin_name}-{}.1", subcommand.get_name());
        write_page(subcommand.clone(), &out_dir.join(page))?;
    }

    Ok(())
}

fn write_page(cmd: clap::Command, path: &Path) -> Result<(), String> {
    let mut buffer: Vec<u8> = Vec::new();
    clap_mangen::Man::new(cmd)
        .render(&mut buffer)
        .map_err(|e| format!("render {}: {e}", path.display()))?;
    fs::write(path, buffer).map_err(|e| format!("{}: {e}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}
