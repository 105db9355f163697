use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for lumen")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// fmt, clippy, tests, docs and scene validation
    Check,
    Fmt,
    Clippy,
    Test,
    Doc,
    Build,
    /// Validate every scene file under scenes/ with lumen-cli
    Scenes {
        #[arg(long, default_value = "scenes")]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Commands::Check => {
            cargo(&["fmt", "--all", "--", "--check"], "fmt check")?;
            clippy()?;
            cargo(&["test", "--workspace"], "tests")?;
            cargo(&["doc", "--workspace", "--no-deps"], "doc build")?;
            scenes(Path::new("scenes"))?;
        }
        Commands::Fmt => cargo(&["fmt", "--all", "--", "--check"], "fmt check")?,
        Commands::Clippy => clippy()?,
        Commands::Test => cargo(&["test", "--workspace"], "tests")?,
        Commands::Doc => cargo(&["doc", "--workspace", "--no-deps"], "doc build")?,
        Commands::Build => cargo(&["build", "--workspace"], "build")?,
        Commands::Scenes { dir } => scenes(&dir)?,
    }
    Ok(())
}

/// Run `cargo <args>`, failing with `what` in the message.
fn cargo(args: &[&str], what: &str) -> Result<()> {
    println!("==> cargo {}", args.join(" "));
    let status = Command::new("cargo")
        .args(args)
        .status()
        .with_context(|| format!("spawning cargo for {what}"))?;
    if !status.success() {
        bail!("{what} failed ({status})");
    }
    Ok(())
}

fn clippy() -> Result<()> {
    cargo(
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        "clippy",
    )
}

fn is_scene_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json" | "yaml" | "yml")
    )
}

fn scenes(dir: &Path) -> Result<()> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_scene_file(path))
        .collect();
    files.sort();

    for file in &files {
        let file = file.to_string_lossy();
        cargo(
            &["run", "--quiet", "-p", "lumen-cli", "--", "validate", &file],
            &format!("validating {file}"),
        )?;
    }
    println!("{} scene file(s) valid", files.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_files_are_picked_by_extension() {
        assert!(is_scene_file(Path::new("scenes/gallery.yaml")));
        assert!(is_scene_file(Path::new("a.yml")));
        assert!(is_scene_file(Path::new("a.json")));
        assert!(!is_scene_file(Path::new("notes.md")));
        assert!(!is_scene_file(Path::new("scenes")));
    }
}
