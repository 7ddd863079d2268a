//! `tierflow config` - manage the configuration file.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use tierflow::config::ConfigFile;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a commented configuration template.
    Init {
        /// Target path (defaults to the platform config directory).
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Print the parsed configuration.
    Show {
        /// Config file path.
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Print the default configuration path.
    Path,
}

pub fn run(args: ConfigArgs) -> Result<(), Box<dyn std::error::Error>> {
    match args.action {
        ConfigAction::Init { path, force } => {
            let path = resolve(path)?;
            if path.exists() && !force {
                return Err(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )
                .into());
            }
            ConfigFile::write_template(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        ConfigAction::Show { path } => {
            let path = resolve(path)?;
            let config = ConfigFile::load_or_default(&path)?;
            println!("Config file: {}", path.display());
            println!("{config:#?}");
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", ConfigFile::default_path()?.display());
            Ok(())
        }
    }
}

fn resolve(path: Option<PathBuf>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(path),
        None => Ok(ConfigFile::default_path()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_and_show() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");

        run(ConfigArgs {
            action: ConfigAction::Init {
                path: Some(path.clone()),
                force: false,
            },
        })
        .unwrap();
        assert!(path.exists());

        run(ConfigArgs {
            action: ConfigAction::Show { path: Some(path) },
        })
        .unwrap();
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[probe]\n").unwrap();

        let result = run(ConfigArgs {
            action: ConfigAction::Init {
                path: Some(path),
                force: false,
            },
        });
        assert!(result.is_err());
    }
}
