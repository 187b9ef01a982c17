//! Compiler settings: optional TOML file plus command-line overrides.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, ValueEnum};
use jbridge_compiler::{CompilerConfig, OptLevel};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OptLevelArg {
    None,
    Speed,
    SpeedAndSize,
}

impl From<OptLevelArg> for OptLevel {
    fn from(arg: OptLevelArg) -> Self {
        match arg {
            OptLevelArg::None => OptLevel::None,
            OptLevelArg::Speed => OptLevel::Speed,
            OptLevelArg::SpeedAndSize => OptLevel::SpeedAndSize,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct CompileArgs {
    /// TOML file with compiler settings
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Optimization level (overrides the config file)
    #[arg(long, value_enum)]
    pub opt_level: Option<OptLevelArg>,
    /// Skip IR verification
    #[arg(long)]
    pub no_verify: bool,
    /// ELF image index recorded in compiled methods
    #[arg(long)]
    pub elf_index: Option<u16>,
}

impl CompileArgs {
    /// Read the config file (if any) and apply the flag overrides.
    pub fn load(&self) -> anyhow::Result<CompilerConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => CompilerConfig::default(),
        };

        if let Some(level) = self.opt_level {
            config.opt_level = level.into();
        }
        if self.no_verify {
            config.verify = false;
        }
        if let Some(index) = self.elf_index {
            config.elf_index = index;
        }
        log::debug!("compiler config: {:?}", config);
        Ok(config)
    }
}
