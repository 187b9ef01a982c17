//! Compiler configuration and target ISA setup

use std::sync::Arc;

use cranelift_codegen::isa::TargetIsa;
use cranelift_codegen::settings::{self, Configurable};
use serde::Deserialize;

use crate::error::{BridgeError, Result};

/// Cranelift optimization level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptLevel {
    /// No optimization
    None,
    /// Optimize for speed (default)
    #[default]
    Speed,
    /// Optimize for speed and size
    SpeedAndSize,
}

impl OptLevel {
    fn as_setting(self) -> &'static str {
        match self {
            OptLevel::None => "none",
            OptLevel::Speed => "speed",
            OptLevel::SpeedAndSize => "speed_and_size",
        }
    }
}

/// Configuration for a compilation unit
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Cranelift optimization level (default: speed)
    pub opt_level: OptLevel,
    /// Run the IR verifier on every bridge before defining it (default: true)
    pub verify: bool,
    /// Emit position-independent code for object output (default: true)
    pub is_pic: bool,
    /// Index of the ELF image the compiled bridges are packaged into (default: 0)
    pub elf_index: u16,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            opt_level: OptLevel::Speed,
            verify: true,
            is_pic: true,
            elf_index: 0,
        }
    }
}

impl CompilerConfig {
    /// Build an ISA for the host machine.
    ///
    /// `is_pic` is passed separately because in-process JIT code must not
    /// be position independent regardless of the configured object setting.
    pub fn host_isa(&self, is_pic: bool) -> Result<Arc<dyn TargetIsa>> {
        let mut flag_builder = settings::builder();
        flag_builder.set("opt_level", self.opt_level.as_setting()).map_err(|e|
            BridgeError::Isa(format!("Failed to set opt_level: {}", e))
        )?;
        flag_builder.set("is_pic", if is_pic { "true" } else { "false" }).map_err(|e|
            BridgeError::Isa(format!("Failed to set is_pic: {}", e))
        )?;
        flag_builder.set("use_colocated_libcalls", "false").map_err(|e|
            BridgeError::Isa(format!("Failed to set use_colocated_libcalls: {}", e))
        )?;
        flag_builder.set("enable_verifier", if self.verify { "true" } else { "false" }).map_err(|e|
            BridgeError::Isa(format!("Failed to set enable_verifier: {}", e))
        )?;

        let flags = settings::Flags::new(flag_builder);

        cranelift_native::builder()
            .map_err(|e| BridgeError::Isa(format!("Failed to create native ISA builder: {}", e)))?
            .finish(flags)
            .map_err(|e| BridgeError::Isa(format!("Failed to finish ISA: {}", e)))
    }
}
