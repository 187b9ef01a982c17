//! `jbridge object`: write bridges to a relocatable object file.

use std::path::Path;

use anyhow::Context;
use jbridge_compiler::{CompilationUnit, CompilerConfig, JniCompiler};

use crate::method_spec::{method_table, MethodSpec};

pub fn execute(specs: &[MethodSpec], output: &Path, config: &CompilerConfig) -> anyhow::Result<()> {
    let methods = method_table(specs)?;
    let name = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("bridges");
    let mut unit = CompilationUnit::object(config.clone(), name)?;

    let mut total = 0u32;
    for (idx, spec) in specs.iter().enumerate() {
        let compiled = JniCompiler::new(&mut unit, &methods, idx as u32)?
            .compile()
            .map_err(|e| anyhow::anyhow!("{}: {}", spec, e))?;
        log::info!("{} -> {} ({} bytes)", spec, compiled.symbol, compiled.code_size);
        total += compiled.code_size;
    }

    let bytes = unit.finish()?;
    std::fs::write(output, &bytes).with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "Wrote {} bridge(s), {} bytes of code, to {} ({} bytes)",
        specs.len(),
        total,
        output.display(),
        bytes.len()
    );
    Ok(())
}
