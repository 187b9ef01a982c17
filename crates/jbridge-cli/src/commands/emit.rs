//! `jbridge emit`: print bridge IR.

use jbridge_compiler::{CompilationUnit, CompilerConfig, JniCompiler};

use crate::method_spec::{method_table, MethodSpec};

pub fn execute(specs: &[MethodSpec], config: &CompilerConfig) -> anyhow::Result<()> {
    let methods = method_table(specs)?;
    let mut unit = CompilationUnit::object(config.clone(), "jbridge_emit")?;

    for (idx, spec) in specs.iter().enumerate() {
        let compiled = JniCompiler::new(&mut unit, &methods, idx as u32)?
            .compile()
            .map_err(|e| anyhow::anyhow!("{}: {}", spec, e))?;

        println!(
            "; {} shorty={} slots={} isa={} size={}",
            compiled.symbol, compiled.shorty, compiled.slot_count, compiled.instruction_set, compiled.code_size
        );
        println!("{}", compiled.function.display());
    }
    Ok(())
}
