//! Construction-time checks and configuration
//!
//! Every failure here is scoped to one method: the unit stays usable and
//! later methods still compile.

#![cfg(feature = "jit")]

use jbridge_compiler::{
    BridgeError, CompilationUnit, CompilerConfig, InstructionSet, JniCompiler, MethodTable, OptLevel, ResolvedMethod,
};
use jbridge_runtime::{ACC_NATIVE, ACC_PUBLIC, ACC_STATIC};

fn table() -> MethodTable {
    let mut methods = MethodTable::new();
    methods.insert(ResolvedMethod::from_descriptor(1, ACC_PUBLIC | ACC_STATIC | ACC_NATIVE, "LOk;", "ok", "(I)I").unwrap());
    methods.insert(ResolvedMethod::from_descriptor(2, ACC_PUBLIC, "LOk;", "managed", "()V").unwrap());
    methods.insert(ResolvedMethod {
        method_idx: 3,
        access_flags: ACC_NATIVE,
        class_descriptor: "LBad;".to_string(),
        name: "bad".to_string(),
        descriptor: "()V".to_string(),
        shorty: String::new(),
    });
    methods.insert(ResolvedMethod {
        method_idx: 4,
        access_flags: ACC_NATIVE,
        class_descriptor: "LBad;".to_string(),
        name: "worse".to_string(),
        descriptor: "(V)V".to_string(),
        shorty: "VV".to_string(),
    });
    methods
}

#[test]
fn test_unresolved_method() {
    let methods = table();
    let mut unit = CompilationUnit::jit(CompilerConfig::default()).unwrap();
    let err = JniCompiler::new(&mut unit, &methods, 42).err().unwrap();
    assert_eq!(err, BridgeError::UnresolvedMethod { method_idx: 42 });
}

#[test]
fn test_non_native_method() {
    let methods = table();
    let mut unit = CompilationUnit::jit(CompilerConfig::default()).unwrap();
    let err = JniCompiler::new(&mut unit, &methods, 2).err().unwrap();
    assert!(matches!(err, BridgeError::NotNative { ref name, .. } if name == "managed"));
}

#[test]
fn test_malformed_shorty_does_not_poison_the_unit() {
    let methods = table();
    let mut unit = CompilationUnit::jit(CompilerConfig::default()).unwrap();

    for idx in [3, 4] {
        let err = JniCompiler::new(&mut unit, &methods, idx).unwrap().compile().unwrap_err();
        assert!(matches!(err, BridgeError::MalformedDescriptor { .. }), "{:?}", err);
    }

    let ok = JniCompiler::new(&mut unit, &methods, 1).unwrap().compile().unwrap();
    assert_eq!(ok.method_idx, 1);
    unit.finalize().unwrap();
    assert!(!unit.entry_point(&ok).is_null());
}

#[test]
fn test_compiled_method_metadata() {
    let methods = table();
    let config = CompilerConfig { elf_index: 5, ..Default::default() };
    let mut unit = CompilationUnit::jit(config).unwrap();
    let compiled = JniCompiler::new(&mut unit, &methods, 1).unwrap().compile().unwrap();

    assert_eq!(compiled.elf_index, 5);
    assert_eq!(compiled.shorty, "II");
    assert_eq!(compiled.symbol, "jbridge_Java_Ok_ok__I");
    #[cfg(target_arch = "x86_64")]
    assert_eq!(compiled.instruction_set, InstructionSet::X86_64);
    #[cfg(target_arch = "aarch64")]
    assert_eq!(compiled.instruction_set, InstructionSet::Arm64);
    let _ = InstructionSet::Other;
}

#[test]
fn test_every_opt_level_compiles() {
    let methods = table();
    for opt_level in [OptLevel::None, OptLevel::Speed, OptLevel::SpeedAndSize] {
        let config = CompilerConfig { opt_level, verify: false, ..Default::default() };
        let mut unit = CompilationUnit::jit(config).unwrap();
        let compiled = JniCompiler::new(&mut unit, &methods, 1).unwrap().compile().unwrap();
        assert!(compiled.code_size > 0, "{:?}", opt_level);
    }
}

#[test]
fn test_config_from_toml() {
    let config: CompilerConfig = toml::from_str(
        r#"
        opt_level = "speed_and_size"
        elf_index = 3
        "#,
    )
    .unwrap();
    assert_eq!(config.opt_level, OptLevel::SpeedAndSize);
    assert_eq!(config.elf_index, 3);
    // Unset fields keep their defaults
    assert!(config.verify);
    assert!(config.is_pic);

    let empty: CompilerConfig = toml::from_str("").unwrap();
    assert_eq!(empty, CompilerConfig::default());
}
