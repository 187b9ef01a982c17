//! Compilation units and compiled-method artifacts
//!
//! A [`CompilationUnit`] owns one Cranelift module and everything reused
//! across the bridges compiled into it: the codegen context, the runtime
//! support imports and the target description. Two backends are provided:
//!
//! - [`CompilationUnit::jit`]: in-process code, runtime symbols bound to
//!   the reference runtime, bridges directly callable
//! - [`CompilationUnit::object`]: a relocatable object with the runtime
//!   symbols left as imports

use cranelift_codegen::ir::{self, AbiParam, FuncRef, Type};
use cranelift_codegen::isa::CallConv;
use cranelift_codegen::Context;
use cranelift_frontend::FunctionBuilderContext;
#[cfg(feature = "jit")]
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{FuncId, Linkage, Module};
#[cfg(feature = "aot")]
use cranelift_object::{ObjectBuilder, ObjectModule};
use rustc_hash::FxHashMap;
use target_lexicon::Architecture;

use jbridge_runtime::support;
use jbridge_runtime::RuntimeLayout;

use crate::config::CompilerConfig;
use crate::emitter::BridgeStage;
#[cfg(feature = "aot")]
use crate::error::BridgeError;
use crate::error::Result;

/// Instruction set a bridge was compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionSet {
    /// x86-64
    X86_64,
    /// AArch64
    Arm64,
    /// RISC-V 64
    Riscv64,
    /// Anything else Cranelift can target
    Other,
}

impl InstructionSet {
    /// Classify a target architecture.
    pub fn from_architecture(arch: Architecture) -> Self {
        match arch {
            Architecture::X86_64 => InstructionSet::X86_64,
            Architecture::Aarch64(_) => InstructionSet::Arm64,
            Architecture::Riscv64(_) => InstructionSet::Riscv64,
            _ => InstructionSet::Other,
        }
    }
}

impl std::fmt::Display for InstructionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InstructionSet::X86_64 => "x86_64",
            InstructionSet::Arm64 => "arm64",
            InstructionSet::Riscv64 => "riscv64",
            InstructionSet::Other => "other",
        };
        f.write_str(name)
    }
}

/// Runtime-support entry points a bridge calls by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeSupport {
    /// `() -> Thread*`
    GetCurrentThread,
    /// `(ShadowFrame*)`
    PushShadowFrame,
    /// `()`
    PopShadowFrame,
    /// `(Thread*, jobject) -> Object*`
    DecodeJObject,
}

impl RuntimeSupport {
    /// Every support entry point.
    pub const ALL: [RuntimeSupport; 4] = [
        RuntimeSupport::GetCurrentThread,
        RuntimeSupport::PushShadowFrame,
        RuntimeSupport::PopShadowFrame,
        RuntimeSupport::DecodeJObject,
    ];

    /// Imported symbol name.
    pub fn symbol(self) -> &'static str {
        match self {
            RuntimeSupport::GetCurrentThread => support::GET_CURRENT_THREAD,
            RuntimeSupport::PushShadowFrame => support::PUSH_SHADOW_FRAME,
            RuntimeSupport::PopShadowFrame => support::POP_SHADOW_FRAME,
            RuntimeSupport::DecodeJObject => support::DECODE_JOBJECT_IN_THREAD,
        }
    }

    /// Calling convention of the entry point.
    pub fn signature(self, pointer_type: Type, call_conv: CallConv) -> ir::Signature {
        let mut sig = ir::Signature::new(call_conv);
        let (params, returns) = match self {
            RuntimeSupport::GetCurrentThread => (0, 1),
            RuntimeSupport::PushShadowFrame => (1, 0),
            RuntimeSupport::PopShadowFrame => (0, 0),
            RuntimeSupport::DecodeJObject => (2, 1),
        };
        sig.params.extend((0..params).map(|_| AbiParam::new(pointer_type)));
        sig.returns.extend((0..returns).map(|_| AbiParam::new(pointer_type)));
        sig
    }
}

/// A bridge compiled into a unit
#[derive(Debug, Clone)]
pub struct CompiledMethod {
    /// Target instruction set
    pub instruction_set: InstructionSet,
    /// ELF image index from the unit's configuration
    pub elf_index: u16,
    /// Index of the bridged method
    pub method_idx: u32,
    /// Function id inside the unit's module
    pub func_id: FuncId,
    /// Exported symbol
    pub symbol: String,
    /// Shorty of the bridged method
    pub shorty: String,
    /// Shadow frame slot count
    pub slot_count: u32,
    /// Machine code size in bytes
    pub code_size: u32,
    /// Pipeline stages passed, in order
    pub stages: Vec<BridgeStage>,
    /// Verified IR, before backend optimization
    pub function: ir::Function,
}

/// One Cranelift module plus the state shared by the bridges compiled into it.
///
/// A unit is used from one thread at a time; compile concurrently by
/// giving each thread its own unit.
pub struct CompilationUnit<M: Module> {
    module: M,
    config: CompilerConfig,
    layout: RuntimeLayout,
    ctx: Context,
    builder_ctx: FunctionBuilderContext,
    runtime: FxHashMap<RuntimeSupport, FuncId>,
}

impl<M: Module> CompilationUnit<M> {
    fn with_module(module: M, config: CompilerConfig) -> Self {
        let ctx = module.make_context();
        CompilationUnit {
            module,
            config,
            layout: RuntimeLayout::HOST,
            ctx,
            builder_ctx: FunctionBuilderContext::new(),
            runtime: FxHashMap::default(),
        }
    }

    /// Replace the runtime layout (defaults to [`RuntimeLayout::HOST`]).
    pub fn with_layout(mut self, layout: RuntimeLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Runtime layout in use.
    pub fn layout(&self) -> &RuntimeLayout {
        &self.layout
    }

    /// Native pointer type of the target.
    pub fn pointer_type(&self) -> Type {
        self.module.target_config().pointer_type()
    }

    /// Default calling convention of the target.
    pub fn call_conv(&self) -> CallConv {
        self.module.isa().default_call_conv()
    }

    /// Instruction set of the target.
    pub fn instruction_set(&self) -> InstructionSet {
        InstructionSet::from_architecture(self.module.isa().triple().architecture)
    }

    /// ISA flags, for verification.
    pub fn isa_flags(&self) -> &cranelift_codegen::settings::Flags {
        self.module.isa().flags()
    }

    /// Declare an exported bridge.
    pub fn declare_bridge(&mut self, symbol: &str, sig: &ir::Signature) -> Result<FuncId> {
        Ok(self.module.declare_function(symbol, Linkage::Export, sig)?)
    }

    /// Import a runtime support entry point into `func`, declaring it in
    /// the module on first use.
    pub fn import_runtime(&mut self, support: RuntimeSupport, func: &mut ir::Function) -> Result<FuncRef> {
        let id = match self.runtime.get(&support) {
            Some(&id) => id,
            None => {
                let sig = support.signature(self.pointer_type(), self.call_conv());
                let id = self.module.declare_function(support.symbol(), Linkage::Import, &sig)?;
                self.runtime.insert(support, id);
                id
            }
        };
        Ok(self.module.declare_func_in_func(id, func))
    }

    /// Function builder context, reused across bridges.
    pub(crate) fn builder_ctx(&mut self) -> &mut FunctionBuilderContext {
        &mut self.builder_ctx
    }

    /// Compile and define `func` as the body of `func_id`, returning the
    /// machine code size.
    pub fn define(&mut self, func_id: FuncId, func: ir::Function) -> Result<u32> {
        self.ctx.func = func;
        let defined = self.module.define_function(func_id, &mut self.ctx);
        let code_size = self
            .ctx
            .compiled_code()
            .map(|code| code.code_buffer().len() as u32)
            .unwrap_or(0);
        self.module.clear_context(&mut self.ctx);
        defined?;
        Ok(code_size)
    }
}

// =============================================================================
// JIT backend
// =============================================================================

#[cfg(feature = "jit")]
impl CompilationUnit<JITModule> {
    /// In-process unit with the runtime symbols bound to `jbridge-runtime`.
    pub fn jit(config: CompilerConfig) -> Result<Self> {
        Self::jit_with_symbols(config, support::symbols())
    }

    /// In-process unit with caller-supplied runtime symbols.
    pub fn jit_with_symbols<'s>(
        config: CompilerConfig,
        symbols: impl IntoIterator<Item = (&'s str, *const u8)>,
    ) -> Result<Self> {
        let isa = config.host_isa(false)?;
        let mut builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());
        for (name, ptr) in symbols {
            builder.symbol(name, ptr);
        }
        log::debug!("created JIT compilation unit");
        Ok(Self::with_module(JITModule::new(builder), config))
    }

    /// Make every defined bridge executable.
    pub fn finalize(&mut self) -> Result<()> {
        Ok(self.module.finalize_definitions()?)
    }

    /// Code address of a compiled bridge. Only valid after [`finalize`](Self::finalize).
    pub fn entry_point(&self, method: &CompiledMethod) -> *const u8 {
        self.module.get_finalized_function(method.func_id)
    }
}

// =============================================================================
// Object backend
// =============================================================================

#[cfg(feature = "aot")]
impl CompilationUnit<ObjectModule> {
    /// Unit that emits a relocatable object named `name`.
    pub fn object(config: CompilerConfig, name: &str) -> Result<Self> {
        let isa = config.host_isa(config.is_pic)?;
        let builder = ObjectBuilder::new(isa, name, cranelift_module::default_libcall_names())?;
        log::debug!("created object compilation unit {}", name);
        Ok(Self::with_module(ObjectModule::new(builder), config))
    }

    /// Emit the object file.
    pub fn finish(self) -> Result<Vec<u8>> {
        self.module
            .finish()
            .emit()
            .map_err(|e| BridgeError::Module(format!("Failed to emit object: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_codegen::ir::types;

    #[test]
    fn test_instruction_set_classification() {
        assert_eq!(InstructionSet::from_architecture(Architecture::X86_64), InstructionSet::X86_64);
        assert_eq!(
            InstructionSet::from_architecture(Architecture::Aarch64(target_lexicon::Aarch64Architecture::Aarch64)),
            InstructionSet::Arm64
        );
        assert_eq!(InstructionSet::X86_64.to_string(), "x86_64");
    }

    #[test]
    fn test_runtime_signatures() {
        let cc = CallConv::SystemV;
        let sig = RuntimeSupport::DecodeJObject.signature(types::I64, cc);
        assert_eq!(sig.params.len(), 2);
        assert_eq!(sig.returns.len(), 1);
        let sig = RuntimeSupport::PopShadowFrame.signature(types::I64, cc);
        assert!(sig.params.is_empty() && sig.returns.is_empty());
    }

    #[test]
    fn test_runtime_symbols_match_support_table() {
        let exported: Vec<_> = support::symbols().iter().map(|(name, _)| *name).collect();
        for support in RuntimeSupport::ALL {
            assert!(exported.contains(&support.symbol()), "{:?}", support);
        }
    }

    #[cfg(feature = "jit")]
    #[test]
    fn test_import_runtime_declares_once() {
        let mut unit = CompilationUnit::jit(CompilerConfig::default()).unwrap();
        let mut f1 = ir::Function::new();
        let mut f2 = ir::Function::new();
        unit.import_runtime(RuntimeSupport::PushShadowFrame, &mut f1).unwrap();
        unit.import_runtime(RuntimeSupport::PushShadowFrame, &mut f2).unwrap();
        assert_eq!(unit.runtime.len(), 1);
    }
}
