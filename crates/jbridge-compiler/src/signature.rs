//! Shorty descriptors and bridge/callee signatures
//!
//! A shorty is the compact form of a method descriptor: the first character
//! is the return type, the rest are the argument types, and every reference
//! type collapses to `L`. `(Ljava/lang/String;[II)V` has the shorty `VLLI`.
//!
//! From one shorty two function types are derived:
//!
//! ```text
//! bridge:  ret (method, [this,] args...)        called from managed code
//! callee:  ret (env, this-or-class, args...)    the registered native method
//! ```

use cranelift_codegen::ir::{self, types, AbiParam, Type};
use cranelift_codegen::isa::CallConv;

use crate::error::{BridgeError, Result};

/// JNI value type of a shorty character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JType {
    /// `V`
    Void,
    /// `Z` (`jboolean`, unsigned 8-bit)
    Boolean,
    /// `B` (`jbyte`)
    Byte,
    /// `C` (`jchar`, unsigned 16-bit)
    Char,
    /// `S` (`jshort`)
    Short,
    /// `I` (`jint`)
    Int,
    /// `J` (`jlong`)
    Long,
    /// `F` (`jfloat`)
    Float,
    /// `D` (`jdouble`)
    Double,
    /// `L` (any reference)
    Object,
}

impl JType {
    /// Parse a shorty character.
    pub fn from_shorty_char(c: char) -> Option<Self> {
        Some(match c {
            'V' => JType::Void,
            'Z' => JType::Boolean,
            'B' => JType::Byte,
            'C' => JType::Char,
            'S' => JType::Short,
            'I' => JType::Int,
            'J' => JType::Long,
            'F' => JType::Float,
            'D' => JType::Double,
            'L' => JType::Object,
            _ => return None,
        })
    }

    /// Shorty character for this type.
    pub fn shorty_char(self) -> char {
        match self {
            JType::Void => 'V',
            JType::Boolean => 'Z',
            JType::Byte => 'B',
            JType::Char => 'C',
            JType::Short => 'S',
            JType::Int => 'I',
            JType::Long => 'J',
            JType::Float => 'F',
            JType::Double => 'D',
            JType::Object => 'L',
        }
    }

    /// Whether values of this type are object references.
    #[inline]
    pub fn is_object(self) -> bool {
        self == JType::Object
    }

    /// Cranelift type of this value (`None` for void).
    pub fn ir_type(self, pointer_type: Type) -> Option<Type> {
        Some(match self {
            JType::Void => return None,
            JType::Boolean | JType::Byte => types::I8,
            JType::Char | JType::Short => types::I16,
            JType::Int => types::I32,
            JType::Long => types::I64,
            JType::Float => types::F32,
            JType::Double => types::F64,
            JType::Object => pointer_type,
        })
    }

    /// ABI parameter for this type, widened the way C expects sub-word
    /// integers (`jboolean`/`jchar` zero-extended, `jbyte`/`jshort`
    /// sign-extended).
    pub fn abi_param(self, pointer_type: Type) -> Option<AbiParam> {
        let param = AbiParam::new(self.ir_type(pointer_type)?);
        Some(match self {
            JType::Boolean | JType::Char => param.uext(),
            JType::Byte | JType::Short => param.sext(),
            _ => param,
        })
    }
}

/// Which of the two function types to derive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureForm {
    /// The generated bridge, called from managed code
    Bridge,
    /// The native method the bridge calls
    Callee,
}

/// One formal parameter of a bridge or callee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    /// `Method*` of the method being bridged
    Method,
    /// `JNIEnv*`
    Env,
    /// Receiver of an instance method
    This,
    /// Declaring class handle passed to a static native method
    Class,
    /// A declared argument
    Arg(JType),
}

impl Param {
    fn abi_param(self, pointer_type: Type) -> AbiParam {
        match self {
            Param::Method | Param::Env | Param::This | Param::Class => AbiParam::new(pointer_type),
            // Void arguments are rejected while parsing
            Param::Arg(t) => t.abi_param(pointer_type).unwrap_or(AbiParam::new(pointer_type)),
        }
    }
}

/// Ordered formal parameters and return type of one function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionType {
    /// Formal parameters in call order
    pub params: Vec<Param>,
    /// Return type
    pub ret: JType,
}

impl FunctionType {
    /// Lower to a Cranelift signature.
    pub fn to_ir_signature(&self, pointer_type: Type, call_conv: CallConv) -> ir::Signature {
        let mut sig = ir::Signature::new(call_conv);
        sig.params.extend(self.params.iter().map(|p| p.abi_param(pointer_type)));
        if let Some(ret) = self.ret.abi_param(pointer_type) {
            sig.returns.push(ret);
        }
        sig
    }
}

/// Parsed shorty plus the static flag; read-only once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSignature {
    shorty: String,
    ret: JType,
    args: Vec<JType>,
    is_static: bool,
}

impl BridgeSignature {
    /// Parse a shorty.
    ///
    /// Fails if the shorty is empty, contains an unknown character, or has
    /// `V` in an argument position.
    pub fn parse(shorty: &str, is_static: bool) -> Result<Self> {
        let mut chars = shorty.chars();
        let ret_char = chars
            .next()
            .ok_or_else(|| BridgeError::malformed(shorty, "shorty must contain a return type"))?;
        let ret = JType::from_shorty_char(ret_char).ok_or_else(|| {
            BridgeError::malformed(shorty, format!("unknown return type '{}'", ret_char))
        })?;

        let mut args = Vec::with_capacity(shorty.len().saturating_sub(1));
        for (pos, c) in chars.enumerate() {
            match JType::from_shorty_char(c) {
                Some(JType::Void) => {
                    return Err(BridgeError::malformed(shorty, format!("void argument at position {}", pos + 1)));
                }
                Some(t) => args.push(t),
                None => {
                    return Err(BridgeError::malformed(
                        shorty,
                        format!("unknown type '{}' at position {}", c, pos + 1),
                    ));
                }
            }
        }

        Ok(BridgeSignature {
            shorty: shorty.to_string(),
            ret,
            args,
            is_static,
        })
    }

    /// The shorty this signature was parsed from.
    pub fn shorty(&self) -> &str {
        &self.shorty
    }

    /// Return type.
    pub fn return_type(&self) -> JType {
        self.ret
    }

    /// Declared argument types (without `this`).
    pub fn args(&self) -> &[JType] {
        &self.args
    }

    /// Whether the method is static.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Types of the bridge's incoming values after the method pointer:
    /// `this` for instance methods, then the declared arguments.
    pub fn incoming(&self) -> impl Iterator<Item = JType> + '_ {
        let this = (!self.is_static).then_some(JType::Object);
        this.into_iter().chain(self.args.iter().copied())
    }

    /// Number of object-typed bridge arguments, counting `this`.
    pub fn object_arg_count(&self) -> u32 {
        self.incoming().filter(|t| t.is_object()).count() as u32
    }

    /// Derive the bridge or callee function type.
    pub fn function_type(&self, form: SignatureForm) -> FunctionType {
        let mut params = Vec::with_capacity(self.args.len() + 2);
        match form {
            SignatureForm::Bridge => {
                params.push(Param::Method);
                if !self.is_static {
                    params.push(Param::This);
                }
            }
            SignatureForm::Callee => {
                params.push(Param::Env);
                params.push(if self.is_static { Param::Class } else { Param::This });
            }
        }
        params.extend(self.args.iter().map(|&t| Param::Arg(t)));
        FunctionType { params, ret: self.ret }
    }
}

/// Lowers bridge signatures to Cranelift signatures for one target
#[derive(Debug, Clone, Copy)]
pub struct SignatureBuilder {
    pointer_type: Type,
    call_conv: CallConv,
}

impl SignatureBuilder {
    /// Create a builder for the given pointer type and calling convention.
    pub fn new(pointer_type: Type, call_conv: CallConv) -> Self {
        SignatureBuilder { pointer_type, call_conv }
    }

    /// Parse `shorty` and lower one of its forms in a single step.
    pub fn from_shorty(&self, shorty: &str, is_static: bool, form: SignatureForm) -> Result<ir::Signature> {
        Ok(self.build(&BridgeSignature::parse(shorty, is_static)?, form))
    }

    /// Lower one form of a parsed signature.
    pub fn build(&self, sig: &BridgeSignature, form: SignatureForm) -> ir::Signature {
        sig.function_type(form).to_ir_signature(self.pointer_type, self.call_conv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shorty() {
        let sig = BridgeSignature::parse("ILJZ", false).unwrap();
        assert_eq!(sig.return_type(), JType::Int);
        assert_eq!(sig.args(), &[JType::Object, JType::Long, JType::Boolean]);
        assert_eq!(sig.object_arg_count(), 2); // this + one L
        assert_eq!(sig.shorty(), "ILJZ");
    }

    #[test]
    fn test_empty_shorty_is_malformed() {
        let err = BridgeSignature::parse("", true).unwrap_err();
        assert!(matches!(err, BridgeError::MalformedDescriptor { .. }));
    }

    #[test]
    fn test_bad_characters_are_malformed() {
        assert!(BridgeSignature::parse("IX", true).is_err());
        assert!(BridgeSignature::parse("Q", true).is_err());
        assert!(BridgeSignature::parse("IVI", true).is_err());
        // Void is fine as a return type
        assert!(BridgeSignature::parse("V", true).is_ok());
    }

    #[test]
    fn test_bridge_form() {
        let stat = BridgeSignature::parse("III", true).unwrap();
        assert_eq!(
            stat.function_type(SignatureForm::Bridge).params,
            vec![Param::Method, Param::Arg(JType::Int), Param::Arg(JType::Int)]
        );

        let inst = BridgeSignature::parse("LL", false).unwrap();
        assert_eq!(
            inst.function_type(SignatureForm::Bridge).params,
            vec![Param::Method, Param::This, Param::Arg(JType::Object)]
        );
    }

    #[test]
    fn test_callee_form() {
        let stat = BridgeSignature::parse("III", true).unwrap();
        let ft = stat.function_type(SignatureForm::Callee);
        assert_eq!(ft.params, vec![Param::Env, Param::Class, Param::Arg(JType::Int), Param::Arg(JType::Int)]);
        assert_eq!(ft.ret, JType::Int);

        let inst = BridgeSignature::parse("V", false).unwrap();
        assert_eq!(inst.function_type(SignatureForm::Callee).params, vec![Param::Env, Param::This]);
    }

    #[test]
    fn test_ir_signature_types() {
        let builder = SignatureBuilder::new(types::I64, CallConv::SystemV);
        let sig = builder.from_shorty("ZBCSJFDL", true, SignatureForm::Callee).unwrap();

        let param_types: Vec<_> = sig.params.iter().map(|p| p.value_type).collect();
        assert_eq!(
            param_types,
            vec![types::I64, types::I64, types::I8, types::I16, types::I16, types::I64, types::F32, types::F64, types::I64]
        );
        assert_eq!(sig.params[2].extension, ir::ArgumentExtension::Sext);
        assert_eq!(sig.params[3].extension, ir::ArgumentExtension::Uext);
        assert_eq!(sig.returns.len(), 1);
        assert_eq!(sig.returns[0].value_type, types::I8);
        assert_eq!(sig.returns[0].extension, ir::ArgumentExtension::Uext);
    }

    #[test]
    fn test_void_return_has_no_results() {
        let builder = SignatureBuilder::new(types::I64, CallConv::SystemV);
        let sig = builder.from_shorty("V", false, SignatureForm::Bridge).unwrap();
        assert!(sig.returns.is_empty());
        assert_eq!(sig.params.len(), 2);
    }

    #[test]
    fn test_shorty_chars_round_trip() {
        for c in "VZBCSIJFDL".chars() {
            assert_eq!(JType::from_shorty_char(c).unwrap().shorty_char(), c);
        }
    }
}
