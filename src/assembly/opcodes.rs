//! The CIL opcode set (ECMA-335 Partition III).
//!
//! Every opcode is a variant of [`OpCode`]. The table below records, per opcode, its encoding
//! (optional `0xFE` prefix plus the opcode byte), its mnemonic, the kind of operand that follows
//! it in the byte stream, how it affects control flow, and how many values it pushes at most.
//!
//! ```rust
//! use cilsplice::assembly::{FlowType, OpCode, OperandType};
//!
//! assert_eq!(OpCode::Call.mnemonic(), "call");
//! assert_eq!(OpCode::Call.operand_type(), OperandType::Token);
//! assert_eq!(OpCode::BrS.flow(), FlowType::UnconditionalBranch);
//! assert_eq!(OpCode::from_bytes(0xFE, 0x01), Some(OpCode::Ceq));
//! ```

use strum::{EnumIter, IntoEnumIterator};

/// Operand encoding that follows an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand
    None,
    /// Signed 8-bit immediate
    Int8,
    /// Unsigned 8-bit immediate (`unaligned.`, `no.`)
    UInt8,
    /// Signed 32-bit immediate
    Int32,
    /// Signed 64-bit immediate
    Int64,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
    /// Metadata token
    Token,
    /// `#US` heap token, kept inline as a string in the object model
    String,
    /// 8-bit branch displacement
    ShortBranch,
    /// 32-bit branch displacement
    Branch,
    /// Count followed by 32-bit displacements
    Switch,
    /// 8-bit argument index
    ShortArgument,
    /// 16-bit argument index
    Argument,
    /// 8-bit local index
    ShortLocal,
    /// 16-bit local index
    Local,
}

impl OperandType {
    /// Encoded operand size in bytes. `None` for switch tables, whose size depends on the case
    /// count.
    #[must_use]
    pub fn size(&self) -> Option<usize> {
        match self {
            OperandType::None => Some(0),
            OperandType::Int8
            | OperandType::UInt8
            | OperandType::ShortBranch
            | OperandType::ShortArgument
            | OperandType::ShortLocal => Some(1),
            OperandType::Argument | OperandType::Local => Some(2),
            OperandType::Int32
            | OperandType::Float32
            | OperandType::Token
            | OperandType::String
            | OperandType::Branch => Some(4),
            OperandType::Int64 | OperandType::Float64 => Some(8),
            OperandType::Switch => None,
        }
    }
}

/// Control flow behaviour of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Falls through to the next instruction
    Sequential,
    /// May branch or fall through
    ConditionalBranch,
    /// Always branches
    UnconditionalBranch,
    /// Calls a method and continues
    Call,
    /// Returns from the method
    Return,
    /// Multi way branch
    Switch,
    /// Raises an exception
    Throw,
    /// Ends a finally, fault or filter block
    EndFinally,
    /// Leaves a protected region
    Leave,
    /// Prefix that modifies the following instruction
    Meta,
}

macro_rules! opcodes {
    ($(($variant:ident, $mnemonic:literal, $prefix:literal, $code:literal, $operand:ident, $flow:ident, $pushes:literal)),* $(,)?) => {
        /// A CIL opcode.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
        pub enum OpCode {
            $(
                #[doc = concat!("`", $mnemonic, "`")]
                $variant,
            )*
        }

        impl OpCode {
            /// Textual mnemonic as used by ILDasm
            #[must_use]
            pub fn mnemonic(&self) -> &'static str {
                match self {
                    $(OpCode::$variant => $mnemonic,)*
                }
            }

            /// Prefix byte, `0xFE` for two byte opcodes and `0` otherwise
            #[must_use]
            pub fn prefix(&self) -> u8 {
                match self {
                    $(OpCode::$variant => $prefix,)*
                }
            }

            /// The opcode byte that follows the optional prefix
            #[must_use]
            pub fn code(&self) -> u8 {
                match self {
                    $(OpCode::$variant => $code,)*
                }
            }

            /// Kind of operand that follows in the byte stream
            #[must_use]
            pub fn operand_type(&self) -> OperandType {
                match self {
                    $(OpCode::$variant => OperandType::$operand,)*
                }
            }

            /// Control flow behaviour
            #[must_use]
            pub fn flow(&self) -> FlowType {
                match self {
                    $(OpCode::$variant => FlowType::$flow,)*
                }
            }

            /// Upper bound of values pushed onto the evaluation stack
            #[must_use]
            pub fn pushes(&self) -> u16 {
                match self {
                    $(OpCode::$variant => $pushes,)*
                }
            }

            /// Look an opcode up by its encoding. `prefix` is `0` for single byte opcodes.
            #[must_use]
            pub fn from_bytes(prefix: u8, code: u8) -> Option<OpCode> {
                match (prefix, code) {
                    $(($prefix, $code) => Some(OpCode::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    (Nop, "nop", 0x00, 0x00, None, Sequential, 0),
    (Break, "break", 0x00, 0x01, None, Sequential, 0),
    (Ldarg0, "ldarg.0", 0x00, 0x02, None, Sequential, 1),
    (Ldarg1, "ldarg.1", 0x00, 0x03, None, Sequential, 1),
    (Ldarg2, "ldarg.2", 0x00, 0x04, None, Sequential, 1),
    (Ldarg3, "ldarg.3", 0x00, 0x05, None, Sequential, 1),
    (Ldloc0, "ldloc.0", 0x00, 0x06, None, Sequential, 1),
    (Ldloc1, "ldloc.1", 0x00, 0x07, None, Sequential, 1),
    (Ldloc2, "ldloc.2", 0x00, 0x08, None, Sequential, 1),
    (Ldloc3, "ldloc.3", 0x00, 0x09, None, Sequential, 1),
    (Stloc0, "stloc.0", 0x00, 0x0A, None, Sequential, 0),
    (Stloc1, "stloc.1", 0x00, 0x0B, None, Sequential, 0),
    (Stloc2, "stloc.2", 0x00, 0x0C, None, Sequential, 0),
    (Stloc3, "stloc.3", 0x00, 0x0D, None, Sequential, 0),
    (LdargS, "ldarg.s", 0x00, 0x0E, ShortArgument, Sequential, 1),
    (LdargaS, "ldarga.s", 0x00, 0x0F, ShortArgument, Sequential, 1),
    (StargS, "starg.s", 0x00, 0x10, ShortArgument, Sequential, 0),
    (LdlocS, "ldloc.s", 0x00, 0x11, ShortLocal, Sequential, 1),
    (LdlocaS, "ldloca.s", 0x00, 0x12, ShortLocal, Sequential, 1),
    (StlocS, "stloc.s", 0x00, 0x13, ShortLocal, Sequential, 0),
    (Ldnull, "ldnull", 0x00, 0x14, None, Sequential, 1),
    (LdcI4M1, "ldc.i4.m1", 0x00, 0x15, None, Sequential, 1),
    (LdcI40, "ldc.i4.0", 0x00, 0x16, None, Sequential, 1),
    (LdcI41, "ldc.i4.1", 0x00, 0x17, None, Sequential, 1),
    (LdcI42, "ldc.i4.2", 0x00, 0x18, None, Sequential, 1),
    (LdcI43, "ldc.i4.3", 0x00, 0x19, None, Sequential, 1),
    (LdcI44, "ldc.i4.4", 0x00, 0x1A, None, Sequential, 1),
    (LdcI45, "ldc.i4.5", 0x00, 0x1B, None, Sequential, 1),
    (LdcI46, "ldc.i4.6", 0x00, 0x1C, None, Sequential, 1),
    (LdcI47, "ldc.i4.7", 0x00, 0x1D, None, Sequential, 1),
    (LdcI48, "ldc.i4.8", 0x00, 0x1E, None, Sequential, 1),
    (LdcI4S, "ldc.i4.s", 0x00, 0x1F, Int8, Sequential, 1),
    (LdcI4, "ldc.i4", 0x00, 0x20, Int32, Sequential, 1),
    (LdcI8, "ldc.i8", 0x00, 0x21, Int64, Sequential, 1),
    (LdcR4, "ldc.r4", 0x00, 0x22, Float32, Sequential, 1),
    (LdcR8, "ldc.r8", 0x00, 0x23, Float64, Sequential, 1),
    (Dup, "dup", 0x00, 0x25, None, Sequential, 2),
    (Pop, "pop", 0x00, 0x26, None, Sequential, 0),
    (Jmp, "jmp", 0x00, 0x27, Token, Call, 0),
    (Call, "call", 0x00, 0x28, Token, Call, 1),
    (Calli, "calli", 0x00, 0x29, Token, Call, 1),
    (Ret, "ret", 0x00, 0x2A, None, Return, 0),
    (BrS, "br.s", 0x00, 0x2B, ShortBranch, UnconditionalBranch, 0),
    (BrfalseS, "brfalse.s", 0x00, 0x2C, ShortBranch, ConditionalBranch, 0),
    (BrtrueS, "brtrue.s", 0x00, 0x2D, ShortBranch, ConditionalBranch, 0),
    (BeqS, "beq.s", 0x00, 0x2E, ShortBranch, ConditionalBranch, 0),
    (BgeS, "bge.s", 0x00, 0x2F, ShortBranch, ConditionalBranch, 0),
    (BgtS, "bgt.s", 0x00, 0x30, ShortBranch, ConditionalBranch, 0),
    (BleS, "ble.s", 0x00, 0x31, ShortBranch, ConditionalBranch, 0),
    (BltS, "blt.s", 0x00, 0x32, ShortBranch, ConditionalBranch, 0),
    (BneUnS, "bne.un.s", 0x00, 0x33, ShortBranch, ConditionalBranch, 0),
    (BgeUnS, "bge.un.s", 0x00, 0x34, ShortBranch, ConditionalBranch, 0),
    (BgtUnS, "bgt.un.s", 0x00, 0x35, ShortBranch, ConditionalBranch, 0),
    (BleUnS, "ble.un.s", 0x00, 0x36, ShortBranch, ConditionalBranch, 0),
    (BltUnS, "blt.un.s", 0x00, 0x37, ShortBranch, ConditionalBranch, 0),
    (Br, "br", 0x00, 0x38, Branch, UnconditionalBranch, 0),
    (Brfalse, "brfalse", 0x00, 0x39, Branch, ConditionalBranch, 0),
    (Brtrue, "brtrue", 0x00, 0x3A, Branch, ConditionalBranch, 0),
    (Beq, "beq", 0x00, 0x3B, Branch, ConditionalBranch, 0),
    (Bge, "bge", 0x00, 0x3C, Branch, ConditionalBranch, 0),
    (Bgt, "bgt", 0x00, 0x3D, Branch, ConditionalBranch, 0),
    (Ble, "ble", 0x00, 0x3E, Branch, ConditionalBranch, 0),
    (Blt, "blt", 0x00, 0x3F, Branch, ConditionalBranch, 0),
    (BneUn, "bne.un", 0x00, 0x40, Branch, ConditionalBranch, 0),
    (BgeUn, "bge.un", 0x00, 0x41, Branch, ConditionalBranch, 0),
    (BgtUn, "bgt.un", 0x00, 0x42, Branch, ConditionalBranch, 0),
    (BleUn, "ble.un", 0x00, 0x43, Branch, ConditionalBranch, 0),
    (BltUn, "blt.un", 0x00, 0x44, Branch, ConditionalBranch, 0),
    (Switch, "switch", 0x00, 0x45, Switch, Switch, 0),
    (LdindI1, "ldind.i1", 0x00, 0x46, None, Sequential, 1),
    (LdindU1, "ldind.u1", 0x00, 0x47, None, Sequential, 1),
    (LdindI2, "ldind.i2", 0x00, 0x48, None, Sequential, 1),
    (LdindU2, "ldind.u2", 0x00, 0x49, None, Sequential, 1),
    (LdindI4, "ldind.i4", 0x00, 0x4A, None, Sequential, 1),
    (LdindU4, "ldind.u4", 0x00, 0x4B, None, Sequential, 1),
    (LdindI8, "ldind.i8", 0x00, 0x4C, None, Sequential, 1),
    (LdindI, "ldind.i", 0x00, 0x4D, None, Sequential, 1),
    (LdindR4, "ldind.r4", 0x00, 0x4E, None, Sequential, 1),
    (LdindR8, "ldind.r8", 0x00, 0x4F, None, Sequential, 1),
    (LdindRef, "ldind.ref", 0x00, 0x50, None, Sequential, 1),
    (StindRef, "stind.ref", 0x00, 0x51, None, Sequential, 0),
    (StindI1, "stind.i1", 0x00, 0x52, None, Sequential, 0),
    (StindI2, "stind.i2", 0x00, 0x53, None, Sequential, 0),
    (StindI4, "stind.i4", 0x00, 0x54, None, Sequential, 0),
    (StindI8, "stind.i8", 0x00, 0x55, None, Sequential, 0),
    (StindR4, "stind.r4", 0x00, 0x56, None, Sequential, 0),
    (StindR8, "stind.r8", 0x00, 0x57, None, Sequential, 0),
    (Add, "add", 0x00, 0x58, None, Sequential, 1),
    (Sub, "sub", 0x00, 0x59, None, Sequential, 1),
    (Mul, "mul", 0x00, 0x5A, None, Sequential, 1),
    (Div, "div", 0x00, 0x5B, None, Sequential, 1),
    (DivUn, "div.un", 0x00, 0x5C, None, Sequential, 1),
    (Rem, "rem", 0x00, 0x5D, None, Sequential, 1),
    (RemUn, "rem.un", 0x00, 0x5E, None, Sequential, 1),
    (And, "and", 0x00, 0x5F, None, Sequential, 1),
    (Or, "or", 0x00, 0x60, None, Sequential, 1),
    (Xor, "xor", 0x00, 0x61, None, Sequential, 1),
    (Shl, "shl", 0x00, 0x62, None, Sequential, 1),
    (Shr, "shr", 0x00, 0x63, None, Sequential, 1),
    (ShrUn, "shr.un", 0x00, 0x64, None, Sequential, 1),
    (Neg, "neg", 0x00, 0x65, None, Sequential, 1),
    (Not, "not", 0x00, 0x66, None, Sequential, 1),
    (ConvI1, "conv.i1", 0x00, 0x67, None, Sequential, 1),
    (ConvI2, "conv.i2", 0x00, 0x68, None, Sequential, 1),
    (ConvI4, "conv.i4", 0x00, 0x69, None, Sequential, 1),
    (ConvI8, "conv.i8", 0x00, 0x6A, None, Sequential, 1),
    (ConvR4, "conv.r4", 0x00, 0x6B, None, Sequential, 1),
    (ConvR8, "conv.r8", 0x00, 0x6C, None, Sequential, 1),
    (ConvU4, "conv.u4", 0x00, 0x6D, None, Sequential, 1),
    (ConvU8, "conv.u8", 0x00, 0x6E, None, Sequential, 1),
    (Callvirt, "callvirt", 0x00, 0x6F, Token, Call, 1),
    (Cpobj, "cpobj", 0x00, 0x70, Token, Sequential, 0),
    (Ldobj, "ldobj", 0x00, 0x71, Token, Sequential, 1),
    (Ldstr, "ldstr", 0x00, 0x72, String, Sequential, 1),
    (Newobj, "newobj", 0x00, 0x73, Token, Call, 1),
    (Castclass, "castclass", 0x00, 0x74, Token, Sequential, 1),
    (Isinst, "isinst", 0x00, 0x75, Token, Sequential, 1),
    (ConvRUn, "conv.r.un", 0x00, 0x76, None, Sequential, 1),
    (Unbox, "unbox", 0x00, 0x79, Token, Sequential, 1),
    (Throw, "throw", 0x00, 0x7A, None, Throw, 0),
    (Ldfld, "ldfld", 0x00, 0x7B, Token, Sequential, 1),
    (Ldflda, "ldflda", 0x00, 0x7C, Token, Sequential, 1),
    (Stfld, "stfld", 0x00, 0x7D, Token, Sequential, 0),
    (Ldsfld, "ldsfld", 0x00, 0x7E, Token, Sequential, 1),
    (Ldsflda, "ldsflda", 0x00, 0x7F, Token, Sequential, 1),
    (Stsfld, "stsfld", 0x00, 0x80, Token, Sequential, 0),
    (Stobj, "stobj", 0x00, 0x81, Token, Sequential, 0),
    (ConvOvfI1Un, "conv.ovf.i1.un", 0x00, 0x82, None, Sequential, 1),
    (ConvOvfI2Un, "conv.ovf.i2.un", 0x00, 0x83, None, Sequential, 1),
    (ConvOvfI4Un, "conv.ovf.i4.un", 0x00, 0x84, None, Sequential, 1),
    (ConvOvfI8Un, "conv.ovf.i8.un", 0x00, 0x85, None, Sequential, 1),
    (ConvOvfU1Un, "conv.ovf.u1.un", 0x00, 0x86, None, Sequential, 1),
    (ConvOvfU2Un, "conv.ovf.u2.un", 0x00, 0x87, None, Sequential, 1),
    (ConvOvfU4Un, "conv.ovf.u4.un", 0x00, 0x88, None, Sequential, 1),
    (ConvOvfU8Un, "conv.ovf.u8.un", 0x00, 0x89, None, Sequential, 1),
    (ConvOvfIUn, "conv.ovf.i.un", 0x00, 0x8A, None, Sequential, 1),
    (ConvOvfUUn, "conv.ovf.u.un", 0x00, 0x8B, None, Sequential, 1),
    (Box, "box", 0x00, 0x8C, Token, Sequential, 1),
    (Newarr, "newarr", 0x00, 0x8D, Token, Sequential, 1),
    (Ldlen, "ldlen", 0x00, 0x8E, None, Sequential, 1),
    (Ldelema, "ldelema", 0x00, 0x8F, Token, Sequential, 1),
    (LdelemI1, "ldelem.i1", 0x00, 0x90, None, Sequential, 1),
    (LdelemU1, "ldelem.u1", 0x00, 0x91, None, Sequential, 1),
    (LdelemI2, "ldelem.i2", 0x00, 0x92, None, Sequential, 1),
    (LdelemU2, "ldelem.u2", 0x00, 0x93, None, Sequential, 1),
    (LdelemI4, "ldelem.i4", 0x00, 0x94, None, Sequential, 1),
    (LdelemU4, "ldelem.u4", 0x00, 0x95, None, Sequential, 1),
    (LdelemI8, "ldelem.i8", 0x00, 0x96, None, Sequential, 1),
    (LdelemI, "ldelem.i", 0x00, 0x97, None, Sequential, 1),
    (LdelemR4, "ldelem.r4", 0x00, 0x98, None, Sequential, 1),
    (LdelemR8, "ldelem.r8", 0x00, 0x99, None, Sequential, 1),
    (LdelemRef, "ldelem.ref", 0x00, 0x9A, None, Sequential, 1),
    (StelemI, "stelem.i", 0x00, 0x9B, None, Sequential, 0),
    (StelemI1, "stelem.i1", 0x00, 0x9C, None, Sequential, 0),
    (StelemI2, "stelem.i2", 0x00, 0x9D, None, Sequential, 0),
    (StelemI4, "stelem.i4", 0x00, 0x9E, None, Sequential, 0),
    (StelemI8, "stelem.i8", 0x00, 0x9F, None, Sequential, 0),
    (StelemR4, "stelem.r4", 0x00, 0xA0, None, Sequential, 0),
    (StelemR8, "stelem.r8", 0x00, 0xA1, None, Sequential, 0),
    (StelemRef, "stelem.ref", 0x00, 0xA2, None, Sequential, 0),
    (Ldelem, "ldelem", 0x00, 0xA3, Token, Sequential, 1),
    (Stelem, "stelem", 0x00, 0xA4, Token, Sequential, 0),
    (UnboxAny, "unbox.any", 0x00, 0xA5, Token, Sequential, 1),
    (ConvOvfI1, "conv.ovf.i1", 0x00, 0xB3, None, Sequential, 1),
    (ConvOvfU1, "conv.ovf.u1", 0x00, 0xB4, None, Sequential, 1),
    (ConvOvfI2, "conv.ovf.i2", 0x00, 0xB5, None, Sequential, 1),
    (ConvOvfU2, "conv.ovf.u2", 0x00, 0xB6, None, Sequential, 1),
    (ConvOvfI4, "conv.ovf.i4", 0x00, 0xB7, None, Sequential, 1),
    (ConvOvfU4, "conv.ovf.u4", 0x00, 0xB8, None, Sequential, 1),
    (ConvOvfI8, "conv.ovf.i8", 0x00, 0xB9, None, Sequential, 1),
    (ConvOvfU8, "conv.ovf.u8", 0x00, 0xBA, None, Sequential, 1),
    (Refanyval, "refanyval", 0x00, 0xC2, Token, Sequential, 1),
    (Ckfinite, "ckfinite", 0x00, 0xC3, None, Sequential, 1),
    (Mkrefany, "mkrefany", 0x00, 0xC6, Token, Sequential, 1),
    (Ldtoken, "ldtoken", 0x00, 0xD0, Token, Sequential, 1),
    (ConvU2, "conv.u2", 0x00, 0xD1, None, Sequential, 1),
    (ConvU1, "conv.u1", 0x00, 0xD2, None, Sequential, 1),
    (ConvI, "conv.i", 0x00, 0xD3, None, Sequential, 1),
    (ConvOvfI, "conv.ovf.i", 0x00, 0xD4, None, Sequential, 1),
    (ConvOvfU, "conv.ovf.u", 0x00, 0xD5, None, Sequential, 1),
    (AddOvf, "add.ovf", 0x00, 0xD6, None, Sequential, 1),
    (AddOvfUn, "add.ovf.un", 0x00, 0xD7, None, Sequential, 1),
    (MulOvf, "mul.ovf", 0x00, 0xD8, None, Sequential, 1),
    (MulOvfUn, "mul.ovf.un", 0x00, 0xD9, None, Sequential, 1),
    (SubOvf, "sub.ovf", 0x00, 0xDA, None, Sequential, 1),
    (SubOvfUn, "sub.ovf.un", 0x00, 0xDB, None, Sequential, 1),
    (Endfinally, "endfinally", 0x00, 0xDC, None, EndFinally, 0),
    (Leave, "leave", 0x00, 0xDD, Branch, Leave, 0),
    (LeaveS, "leave.s", 0x00, 0xDE, ShortBranch, Leave, 0),
    (StindI, "stind.i", 0x00, 0xDF, None, Sequential, 0),
    (ConvU, "conv.u", 0x00, 0xE0, None, Sequential, 1),
    (Arglist, "arglist", 0xFE, 0x00, None, Sequential, 1),
    (Ceq, "ceq", 0xFE, 0x01, None, Sequential, 1),
    (Cgt, "cgt", 0xFE, 0x02, None, Sequential, 1),
    (CgtUn, "cgt.un", 0xFE, 0x03, None, Sequential, 1),
    (Clt, "clt", 0xFE, 0x04, None, Sequential, 1),
    (CltUn, "clt.un", 0xFE, 0x05, None, Sequential, 1),
    (Ldftn, "ldftn", 0xFE, 0x06, Token, Sequential, 1),
    (Ldvirtftn, "ldvirtftn", 0xFE, 0x07, Token, Sequential, 1),
    (Ldarg, "ldarg", 0xFE, 0x09, Argument, Sequential, 1),
    (Ldarga, "ldarga", 0xFE, 0x0A, Argument, Sequential, 1),
    (Starg, "starg", 0xFE, 0x0B, Argument, Sequential, 0),
    (Ldloc, "ldloc", 0xFE, 0x0C, Local, Sequential, 1),
    (Ldloca, "ldloca", 0xFE, 0x0D, Local, Sequential, 1),
    (Stloc, "stloc", 0xFE, 0x0E, Local, Sequential, 0),
    (Localloc, "localloc", 0xFE, 0x0F, None, Sequential, 1),
    (Endfilter, "endfilter", 0xFE, 0x11, None, EndFinally, 0),
    (Unaligned, "unaligned.", 0xFE, 0x12, UInt8, Meta, 0),
    (Volatile, "volatile.", 0xFE, 0x13, None, Meta, 0),
    (Tail, "tail.", 0xFE, 0x14, None, Meta, 0),
    (Initobj, "initobj", 0xFE, 0x15, Token, Sequential, 0),
    (Constrained, "constrained.", 0xFE, 0x16, Token, Meta, 0),
    (Cpblk, "cpblk", 0xFE, 0x17, None, Sequential, 0),
    (Initblk, "initblk", 0xFE, 0x18, None, Sequential, 0),
    (No, "no.", 0xFE, 0x19, UInt8, Meta, 0),
    (Rethrow, "rethrow", 0xFE, 0x1A, None, Throw, 0),
    (Sizeof, "sizeof", 0xFE, 0x1C, Token, Sequential, 1),
    (Refanytype, "refanytype", 0xFE, 0x1D, None, Sequential, 1),
    (Readonly, "readonly.", 0xFE, 0x1E, None, Meta, 0),
}

impl OpCode {
    /// Encoded size of the opcode itself (1 or 2 bytes)
    #[must_use]
    pub fn size(&self) -> usize {
        if self.prefix() == 0 {
            1
        } else {
            2
        }
    }

    /// Look an opcode up by mnemonic
    #[must_use]
    pub fn from_mnemonic(mnemonic: &str) -> Option<OpCode> {
        OpCode::iter().find(|op| op.mnemonic() == mnemonic)
    }

    /// True for `call`, `callvirt` and `newobj`, the opcodes that name a callee by token
    #[must_use]
    pub fn is_call_site(&self) -> bool {
        matches!(self, OpCode::Call | OpCode::Callvirt | OpCode::Newobj)
    }

    /// True for every opcode carrying one or more branch targets
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(
            self.operand_type(),
            OperandType::ShortBranch | OperandType::Branch | OperandType::Switch
        )
    }

    /// Long form of a short branch, `None` if this is not a short branch.
    #[must_use]
    pub fn long_form(&self) -> Option<OpCode> {
        Some(match self {
            OpCode::BrS => OpCode::Br,
            OpCode::BrfalseS => OpCode::Brfalse,
            OpCode::BrtrueS => OpCode::Brtrue,
            OpCode::BeqS => OpCode::Beq,
            OpCode::BgeS => OpCode::Bge,
            OpCode::BgtS => OpCode::Bgt,
            OpCode::BleS => OpCode::Ble,
            OpCode::BltS => OpCode::Blt,
            OpCode::BneUnS => OpCode::BneUn,
            OpCode::BgeUnS => OpCode::BgeUn,
            OpCode::BgtUnS => OpCode::BgtUn,
            OpCode::BleUnS => OpCode::BleUn,
            OpCode::BltUnS => OpCode::BltUn,
            OpCode::LeaveS => OpCode::Leave,
            _ => return None,
        })
    }
}
