use core::fmt;

use crate::{Opcode, ARG_SIZE};

/// A decoded instruction.
///
/// Unsigned payloads index the constant pool or give item counts; signed
/// payloads are jump offsets relative to the byte after the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// No operation.
    Noop,
    /// Push constant pool entry `idx`.
    Const(u32),
    /// Push the `true` singleton.
    ConstTrue,
    /// Push the `false` singleton.
    ConstFalse,
    /// Push the `none` singleton.
    ConstNone,
    /// Pop and discard the top of the stack.
    Popu,
    /// Push the value bound to the name in constant pool entry `idx`.
    Load(u32),
    /// Replace the top of the stack with its named attribute.
    LoadAttr(u32),
    /// Bind the top of the stack to the named local, keeping the value.
    Store(u32),
    /// Pop value and object, set the object's named attribute, push value.
    StoreAttr(u32),
    /// Call with `n` stack items (callable plus arguments).
    Call(u32),
    /// Subscript with `n` stack items (target plus indices).
    GetItem(u32),
    /// Subscript-assign with `n` stack items (target, indices, value).
    SetItem(u32),
    /// Collect `n` stack items into a tuple.
    Tuple(u32),
    /// Collect `n` stack items into a list.
    List(u32),
    /// Binary add.
    Add,
    /// Binary subtract.
    Sub,
    /// Binary multiply.
    Mul,
    /// Binary divide.
    Div,
    /// Binary modulus.
    Mod,
    /// Binary power.
    Pow,
    /// Less-than comparison.
    Lt,
    /// Less-or-equal comparison.
    Le,
    /// Greater-than comparison.
    Gt,
    /// Greater-or-equal comparison.
    Ge,
    /// Equality comparison.
    Eq,
    /// Inequality comparison.
    Ne,
    /// Unconditional relative jump.
    Jmp(i32),
    /// Relative jump when the popped value is truthy.
    Jmpt(i32),
    /// Relative jump when the popped value is falsey.
    Jmpf(i32),
    /// Return the top of the stack.
    Ret,
    /// Return `none`.
    RetNone,
    /// Push an exception handler at the absolute offset.
    ExcAdd(u32),
    /// Pop the innermost exception handler.
    ExcRem,
}

/// Failure to decode an instruction out of a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The byte at the given offset is not a known opcode.
    #[error("invalid opcode {opcode:#04x} at offset {offset}")]
    InvalidOpcode {
        /// Offending byte.
        opcode: u8,
        /// Offset of the byte in the stream.
        offset: usize,
    },
    /// The stream ends inside the instruction's payload.
    #[error("truncated payload for {opcode} at offset {offset}")]
    TruncatedPayload {
        /// Opcode whose payload is missing.
        opcode: Opcode,
        /// Offset of the opcode byte.
        offset: usize,
    },
}

impl Instruction {
    /// Opcode byte of this instruction.
    pub const fn opcode(&self) -> Opcode {
        use Instruction::*;
        match self {
            Noop => Opcode::Noop,
            Const(_) => Opcode::Const,
            ConstTrue => Opcode::ConstTrue,
            ConstFalse => Opcode::ConstFalse,
            ConstNone => Opcode::ConstNone,
            Popu => Opcode::Popu,
            Load(_) => Opcode::Load,
            LoadAttr(_) => Opcode::LoadAttr,
            Store(_) => Opcode::Store,
            StoreAttr(_) => Opcode::StoreAttr,
            Call(_) => Opcode::Call,
            GetItem(_) => Opcode::GetItem,
            SetItem(_) => Opcode::SetItem,
            Tuple(_) => Opcode::Tuple,
            List(_) => Opcode::List,
            Add => Opcode::Add,
            Sub => Opcode::Sub,
            Mul => Opcode::Mul,
            Div => Opcode::Div,
            Mod => Opcode::Mod,
            Pow => Opcode::Pow,
            Lt => Opcode::Lt,
            Le => Opcode::Le,
            Gt => Opcode::Gt,
            Ge => Opcode::Ge,
            Eq => Opcode::Eq,
            Ne => Opcode::Ne,
            Jmp(_) => Opcode::Jmp,
            Jmpt(_) => Opcode::Jmpt,
            Jmpf(_) => Opcode::Jmpf,
            Ret => Opcode::Ret,
            RetNone => Opcode::RetNone,
            ExcAdd(_) => Opcode::ExcAdd,
            ExcRem => Opcode::ExcRem,
        }
    }

    /// Encoded size of this instruction in bytes.
    pub const fn size(&self) -> usize {
        self.opcode().size()
    }

    /// Payload of this instruction reinterpreted as unsigned, if any.
    pub const fn arg(&self) -> Option<u32> {
        use Instruction::*;
        match *self {
            Const(v) | Load(v) | LoadAttr(v) | Store(v) | StoreAttr(v) | Call(v)
            | GetItem(v) | SetItem(v) | Tuple(v) | List(v) | ExcAdd(v) => Some(v),
            Jmp(v) | Jmpt(v) | Jmpf(v) => Some(v as u32),
            _ => None,
        }
    }

    /// Append the encoded form to `out`. Payloads are little-endian.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.opcode() as u8);
        if let Some(arg) = self.arg() {
            out.extend_from_slice(&arg.to_le_bytes());
        }
    }

    /// Decode the instruction starting at `offset` in `bytes`.
    pub fn decode(bytes: &[u8], offset: usize) -> Result<Self, DecodeError> {
        let byte = *bytes.get(offset).ok_or(DecodeError::TruncatedPayload {
            opcode: Opcode::Noop,
            offset,
        })?;
        let opcode =
            Opcode::try_from(byte).map_err(|opcode| DecodeError::InvalidOpcode {
                opcode,
                offset,
            })?;

        let arg = if opcode.has_arg() {
            let payload = bytes
                .get(offset + 1..offset + 1 + ARG_SIZE)
                .ok_or(DecodeError::TruncatedPayload { opcode, offset })?;
            let mut raw = [0u8; ARG_SIZE];
            raw.copy_from_slice(payload);
            u32::from_le_bytes(raw)
        } else {
            0
        };

        use Instruction::*;
        Ok(match opcode {
            Opcode::Noop => Noop,
            Opcode::Const => Const(arg),
            Opcode::ConstTrue => ConstTrue,
            Opcode::ConstFalse => ConstFalse,
            Opcode::ConstNone => ConstNone,
            Opcode::Popu => Popu,
            Opcode::Load => Load(arg),
            Opcode::LoadAttr => LoadAttr(arg),
            Opcode::Store => Store(arg),
            Opcode::StoreAttr => StoreAttr(arg),
            Opcode::Call => Call(arg),
            Opcode::GetItem => GetItem(arg),
            Opcode::SetItem => SetItem(arg),
            Opcode::Tuple => Tuple(arg),
            Opcode::List => List(arg),
            Opcode::Add => Add,
            Opcode::Sub => Sub,
            Opcode::Mul => Mul,
            Opcode::Div => Div,
            Opcode::Mod => Mod,
            Opcode::Pow => Pow,
            Opcode::Lt => Lt,
            Opcode::Le => Le,
            Opcode::Gt => Gt,
            Opcode::Ge => Ge,
            Opcode::Eq => Eq,
            Opcode::Ne => Ne,
            Opcode::Jmp => Jmp(arg as i32),
            Opcode::Jmpt => Jmpt(arg as i32),
            Opcode::Jmpf => Jmpf(arg as i32),
            Opcode::Ret => Ret,
            Opcode::RetNone => RetNone,
            Opcode::ExcAdd => ExcAdd(arg),
            Opcode::ExcRem => ExcRem,
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match *self {
            Jmp(rel) | Jmpt(rel) | Jmpf(rel) => {
                write!(f, "{} {:+}", self.opcode(), rel)
            }
            ExcAdd(abs) => write!(f, "{} @{}", self.opcode(), abs),
            _ => match self.arg() {
                Some(arg) => write!(f, "{} {}", self.opcode(), arg),
                None => write!(f, "{}", self.opcode()),
            },
        }
    }
}

/// Iterator over the instructions of an encoded stream.
///
/// Yields `(offset, instruction)` pairs and stops after the first decode
/// failure, which is reported as the final item.
#[derive(Debug, Clone)]
pub struct Instructions<'a> {
    bytes: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> Instructions<'a> {
    /// Iterate over `bytes` from the start.
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<(usize, Instruction), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.bytes.len() {
            return None;
        }
        let at = self.offset;
        match Instruction::decode(self.bytes, at) {
            Ok(instr) => {
                self.offset += instr.size();
                Some(Ok((at, instr)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let program = [
            Instruction::Const(7),
            Instruction::Load(0),
            Instruction::Call(2),
            Instruction::Jmpf(-10),
            Instruction::Add,
            Instruction::ExcAdd(40),
            Instruction::ExcRem,
            Instruction::RetNone,
        ];

        let mut bytes = Vec::new();
        for instr in &program {
            instr.encode(&mut bytes);
        }

        let decoded: Vec<_> = Instructions::new(&bytes)
            .map(|r| r.unwrap().1)
            .collect();
        assert_eq!(decoded, program);
    }

    #[test]
    fn offsets_advance_by_size() {
        let mut bytes = Vec::new();
        Instruction::Noop.encode(&mut bytes);
        Instruction::Const(1).encode(&mut bytes);
        Instruction::Ret.encode(&mut bytes);

        let offsets: Vec<_> = Instructions::new(&bytes)
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(offsets, vec![0, 1, 6]);
    }

    #[test]
    fn invalid_opcode_is_reported_once() {
        let bytes = [0x00, 0xfe, 0x00];
        let mut it = Instructions::new(&bytes);
        assert!(matches!(it.next(), Some(Ok((0, Instruction::Noop)))));
        assert_eq!(
            it.next(),
            Some(Err(DecodeError::InvalidOpcode {
                opcode: 0xfe,
                offset: 1
            }))
        );
        assert_eq!(it.next(), None);
    }

    #[test]
    fn truncated_payload() {
        let bytes = [Opcode::Const as u8, 0x01, 0x02];
        assert_eq!(
            Instruction::decode(&bytes, 0),
            Err(DecodeError::TruncatedPayload {
                opcode: Opcode::Const,
                offset: 0
            })
        );
    }

    #[test]
    fn negative_jump_payload() {
        let mut bytes = Vec::new();
        Instruction::Jmp(-1).encode(&mut bytes);
        assert_eq!(bytes[1..], [0xff, 0xff, 0xff, 0xff]);
        assert_eq!(
            Instruction::decode(&bytes, 0).unwrap(),
            Instruction::Jmp(-1)
        );
    }
}
