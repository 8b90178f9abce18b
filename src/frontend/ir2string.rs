use super::ir::{
    basicblock::BasicBlock,
    context::Context,
    function::Function,
    global::Global,
    instruction::{
        BinaryOp, ConversionOp, FCompCond, ICompCond, Instruction, InstructionKind, MemAccessOp,
        TerminatorOp,
    },
    typ::{Typ, TypeData},
    value::{Value, ValueKind},
};
use crate::utils::{
    linked_list::LinkedListContainer,
    storage::{ArenaPtr, Idx},
};

/// 以LLVM文本格式输出IR，主要用于测试和调试
pub trait Display {
    fn display(self, ctx: &Context) -> String;
}

impl Context {
    pub fn to_ir_string(&self) -> String {
        let mut ir = String::new();
        for decl in self.syslibdecls.iter() {
            ir += &format!(
                "declare {} @{}(",
                decl.get_return_type().display(self),
                decl.get_name()
            );
            for (i, param_typ) in decl.get_parameters_typ().iter().enumerate() {
                if i > 0 {
                    ir += ", ";
                }
                ir += &param_typ.display(self);
            }
            ir += ")\n";
        }
        for global in self.get_globals() {
            ir += &format!("{}\n", global.display(self));
        }
        for func in self.get_functions() {
            ir += &format!("{}\n", func.display(self));
        }
        ir
    }
}

impl Display for Global {
    fn display(self, ctx: &Context) -> String {
        let typ = self.value(ctx).typ().display(ctx);
        if self.value(ctx).is_all_zero() && self.value(ctx).typ().is_array(ctx) {
            format!("@{} = global {} zeroinitializer", self.name(ctx), typ)
        } else {
            format!(
                "@{} = global {} {}",
                self.name(ctx),
                typ,
                self.value(ctx).to_string(ctx)
            )
        }
    }
}

impl Display for Function {
    fn display(self, ctx: &Context) -> String {
        let mut ir = String::new();
        ir += &format!(
            "define {} @{}(",
            self.get_return_type(ctx).display(ctx),
            self.get_id(ctx)
        );
        for (i, param) in self.get_parameters(ctx).iter().enumerate() {
            if i != 0 {
                ir += ", ";
            }
            ir += &format!("{} {}", param.typ(ctx).display(ctx), param.display(ctx));
        }
        ir += ") {\n";
        for bbk in self.iter(ctx) {
            ir += &format!("{}\n", bbk.display(ctx));
        }
        ir += "}";
        ir
    }
}

impl Display for Typ {
    fn display(self, ctx: &Context) -> String {
        match self.deref(ctx).unwrap() {
            TypeData::Void => "void".to_string(),
            TypeData::Bool => "i1".to_string(),
            TypeData::Int { bits } => format!("i{}", bits),
            TypeData::Float32 => "float".to_string(),
            TypeData::Ptr { pointee } => {
                if pointee.is_void(ctx) {
                    "i8*".to_string()
                } else {
                    format!("{}*", pointee.display(ctx))
                }
            }
            TypeData::Array { element, len } => {
                format!("[{} x {}]", len, element.display(ctx))
            }
        }
    }
}

impl Display for BasicBlock {
    fn display(self, ctx: &Context) -> String {
        let mut ir = String::new();
        // 基本块直接以Arena下标命名
        ir += &format!("bb{}:", self.0.index());
        for inst in self.iter(ctx) {
            ir += &format!("\n\t{}", inst.display(ctx));
        }
        ir
    }
}

impl Display for Value {
    fn display(self, ctx: &Context) -> String {
        match &self.deref(ctx).unwrap().kind {
            ValueKind::InstResult { .. } | ValueKind::Parameter { .. } => {
                format!("%v{}", self.0.index())
            }
            ValueKind::Constant { value } => value.to_string(ctx),
            ValueKind::Function { name, .. } => name.clone(),
        }
    }
}

impl Display for Instruction {
    fn display(self, ctx: &Context) -> String {
        let mut ir = String::new();
        if let Some(result) = self.get_result(ctx) {
            ir += &format!("{} = ", result.display(ctx));
        }

        match self.get_kind(ctx) {
            InstructionKind::Terminator { op } => match op {
                TerminatorOp::Ret => match self.get_operand(ctx, 0) {
                    Some(value) => {
                        ir += &format!(
                            "ret {} {}",
                            value.typ(ctx).display(ctx),
                            value.display(ctx)
                        );
                    }
                    None => ir += "ret void",
                },
                TerminatorOp::Br => {
                    let dest = self
                        .get_target(ctx, 0)
                        .expect("br instruction has no target");
                    ir += &format!("br label %bb{}", dest.0.index());
                }
                TerminatorOp::CondBr => {
                    let cond = self
                        .get_operand(ctx, 0)
                        .expect("condbr instruction has no condition");
                    let iftrue = self
                        .get_target(ctx, 0)
                        .expect("condbr instruction has no iftrue target");
                    let iffalse = self
                        .get_target(ctx, 1)
                        .expect("condbr instruction has no iffalse target");
                    ir += &format!(
                        "br i1 {}, label %bb{}, label %bb{}",
                        cond.display(ctx),
                        iftrue.0.index(),
                        iffalse.0.index()
                    );
                }
            },
            InstructionKind::Binary { op } => {
                let mnemonic = match op {
                    BinaryOp::Add => "add",
                    BinaryOp::Sub => "sub",
                    BinaryOp::Mul => "mul",
                    BinaryOp::Sdiv => "sdiv",
                    BinaryOp::Srem => "srem",
                    BinaryOp::Fadd => "fadd",
                    BinaryOp::Fsub => "fsub",
                    BinaryOp::Fmul => "fmul",
                    BinaryOp::Fdiv => "fdiv",
                };
                let op1 = self.get_operand(ctx, 0).unwrap();
                let op2 = self.get_operand(ctx, 1).unwrap();
                ir += &format!(
                    "{} {} {}, {}",
                    mnemonic,
                    self.result_typ(ctx).display(ctx),
                    op1.display(ctx),
                    op2.display(ctx)
                );
            }
            InstructionKind::MemAccess { op } => match op {
                MemAccessOp::Alloca { typ } => {
                    ir += &format!("alloca {}", typ.display(ctx));
                }
                MemAccessOp::Load => {
                    let pointer = self.get_operand(ctx, 0).unwrap();
                    ir += &format!(
                        "load {}, {} {}",
                        self.result_typ(ctx).display(ctx),
                        pointer.typ(ctx).display(ctx),
                        pointer.display(ctx)
                    );
                }
                MemAccessOp::Store => {
                    let value = self.get_operand(ctx, 0).unwrap();
                    let pointer = self.get_operand(ctx, 1).unwrap();
                    ir += &format!(
                        "store {} {}, {} {}",
                        value.typ(ctx).display(ctx),
                        value.display(ctx),
                        pointer.typ(ctx).display(ctx),
                        pointer.display(ctx)
                    );
                }
                MemAccessOp::GetElementPtr { typ } => {
                    let base = self.get_operand(ctx, 0).unwrap();
                    ir += &format!(
                        "getelementptr {}, {} {}",
                        typ.display(ctx),
                        base.typ(ctx).display(ctx),
                        base.display(ctx)
                    );
                    for index in self.get_operands(ctx).iter().skip(1) {
                        ir += &format!(
                            ", {} {}",
                            index.typ(ctx).display(ctx),
                            index.display(ctx)
                        );
                    }
                }
            },
            InstructionKind::Conversion { op } => {
                let mnemonic = match op {
                    ConversionOp::ZExt => "zext",
                    ConversionOp::FpToSi => "fptosi",
                    ConversionOp::SiToFp => "sitofp",
                    ConversionOp::Bitcast => "bitcast",
                };
                let op1 = self.get_operand(ctx, 0).unwrap();
                ir += &format!(
                    "{} {} {} to {}",
                    mnemonic,
                    op1.typ(ctx).display(ctx),
                    op1.display(ctx),
                    self.result_typ(ctx).display(ctx)
                );
            }
            InstructionKind::IComp { cond } => {
                let op1 = self.get_operand(ctx, 0).unwrap();
                let op2 = self.get_operand(ctx, 1).unwrap();
                ir += &format!(
                    "icmp {} {} {}, {}",
                    cond.display(ctx),
                    op1.typ(ctx).display(ctx),
                    op1.display(ctx),
                    op2.display(ctx)
                );
            }
            InstructionKind::FComp { cond } => {
                let op1 = self.get_operand(ctx, 0).unwrap();
                let op2 = self.get_operand(ctx, 1).unwrap();
                ir += &format!(
                    "fcmp {} {} {}, {}",
                    cond.display(ctx),
                    op1.typ(ctx).display(ctx),
                    op1.display(ctx),
                    op2.display(ctx)
                );
            }
            InstructionKind::Call => {
                let callee = self.get_operand(ctx, 0).unwrap();
                let ret_typ = match self.get_result(ctx) {
                    Some(result) => result.typ(ctx),
                    None => callee.typ(ctx),
                };
                ir += &format!("call {} @{}(", ret_typ.display(ctx), callee.display(ctx));
                for (i, arg) in self.get_operands(ctx).iter().enumerate().skip(1) {
                    if i > 1 {
                        ir += ", ";
                    }
                    ir += &format!("{} {}", arg.typ(ctx).display(ctx), arg.display(ctx));
                }
                ir += ")";
            }
        }
        ir
    }
}

impl Display for ICompCond {
    fn display(self, _ctx: &Context) -> String {
        match self {
            ICompCond::Eq => "eq".to_string(),
            ICompCond::Ne => "ne".to_string(),
            ICompCond::Sgt => "sgt".to_string(),
            ICompCond::Sge => "sge".to_string(),
            ICompCond::Slt => "slt".to_string(),
            ICompCond::Sle => "sle".to_string(),
        }
    }
}

impl Display for FCompCond {
    fn display(self, _ctx: &Context) -> String {
        match self {
            FCompCond::Oeq => "oeq".to_string(),
            FCompCond::One => "one".to_string(),
            FCompCond::Ogt => "ogt".to_string(),
            FCompCond::Oge => "oge".to_string(),
            FCompCond::Olt => "olt".to_string(),
            FCompCond::Ole => "ole".to_string(),
        }
    }
}
