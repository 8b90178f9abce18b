use log::debug;

use super::{
    ast::{
        BType, BinaryOp, Block, BlockItem, Call, CompUnit, ComptimeValue, Decl, Exp, FuncDef,
        FuncParam, GlobalItem, InitVal, LVal, Stmt, UnaryOp, VarDef,
    },
    diagnostic::Diagnostic,
    ir::{
        basicblock::BasicBlock,
        context::{Context, FunctionDecl},
        function::Function,
        global::Global,
        instruction::{
            BinaryOp as IBinaryOp, ConversionOp, FCompCond, ICompCond, Instruction,
        },
        typ::Typ,
        value::{ConstantValue, Value},
    },
    symboltable::{SymbolEntry, SymbolKind, SymbolTable},
};
use crate::utils::linked_list::LinkedListContainer;

/// 当前所在循环的条件块和出口块，break/continue的跳转目标
#[derive(Debug, Clone, Copy)]
struct LoopBlocks {
    cond: BasicBlock,
    exit: BasicBlock,
}

#[derive(Default)]
pub struct IrGenContext {
    pub ctx: Context,
    pub symboltable: SymbolTable,

    cur_func: Option<Function>,
    cur_bbk: Option<BasicBlock>,
    /// 当前函数的入口块，所有alloca都提升到这里
    entry_bbk: Option<BasicBlock>,
}

impl IrGenContext {
    pub fn new(target: u32) -> Self {
        Self {
            ctx: Context::new(target),
            ..Default::default()
        }
    }

    pub fn finish(self) -> Context {
        self.ctx
    }

    /// 把指令追加到当前基本块。往已终结的块里追加指令属于内部错误
    fn emit(&mut self, instruction: Instruction) {
        let cur_bbk = self.cur_bbk.expect("no current basic block");
        assert!(
            !cur_bbk.is_terminated(&self.ctx),
            "emit into a terminated block"
        );
        cur_bbk
            .push_back(&mut self.ctx, instruction)
            .unwrap_or_else(|_| unreachable!());
    }

    /// 新建一个基本块并挂到当前函数末尾
    fn append_block(&mut self) -> BasicBlock {
        let bbk = BasicBlock::new(&mut self.ctx);
        self.cur_func
            .expect("no current function")
            .push_back(&mut self.ctx, bbk)
            .unwrap_or_else(|_| unreachable!());
        bbk
    }

    /// 在入口块头部创建栈槽，返回指向typ的指针值
    fn alloc_slot(&mut self, typ: Typ) -> Value {
        let slot = Instruction::alloca(&mut self.ctx, typ);
        self.entry_bbk
            .expect("no entry block")
            .push_front(&mut self.ctx, slot)
            .unwrap_or_else(|_| unreachable!());
        slot.get_result(&self.ctx)
            .expect("alloca has no result value")
    }

    fn btype2ir(&mut self, typ: BType) -> Typ {
        match typ {
            BType::Void => Typ::void(&mut self.ctx),
            BType::Int => Typ::int32(&mut self.ctx),
            BType::Float => Typ::float32(&mut self.ctx),
        }
    }

    /// 编译期标量转IR常量，布尔值提升为i32
    fn comptime2const(&mut self, value: &ComptimeValue) -> ConstantValue {
        match value {
            ComptimeValue::Bool(y) => ConstantValue::int32(&mut self.ctx, *y as i32),
            ComptimeValue::Int(i) => ConstantValue::int32(&mut self.ctx, *i),
            ComptimeValue::Float(f) => ConstantValue::float32(&mut self.ctx, *f),
        }
    }

    fn comptime2value(&mut self, value: &ComptimeValue) -> Value {
        let constant = self.comptime2const(value);
        Value::constant(&mut self.ctx, constant)
    }

    /// 按声明类型收窄编译期值，float初始化int时截断取整
    fn comptime_as(&self, value: ComptimeValue, typ: BType) -> ComptimeValue {
        match typ {
            BType::Int => ComptimeValue::Int(value.to_int()),
            BType::Float => ComptimeValue::Float(value.to_float()),
            BType::Void => value,
        }
    }

    // ------------------------------------------------------------------
    // 常量折叠
    // ------------------------------------------------------------------

    /// 尽力折叠表达式。Ok(None)表示不是编译期常量；
    /// 只有确定的错误（常量除零、浮点取模）才报Err
    fn try_fold(&self, exp: &Exp) -> Result<Option<ComptimeValue>, Diagnostic> {
        match exp {
            Exp::Const(v) => Ok(Some(*v)),
            Exp::Unary(op, inner) => {
                let v = match self.try_fold(inner)? {
                    Some(v) => v,
                    None => return Ok(None),
                };
                match op {
                    UnaryOp::Neg => Ok(Some(-v)),
                    UnaryOp::Not => Ok(Some(!v)),
                }
            }
            Exp::Binary(op, lhs, rhs) => {
                let lhs = match self.try_fold(lhs)? {
                    Some(v) => v,
                    None => return Ok(None),
                };
                let rhs = match self.try_fold(rhs)? {
                    Some(v) => v,
                    None => return Ok(None),
                };
                self.fold_binary(*op, lhs, rhs).map(Some)
            }
            Exp::LVal(LVal { id, indices }) => {
                let mut subscripts = Vec::with_capacity(indices.len());
                for index in indices {
                    match self.try_fold(index)? {
                        Some(v) => subscripts.push(v.to_int() as usize),
                        None => return Ok(None),
                    }
                }
                Ok(self.symboltable.resolve_const(id, &subscripts))
            }
            Exp::Call(_) => Ok(None),
        }
    }

    fn fold_binary(
        &self,
        op: BinaryOp,
        lhs: ComptimeValue,
        rhs: ComptimeValue,
    ) -> Result<ComptimeValue, Diagnostic> {
        match op {
            BinaryOp::Add => Ok(lhs + rhs),
            BinaryOp::Sub => Ok(lhs - rhs),
            BinaryOp::Mul => Ok(lhs * rhs),
            BinaryOp::Div => lhs.checked_div(rhs).ok_or(Diagnostic::DivisionByZero),
            BinaryOp::Mod => {
                if lhs.is_float() || rhs.is_float() {
                    return Err(Diagnostic::TypeMismatch(
                        "operands of `%` must be integers".to_string(),
                    ));
                }
                lhs.checked_rem(rhs).ok_or(Diagnostic::DivisionByZero)
            }
            BinaryOp::Lt => Ok(ComptimeValue::Bool(lhs < rhs)),
            BinaryOp::Gt => Ok(ComptimeValue::Bool(lhs > rhs)),
            BinaryOp::Le => Ok(ComptimeValue::Bool(lhs <= rhs)),
            BinaryOp::Ge => Ok(ComptimeValue::Bool(lhs >= rhs)),
            BinaryOp::Eq => Ok(ComptimeValue::Bool(lhs == rhs)),
            BinaryOp::Ne => Ok(ComptimeValue::Bool(lhs != rhs)),
            BinaryOp::And => Ok(lhs.logical_and(&rhs)),
            BinaryOp::Or => Ok(lhs.logical_or(&rhs)),
        }
    }

    /// 强制常量语境下的折叠，折不出来就报NonConstant
    fn fold_exp(&self, exp: &Exp) -> Result<ComptimeValue, Diagnostic> {
        match self.try_fold(exp)? {
            Some(v) => Ok(v),
            None => {
                // 区分"未声明"和"不是常量"，给出更准确的诊断
                if let Exp::LVal(LVal { id, .. }) = exp {
                    self.symboltable.resolve(id)?;
                }
                Err(Diagnostic::NonConstant)
            }
        }
    }

    /// 折叠数组维度，必须是非负整型常量
    fn fold_dimensions(&self, dimensions: &[Exp]) -> Result<Vec<usize>, Diagnostic> {
        let mut dims = Vec::with_capacity(dimensions.len());
        for dim in dimensions {
            let v = self.fold_exp(dim)?;
            let n = v.to_int();
            if v.is_float() || n < 0 {
                return Err(Diagnostic::TypeMismatch(
                    "array dimension must be a non-negative integer constant".to_string(),
                ));
            }
            dims.push(n as usize);
        }
        Ok(dims)
    }

    /// 由各维长度构造IR数组类型，dims外层在前
    fn build_array_typ(&mut self, element: Typ, dims: &[usize]) -> Typ {
        let mut typ = element;
        for &len in dims.iter().rev() {
            typ = Typ::array(&mut self.ctx, typ, len);
        }
        typ
    }

    // ------------------------------------------------------------------
    // 表达式翻译
    // ------------------------------------------------------------------

    /// 隐式类型转换，需要时插入转换指令
    fn coerce(&mut self, value: Value, target: Typ) -> Value {
        let mut value = value;
        let mut from = value.typ(&self.ctx);
        if from == target {
            return value;
        }
        // i1不参与算术，先零扩展到i32
        if from.is_bool(&self.ctx) {
            let int32 = Typ::int32(&mut self.ctx);
            let zext = Instruction::conversion(&mut self.ctx, ConversionOp::ZExt, int32, value);
            self.emit(zext);
            value = zext.get_result(&self.ctx).expect("zext has no result");
            from = int32;
            if from == target {
                return value;
            }
        }
        if from.is_int(&self.ctx) && target.is_float(&self.ctx) {
            let conv = Instruction::conversion(&mut self.ctx, ConversionOp::SiToFp, target, value);
            self.emit(conv);
            conv.get_result(&self.ctx).expect("sitofp has no result")
        } else if from.is_float(&self.ctx) && target.is_int(&self.ctx) {
            let conv = Instruction::conversion(&mut self.ctx, ConversionOp::FpToSi, target, value);
            self.emit(conv);
            conv.get_result(&self.ctx).expect("fptosi has no result")
        } else {
            // 指针等类型不做隐式转换
            value
        }
    }

    /// 二元运算的操作数提升：i1先到i32，混合整型浮点时整型一侧转浮点。
    /// 返回提升后的操作数和是否为浮点运算
    fn promote_pair(&mut self, lhs: Value, rhs: Value) -> (Value, Value, bool) {
        let int32 = Typ::int32(&mut self.ctx);
        let float32 = Typ::float32(&mut self.ctx);
        let mut lhs = if lhs.typ(&self.ctx).is_bool(&self.ctx) {
            self.coerce(lhs, int32)
        } else {
            lhs
        };
        let mut rhs = if rhs.typ(&self.ctx).is_bool(&self.ctx) {
            self.coerce(rhs, int32)
        } else {
            rhs
        };
        let is_float =
            lhs.typ(&self.ctx).is_float(&self.ctx) || rhs.typ(&self.ctx).is_float(&self.ctx);
        if is_float {
            lhs = self.coerce(lhs, float32);
            rhs = self.coerce(rhs, float32);
        }
        (lhs, rhs, is_float)
    }

    /// 比较运算，返回i1值
    fn gen_compare(&mut self, op: BinaryOp, lhs: &Exp, rhs: &Exp) -> Result<Value, Diagnostic> {
        let lhs = self.gen_exp(lhs)?;
        let rhs = self.gen_exp(rhs)?;
        let (lhs, rhs, is_float) = self.promote_pair(lhs, rhs);
        let instruction = if is_float {
            let cond = match op {
                BinaryOp::Lt => FCompCond::Olt,
                BinaryOp::Gt => FCompCond::Ogt,
                BinaryOp::Le => FCompCond::Ole,
                BinaryOp::Ge => FCompCond::Oge,
                BinaryOp::Eq => FCompCond::Oeq,
                BinaryOp::Ne => FCompCond::One,
                _ => unreachable!("not a comparison operator"),
            };
            Instruction::fcmp(&mut self.ctx, cond, lhs, rhs)
        } else {
            let cond = match op {
                BinaryOp::Lt => ICompCond::Slt,
                BinaryOp::Gt => ICompCond::Sgt,
                BinaryOp::Le => ICompCond::Sle,
                BinaryOp::Ge => ICompCond::Sge,
                BinaryOp::Eq => ICompCond::Eq,
                BinaryOp::Ne => ICompCond::Ne,
                _ => unreachable!("not a comparison operator"),
            };
            Instruction::icmp(&mut self.ctx, cond, lhs, rhs)
        };
        self.emit(instruction);
        Ok(instruction.get_result(&self.ctx).expect("cmp has no result"))
    }

    /// 把i1比较结果扩展为i32，供值语境使用
    fn widen_bool(&mut self, value: Value) -> Value {
        let int32 = Typ::int32(&mut self.ctx);
        self.coerce(value, int32)
    }

    /// 值与0比较得到i1。negate为真时取等于零（即逻辑非）
    fn truth_value(&mut self, value: Value, negate: bool) -> Value {
        let (value, is_float) = if value.typ(&self.ctx).is_bool(&self.ctx) {
            (self.widen_bool(value), false)
        } else {
            (value, value.typ(&self.ctx).is_float(&self.ctx))
        };
        let instruction = if is_float {
            let zero_typ = Typ::float32(&mut self.ctx);
            let zero = Value::constzero(&mut self.ctx, zero_typ);
            let cond = if negate { FCompCond::Oeq } else { FCompCond::One };
            Instruction::fcmp(&mut self.ctx, cond, value, zero)
        } else {
            let zero_typ = Typ::int32(&mut self.ctx);
            let zero = Value::constzero(&mut self.ctx, zero_typ);
            let cond = if negate { ICompCond::Eq } else { ICompCond::Ne };
            Instruction::icmp(&mut self.ctx, cond, value, zero)
        };
        self.emit(instruction);
        instruction.get_result(&self.ctx).expect("cmp has no result")
    }

    /// 表达式翻译为IR值。能折叠的直接以常量呈现
    fn gen_exp(&mut self, exp: &Exp) -> Result<Value, Diagnostic> {
        if let Some(folded) = self.try_fold(exp)? {
            // 布尔折叠结果在值语境中就是0或1
            return Ok(self.comptime2value(&folded));
        }
        match exp {
            Exp::Const(v) => {
                let v = *v;
                Ok(self.comptime2value(&v))
            }
            Exp::Binary(op, lhs, rhs) => match op {
                BinaryOp::Add
                | BinaryOp::Sub
                | BinaryOp::Mul
                | BinaryOp::Div
                | BinaryOp::Mod => {
                    let lhs = self.gen_exp(lhs)?;
                    let rhs = self.gen_exp(rhs)?;
                    let (lhs, rhs, is_float) = self.promote_pair(lhs, rhs);
                    if is_float && matches!(op, BinaryOp::Mod) {
                        return Err(Diagnostic::TypeMismatch(
                            "operands of `%` must be integers".to_string(),
                        ));
                    }
                    let op_kind = match (op, is_float) {
                        (BinaryOp::Add, true) => IBinaryOp::Fadd,
                        (BinaryOp::Add, false) => IBinaryOp::Add,
                        (BinaryOp::Sub, true) => IBinaryOp::Fsub,
                        (BinaryOp::Sub, false) => IBinaryOp::Sub,
                        (BinaryOp::Mul, true) => IBinaryOp::Fmul,
                        (BinaryOp::Mul, false) => IBinaryOp::Mul,
                        (BinaryOp::Div, true) => IBinaryOp::Fdiv,
                        (BinaryOp::Div, false) => IBinaryOp::Sdiv,
                        (BinaryOp::Mod, false) => IBinaryOp::Srem,
                        _ => unreachable!(),
                    };
                    let typ = if is_float {
                        Typ::float32(&mut self.ctx)
                    } else {
                        Typ::int32(&mut self.ctx)
                    };
                    let instruction = Instruction::binary(&mut self.ctx, op_kind, typ, lhs, rhs);
                    self.emit(instruction);
                    Ok(instruction
                        .get_result(&self.ctx)
                        .expect("binary has no result"))
                }
                BinaryOp::Lt
                | BinaryOp::Gt
                | BinaryOp::Le
                | BinaryOp::Ge
                | BinaryOp::Eq
                | BinaryOp::Ne => {
                    let cmp = self.gen_compare(*op, lhs, rhs)?;
                    Ok(self.widen_bool(cmp))
                }
                BinaryOp::And | BinaryOp::Or => self.gen_logical_value(exp),
            },
            Exp::Unary(op, inner) => match op {
                UnaryOp::Neg => {
                    let value = self.gen_exp(inner)?;
                    let int32 = Typ::int32(&mut self.ctx);
                    let value = if value.typ(&self.ctx).is_bool(&self.ctx) {
                        self.coerce(value, int32)
                    } else {
                        value
                    };
                    let typ = value.typ(&self.ctx);
                    let zero = Value::constzero(&mut self.ctx, typ);
                    let op_kind = if typ.is_float(&self.ctx) {
                        IBinaryOp::Fsub
                    } else {
                        IBinaryOp::Sub
                    };
                    let instruction =
                        Instruction::binary(&mut self.ctx, op_kind, typ, zero, value);
                    self.emit(instruction);
                    Ok(instruction
                        .get_result(&self.ctx)
                        .expect("binary has no result"))
                }
                UnaryOp::Not => {
                    // 连续的逻辑非折叠成一个带极性的零比较
                    let mut negate = true;
                    let mut inner: &Exp = inner;
                    while let Exp::Unary(UnaryOp::Not, next) = inner {
                        negate = !negate;
                        inner = next;
                    }
                    let value = self.gen_exp(inner)?;
                    let truth = self.truth_value(value, negate);
                    Ok(self.widen_bool(truth))
                }
            },
            Exp::LVal(lval) => {
                let (address, pointee) = self.lval_address(lval)?;
                if pointee.is_array(&self.ctx) {
                    // 数组退化为指向首元素的指针
                    let int32 = Typ::int32(&mut self.ctx);
                    let zero = Value::constzero(&mut self.ctx, int32);
                    let gep =
                        Instruction::gep(&mut self.ctx, pointee, address, vec![zero, zero]);
                    self.emit(gep);
                    Ok(gep.get_result(&self.ctx).expect("gep has no result"))
                } else {
                    let load = Instruction::load(&mut self.ctx, pointee, address);
                    self.emit(load);
                    Ok(load.get_result(&self.ctx).expect("load has no result"))
                }
            }
            Exp::Call(call) => match self.gen_call(call)? {
                Some(value) => Ok(value),
                None => Err(Diagnostic::TypeMismatch(format!(
                    "void value of call to `{}` used in expression",
                    call.id
                ))),
            },
        }
    }

    /// 值语境中的&&和||，通过临时栈槽物化为0或1
    fn gen_logical_value(&mut self, exp: &Exp) -> Result<Value, Diagnostic> {
        let int32 = Typ::int32(&mut self.ctx);
        let slot = self.alloc_slot(int32);

        let true_bbk = BasicBlock::new(&mut self.ctx);
        let false_bbk = BasicBlock::new(&mut self.ctx);
        self.gen_cond(exp, true_bbk, false_bbk)?;
        let join_bbk = BasicBlock::new(&mut self.ctx);

        self.cur_func
            .expect("no current function")
            .push_back(&mut self.ctx, true_bbk)
            .unwrap_or_else(|_| unreachable!());
        self.cur_bbk = Some(true_bbk);
        let one_const = ConstantValue::int32(&mut self.ctx, 1);
        let one = Value::constant(&mut self.ctx, one_const);
        let store = Instruction::store(&mut self.ctx, one, slot);
        self.emit(store);
        let br = Instruction::br(&mut self.ctx, join_bbk);
        self.emit(br);

        self.cur_func
            .expect("no current function")
            .push_back(&mut self.ctx, false_bbk)
            .unwrap_or_else(|_| unreachable!());
        self.cur_bbk = Some(false_bbk);
        let zero = Value::constzero(&mut self.ctx, int32);
        let store = Instruction::store(&mut self.ctx, zero, slot);
        self.emit(store);
        let br = Instruction::br(&mut self.ctx, join_bbk);
        self.emit(br);

        self.cur_func
            .expect("no current function")
            .push_back(&mut self.ctx, join_bbk)
            .unwrap_or_else(|_| unreachable!());
        self.cur_bbk = Some(join_bbk);
        let load = Instruction::load(&mut self.ctx, int32, slot);
        self.emit(load);
        Ok(load.get_result(&self.ctx).expect("load has no result"))
    }

    /// 函数调用。返回None表示void调用
    fn gen_call(&mut self, call: &Call) -> Result<Option<Value>, Diagnostic> {
        let entry = self.symboltable.resolve(&call.id)?.clone();
        let (param_tys, ret_ty) = match entry.kind {
            SymbolKind::Function { params, ret } => (params, ret),
            _ => return Err(Diagnostic::NotCallable(call.id.clone())),
        };
        if call.args.len() != param_tys.len() {
            return Err(Diagnostic::TypeMismatch(format!(
                "call to `{}` expects {} argument(s), got {}",
                call.id,
                param_tys.len(),
                call.args.len()
            )));
        }

        let mut args = Vec::with_capacity(call.args.len());
        for (arg, param_ty) in call.args.iter().zip(param_tys) {
            let value = self.gen_exp(arg)?;
            args.push(self.coerce(value, param_ty));
        }

        let instruction = Instruction::call(&mut self.ctx, ret_ty, call.id.clone(), args);
        self.emit(instruction);
        Ok(instruction.get_result(&self.ctx))
    }

    /// 计算左值地址，返回（地址，地址指向的类型）
    fn lval_address(&mut self, lval: &LVal) -> Result<(Value, Typ), Diagnostic> {
        let entry = self.symboltable.resolve(&lval.id)?.clone();
        let var_ty = entry.typ;

        let mut indices = Vec::with_capacity(lval.indices.len());
        for index in &lval.indices {
            let value = self.gen_exp(index)?;
            let int32 = Typ::int32(&mut self.ctx);
            indices.push(self.coerce(value, int32));
        }

        let base = match entry.kind {
            SymbolKind::Local(slot) => {
                if var_ty.is_ptr(&self.ctx) && !indices.is_empty() {
                    // 退化的数组参数，先取出指针本体再做地址计算
                    let load = Instruction::load(&mut self.ctx, var_ty, slot);
                    self.emit(load);
                    let pointer = load.get_result(&self.ctx).expect("load has no result");
                    let pointee = var_ty
                        .pointee(&self.ctx)
                        .expect("pointer type has no pointee");
                    let final_ty = Self::peel_array(&self.ctx, pointee, indices.len() - 1);
                    let gep = Instruction::gep(&mut self.ctx, pointee, pointer, indices);
                    self.emit(gep);
                    return Ok((
                        gep.get_result(&self.ctx).expect("gep has no result"),
                        final_ty,
                    ));
                }
                slot
            }
            SymbolKind::Global(global) => {
                let name = global.name(&self.ctx).to_string();
                let value_ty = global.typ(&self.ctx);
                Value::global_ptr(&mut self.ctx, name, value_ty)
            }
            SymbolKind::Function { .. } => {
                return Err(Diagnostic::TypeMismatch(format!(
                    "`{}` is a function, not a variable",
                    lval.id
                )));
            }
        };

        if indices.is_empty() {
            return Ok((base, var_ty));
        }
        if !var_ty.is_array(&self.ctx) {
            return Err(Diagnostic::TypeMismatch(format!(
                "`{}` is not an array but is subscripted",
                lval.id
            )));
        }

        // 数组下标前补0跨过数组本体
        let int32 = Typ::int32(&mut self.ctx);
        let zero = Value::constzero(&mut self.ctx, int32);
        let mut path = vec![zero];
        let index_count = indices.len();
        path.extend(indices);
        let final_ty = Self::peel_array(&self.ctx, var_ty, index_count);
        let gep = Instruction::gep(&mut self.ctx, var_ty, base, path);
        self.emit(gep);
        Ok((
            gep.get_result(&self.ctx).expect("gep has no result"),
            final_ty,
        ))
    }

    /// 从数组类型剥掉n层维度
    fn peel_array(ctx: &Context, typ: Typ, n: usize) -> Typ {
        let mut typ = typ;
        for _ in 0..n {
            typ = match typ.as_array(ctx) {
                Some((element, _)) => element,
                None => typ,
            };
        }
        typ
    }

    // ------------------------------------------------------------------
    // 条件翻译
    // ------------------------------------------------------------------

    /// 把条件表达式翻译为到iftrue/iffalse的跳转。
    /// 短路运算通过中间块实现，常量条件直接变成无条件跳转
    fn gen_cond(
        &mut self,
        cond: &Exp,
        iftrue: BasicBlock,
        iffalse: BasicBlock,
    ) -> Result<(), Diagnostic> {
        if self.cur_bbk.expect("no current basic block").is_terminated(&self.ctx) {
            return Ok(());
        }

        if let Some(folded) = self.try_fold(cond)? {
            let target = if folded.as_bool() { iftrue } else { iffalse };
            let br = Instruction::br(&mut self.ctx, target);
            self.emit(br);
            return Ok(());
        }

        match cond {
            Exp::Binary(BinaryOp::And, lhs, rhs) => {
                // 左操作数是常量时不需要中间块，为假直接跳false目标，为真只翻译右边
                if let Some(folded) = self.try_fold(lhs)? {
                    if !folded.as_bool() {
                        let br = Instruction::br(&mut self.ctx, iffalse);
                        self.emit(br);
                        return Ok(());
                    }
                    return self.gen_cond(rhs, iftrue, iffalse);
                }
                let mid = BasicBlock::new(&mut self.ctx);
                self.gen_cond(lhs, mid, iffalse)?;
                self.cur_func
                    .expect("no current function")
                    .push_back(&mut self.ctx, mid)
                    .unwrap_or_else(|_| unreachable!());
                self.cur_bbk = Some(mid);
                self.gen_cond(rhs, iftrue, iffalse)
            }
            Exp::Binary(BinaryOp::Or, lhs, rhs) => {
                if let Some(folded) = self.try_fold(lhs)? {
                    if folded.as_bool() {
                        let br = Instruction::br(&mut self.ctx, iftrue);
                        self.emit(br);
                        return Ok(());
                    }
                    return self.gen_cond(rhs, iftrue, iffalse);
                }
                let mid = BasicBlock::new(&mut self.ctx);
                self.gen_cond(lhs, iftrue, mid)?;
                self.cur_func
                    .expect("no current function")
                    .push_back(&mut self.ctx, mid)
                    .unwrap_or_else(|_| unreachable!());
                self.cur_bbk = Some(mid);
                self.gen_cond(rhs, iftrue, iffalse)
            }
            Exp::Unary(UnaryOp::Not, inner) => self.gen_cond(inner, iffalse, iftrue),
            Exp::Binary(op, lhs, rhs)
                if matches!(
                    op,
                    BinaryOp::Lt
                        | BinaryOp::Gt
                        | BinaryOp::Le
                        | BinaryOp::Ge
                        | BinaryOp::Eq
                        | BinaryOp::Ne
                ) =>
            {
                let cmp = self.gen_compare(*op, lhs, rhs)?;
                let cbr = Instruction::cbr(&mut self.ctx, cmp, iftrue, iffalse);
                self.emit(cbr);
                Ok(())
            }
            _ => {
                let value = self.gen_exp(cond)?;
                let truth = self.truth_value(value, false);
                let cbr = Instruction::cbr(&mut self.ctx, truth, iftrue, iffalse);
                self.emit(cbr);
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // 语句和声明
    // ------------------------------------------------------------------

    fn gen_stmt(&mut self, stmt: &Stmt, loop_ctx: Option<LoopBlocks>) -> Result<(), Diagnostic> {
        match stmt {
            Stmt::Assign { lval, exp } => {
                let (address, pointee) = self.lval_address(lval)?;
                if pointee.is_array(&self.ctx) || pointee.is_ptr(&self.ctx) {
                    return Err(Diagnostic::TypeMismatch(format!(
                        "cannot assign to array `{}`",
                        lval.id
                    )));
                }
                let value = self.gen_exp(exp)?;
                let value = self.coerce(value, pointee);
                let store = Instruction::store(&mut self.ctx, value, address);
                self.emit(store);
                Ok(())
            }
            Stmt::Exp(exp) => {
                if let Some(exp) = exp {
                    // void调用只能出现在表达式语句里
                    if let Exp::Call(call) = exp {
                        self.gen_call(call)?;
                    } else {
                        self.gen_exp(exp)?;
                    }
                }
                Ok(())
            }
            Stmt::Block(block) => self.gen_block(block, loop_ctx),
            Stmt::If(boxed) => {
                // 常量条件只生成被选中的分支
                if let Some(folded) = self.try_fold(&boxed.cond)? {
                    if folded.as_bool() {
                        return self.gen_stmt(&boxed.then, loop_ctx);
                    } else if let Some(or_else) = &boxed.or_else {
                        return self.gen_stmt(or_else, loop_ctx);
                    }
                    return Ok(());
                }

                let then_bbk = BasicBlock::new(&mut self.ctx);
                let exit_bbk = BasicBlock::new(&mut self.ctx);
                let else_bbk = boxed.or_else.as_ref().map(|_| BasicBlock::new(&mut self.ctx));

                self.gen_cond(&boxed.cond, then_bbk, else_bbk.unwrap_or(exit_bbk))?;

                self.cur_func
                    .expect("no current function")
                    .push_back(&mut self.ctx, then_bbk)
                    .unwrap_or_else(|_| unreachable!());
                self.cur_bbk = Some(then_bbk);
                self.gen_stmt(&boxed.then, loop_ctx)?;
                if !self.cur_bbk.expect("no current basic block").is_terminated(&self.ctx) {
                    let br = Instruction::br(&mut self.ctx, exit_bbk);
                    self.emit(br);
                }

                if let (Some(else_bbk), Some(or_else)) = (else_bbk, boxed.or_else.as_ref()) {
                    self.cur_func
                        .expect("no current function")
                        .push_back(&mut self.ctx, else_bbk)
                        .unwrap_or_else(|_| unreachable!());
                    self.cur_bbk = Some(else_bbk);
                    self.gen_stmt(or_else, loop_ctx)?;
                    if !self.cur_bbk.expect("no current basic block").is_terminated(&self.ctx) {
                        let br = Instruction::br(&mut self.ctx, exit_bbk);
                        self.emit(br);
                    }
                }

                self.cur_func
                    .expect("no current function")
                    .push_back(&mut self.ctx, exit_bbk)
                    .unwrap_or_else(|_| unreachable!());
                self.cur_bbk = Some(exit_bbk);
                Ok(())
            }
            Stmt::While(boxed) => {
                let cond_bbk = self.append_block();
                let body_bbk = BasicBlock::new(&mut self.ctx);
                let exit_bbk = BasicBlock::new(&mut self.ctx);

                let br = Instruction::br(&mut self.ctx, cond_bbk);
                self.emit(br);
                self.cur_bbk = Some(cond_bbk);
                self.gen_cond(&boxed.cond, body_bbk, exit_bbk)?;

                self.cur_func
                    .expect("no current function")
                    .push_back(&mut self.ctx, body_bbk)
                    .unwrap_or_else(|_| unreachable!());
                self.cur_bbk = Some(body_bbk);
                self.gen_stmt(
                    &boxed.body,
                    Some(LoopBlocks {
                        cond: cond_bbk,
                        exit: exit_bbk,
                    }),
                )?;
                if !self.cur_bbk.expect("no current basic block").is_terminated(&self.ctx) {
                    let br = Instruction::br(&mut self.ctx, cond_bbk);
                    self.emit(br);
                }

                self.cur_func
                    .expect("no current function")
                    .push_back(&mut self.ctx, exit_bbk)
                    .unwrap_or_else(|_| unreachable!());
                self.cur_bbk = Some(exit_bbk);
                Ok(())
            }
            Stmt::Break => {
                let loop_ctx = loop_ctx.ok_or(Diagnostic::BreakOutsideLoop)?;
                let br = Instruction::br(&mut self.ctx, loop_ctx.exit);
                self.emit(br);
                Ok(())
            }
            Stmt::Continue => {
                let loop_ctx = loop_ctx.ok_or(Diagnostic::ContinueOutsideLoop)?;
                let br = Instruction::br(&mut self.ctx, loop_ctx.cond);
                self.emit(br);
                Ok(())
            }
            Stmt::Return(exp) => {
                let ret_ty = self
                    .cur_func
                    .expect("no current function")
                    .get_return_type(&self.ctx);
                let value = match exp {
                    Some(_) if ret_ty.is_void(&self.ctx) => {
                        return Err(Diagnostic::TypeMismatch(
                            "void function returns a value".to_string(),
                        ));
                    }
                    Some(exp) => {
                        let value = self.gen_exp(exp)?;
                        Some(self.coerce(value, ret_ty))
                    }
                    None if ret_ty.is_void(&self.ctx) => None,
                    // 非void函数的空return按返回零处理
                    None => Some(Value::constzero(&mut self.ctx, ret_ty)),
                };
                let ret = Instruction::ret(&mut self.ctx, value);
                self.emit(ret);
                Ok(())
            }
        }
    }

    fn gen_block(&mut self, block: &Block, loop_ctx: Option<LoopBlocks>) -> Result<(), Diagnostic> {
        self.symboltable.enter_scope();
        let result = self.gen_block_items(&block.items, loop_ctx);
        self.symboltable.leave_scope();
        result
    }

    fn gen_block_items(
        &mut self,
        items: &[BlockItem],
        loop_ctx: Option<LoopBlocks>,
    ) -> Result<(), Diagnostic> {
        for item in items {
            // 终结之后的语句不可达，直接跳过
            if self.cur_bbk.expect("no current basic block").is_terminated(&self.ctx) {
                break;
            }
            match item {
                BlockItem::Decl(decl) => self.gen_local_decl(decl)?,
                BlockItem::Stmt(stmt) => self.gen_stmt(stmt, loop_ctx)?,
            }
        }
        Ok(())
    }

    /// 局部变量和局部常量声明
    fn gen_local_decl(&mut self, decl: &Decl) -> Result<(), Diagnostic> {
        for def in &decl.defs {
            self.gen_local_def(decl.is_const, decl.typ, def)?;
        }
        Ok(())
    }

    fn gen_local_def(
        &mut self,
        is_const: bool,
        btype: BType,
        def: &VarDef,
    ) -> Result<(), Diagnostic> {
        if matches!(btype, BType::Void) {
            return Err(Diagnostic::TypeMismatch(format!(
                "variable `{}` declared void",
                def.id
            )));
        }
        let elem_ty = self.btype2ir(btype);
        let dims = self.fold_dimensions(&def.dimensions)?;

        if dims.is_empty() {
            // 标量
            let slot = self.alloc_slot(elem_ty);
            if is_const {
                let init = match &def.init {
                    Some(InitVal::Exp(exp)) => exp,
                    _ => {
                        return Err(Diagnostic::TypeMismatch(format!(
                            "const `{}` requires a scalar initializer",
                            def.id
                        )));
                    }
                };
                let folded = self.fold_exp(init)?;
                let folded = self.comptime_as(folded, btype);
                let value = self.comptime2value(&folded);
                let store = Instruction::store(&mut self.ctx, value, slot);
                self.emit(store);
                self.symboltable.declare(
                    def.id.clone(),
                    SymbolEntry {
                        typ: elem_ty,
                        kind: SymbolKind::Local(slot),
                    },
                )?;
                self.symboltable.declare_const(def.id.clone(), vec![], folded)?;
            } else {
                if let Some(init) = &def.init {
                    let exp = match init {
                        InitVal::Exp(exp) => exp,
                        InitVal::List(_) => {
                            return Err(Diagnostic::TypeMismatch(format!(
                                "scalar `{}` initialized with a list",
                                def.id
                            )));
                        }
                    };
                    let value = self.gen_exp(exp)?;
                    let value = self.coerce(value, elem_ty);
                    let store = Instruction::store(&mut self.ctx, value, slot);
                    self.emit(store);
                }
                self.symboltable.declare(
                    def.id.clone(),
                    SymbolEntry {
                        typ: elem_ty,
                        kind: SymbolKind::Local(slot),
                    },
                )?;
            }
            return Ok(());
        }

        // 数组
        let array_ty = self.build_array_typ(elem_ty, &dims);
        let slot = self.alloc_slot(array_ty);
        self.symboltable.declare(
            def.id.clone(),
            SymbolEntry {
                typ: array_ty,
                kind: SymbolKind::Local(slot),
            },
        )?;

        match &def.init {
            None if is_const => {
                return Err(Diagnostic::TypeMismatch(format!(
                    "const array `{}` requires an initializer",
                    def.id
                )));
            }
            None => Ok(()),
            Some(InitVal::Exp(_)) => Err(Diagnostic::TypeMismatch(format!(
                "array `{}` initialized with a scalar",
                def.id
            ))),
            Some(InitVal::List(items)) => {
                let total: usize = dims.iter().product();
                let mut flat: Vec<Option<&Exp>> = vec![None; total];
                Self::flatten_init(items, &dims, &mut flat)?;

                if is_const {
                    // 常量数组的每个元素都进常量表，包括补零的
                    for (i, slot_exp) in flat.iter().enumerate() {
                        let folded = match slot_exp {
                            Some(exp) => self.comptime_as(self.fold_exp(exp)?, btype),
                            None => self.comptime_as(ComptimeValue::Int(0), btype),
                        };
                        let subscripts = Self::unflatten_index(&dims, i);
                        self.symboltable
                            .declare_const(def.id.clone(), subscripts, folded)?;
                    }
                }

                // 先整体置零，再逐个store非零元素
                self.emit_array_zeroing(slot, elem_ty, total);
                for (i, init_exp) in flat.iter().enumerate() {
                    let exp = match init_exp {
                        Some(exp) => *exp,
                        None => continue,
                    };
                    if let Some(folded) = self.try_fold(exp)? {
                        if self.comptime_as(folded, btype).is_zero() {
                            continue;
                        }
                    }
                    let value = self.gen_exp(exp)?;
                    let value = self.coerce(value, elem_ty);

                    let int32 = Typ::int32(&mut self.ctx);
                    let zero = Value::constzero(&mut self.ctx, int32);
                    let mut path = vec![zero];
                    for sub in Self::unflatten_index(&dims, i) {
                        let index_const = ConstantValue::int32(&mut self.ctx, sub as i32);
                        path.push(Value::constant(&mut self.ctx, index_const));
                    }
                    let gep = Instruction::gep(&mut self.ctx, array_ty, slot, path);
                    self.emit(gep);
                    let elem_slot = gep.get_result(&self.ctx).expect("gep has no result");
                    let store = Instruction::store(&mut self.ctx, value, elem_slot);
                    self.emit(store);
                }
                Ok(())
            }
        }
    }

    /// 调用运行时库把整个数组填零
    fn emit_array_zeroing(&mut self, slot: Value, elem_ty: Typ, count: usize) {
        let name = if elem_ty.is_float(&self.ctx) {
            "sysy_memset_float"
        } else {
            "sysy_memset_int"
        };
        let elem_ptr_ty = Typ::ptr(&mut self.ctx, elem_ty);
        let bitcast =
            Instruction::conversion(&mut self.ctx, ConversionOp::Bitcast, elem_ptr_ty, slot);
        self.emit(bitcast);
        let base = bitcast.get_result(&self.ctx).expect("bitcast has no result");
        // 填充值参数固定为i32，浮点数组按位清零效果相同
        let int32 = Typ::int32(&mut self.ctx);
        let zero = Value::constzero(&mut self.ctx, int32);
        let count_const = ConstantValue::int32(&mut self.ctx, count as i32);
        let count = Value::constant(&mut self.ctx, count_const);
        let void = Typ::void(&mut self.ctx);
        let call = Instruction::call(
            &mut self.ctx,
            void,
            name.to_string(),
            vec![base, zero, count],
        );
        self.emit(call);
    }

    /// 把嵌套初始化列表摊平到一维。
    /// 子列表对齐到下一级子数组的边界，多余的初始化项报错
    fn flatten_init<'a>(
        items: &'a [InitVal],
        dims: &[usize],
        flat: &mut [Option<&'a Exp>],
    ) -> Result<(), Diagnostic> {
        let sub: usize = dims.iter().skip(1).product();
        let mut cursor = 0usize;
        for item in items {
            match item {
                InitVal::Exp(exp) => {
                    if cursor >= flat.len() {
                        return Err(Diagnostic::TypeMismatch(
                            "too many initializers for array".to_string(),
                        ));
                    }
                    flat[cursor] = Some(exp);
                    cursor += 1;
                }
                InitVal::List(inner) => {
                    if sub != 0 && cursor % sub != 0 {
                        cursor += sub - cursor % sub;
                    }
                    if cursor + sub > flat.len() {
                        return Err(Diagnostic::TypeMismatch(
                            "too many initializers for array".to_string(),
                        ));
                    }
                    let inner_dims = dims.get(1..).unwrap_or(&[]);
                    Self::flatten_init(inner, inner_dims, &mut flat[cursor..cursor + sub])?;
                    cursor += sub;
                }
            }
        }
        Ok(())
    }

    /// 一维下标还原成多维下标
    fn unflatten_index(dims: &[usize], mut index: usize) -> Vec<usize> {
        let mut subscripts = vec![0usize; dims.len()];
        for (j, &dim) in dims.iter().enumerate().rev() {
            subscripts[j] = index % dim;
            index /= dim;
        }
        subscripts
    }

    // ------------------------------------------------------------------
    // 全局项
    // ------------------------------------------------------------------

    fn gen_global_decl(&mut self, decl: &Decl) -> Result<(), Diagnostic> {
        for def in &decl.defs {
            self.gen_global_def(decl.is_const, decl.typ, def)?;
        }
        Ok(())
    }

    fn gen_global_def(
        &mut self,
        is_const: bool,
        btype: BType,
        def: &VarDef,
    ) -> Result<(), Diagnostic> {
        if matches!(btype, BType::Void) {
            return Err(Diagnostic::TypeMismatch(format!(
                "variable `{}` declared void",
                def.id
            )));
        }
        let elem_ty = self.btype2ir(btype);
        let dims = self.fold_dimensions(&def.dimensions)?;
        debug!("irgen: global `{}`", def.id);

        let constant = if dims.is_empty() {
            let folded = match &def.init {
                Some(InitVal::Exp(exp)) => self.comptime_as(self.fold_exp(exp)?, btype),
                Some(InitVal::List(_)) => {
                    return Err(Diagnostic::TypeMismatch(format!(
                        "scalar `{}` initialized with a list",
                        def.id
                    )));
                }
                None if is_const => {
                    return Err(Diagnostic::TypeMismatch(format!(
                        "const `{}` requires an initializer",
                        def.id
                    )));
                }
                None => self.comptime_as(ComptimeValue::Int(0), btype),
            };
            if is_const {
                self.symboltable.declare_const(def.id.clone(), vec![], folded)?;
            }
            self.comptime2const(&folded)
        } else {
            let total: usize = dims.iter().product();
            let mut folded = vec![self.comptime_as(ComptimeValue::Int(0), btype); total];
            if let Some(init) = &def.init {
                let items = match init {
                    InitVal::List(items) => items,
                    InitVal::Exp(_) => {
                        return Err(Diagnostic::TypeMismatch(format!(
                            "array `{}` initialized with a scalar",
                            def.id
                        )));
                    }
                };
                let mut flat: Vec<Option<&Exp>> = vec![None; total];
                Self::flatten_init(items, &dims, &mut flat)?;
                for (i, slot) in flat.iter().enumerate() {
                    if let Some(exp) = slot {
                        folded[i] = self.comptime_as(self.fold_exp(exp)?, btype);
                    }
                }
            } else if is_const {
                return Err(Diagnostic::TypeMismatch(format!(
                    "const array `{}` requires an initializer",
                    def.id
                )));
            }

            if is_const {
                for (i, value) in folded.iter().enumerate() {
                    let subscripts = Self::unflatten_index(&dims, i);
                    self.symboltable
                        .declare_const(def.id.clone(), subscripts, *value)?;
                }
            }
            self.build_const_array(elem_ty, &dims, &folded)
        };

        let var_ty = self.build_array_typ(elem_ty, &dims);
        let global = Global::new(&mut self.ctx, def.id.clone(), constant);
        self.symboltable.declare(
            def.id.clone(),
            SymbolEntry {
                typ: var_ty,
                kind: SymbolKind::Global(global),
            },
        )?;
        Ok(())
    }

    /// 把摊平的编译期值还原成嵌套的IR常量，全零的子数组压缩成zeroinitializer
    fn build_const_array(
        &mut self,
        elem_ty: Typ,
        dims: &[usize],
        flat: &[ComptimeValue],
    ) -> ConstantValue {
        if dims.is_empty() {
            return self.comptime2const(&flat[0]);
        }
        let typ = self.build_array_typ(elem_ty, dims);
        if flat.iter().all(|v| v.is_zero()) {
            return ConstantValue::zero(typ);
        }
        let chunk = flat.len() / dims[0];
        let mut elements = Vec::with_capacity(dims[0]);
        for i in 0..dims[0] {
            elements.push(self.build_const_array(
                elem_ty,
                &dims[1..],
                &flat[i * chunk..(i + 1) * chunk],
            ));
        }
        ConstantValue::array(typ, elements)
    }

    fn gen_funcdef(&mut self, func: &FuncDef) -> Result<(), Diagnostic> {
        debug!("irgen: function `{}`", func.id);
        let ret_ty = self.btype2ir(func.ret_typ);

        // 参数的IR类型。数组参数退化为指针，最左维度已省略
        let mut param_tys = Vec::with_capacity(func.params.len());
        for FuncParam {
            typ, dimensions, ..
        } in &func.params
        {
            if matches!(typ, BType::Void) {
                return Err(Diagnostic::TypeMismatch(
                    "parameter declared void".to_string(),
                ));
            }
            let base = self.btype2ir(*typ);
            let param_ty = match dimensions {
                Some(dims) => {
                    let dims = self.fold_dimensions(dims)?;
                    let inner = self.build_array_typ(base, &dims);
                    Typ::ptr(&mut self.ctx, inner)
                }
                None => base,
            };
            param_tys.push(param_ty);
        }

        self.symboltable.declare(
            func.id.clone(),
            SymbolEntry {
                typ: ret_ty,
                kind: SymbolKind::Function {
                    params: param_tys.clone(),
                    ret: ret_ty,
                },
            },
        )?;

        let function = Function::new(&mut self.ctx, func.id.clone(), ret_ty);
        let entry = BasicBlock::new(&mut self.ctx);
        function
            .push_back(&mut self.ctx, entry)
            .unwrap_or_else(|_| unreachable!());
        self.cur_func = Some(function);
        self.cur_bbk = Some(entry);
        self.entry_bbk = Some(entry);

        // 参数与函数体共用一个作用域
        self.symboltable.enter_scope();
        for (param, &param_ty) in func.params.iter().zip(&param_tys) {
            let value = function.add_parameter(&mut self.ctx, param_ty);
            let slot = self.alloc_slot(param_ty);
            let store = Instruction::store(&mut self.ctx, value, slot);
            self.emit(store);
            self.symboltable.declare(
                param.id.clone(),
                SymbolEntry {
                    typ: param_ty,
                    kind: SymbolKind::Local(slot),
                },
            )?;
        }

        let result = self.gen_block_items(&func.body.items, None);

        // 所有路径都可能走到函数末尾，补一条默认返回
        if result.is_ok()
            && !self
                .cur_bbk
                .expect("no current basic block")
                .is_terminated(&self.ctx)
        {
            let value = if ret_ty.is_void(&self.ctx) {
                None
            } else {
                Some(Value::constzero(&mut self.ctx, ret_ty))
            };
            let ret = Instruction::ret(&mut self.ctx, value);
            self.emit(ret);
        }

        self.symboltable.leave_scope();
        self.cur_func = None;
        self.cur_bbk = None;
        self.entry_bbk = None;
        result
    }

    /// 登记运行时库的符号和声明
    fn gen_sysylib(&mut self) {
        self.symboltable.register_sysylib(&mut self.ctx);

        let void = Typ::void(&mut self.ctx);
        let int = Typ::int32(&mut self.ctx);
        let float = Typ::float32(&mut self.ctx);
        let int_ptr = Typ::ptr(&mut self.ctx, int);
        let float_ptr = Typ::ptr(&mut self.ctx, float);

        let decls = [
            ("getint", vec![], int),
            ("getch", vec![], int),
            ("getfloat", vec![], float),
            ("getarray", vec![int_ptr], int),
            ("getfarray", vec![float_ptr], int),
            ("putint", vec![int], void),
            ("putch", vec![int], void),
            ("putfloat", vec![float], void),
            ("putarray", vec![int, int_ptr], void),
            ("putfarray", vec![int, float_ptr], void),
            ("_sysy_starttime", vec![int], void),
            ("_sysy_stoptime", vec![int], void),
            ("sysy_memset_int", vec![int_ptr, int, int], void),
            ("sysy_memset_float", vec![float_ptr, int, int], void),
        ];
        for (name, parameters_typ, return_type) in decls {
            self.ctx.add_funcdecl(FunctionDecl {
                name: name.to_string(),
                parameters_typ,
                return_type,
            });
        }
    }

    pub fn gen_compunit(&mut self, compunit: &CompUnit) -> Result<(), Diagnostic> {
        self.symboltable.enter_scope();
        self.gen_sysylib();
        let mut result = Ok(());
        for item in &compunit.items {
            result = match item {
                GlobalItem::Decl(decl) => self.gen_global_decl(decl),
                GlobalItem::FuncDef(func) => self.gen_funcdef(func),
            };
            if result.is_err() {
                break;
            }
        }
        self.symboltable.leave_scope();
        result
    }
}
