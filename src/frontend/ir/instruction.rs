use rustc_hash::FxHashSet as HashSet;

use crate::utils::{
    linked_list::{LinkedListContainer, LinkedListNode},
    storage::{Arena, ArenaPtr, GenericPtr},
};

use super::{
    basicblock::BasicBlock,
    context::Context,
    defuse::{Useable, User},
    typ::Typ,
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminatorOp {
    /// ret <type> <value>       ; 从非void函数返回
    /// ret void                 ; 从void函数返回
    Ret,
    /// br label <dest>          ; 无条件跳转
    Br,
    /// br i1 <cond>, label <iftrue>, label <iffalse>   ; 条件跳转
    CondBr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // <result> = add <Typ> <op1>, <op2>
    Add,
    Sub,
    Mul,
    Sdiv,
    Srem,
    // <result> = fadd <Typ> <op1>, <op2>
    Fadd,
    Fsub,
    Fmul,
    Fdiv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemAccessOp {
    // <result> = alloca <type>
    Alloca { typ: Typ },
    // <result> = load <Typ>, <Typ>* <pointer>
    Load,
    // store <Typ> <value>, <Typ>* <pointer>
    Store,
    // <result> = getelementptr <Typ>, <Typ>* <ptrval>, [<typ> <idx>]
    // 只做地址计算，不访问内存
    GetElementPtr { typ: Typ },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionOp {
    // 零扩展，i1到i32用它
    ZExt,
    // 浮点转有符号整数，向零截断
    FpToSi,
    // 有符号整数转浮点
    SiToFp,
    // 只改指针类型不改位模式
    Bitcast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ICompCond {
    Eq,
    Ne,
    Sgt,
    Sge,
    Slt,
    Sle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FCompCond {
    // 有序比较，任一操作数为NaN时为假
    Oeq,
    One,
    Ogt,
    Oge,
    Olt,
    Ole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    Terminator { op: TerminatorOp },
    Binary { op: BinaryOp },
    MemAccess { op: MemAccessOp },
    Conversion { op: ConversionOp },
    // <result> = icmp <cond> <Typ> <op1>, <op2>   ; yields i1
    IComp { cond: ICompCond },
    // <result> = fcmp <cond> <Typ> <op1>, <op2>   ; yields i1
    FComp { cond: FCompCond },
    // <result> = call <Typ> @<func>(<args>)
    Call,
}

#[derive(Debug)]
pub struct InstructionData {
    self_ptr: Instruction,
    kind: InstructionKind,
    operands: Vec<Value>,
    /// 分支指令的目标基本块
    targets: Vec<BasicBlock>,
    result: Option<Value>,
    succ: Option<Instruction>,
    pre: Option<Instruction>,
    basicblock: Option<BasicBlock>,
}

impl InstructionData {
    pub fn self_ptr(&self) -> Instruction {
        self.self_ptr
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Copy)]
pub struct Instruction(pub GenericPtr<InstructionData>);

impl Instruction {
    /// 创建一个还未指定操作数的指令，typ非void时同时分配结果Value
    fn new_without_operands(ctx: &mut Context, kind: InstructionKind, typ: Typ) -> Self {
        let instruction = ctx.alloc_with(|self_ptr| InstructionData {
            self_ptr,
            kind,
            operands: vec![],
            targets: vec![],
            result: None,
            succ: None,
            pre: None,
            basicblock: None,
        });

        if !typ.is_void(ctx) {
            let result = Value::inst_result(ctx, instruction, typ);
            instruction
                .deref_mut(ctx)
                .expect("Failed to deref `instructions` in struct `Context`")
                .result = Some(result);
            // 结果固定占第0个使用位置
            result.insert(ctx, User::new(instruction, 0));
        }
        instruction
    }

    /// 创建一个指定操作数的指令，操作数使用位置从1开始编号
    fn new_with_operands(
        ctx: &mut Context,
        kind: InstructionKind,
        typ: Typ,
        operands: Vec<Value>,
    ) -> Self {
        let instruction = Self::new_without_operands(ctx, kind, typ);
        for (i, op) in operands.iter().enumerate() {
            op.insert(ctx, User::new(instruction, i + 1));
        }
        instruction
            .deref_mut(ctx)
            .expect("Failed to deref `instructions` in struct `Context`")
            .operands = operands;
        instruction
    }

    /// 获取指定index位置的操作数
    pub fn get_operand(self, ctx: &Context, index: usize) -> Option<Value> {
        self.deref(ctx)
            .expect("Failed to deref `operands` in struct `Instruction`")
            .operands
            .get(index)
            .copied()
    }

    /// 获取所有操作数
    pub fn get_operands(self, ctx: &Context) -> Vec<Value> {
        self.deref(ctx)
            .expect("Failed to deref `operands` in struct `Instruction`")
            .operands
            .clone()
    }

    pub fn operand_count(self, ctx: &Context) -> usize {
        self.deref(ctx)
            .expect("Failed to deref `operands` in struct `Instruction`")
            .operands
            .len()
    }

    /// 获取跳转指令指定index的目标基本块
    pub fn get_target(self, ctx: &Context, index: usize) -> Option<BasicBlock> {
        self.deref(ctx)
            .expect("Failed to deref `targets` in struct `Instruction`")
            .targets
            .get(index)
            .copied()
    }

    /// 获取分支指令的全部目标基本块
    pub fn get_targets(self, ctx: &Context) -> Vec<BasicBlock> {
        self.deref(ctx)
            .expect("Failed to deref `targets` in struct `Instruction`")
            .targets
            .clone()
    }

    pub fn get_kind(&self, ctx: &Context) -> InstructionKind {
        self.deref(ctx)
            .expect("Failed to deref `kind` in struct `Instruction`")
            .kind
    }

    /// 获取指令的运算结果，无结果指令（store、terminator）返回None
    pub fn get_result(&self, ctx: &Context) -> Option<Value> {
        self.deref(ctx)
            .expect("Failed to deref `result` in struct `Instruction`")
            .result
    }

    /// 获取指令结果的类型
    pub fn result_typ(&self, ctx: &Context) -> Typ {
        self.get_result(ctx)
            .expect("Failed to get result from instruction")
            .typ(ctx)
    }

    /// 获取指令所在的基本块
    pub fn get_basicblock(&self, ctx: &Context) -> Option<BasicBlock> {
        self.deref(ctx)
            .expect("Failed to deref `basicblock` in struct `Instruction`")
            .basicblock
    }

    fn add_target(self, ctx: &mut Context, block: BasicBlock) {
        let index = self
            .deref(ctx)
            .expect("Failed to deref `targets` in struct `Instruction`")
            .targets
            .len();
        // 目标基本块的使用位置也从1开始编号，与操作数分开计数
        block.insert(ctx, User::new(self, index + 1));
        self.deref_mut(ctx)
            .expect("Failed to deref `targets` in struct `Instruction`")
            .targets
            .push(block);
    }

    /// 创建ret指令
    pub fn ret(ctx: &mut Context, value: Option<Value>) -> Self {
        let typ = Typ::void(ctx);
        let kind = InstructionKind::Terminator {
            op: TerminatorOp::Ret,
        };
        match value {
            Some(value) => Self::new_with_operands(ctx, kind, typ, vec![value]),
            None => Self::new_without_operands(ctx, kind, typ),
        }
    }

    /// 创建无条件跳转指令
    pub fn br(ctx: &mut Context, dest: BasicBlock) -> Self {
        let typ = Typ::void(ctx);
        let instruction = Self::new_without_operands(
            ctx,
            InstructionKind::Terminator {
                op: TerminatorOp::Br,
            },
            typ,
        );
        instruction.add_target(ctx, dest);
        instruction
    }

    /// 创建条件分支指令，cond必须是i1
    pub fn cbr(ctx: &mut Context, cond: Value, iftrue: BasicBlock, iffalse: BasicBlock) -> Self {
        let typ = Typ::void(ctx);
        let instruction = Self::new_with_operands(
            ctx,
            InstructionKind::Terminator {
                op: TerminatorOp::CondBr,
            },
            typ,
            vec![cond],
        );
        instruction.add_target(ctx, iftrue);
        instruction.add_target(ctx, iffalse);
        instruction
    }

    pub fn is_terminater(&self, ctx: &Context) -> bool {
        matches!(self.get_kind(ctx), InstructionKind::Terminator { .. })
    }

    pub fn is_cbr(&self, ctx: &Context) -> bool {
        matches!(
            self.get_kind(ctx),
            InstructionKind::Terminator {
                op: TerminatorOp::CondBr
            }
        )
    }

    /// 创建双目运算指令
    pub fn binary(ctx: &mut Context, op: BinaryOp, typ: Typ, op1: Value, op2: Value) -> Self {
        Self::new_with_operands(ctx, InstructionKind::Binary { op }, typ, vec![op1, op2])
    }

    /// 创建alloca指令，结果是指向typ的指针
    pub fn alloca(ctx: &mut Context, typ: Typ) -> Self {
        let ptr_typ = Typ::ptr(ctx, typ);
        Self::new_without_operands(
            ctx,
            InstructionKind::MemAccess {
                op: MemAccessOp::Alloca { typ },
            },
            ptr_typ,
        )
    }

    /// 创建load指令
    pub fn load(ctx: &mut Context, typ: Typ, pointer: Value) -> Self {
        Self::new_with_operands(
            ctx,
            InstructionKind::MemAccess {
                op: MemAccessOp::Load,
            },
            typ,
            vec![pointer],
        )
    }

    /// 创建store指令，无结果
    pub fn store(ctx: &mut Context, value: Value, pointer: Value) -> Self {
        let typ = Typ::void(ctx);
        Self::new_with_operands(
            ctx,
            InstructionKind::MemAccess {
                op: MemAccessOp::Store,
            },
            typ,
            vec![value, pointer],
        )
    }

    /// 创建getelementptr指令，pointee是base指向的类型
    pub fn gep(ctx: &mut Context, pointee: Typ, base: Value, indices: Vec<Value>) -> Self {
        // 第一个索引走过pointee本身，其余索引逐层剥数组维度
        let mut result_typ = pointee;
        for _ in indices.iter().skip(1) {
            result_typ = match result_typ.as_array(ctx) {
                Some((element, _)) => element,
                None => result_typ,
            };
        }
        let result_typ = Typ::ptr(ctx, result_typ);
        let mut operands = vec![base];
        operands.extend(indices);
        Self::new_with_operands(
            ctx,
            InstructionKind::MemAccess {
                op: MemAccessOp::GetElementPtr { typ: pointee },
            },
            result_typ,
            operands,
        )
    }

    /// 创建类型转换指令
    pub fn conversion(ctx: &mut Context, op: ConversionOp, dst_type: Typ, op1: Value) -> Self {
        Self::new_with_operands(ctx, InstructionKind::Conversion { op }, dst_type, vec![op1])
    }

    /// 创建整数比较指令，结果是i1
    pub fn icmp(ctx: &mut Context, cond: ICompCond, op1: Value, op2: Value) -> Self {
        let typ = Typ::bool(ctx);
        Self::new_with_operands(ctx, InstructionKind::IComp { cond }, typ, vec![op1, op2])
    }

    /// 创建浮点比较指令，结果是i1
    pub fn fcmp(ctx: &mut Context, cond: FCompCond, op1: Value, op2: Value) -> Self {
        let typ = Typ::bool(ctx);
        Self::new_with_operands(ctx, InstructionKind::FComp { cond }, typ, vec![op1, op2])
    }

    /// 创建call指令，被调函数作为第0个操作数
    pub fn call(ctx: &mut Context, typ: Typ, func: String, args: Vec<Value>) -> Self {
        let func = Value::function(ctx, func, typ);
        let mut operands = vec![func];
        operands.extend(args);
        Self::new_with_operands(ctx, InstructionKind::Call, typ, operands)
    }

    /// 移除一条指令，操作数与结果无其他使用者时一并释放
    pub fn remove(self, ctx: &mut Context) {
        let mut wait_to_remove = HashSet::default();
        for op in self.get_operands(ctx) {
            wait_to_remove.insert(op);
        }
        if let Some(res) = self.get_result(ctx) {
            wait_to_remove.insert(res);
        }
        for op in wait_to_remove {
            op.remove(ctx, self);
        }
        for target in self.get_targets(ctx) {
            if target.is_removed(ctx) {
                // 删除不可达基本块时目标可能已被移除，比如互相跳转的死块
                continue;
            }
            let target_users = target.users(ctx).into_iter().collect::<Vec<_>>();
            for user in target_users {
                if user.instruction() == self {
                    <BasicBlock as Useable>::remove(target, ctx, user);
                }
            }
        }
        self.unlink(ctx);
        ctx.dealloc(self);
    }

    pub fn is_removed(&self, ctx: &Context) -> bool {
        self.deref(ctx).is_none()
    }
}

impl ArenaPtr for Instruction {
    type Arena = Context;
    type Data = InstructionData;
}

impl LinkedListNode for Instruction {
    type Container = BasicBlock;
    type Ctx = Context;

    fn succ(self, ctx: &Self::Ctx) -> Option<Self> {
        self.deref(ctx)
            .expect("Failed to deref `succ` in struct `Instruction`")
            .succ
    }

    fn pre(self, ctx: &Self::Ctx) -> Option<Self> {
        self.deref(ctx)
            .expect("Failed to deref `pre` in struct `Instruction`")
            .pre
    }

    fn container(self, ctx: &Self::Ctx) -> Option<Self::Container> {
        self.deref(ctx)
            .expect("Failed to deref `container` in struct `Instruction`")
            .basicblock
    }

    fn set_succ(self, ctx: &mut Self::Ctx, succ: Option<Self>) {
        self.deref_mut(ctx)
            .expect("Failed to deref `succ` in struct `Instruction`")
            .succ = succ;
    }

    fn set_pre(self, ctx: &mut Self::Ctx, pre: Option<Self>) {
        self.deref_mut(ctx)
            .expect("Failed to deref `pre` in struct `Instruction`")
            .pre = pre;
    }

    fn set_container(self, ctx: &mut Self::Ctx, container: Option<Self::Container>) {
        self.deref_mut(ctx)
            .expect("Failed to deref `container` in struct `Instruction`")
            .basicblock = container;
    }

    fn unlink(self, ctx: &mut Self::Ctx) {
        let pre = self.pre(ctx);
        let succ = self.succ(ctx);

        if let Some(pre) = pre {
            pre.set_succ(ctx, succ);
        }

        if let Some(succ) = succ {
            succ.set_pre(ctx, pre);
        }

        if let Some(container) = self.container(ctx) {
            if container.head(ctx) == Some(self) {
                container.set_head(ctx, succ);
            }

            if container.tail(ctx) == Some(self) {
                container.set_tail(ctx, pre);
            }
        }

        self.set_pre(ctx, None);
        self.set_succ(ctx, None);
        self.set_container(ctx, None);
    }
}
