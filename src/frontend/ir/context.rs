use super::basicblock::{BasicBlock, BasicBlockData};
use super::function::{Function, FunctionData};
use super::global::{Global, GlobalData};
use super::instruction::{Instruction, InstructionData};
use super::typ::{Typ, TypeData};
use super::value::{Value, ValueData};
use crate::utils::storage::{Arena, GenericArena, GenericPtr, UniqueArena};

#[derive(Debug)]
pub struct Context {
    /// 目标机器指针宽度，单位字节
    pub target: u32,
    pub types: UniqueArena<TypeData>,
    pub globals: GenericArena<GlobalData>,
    pub values: GenericArena<ValueData>,
    pub basicblocks: GenericArena<BasicBlockData>,
    pub functions: GenericArena<FunctionData>,
    pub instructions: GenericArena<InstructionData>,
    pub syslibdecls: Vec<FunctionDecl>,
}

/// 运行时库函数的声明，只有签名没有函数体
#[derive(Debug)]
pub struct FunctionDecl {
    pub name: String,
    pub parameters_typ: Vec<Typ>,
    pub return_type: Typ,
}

impl FunctionDecl {
    pub fn get_name(&self) -> &str {
        &self.name
    }
    pub fn get_parameters_typ(&self) -> &[Typ] {
        &self.parameters_typ
    }
    pub fn get_return_type(&self) -> &Typ {
        &self.return_type
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Context {
    /// 创建一个新的Context
    pub fn new(target: u32) -> Self {
        Self {
            target,
            types: UniqueArena::default(),
            globals: GenericArena::default(),
            values: GenericArena::default(),
            basicblocks: GenericArena::default(),
            functions: GenericArena::default(),
            instructions: GenericArena::default(),
            syslibdecls: Vec::new(),
        }
    }

    /// 添加运行时库函数声明
    pub fn add_funcdecl(&mut self, decl: FunctionDecl) {
        self.syslibdecls.push(decl);
    }

    /// 获取所有函数
    pub fn get_functions(&self) -> impl Iterator<Item = Function> + '_ {
        self.functions
            .iter()
            .map(|functiondata| functiondata.self_ptr())
    }

    /// 获取所有全局变量
    pub fn get_globals(&self) -> impl Iterator<Item = Global> + '_ {
        self.globals.iter().map(|globaldata| globaldata.self_ptr())
    }
}

impl Arena<Typ> for Context {
    fn alloc_with<F>(&mut self, _: F) -> Typ
    where
        F: FnOnce(Typ) -> TypeData,
    {
        panic!("Failed to allocate type in context");
    }

    fn alloc(&mut self, typ: TypeData) -> Typ {
        Typ(self.types.alloc(typ))
    }

    fn dealloc(&mut self, ptr: Typ) -> Option<TypeData> {
        self.types.dealloc(ptr.0)
    }

    fn deref(&self, ptr: Typ) -> Option<&TypeData> {
        self.types.deref(ptr.0)
    }

    fn deref_mut(&mut self, ptr: Typ) -> Option<&mut TypeData> {
        self.types.deref_mut(ptr.0)
    }
}

impl Arena<Global> for Context {
    fn alloc_with<F>(&mut self, f: F) -> Global
    where
        F: FnOnce(Global) -> GlobalData,
    {
        Global(
            self.globals
                .alloc_with(|ptr: GenericPtr<GlobalData>| f(Global(ptr))),
        )
    }

    fn dealloc(&mut self, ptr: Global) -> Option<GlobalData> {
        self.globals.dealloc(ptr.0)
    }

    fn deref(&self, ptr: Global) -> Option<&GlobalData> {
        self.globals.deref(ptr.0)
    }

    fn deref_mut(&mut self, ptr: Global) -> Option<&mut GlobalData> {
        self.globals.deref_mut(ptr.0)
    }
}

impl Arena<Value> for Context {
    fn alloc_with<F>(&mut self, f: F) -> Value
    where
        F: FnOnce(Value) -> ValueData,
    {
        Value(
            self.values
                .alloc_with(|ptr: GenericPtr<ValueData>| f(Value(ptr))),
        )
    }

    fn dealloc(&mut self, ptr: Value) -> Option<ValueData> {
        self.values.dealloc(ptr.0)
    }

    fn deref(&self, ptr: Value) -> Option<&ValueData> {
        self.values.deref(ptr.0)
    }

    fn deref_mut(&mut self, ptr: Value) -> Option<&mut ValueData> {
        self.values.deref_mut(ptr.0)
    }
}

impl Arena<BasicBlock> for Context {
    fn alloc_with<F>(&mut self, f: F) -> BasicBlock
    where
        F: FnOnce(BasicBlock) -> BasicBlockData,
    {
        BasicBlock(
            self.basicblocks
                .alloc_with(|ptr: GenericPtr<BasicBlockData>| f(BasicBlock(ptr))),
        )
    }

    fn dealloc(&mut self, ptr: BasicBlock) -> Option<BasicBlockData> {
        self.basicblocks.dealloc(ptr.0)
    }

    fn deref(&self, ptr: BasicBlock) -> Option<&BasicBlockData> {
        self.basicblocks.deref(ptr.0)
    }

    fn deref_mut(&mut self, ptr: BasicBlock) -> Option<&mut BasicBlockData> {
        self.basicblocks.deref_mut(ptr.0)
    }
}

impl Arena<Function> for Context {
    fn alloc_with<F>(&mut self, f: F) -> Function
    where
        F: FnOnce(Function) -> FunctionData,
    {
        Function(self.functions.alloc_with(|ptr| f(Function(ptr))))
    }

    fn dealloc(&mut self, ptr: Function) -> Option<FunctionData> {
        self.functions.dealloc(ptr.0)
    }

    fn deref(&self, ptr: Function) -> Option<&FunctionData> {
        self.functions.deref(ptr.0)
    }

    fn deref_mut(&mut self, ptr: Function) -> Option<&mut FunctionData> {
        self.functions.deref_mut(ptr.0)
    }
}

impl Arena<Instruction> for Context {
    fn alloc_with<F>(&mut self, f: F) -> Instruction
    where
        F: FnOnce(Instruction) -> InstructionData,
    {
        Instruction(self.instructions.alloc_with(|ptr| f(Instruction(ptr))))
    }

    fn dealloc(&mut self, ptr: Instruction) -> Option<InstructionData> {
        self.instructions.dealloc(ptr.0)
    }

    fn deref(&self, ptr: Instruction) -> Option<&InstructionData> {
        self.instructions.deref(ptr.0)
    }

    fn deref_mut(&mut self, ptr: Instruction) -> Option<&mut InstructionData> {
        self.instructions.deref_mut(ptr.0)
    }
}
