use super::instruction::Instruction;
use crate::utils::storage::ArenaPtr;

/// 可以被指令使用的对象（值、基本块）
pub trait Useable: ArenaPtr {
    /// 获取全部使用者
    fn users(self, arena: &Self::Arena) -> impl IntoIterator<Item = User<Self>>;

    /// 添加一个使用者
    fn insert(self, arena: &mut Self::Arena, user: User<Self>);

    /// 删除一个使用者
    fn remove(self, arena: &mut Self::Arena, user: User<Self>);
}

/// def-use链中的使用位置：哪条指令的第几个操作数。
/// index为0表示指令的运算结果，真实操作数从1开始编号
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Copy)]
pub struct User<T: Useable> {
    instruction: Instruction,
    index: usize,
    // 仅在类型上与T关联，不存储T的值
    _marker: std::marker::PhantomData<T>,
}

impl<T: Useable> User<T> {
    pub fn new(instruction: Instruction, index: usize) -> Self {
        Self {
            instruction,
            index,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn instruction(&self) -> Instruction {
        self.instruction
    }

    pub fn index(&self) -> usize {
        self.index
    }
}
