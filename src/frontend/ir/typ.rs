use super::context::Context;
use crate::utils::storage::{Arena, ArenaPtr, UniqueArenaPtr};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeData {
    Void,
    // IR中实际不存在Bool类型，只有i1，为便于理解仍单独建模，打印时输出i1
    Bool,
    // 有符号整数，bits取8/16/32/64，本语言前端只产生i32
    Int { bits: u8 },
    Float32,
    Ptr { pointee: Typ },
    Array { element: Typ, len: usize },
}

/// 类型句柄。类型存放在去重Arena中，结构相等的类型句柄相等
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, Copy, PartialOrd)]
pub struct Typ(pub UniqueArenaPtr<TypeData>);

impl ArenaPtr for Typ {
    type Arena = Context;
    type Data = TypeData;
}

impl Typ {
    pub fn void(ctx: &mut Context) -> Self {
        ctx.alloc(TypeData::Void)
    }

    pub fn bool(ctx: &mut Context) -> Self {
        ctx.alloc(TypeData::Bool)
    }

    pub fn int(ctx: &mut Context, bits: u8) -> Self {
        ctx.alloc(TypeData::Int { bits })
    }

    pub fn int32(ctx: &mut Context) -> Self {
        Self::int(ctx, 32)
    }

    pub fn float32(ctx: &mut Context) -> Self {
        ctx.alloc(TypeData::Float32)
    }

    pub fn ptr(ctx: &mut Context, pointee: Typ) -> Self {
        ctx.alloc(TypeData::Ptr { pointee })
    }

    pub fn array(ctx: &mut Context, element: Typ, len: usize) -> Self {
        ctx.alloc(TypeData::Array { element, len })
    }

    pub fn is_void(&self, ctx: &Context) -> bool {
        matches!(self.deref(ctx).unwrap(), TypeData::Void)
    }

    pub fn is_bool(&self, ctx: &Context) -> bool {
        matches!(self.deref(ctx).unwrap(), TypeData::Bool)
    }

    pub fn is_int(&self, ctx: &Context) -> bool {
        matches!(self.deref(ctx).unwrap(), TypeData::Int { .. })
    }

    pub fn is_float(&self, ctx: &Context) -> bool {
        matches!(self.deref(ctx).unwrap(), TypeData::Float32)
    }

    pub fn is_ptr(&self, ctx: &Context) -> bool {
        matches!(self.deref(ctx).unwrap(), TypeData::Ptr { .. })
    }

    pub fn is_array(&self, ctx: &Context) -> bool {
        matches!(self.deref(ctx).unwrap(), TypeData::Array { .. })
    }

    /// 指针指向的类型
    pub fn pointee(&self, ctx: &Context) -> Option<Typ> {
        match self.deref(ctx).unwrap() {
            TypeData::Ptr { pointee } => Some(*pointee),
            _ => None,
        }
    }

    /// 数组的元素类型和长度
    pub fn as_array(&self, ctx: &Context) -> Option<(Typ, usize)> {
        match self.deref(ctx).unwrap() {
            TypeData::Array { element, len } => Some((*element, *len)),
            _ => None,
        }
    }

    /// 数组各维长度，外层在前
    pub fn array_dims(&self, ctx: &Context) -> Vec<usize> {
        let mut dims = Vec::new();
        let mut cur = *self;
        while let Some((element, len)) = cur.as_array(ctx) {
            dims.push(len);
            cur = element;
        }
        dims
    }

    /// 剥掉所有数组维度后的标量类型
    pub fn array_base(&self, ctx: &Context) -> Typ {
        let mut cur = *self;
        while let Some((element, _)) = cur.as_array(ctx) {
            cur = element;
        }
        cur
    }

    /// 类型所占位数，指针位数由目标机器字长决定
    pub fn bitwidth(&self, ctx: &Context) -> usize {
        match self.deref(ctx).unwrap() {
            TypeData::Void => 0,
            TypeData::Bool => 1,
            TypeData::Int { bits } => *bits as usize,
            TypeData::Float32 => 32,
            TypeData::Ptr { .. } => ctx.target as usize * 8,
            TypeData::Array { element, len } => element.bitwidth(ctx) * len,
        }
    }

    /// 类型所占字节数
    pub fn bytewidth(&self, ctx: &Context) -> usize {
        (self.bitwidth(ctx) + 7) / 8
    }
}
