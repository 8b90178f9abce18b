use super::context::Context;
use super::defuse::{Useable, User};
use super::function::Function;
use super::instruction::Instruction;
use super::typ::Typ;
use crate::utils::storage::{Arena, ArenaPtr, GenericPtr};
use rustc_hash::FxHashSet as HashSet;

/// 编译期常量，全局变量初始值和指令中的字面量都用它表示
#[derive(Debug, Clone)]
pub enum ConstantValue {
    /// 任意类型的全零值，数组置零时避免展开元素
    Zero { typ: Typ },
    Bool { typ: Typ, value: bool },
    Int32 { typ: Typ, value: i32 },
    Float32 { typ: Typ, value: f32 },
    Array { typ: Typ, elements: Vec<ConstantValue> },
    /// 指向全局变量的指针
    GlobalPtr {
        typ: Typ,        // 指针类型
        name: String,    // 全局变量名
        value_type: Typ, // 指向数据的类型
    },
}

impl ConstantValue {
    pub fn typ(&self) -> Typ {
        match self {
            ConstantValue::Zero { typ } => *typ,
            ConstantValue::Bool { typ, .. } => *typ,
            ConstantValue::Int32 { typ, .. } => *typ,
            ConstantValue::Float32 { typ, .. } => *typ,
            ConstantValue::Array { typ, .. } => *typ,
            // 全局变量地址的类型是指针，不是指向的数据类型
            ConstantValue::GlobalPtr { typ, .. } => *typ,
        }
    }

    pub fn zero(typ: Typ) -> ConstantValue {
        ConstantValue::Zero { typ }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, ConstantValue::Zero { .. })
    }

    /// 各种形态的零都算零，包括所有元素为零的数组
    pub fn is_all_zero(&self) -> bool {
        match self {
            ConstantValue::Zero { .. } => true,
            ConstantValue::Bool { value, .. } => !*value,
            ConstantValue::Int32 { value, .. } => *value == 0,
            ConstantValue::Float32 { value, .. } => *value == 0.0,
            ConstantValue::Array { elements, .. } => elements.iter().all(|e| e.is_all_zero()),
            ConstantValue::GlobalPtr { .. } => false,
        }
    }

    pub fn bool(ctx: &mut Context, value: bool) -> ConstantValue {
        let typ = Typ::bool(ctx);
        ConstantValue::Bool { typ, value }
    }

    pub fn int32(ctx: &mut Context, value: i32) -> ConstantValue {
        let typ = Typ::int32(ctx);
        ConstantValue::Int32 { typ, value }
    }

    pub fn float32(ctx: &mut Context, value: f32) -> ConstantValue {
        let typ = Typ::float32(ctx);
        ConstantValue::Float32 { typ, value }
    }

    pub fn global_ptr(ctx: &mut Context, name: String, value_type: Typ) -> ConstantValue {
        let typ = Typ::ptr(ctx, value_type);
        ConstantValue::GlobalPtr {
            typ,
            name,
            value_type,
        }
    }

    pub fn array(typ: Typ, elements: Vec<ConstantValue>) -> ConstantValue {
        ConstantValue::Array { typ, elements }
    }

    pub fn to_string(&self, ctx: &Context) -> String {
        use crate::frontend::ir2string::Display;
        match self {
            ConstantValue::Zero { typ } => {
                if typ.is_float(ctx) {
                    "0.0".to_string()
                } else if typ.is_int(ctx) {
                    "0".to_string()
                } else {
                    "zeroinitializer".to_string()
                }
            }
            ConstantValue::Bool { value, .. } => value.to_string(),
            ConstantValue::Int32 { value, .. } => value.to_string(),
            ConstantValue::Float32 { value, .. } => {
                // 固定17位有效数字，避免往返丢失精度
                if value.abs() >= 0.1 && value.abs() < 10_000_000.0 {
                    format!("{:.17}", value)
                } else {
                    format!("{:.17e}", value)
                }
            }
            ConstantValue::Array { elements, .. } => {
                let mut str = String::from("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        str.push_str(", ");
                    }
                    str.push_str(&element.typ().display(ctx));
                    str.push(' ');
                    str.push_str(&element.to_string(ctx));
                }
                str.push(']');
                str
            }
            ConstantValue::GlobalPtr { name, .. } => format!("@{}", name),
        }
    }
}

#[derive(Debug)]
pub enum ValueKind {
    /// 指令的运算结果
    InstResult { instruction: Instruction, typ: Typ },
    /// 函数形参
    Parameter {
        function: Function,
        index: u32,
        typ: Typ,
    },
    /// 常量
    Constant { value: ConstantValue },
    /// 被调用的函数名，call指令的第0个操作数
    Function { name: String, ret_type: Typ },
}

#[derive(Debug)]
pub struct ValueData {
    pub kind: ValueKind,
    pub users: HashSet<User<Value>>,
    self_ptr: Value,
}

impl ValueData {
    pub fn self_ptr(&self) -> Value {
        self.self_ptr
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, Copy, PartialOrd)]
pub struct Value(pub GenericPtr<ValueData>);

impl ArenaPtr for Value {
    type Arena = Context;
    type Data = ValueData;
}

impl Value {
    pub fn new(ctx: &mut Context, kind: ValueKind) -> Self {
        ctx.alloc_with(|self_ptr| ValueData {
            self_ptr,
            kind,
            users: HashSet::default(),
        })
    }

    /// 值的类型
    pub fn typ(&self, ctx: &Context) -> Typ {
        match self
            .deref(ctx)
            .expect("Failed to deref `values` in struct `Context`")
            .kind
        {
            ValueKind::InstResult { typ, .. } => typ,
            ValueKind::Parameter { typ, .. } => typ,
            ValueKind::Constant { ref value } => value.typ(),
            ValueKind::Function { ret_type, .. } => ret_type,
        }
    }

    pub fn inst_result(ctx: &mut Context, instruction: Instruction, typ: Typ) -> Self {
        Self::new(ctx, ValueKind::InstResult { instruction, typ })
    }

    pub fn parameter(ctx: &mut Context, function: Function, index: u32, typ: Typ) -> Self {
        Self::new(
            ctx,
            ValueKind::Parameter {
                function,
                index,
                typ,
            },
        )
    }

    pub fn constant(ctx: &mut Context, value: ConstantValue) -> Self {
        Self::new(ctx, ValueKind::Constant { value })
    }

    /// 指定类型的零常量
    pub fn constzero(ctx: &mut Context, typ: Typ) -> Self {
        let zero = if typ.is_float(ctx) {
            ConstantValue::float32(ctx, 0.0)
        } else if typ.is_int(ctx) {
            ConstantValue::int32(ctx, 0)
        } else {
            ConstantValue::zero(typ)
        };
        Self::new(ctx, ValueKind::Constant { value: zero })
    }

    pub fn function(ctx: &mut Context, name: String, ret_type: Typ) -> Self {
        Self::new(ctx, ValueKind::Function { name, ret_type })
    }

    pub fn global_ptr(ctx: &mut Context, name: String, value_type: Typ) -> Self {
        let value = ConstantValue::global_ptr(ctx, name, value_type);
        Self::new(ctx, ValueKind::Constant { value })
    }

    pub fn is_parameter(&self, ctx: &Context) -> bool {
        matches!(
            self.deref(ctx)
                .expect("Failed to deref `values` in struct `Context`")
                .kind,
            ValueKind::Parameter { .. }
        )
    }

    pub fn get_int_const_value(self, ctx: &Context) -> Option<i32> {
        match &self
            .deref(ctx)
            .expect("Failed to deref `values` in struct `Context`")
            .kind
        {
            ValueKind::Constant { value } => match value {
                ConstantValue::Int32 { value, .. } => Some(*value),
                ConstantValue::Zero { .. } => Some(0),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn get_float_const_value(self, ctx: &Context) -> Option<f32> {
        match &self
            .deref(ctx)
            .expect("Failed to deref `values` in struct `Context`")
            .kind
        {
            ValueKind::Constant { value } => match value {
                ConstantValue::Float32 { value, .. } => Some(*value),
                ConstantValue::Zero { .. } => Some(0.0),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_removed(&self, ctx: &Context) -> bool {
        self.deref(ctx).is_none()
    }

    /// 解除某条指令对该值的全部使用，无人使用时释放
    pub fn remove(self, ctx: &mut Context, inst: Instruction) {
        let mut to_remove = HashSet::default();
        let user_count = self.users(ctx).into_iter().count();
        for user in self.users(ctx).into_iter() {
            if user.instruction() == inst {
                to_remove.insert(user);
            }
        }
        let remain = user_count - to_remove.len();
        for user in to_remove {
            <Value as Useable>::remove(self, ctx, user);
        }
        if remain == 0 && !self.is_parameter(ctx) {
            ctx.dealloc(self);
        }
    }
}

impl Useable for Value {
    fn users(self, arena: &Self::Arena) -> impl IntoIterator<Item = User<Self>> {
        self.deref(arena)
            .expect("Failed to deref `values` in struct `Context`")
            .users
            .iter()
            .copied()
    }

    fn insert(self, arena: &mut Self::Arena, user: User<Self>) {
        self.deref_mut(arena)
            .expect("Failed to deref mut `values` in struct `Context`")
            .users
            .insert(user);
    }

    fn remove(self, arena: &mut Self::Arena, user: User<Self>) {
        self.deref_mut(arena)
            .expect("Failed to deref mut `values` in struct `Context`")
            .users
            .remove(&user);
    }
}
