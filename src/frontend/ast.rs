// CompUnit -> [CompUnit](Decl|FuncDef)
#[derive(Debug)]
pub struct CompUnit {
    pub items: Vec<GlobalItem>,
}

#[derive(Debug)]
pub enum GlobalItem {
    Decl(Decl),
    FuncDef(FuncDef),
}

// Decl -> ["const"] BType Def{"," Def}';'
#[derive(Debug)]
pub struct Decl {
    pub is_const: bool,
    pub typ: BType,
    pub defs: Vec<VarDef>,
}

// VarDef -> Ident{'['ConstExp']'}['=' InitVal]
#[derive(Debug)]
pub struct VarDef {
    pub id: String,
    pub dimensions: Vec<Exp>,
    pub init: Option<InitVal>,
}

// InitVal -> Exp | '{'[InitVal{','InitVal}]'}'
#[derive(Debug)]
pub enum InitVal {
    Exp(Exp),
    List(Vec<InitVal>),
}

// FuncDef -> BType Ident '(' [FuncParams] ')' Block
#[derive(Debug)]
pub struct FuncDef {
    pub ret_typ: BType,
    pub id: String,
    pub params: Vec<FuncParam>,
    pub body: Block,
}

// dimensions为None表示标量参数，Some表示数组参数，最左维度已在语法上省略
#[derive(Debug)]
pub struct FuncParam {
    pub typ: BType,
    pub id: String,
    pub dimensions: Option<Vec<Exp>>,
}

// Block -> '{'{BlockItem}'}'
#[derive(Debug)]
pub struct Block {
    pub items: Vec<BlockItem>,
}

// BlockItem -> Decl | Stmt
#[derive(Debug)]
pub enum BlockItem {
    Decl(Decl),
    Stmt(Stmt),
}

/* Stmt ->   LVal '=' Exp';'
           | [Exp]';'
           | Block
           | 'if''('Cond')' Stmt ['else' Stmt]
           | 'while''('Cond')' Stmt
           | 'break'';'
           | 'continue'';'
           | 'return' [Exp]';'
*/
#[derive(Debug)]
pub enum Stmt {
    Assign { lval: LVal, exp: Exp },
    Exp(Option<Exp>),
    Block(Block),
    If(Box<If>),
    While(Box<While>),
    Break,
    Continue,
    Return(Option<Exp>),
}

#[derive(Debug)]
pub struct If {
    pub cond: Exp,
    pub then: Stmt,
    pub or_else: Option<Stmt>,
}

#[derive(Debug)]
pub struct While {
    pub cond: Exp,
    pub body: Stmt,
}

#[derive(Debug, Clone)]
pub struct LVal {
    pub id: String,
    pub indices: Vec<Exp>,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub id: String,
    pub args: Vec<Exp>,
}

#[derive(Debug, Clone)]
pub enum Exp {
    Const(ComptimeValue),
    Binary(BinaryOp, Box<Exp>, Box<Exp>),
    Unary(UnaryOp, Box<Exp>),
    Call(Call),
    LVal(LVal),
}

impl Exp {
    pub fn int(i: i32) -> Self {
        Exp::Const(ComptimeValue::Int(i))
    }

    pub fn float(f: f32) -> Self {
        Exp::Const(ComptimeValue::Float(f))
    }

    pub fn binary(op: BinaryOp, lhs: Exp, rhs: Exp) -> Self {
        Exp::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn unary(op: UnaryOp, exp: Exp) -> Self {
        Exp::Unary(op, Box::new(exp))
    }

    pub fn call(id: impl Into<String>, args: Vec<Exp>) -> Self {
        Exp::Call(Call {
            id: id.into(),
            args,
        })
    }

    pub fn lval(id: impl Into<String>, indices: Vec<Exp>) -> Self {
        Exp::LVal(LVal {
            id: id.into(),
            indices,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BType {
    Void,
    Int,
    Float,
}

/// 编译期标量值，常量折叠在它上面进行。
/// 混合类型运算按bool->int->float方向提升
#[derive(Debug, Clone, Copy)]
pub enum ComptimeValue {
    Bool(bool),
    Int(i32),
    Float(f32),
}

impl ComptimeValue {
    pub fn bool(y: bool) -> Self {
        ComptimeValue::Bool(y)
    }

    pub fn int(i: i32) -> Self {
        ComptimeValue::Int(i)
    }

    pub fn float(f: f32) -> Self {
        ComptimeValue::Float(f)
    }

    /// 转为int，Float截断取整
    pub fn to_int(&self) -> i32 {
        match self {
            ComptimeValue::Bool(y) => *y as i32,
            ComptimeValue::Int(i) => *i,
            ComptimeValue::Float(f) => *f as i32,
        }
    }

    pub fn to_float(&self) -> f32 {
        match self {
            ComptimeValue::Bool(y) => *y as i32 as f32,
            ComptimeValue::Int(i) => *i as f32,
            ComptimeValue::Float(f) => *f,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            ComptimeValue::Bool(y) => *y,
            ComptimeValue::Int(i) => *i != 0,
            ComptimeValue::Float(f) => *f != 0.0,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ComptimeValue::Float(_))
    }

    pub fn is_zero(&self) -> bool {
        match self {
            ComptimeValue::Bool(y) => !*y,
            ComptimeValue::Int(i) => *i == 0,
            ComptimeValue::Float(f) => *f == 0.0,
        }
    }

    /// 除法，除数为零时返回None
    pub fn checked_div(self, other: Self) -> Option<Self> {
        if self.is_float() || other.is_float() {
            let rhs = other.to_float();
            if rhs == 0.0 {
                return None;
            }
            Some(ComptimeValue::Float(self.to_float() / rhs))
        } else {
            let rhs = other.to_int();
            if rhs == 0 {
                return None;
            }
            Some(ComptimeValue::Int(self.to_int().wrapping_div(rhs)))
        }
    }

    /// 取模，只对整数有定义，除数为零或出现浮点操作数时返回None
    pub fn checked_rem(self, other: Self) -> Option<Self> {
        if self.is_float() || other.is_float() {
            return None;
        }
        let rhs = other.to_int();
        if rhs == 0 {
            return None;
        }
        Some(ComptimeValue::Int(self.to_int().wrapping_rem(rhs)))
    }

    pub fn logical_and(&self, other: &Self) -> Self {
        ComptimeValue::Bool(self.as_bool() && other.as_bool())
    }

    pub fn logical_or(&self, other: &Self) -> Self {
        ComptimeValue::Bool(self.as_bool() || other.as_bool())
    }
}

/* Start: 实现ComptimeValue的运算符重载 包含：-（取负）、!、+、-、* */
impl std::ops::Neg for ComptimeValue {
    type Output = Self;

    fn neg(self) -> Self {
        match self {
            ComptimeValue::Bool(y) => ComptimeValue::Int(-(y as i32)),
            ComptimeValue::Int(i) => ComptimeValue::Int(i.wrapping_neg()),
            ComptimeValue::Float(f) => ComptimeValue::Float(-f),
        }
    }
}

impl std::ops::Not for ComptimeValue {
    type Output = Self;

    fn not(self) -> Self {
        ComptimeValue::Bool(!self.as_bool())
    }
}

impl std::ops::Add for ComptimeValue {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        if self.is_float() || other.is_float() {
            ComptimeValue::Float(self.to_float() + other.to_float())
        } else {
            ComptimeValue::Int(self.to_int().wrapping_add(other.to_int()))
        }
    }
}

impl std::ops::Sub for ComptimeValue {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        if self.is_float() || other.is_float() {
            ComptimeValue::Float(self.to_float() - other.to_float())
        } else {
            ComptimeValue::Int(self.to_int().wrapping_sub(other.to_int()))
        }
    }
}

impl std::ops::Mul for ComptimeValue {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        if self.is_float() || other.is_float() {
            ComptimeValue::Float(self.to_float() * other.to_float())
        } else {
            ComptimeValue::Int(self.to_int().wrapping_mul(other.to_int()))
        }
    }
}
/* End: 运算符重载 */

impl PartialEq for ComptimeValue {
    fn eq(&self, other: &Self) -> bool {
        if self.is_float() || other.is_float() {
            self.to_float() == other.to_float()
        } else {
            self.to_int() == other.to_int()
        }
    }
}

impl PartialOrd for ComptimeValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        if self.is_float() || other.is_float() {
            self.to_float().partial_cmp(&other.to_float())
        } else {
            self.to_int().partial_cmp(&other.to_int())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_arithmetic_promotes_to_float() {
        let sum = ComptimeValue::int(1) + ComptimeValue::float(2.0);
        assert_eq!(sum, ComptimeValue::Float(3.0));
        assert!(sum.is_float());

        let prod = ComptimeValue::bool(true) * ComptimeValue::int(5);
        assert_eq!(prod, ComptimeValue::Int(5));
    }

    #[test]
    fn division_by_zero_yields_none() {
        assert!(ComptimeValue::int(1)
            .checked_div(ComptimeValue::int(0))
            .is_none());
        assert!(ComptimeValue::int(7)
            .checked_rem(ComptimeValue::int(0))
            .is_none());
        assert_eq!(
            ComptimeValue::int(7).checked_rem(ComptimeValue::int(3)),
            Some(ComptimeValue::Int(1))
        );
    }

    #[test]
    fn rem_rejects_float_operands() {
        assert!(ComptimeValue::float(7.0)
            .checked_rem(ComptimeValue::int(3))
            .is_none());
    }

    #[test]
    fn comparison_across_types() {
        assert!(ComptimeValue::int(2) > ComptimeValue::float(1.5));
        assert!(ComptimeValue::bool(true) == ComptimeValue::int(1));
        assert!((!ComptimeValue::int(0)).as_bool());
    }
}
