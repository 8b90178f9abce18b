use rustc_hash::FxHashMap as HashMap;

use super::diagnostic::Diagnostic;
use super::{
    ast::ComptimeValue,
    ir::{context::Context, global::Global, typ::Typ, value::Value},
};

/// 符号绑定到的实体
#[derive(Debug, Clone)]
pub enum SymbolKind {
    Function { params: Vec<Typ>, ret: Typ },
    /// 全局变量
    Global(Global),
    /// 局部变量，持有的是栈槽地址（alloca的结果），不是变量值本身
    Local(Value),
}

#[derive(Debug, Clone)]
pub struct SymbolEntry {
    /// 变量自身的类型，函数符号存返回类型
    pub typ: Typ,
    pub kind: SymbolKind,
}

#[derive(Default)]
struct ScopeFrame {
    bindings: HashMap<String, SymbolEntry>,
    /// 常量表，键是（常量名，下标），标量常量下标为空。
    /// 常量数组的每个元素都会登记，包括补零的元素
    consts: HashMap<(String, Vec<usize>), ComptimeValue>,
}

#[derive(Default)]
pub struct SymbolTable {
    stack: Vec<ScopeFrame>,
}

impl SymbolTable {
    pub fn enter_scope(&mut self) {
        self.stack.push(ScopeFrame::default());
    }

    pub fn leave_scope(&mut self) {
        self.stack.pop();
    }

    /// 是否处于全局作用域
    pub fn in_global(&self) -> bool {
        self.stack.len() == 1
    }

    /// 在当前作用域声明符号，同一作用域内重名报错
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        entry: SymbolEntry,
    ) -> Result<(), Diagnostic> {
        let name = name.into();
        let scope = self
            .stack
            .last_mut()
            .expect("symbol table has no open scope");
        if scope.bindings.contains_key(&name) {
            return Err(Diagnostic::DuplicateBinding(name));
        }
        scope.bindings.insert(name, entry);
        Ok(())
    }

    /// 由内向外逐层查找符号
    pub fn resolve(&self, name: &str) -> Result<&SymbolEntry, Diagnostic> {
        for scope in self.stack.iter().rev() {
            if let Some(entry) = scope.bindings.get(name) {
                return Ok(entry);
            }
        }
        Err(Diagnostic::UnboundName(name.to_string()))
    }

    /// 登记编译期常量，同一键只写一次
    pub fn declare_const(
        &mut self,
        name: impl Into<String>,
        subscripts: Vec<usize>,
        value: ComptimeValue,
    ) -> Result<(), Diagnostic> {
        let name = name.into();
        let scope = self
            .stack
            .last_mut()
            .expect("symbol table has no open scope");
        let key = (name, subscripts);
        if scope.consts.contains_key(&key) {
            return Err(Diagnostic::DuplicateBinding(key.0));
        }
        scope.consts.insert(key, value);
        Ok(())
    }

    /// 查找编译期常量，找不到说明该名字不是常量
    pub fn resolve_const(&self, name: &str, subscripts: &[usize]) -> Option<ComptimeValue> {
        let key = (name.to_string(), subscripts.to_vec());
        for scope in self.stack.iter().rev() {
            if let Some(value) = scope.consts.get(&key) {
                return Some(*value);
            }
            // 名字在本层被非常量遮蔽时停止向外查找
            if scope.bindings.contains_key(name) {
                return None;
            }
        }
        None
    }

    /// 在全局作用域登记运行时库函数
    pub fn register_sysylib(&mut self, ctx: &mut Context) {
        assert_eq!(self.stack.len(), 1);

        let void = Typ::void(ctx);
        let int = Typ::int32(ctx);
        let float = Typ::float32(ctx);
        let int_ptr = Typ::ptr(ctx, int);
        let float_ptr = Typ::ptr(ctx, float);

        let mut declare_fn = |table: &mut Self, name: &str, params: Vec<Typ>, ret: Typ| {
            let entry = SymbolEntry {
                typ: ret,
                kind: SymbolKind::Function { params, ret },
            };
            table
                .declare(name, entry)
                .unwrap_or_else(|_| unreachable!("sysy library registered twice"));
        };

        declare_fn(self, "getint", vec![], int);
        declare_fn(self, "getch", vec![], int);
        declare_fn(self, "getfloat", vec![], float);
        declare_fn(self, "getarray", vec![int_ptr], int);
        declare_fn(self, "getfarray", vec![float_ptr], int);
        declare_fn(self, "putint", vec![int], void);
        declare_fn(self, "putch", vec![int], void);
        declare_fn(self, "putfloat", vec![float], void);
        declare_fn(self, "putarray", vec![int, int_ptr], void);
        declare_fn(self, "putfarray", vec![int, float_ptr], void);
        declare_fn(self, "_sysy_starttime", vec![int], void);
        declare_fn(self, "_sysy_stoptime", vec![int], void);
        // 数组批量置零的辅助函数，参数为（首地址，填充值，元素个数）
        declare_fn(self, "sysy_memset_int", vec![int_ptr, int, int], void);
        declare_fn(self, "sysy_memset_float", vec![float_ptr, int, int], void);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_scope_shadows_outer() {
        let mut ctx = Context::default();
        let int = Typ::int32(&mut ctx);
        let float = Typ::float32(&mut ctx);
        let mut table = SymbolTable::default();

        table.enter_scope();
        let one = crate::frontend::ir::value::ConstantValue::int32(&mut ctx, 1);
        let g = Global::new(&mut ctx, "a".to_string(), one);
        table
            .declare(
                "a",
                SymbolEntry {
                    typ: int,
                    kind: SymbolKind::Global(g),
                },
            )
            .unwrap();

        table.enter_scope();
        let slot = Value::constzero(&mut ctx, float);
        table
            .declare(
                "a",
                SymbolEntry {
                    typ: float,
                    kind: SymbolKind::Local(slot),
                },
            )
            .unwrap();
        assert_eq!(table.resolve("a").unwrap().typ, float);
        table.leave_scope();

        assert_eq!(table.resolve("a").unwrap().typ, int);
        table.leave_scope();
    }

    #[test]
    fn duplicate_in_same_scope_is_rejected() {
        let mut ctx = Context::default();
        let int = Typ::int32(&mut ctx);
        let mut table = SymbolTable::default();
        table.enter_scope();
        let slot = Value::constzero(&mut ctx, int);
        let entry = SymbolEntry {
            typ: int,
            kind: SymbolKind::Local(slot),
        };
        table.declare("x", entry.clone()).unwrap();
        assert!(matches!(
            table.declare("x", entry),
            Err(Diagnostic::DuplicateBinding(_))
        ));
    }

    #[test]
    fn const_lookup_respects_shadowing() {
        let mut ctx = Context::default();
        let int = Typ::int32(&mut ctx);
        let mut table = SymbolTable::default();
        table.enter_scope();
        table
            .declare_const("n", vec![], ComptimeValue::int(4))
            .unwrap();
        assert_eq!(table.resolve_const("n", &[]), Some(ComptimeValue::Int(4)));

        // 内层把n重新声明为变量后，外层常量不再可见
        table.enter_scope();
        let slot = Value::constzero(&mut ctx, int);
        table
            .declare(
                "n",
                SymbolEntry {
                    typ: int,
                    kind: SymbolKind::Local(slot),
                },
            )
            .unwrap();
        assert_eq!(table.resolve_const("n", &[]), None);
        table.leave_scope();

        assert_eq!(table.resolve_const("n", &[]), Some(ComptimeValue::Int(4)));
    }
}
