pub mod basicblock;
pub mod context;
pub mod defuse;
pub mod function;
pub mod global;
pub mod instruction;
pub mod typ;
pub mod value;
