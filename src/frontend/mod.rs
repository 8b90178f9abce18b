pub mod ast;
pub mod diagnostic;
pub mod ir;
pub mod ir2string;
pub mod irgen;
pub mod symboltable;

/// 把一个编译单元翻译为IR，ptr_width是目标机器指针字节数
pub fn irgen(
    ast: &ast::CompUnit,
    ptr_width: u8,
) -> Result<ir::context::Context, diagnostic::Diagnostic> {
    let mut irgen = irgen::IrGenContext::new(ptr_width as u32);
    irgen.gen_compunit(ast)?;
    Ok(irgen.finish())
}
