pub mod rev_reg;
pub mod schema;
