pub mod rev_reg_id;
pub mod schema_id;
