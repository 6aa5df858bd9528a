pub mod help;
pub mod stock;
