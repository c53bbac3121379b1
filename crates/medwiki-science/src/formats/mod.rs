pub mod quickstatements;
pub mod table;

pub use quickstatements::{QuickStatementsWriter, Statement};
pub use table::TableWriter;
