pub mod lookup;
pub mod records;
pub mod update;
