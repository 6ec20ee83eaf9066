pub mod detail;
pub mod help;
pub mod preview_list;
pub mod root;
