pub mod bitop;

pub mod catalan;
