pub mod keywords;

pub use keywords::*;
