//! String and type interning pools (spec §4.4, §4.5).

pub mod string_pool;
pub mod type_pool;

pub use string_pool::StringPool;
pub use type_pool::TypePool;
