mod membership;

pub use membership::*;
