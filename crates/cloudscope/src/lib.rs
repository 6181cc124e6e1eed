#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use cloudscope_linalg as linalg;

#[doc(inline)]
pub use cloudscope_3d as k3d;
