//! Rule-based transcript analysis: adequacy gate, category matcher,
//! entrustment inferencer and evidence-based draft assembly.
//!
//! Every function here is pure and total over its input text.

pub mod adequacy;
pub mod entrustment;
pub mod evidence;
pub mod matcher;

pub use adequacy::*;
pub use entrustment::*;
pub use evidence::*;
pub use matcher::*;
