pub mod draft;
pub mod enums;
pub mod session;

pub use draft::*;
pub use enums::*;
pub use session::*;
