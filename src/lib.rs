pub mod anim;
pub mod collated;
pub mod error;
pub mod geom;
pub mod math;
pub mod name;
pub mod skel;

pub use collated::Model;
pub use error::{ModelError, Result};
pub use geom::Platform;
