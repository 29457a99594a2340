mod name;
mod path;
mod record;

pub use name::*;
pub use path::*;
pub use record::*;
