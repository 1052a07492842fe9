mod filter;
mod marker;
mod navigation;
mod position;
mod vessel;

pub use filter::*;
pub use marker::*;
pub use navigation::*;
pub use position::*;
pub use vessel::*;
