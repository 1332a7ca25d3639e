mod hilo;
mod interface;
mod mutex;
mod none;
mod pooled;
mod pooled_lo;
#[cfg(test)]
mod tests;

pub use hilo::*;
pub use interface::*;
pub(crate) use mutex::*;
pub use none::*;
pub use pooled::*;
pub use pooled_lo::*;
