#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
mod error;
mod factory;
mod optimizer;
mod source;
mod value;

pub use crate::config::*;
pub use crate::error::*;
pub use crate::factory::*;
pub use crate::optimizer::*;
pub use crate::source::*;
pub use crate::value::*;
