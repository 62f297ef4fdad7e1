mod attribute_value;
mod config;
mod constraint;
mod distribution;
mod error;
mod eval;
mod evaluation;
mod flag;
mod flag_value;
pub mod operator;
mod request;
mod rule;
mod segment;
mod service;
mod store;
mod test_common;
mod util;
mod variant;

pub use attribute_value::*;
pub use config::*;
pub use constraint::*;
pub use distribution::*;
pub use error::*;
pub use eval::*;
pub use evaluation::*;
pub use flag::*;
pub use flag_value::*;
pub use operator::Operation;
pub use request::*;
pub use rule::*;
pub use segment::*;
pub use service::*;
pub use store::*;
pub use variant::*;
