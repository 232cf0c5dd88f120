pub mod common;
pub mod currency;
pub mod errors;
pub mod execution;
pub mod listing;
pub mod num;
pub mod order;
pub mod path;
pub mod request;
pub mod steps;

pub use common::*;
pub use currency::*;
pub use errors::*;
pub use execution::*;
pub use listing::*;
pub use order::*;
pub use path::*;
pub use request::*;
pub use steps::*;
