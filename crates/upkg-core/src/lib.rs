//! upkg engine: package repositories, `.unitypackage` decoding, dependency
//! resolution, installation and footprint tracking.

pub mod config;
pub mod io;
pub mod locator;
pub mod meta;
pub mod ops;
pub mod paths;
pub mod repository;
pub mod resolver;
pub mod scratch;
pub mod tracking;

pub mod reporter;

pub use paths::*;
pub use reporter::{NullReporter, Reporter};
