//! Core data models and traits

#![allow(dead_code)]

mod analytics;
mod feature;
mod form;
mod lenient;
mod llm;
mod query;
mod session;
mod subscription;
mod tier;

pub use analytics::*;
pub use feature::*;
pub use form::*;
pub use llm::*;
pub use query::*;
pub use session::*;
pub use subscription::*;
pub use tier::*;
