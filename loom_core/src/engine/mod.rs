//! The engines behind the four tools.
//!
//! Each engine is reached through a narrow function taking the source text
//! and the opaque [`EngineOptions`](crate::EngineOptions) and returning the
//! output or an [`EngineError`](crate::EngineError).

pub mod css;
pub mod html;
pub mod stylesheet;
pub mod template;
