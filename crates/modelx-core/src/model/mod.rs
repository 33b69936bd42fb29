//! Element and attribute value model

pub mod element;
pub mod value;

pub use element::Element;
pub use value::{CustomValue, CustomValueHooks, Value};
