//! codeforge-components
//!
//! Component layer of the CodeForge JSON-UI engine:
//! - the [`Component`](component::Component) contract and component specs
//! - an explicit, shareable component registry with lazy registration
//! - the built-in component set (feature `builtin`, on by default)
//! - the component renderer, HTML output and the mounted [`Page`](page::Page)

pub mod component;
pub mod html;
pub mod page;
pub mod registry;
pub mod render;
pub mod spec;

#[cfg(feature = "builtin")]
pub mod builtin;

pub use crate::component::{Component, Props, View, ViewContext, ViewNode};
pub use crate::page::{FireOutcome, Page, PageEnv, PageError};
pub use crate::registry::{ComponentRegistry, Resolution};
pub use crate::render::{render, Placeholder, RenderStats, RenderedElement, Renderer};
pub use crate::spec::{ComponentSpec, PropKind, PropSpec};
