//! Link values, link types and their resolution
//!
//! - [`LinkValue`] - one stored link with its target and decorations
//! - [`LinkType`] - capability set every link variant implements
//! - [`LinkTypeRegistry`] - the open set of registered variants
//! - [`ElementLinkResolver`] - turns link values into [`RenderableLink`]s

mod kind;
mod registry;
mod render;
mod resolver;
mod value;

pub use kind::{ElementLinkType, LinkType, RawKind, RawLinkType};
pub use registry::LinkTypeRegistry;
pub use render::RenderableLink;
pub use resolver::ElementLinkResolver;
pub use value::{CustomAttribute, ElementRef, LinkDecorations, LinkTarget, LinkValue, TargetKind};
