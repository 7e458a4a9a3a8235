//! Rendering
//!
//! Render descriptions ([`VNode`]), the host capability set ([`HostOps`]),
//! and the [`Renderer`] that reconciles one against the other.
//!
//! ```rust
//! use ripple_core::reactive::Runtime;
//! use ripple_core::render::{MemoryHost, Renderer, VNode};
//!
//! let rt = Runtime::new();
//! let mut host = MemoryHost::new();
//! let root = host.create_root();
//! let renderer = Renderer::new(&rt, host);
//!
//! renderer
//!     .render(Some(VNode::element("p").text_child("hello")), &root)
//!     .unwrap();
//! assert_eq!(renderer.host().inner_html(root), "<p>hello</p>");
//! ```

mod component;
mod host;
mod keyed;
mod lis;
mod memory;
mod renderer;
mod vnode;

pub use component::Component;
pub use host::HostOps;
pub use lis::longest_increasing_subsequence;
pub use memory::{HostOp, MemoryHost, NodeId};
pub use renderer::{ReconcileStats, Renderer};
pub use vnode::{is_same_vnode, Children, Key, Props, ShapeFlags, VNode, VNodeType};
