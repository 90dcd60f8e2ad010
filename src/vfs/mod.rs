//! To let the same calling code read and write files whether they live on
//! local disk or behind a remote HTTP origin, portage provides a virtual
//! filesystem layer that abstracts the details of the underlying storage and
//! reports every path an operation touches.
//!
//! # The [`Vfs`] Trait
//! Obviously, this forms the core of this layer, serving as the abstraction
//! trait itself. While the documentation looks a bit hairy due to the use of
//! `#[async_trait]`, the actual structure is simpler. It simply provides a
//! uniform interface using uniform types, so callers never need to know which
//! backend the factory handed them.
//!
//! # Used-path tracking
//! Every operation on the surface is listed in [`Op`], which carries a static
//! classification (read or write, see [`OpKind`]) and the position of the
//! operation's path-like argument. Backends consult that table before
//! delegating to the underlying primitive and hand the path to every observer
//! registered through [`Vfs::subscribe_used_paths`]. The notification is a
//! plain synchronous call made before the primitive runs; it never reorders,
//! rewrites, or fails the call it reports on.

mod error;
mod local;
mod observer;
mod ops;
mod options;
mod remote;
mod tunnel;
mod vfs_trait;

pub use error::Error;
pub use local::*;
pub use observer::UsedPathObserver;
pub use ops::*;
pub use options::*;
pub use remote::*;
pub use vfs_trait::*;
