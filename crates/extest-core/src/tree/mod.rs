//! The authoritative suite hierarchy.
//!
//! Discovery records are imported into a [`TestTree`], which owns every
//! project, directory, file and test node and exports them as nested
//! [`DisplayNode`]s for whatever renders them.

mod error;
mod graph;
mod node;

pub use error::TreeError;
pub use graph::{ExportScope, ImportReport, TestTree, ROOT_SUITE_ID};
pub use node::{DisplayNode, NodeKind, TestCase, TestNode, TestSuite};
