pub mod comment;
pub mod error;
pub mod ident;
pub mod locate;
pub mod normalize;
pub mod reconcile;
pub mod tree;

pub use comment::*;
pub use error::TreeError;
pub use ident::IdGenerator;
pub use locate::{DepthFirst, NodeMut};
pub use normalize::{AuthorDefaults, normalize};
pub use reconcile::{CommentDraft, Confirmation, Placement, ProvisionalInsert};
pub use tree::{CommentTree, CommentView, Node, NodeKey};

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod proptests;
