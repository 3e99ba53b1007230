//! Engine services: document workflow and ledger posting

pub mod documents;
pub mod posting;

pub use documents::{CreateDocumentInput, DocumentService};
pub use posting::{LedgerPoster, MovementRequest};
