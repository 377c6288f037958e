pub mod ledger;
pub mod requests;

pub use ledger::{DEFAULT_CATALOG, ItemPatch, StockLedger};
pub use requests::{
    ApproveInput, ApprovedIssue, IssueRequestService, NewIssueRequest, PaymentSummary,
};
