pub mod error;
pub mod identity;
pub mod input;
pub mod models;
pub mod storage;
pub mod totals;

pub use error::{DomainError, DomainResult};
pub use identity::{CallerContext, Role};
pub use models::{
    Claim, ClaimFilter, ClaimItem, ClaimStatus, InventoryItem, IssueRequest, RequestFilter,
    RequestStatus, SettlementStatus, SortOrder,
};
pub use storage::{
    ApprovalCommand, ApprovalOutcome, ClaimStore, Decision, InventoryStore, PaymentOutcome,
    StockDecrement,
};
