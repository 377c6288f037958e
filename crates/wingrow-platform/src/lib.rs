pub mod config;
pub mod contracts;
pub mod db;
pub mod identity;
pub mod pg_store;

pub use config::ServiceConfig;
pub use contracts::{
    ApprovedIssueResponse, ClaimListQuery, ClaimListResponse, ClaimTransitionResponse,
    DecideClaimRequest, DraftResponse, ErrorBody, InventoryItemListResponse, IssueRequestListQuery,
    IssueRequestListResponse, IssueRequestView, MarkPaidRequest, RecordPaymentRequest,
    RejectIssueRequest,
};
pub use db::{connect_database, ensure_schema};
pub use identity::{TokenClaims, TokenVerifier};
pub use pg_store::PgStore;
