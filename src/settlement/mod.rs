pub mod error;
pub mod service;

pub use error::SettlementError;
pub use service::{
    InboundOutcome, OutboundTransfer, PARTNER_TRANSACTION_PATH, SettlementResult, SettlementService,
    SettlementSettings,
};
