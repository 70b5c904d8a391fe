//! Partner-bank protocol: payloads, inbound guard, outbound transport.

pub mod dto;
pub mod error;
pub mod guard;
pub mod replay;
pub mod transport;

pub use dto::{AccountInfo, AccountInfoRequest, PartnerPayload, SignaturePolicy, StatusPayload, TransactionPayload};
pub use error::GuardError;
pub use guard::{InboundGuard, Verified, partner_guard};
pub use replay::ReplayCache;
pub use transport::{HttpPartnerTransport, PartnerTransport, TransportError};
