//! Inter-bank settlement.
//!
//! Inbound: a guarded partner request becomes a ledger credit plus a signed
//! status response. Outbound: a local debit is committed only after the
//! partner's signed acknowledgement verifies.

use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::error::SettlementError;
use crate::bank::{Bank, BankDirectory};
use crate::crypto::{CryptoEnvelope, EncryptionMethod, HashMethod, PartnerEnvelope, is_fresh_at, now_ms};
use crate::ledger::{FeePayer, LedgerEngine, LedgerError, Transaction, TransferSpec};
use crate::logging::AUDIT_TARGET;
use crate::partner::{
    AccountInfo, AccountInfoRequest, PartnerTransport, StatusPayload, TransactionPayload, TransportError,
    Verified,
};

pub const PARTNER_TRANSACTION_PATH: &str = "/partner/transaction";

#[derive(Debug, Clone)]
pub struct SettlementSettings {
    pub default_encryption: EncryptionMethod,
    pub default_hash: HashMethod,
    pub partner_timeout: Duration,
    pub freshness_window_ms: i64,
}

/// Customer request to move money to another bank.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundTransfer {
    pub from_account_number: String,
    pub to_bank_code: String,
    pub to_account_number: String,
    pub amount: Decimal,
    pub message: String,
    pub fee_payer: FeePayer,
    pub fee_amount: Decimal,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SettlementResult {
    pub transaction: Transaction,
    /// `None` when the key had already been settled and nothing was sent
    pub remote_status: Option<StatusPayload>,
}

/// Result of processing an inbound transfer.
///
/// Business rejections still produce a signed response; `transaction`
/// is then `None`.
#[derive(Debug, Clone)]
pub struct InboundOutcome {
    pub transaction: Option<Transaction>,
    pub status: StatusPayload,
    pub response: PartnerEnvelope,
}

pub struct SettlementService {
    crypto: Arc<CryptoEnvelope>,
    ledger: Arc<LedgerEngine>,
    banks: Arc<dyn BankDirectory>,
    transport: Arc<dyn PartnerTransport>,
    /// bank code -> base URL
    endpoints: HashMap<String, String>,
    settings: SettlementSettings,
}

impl SettlementService {
    pub fn new(
        crypto: Arc<CryptoEnvelope>,
        ledger: Arc<LedgerEngine>,
        banks: Arc<dyn BankDirectory>,
        transport: Arc<dyn PartnerTransport>,
        endpoints: HashMap<String, String>,
        settings: SettlementSettings,
    ) -> Self {
        Self {
            crypto,
            ledger,
            banks,
            transport,
            endpoints,
            settings,
        }
    }

    pub fn own_bank_code(&self) -> &str {
        self.crypto.keys().own_bank_code()
    }

    pub fn ledger(&self) -> &Arc<LedgerEngine> {
        &self.ledger
    }

    async fn counterpart(&self, bank_code: &str) -> Result<Bank, SettlementError> {
        self.banks
            .by_code(bank_code)
            .await?
            .ok_or_else(|| SettlementError::UnknownBank(bank_code.to_string()))
    }

    /// Seal `payload` for `counterpart`. RSA work runs on the blocking pool.
    pub async fn build_response_envelope<T: Serialize + Send + 'static>(
        &self,
        payload: T,
        hash_method: HashMethod,
        counterpart: &str,
        method: EncryptionMethod,
    ) -> Result<PartnerEnvelope, SettlementError> {
        let crypto = self.crypto.clone();
        let recipient = counterpart.to_string();
        let ts = now_ms();
        let sealed = tokio::task::spawn_blocking(move || {
            crypto.seal(&payload, &recipient, method, hash_method, ts)
        })
        .await
        .map_err(|e| SettlementError::Internal(e.to_string()))??;
        Ok(sealed)
    }

    pub async fn handle_inbound(
        &self,
        request: Verified<TransactionPayload>,
    ) -> Result<InboundOutcome, SettlementError> {
        let bank = self.counterpart(&request.bank_code).await?;
        let payload = &request.payload;
        let reference = payload.idempotency_key.clone();

        let success = StatusPayload::success(reference.clone(), now_ms());
        let response = self
            .build_response_envelope(
                success.clone(),
                request.header.hash_method,
                &bank.bank_code,
                request.header.encryption_method,
            )
            .await?;

        let mut spec = TransferSpec::transfer(
            bank.bank_id,
            payload.from_account_number.clone(),
            self.ledger.own_bank_id(),
            payload.to_bank_account_number.clone(),
            payload.amount,
        )
        .with_fee(payload.fee_amount, payload.fee_payer)
        .with_message(payload.message.clone())
        .with_signatures(request.signature.clone(), response.signature.clone());
        if let Some(key) = &payload.idempotency_key {
            // namespaced so partners cannot collide with each other or with local keys
            spec = spec.with_idempotency_key(format!("in:{}:{}", bank.bank_code, key));
        }

        match self.ledger.apply_transaction(spec).await {
            Ok(transaction) => {
                tracing::info!(
                    target: AUDIT_TARGET,
                    bank = %bank.bank_code,
                    transaction_id = transaction.transaction_id,
                    amount = %transaction.amount,
                    "Inbound transfer settled"
                );
                Ok(InboundOutcome {
                    transaction: Some(transaction),
                    status: success,
                    response,
                })
            }
            Err(e) if e.is_transient() => Err(e.into()),
            Err(e) => {
                tracing::warn!(
                    target: AUDIT_TARGET,
                    bank = %bank.bank_code,
                    code = e.code(),
                    "Inbound transfer rejected by ledger"
                );
                let status = StatusPayload::failure(e.http_status(), e.to_string(), reference, now_ms());
                let response = self
                    .build_response_envelope(
                        status.clone(),
                        request.header.hash_method,
                        &bank.bank_code,
                        request.header.encryption_method,
                    )
                    .await?;
                Ok(InboundOutcome {
                    transaction: None,
                    status,
                    response,
                })
            }
        }
    }

    /// Answer a partner's account lookup with a sealed `AccountInfo`.
    pub async fn account_info(
        &self,
        request: Verified<AccountInfoRequest>,
    ) -> Result<PartnerEnvelope, SettlementError> {
        let account = self
            .ledger
            .find_account(&request.payload.account_number)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(request.payload.account_number.clone()))?;
        let info = AccountInfo {
            bank_code: self.own_bank_code().to_string(),
            account_number: account.account_number,
            customer_id: account.customer_id,
        };
        self.build_response_envelope(
            info,
            request.header.hash_method,
            &request.bank_code,
            request.header.encryption_method,
        )
        .await
    }

    pub async fn initiate_outbound(&self, transfer: OutboundTransfer) -> Result<SettlementResult, SettlementError> {
        let bank = self.counterpart(&transfer.to_bank_code).await?;
        if !self.crypto.keys().is_registered(&bank.bank_code) {
            return Err(SettlementError::UnknownBank(bank.bank_code));
        }
        let endpoint = self
            .endpoints
            .get(&bank.bank_code)
            .ok_or_else(|| SettlementError::NoEndpoint(bank.bank_code.clone()))?;
        let url = format!("{}{}", endpoint.trim_end_matches('/'), PARTNER_TRANSACTION_PATH);

        let key = transfer
            .idempotency_key
            .clone()
            .unwrap_or_else(|| ulid::Ulid::new().to_string());

        let spec = TransferSpec::transfer(
            self.ledger.own_bank_id(),
            transfer.from_account_number.clone(),
            bank.bank_id,
            transfer.to_account_number.clone(),
            transfer.amount,
        )
        .with_fee(transfer.fee_amount, transfer.fee_payer)
        .with_message(transfer.message.clone())
        .with_idempotency_key(key.clone());

        if let Some(existing) = self.ledger.store().find_by_idempotency_key(&key).await? {
            if !existing.matches(&spec) {
                tracing::warn!(key = %key, recorded = existing.transaction_id, "Idempotency key reused for a different transfer");
                return Err(LedgerError::IdempotencyConflict(key).into());
            }
            tracing::info!(key = %key, "Outbound transfer already settled");
            return Ok(SettlementResult {
                transaction: existing,
                remote_status: None,
            });
        }

        self.ledger.preflight(&spec).await?;

        let payload = TransactionPayload {
            from_bank_code: self.own_bank_code().to_string(),
            from_account_number: transfer.from_account_number,
            to_bank_account_number: transfer.to_account_number,
            amount: transfer.amount,
            message: transfer.message,
            fee_payer: transfer.fee_payer,
            fee_amount: transfer.fee_amount,
            idempotency_key: Some(key.clone()),
        };
        let request = self
            .build_response_envelope(
                payload,
                self.settings.default_hash,
                &bank.bank_code,
                self.settings.default_encryption,
            )
            .await?;

        let sent = tokio::time::timeout(self.settings.partner_timeout, self.transport.send(&url, &request)).await;
        let reply = match sent {
            Ok(Ok(reply)) => reply,
            Ok(Err(TransportError::Status(status))) => {
                return Err(self.outbound_failed(
                    &bank,
                    SettlementError::RemoteRejected {
                        status,
                        message: "request rejected".into(),
                    },
                ));
            }
            Ok(Err(TransportError::Malformed)) => {
                return Err(self.outbound_failed(&bank, SettlementError::RemoteSignatureInvalid));
            }
            Ok(Err(e)) => {
                return Err(self.outbound_failed(&bank, SettlementError::RemoteUnreachable(e.to_string())));
            }
            Err(_) => {
                return Err(self.outbound_failed(&bank, SettlementError::RemoteUnreachable("timeout".into())));
            }
        };

        let (status, response_signature) = match self.open_reply::<StatusPayload>(reply, &bank.bank_code).await {
            Ok(opened) => opened,
            Err(e) => return Err(self.outbound_failed(&bank, e)),
        };
        // An acknowledgement must name the transfer it settles
        if status.reference.as_deref() != Some(key.as_str()) {
            return Err(self.outbound_failed(&bank, SettlementError::RemoteSignatureInvalid));
        }
        if !status.is_success() {
            return Err(self.outbound_failed(
                &bank,
                SettlementError::RemoteRejected {
                    status: status.status_code,
                    message: status.message,
                },
            ));
        }

        let spec = spec.with_signatures(request.signature.clone(), Some(response_signature));
        match self.ledger.apply_transaction(spec).await {
            Ok(transaction) => {
                tracing::info!(
                    target: AUDIT_TARGET,
                    bank = %bank.bank_code,
                    transaction_id = transaction.transaction_id,
                    amount = %transaction.amount,
                    "Outbound transfer settled"
                );
                Ok(SettlementResult {
                    transaction,
                    remote_status: Some(status),
                })
            }
            Err(e) => {
                tracing::error!(
                    target: AUDIT_TARGET,
                    bank = %bank.bank_code,
                    key = %key,
                    error = %e,
                    "Partner credited but local debit failed; needs reconciliation"
                );
                Err(e.into())
            }
        }
    }

    fn outbound_failed(&self, bank: &Bank, error: SettlementError) -> SettlementError {
        tracing::warn!(
            target: AUDIT_TARGET,
            bank = %bank.bank_code,
            code = error.code(),
            reason = %error,
            "Outbound transfer not settled"
        );
        error
    }

    /// Decrypt a partner reply and check freshness, integrity and signature.
    /// Returns the payload and the reply's signature.
    async fn open_reply<T: DeserializeOwned + Send + 'static>(
        &self,
        reply: PartnerEnvelope,
        sender: &str,
    ) -> Result<(T, String), SettlementError> {
        let crypto = self.crypto.clone();
        let sender = sender.to_string();
        let window = self.settings.freshness_window_ms;
        tokio::task::spawn_blocking(move || {
            let header = reply
                .header
                .parse()
                .map_err(|_| SettlementError::RemoteSignatureInvalid)?;
            let plaintext = crypto
                .decrypt(&reply.encrypted_payload, header.encryption_method)
                .map_err(|_| SettlementError::RemoteSignatureInvalid)?;
            if !is_fresh_at(now_ms(), header.timestamp, window) {
                return Err(SettlementError::RemoteSignatureInvalid);
            }
            let input = header.signing_input(&plaintext);
            if !crypto.verify_hash(&input, header.hash_method, &reply.integrity) {
                return Err(SettlementError::RemoteSignatureInvalid);
            }
            let signature = reply.signature.ok_or(SettlementError::RemoteSignatureInvalid)?;
            if !crypto.verify_signature(&input, &signature, &sender, header.encryption_method) {
                return Err(SettlementError::RemoteSignatureInvalid);
            }
            let payload = serde_json::from_slice(&plaintext).map_err(|_| SettlementError::RemoteSignatureInvalid)?;
            Ok((payload, signature))
        })
        .await
        .map_err(|e| SettlementError::Internal(e.to_string()))?
    }
}
