//! Chain access for the latency probe.
//!
//! [`ChainClient`] is the narrow seam the measurement task talks to. The
//! production implementation is [`KlaytnClient`], an alloy HTTP provider plus a
//! local signer for a single account.

use alloy::consensus::{SignableTransaction, Transaction as _, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::{Decodable2718, Encodable2718};
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use std::str::FromStr;

use crate::error::{ProbeError, Result, TransactionErrorKind};

mod klaytn;
pub mod units;

pub use klaytn::KlaytnClient;

/// A plain value transfer the probe wants signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub gas_limit: u64,
}

impl TransferRequest {
    /// Zero-value transfer from `address` back to itself.
    pub fn self_transfer(address: Address, gas_limit: u64) -> Self {
        Self {
            from: address,
            to: address,
            value: U256::ZERO,
            gas_limit,
        }
    }
}

/// Network-dependent fields filled in right before signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningContext {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: u128,
}

/// RLP (EIP-2718) encoded, signed transaction ready for `sendRawTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransfer {
    pub raw: Bytes,
    pub hash: B256,
}

/// Acknowledgment of a raw send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub tx_hash: B256,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Address of the account this client signs for.
    fn address(&self) -> Address;

    /// Current balance in peb, read fresh from the node.
    async fn get_balance(&self, address: Address) -> Result<U256>;

    /// Fills nonce, gas price and chain id from the node and signs `request`.
    async fn sign(&self, request: &TransferRequest) -> Result<SignedTransfer>;

    /// Sends a signed transaction and waits for the node to accept it.
    async fn submit(&self, signed: &SignedTransfer) -> Result<Submission>;

    /// Chain id embedded in the signed transaction.
    fn decode_chain_id(&self, signed: &SignedTransfer) -> Result<u64> {
        decode_chain_id(&signed.raw)
    }
}

/// Parses a hex private key, with or without the `0x` prefix.
pub fn parse_signer(private_key: &str) -> Result<PrivateKeySigner> {
    let trimmed = private_key.trim();
    let hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    PrivateKeySigner::from_str(hex).map_err(|e| {
        ProbeError::transaction(TransactionErrorKind::InvalidKey, format!("Invalid private key: {}", e))
    })
}

/// Builds and signs an EIP-155 legacy transaction, the type Klaytn accepts
/// through `eth_sendRawTransaction`.
pub fn sign_transfer(
    signer: &PrivateKeySigner,
    request: &TransferRequest,
    ctx: SigningContext,
) -> Result<SignedTransfer> {
    if request.from != signer.address() {
        return Err(ProbeError::transaction(
            TransactionErrorKind::SigningFailed,
            format!("Signer {} cannot sign for {}", signer.address(), request.from),
        ));
    }

    let mut tx = TxLegacy {
        chain_id: Some(ctx.chain_id),
        nonce: ctx.nonce,
        gas_price: ctx.gas_price,
        gas_limit: request.gas_limit,
        to: TxKind::Call(request.to),
        value: request.value,
        input: Bytes::new(),
    };

    let sig = TxSignerSync::sign_transaction_sync(signer, &mut tx).map_err(|e| {
        ProbeError::transaction(TransactionErrorKind::SigningFailed, format!("Sign tx failed: {}", e))
    })?;
    let signed: TxEnvelope = tx.into_signed(sig).into();

    Ok(SignedTransfer {
        raw: Bytes::from(signed.encoded_2718()),
        hash: *signed.tx_hash(),
    })
}

/// Decodes the envelope and returns its chain id as a plain integer.
pub fn decode_chain_id(raw: &[u8]) -> Result<u64> {
    let mut buf = raw;
    let envelope = TxEnvelope::decode_2718(&mut buf).map_err(|e| {
        ProbeError::transaction(TransactionErrorKind::DecodeFailed, e.to_string())
    })?;
    envelope.chain_id().ok_or_else(|| {
        ProbeError::transaction(
            TransactionErrorKind::MissingChainId,
            format!("transaction {} is not replay-protected", envelope.tx_hash()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::consensus::Transaction;

    // Well-known throwaway key from the web3 docs.
    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn ctx() -> SigningContext {
        SigningContext {
            chain_id: 1001,
            nonce: 7,
            gas_price: 25_000_000_000,
        }
    }

    #[test]
    fn test_parse_signer_accepts_prefixed_and_bare() {
        let a = parse_signer(KEY).unwrap();
        let b = parse_signer(KEY.trim_start_matches("0x")).unwrap();
        assert_eq!(a.address(), b.address());
        assert!(parse_signer("not-a-key").is_err());
    }

    #[test]
    fn test_sign_and_decode_chain_id() {
        let signer = parse_signer(KEY).unwrap();
        let request = TransferRequest::self_transfer(signer.address(), 25_000);

        let signed = sign_transfer(&signer, &request, ctx()).unwrap();
        assert_eq!(decode_chain_id(&signed.raw).unwrap(), 1001);

        let mut buf = signed.raw.as_ref();
        let envelope = TxEnvelope::decode_2718(&mut buf).unwrap();
        assert_eq!(*envelope.tx_hash(), signed.hash);
        assert_eq!(envelope.nonce(), 7);
        assert_eq!(envelope.gas_limit(), 25_000);
        assert_eq!(envelope.value(), U256::ZERO);
        assert_eq!(envelope.to(), Some(signer.address()));
    }

    #[test]
    fn test_sign_rejects_foreign_sender() {
        let signer = parse_signer(KEY).unwrap();
        let request = TransferRequest::self_transfer(Address::repeat_byte(0x11), 25_000);
        assert!(matches!(
            sign_transfer(&signer, &request, ctx()),
            Err(ProbeError::TransactionError { kind: TransactionErrorKind::SigningFailed, .. })
        ));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            decode_chain_id(&[0xde, 0xad]),
            Err(ProbeError::TransactionError { kind: TransactionErrorKind::DecodeFailed, .. })
        ));
    }
}
