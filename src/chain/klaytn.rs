use alloy::network::Ethereum;
use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::client::RpcClient;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::{reqwest, Http};
use alloy::transports::utils::guess_local_url;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use url::Url;

use super::{parse_signer, sign_transfer, ChainClient, SignedTransfer, SigningContext, Submission, TransferRequest};
use crate::error::{handle_rpc_error, ProbeError, Result};

pub type HttpProvider = RootProvider<Ethereum>;

/// Klaytn/Kaia endpoint bound to one account.
///
/// The provider and signer live for the whole process. Chain id is read once;
/// nonce and gas price are read on every signing so overlapping cycles never
/// reuse a stale nonce. Every RPC request is bounded by the client timeout.
pub struct KlaytnClient {
    provider: HttpProvider,
    signer: PrivateKeySigner,
    chain_id: OnceCell<u64>,
}

impl std::fmt::Debug for KlaytnClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KlaytnClient")
            .field("provider", &"<RootProvider>")
            .field("address", &self.signer.address())
            .finish()
    }
}

impl KlaytnClient {
    pub fn connect(rpc_url: &str, private_key: &str, request_timeout: Duration) -> Result<Self> {
        let url = Url::parse(rpc_url)
            .map_err(|e| ProbeError::ConfigError(format!("Invalid RPC URL: {}", e)))?;
        let signer = parse_signer(private_key)?;

        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProbeError::ConfigError(format!("Failed to build RPC HTTP client: {}", e)))?;
        let is_local = guess_local_url(url.as_str());
        let provider = RootProvider::new(RpcClient::new(Http::with_client(http_client, url), is_local));

        info!(
            address = %signer.address(),
            rpc_url,
            timeout_secs = request_timeout.as_secs(),
            "KlaytnClient initialized"
        );

        Ok(Self {
            provider,
            signer,
            chain_id: OnceCell::new(),
        })
    }

    async fn chain_id(&self) -> Result<u64> {
        self.chain_id
            .get_or_try_init(|| async {
                self.provider
                    .get_chain_id()
                    .await
                    .map_err(|e| handle_rpc_error(e, "eth_chainId"))
            })
            .await
            .copied()
    }
}

#[async_trait]
impl ChainClient for KlaytnClient {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| handle_rpc_error(e, "eth_getBalance"))
    }

    async fn sign(&self, request: &TransferRequest) -> Result<SignedTransfer> {
        let chain_id = self.chain_id().await?;
        let nonce = self
            .provider
            .get_transaction_count(request.from)
            .pending()
            .await
            .map_err(|e| handle_rpc_error(e, "eth_getTransactionCount"))?;
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| handle_rpc_error(e, "eth_gasPrice"))?;

        let ctx = SigningContext {
            chain_id,
            nonce,
            gas_price,
        };
        debug!(?ctx, "Signing value transfer");
        sign_transfer(&self.signer, request, ctx)
    }

    async fn submit(&self, signed: &SignedTransfer) -> Result<Submission> {
        let pending = self
            .provider
            .send_raw_transaction(signed.raw.as_ref())
            .await
            .map_err(|e| handle_rpc_error(e, "eth_sendRawTransaction"))?;

        Ok(Submission {
            tx_hash: *pending.tx_hash(),
        })
    }
}
