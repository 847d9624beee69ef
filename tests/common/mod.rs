// Shared test doubles for the collaborator seams.
#![allow(dead_code)]

use alloy::primitives::{Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use txlatency::chain::{sign_transfer, SigningContext};
use txlatency::{
    AlertNotifier, BlobUploader, ChainClient, MeasurementParams, MeasurementRecord, ProbeError,
    RecordSink, Result, SignedTransfer, Submission, TransferRequest,
};
use txlatency::chain::units::BalanceUnit;

pub const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
pub const CHAIN_ID: u64 = 1001;
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

pub fn klay(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

pub fn params(threshold_klay: u64, serialize: bool) -> MeasurementParams {
    MeasurementParams {
        gas_limit: 25_000,
        alert_threshold: klay(threshold_klay),
        alert_unit: BalanceUnit::Klay,
        explorer_url: "https://kairos.kaiascope.com".to_string(),
        serialize_submissions: serialize,
        submit_timeout: SUBMIT_TIMEOUT,
    }
}

/// Chain double that signs for real and fakes the node.
pub struct MockChain {
    signer: PrivateKeySigner,
    balance: Mutex<Option<U256>>,
    fail_submit: AtomicBool,
    /// Send latency per nonce; missing entries send instantly.
    submit_delays: Mutex<Vec<Duration>>,
    nonce: AtomicU64,
    pub hash_to_nonce: Mutex<HashMap<B256, u64>>,
    pub balance_calls: AtomicUsize,
    pub sign_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockChain {
    pub fn new(balance: Option<U256>) -> Self {
        Self {
            signer: txlatency::chain::parse_signer(TEST_KEY).unwrap(),
            balance: Mutex::new(balance),
            fail_submit: AtomicBool::new(false),
            submit_delays: Mutex::new(Vec::new()),
            nonce: AtomicU64::new(0),
            hash_to_nonce: Mutex::new(HashMap::new()),
            balance_calls: AtomicUsize::new(0),
            sign_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn failing_submit(self) -> Self {
        self.fail_submit.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_submit_delays(self, delays: Vec<Duration>) -> Self {
        *self.submit_delays.lock().unwrap() = delays;
        self
    }

    pub fn signer_address_string(&self) -> String {
        self.signer.address().to_string()
    }

    pub fn delay_for(&self, nonce: u64) -> Duration {
        self.submit_delays
            .lock()
            .unwrap()
            .get(nonce as usize)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        assert_eq!(address, self.signer.address());
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        (*self.balance.lock().unwrap()).ok_or_else(|| ProbeError::Rpc("balance unavailable".into()))
    }

    async fn sign(&self, request: &TransferRequest) -> Result<SignedTransfer> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let signed = sign_transfer(
            &self.signer,
            request,
            SigningContext {
                chain_id: CHAIN_ID,
                nonce,
                gas_price: 25_000_000_000,
            },
        )?;
        self.hash_to_nonce.lock().unwrap().insert(signed.hash, nonce);
        Ok(signed)
    }

    async fn submit(&self, signed: &SignedTransfer) -> Result<Submission> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let nonce = self.hash_to_nonce.lock().unwrap().get(&signed.hash).copied();
        let delay = nonce.map(|n| self.delay_for(n)).unwrap_or_default();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(ProbeError::Rpc("connection refused".into()));
        }
        Ok(Submission {
            tx_hash: signed.hash,
        })
    }
}

#[derive(Default)]
pub struct MockSink {
    pub records: Mutex<Vec<MeasurementRecord>>,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl MockSink {
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.fail.store(true, Ordering::SeqCst);
        sink
    }
}

#[async_trait]
impl RecordSink for MockSink {
    async fn persist(&self, record: &MeasurementRecord) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProbeError::upload("bucket", "key.parquet", "access denied"));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(format!("{}.parquet", record.tx_hash()))
    }
}

#[derive(Default)]
pub struct MockNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl AlertNotifier for MockNotifier {
    fn notify(&self, message: String) {
        self.messages.lock().unwrap().push(message);
    }
}

/// Uploader double that captures the file content at upload time.
#[derive(Default)]
pub struct MockUploader {
    pub key_prefix: String,
    pub uploads: Mutex<Vec<(String, PathBuf, Vec<MeasurementRecord>)>>,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl MockUploader {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            key_prefix: prefix.to_string(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl BlobUploader for MockUploader {
    async fn upload(&self, name: &str, path: &Path) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = if self.key_prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.key_prefix, name)
        };
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProbeError::upload("test-bucket", key, "service unavailable"));
        }
        let records = txlatency::sink::read_record_file(path)?;
        self.uploads
            .lock()
            .unwrap()
            .push((key.clone(), path.to_path_buf(), records));
        Ok(key)
    }

    fn destination(&self) -> String {
        "mock://test-bucket".to_string()
    }
}

pub fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("txlatency-{}-{}", tag, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
