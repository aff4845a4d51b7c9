//! Reward token adapter signing `mintTo` calls with the operator wallet.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, PendingTransaction, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, TransactionReceipt, U256};
use tracing::debug;

use super::contracts::WorbooToken;
use crate::domain::{AppError, BlockchainError, RewardToken};

/// Signing client used for reward transactions
pub type EthSigner = SignerMiddleware<Provider<Http>, LocalWallet>;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Mints rewards through the token contract and waits for receipts
pub struct EthRewardToken {
    client: Arc<EthSigner>,
    token: WorbooToken<EthSigner>,
    confirmations: usize,
    confirmation_timeout: Duration,
}

impl EthRewardToken {
    /// `wallet` must already carry the chain id.
    #[must_use]
    pub fn new(
        provider: Provider<Http>,
        wallet: LocalWallet,
        token_address: Address,
        confirmations: usize,
        confirmation_timeout: Duration,
    ) -> Self {
        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let token = WorbooToken::new(token_address, Arc::clone(&client));
        Self {
            client,
            token,
            confirmations: confirmations.max(1),
            confirmation_timeout,
        }
    }

    pub fn address(&self) -> Address {
        self.token.address()
    }
}

/// Map a mined receipt to its block number, rejecting reverted transactions.
fn check_receipt(tx_hash: &str, receipt: TransactionReceipt) -> Result<u64, AppError> {
    match receipt.status {
        Some(status) if status.is_zero() => {
            Err(BlockchainError::Reverted(format!("{} reverted", tx_hash)).into())
        }
        _ => Ok(receipt.block_number.map(|b| b.as_u64()).unwrap_or_default()),
    }
}

#[async_trait]
impl RewardToken for EthRewardToken {
    async fn submit_mint(&self, player: Address, amount: U256) -> Result<String, AppError> {
        let call = self.token.mint_to(player, amount);
        let pending = call
            .send()
            .await
            .map_err(|e| BlockchainError::Transient(e.to_string()))?;
        Ok(format!("{:#x}", pending.tx_hash()))
    }

    async fn wait_for_confirmation(&self, tx_hash: &str) -> Result<u64, AppError> {
        let hash: H256 = tx_hash
            .parse()
            .map_err(|_| BlockchainError::InvalidEvent(format!("bad tx hash {}", tx_hash)))?;

        let pending = PendingTransaction::new(hash, self.client.provider())
            .confirmations(self.confirmations)
            .interval(RECEIPT_POLL_INTERVAL);

        let receipt = match tokio::time::timeout(self.confirmation_timeout, pending).await {
            Err(_) => {
                return Err(BlockchainError::Transient(format!(
                    "no receipt for {} after {}s",
                    tx_hash,
                    self.confirmation_timeout.as_secs()
                ))
                .into());
            }
            Ok(Err(e)) => return Err(BlockchainError::Transient(e.to_string()).into()),
            Ok(Ok(None)) => {
                return Err(
                    BlockchainError::Transient(format!("{} dropped from mempool", tx_hash)).into(),
                );
            }
            Ok(Ok(Some(receipt))) => receipt,
        };

        debug!(tx_hash, block = ?receipt.block_number, "Receipt received");
        check_receipt(tx_hash, receipt)
    }

    fn operator_address(&self) -> Option<Address> {
        Some(self.client.signer().address())
    }
}
