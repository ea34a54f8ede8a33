// The chain context is built once at startup and passed to whatever needs the
// ledger, the account state or the stake registry. Cloning it is cheap and
// every clone shares the same state.

use crate::config::Config;
use crate::core::{
    Block, ChainValidator, DifficultyAdjustment, Ledger, LedgerSnapshot, Miner, MiningHandle,
    ProofOfWork, StakingRegistry, StakingSnapshot, Transaction, TransactionType, Validator,
    Verdict, NETWORK_SENDER,
};
use crate::economy::{
    calculate_block_reward, calculate_fee_distribution, calculate_next_halving, CoinEconomics,
    FeeManager, RewardManager, TransactionProcessor, STAKING_REWARD_DIVISOR,
};
use crate::error::{BlockchainError, Result};
use crate::storage::{
    AccountStore, SnapshotStore, ACCOUNTS_KEY, ECONOMICS_KEY, FEES_KEY, LEDGER_KEY, STAKING_KEY,
};
use crate::utils::current_timestamp;
use crate::wallet::short_address;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Fee totals derived from the chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeStatistics {
    pub total_fees: u64,
    pub miner_share: u64,
    pub burned: u64,
    pub transactions_with_fees: usize,
}

/// Reward totals derived from the chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardStatistics {
    pub total_rewards: u64,
    pub reward_transactions: usize,
    pub current_block_reward: u64,
    pub next_halving_height: i64,
}

/// Point-in-time summary of the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStatus {
    pub block_count: usize,
    pub tip_hash: String,
    pub difficulty: u32,
    pub pending: usize,
    pub validators: usize,
    pub total_staked: u64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct ChainContext {
    config: Config,
    ledger: Ledger,
    staking: Arc<StakingRegistry>,
    accounts: Arc<Mutex<AccountStore>>,
    economics: Arc<Mutex<CoinEconomics>>,
    fees: Arc<Mutex<FeeManager>>,
}

impl ChainContext {
    /// A fresh context: genesis only, no accounts, no validators
    pub fn new(config: Config) -> ChainContext {
        ChainContext {
            config,
            ledger: Ledger::new(),
            staking: Arc::new(StakingRegistry::new()),
            accounts: Arc::new(Mutex::new(AccountStore::new())),
            economics: Arc::new(Mutex::new(CoinEconomics::new())),
            fees: Arc::new(Mutex::new(FeeManager::new())),
        }
    }

    /// Restore every record from `store`; records never saved start fresh
    pub fn load(config: Config, store: &SnapshotStore) -> Result<ChainContext> {
        let ledger = match store.load::<LedgerSnapshot>(LEDGER_KEY)? {
            Some(snapshot) => Ledger::from_snapshot(snapshot)?,
            None => Ledger::new(),
        };
        let staking = store
            .load::<StakingSnapshot>(STAKING_KEY)?
            .map(StakingRegistry::from_snapshot)
            .unwrap_or_default();
        let accounts = store.load::<AccountStore>(ACCOUNTS_KEY)?.unwrap_or_default();
        let economics = match store.load::<CoinEconomics>(ECONOMICS_KEY)? {
            Some(economics) => economics,
            None => CoinEconomics::from_chain(&ledger.blocks()),
        };
        let fees = store.load::<FeeManager>(FEES_KEY)?.unwrap_or_default();

        Ok(ChainContext {
            config,
            ledger,
            staking: Arc::new(staking),
            accounts: Arc::new(Mutex::new(accounts)),
            economics: Arc::new(Mutex::new(economics)),
            fees: Arc::new(Mutex::new(fees)),
        })
    }

    pub fn save(&self, store: &SnapshotStore) -> Result<()> {
        store.save(LEDGER_KEY, &self.ledger.snapshot())?;
        store.save(ACCOUNTS_KEY, &*lock(&self.accounts))?;
        store.save(STAKING_KEY, &self.staking.snapshot())?;
        store.save(ECONOMICS_KEY, &*lock(&self.economics))?;
        store.save(FEES_KEY, &*lock(&self.fees))?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn staking(&self) -> &StakingRegistry {
        &self.staking
    }

    /// Credit the genesis allocation to each address; only before the first block
    pub fn initialize_genesis(&self, addresses: &[String]) -> Result<()> {
        let mut accounts = lock(&self.accounts);
        if self.ledger.get_block_count() > 1 {
            return Err(BlockchainError::Precondition(
                "Genesis allocation is only possible before the first block".to_string(),
            ));
        }
        accounts.initialize_genesis(addresses)
    }

    /// Validate a wallet-signed transaction, apply its balance effect and queue it
    pub fn submit_transaction(&self, tx: Transaction) -> Result<()> {
        ChainValidator::validate_transaction(&tx)?.into_result()?;
        if tx.get_type().is_synthetic() {
            return Err(BlockchainError::Transaction(format!(
                "{} transactions are issued by the protocol",
                tx.get_type()
            )));
        }
        if !tx.verify_signature() {
            return Err(BlockchainError::Validation(format!(
                "Transaction {} carries no valid signature",
                tx.get_id()
            )));
        }

        // Held until the transaction is queued so block acceptance sees both or neither
        let mut accounts = lock(&self.accounts);
        if self.ledger.contains_transaction(tx.get_id()) {
            return Err(BlockchainError::Validation(format!(
                "Transaction {} is already known",
                tx.get_id()
            )));
        }
        TransactionProcessor::process_transaction(&tx, &mut accounts)?;
        if tx.get_type() == TransactionType::Stake {
            self.staking.add_stake(tx.get_sender(), tx.get_amount())?;
        }

        info!("Queued {} transaction {}", tx.get_type(), tx.get_id());
        self.ledger.add_transaction(tx);
        Ok(())
    }

    /// Queue a staking payout for `address`; `None` when it rounds to zero
    pub fn issue_staking_reward(&self, address: &str) -> Result<Option<Transaction>> {
        let validator = self.staking.get_validator(address).ok_or_else(|| {
            BlockchainError::Precondition(format!("{} is not a validator", short_address(address)))
        })?;
        let reward =
            RewardManager::new(address).create_staking_reward(address, validator.staked)?;
        if let Some(tx) = &reward {
            self.ledger.add_transaction(tx.clone());
        }
        Ok(reward)
    }

    fn miner(&self, miner_address: &str) -> Miner {
        Miner::new(miner_address, self.ledger.clone())
    }

    /// Mine the pending pool, append the block and settle what it included
    pub fn mine(&self, miner_address: &str) -> Result<Block> {
        let block = self.miner(miner_address).mine_block()?;
        self.commit_mined_block(&block)?;
        Ok(block)
    }

    // Anything submitted while the search ran stays pending
    fn commit_mined_block(&self, block: &Block) -> Result<()> {
        self.accept_block(block.clone())?;
        self.ledger.prune_pending(&included_ids(block));
        Ok(())
    }

    pub fn start_mining(&self, miner_address: &str) -> MiningHandle {
        self.start_mining_with(miner_address, |_| {})
    }

    /// Background mining; `on_accepted` sees every block this loop appended
    pub fn start_mining_with<F>(&self, miner_address: &str, on_accepted: F) -> MiningHandle
    where
        F: Fn(&Block) + Send + 'static,
    {
        let context = self.clone();
        self.miner(miner_address)
            .start_mining(self.config.get_mining_interval(), move |block| {
                context.commit_mined_block(&block)?;
                on_accepted(&block);
                Ok(())
            })
    }

    /// Check a block and, only if every check passes, append it and apply its
    /// transactions, rewards, fees and economics in one step.
    ///
    /// Pending transactions were applied when they were submitted; every other
    /// non-synthetic transaction in the block is validated and applied here.
    pub fn accept_block(&self, block: Block) -> Result<()> {
        self.check_consensus(&block)?;

        let mut accounts = lock(&self.accounts);
        let mut fees = lock(&self.fees);
        let mut economics = lock(&self.economics);

        let settled = self.ledger.pending_ids();
        self.check_synthetic_transactions(&block, &settled)?;

        let mut next_accounts = accounts.clone();
        let stakes = apply_unseen_transactions(&block, &settled, &mut next_accounts)?;
        for reward in block.get_transactions().iter().filter(|tx| tx.is_reward()) {
            next_accounts.credit(reward.get_receiver(), reward.get_amount())?;
        }
        let mut next_fees = fees.clone();
        next_fees.process_fees(block.get_transactions(), block.get_miner(), &mut next_accounts)?;

        self.ledger.add_block(block.clone())?;
        *accounts = next_accounts;
        *fees = next_fees;
        economics.update_after_block(&block);
        drop((accounts, fees, economics));

        for (address, amount) in stakes {
            if let Err(e) = self.staking.add_stake(&address, amount) {
                warn!("Could not register stake of {}: {e}", short_address(&address));
            }
        }
        DifficultyAdjustment::update_difficulty(&self.ledger);
        Ok(())
    }

    // Producer, difficulty and proof-of-work rules
    fn check_consensus(&self, block: &Block) -> Result<()> {
        if self.config.is_stake_gated() && !self.staking.validate_block(block) {
            return Err(reject_block(
                block,
                format!("miner {} is not an active validator", short_address(block.get_miner())),
            ));
        }
        if block.is_genesis() {
            return Ok(());
        }
        let required = self.ledger.get_difficulty();
        if block.get_difficulty() == 0 || block.get_difficulty() < required {
            return Err(reject_block(
                block,
                format!(
                    "claims difficulty {}, at least {required} required",
                    block.get_difficulty()
                ),
            ));
        }
        if !ProofOfWork::validate(block)? {
            return Err(reject_block(block, "does not meet its proof-of-work target".to_string()));
        }
        Ok(())
    }

    // Protocol-issued transactions: one scheduled block reward at position 0
    // paid to the miner, otherwise only staking rewards the registry would issue
    // or this node queued itself. Fee records never appear in blocks.
    fn check_synthetic_transactions(&self, block: &Block, settled: &HashSet<String>) -> Result<()> {
        let scheduled = calculate_block_reward(block.get_index());
        let mut paid_validators = HashSet::new();

        for (position, tx) in block.get_transactions().iter().enumerate() {
            match tx.get_type() {
                TransactionType::Reward => {}
                TransactionType::Fee => {
                    return Err(reject_block(block, format!("carries fee record {}", tx.get_id())));
                }
                _ => continue,
            }
            if tx.get_sender() != NETWORK_SENDER || tx.get_id() != tx.calculate_id() {
                return Err(reject_block(block, format!("carries forged reward {}", tx.get_id())));
            }

            if position == 0 && scheduled > 0 {
                if tx.get_receiver() != block.get_miner() || tx.get_amount() != scheduled {
                    return Err(reject_block(
                        block,
                        format!(
                            "pays a block reward of {} to {}, expected {scheduled} to the miner",
                            tx.get_amount(),
                            short_address(tx.get_receiver())
                        ),
                    ));
                }
                continue;
            }
            if settled.contains(tx.get_id()) {
                continue;
            }

            let expected = self
                .staking
                .get_validator(tx.get_receiver())
                .filter(|v| v.active)
                .map(|v| v.staked / STAKING_REWARD_DIVISOR)
                .filter(|amount| *amount > 0);
            if expected != Some(tx.get_amount()) || !paid_validators.insert(tx.get_receiver()) {
                return Err(reject_block(
                    block,
                    format!(
                        "pays an unissued reward of {} to {}",
                        tx.get_amount(),
                        short_address(tx.get_receiver())
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Accept a block from a peer and settle the pending transactions it included
    pub fn receive_block(&self, block: Block) -> Result<()> {
        self.accept_block(block.clone())?;
        let pruned = self.ledger.prune_pending(&included_ids(&block));
        info!(
            "Accepted block {} from network, {pruned} pending transactions settled",
            block.get_index()
        );
        Ok(())
    }

    pub fn validate_chain(&self) -> Result<Verdict> {
        ChainValidator::validate_chain(&self.ledger.blocks())
    }

    pub fn balance(&self, address: &str) -> u64 {
        lock(&self.accounts).balance(address)
    }

    pub fn accounts(&self) -> AccountStore {
        lock(&self.accounts).clone()
    }

    pub fn economics(&self) -> CoinEconomics {
        lock(&self.economics).clone()
    }

    pub fn validators(&self) -> Vec<Validator> {
        self.staking.validators()
    }

    /// Next proposer drawn from the stake lottery
    pub fn select_proposer(&self) -> Option<String> {
        self.staking.select_validator()
    }

    /// Fee totals over every block in the chain
    pub fn fee_statistics(&self) -> FeeStatistics {
        let mut stats = FeeStatistics::default();
        for tx in self
            .ledger
            .blocks()
            .iter()
            .flat_map(|b| b.get_transactions().to_vec())
            .filter(|tx| tx.get_fee() > 0)
        {
            let (miner_share, burned) = calculate_fee_distribution(tx.get_fee());
            stats.total_fees = stats.total_fees.saturating_add(tx.get_fee());
            stats.miner_share = stats.miner_share.saturating_add(miner_share);
            stats.burned = stats.burned.saturating_add(burned);
            stats.transactions_with_fees += 1;
        }
        stats
    }

    /// Reward totals over every block in the chain
    pub fn reward_statistics(&self) -> RewardStatistics {
        let blocks = self.ledger.blocks();
        let next_height = blocks.len() as i64;
        let mut stats = RewardStatistics {
            current_block_reward: calculate_block_reward(next_height),
            next_halving_height: calculate_next_halving(next_height),
            ..RewardStatistics::default()
        };
        for tx in blocks
            .iter()
            .flat_map(|b| b.get_transactions().to_vec())
            .filter(Transaction::is_reward)
        {
            stats.total_rewards = stats.total_rewards.saturating_add(tx.get_amount());
            stats.reward_transactions += 1;
        }
        stats
    }

    pub fn status(&self) -> ChainStatus {
        ChainStatus {
            block_count: self.ledger.get_block_count(),
            tip_hash: self.ledger.tip_hash(),
            difficulty: self.ledger.get_difficulty(),
            pending: self.ledger.pending_len(),
            validators: self.staking.validators().len(),
            total_staked: self.staking.get_total_staked(),
        }
    }
}

fn reject_block(block: &Block, reason: String) -> BlockchainError {
    warn!("Rejected block {}: {reason}", block.get_index());
    BlockchainError::Validation(format!("Block {} {reason}", block.get_index()))
}

// Validate and apply every signed transaction this node has not applied yet;
// returns the stake deposits to register once the block is appended
fn apply_unseen_transactions(
    block: &Block,
    settled: &HashSet<String>,
    accounts: &mut AccountStore,
) -> Result<Vec<(String, u64)>> {
    let now = current_timestamp()?;
    let mut stakes = vec![];
    for tx in block
        .get_transactions()
        .iter()
        .filter(|tx| !tx.get_type().is_synthetic() && !settled.contains(tx.get_id()))
    {
        if let Some(reason) = ChainValidator::validate_transaction_at(tx, now).reason() {
            return Err(reject_block(block, format!("carries invalid transaction: {reason}")));
        }
        if !tx.verify_signature() {
            return Err(reject_block(block, format!("carries unsigned transaction {}", tx.get_id())));
        }
        TransactionProcessor::process_transaction(tx, accounts).map_err(|e| {
            reject_block(block, format!("carries unpayable transaction {}: {e}", tx.get_id()))
        })?;
        if tx.get_type() == TransactionType::Stake {
            stakes.push((tx.get_sender().to_string(), tx.get_amount()));
        }
    }
    Ok(stakes)
}

fn included_ids(block: &Block) -> HashSet<String> {
    block
        .get_transactions()
        .iter()
        .map(|tx| tx.get_id().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PowOutcome, MIN_STAKE};
    use crate::storage::GENESIS_ALLOCATION;
    use crate::wallet::Wallet;
    use tempfile::TempDir;

    fn funded_context() -> (ChainContext, Wallet) {
        let context = ChainContext::new(Config::default());
        context.ledger().set_difficulty(1);
        let wallet = Wallet::new().unwrap();
        context.initialize_genesis(&[wallet.get_address()]).unwrap();
        (context, wallet)
    }

    #[test]
    fn test_submit_debits_fee_and_queues() {
        let (context, wallet) = funded_context();
        let tx = Transaction::new_data("door opened", 2, &wallet).unwrap();
        context.submit_transaction(tx).unwrap();

        assert_eq!(context.balance(&wallet.get_address()), GENESIS_ALLOCATION - 2);
        assert_eq!(context.ledger().pending_len(), 1);
    }

    #[test]
    fn test_submit_rejects_unsigned_and_synthetic() {
        let (context, wallet) = funded_context();
        let now = crate::utils::current_timestamp().unwrap();
        let unsigned = Transaction::new(
            TransactionType::Data,
            "x",
            &wallet.get_address(),
            "",
            0,
            1,
            now,
            1,
        );
        assert!(matches!(
            context.submit_transaction(unsigned),
            Err(BlockchainError::Validation(_))
        ));

        let reward = Transaction::new_reward(&wallet.get_address(), 10).unwrap();
        assert!(context.submit_transaction(reward).is_err());
        assert_eq!(context.ledger().pending_len(), 0);
        assert_eq!(context.balance(&wallet.get_address()), GENESIS_ALLOCATION);
    }

    #[test]
    fn test_stake_transaction_registers_validator() {
        let (context, wallet) = funded_context();
        let tx = Transaction::new_stake(MIN_STAKE, 1, &wallet).unwrap();
        context.submit_transaction(tx).unwrap();

        assert_eq!(context.staking().get_total_staked(), MIN_STAKE);
        assert_eq!(context.balance(&wallet.get_address()), GENESIS_ALLOCATION - MIN_STAKE);
        assert_eq!(context.select_proposer(), Some(wallet.get_address()));
    }

    #[test]
    fn test_mine_pays_reward_and_fees() {
        let (context, wallet) = funded_context();
        let address = wallet.get_address();
        context
            .submit_transaction(Transaction::new_data("a", 5, &wallet).unwrap())
            .unwrap();

        let block = context.mine(&address).unwrap();
        assert_eq!(block.get_index(), 1);
        assert_eq!(context.ledger().pending_len(), 0);

        // 1000 - 5 fee + 10 reward + 4 miner share
        assert_eq!(context.balance(&address), GENESIS_ALLOCATION - 5 + 10 + 4);
        let economics = context.economics();
        assert_eq!(economics.get_burned(), 1);
        assert_eq!(context.fee_statistics().burned, 1);
        assert_eq!(context.reward_statistics().total_rewards, 10);
        assert!(context.validate_chain().unwrap().is_accepted());
    }

    #[test]
    fn test_stake_gate_rejects_unknown_miner() {
        let (context, wallet) = funded_context();
        let mut config = Config::default();
        config.set_stake_gated(true);
        let gated = ChainContext::new(config);
        gated.ledger().set_difficulty(1);

        context
            .submit_transaction(Transaction::new_data("a", 1, &wallet).unwrap())
            .unwrap();
        let block = Miner::new("outsider", context.ledger().clone())
            .mine_block()
            .unwrap();

        let err = gated.accept_block(block).unwrap_err();
        assert!(matches!(err, BlockchainError::Validation(_)));
        assert_eq!(gated.ledger().get_block_count(), 1);
    }

    #[test]
    fn test_receive_block_applies_unseen_transactions() {
        let (origin, wallet) = funded_context();
        let peer = ChainContext::new(Config::default());
        peer.ledger().set_difficulty(1);
        peer.initialize_genesis(&[wallet.get_address()]).unwrap();

        origin
            .submit_transaction(Transaction::new_data("remote", 3, &wallet).unwrap())
            .unwrap();
        let block = origin.mine("miner").unwrap();

        peer.receive_block(block).unwrap();
        assert_eq!(peer.ledger().get_block_count(), 2);
        assert_eq!(peer.balance(&wallet.get_address()), GENESIS_ALLOCATION - 3);
        assert_eq!(peer.balance("miner"), 10 + 2);
    }

    #[test]
    fn test_staking_reward_is_queued() {
        let (context, wallet) = funded_context();
        context
            .submit_transaction(Transaction::new_stake(800, 1, &wallet).unwrap())
            .unwrap();
        assert!(context.issue_staking_reward(&wallet.get_address()).unwrap().is_none());
        assert!(context.issue_staking_reward("nobody").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        let (context, wallet) = funded_context();
        context
            .submit_transaction(Transaction::new_stake(150, 1, &wallet).unwrap())
            .unwrap();
        context.mine(&wallet.get_address()).unwrap();
        context.save(&store).unwrap();

        let restored = ChainContext::load(Config::default(), &store).unwrap();
        assert_eq!(restored.ledger().blocks(), context.ledger().blocks());
        assert_eq!(restored.accounts(), context.accounts());
        assert_eq!(restored.validators(), context.validators());
        assert_eq!(restored.economics(), context.economics());
        assert_eq!(restored.status(), context.status());
    }

    #[test]
    fn test_load_empty_store_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        let context = ChainContext::load(Config::default(), &store).unwrap();
        assert_eq!(context.ledger().get_block_count(), 1);
        assert!(context.accounts().is_empty());
    }

    fn follower() -> ChainContext {
        let context = ChainContext::new(Config::default());
        context.ledger().set_difficulty(1);
        context
    }

    fn sealed(mut block: Block) -> Block {
        let pow = ProofOfWork::new(&block, block.get_difficulty()).unwrap();
        match pow.run() {
            PowOutcome::Found { nonce, hash } => block.seal(nonce, hash),
            other => panic!("no nonce found: {other:?}"),
        }
        block
    }

    #[test]
    fn test_inflated_block_reward_is_rejected() {
        let victim = follower();
        let genesis = victim.ledger().get_last_block();
        let reward = Transaction::new_reward("attacker", 5_000_000).unwrap();
        let block = sealed(Block::new_candidate(
            1,
            current_timestamp().unwrap(),
            vec![reward],
            genesis.get_hash(),
            1,
            "attacker",
        ));

        let err = victim.receive_block(block).unwrap_err();
        assert!(matches!(err, BlockchainError::Validation(_)));
        assert_eq!(victim.balance("attacker"), 0);
        assert_eq!(victim.ledger().get_block_count(), 1);
        assert_eq!(victim.economics(), CoinEconomics::new());
    }

    #[test]
    fn test_unissued_network_reward_is_rejected() {
        let victim = follower();
        let forger = Ledger::new();
        forger.set_difficulty(1);
        forger.add_transaction(Transaction::new_reward("attacker", 500).unwrap());
        let block = Miner::new("attacker", forger).mine_block().unwrap();
        // Scheduled reward first, forged payout second
        assert_eq!(block.get_transactions().len(), 2);

        let err = victim.receive_block(block).unwrap_err();
        assert!(matches!(err, BlockchainError::Validation(reason) if reason.contains("unissued")));
        assert_eq!(victim.balance("attacker"), 0);
        assert_eq!(victim.ledger().get_block_count(), 1);
    }

    #[test]
    fn test_issued_staking_reward_is_paid() {
        let (context, wallet) = funded_context();
        let address = wallet.get_address();
        lock(&context.accounts).credit(&address, 5000).unwrap();
        context
            .submit_transaction(Transaction::new_stake(4000, 1, &wallet).unwrap())
            .unwrap();
        let reward = context.issue_staking_reward(&address).unwrap().unwrap();
        assert_eq!(reward.get_amount(), 4000 / STAKING_REWARD_DIVISOR);

        context.mine(&address).unwrap();
        // 6000 - 4000 staked + 10 block reward + 2 staking reward + 1 fee share
        assert_eq!(context.balance(&address), 2013);
        assert_eq!(context.reward_statistics().total_rewards, 12);
    }

    #[test]
    fn test_block_below_required_difficulty_is_rejected() {
        let (origin, wallet) = funded_context();
        let victim = ChainContext::new(Config::default());
        victim.ledger().set_difficulty(3);
        victim.initialize_genesis(&[wallet.get_address()]).unwrap();

        origin
            .submit_transaction(Transaction::new_data("cheap", 1, &wallet).unwrap())
            .unwrap();
        let block = origin.mine("miner").unwrap();
        assert_eq!(block.get_difficulty(), 1);

        let err = victim.receive_block(block).unwrap_err();
        assert!(matches!(err, BlockchainError::Validation(reason) if reason.contains("difficulty")));
        assert_eq!(victim.ledger().get_block_count(), 1);
        assert_eq!(victim.balance("miner"), 0);
    }

    #[test]
    fn test_block_with_unpaid_transaction_is_rejected() {
        let (origin, wallet) = funded_context();
        // The follower never saw the genesis allocation
        let victim = follower();

        origin
            .submit_transaction(Transaction::new_data("free ride", 3, &wallet).unwrap())
            .unwrap();
        let block = origin.mine("miner").unwrap();

        let err = victim.receive_block(block).unwrap_err();
        assert!(matches!(err, BlockchainError::Validation(reason) if reason.contains("unpayable")));
        assert_eq!(victim.ledger().get_block_count(), 1);
        assert!(victim.accounts().is_empty());
        assert_eq!(*lock(&victim.fees), FeeManager::new());
    }

    #[test]
    fn test_mined_transaction_cannot_be_resubmitted() {
        let (context, wallet) = funded_context();
        let address = wallet.get_address();
        let tx = Transaction::new_transfer("bob", 200, 2, &wallet).unwrap();
        context.submit_transaction(tx.clone()).unwrap();
        context.mine("miner").unwrap();
        let before = context.accounts();

        let err = context.submit_transaction(tx.clone()).unwrap_err();
        assert!(matches!(err, BlockchainError::Validation(reason) if reason.contains("already known")));
        assert_eq!(context.accounts(), before);
        assert_eq!(context.balance("bob"), 200);
        assert_eq!(context.balance(&address), GENESIS_ALLOCATION - 202);
        assert_eq!(context.ledger().pending_len(), 0);
    }

    #[test]
    fn test_replayed_block_transaction_is_rejected() {
        let (origin, wallet) = funded_context();
        let victim = follower();
        victim.initialize_genesis(&[wallet.get_address()]).unwrap();

        let tx = Transaction::new_transfer("bob", 200, 2, &wallet).unwrap();
        origin.submit_transaction(tx.clone()).unwrap();
        victim.receive_block(origin.mine("miner").unwrap()).unwrap();
        let before = victim.accounts();

        let replay = Ledger::from_snapshot(origin.ledger().snapshot()).unwrap();
        replay.add_transaction(tx);
        let block = Miner::new("miner", replay).mine_block().unwrap();

        let err = victim.receive_block(block).unwrap_err();
        assert!(matches!(err, BlockchainError::Validation(reason) if reason.contains("repeats")));
        assert_eq!(victim.accounts(), before);
        assert_eq!(victim.balance("bob"), 200);
        assert_eq!(victim.ledger().get_block_count(), 2);
    }

    #[test]
    fn test_failed_block_effects_leave_state_untouched() {
        let (context, wallet) = funded_context();
        context
            .submit_transaction(Transaction::new_data("a", 2, &wallet).unwrap())
            .unwrap();
        lock(&context.accounts).credit("rich", u64::MAX).unwrap();
        let accounts = context.accounts();
        let economics = context.economics();

        let err = context.mine("rich").unwrap_err();
        assert!(matches!(err, BlockchainError::BalanceOverflow { .. }));
        assert_eq!(context.ledger().get_block_count(), 1);
        assert_eq!(context.ledger().pending_len(), 1);
        assert_eq!(context.accounts(), accounts);
        assert_eq!(context.economics(), economics);
        assert_eq!(*lock(&context.fees), FeeManager::new());
    }

    #[test]
    fn test_mining_keeps_transactions_submitted_during_search() {
        let (context, wallet) = funded_context();
        context
            .submit_transaction(Transaction::new_data("first", 1, &wallet).unwrap())
            .unwrap();
        let block = context.miner("miner").mine_block().unwrap();

        let late = Transaction::new_data("second", 1, &wallet).unwrap();
        context.submit_transaction(late.clone()).unwrap();
        context.commit_mined_block(&block).unwrap();

        assert_eq!(context.ledger().get_block_count(), 2);
        assert_eq!(context.ledger().get_pending_transactions(), vec![late]);
        assert_eq!(context.balance(&wallet.get_address()), GENESIS_ALLOCATION - 2);
    }

    #[test]
    fn test_genesis_allocation_only_before_first_block() {
        let (context, wallet) = funded_context();
        let err = context.initialize_genesis(&["late".to_string()]).unwrap_err();
        assert!(matches!(err, BlockchainError::Precondition(_)));
        assert_eq!(context.balance("late"), 0);

        context
            .submit_transaction(Transaction::new_data("a", 1, &wallet).unwrap())
            .unwrap();
        context.mine("miner").unwrap();

        // A chain with blocks but no account records
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        store.save(LEDGER_KEY, &context.ledger().snapshot()).unwrap();
        let restored = ChainContext::load(Config::default(), &store).unwrap();
        assert!(restored.accounts().is_empty());

        let err = restored.initialize_genesis(&["late".to_string()]).unwrap_err();
        assert!(matches!(err, BlockchainError::Precondition(_)));
        assert!(restored.accounts().is_empty());
    }
}
