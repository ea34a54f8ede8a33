use chainlog::storage::WALLETS_KEY;
use chainlog::{
    short_address, validate_address, BlockchainError, ChainContext, Command, Config, Node, Opt,
    Result, SnapshotStore, Transaction, Wallet, Wallets,
};
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const SAVE_INTERVAL: Duration = Duration::from_secs(10);

fn main() {
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();
    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn open_store(config: &Config) -> Result<SnapshotStore> {
    SnapshotStore::open(config.get_data_dir())
}

fn load_wallets(store: &SnapshotStore) -> Result<Wallets> {
    match store.load::<Vec<String>>(WALLETS_KEY)? {
        Some(records) => Wallets::from_records(&records),
        None => Ok(Wallets::new()),
    }
}

fn wallet_for<'a>(wallets: &'a Wallets, address: &str) -> Result<&'a Wallet> {
    wallets.get_wallet(address).ok_or_else(|| {
        BlockchainError::Precondition(format!("No local wallet for {address}"))
    })
}

fn check_address(address: &str) -> Result<()> {
    if validate_address(address) {
        Ok(())
    } else {
        Err(BlockchainError::Precondition(format!(
            "Invalid address: {address}"
        )))
    }
}

// Submit a signed transaction and optionally mine it straight away
fn submit(context: &ChainContext, tx: Transaction, mine_as: Option<&str>) -> Result<()> {
    let id = tx.get_id().to_string();
    context.submit_transaction(tx)?;
    println!("Queued transaction {id}");
    if let Some(miner) = mine_as {
        let block = context.mine(miner)?;
        println!("Mined block {} ({})", block.get_index(), block.get_hash());
    }
    Ok(())
}

fn run_command(command: Command) -> Result<()> {
    let config = Config::from_env()?;
    let store = open_store(&config)?;
    let context = ChainContext::load(config.clone(), &store)?;

    match command {
        Command::Createwallet => {
            let mut wallets = load_wallets(&store)?;
            let address = wallets.create_wallet()?;
            store.save(WALLETS_KEY, &wallets.to_records())?;
            println!("Your new address: {address}");
        }
        Command::ListAddresses => {
            for address in load_wallets(&store)?.get_addresses() {
                println!("{address}");
            }
        }
        Command::Genesis { addresses } => {
            let addresses = if addresses.is_empty() {
                load_wallets(&store)?.get_addresses()
            } else {
                for address in &addresses {
                    check_address(address)?;
                }
                addresses
            };
            if addresses.is_empty() {
                return Err(BlockchainError::Precondition(
                    "Create a wallet before the genesis allocation".to_string(),
                ));
            }
            context.initialize_genesis(&addresses)?;
            println!("Funded {} addresses", addresses.len());
        }
        Command::Data {
            from,
            data,
            fee,
            mine,
        } => {
            let wallets = load_wallets(&store)?;
            let tx = Transaction::new_data(&data, fee, wallet_for(&wallets, &from)?)?;
            submit(&context, tx, mine.then_some(from.as_str()))?;
        }
        Command::Transfer {
            from,
            to,
            amount,
            fee,
            mine,
        } => {
            check_address(&to)?;
            let wallets = load_wallets(&store)?;
            let tx = Transaction::new_transfer(&to, amount, fee, wallet_for(&wallets, &from)?)?;
            submit(&context, tx, mine.then_some(from.as_str()))?;
        }
        Command::Stake {
            from,
            amount,
            fee,
            mine,
        } => {
            let wallets = load_wallets(&store)?;
            let tx = Transaction::new_stake(amount, fee, wallet_for(&wallets, &from)?)?;
            submit(&context, tx, mine.then_some(from.as_str()))?;
        }
        Command::Pending => {
            let pending = context.ledger().get_pending_transactions();
            println!("{} pending transactions", pending.len());
            for tx in pending {
                println!(
                    "- {} {} from {} fee {}",
                    tx.get_id(),
                    tx.get_type(),
                    short_address(tx.get_sender()),
                    tx.get_fee()
                );
            }
        }
        Command::TxStatus { id } => match context.ledger().find_transaction(&id) {
            Some((tx, Some(height))) => println!("{} confirmed in block {height}", tx.get_id()),
            Some((tx, None)) => println!("{} pending", tx.get_id()),
            None => println!("Transaction {id} not found"),
        },
        Command::Mine { address } => {
            let block = context.mine(&address)?;
            println!(
                "Mined block {} with {} transactions: {}",
                block.get_index(),
                block.get_transactions().len(),
                block.get_hash()
            );
        }
        Command::Status => {
            let status = context.status();
            println!("Blocks:      {}", status.block_count);
            println!("Tip:         {}", status.tip_hash);
            println!("Difficulty:  {}", status.difficulty);
            println!("Pending:     {}", status.pending);
            println!("Validators:  {}", status.validators);
            println!("Total stake: {}", status.total_staked);
        }
        Command::Balance { address } => {
            println!("Balance of {address}: {}", context.balance(&address));
        }
        Command::Printchain => {
            for block in context.ledger().blocks() {
                println!("Block {} mined by {}", block.get_index(), block.get_miner());
                println!("Prev hash: {}", block.get_prev_hash());
                println!("Hash:      {}", block.get_hash());
                println!("Timestamp: {}", block.get_timestamp());
                println!("Nonce:     {} (difficulty {})", block.get_nonce(), block.get_difficulty());
                for tx in block.get_transactions() {
                    println!(
                        "- {} {} {} -> {} amount {} fee {}",
                        tx.get_id(),
                        tx.get_type(),
                        short_address(tx.get_sender()),
                        short_address(tx.get_receiver()),
                        tx.get_amount(),
                        tx.get_fee()
                    );
                }
                println!();
            }
        }
        Command::Validate => {
            let verdict = context.validate_chain()?;
            match verdict.reason() {
                None => println!("Chain is valid"),
                Some(reason) => {
                    return Err(BlockchainError::Validation(reason.to_string()));
                }
            }
        }
        Command::Economy => {
            let economics = context.economics();
            println!("Height:         {}", economics.get_height());
            println!("Total supply:   {}", economics.get_total_supply());
            println!("Circulating:    {}", economics.get_circulating());
            println!("Burned:         {}", economics.get_burned());
            println!("Block reward:   {}", economics.get_current_block_reward());
            println!("Next halving:   {}", economics.get_next_halving_height());
        }
        Command::Fees => {
            let stats = context.fee_statistics();
            println!("Transactions with fees: {}", stats.transactions_with_fees);
            println!("Total fees:             {}", stats.total_fees);
            println!("Paid to miners:         {}", stats.miner_share);
            println!("Burned:                 {}", stats.burned);
        }
        Command::Rewards => {
            let stats = context.reward_statistics();
            println!("Reward transactions: {}", stats.reward_transactions);
            println!("Total rewards:       {}", stats.total_rewards);
            println!("Current reward:      {}", stats.current_block_reward);
            println!("Next halving:        {}", stats.next_halving_height);
        }
        Command::Validators => {
            for validator in context.validators() {
                println!(
                    "{} staked {} power {} {}",
                    validator.address,
                    validator.staked,
                    validator.voting_power,
                    if validator.active { "active" } else { "inactive" }
                );
            }
            match context.select_proposer() {
                Some(proposer) => println!("Next proposer: {proposer}"),
                None => println!("No active validators"),
            }
        }
        Command::StakeReward { address } => match context.issue_staking_reward(&address)? {
            Some(tx) => println!("Queued staking reward {} of {}", tx.get_id(), tx.get_amount()),
            None => println!("Stake of {address} earns no reward yet"),
        },
        Command::StartNode { miner, peers } => {
            let miner = miner.or_else(|| config.get_mining_addr().map(String::from));
            if let Some(address) = &miner {
                check_address(address)?;
            }
            return start_node(context, store, miner, &peers);
        }
    }

    context.save(&store)
}

fn start_node(
    context: ChainContext,
    store: SnapshotStore,
    miner: Option<String>,
    peers: &[String],
) -> Result<()> {
    let node = Arc::new(Node::new(context.config().get_node_addr(), context.clone()));
    node.bootstrap(peers);

    let _mining = match miner {
        Some(address) => {
            info!("Mining is on. Address to receive rewards: {address}");
            let broadcaster = Arc::clone(&node);
            Some(context.start_mining_with(&address, move |block| {
                if let Err(e) = broadcaster.broadcast_block(block) {
                    warn!("Could not announce block {}: {e}", block.get_index());
                }
            }))
        }
        None => None,
    };

    let saver = context.clone();
    let saver_store = store.clone();
    thread::spawn(move || loop {
        thread::sleep(SAVE_INTERVAL);
        if let Err(e) = saver.save(&saver_store) {
            error!("Failed to save node state: {e}");
        }
    });

    let result = node.run();
    context.save(&store)?;
    result
}
