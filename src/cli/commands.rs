use crate::economy::MIN_TRANSACTION_FEE;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "chainlog", about = "Data ledger with proof-of-work, staking and a coin economy")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "createwallet", about = "Create a new wallet")]
    Createwallet,
    #[command(name = "listaddresses", about = "Print local wallet addresses")]
    ListAddresses,
    #[command(
        name = "genesis",
        about = "Credit the genesis allocation to each address"
    )]
    Genesis {
        #[arg(help = "Addresses to fund; every local wallet when omitted")]
        addresses: Vec<String>,
    },
    #[command(name = "data", about = "Record a data entry paid for by a wallet")]
    Data {
        #[arg(help = "Paying wallet address")]
        from: String,
        #[arg(help = "Payload to record")]
        data: String,
        #[arg(long, default_value_t = MIN_TRANSACTION_FEE, help = "Fee in coins (1-5)")]
        fee: u64,
        #[arg(long, help = "Mine a block immediately, rewarding the payer")]
        mine: bool,
    },
    #[command(name = "transfer", about = "Send coins between addresses")]
    Transfer {
        #[arg(help = "Source wallet address")]
        from: String,
        #[arg(help = "Destination address")]
        to: String,
        #[arg(help = "Amount to send")]
        amount: u64,
        #[arg(long, default_value_t = MIN_TRANSACTION_FEE, help = "Fee in coins (1-5)")]
        fee: u64,
        #[arg(long, help = "Mine a block immediately, rewarding the sender")]
        mine: bool,
    },
    #[command(name = "stake", about = "Lock coins as validator stake")]
    Stake {
        #[arg(help = "Staking wallet address")]
        from: String,
        #[arg(help = "Amount to stake")]
        amount: u64,
        #[arg(long, default_value_t = MIN_TRANSACTION_FEE, help = "Fee in coins (1-5)")]
        fee: u64,
        #[arg(long, help = "Mine a block immediately, rewarding the staker")]
        mine: bool,
    },
    #[command(name = "pending", about = "List transactions waiting to be mined")]
    Pending,
    #[command(name = "txstatus", about = "Look up a transaction by id or id prefix")]
    TxStatus {
        #[arg(help = "Transaction id or a unique prefix of it")]
        id: String,
    },
    #[command(name = "mine", about = "Mine the pending transactions into a block")]
    Mine {
        #[arg(help = "Address receiving the block reward and fee share")]
        address: String,
    },
    #[command(name = "status", about = "Show chain height, tip and pool size")]
    Status,
    #[command(name = "balance", about = "Get the balance of an address")]
    Balance {
        #[arg(help = "The account address")]
        address: String,
    },
    #[command(name = "printchain", about = "Print all blocks in the chain")]
    Printchain,
    #[command(name = "validate", about = "Check every block link, hash and timestamp")]
    Validate,
    #[command(name = "economy", about = "Show supply, burn and reward schedule")]
    Economy,
    #[command(name = "fees", about = "Show fee totals across the chain")]
    Fees,
    #[command(name = "rewards", about = "Show reward totals across the chain")]
    Rewards,
    #[command(name = "validators", about = "List validators and draw the next proposer")]
    Validators,
    #[command(name = "stakereward", about = "Queue a staking reward for a validator")]
    StakeReward {
        #[arg(help = "Validator address")]
        address: String,
    },
    #[command(name = "startnode", about = "Start a network node")]
    StartNode {
        #[arg(long, help = "Enable mining and send rewards to ADDRESS")]
        miner: Option<String>,
        #[arg(long = "peer", help = "Peer to bootstrap from, may repeat")]
        peers: Vec<String>,
    },
}
