use crate::{Adb, Assembly, Layer, State};
use anyhow::Context;
use betchain_types::{
    execution::{Block, Instruction, Transaction},
    games::grammar,
};
use commonware_cryptography::{
    ed25519::{PrivateKey, PublicKey},
    sha256::Digest,
    PrivateKeyExt, Signer,
};
use commonware_runtime::{buffer::PoolRef, Clock, Metrics, Spawner, Storage};
use commonware_storage::{adb, translator::EightCap};
use commonware_utils::{NZUsize, NZU64};
use rand::{rngs::StdRng, SeedableRng};

const TEST_BUFFER_POOL_PAGES: usize = 1024;
const TEST_BUFFER_POOL_PAGE_SIZE: usize = 1024;
const TEST_MMR_ITEMS_PER_BLOB: u64 = 1024;
const TEST_MMR_WRITE_BUFFER: usize = 1024;
const TEST_LOG_ITEMS_PER_SECTION: u64 = 1024;
const TEST_LOG_WRITE_BUFFER: usize = 1024;
const TEST_LOCATIONS_ITEMS_PER_BLOB: u64 = 1024;

/// Creates an account keypair for Ed25519 signatures used by bettors
pub fn create_account_keypair(seed: u64) -> (PrivateKey, PublicKey) {
    let mut rng = StdRng::seed_from_u64(seed);
    let private = PrivateKey::from_rng(&mut rng);
    let public = private.public_key();
    (private, public)
}

/// Signs a placement for the given bet string
pub fn place_bet(private: &PrivateKey, nonce: u64, bet: &str, range: Option<u32>) -> Transaction {
    let request = grammar::parse(bet, range).expect("invalid bet in test");
    Transaction::sign(private, nonce, Instruction::PlaceBet(request))
}

/// Creates the state database for testing
pub async fn create_adb_result<E: Spawner + Metrics + Storage + Clock>(
    context: &E,
) -> anyhow::Result<Adb<E, EightCap>> {
    let buffer_pool = PoolRef::new(
        NZUsize!(TEST_BUFFER_POOL_PAGES),
        NZUsize!(TEST_BUFFER_POOL_PAGE_SIZE),
    );

    Adb::init(
        context.with_label("state"),
        adb::any::variable::Config {
            mmr_journal_partition: String::from("state-mmr-journal"),
            mmr_metadata_partition: String::from("state-mmr-metadata"),
            mmr_items_per_blob: NZU64!(TEST_MMR_ITEMS_PER_BLOB),
            mmr_write_buffer: NZUsize!(TEST_MMR_WRITE_BUFFER),
            log_journal_partition: String::from("state-log-journal"),
            log_items_per_section: NZU64!(TEST_LOG_ITEMS_PER_SECTION),
            log_write_buffer: NZUsize!(TEST_LOG_WRITE_BUFFER),
            log_compression: None,
            log_codec_config: (),
            locations_journal_partition: String::from("state-locations-journal"),
            locations_items_per_blob: NZU64!(TEST_LOCATIONS_ITEMS_PER_BLOB),
            translator: EightCap,
            thread_pool: None,
            buffer_pool,
        },
    )
    .await
    .context("failed to initialize state ADB")
}

pub async fn create_adb<E: Spawner + Metrics + Storage + Clock>(context: &E) -> Adb<E, EightCap> {
    create_adb_result(context)
        .await
        .expect("failed to initialize test database")
}

/// Assembles the next block on top of `state` without touching it
pub async fn build_block<S: State>(
    state: &S,
    parent: Digest,
    height: u64,
    miner: &PublicKey,
    subsidy: u64,
    queue: Vec<Transaction>,
) -> (Block, Assembly) {
    let mut layer = Layer::new(state, parent, height, miner.clone(), subsidy);
    let assembly = layer.assemble(queue).await.expect("ledger corrupted");
    let block = Block::new(
        parent,
        height,
        miner.clone(),
        subsidy,
        assembly.placements.clone(),
        assembly.settlements.clone(),
    );
    (block, assembly)
}
