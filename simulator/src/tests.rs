use super::*;
use betchain_types::{execution::Key, COIN};
use commonware_cryptography::{ed25519::PrivateKey, PrivateKeyExt, Signer};
use commonware_runtime::{deterministic::Runner, Runner as _};
use tracing::Level;

pub(crate) fn config(initial_subsidy: u64, wallets: u64) -> ValidatedConfig {
    ValidatedConfig {
        port: 0,
        log_level: Level::INFO,
        initial_subsidy,
        halving_interval: 150,
        miner: PrivateKey::from_seed(0).public_key(),
        wallets: (1..=wallets)
            .map(|seed| Wallet::from_seed(format!("user{seed}"), seed, 100 * COIN))
            .collect(),
        queue_max_backlog: 64,
        queue_max_transactions: 1_000,
        generate_max_blocks: 100,
    }
}

#[test]
fn test_bet_lifecycle() {
    let executor = Runner::default();
    executor.start(|context| async move {
        let simulator = Simulator::new(context, &config(50 * COIN, 1)).await;
        let mut updates = simulator.subscribe();

        let placed = simulator
            .make_bet("user1", "red@1+black@1", None)
            .await
            .unwrap();
        assert_eq!(placed.stake, 2 * COIN);
        assert_eq!(placed.nonce, 0);

        // Queued stakes come out of the available balance right away
        let view = simulator.balance("user1").await.unwrap();
        assert_eq!(view.confirmed, 100 * COIN);
        assert_eq!(view.queued, 2 * COIN);
        assert_eq!(view.available, 98 * COIN);
        assert_eq!(simulator.queued().await.len(), 1);

        let blocks = simulator.generate(1).await.unwrap();
        assert_eq!(blocks[0].height, 1);
        assert_eq!(blocks[0].placements.len(), 1);
        assert_eq!(blocks[0].placements[0].id, placed.id);
        assert_eq!(blocks[0].placements[0].bet, "red@1+black@1");
        assert!(blocks[0].settlements.is_empty());
        assert_eq!(updates.recv().await.unwrap(), blocks[0]);
        assert!(simulator.queued().await.is_empty());

        let ledger = simulator.pending().await;
        assert_eq!(ledger.pending, 1);
        assert_eq!(ledger.total_potential_liability, 2 * COIN);
        assert_eq!(ledger.bets[0].id, placed.id);
        assert_eq!(ledger.bets[0].due, 2);

        let view = simulator.balance("user1").await.unwrap();
        assert_eq!(view.confirmed, 98 * COIN);
        assert_eq!(view.nonce, 1);

        // Settled in the following block
        let blocks = simulator.generate(1).await.unwrap();
        assert_eq!(blocks[0].settlements.len(), 1);
        assert_eq!(blocks[0].settlements[0].bet, placed.id);
        assert_eq!(blocks[0].settlements[0].payout, 2 * COIN);
        assert_eq!(blocks[0].draws.len(), 1);
        assert_eq!(blocks[0].draws[0].family, "roulette");
        assert_eq!(simulator.balance("user1").await.unwrap().confirmed, 100 * COIN);
        assert_eq!(simulator.pending().await.pending, 0);
        assert_eq!(
            simulator.balance("miner").await.unwrap().confirmed,
            100 * COIN
        );
        assert_eq!(simulator.block(2).await.unwrap(), blocks[0]);
    });
}

#[test]
fn test_submission_errors() {
    let executor = Runner::default();
    executor.start(|context| async move {
        let simulator = Simulator::new(context, &config(50 * COIN, 1)).await;
        assert!(matches!(
            simulator.make_bet("nobody", "red@1", None).await,
            Err(SimulatorError::UnknownAccount(_))
        ));
        assert!(matches!(
            simulator.make_bet("user1", "red@", None).await,
            Err(SimulatorError::Bet(BetError::MalformedBetSyntax(_)))
        ));
        assert!(matches!(
            simulator.make_bet("user1", "purple@1", None).await,
            Err(SimulatorError::Bet(BetError::UnknownSymbol(_)))
        ));
        assert!(matches!(
            simulator.make_bet("user1", "red@1+7@1", None).await,
            Err(SimulatorError::Bet(BetError::MixedGameFamilies { .. }))
        ));
        assert!(matches!(
            simulator.make_bet("user1", "red@101", None).await,
            Err(SimulatorError::InsufficientFunds {
                available,
                stake
            }) if available == 100 * COIN && stake == 101 * COIN
        ));

        // Queued stakes count against later submissions
        simulator.make_bet("user1", "red@60", None).await.unwrap();
        assert!(matches!(
            simulator.make_bet("user1", "black@60", None).await,
            Err(SimulatorError::InsufficientFunds { .. })
        ));
        assert!(simulator.cancel("zz").await.is_err());
        assert!(matches!(
            simulator.block(0).await,
            Err(SimulatorError::UnknownBlock(0))
        ));
        assert!(matches!(
            simulator.rollback(1).await,
            Err(SimulatorError::InvalidHeight { height: 1, tip: 0 })
        ));
    });
}

#[test]
fn test_stake_cap_split() {
    let executor = Runner::default();
    executor.start(|context| async move {
        let simulator = Simulator::new(context, &config(25 * COIN, 7)).await;
        let bets = [
            ("red@2+black@2", None),
            ("dozen_1@2+dozen_2@1+dozen_3@1", None),
            ("even@1+odd@3", None),
            ("even@3+odd@1", None),
            ("1@1+2@1+3@1+4@1", Some(4)),
            ("low@2+high@2", None),
            ("column_1@2+column_2@1+column_3@1", None),
        ];
        let mut ids = Vec::new();
        for (i, (bet, range)) in bets.iter().enumerate() {
            let account = format!("user{}", i + 1);
            ids.push(simulator.make_bet(&account, bet, *range).await.unwrap().id);
        }

        let blocks = simulator.generate(2).await.unwrap();
        let first: Vec<_> = blocks[0].placements.iter().map(|p| p.id.clone()).collect();
        assert_eq!(first, ids[..5].to_vec());
        assert_eq!(blocks[0].deferred, 2);
        let second: Vec<_> = blocks[1].placements.iter().map(|p| p.id.clone()).collect();
        assert_eq!(second, ids[5..].to_vec());
        assert_eq!(blocks[1].deferred, 0);
        assert!(simulator.queued().await.is_empty());
    });
}

#[test]
fn test_cancel_resigns_later_placements() {
    let executor = Runner::default();
    executor.start(|context| async move {
        let simulator = Simulator::new(context, &config(50 * COIN, 1)).await;
        let first = simulator.make_bet("user1", "red@1", None).await.unwrap();
        let second = simulator.make_bet("user1", "odd@2", None).await.unwrap();
        let third = simulator.make_bet("user1", "high@3", None).await.unwrap();
        assert_eq!(third.nonce, 2);

        let cancelled = simulator.cancel(&second.id).await.unwrap();
        assert_eq!(cancelled.resigned.len(), 1);
        assert_ne!(cancelled.resigned[0], third.id);
        assert!(matches!(
            simulator.cancel(&second.id).await,
            Err(SimulatorError::NotQueued(_))
        ));

        let queued = simulator.queued().await;
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].id, first.id);
        assert_eq!(queued[1].id, cancelled.resigned[0]);
        assert_eq!(queued[1].nonce, 1);
        assert_eq!(queued[1].bet, "high@3");
        assert_eq!(simulator.balance("user1").await.unwrap().queued, 4 * COIN);

        // Both remaining placements fit in one block
        let blocks = simulator.generate(1).await.unwrap();
        assert_eq!(blocks[0].placements.len(), 2);
        assert_eq!(simulator.balance("user1").await.unwrap().nonce, 2);
    });
}

#[test]
fn test_rollback_and_reapply() {
    let executor = Runner::default();
    executor.start(|context| async move {
        let simulator = Simulator::new(context, &config(50 * COIN, 2)).await;
        simulator.make_bet("user1", "dozen_3@5", None).await.unwrap();
        simulator.generate(1).await.unwrap();
        let ledger = simulator.pending().await;
        let balance = simulator.balance("user1").await.unwrap();

        let placed = simulator
            .make_bet("user2", "5@1+6@1", Some(10))
            .await
            .unwrap();
        let original = simulator.generate(1).await.unwrap().remove(0);
        assert_eq!(original.placements[0].id, placed.id);
        assert_ne!(simulator.pending().await, ledger);

        // Abandon block 2: the ledger and balances are exactly as before
        let view = simulator.rollback(1).await.unwrap();
        assert_eq!(
            view,
            RollbackView {
                height: 1,
                abandoned: 1,
                requeued: 1,
            }
        );
        assert_eq!(simulator.height().await, 1);
        assert_eq!(simulator.pending().await, ledger);
        assert_eq!(simulator.balance("user1").await.unwrap(), balance);
        assert_eq!(simulator.queued().await[0].id, placed.id);
        assert!(simulator.block(2).await.is_err());

        // Reapplying produces the same block
        let reapplied = simulator.generate(1).await.unwrap().remove(0);
        assert_eq!(reapplied, original);
    });
}

#[test]
fn test_replay_matches_live_state() {
    let executor = Runner::default();
    executor.start(|context| async move {
        let simulator = Simulator::new(context, &config(50 * COIN, 2)).await;
        simulator
            .make_bet("user1", "split_3@1+corner_7@2", None)
            .await
            .unwrap();
        simulator
            .make_bet("user2", "1@1+2@1", Some(2))
            .await
            .unwrap();
        simulator.generate(3).await.unwrap();
        simulator.make_bet("user2", "street_4@1", None).await.unwrap();
        simulator.generate(1).await.unwrap();

        let ledger = simulator.pending().await;
        let view = simulator.replay().await.unwrap();
        assert_eq!(view, ReplayView { height: 4, matches: true });
        assert_eq!(simulator.pending().await, ledger);

        // Undo data is rebuilt along with the state
        simulator.rollback(0).await.unwrap();
        assert_eq!(simulator.balance("user1").await.unwrap().confirmed, 100 * COIN);
        assert_eq!(simulator.balance("miner").await.unwrap().confirmed, 0);
    });
}

#[test]
fn test_ledger_corruption_halts_blocks() {
    let executor = Runner::default();
    executor.start(|context| async move {
        let simulator = Simulator::new(context, &config(50 * COIN, 1)).await;
        let placed = simulator
            .make_bet("user1", "red@1+black@1", None)
            .await
            .unwrap();
        simulator.generate(1).await.unwrap();

        // Lose the pending bet behind the ledger's back
        let id = parse_digest(&placed.id).unwrap();
        simulator
            .chain
            .lock()
            .await
            .state
            .delete(&Key::Bet(id))
            .await;

        assert!(matches!(
            simulator.generate(1).await,
            Err(SimulatorError::Halted(LedgerCorruption::MissingBet { bet, height: 2 })) if bet == id
        ));
        assert_eq!(simulator.height().await, 1);

        // Nothing is accepted until the state is rebuilt
        assert!(matches!(
            simulator.generate(1).await,
            Err(SimulatorError::Halted(_))
        ));
        assert!(matches!(
            simulator.make_bet("user1", "odd@1", None).await,
            Err(SimulatorError::Halted(_))
        ));
        assert!(simulator.queued().await.is_empty());

        let view = simulator.replay().await.unwrap();
        assert_eq!(view, ReplayView { height: 1, matches: false });
        assert_eq!(simulator.pending().await.pending, 1);

        let blocks = simulator.generate(1).await.unwrap();
        assert_eq!(blocks[0].settlements.len(), 1);
        assert_eq!(blocks[0].settlements[0].payout, 2 * COIN);
        assert_eq!(simulator.balance("user1").await.unwrap().confirmed, 100 * COIN);
        simulator.make_bet("user1", "odd@1", None).await.unwrap();
    });
}

#[test]
fn test_generate_limit() {
    let executor = Runner::default();
    executor.start(|context| async move {
        let simulator = Simulator::new(context, &config(50 * COIN, 0)).await;
        assert!(matches!(
            simulator.generate(101).await,
            Err(SimulatorError::TooManyBlocks {
                requested: 101,
                max: 100
            })
        ));
        assert_eq!(simulator.height().await, 0);
        assert_eq!(simulator.generate(100).await.unwrap().len(), 100);
    });
}

#[test]
fn test_subsidy_halving() {
    let executor = Runner::default();
    executor.start(|context| async move {
        let mut config = config(50 * COIN, 0);
        config.halving_interval = 2;
        let simulator = Simulator::new(context, &config).await;
        let subsidies: Vec<_> = simulator
            .generate(5)
            .await
            .unwrap()
            .iter()
            .map(|block| block.subsidy)
            .collect();
        assert_eq!(
            subsidies,
            vec![
                50 * COIN,
                25 * COIN,
                25 * COIN,
                25 * COIN / 2,
                25 * COIN / 2
            ]
        );
    });
}
