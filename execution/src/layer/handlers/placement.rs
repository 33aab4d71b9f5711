use super::super::*;
use betchain_types::games::{Bet, BetStatus};

pub(crate) enum Placement {
    Accepted(Event),
    Rejected(Rejection),
}

impl<'a, S: State> Layer<'a, S> {
    /// Everything a placement must satisfy before it can be admitted.
    /// Returns the stake and potential payout on success.
    async fn check_placement(
        &self,
        controller: &AdmissionController,
        tx: &Transaction,
    ) -> Result<(u64, u64), Rejection> {
        if !tx.verify() {
            return Err(InvalidPlacement::Signature.into());
        }
        let request = tx.instruction.bet();
        request.validate().map_err(InvalidPlacement::from)?;
        let stake = request
            .total_stake()
            .ok_or(InvalidPlacement::PayoutOverflow)?;
        let max_payout = request
            .max_payout()
            .ok_or(InvalidPlacement::PayoutOverflow)?;

        let account = load_account(self, &tx.public).await;
        if tx.nonce < account.nonce {
            return Err(InvalidPlacement::StaleNonce {
                expected: account.nonce,
                got: tx.nonce,
            }
            .into());
        }
        if tx.nonce > account.nonce {
            return Err(AdmissionRejected::NonceAhead {
                expected: account.nonce,
                got: tx.nonce,
            }
            .into());
        }
        if account.balance < stake {
            return Err(AdmissionRejected::InsufficientBalance {
                balance: account.balance,
                stake,
            }
            .into());
        }
        controller.check(stake, max_payout)?;
        Ok((stake, max_payout))
    }

    /// Admit a placement into this block: debit the stake, bump the nonce and
    /// record the bet in the pending ledger.
    pub(crate) async fn place(
        &mut self,
        controller: &mut AdmissionController,
        tx: &Transaction,
    ) -> Result<Placement, LedgerCorruption> {
        let (stake, max_payout) = match self.check_placement(controller, tx).await {
            Ok(checked) => checked,
            Err(reason) => return Ok(Placement::Rejected(reason)),
        };
        if let Err(reason) = controller.admit(stake, max_payout) {
            return Ok(Placement::Rejected(reason.into()));
        }

        let mut account = load_account(self, &tx.public).await;
        account.nonce += 1;
        account.balance -= stake;
        self.insert(Key::Account(tx.public.clone()), Value::Account(account))
            .await;

        let request = tx.instruction.bet().clone();
        let bet = Bet {
            id: tx.digest(),
            owner: tx.public.clone(),
            total_stake: stake,
            max_payout,
            placement_height: self.height,
            status: BetStatus::Pending,
            request,
        };
        let event = Event::BetPlaced {
            bet: bet.id,
            owner: bet.owner.clone(),
            family: bet.family(),
            range: bet.range(),
            stake,
            max_payout,
        };
        debug!(
            "placed bet {} at height {} (stake {}, max payout {})",
            bet.id, self.height, stake, max_payout
        );
        ledger::insert(self, bet).await?;
        Ok(Placement::Accepted(event))
    }
}
