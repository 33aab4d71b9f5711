use super::super::*;
use crate::outcome::Outcomes;
use tracing::info;

impl<'a, S: State> Layer<'a, S> {
    /// Resolve every bet placed in the parent block.
    ///
    /// Each bet is removed from the ledger exactly once. Winners get one
    /// settlement crediting the summed payout of their winning selections;
    /// losers get none.
    pub(crate) async fn settle(
        &mut self,
    ) -> Result<(Vec<Settlement>, Vec<Event>), LedgerCorruption> {
        let Some(placed) = self.height.checked_sub(1) else {
            return Ok((Vec::new(), Vec::new()));
        };

        let mut outcomes = Outcomes::new(self.parent, self.height);
        let mut settlements = Vec::new();
        let mut resolved = Vec::new();
        for id in ledger::due_at(self, placed).await {
            let bet = ledger::remove(self, &id, self.height).await?;
            if bet.placement_height != placed {
                return Err(LedgerCorruption::MisindexedBet {
                    bet: id,
                    placement: bet.placement_height,
                    indexed: placed,
                });
            }

            let draw = outcomes.draw(bet.family(), bet.range());
            let payout = bet
                .request
                .payout(draw)
                .ok_or(LedgerCorruption::PayoutOverflow(id))?;
            if payout > 0 {
                self.credit(&bet.owner, payout).await;
                settlements.push(Settlement {
                    bet: id,
                    owner: bet.owner.clone(),
                    payout,
                });
            }
            debug!(
                "settled bet {} at height {} (draw {}, payout {})",
                id, self.height, draw, payout
            );
            resolved.push(Event::BetSettled {
                bet: id,
                owner: bet.owner,
                payout,
            });
        }
        if !resolved.is_empty() {
            info!(
                "settled {} bets at height {} ({} winners)",
                resolved.len(),
                self.height,
                settlements.len()
            );
        }

        let mut events = outcomes.events();
        events.extend(resolved);
        Ok((settlements, events))
    }
}
