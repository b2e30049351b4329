use super::*;
use crate::deadlock::shuffle;

impl CollapseEngine {
    /// Shuffles the board when no move remains. Returns `None` when the
    /// board already had a move.
    pub(super) fn repair_deadlock(&mut self) -> Result<Option<ShuffleOutcome>, GridError> {
        if !is_deadlock(&self.board) {
            return Ok(None);
        }

        let before = self.board.clone();
        let outcome = shuffle(
            &mut self.board,
            &mut self.rng,
            self.config.max_shuffle_attempts,
        )?;
        self.recolor_events(&before);

        self.stats.shuffles += 1;
        self.stats.shuffle_attempts += u64::from(outcome.attempts());
        match outcome {
            ShuffleOutcome::Resolved { attempts } => {
                self.events.push(GridEvent::DeadlockResolved { attempts });
            }
            ShuffleOutcome::Exhausted { attempts } => {
                self.stats.exhausted_shuffles += 1;
                self.events.push(GridEvent::DeadlockExhausted { attempts });
            }
        }

        self.refresh_tiers();
        Ok(Some(outcome))
    }
}
