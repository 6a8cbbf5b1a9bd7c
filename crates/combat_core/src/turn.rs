use std::collections::VecDeque;

use crate::combatant::CombatantId;
use crate::rng::SimulationRng;

/// Produces the Turn Order for a round from the combatants alive at round start.
/// Implementations must return a permutation of `living`.
pub trait TurnOrderSource: Send + Sync {
    fn order(&mut self, living: Vec<CombatantId>, rng: &mut SimulationRng) -> Vec<CombatantId>;
}

/// Uniform random permutation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShuffledOrder;

impl TurnOrderSource for ShuffledOrder {
    fn order(
        &mut self,
        mut living: Vec<CombatantId>,
        rng: &mut SimulationRng,
    ) -> Vec<CombatantId> {
        rng.shuffle(&mut living);
        living
    }
}

/// Preferred order used for replays and scripted fights. Listed combatants that are
/// still alive go first, in list order; anyone alive but unlisted follows in roster
/// order.
#[derive(Debug, Default, Clone)]
pub struct FixedOrder {
    preferred: Vec<CombatantId>,
}

impl FixedOrder {
    pub fn new(preferred: impl Into<Vec<CombatantId>>) -> Self {
        Self {
            preferred: preferred.into(),
        }
    }
}

impl TurnOrderSource for FixedOrder {
    fn order(&mut self, living: Vec<CombatantId>, _rng: &mut SimulationRng) -> Vec<CombatantId> {
        let mut ordered: Vec<CombatantId> = self
            .preferred
            .iter()
            .copied()
            .filter(|id| living.contains(id))
            .collect();
        ordered.dedup();
        for id in living {
            if !ordered.contains(&id) {
                ordered.push(id);
            }
        }
        ordered
    }
}

/// The round's Turn Order. The head is popped into `current` when the round is
/// built and stays unprocessed until execution reaches it.
#[derive(Debug, Clone, Default)]
pub struct TurnQueue {
    current: Option<CombatantId>,
    processed: bool,
    remaining: VecDeque<CombatantId>,
}

impl TurnQueue {
    pub fn new(order: Vec<CombatantId>) -> Self {
        let mut remaining: VecDeque<CombatantId> = order.into();
        let current = remaining.pop_front();
        Self {
            current,
            processed: false,
            remaining,
        }
    }

    /// The combatant whose slot is being executed, if any.
    pub fn current(&self) -> Option<CombatantId> {
        self.current
    }

    /// Hands out the next slot left to right. Returns `None` once the round is spent.
    pub fn next_actor(&mut self) -> Option<CombatantId> {
        if !self.processed && self.current.is_some() {
            self.processed = true;
            return self.current;
        }
        self.current = self.remaining.pop_front();
        self.processed = self.current.is_some();
        self.current
    }

    /// Slots not yet handed out, in execution order.
    pub fn upcoming(&self) -> Vec<CombatantId> {
        let head = if self.processed { None } else { self.current };
        head.into_iter()
            .chain(self.remaining.iter().copied())
            .collect()
    }

    pub fn is_exhausted(&self) -> bool {
        (self.processed || self.current.is_none()) && self.remaining.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> Vec<CombatantId> {
        raw.iter().copied().map(CombatantId).collect()
    }

    #[test]
    fn queue_hands_out_slots_in_order() {
        let mut queue = TurnQueue::new(ids(&[3, 1, 2]));
        assert_eq!(queue.current(), Some(CombatantId(3)));
        assert_eq!(queue.upcoming(), ids(&[3, 1, 2]));
        assert_eq!(queue.next_actor(), Some(CombatantId(3)));
        assert_eq!(queue.next_actor(), Some(CombatantId(1)));
        assert_eq!(queue.upcoming(), ids(&[2]));
        assert_eq!(queue.next_actor(), Some(CombatantId(2)));
        assert!(queue.is_exhausted());
        assert_eq!(queue.next_actor(), None);
    }

    #[test]
    fn fixed_order_is_a_permutation_of_living() {
        let mut rng = SimulationRng::default();
        let mut source = FixedOrder::new(ids(&[4, 2, 9]));
        let order = source.order(ids(&[1, 2, 3, 4]), &mut rng);
        assert_eq!(order, ids(&[4, 2, 1, 3]));
    }

    #[test]
    fn shuffled_order_is_a_permutation_of_living() {
        let mut rng = SimulationRng::new(11);
        let living = ids(&[1, 2, 3, 4, 5, 6]);
        let mut order = ShuffledOrder.order(living.clone(), &mut rng);
        order.sort();
        assert_eq!(order, living);
    }
}
