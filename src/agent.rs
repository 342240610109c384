//! Random baseline agent.

use crate::action::Action;
use crate::collector::types::MouseButton;
use crate::core::history::HistoryBuffer;
use crate::core::perception::Features;
use crate::core::session::Agent;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const KEYS: [&str; 6] = ["w", "a", "s", "d", "e", "space"];

const NOOP_PROBABILITY: f64 = 0.2;
const KEY_PROBABILITY: f64 = 0.5;
const MOVE_PROBABILITY: f64 = 0.5;
const CLICK_PROBABILITY: f64 = 0.3;

/// Pixels per relative mouse move.
const MOVE_STEP: i32 = 10;

/// Picks random key, mouse-move and click actions each tick and flags
/// ticks with detected visual change as salient.
pub struct RandomAgent {
    rng: StdRng,
    observed: u64,
}

impl RandomAgent {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng, observed: 0 }
    }

    pub fn observed(&self) -> u64 {
        self.observed
    }

    fn sample_actions(&mut self) -> Vec<Action> {
        if self.rng.gen_bool(NOOP_PROBABILITY) {
            return vec![Action::Noop];
        }

        let mut actions = Vec::new();
        if self.rng.gen_bool(KEY_PROBABILITY) {
            if let Some(key) = KEYS.choose(&mut self.rng) {
                actions.push(Action::Key {
                    key: key.to_string(),
                    press: true,
                });
                actions.push(Action::Key {
                    key: key.to_string(),
                    press: false,
                });
            }
        }
        if self.rng.gen_bool(MOVE_PROBABILITY) {
            let step = if self.rng.gen_bool(0.5) { MOVE_STEP } else { -MOVE_STEP };
            let (dx, dy) = if self.rng.gen_bool(0.5) { (step, 0) } else { (0, step) };
            actions.push(Action::MouseMove { dx, dy });
        }
        if self.rng.gen_bool(CLICK_PROBABILITY) {
            let button = if self.rng.gen_bool(0.5) {
                MouseButton::Left
            } else {
                MouseButton::Right
            };
            actions.push(Action::MouseClick { button });
        }
        actions
    }
}

impl Agent<Features> for RandomAgent {
    fn observe(&mut self, _features: &Features, _history: &HistoryBuffer<Features>) -> anyhow::Result<()> {
        self.observed += 1;
        Ok(())
    }

    fn is_salient(&self, features: &Features) -> bool {
        features.change_detected
    }

    fn act(&mut self, _features: &Features) -> anyhow::Result<Vec<Action>> {
        Ok(self.sample_actions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_agents_agree() {
        let mut a = RandomAgent::new(Some(7));
        let mut b = RandomAgent::new(Some(7));
        let f = Features::default();
        for _ in 0..20 {
            assert_eq!(a.act(&f).unwrap(), b.act(&f).unwrap());
        }
    }

    #[test]
    fn test_actions_stay_in_vocabulary() {
        let mut agent = RandomAgent::new(Some(42));
        let f = Features::default();
        for _ in 0..200 {
            for action in agent.act(&f).unwrap() {
                match action {
                    Action::Key { key, .. } => assert!(KEYS.contains(&key.as_str())),
                    Action::MouseMove { dx, dy } => {
                        assert_eq!(dx.abs() + dy.abs(), MOVE_STEP);
                    }
                    Action::MouseClick { button } => assert_ne!(button, MouseButton::Middle),
                    Action::Noop => {}
                }
            }
        }
    }

    #[test]
    fn test_salient_on_change() {
        let agent = RandomAgent::new(Some(1));
        let changed = Features {
            change_detected: true,
            ..Features::default()
        };
        assert!(agent.is_salient(&changed));
        assert!(!agent.is_salient(&Features::default()));
    }
}
