use rand::Rng;

use crate::keyboard::{is_word_break, qwerty_adjacent_char};
use crate::model::TypingOptions;

/// A decided typo: `wrong` is typed in place of `intended` at `position`,
/// and the correction retypes everything up to `word_end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypoPlan {
    pub position: usize,
    pub intended: char,
    pub wrong: char,
    pub word_end: usize,
}

impl TypoPlan {
    /// Backspaces needed once the rest of the word has been typed.
    pub fn backspaces(&self) -> usize {
        self.word_end - self.position
    }
}

#[derive(Debug, Clone)]
pub struct TypoInjector {
    probability: f64,
}

impl TypoInjector {
    pub fn new(options: &TypingOptions) -> Self {
        let probability = if options.is_bot() {
            0.0
        } else {
            (options.typo_rate_percent / 100.0).clamp(0.0, 1.0)
        };
        Self { probability }
    }

    pub fn is_enabled(&self) -> bool {
        self.probability > 0.0
    }

    /// Roll for a typo on `chars[position]`. Only letters are mistyped.
    pub fn plan(&self, chars: &[char], position: usize, rng: &mut impl Rng) -> Option<TypoPlan> {
        if !self.is_enabled() {
            return None;
        }
        let intended = *chars.get(position)?;
        if !intended.is_alphabetic() {
            return None;
        }
        if rng.gen::<f64>() >= self.probability {
            return None;
        }

        let word_end = chars[position..]
            .iter()
            .position(|&c| is_word_break(c))
            .map(|offset| position + offset)
            .unwrap_or(chars.len());

        Some(TypoPlan {
            position,
            intended,
            wrong: qwerty_adjacent_char(intended, rng),
            word_end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeMode;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn always() -> TypoInjector {
        TypoInjector::new(&TypingOptions {
            typo_rate_percent: 100.0,
            ..Default::default()
        })
    }

    #[test]
    fn plan_covers_rest_of_word() {
        let mut rng = StdRng::seed_from_u64(0);
        let text = chars("hello world");
        let plan = always().plan(&text, 1, &mut rng).unwrap();
        assert_eq!(plan.intended, 'e');
        assert_eq!(plan.word_end, 5);
        assert_eq!(plan.backspaces(), 4);
        assert!("wrsd".contains(plan.wrong));

        let plan = always().plan(&text, 6, &mut rng).unwrap();
        assert_eq!(plan.word_end, text.len());
    }

    #[test]
    fn never_mistypes_non_letters() {
        let mut rng = StdRng::seed_from_u64(0);
        let text = chars("a1 .");
        assert!(always().plan(&text, 1, &mut rng).is_none());
        assert!(always().plan(&text, 2, &mut rng).is_none());
        assert!(always().plan(&text, 3, &mut rng).is_none());
        assert!(always().plan(&text, 9, &mut rng).is_none());
    }

    #[test]
    fn disabled_for_zero_rate_and_bot_mode() {
        let mut rng = StdRng::seed_from_u64(0);
        let text = chars("abc");
        let zero = TypoInjector::new(&TypingOptions::default());
        assert!(zero.plan(&text, 0, &mut rng).is_none());

        let bot = TypoInjector::new(&TypingOptions {
            typo_rate_percent: 50.0,
            mode: TypeMode::Bot,
            ..Default::default()
        });
        assert!(!bot.is_enabled());
    }
}
