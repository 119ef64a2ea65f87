use std::time::Duration;

use keyscribe::model::{TypeMode, TypingOptions};
use keyscribe::timing::TimingModel;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn typed_char() -> impl Strategy<Value = char> {
    prop_oneof![
        proptest::char::range('a', 'z'),
        proptest::char::range('A', 'Z'),
        proptest::char::range('0', '9'),
        proptest::sample::select(vec![' ', '.', ',', '!', '?', '\n', '\t', '@', '{', '~']),
    ]
}

proptest! {
    #[test]
    fn human_delay_stays_within_tempo_bounds(
        speed in 1u32..400,
        variability in 0.0f64..=1.0,
        seed in any::<u64>(),
        keys in proptest::collection::vec((typed_char(), 0usize..20), 1..80),
    ) {
        let options = TypingOptions { speed, variability, ..Default::default() };
        let mut model = TimingModel::new(&options);
        let mut rng = StdRng::seed_from_u64(seed);
        let base = model.base_delay();
        let low = 0.5 * base * (1.0 - variability) - 1e-6;
        let high = 1.5 * base * (1.0 + variability) + 1e-6;

        for (c, word_len) in keys {
            let delay = model.char_delay(Some(c), word_len, &mut rng).as_secs_f64();
            prop_assert!(delay >= low && delay <= high, "delay {delay} outside [{low}, {high}]");
            prop_assert!((0.5..=1.5).contains(&model.tempo()));
        }
    }

    #[test]
    fn bot_delay_is_always_zero(
        speed in 1u32..1000,
        variability in 0.0f64..=1.0,
        seed in any::<u64>(),
        c in typed_char(),
        word_len in 0usize..30,
    ) {
        let options = TypingOptions { speed, variability, mode: TypeMode::Bot, ..Default::default() };
        let mut model = TimingModel::new(&options);
        let mut rng = StdRng::seed_from_u64(seed);
        prop_assert_eq!(model.char_delay(Some(c), word_len, &mut rng), Duration::ZERO);
        prop_assert!(model.thinking_pause(c, &mut rng).is_none());
        prop_assert!(model.word_pause(&mut rng).is_none());
    }
}

#[test]
fn base_delay_follows_five_chars_per_word() {
    let model = TimingModel::new(&TypingOptions {
        speed: 60,
        ..Default::default()
    });
    assert!((model.base_delay() - 0.2).abs() < 1e-12);
}
