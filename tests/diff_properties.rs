use keyscribe::diff::{
    compute_script, original_len, original_text, remap_offset, target_text, tokenize, total_work,
    trim,
};
use proptest::prelude::*;

fn prose() -> impl Strategy<Value = String> {
    "[abc .\n\t]{0,32}"
}

/// Long enough that whitespace and frequent words drop out of the index.
fn long_prose() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            Just("the".to_string()),
            Just("a".to_string()),
            Just("word".to_string()),
            "[a-z]{1,6}",
        ],
        120..260,
    )
    .prop_map(|words| words.join(" "))
}

proptest! {
    #[test]
    fn tokenize_is_lossless(text in "\\PC{0,48}") {
        prop_assert_eq!(tokenize(&text).concat(), text);
    }

    #[test]
    fn script_rebuilds_both_texts(original in prose(), replacement in prose()) {
        let script = compute_script(&original, &replacement);
        prop_assert_eq!(original_text(&script), original);
        prop_assert_eq!(target_text(&script), replacement);
    }

    #[test]
    fn long_scripts_rebuild_both_texts(
        original in long_prose(),
        edits in proptest::collection::vec((0usize..2000, "[a-z]{1,6}"), 0..12),
    ) {
        let mut words: Vec<String> = original.split(' ').map(str::to_string).collect();
        for (at, word) in edits {
            let at = at % words.len();
            words[at] = word;
        }
        let replacement = words.join(" ");

        let script = compute_script(&original, &replacement);
        prop_assert_eq!(original_text(&script), original);
        prop_assert_eq!(target_text(&script), replacement);
    }

    #[test]
    fn trim_at_zero_keeps_everything(original in prose(), replacement in prose()) {
        let script = compute_script(&original, &replacement);
        let (rest, skipped) = trim(&script, 0);
        prop_assert_eq!(rest, script);
        prop_assert_eq!(skipped, 0);
    }

    #[test]
    fn trim_at_end_consumes_everything(original in prose(), replacement in prose()) {
        prop_assume!(!original.is_empty());
        let script = compute_script(&original, &replacement);
        let (rest, skipped) = trim(&script, original_len(&script));
        prop_assert!(rest.is_empty());
        prop_assert_eq!(skipped, total_work(&script));
    }

    #[test]
    fn trim_keeps_the_original_suffix(
        original in prose(),
        replacement in prose(),
        at in 0usize..40,
    ) {
        let script = compute_script(&original, &replacement);
        let at = at.min(original.chars().count());
        let (rest, skipped) = trim(&script, at);
        let suffix: String = original.chars().skip(at).collect();
        prop_assert_eq!(original_text(&rest), suffix);
        prop_assert!(skipped <= total_work(&script));
    }

    #[test]
    fn remap_maps_endpoints(original in prose(), replacement in prose()) {
        prop_assume!(!original.is_empty());
        prop_assert_eq!(remap_offset(&original, &replacement, 0), 0);
        prop_assert_eq!(
            remap_offset(&original, &replacement, original.chars().count()),
            replacement.chars().count()
        );
    }
}
