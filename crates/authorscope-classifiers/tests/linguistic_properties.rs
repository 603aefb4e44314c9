//! Property tests for the linguistic feature extractor

use authorscope_classifiers::linguistic::{LinguisticFeatureExtractor, FEATURE_NAMES};
use proptest::prelude::*;

fn non_blank_text() -> impl Strategy<Value = String> {
    "\\PC{1,300}".prop_filter("text must not be blank", |s| !s.trim().is_empty())
}

fn prose() -> impl Strategy<Value = String> {
    proptest::collection::vec("[A-Za-z]{1,12}[,.!?]?", 1..40).prop_map(|words| words.join(" "))
}

proptest! {
    #[test]
    fn features_are_finite_and_non_negative(text in non_blank_text()) {
        let extractor = LinguisticFeatureExtractor::new().unwrap();
        let features = extractor.extract(&text);
        for (name, value) in features.iter() {
            prop_assert!(value.is_finite(), "{} = {}", name, value);
            prop_assert!(value >= 0.0, "{} = {}", name, value);
        }
    }

    #[test]
    fn ratios_stay_in_unit_interval(text in non_blank_text()) {
        let extractor = LinguisticFeatureExtractor::new().unwrap();
        let f = extractor.extract(&text);
        for ratio in [f.uppercase_ratio, f.vocabulary_diversity, f.max_bigram_freq, f.long_word_ratio] {
            prop_assert!((0.0..=1.0).contains(&ratio), "ratio {}", ratio);
        }
    }

    #[test]
    fn sentence_count_is_at_least_one(text in non_blank_text()) {
        let extractor = LinguisticFeatureExtractor::new().unwrap();
        let f = extractor.extract(&text);
        prop_assert!(f.sentence_count >= 1.0);
        prop_assert_eq!(f.avg_sentence_length, f.word_count / f.sentence_count);
    }

    #[test]
    fn counts_match_input(text in prose()) {
        let extractor = LinguisticFeatureExtractor::new().unwrap();
        let f = extractor.extract(&text);
        prop_assert_eq!(f.char_count, text.chars().count() as f64);
        prop_assert_eq!(f.word_count, text.split_whitespace().count() as f64);
        prop_assert_eq!(f.comma_count, text.matches(',').count() as f64);
        prop_assert_eq!(f.period_count, text.matches('.').count() as f64);
        // every word has at least one syllable
        prop_assert!(f.syllable_density >= 1.0);
    }

    #[test]
    fn extraction_is_deterministic(text in non_blank_text()) {
        let extractor = LinguisticFeatureExtractor::new().unwrap();
        let first = extractor.extract(&text);
        let second = LinguisticFeatureExtractor::new().unwrap().extract(&text);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn feature_names_are_fixed(text in prose()) {
        let extractor = LinguisticFeatureExtractor::new().unwrap();
        let names: Vec<&str> = extractor.extract(&text).iter().map(|(name, _)| name).collect();
        prop_assert_eq!(names, FEATURE_NAMES.to_vec());
    }
}
