use proptest::prelude::*;

use skillview::lifecycle::{Classifier, ClassifierTable, classify};
use skillview::skill::{OnErrorPolicy, StepAction, StepDeclaration};

fn declaration_strategy() -> impl Strategy<Value = StepDeclaration> {
    let tool = prop_oneof![
        Just("memory_read".to_string()),
        Just("memory_write".to_string()),
        Just("semantic_search".to_string()),
        Just("github_create_issue".to_string()),
        "[a-z_]{1,16}",
    ];
    let policy = prop_oneof![
        Just(None),
        Just(Some(OnErrorPolicy::Retry)),
        Just(Some(OnErrorPolicy::Continue)),
        Just(Some(OnErrorPolicy::Abort)),
    ];
    (
        "[a-z-]{1,12}",
        tool,
        proptest::option::of("[a-z ]{0,24}"),
        proptest::option::of("[a-z.]{1,16}"),
        policy,
    )
        .prop_map(|(name, tool, description, key, policy)| {
            let mut step = StepDeclaration::new(name, StepAction::Tool { name: tool });
            if let Some(description) = description {
                step = step.with_description(description);
            }
            if let Some(key) = key {
                step = step.with_arg("key", key);
            }
            match policy {
                Some(policy) => step.with_on_error(policy),
                None => step,
            }
        })
}

proptest! {
    #[test]
    fn classify_is_pure(step in declaration_strategy()) {
        let first = classify(&step);
        let second = classify(&step.clone());
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first, Classifier::new(ClassifierTable::default()).classify(&step));
    }

    #[test]
    fn memory_tags_carry_exactly_one_key(step in declaration_strategy()) {
        let tags = classify(&step);
        prop_assert!(tags.memory_read.len() <= 1);
        prop_assert!(tags.memory_write.len() <= 1);
        prop_assert!(tags.memory_read.iter().chain(&tags.memory_write).all(|key| !key.is_empty()));
    }

    #[test]
    fn retry_and_continue_policies_allow_retry(step in declaration_strategy()) {
        let tags = classify(&step);
        if matches!(step.on_error, Some(OnErrorPolicy::Retry | OnErrorPolicy::Continue)) {
            prop_assert!(tags.can_retry);
        }
    }
}
