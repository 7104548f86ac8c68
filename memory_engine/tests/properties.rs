//! Property-based tests for the memory engine.
//!
//! These tests verify invariants that must hold for all inputs:
//! - Blank queries never return knowledge
//! - Status values stay bounded over any conversation
//! - Repeating a message is served from the cache without searching
//! - Prompt tiers are always ordered, with the user message last
//!
//! Run with: cargo test -p memory_engine --test properties

use proptest::prelude::*;

use character_sim::{parse, CharacterId, CoreMemory, SessionId, UserId};
use memory_engine::{
    estimate_tokens, CacheOutcome, ChatMessage, KnowledgeIndex, KnowledgeItem, KnowledgeLibrary,
    MemoryUpdateEngine, PromptAssembler, PromptRequest, PromptSettings, SessionKnowledgeCache,
    Tier,
};

const TOPICS: [&str; 6] = ["변수", "함수", "반복문", "조건문", "배열", "클래스"];

fn library() -> (KnowledgeLibrary, CharacterId) {
    let character = CharacterId::new("tutor");
    let mut library = KnowledgeLibrary::new();
    library.insert_items(
        character.clone(),
        TOPICS
            .iter()
            .map(|topic| KnowledgeItem::new(*topic, format!("{topic} 설명")).with_keyword(*topic)),
    );
    (library, character)
}

mod search_tests {
    use super::*;

    proptest! {
        /// Invariant: whitespace-only queries return nothing and do not count as searches
        #[test]
        fn blank_query_is_empty(query in "[ \\t\\n\\r]*", max in 0usize..10) {
            let (library, character) = library();
            let index = library.get(&character).unwrap();
            prop_assert!(index.search(&query, max).is_empty());
            prop_assert_eq!(index.search_count(), 0);
        }

        /// Invariant: results are bounded, positive and sorted by score
        #[test]
        fn results_sorted_and_bounded(query in "\\PC{0,40}", max in 0usize..5) {
            let (library, character) = library();
            let index = library.get(&character).unwrap();
            let results = index.scored_search(&query, max);

            prop_assert!(results.len() <= max);
            prop_assert!(results.iter().all(|r| r.score > 0));
            prop_assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        }

        /// Invariant: search never panics on arbitrary text
        #[test]
        fn search_never_panics(query in "\\PC*") {
            let index = KnowledgeIndex::from_items([KnowledgeItem::new("3·1 운동", "만세")
                .with_keyword("3·1 운동")]);
            let _ = index.search(&query, 3);
            let _ = index.extract_topics(&query);
        }
    }
}

mod cache_tests {
    use super::*;

    proptest! {
        /// Invariant: the same message twice in a row is a hit without a new search
        #[test]
        fn repeated_message_hits(picks in prop::collection::vec(0usize..6, 1..4), filler in "[a-z ]{0,20}") {
            let (library, character) = library();
            let index = library.get(&character).unwrap();
            let mut cache = SessionKnowledgeCache::with_defaults(library);
            let session = SessionId::new("s");

            let message = picks
                .iter()
                .map(|&i| TOPICS[i])
                .collect::<Vec<_>>()
                .join(" ")
                + " "
                + &filler;

            cache.resolve(&session, &message, &character);
            let searches = index.search_count();
            let again = cache.resolve(&session, &message, &character);

            prop_assert_eq!(again.outcome, CacheOutcome::Hit);
            prop_assert!(again.overlap > 0.7);
            prop_assert_eq!(index.search_count(), searches);
        }

        /// Invariant: after seeding, any message naming only seeded topics hits without a search
        #[test]
        fn seeded_subset_hits(
            seeded in prop::collection::btree_set(0usize..6, 1..6),
            pick in prop::collection::vec(any::<bool>(), 6),
        ) {
            let (library, character) = library();
            let index = library.get(&character).unwrap();
            let mut cache = SessionKnowledgeCache::with_defaults(library);
            let session = SessionId::new("s");

            let greeting = format!(
                "오늘은 {} 배워요",
                seeded.iter().map(|&i| TOPICS[i]).collect::<Vec<_>>().join(" ")
            );
            prop_assert_eq!(cache.seed(&session, &greeting, &character), seeded.len());

            let mut mentioned: Vec<usize> = seeded.iter().copied().filter(|&i| pick[i]).collect();
            if mentioned.is_empty() {
                mentioned.push(*seeded.iter().next().unwrap());
            }
            let message = mentioned.iter().map(|&i| TOPICS[i]).collect::<Vec<_>>().join(" ") + " 질문";

            let searches = index.search_count();
            let resolution = cache.resolve(&session, &message, &character);

            prop_assert_eq!(resolution.outcome, CacheOutcome::Hit);
            prop_assert_eq!(resolution.overlap, 1.0);
            prop_assert_eq!(resolution.items.len(), mentioned.len());
            prop_assert_eq!(index.search_count(), searches);
        }

        /// Invariant: partial and miss results never repeat an item
        #[test]
        fn resolved_items_are_distinct(messages in prop::collection::vec(prop::collection::vec(0usize..6, 0..3), 1..8)) {
            let (library, character) = library();
            let mut cache = SessionKnowledgeCache::with_defaults(library);
            let session = SessionId::new("s");

            for picks in messages {
                let message = picks.iter().map(|&i| TOPICS[i]).collect::<Vec<_>>().join(" ");
                let resolution = cache.resolve(&session, &message, &character);
                let mut ids: Vec<_> = resolution.items.iter().map(|i| i.id).collect();
                let count = ids.len();
                ids.sort_by_key(|id| id.0);
                ids.dedup();
                prop_assert_eq!(ids.len(), count);
            }
        }
    }
}

mod memory_tests {
    use super::*;

    const CONFIG: &str = "\
# Status Values
affection: 0-100, default=95
trust: -10-10, default=0

# Milestones
best_friend: \"Best friends\" when affection>=100 -> trust+15

# Event Triggers
compliment -> affection+10
insult -> affection-30, trust-5
apology -> trust+3
";

    proptest! {
        /// Invariant: no sequence of turns moves a status out of its range
        #[test]
        fn statuses_stay_bounded(turns in prop::collection::vec(prop::sample::select(vec![
            "what a compliment", "that was an insult", "my apology", "hello", "compliment and apology",
        ]), 0..30)) {
            let config = parse(CONFIG).config;
            let mut memory = CoreMemory::from_config(UserId::new("u"), "c".into(), &config, chrono::Utc::now());
            let engine = MemoryUpdateEngine::new();

            let mut achieved = 0;
            for (count, turn) in turns.iter().enumerate() {
                let outcome = engine.apply_turn(&mut memory, &config, turn, "ok");
                achieved += outcome.achieved.len();
                prop_assert!(memory.within_bounds());
                prop_assert_eq!(memory.conversation_count, count as u64 + 1);
            }
            prop_assert!(achieved <= 1);
        }
    }
}

mod prompt_tests {
    use super::*;

    proptest! {
        /// Invariant: tiers are ordered and the current message is always last
        #[test]
        fn tiers_ordered(
            identity in "\\PC{0,200}",
            input in "\\PC{0,200}",
            history in prop::collection::vec("\\PC{0,80}", 0..25),
            knowledge in prop::collection::vec(("\\PC{0,20}", "\\PC{0,80}"), 0..4),
            budget in prop::option::of(1usize..400),
        ) {
            let history: Vec<ChatMessage> = history
                .into_iter()
                .enumerate()
                .map(|(i, text)| if i % 2 == 0 { ChatMessage::user(text) } else { ChatMessage::assistant(text) })
                .collect();
            let knowledge: Vec<KnowledgeItem> = knowledge
                .into_iter()
                .map(|(title, content)| KnowledgeItem::new(title, content))
                .collect();

            let assembler = PromptAssembler::new(PromptSettings {
                token_budget: budget,
                ..Default::default()
            });
            let prompt = assembler.build(
                &PromptRequest::new(&input)
                    .with_character_prompt(&identity)
                    .with_knowledge(&knowledge)
                    .with_history(&history),
            );

            let tiers: Vec<Tier> = prompt.sections().iter().map(|s| s.tier).collect();
            prop_assert!(tiers.windows(2).all(|w| w[0] <= w[1]));
            prop_assert_eq!(tiers.last(), Some(&Tier::Current));
            prop_assert_eq!(tiers.iter().filter(|t| **t == Tier::History).count(), 1);
            prop_assert_eq!(prompt.estimated_tokens, estimate_tokens(&prompt.to_prompt_string()));
            prop_assert!(prompt.dropped_history <= history.len());
            if let Some(budget) = budget {
                prop_assert!(prompt.estimated_tokens <= budget || prompt.dropped_history == history.len().min(15));
            }
        }
    }
}
