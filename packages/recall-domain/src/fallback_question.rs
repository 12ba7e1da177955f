//! Keyword-driven questions used when the model gives nothing usable.

use regex::Regex;

use crate::family;

pub const GENERIC_QUESTION: &str = "What is the main thing you remember about this?";

/// A static keyword rule. `matches` receives the lowercased title and description.
pub struct FallbackRule {
	pub label: &'static str,
	pub text: &'static str,
	pub matches: fn(&str) -> bool,
}

pub const FALLBACK_RULES: &[FallbackRule] = &[
	FallbackRule { label: "pet_name", text: "What is your pet's name?", matches: mentions_pet_name },
	FallbackRule { label: "pet_breed", text: "What breed is your pet?", matches: mentions_pet_breed },
	FallbackRule { label: "purchase", text: "What did you buy?", matches: mentions_purchase },
	FallbackRule { label: "location", text: "Where did you go?", matches: mentions_location },
	FallbackRule { label: "family", text: "Who is in this memory?", matches: family::contains_family_term },
	FallbackRule { label: "food", text: "What did you eat?", matches: mentions_food },
	FallbackRule {
		label: "activity",
		text: "What activity did you start or stop?",
		matches: mentions_activity_change,
	},
	FallbackRule {
		label: "number",
		text: "What number is mentioned in this memory?",
		matches: mentions_number,
	},
];

/// Every matching rule's text in table order, always ending with [`GENERIC_QUESTION`].
pub fn fallback_candidates(title: &str, description: &str) -> Vec<&'static str> {
	let combined = format!("{title} {description}").to_lowercase();
	let mut candidates: Vec<&'static str> =
		FALLBACK_RULES.iter().filter(|rule| (rule.matches)(&combined)).map(|rule| rule.text).collect();

	candidates.push(GENERIC_QUESTION);

	candidates
}

fn has_any_word(text: &str, keywords: &[&str]) -> bool {
	text.split(|ch: char| !ch.is_alphanumeric()).any(|word| keywords.contains(&word))
}

fn matches_pattern(pattern: &str, text: &str) -> bool {
	Regex::new(pattern).map(|re| re.is_match(text)).unwrap_or(false)
}

fn mentions_pet(text: &str) -> bool {
	has_any_word(text, &["dog", "dogs", "cat", "cats", "pet", "pets", "puppy", "kitten"])
}

fn mentions_pet_name(text: &str) -> bool {
	mentions_pet(text) && matches_pattern(r"\bname is \w+", text)
}

fn mentions_pet_breed(text: &str) -> bool {
	mentions_pet(text) && has_any_word(text, &["breed", "corgi", "labrador"])
}

fn mentions_purchase(text: &str) -> bool {
	has_any_word(text, &["bought", "purchased"])
}

fn mentions_location(text: &str) -> bool {
	matches_pattern(r"\b(?:went to|visited|in) [^,.]+", text)
}

fn mentions_food(text: &str) -> bool {
	has_any_word(text, &["eat", "ate", "food", "breakfast", "lunch", "dinner"])
}

fn mentions_activity_change(text: &str) -> bool {
	has_any_word(text, &["started", "quit"])
}

fn mentions_number(text: &str) -> bool {
	text.chars().any(|ch| ch.is_ascii_digit())
}
