//! Family-relationship terms and their equivalence classes.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Relation {
	Uncle,
	Aunt,
	Father,
	Mother,
	Brother,
	Sister,
	Grandfather,
	Grandmother,
}

/// Every recognised term, in lookup order. Terms sharing a [`Relation`] are equivalent.
pub const FAMILY_TERMS: &[(&str, Relation)] = &[
	("uncle", Relation::Uncle),
	("aunt", Relation::Aunt),
	("father", Relation::Father),
	("dad", Relation::Father),
	("mother", Relation::Mother),
	("mom", Relation::Mother),
	("brother", Relation::Brother),
	("sister", Relation::Sister),
	("grandfather", Relation::Grandfather),
	("grandpa", Relation::Grandfather),
	("grandmother", Relation::Grandmother),
	("grandma", Relation::Grandmother),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationMismatch {
	pub answer_term: &'static str,
	pub context_term: &'static str,
}

/// Terms found in `text`, matched on whole words (a trailing plural `s` is accepted).
pub fn family_terms(text: &str) -> Vec<(&'static str, Relation)> {
	let lowered = text.to_lowercase();
	let words: BTreeSet<&str> = lowered.split(|ch: char| !ch.is_alphanumeric()).collect();

	FAMILY_TERMS
		.iter()
		.filter(|(term, _)| {
			words.iter().any(|word| {
				*word == *term || word.strip_suffix('s').map(|stem| stem == *term).unwrap_or(false)
			})
		})
		.copied()
		.collect()
}

pub fn contains_family_term(text: &str) -> bool {
	!family_terms(text).is_empty()
}

/// Reports a mismatch when both texts name relatives and none of the answer's relations appear
/// in the context.
pub fn relation_mismatch(context: &str, answer: &str) -> Option<RelationMismatch> {
	let context_terms = family_terms(context);
	let answer_terms = family_terms(answer);
	let (&(context_term, _), &(answer_term, _)) = (context_terms.first()?, answer_terms.first()?);
	let consistent = answer_terms
		.iter()
		.any(|(_, relation)| context_terms.iter().any(|(_, other)| other == relation));

	if consistent { None } else { Some(RelationMismatch { answer_term, context_term }) }
}
