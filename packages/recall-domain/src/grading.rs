//! Strict answer grading: override rules applied to model verdicts, plus the local heuristic grader.

use std::{fmt, str::FromStr};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{family, text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
	Correct,
	Partial,
	Incorrect,
}
impl Verdict {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Correct => "CORRECT",
			Self::Partial => "PARTIAL",
			Self::Incorrect => "INCORRECT",
		}
	}
}

impl fmt::Display for Verdict {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Verdict {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_uppercase().as_str() {
			"CORRECT" => Ok(Self::Correct),
			"PARTIAL" => Ok(Self::Partial),
			"INCORRECT" => Ok(Self::Incorrect),
			other => Err(format!("Unknown verdict {other:?}.")),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grade {
	pub verdict: Verdict,
	pub reasoning: String,
}
impl Grade {
	pub fn new(verdict: Verdict, reasoning: impl Into<String>) -> Self {
		Self { verdict, reasoning: reasoning.into() }
	}
}

/// Blank answers and the literal "nothing" never earn credit.
pub fn is_empty_answer(answer: &str) -> bool {
	let trimmed = answer.trim();

	trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nothing")
}

/// Capitalised word tokens, used as a proper-noun heuristic.
pub fn capitalized_names(text: &str) -> Vec<String> {
	let Ok(re) = Regex::new(r"\b[A-Z][a-z]+\b") else { return Vec::new() };

	re.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// Both sides name someone and no pair matches by case-insensitive equality or containment.
pub fn name_mismatch(context: &str, answer: &str) -> Option<(Vec<String>, Vec<String>)> {
	let context_names = capitalized_names(context);
	let answer_names = capitalized_names(answer);

	if context_names.is_empty() || answer_names.is_empty() {
		return None;
	}

	let matched = context_names.iter().any(|context_name| {
		let context_name = context_name.to_lowercase();

		answer_names.iter().any(|answer_name| {
			let answer_name = answer_name.to_lowercase();

			context_name.contains(&answer_name) || answer_name.contains(&context_name)
		})
	});

	if matched { None } else { Some((answer_names, context_names)) }
}

/// Applies the empty-answer, family and name rules to a model verdict. Never upgrades.
pub fn apply_overrides(grade: Grade, context: &str, answer: &str) -> Grade {
	if is_empty_answer(answer) {
		if grade.verdict == Verdict::Incorrect {
			return grade;
		}

		return Grade::new(Verdict::Incorrect, "Empty or missing answer.");
	}
	if grade.verdict != Verdict::Correct {
		return grade;
	}
	if let Some(mismatch) = family::relation_mismatch(context, answer) {
		return Grade::new(
			Verdict::Incorrect,
			format!(
				"Wrong family relationship: \"{}\" is not the same as \"{}\".",
				mismatch.answer_term, mismatch.context_term
			),
		);
	}
	if let Some((answer_names, context_names)) = name_mismatch(context, answer) {
		return Grade::new(
			Verdict::Incorrect,
			format!(
				"Name mismatch: \"{}\" does not match \"{}\".",
				answer_names.join(","),
				context_names.join(",")
			),
		);
	}

	grade
}

/// Model-free grading by exact then containment word matches, with the family downgrade.
pub fn heuristic_grade(context: &str, answer: &str) -> Grade {
	if is_empty_answer(answer) {
		return Grade::new(Verdict::Incorrect, "No answer provided.");
	}

	let answer_words = text::words_longer_than(answer, 1);
	let context_words = text::words_longer_than(context, 1);
	let exact: Vec<&str> = answer_words
		.iter()
		.filter(|word| context_words.contains(word))
		.map(String::as_str)
		.collect();
	let close: Vec<&str> = answer_words
		.iter()
		.filter(|word| {
			context_words
				.iter()
				.any(|other| other.contains(word.as_str()) || word.contains(other.as_str()))
		})
		.map(String::as_str)
		.collect();
	let grade = if !exact.is_empty() {
		Grade::new(Verdict::Correct, format!("Exact matches found: {}.", exact.join(", ")))
	} else if !close.is_empty() {
		Grade::new(Verdict::Partial, format!("Close matches found: {}.", close.join(", ")))
	} else {
		Grade::new(Verdict::Incorrect, "No relevant matches found in the memory.")
	};

	match family::relation_mismatch(context, answer) {
		Some(mismatch) if grade.verdict != Verdict::Incorrect => Grade::new(
			Verdict::Incorrect,
			format!(
				"Wrong family relationship: \"{}\" is not \"{}\".",
				mismatch.answer_term, mismatch.context_term
			),
		),
		_ => grade,
	}
}

/// `correct + 0.5 * partial`.
pub fn final_score(correct: u32, partial: u32) -> f64 {
	f64::from(correct) + f64::from(partial) * 0.5
}

/// `round(100 * final_score / total)` computed on integers, halves rounding up. Zero when
/// `total` is zero.
pub fn percentage(correct: u32, partial: u32, total: u32) -> u32 {
	if total == 0 {
		return 0;
	}

	let numerator = 200 * u64::from(correct) + 100 * u64::from(partial) + u64::from(total);
	let percent = numerator / (2 * u64::from(total));

	percent.min(100) as u32
}

#[cfg(test)]
mod tests {
	use super::*;

	fn correct() -> Grade {
		Grade::new(Verdict::Correct, "model says so")
	}

	#[test]
	fn verdict_parses_case_insensitively() {
		assert_eq!("correct".parse::<Verdict>(), Ok(Verdict::Correct));
		assert_eq!(" Partial ".parse::<Verdict>(), Ok(Verdict::Partial));
		assert!("CORRECT/PARTIAL/INCORRECT".parse::<Verdict>().is_err());
	}

	#[test]
	fn empty_answers_are_always_incorrect() {
		for answer in ["", "   ", "Nothing"] {
			let grade = apply_overrides(correct(), "uncle Tom", answer);

			assert_eq!(grade.verdict, Verdict::Incorrect);
		}

		let partial = Grade::new(Verdict::Partial, "half");

		assert_eq!(apply_overrides(partial, "uncle Tom", "").verdict, Verdict::Incorrect);
	}

	#[test]
	fn family_override_downgrades_correct() {
		assert_eq!(apply_overrides(correct(), "uncle Tom", "dad").verdict, Verdict::Incorrect);
		assert_eq!(apply_overrides(correct(), "uncle Tom", "uncle").verdict, Verdict::Correct);
		assert_eq!(apply_overrides(correct(), "my dad", "father").verdict, Verdict::Correct);
	}

	#[test]
	fn overrides_are_idempotent() {
		let once = apply_overrides(correct(), "uncle Tom", "dad");
		let twice = apply_overrides(once.clone(), "uncle Tom", "dad");

		assert_eq!(once, twice);
	}

	#[test]
	fn overrides_never_upgrade() {
		let incorrect = Grade::new(Verdict::Incorrect, "model says no");

		assert_eq!(apply_overrides(incorrect.clone(), "went to Florida", "florida"), incorrect);
	}

	#[test]
	fn sentence_initial_words_count_as_names() {
		assert_eq!(capitalized_names("Ate pizza at noon"), vec!["Ate".to_string()]);
		assert_eq!(capitalized_names("Pizza"), vec!["Pizza".to_string()]);
		assert_eq!(apply_overrides(correct(), "Ate pizza at noon", "Pizza").verdict, Verdict::Incorrect);
		assert_eq!(apply_overrides(correct(), "Ate pizza at noon", "pizza").verdict, Verdict::Correct);
	}

	#[test]
	fn name_mismatch_downgrades_correct() {
		let grade = apply_overrides(correct(), "Dinner with Carlos", "Maria");

		assert_eq!(grade.verdict, Verdict::Incorrect);
		assert!(grade.reasoning.contains("Maria"));
		assert_eq!(apply_overrides(correct(), "Dinner with Carlos", "Carl").verdict, Verdict::Correct);
		assert_eq!(apply_overrides(correct(), "dinner with carlos", "Maria").verdict, Verdict::Correct);
	}

	#[test]
	fn heuristic_prefers_exact_matches() {
		assert_eq!(heuristic_grade("We went to Florida.", "florida").verdict, Verdict::Correct);
		assert_eq!(heuristic_grade("A corgi dog", "corgis").verdict, Verdict::Partial);
		assert_eq!(heuristic_grade("A corgi dog", "parrot").verdict, Verdict::Incorrect);
		assert_eq!(heuristic_grade("A corgi dog", "").verdict, Verdict::Incorrect);
	}

	#[test]
	fn heuristic_applies_family_downgrade() {
		let grade = heuristic_grade("Fishing with uncle Tom", "my dad Tom");

		assert_eq!(grade.verdict, Verdict::Incorrect);
		assert!(grade.reasoning.contains("dad"));
	}

	#[test]
	fn percentage_rounds_half_up() {
		assert_eq!(percentage(1, 1, 4), 38);
		assert_eq!(percentage(2, 1, 3), 83);
		assert_eq!(percentage(0, 1, 200), 0);
		assert_eq!(percentage(0, 1, 100), 1);
		assert_eq!(percentage(3, 0, 3), 100);
		assert_eq!(percentage(0, 0, 0), 0);
	}

	#[test]
	fn percentage_matches_float_definition() {
		for total in 1..=12_u32 {
			for correct in 0..=total {
				for partial in 0..=(total - correct) {
					let expected =
						(100.0 * final_score(correct, partial) / f64::from(total)).round() as u32;

					assert_eq!(percentage(correct, partial, total), expected);
				}
			}
		}
	}

	#[test]
	fn final_score_counts_partials_as_half() {
		assert_eq!(final_score(2, 3), 3.5);
	}
}
