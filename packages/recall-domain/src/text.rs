use std::collections::HashSet;

/// Lowercases, drops punctuation and collapses whitespace.
pub fn normalize_question(text: &str) -> String {
	let mut normalized = String::with_capacity(text.len());

	for ch in text.chars() {
		if ch.is_alphanumeric() || ch == '_' {
			normalized.extend(ch.to_lowercase());
		} else if ch.is_whitespace() {
			normalized.push(' ');
		}
	}

	normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// |A ∩ B| / max(|A|, |B|) over the distinct words of two normalized texts.
pub fn word_overlap_ratio(lhs: &str, rhs: &str) -> f32 {
	let lhs_words: HashSet<&str> = lhs.split_whitespace().collect();
	let rhs_words: HashSet<&str> = rhs.split_whitespace().collect();
	let denominator = lhs_words.len().max(rhs_words.len());

	if denominator == 0 {
		return 0.0;
	}

	let shared = lhs_words.intersection(&rhs_words).count();

	shared as f32 / denominator as f32
}

/// True when `candidate` overlaps any earlier question by more than `threshold`.
pub fn is_duplicate_question<'a, I>(candidate: &str, earlier: I, threshold: f32) -> bool
where
	I: IntoIterator<Item = &'a str>,
{
	let normalized = normalize_question(candidate);

	earlier
		.into_iter()
		.any(|existing| word_overlap_ratio(&normalized, &normalize_question(existing)) > threshold)
}

/// Lowercase alphanumeric words strictly longer than `min_chars`.
pub fn words_longer_than(text: &str, min_chars: usize) -> Vec<String> {
	let lowered = text.to_lowercase();

	lowered
		.split(|ch: char| !ch.is_alphanumeric())
		.filter(|word| word.chars().count() > min_chars)
		.map(str::to_string)
		.collect()
}

/// Share of the question's words (longer than two characters) that appear inside some word of
/// `memory_text`, or contain one.
pub fn question_coverage(question: &str, memory_text: &str) -> f32 {
	let question_words = words_longer_than(question, 2);

	if question_words.is_empty() {
		return 0.0;
	}

	let memory_words = words_longer_than(memory_text, 2);
	let hits = question_words
		.iter()
		.filter(|word| {
			memory_words.iter().any(|memory_word| {
				memory_word.contains(word.as_str()) || word.contains(memory_word.as_str())
			})
		})
		.count();

	hits as f32 / question_words.len() as f32
}
