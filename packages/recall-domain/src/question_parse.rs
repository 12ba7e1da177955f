//! Turns free-form model output into question text.
//!
//! Single-question responses go through [`QUESTION_STRATEGIES`] in order; the first strategy that
//! yields text wins and the result is passed through [`clean_question`]. Batch responses are read
//! by [`parse_numbered_questions`].

use regex::Regex;

/// A pure parser from raw model output to candidate question text.
pub type QuestionStrategy = fn(&str) -> Option<String>;

pub const QUESTION_STRATEGIES: &[(&str, QuestionStrategy)] = &[
	("marker", parse_marked_question),
	("question_line", parse_question_line),
	("interrogative_sentence", parse_interrogative_sentence),
];

/// Words a question sentence may open with.
pub const INTERROGATIVES: &[&str] = &[
	"what", "where", "who", "when", "how", "which", "why", "did", "do", "does", "can", "will",
	"would", "is", "are",
];

const BATCH_INTERROGATIVES: &[&str] = &["could", "was", "were"];
const MIN_QUESTION_CHARS: usize = 10;
const MAX_SENTENCE_QUESTIONS: usize = 5;

/// Runs the strategy cascade and cleans the winner.
pub fn parse_single_question(response: &str) -> Option<String> {
	QUESTION_STRATEGIES
		.iter()
		.find_map(|(_, strategy)| strategy(response))
		.and_then(|raw| clean_question(&raw))
}

/// `Question: ...?` anywhere in the response.
pub fn parse_marked_question(response: &str) -> Option<String> {
	let re = Regex::new(r"(?i)Question:\s*(.+\?)").ok()?;
	let captures = re.captures(response)?;

	Some(captures.get(1)?.as_str().trim().to_string())
}

/// The first line ending in `?` that is long enough, with numbering and bullets removed.
pub fn parse_question_line(response: &str) -> Option<String> {
	response.lines().map(str::trim).find_map(|line| {
		if !line.ends_with('?') || line.chars().count() <= MIN_QUESTION_CHARS {
			return None;
		}

		Some(strip_list_prefix(line).to_string())
	})
}

/// The first sentence opening with an interrogative word; `?` is appended later by cleanup.
pub fn parse_interrogative_sentence(response: &str) -> Option<String> {
	question_sentences(response, INTERROGATIVES).into_iter().next()
}

/// Strips tags, a `Question:` prefix and numbering, and guarantees a trailing `?`.
pub fn clean_question(raw: &str) -> Option<String> {
	let mut text = raw.trim();

	if text.starts_with('[')
		&& let Some(end) = text.find(']')
	{
		text = text[end + 1..].trim_start();
	}
	if let Some(prefix) = text.get(..9)
		&& prefix.eq_ignore_ascii_case("question:")
	{
		text = text[9..].trim_start();
	}

	let text = strip_numbering(text).trim();

	if text.trim_end_matches('?').trim().is_empty() {
		return None;
	}
	if text.ends_with('?') { Some(text.to_string()) } else { Some(format!("{text}?")) }
}

/// Reads `1. ...?` lines; when none exist, falls back to question-like sentences.
pub fn parse_numbered_questions(response: &str) -> Vec<String> {
	let Ok(re) = Regex::new(r"^\d+\.\s*(.+\?)\s*$") else { return Vec::new() };
	let numbered: Vec<String> = response
		.lines()
		.filter_map(|line| re.captures(line.trim()))
		.filter_map(|captures| captures.get(1).map(|m| m.as_str().to_string()))
		.filter_map(|raw| clean_question(&raw))
		.collect();

	if !numbered.is_empty() {
		return numbered;
	}

	let words: Vec<&str> = INTERROGATIVES.iter().chain(BATCH_INTERROGATIVES).copied().collect();

	question_sentences(response, &words)
		.into_iter()
		.filter_map(|raw| clean_question(&raw))
		.take(MAX_SENTENCE_QUESTIONS)
		.collect()
}

fn question_sentences(response: &str, interrogatives: &[&str]) -> Vec<String> {
	response
		.split(['.', '!', '?', '\n'])
		.map(str::trim)
		.filter(|sentence| sentence.chars().count() > MIN_QUESTION_CHARS)
		.filter(|sentence| {
			let first = sentence
				.split(|ch: char| !ch.is_alphanumeric())
				.next()
				.unwrap_or_default()
				.to_lowercase();

			interrogatives.contains(&first.as_str())
		})
		.map(str::to_string)
		.collect()
}

fn strip_list_prefix(line: &str) -> &str {
	let line = strip_numbering(line);

	line.strip_prefix(['-', '*', '•']).map(str::trim_start).unwrap_or(line)
}

fn strip_numbering(text: &str) -> &str {
	let digits = text.chars().take_while(char::is_ascii_digit).count();

	if digits == 0 {
		return text;
	}

	match text[digits..].strip_prefix(['.', ')']) {
		Some(rest) => rest.trim_start(),
		None => text,
	}
}
