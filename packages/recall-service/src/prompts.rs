//! Prompt text sent to the generative text service.

use std::fmt::Write as _;

use recall_domain::QuizMemory;

/// One question/answer pair as the grader sees it.
pub struct GradingPair<'a> {
	pub question: &'a str,
	pub answer: &'a str,
	pub context: &'a str,
}

pub fn question_prompt(memory: &QuizMemory) -> String {
	format!(
		"\
Based on this specific memory, create 1 simple question that can be answered directly from the memory text:

Memory: \"{title}\" - {description}

Rules:
- Ask ONLY about information that is clearly stated in the memory text
- Use simple question words: What, Where, How many, Which, Who, When
- The question must be answerable from the exact text provided
- Do not ask about details not mentioned in the memory
- Do not add extra context or assumptions

Generate exactly 1 question in this format:
Question: [Your question here]?

Example for \"I bought three koi fish for my outdoor pond\":
Question: How many koi fish did you buy?

Now create a question for the provided memory:",
		title = memory.title,
		description = memory.description,
	)
}

/// Asks for `count` questions across `memories` as a numbered list.
pub fn batch_prompt(memories: &[&QuizMemory], count: usize) -> String {
	let context = memories
		.iter()
		.enumerate()
		.map(|(idx, memory)| format!("Memory {}: \"{}\" - {}", idx + 1, memory.title, memory.description))
		.collect::<Vec<_>>()
		.join("\n\n");
	let numbered = (1..=count.max(1)).map(|n| format!("{n}. Question text here?")).collect::<Vec<_>>();

	format!(
		"\
Based on these exact memories, create {count} simple questions that can be answered directly from the memory text:

{context}

Rules:
- Ask ONLY about information that is clearly stated in the memory text
- Use simple question words: What, Where, How many, Which
- Each question must be answerable from the exact text provided
- Do not ask about details not mentioned in the memories
- Do not add extra context or assumptions

Generate exactly {count} questions in this format:
{numbered}

Example for \"I bought three koi fish for my outdoor pond\":
- How many koi fish did you buy?
- What did you buy the koi fish for?

Now create questions for the provided memories:",
		numbered = numbered.join("\n"),
	)
}

pub fn scoring_prompt(pairs: &[GradingPair<'_>]) -> String {
	let mut listing = String::new();

	for (idx, pair) in pairs.iter().enumerate() {
		let _ = write!(
			listing,
			"\nQuestion {}: {}\nUser Answer: \"{}\"\nMemory Context: \"{}\"\n",
			idx + 1,
			pair.question,
			pair.answer,
			pair.context,
		);
	}

	format!(
		"\
You are a STRICT memory scoring system. You must score based on EXACT FACTUAL MATCHING ONLY.

CRITICAL RULES - NO EXCEPTIONS:
- CORRECT: User answer contains the EXACT same information as stated in the memory
- PARTIAL: User answer contains SOME correct information from the memory but is incomplete
- INCORRECT: User answer is wrong, missing, empty, or contradicts the memory

DO NOT MAKE CREATIVE CONNECTIONS:
- \"dad\" is NOT the same as \"uncle\" - they are different people
- \"brother\" is NOT the same as \"friend\" - they are different relationships
- \"carlos\" is NOT the same as \"brother\" - one is a name, one is a relationship
- Only accept EXACT matches or clear partial matches from the memory text

EXAMPLES OF CORRECT SCORING:
- Memory: \"uncle Tom\" + User: \"uncle\" -> CORRECT (exact match)
- Memory: \"went to Florida\" + User: \"florida\" -> CORRECT (exact location match)
- Memory: \"corgi dog\" + User: \"corgi\" -> CORRECT (exact breed match)
- Memory: \"uncle Tom\" + User: \"dad\" -> INCORRECT (completely different person)
- Memory: \"friend Carlos\" + User: \"brother\" -> INCORRECT (different relationship)

Score each question-answer pair based ONLY on the memory context provided:
{listing}
Respond with valid JSON only - no extra text:
{{
  \"results\": [
    {{\"questionIndex\": 0, \"score\": \"CORRECT/PARTIAL/INCORRECT\", \"reasoning\": \"exact factual explanation\"}},
    {{\"questionIndex\": 1, \"score\": \"CORRECT/PARTIAL/INCORRECT\", \"reasoning\": \"exact factual explanation\"}}
  ]
}}"
	)
}

/// `percentages` are in chronological order.
pub fn feedback_prompt(percentages: &[i32], average: i32, trend: &str) -> String {
	let scores = percentages.iter().map(|p| format!("{p}%")).collect::<Vec<_>>().join(", ");

	format!(
		"\
As a compassionate memory coach, review these {count} memory test results and write a warm, supportive and actionable feedback report of about 250 words.

Data:
Scores: {scores}
Average: {average}%
Trend: {trend}

Structure the report as follows:
1. A gentle overview of performance in two sentences. Celebrate progress when the trend is improving and encourage consistency when it is stable.
2. Strengths: two sentences on where memory and thinking remain strong.
3. Three practical memory support tips: simple exercises, routines or habits suited to the trend.
4. An encouraging conclusion that focuses on achievable progress.

Tone: warm, patient and uplifting. Use simple, clear language and focus on small victories.
",
		count = percentages.len(),
	)
}
