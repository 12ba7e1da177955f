//! Picks which memories to quiz on: unused first, spread across categories, then shuffled.

use std::collections::{HashMap, HashSet};

use rand::Rng;
use time::{Duration, OffsetDateTime};

use crate::{QuizMemory, history::UsageHistory};

/// Selects up to `count` memories.
///
/// Memories absent from `history` are preferred. When too few are available, stale usage entries
/// are aged out first and the remaining shortfall is filled from recently used memories. Each pool
/// is drawn one category at a time before any category repeats, and the result is shuffled.
pub fn select_diverse<'a, R>(
	candidates: &'a [QuizMemory],
	count: usize,
	history: &mut UsageHistory,
	window: Duration,
	now: OffsetDateTime,
	rng: &mut R,
) -> Vec<&'a QuizMemory>
where
	R: Rng + ?Sized,
{
	if candidates.is_empty() || count == 0 {
		return Vec::new();
	}

	let mut available = partition_available(candidates, history);

	if available.len() < count {
		history.prune_used_memories(window, now);

		for memory in candidates {
			history.forget_renamed(memory.id, &memory.title);
		}

		available = partition_available(candidates, history);
	}

	let mut selected = Vec::with_capacity(count.min(candidates.len()));

	fill_diverse(&available, count, &mut selected);

	if selected.len() < count {
		let recently_used: Vec<&QuizMemory> = candidates
			.iter()
			.filter(|memory| history.is_recently_used(memory.id, &memory.title))
			.collect();

		fill_diverse(&recently_used, count, &mut selected);
	}

	shuffle(&mut selected, rng);

	selected
}

/// Uniform Fisher–Yates permutation.
pub fn shuffle<T, R>(items: &mut [T], rng: &mut R)
where
	R: Rng + ?Sized,
{
	for i in (1..items.len()).rev() {
		let j = rng.gen_range(0..=i);

		items.swap(i, j);
	}
}

fn partition_available<'a>(
	candidates: &'a [QuizMemory],
	history: &UsageHistory,
) -> Vec<&'a QuizMemory> {
	candidates.iter().filter(|memory| !history.is_recently_used(memory.id, &memory.title)).collect()
}

fn fill_diverse<'a>(pool: &[&'a QuizMemory], count: usize, selected: &mut Vec<&'a QuizMemory>) {
	let mut taken = vec![false; pool.len()];
	let mut seen: HashSet<&str> = selected.iter().copied().map(QuizMemory::category_key).collect();

	for (idx, &memory) in pool.iter().enumerate() {
		if selected.len() >= count {
			return;
		}
		if seen.insert(memory.category_key()) {
			selected.push(memory);
			taken[idx] = true;
		}
	}

	while selected.len() < count {
		let mut per_category: HashMap<&str, usize> = HashMap::new();

		for memory in selected.iter().copied() {
			*per_category.entry(memory.category_key()).or_default() += 1;
		}

		let next = pool
			.iter()
			.enumerate()
			.filter(|(idx, _)| !taken[*idx])
			.min_by_key(|(_, memory)| {
				per_category.get(memory.category_key()).copied().unwrap_or_default()
			})
			.map(|(idx, _)| idx);
		let Some(idx) = next else { break };

		selected.push(pool[idx]);
		taken[idx] = true;
	}
}
