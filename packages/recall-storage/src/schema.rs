pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_memories.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_memories.sql")),
				"tables/002_extracted_facts.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_extracted_facts.sql")),
				"tables/003_test_scores.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_test_scores.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn includes_are_expanded() {
		let schema = render_schema();

		assert!(!schema.contains("\\ir "));

		for table in ["memories", "extracted_facts", "test_scores"] {
			assert!(schema.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")));
		}
	}

	#[test]
	fn unknown_includes_are_left_verbatim() {
		assert_eq!(expand_includes("\\ir tables/999_missing.sql"), "\\ir tables/999_missing.sql\n");
	}
}
