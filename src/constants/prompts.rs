//! Built-in prompt templates. Deployments override them with files named by
//! `TOPIC_SUMMARY_PROMPT_FILE` / `ITEM_GENERATOR_PROMPT_FILE`.
//!
//! Placeholders: `{category}` is replaced with the category chosen for the attempt,
//! `{topic}` with the accepted topic summary (or a free-choice instruction), and
//! `{schema}` with the JSON schema of the expected item.

pub const TOPIC_SUMMARY_PROMPT: &str = "You are choosing the subject of a single trivia question in the category \"{category}\".

The question will ask for a number (a quantity, year, distance, count, percentage or similar) that has one well-documented, citable answer.

Pick a specific, less obvious fact. Avoid the most famous facts in the category.

Reply with ONLY a short topic summary of 3 to 10 words describing the fact, for example:
Height of Angel Falls in Venezuela

No JSON, no quotes, no punctuation at the end, no commentary.";

pub const ITEM_GENERATOR_PROMPT: &str = r#"You are a trivia writer producing ONE question whose answer is a single number.

## SUBJECT

Category: {category}
Topic: {topic}

## REQUIREMENTS

- The answer must be a single, well-documented number taken from a reputable public source.
- The question must name the unit the answer is expressed in (for example "in metres", "in years", "in percent").
- The question must be unambiguous: exactly one number answers it.
- The source must be a specific, publicly reachable web page (http or https) that states the number.
- The summary field is a 3 to 10 word description of the fact, used to detect repeated topics.

## OUTPUT FORMAT

Return ONLY a single JSON object matching this schema. No markdown, no code fences, no commentary.

{schema}

Field notes:
- answer: a JSON number, never a string ("8849" is wrong, 8849 is right)
- unit: the unit label as it appears in the question
- category: "{category}"
- sourceName: the publisher or site name
- sourceUrl: the full URL of the page stating the answer"#;

/// Substituted for `{topic}` when Phase 1 produced no usable summary.
pub const FREE_TOPIC_INSTRUCTION: &str =
    "choose any specific, less obvious fact in this category";
