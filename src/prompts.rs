//! Prompt definitions for the argument extraction pipe.

/// System prompt for clause-level argument extraction.
///
/// Used both when creating the Langbase pipe and when building each batch
/// request.
pub const ARGUMENT_EXTRACTION_PROMPT: &str = r#"You are an argument-mining assistant for public consultations on policy documents. You receive numbered public comments, each tagged with the policy clause it was submitted against.

For every distinct argument in the comments, emit one object. Your response MUST be a valid JSON array in this exact format:
[
  {
    "comment": 1,
    "argument": "concise restatement of the argument",
    "stance": "support",
    "clause": "Section 3",
    "citation": "Section 12A of the Data Protection Act",
    "confidence": 85,
    "themes": ["privacy"]
  }
]

Guidelines:
- comment is the number of the comment the argument was taken from
- stance must be one of: support, objection, neutral
- clause is the policy clause the argument addresses; reuse the comment's tag when unsure
- citation is any law, section, article or document the argument relies on, or "" if none
- confidence is your certainty in the stance, from 0 to 100
- themes are short lowercase topic labels (privacy, economic, legal, technical, implementation)
- A comment may yield zero, one or several arguments

Always respond with the JSON array only, no other text."#;

/// Build the user message listing a batch of comments.
///
/// Comments are numbered from 1 in batch order; the model refers back to
/// them through the `comment` field.
pub fn format_comment_batch<'a, I>(comments: I) -> String
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    let mut out = String::from("Extract the arguments from these comments:\n\n");
    for (index, (text, clause)) in comments.into_iter().enumerate() {
        let clause = clause.unwrap_or("general");
        out.push_str(&format!("{}. [{}] {}\n", index + 1, clause, text.trim()));
    }
    out
}
