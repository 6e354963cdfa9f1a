//! Prompt templates and answer post-processing.

/// The contractual answer for questions the document cannot ground.
pub const NOT_AVAILABLE: &str = "Data Not Available";

/// Instruction used to summarize a table block.
pub const TABLE_SUMMARY_QUERY: &str = "What is this table about? Give a very concise summary \
     (imagine you are adding a new caption and summary for this table), and output the \
     real/existing table title/caption if context provided.";

/// Instruction used to summarize a figure block.
pub const FIGURE_SUMMARY_QUERY: &str = "What does this figure show? Give a very concise \
     summary suitable as a caption, and output the real/existing figure title/caption if \
     context provided.";

/// System message for every generation request.
pub const SYSTEM_PROMPT: &str = "You are an expert Q&A system that is trusted around the \
     world. Always answer the query using the provided context information, and not prior \
     knowledge. Never directly reference the given context in your answer.";

/// Grounding instruction appended to every user query.
pub const GROUNDING_INSTRUCTION: &str =
    ". If you can't answer using provided context information, reply with 'Data Not Available'";

/// Append the grounding instruction to a user query.
pub fn instrument_query(query: &str) -> String {
    format!("{query}{GROUNDING_INSTRUCTION}")
}

/// The user's own question, with any grounding instruction removed.
pub fn user_query(query: &str) -> &str {
    query.strip_suffix(GROUNDING_INSTRUCTION).unwrap_or(query)
}

/// Render the question-answering prompt.
pub fn render_qa(context: &str, query: &str) -> String {
    format!(
        "Context information is below.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {query}\n\
         Answer: "
    )
}

/// Build the query for refining an existing answer with another context window.
pub fn refine_query(query: &str, existing_answer: &str) -> String {
    format!(
        "The original query is as follows: {query}\n\
         We have provided an existing answer: {existing_answer}\n\
         We have the opportunity to refine the existing answer (only if needed) with the \
         context above. Given the new context, refine the original answer to better answer \
         the query. If the context isn't useful, return the original answer unchanged."
    )
}

/// Pack context texts into as few windows of at most `max_chars` as possible,
/// preserving order. Texts longer than a window are split across windows.
pub fn pack_context<'a>(texts: impl IntoIterator<Item = &'a str>, max_chars: usize) -> Vec<String> {
    const SEPARATOR: &str = "\n\n";
    let mut windows = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for text in texts {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let pieces = split_chars(text, max_chars);
        for piece in pieces {
            let piece_len = piece.chars().count();
            let joined_len =
                if current.is_empty() { piece_len } else { current_len + 2 + piece_len };
            if joined_len > max_chars && !current.is_empty() {
                windows.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push_str(SEPARATOR);
                current_len += 2;
            }
            current.push_str(&piece);
            current_len += piece_len;
        }
    }

    if !current.is_empty() {
        windows.push(current);
    }
    windows
}

fn split_chars(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(max_chars.max(1)).map(|piece| piece.iter().collect()).collect()
}

/// Collapse any rendering of the fallback sentinel to the exact contractual string.
pub fn normalize_answer(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed
        .trim_matches(|c: char| c == '\'' || c == '"' || c == '`' || c == '*')
        .trim_end_matches('.')
        .trim();
    if stripped.eq_ignore_ascii_case(NOT_AVAILABLE) || trimmed.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Column names from the header row of a markdown table.
pub fn table_columns(markup: &str) -> Vec<String> {
    markup
        .lines()
        .find(|line| line.trim_start().starts_with('|'))
        .map(|header| {
            header
                .trim()
                .trim_matches('|')
                .split('|')
                .map(|cell| cell.trim().to_string())
                .filter(|cell| !cell.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Append the column listing to a table summary.
pub fn describe_table(summary: &str, markup: &str) -> String {
    let columns = table_columns(markup);
    if columns.is_empty() {
        return summary.trim().to_string();
    }
    let listing: Vec<String> = columns.iter().map(|c| format!("- {c}")).collect();
    format!("{}, with the following columns:\n{}", summary.trim(), listing.join("\n"))
}
