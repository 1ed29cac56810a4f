//! Fixed instruction template and corpus delimiters.

use std::path::Path;

use anyhow::Context;

/// Instructions placed before the document corpus.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a realtime voice agent powered by Azure OpenAI's realtime API. \n\
Your primary focus is to answer questions related to health insurance, using the provided function calls to fetch accurate data. \n\
Follow these guidelines:\n\
Scope:\n\
Answer only questions regarding health insurance.\n\
Politely inform users that you can answer only about health insurance if they ask about unrelated or general topics.\n\
Politeness & Clarity:\n\
Always be polite and courteous.\n\
If you do not have a clear or sufficient answer, say \u{201c}I'm sorry, I don't know\u{201d} rather than speculating.\n\
Function Calls:\n\
Use the provided function calls to fetch and relay health insurance details.\n\
Ensure the function calls are appropriately integrated into your responses.\n\
Restrictions:\n\
Do not answer questions on general subjects or topics outside health insurance.\n\
If a question falls outside your domain, clearly state: \u{201c}I can only provide information on health insurance.\u{201d}\n\
Keep your responses clear, precise, and strictly within the defined scope.";

/// Header separating the instructions from the corpus.
pub const CORPUS_HEADER: &str = "\n\nAdditional Document Information:\n";

/// Append one delimited document block to `out`.
pub fn push_document_block(out: &mut String, filename: &str, text: &str) {
    out.push_str("--- Begin ");
    out.push_str(filename);
    out.push_str(" ---\n");
    out.push_str(text);
    out.push_str("\n--- End ");
    out.push_str(filename);
    out.push_str(" ---\n");
}

/// Load the instruction template, falling back to [`DEFAULT_INSTRUCTIONS`]
/// when no override file is configured.
///
/// # Errors
///
/// Returns an error if a configured template file cannot be read.
pub fn load_instructions(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read instructions at {}", path.display())),
        None => Ok(DEFAULT_INSTRUCTIONS.to_owned()),
    }
}
