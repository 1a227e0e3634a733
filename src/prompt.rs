//! Prompt templates sent to the generation endpoint.  The endpoint's
//! output format is not guaranteed; callers treat the reply as opaque text.

use crate::model::SummaryType;

const CODE_TEMPLATE: &str = "You are a senior software engineer.\n\n\
Purpose: Explain what this code does in simple terms.\n\n\
How it works: Provide a clear, step-by-step explanation.\n\n\
Key points: Highlight the most important aspects of the code.\n\n\
Do NOT rewrite the code.";

const SHORT_TEMPLATE: &str = "You are a professional writing assistant.\n\n\
Summary:\nProvide a concise summary (1-2 sentences) with a clear heading.";

const MEDIUM_TEMPLATE: &str = "You are a professional writing assistant.\n\n\
Summary:\nProvide a detailed summary (3-5 sentences) with a clear heading.";

const BULLET_TEMPLATE: &str = "You are a professional writing assistant.\n\n\
Summary:\nProvide a bullet-point summary with key points and a clear heading.";

fn summary_template(ty: SummaryType) -> &'static str {
    match ty {
        SummaryType::Short => SHORT_TEMPLATE,
        SummaryType::Medium => MEDIUM_TEMPLATE,
        SummaryType::Bullet => BULLET_TEMPLATE,
    }
}

/// Build the instruction for an already sanitized selection.  The summary
/// type is ignored for code.
pub fn build_prompt(text: &str, ty: SummaryType, is_code: bool) -> String {
    if is_code {
        format!("{CODE_TEMPLATE}\n\nCode:\n{text}")
    } else {
        format!("{}\n\nText:\n{text}", summary_template(ty))
    }
}

/// Variant taking the raw type string; unknown types use the medium
/// template.
pub fn build_prompt_raw(text: &str, raw_type: &str, is_code: bool) -> String {
    build_prompt(text, SummaryType::parse_or_medium(raw_type), is_code)
}
