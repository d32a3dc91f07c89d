/// Prompt text sent to the on-device models
use crate::config::CategorySet;
use crate::domain::truncate_chars;
use crate::tab_data::{PageContent, Tab};

/// Body text beyond this is dropped from classification prompts
const CLASSIFY_BODY_CHARS: usize = 500;

pub fn classification_prompt(categories: &CategorySet, title: &str, host: &str, body: &str) -> String {
    let mut prompt = format!(
        "Classify this browser tab into exactly one category.\n\
         Categories: {}\n\n\
         Title: {}\n\
         Website: {}\n",
        categories.labels().join(", "),
        title,
        host,
    );
    if !body.trim().is_empty() {
        prompt.push_str(&format!("Content: {}\n", truncate_chars(body.trim(), CLASSIFY_BODY_CHARS)));
    }
    prompt.push_str(
        "\nRespond with ONLY a JSON object and no other text, in this exact format:\n\
         {\"label\": \"<one category from the list>\", \"topic\": \"<3-5 word topic>\"}\n\
         The label must be copied exactly from the category list.",
    );
    prompt
}

/// Shared context hint for the summarize and write calls
pub fn category_context(label: &str) -> String {
    format!("These are browser tabs the user grouped under the {} category.", label)
}

/// Per-tab title, URL and page text, joined for the summarizer
pub fn summary_input(pages: &[(Tab, PageContent)], max_chars: usize) -> String {
    let combined = pages
        .iter()
        .map(|(tab, page)| {
            let title = if page.title.is_empty() { &tab.title } else { &page.title };
            if page.body.is_empty() {
                format!("Title: {}\nURL: {}", title, tab.url)
            } else {
                format!("Title: {}\nURL: {}\nContent: {}", title, tab.url, page.body)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate_chars(&combined, max_chars)
}

pub fn overview_prompt(label: &str, titles: &[String]) -> String {
    format!(
        "Write a short overview (2-3 sentences) of what these {} tabs are about: {}",
        label,
        titles.join("; ")
    )
}
