//! The three README stages: select, summarize, generate.
//!
//! Every stage degrades instead of failing: an exhausted LLM request falls
//! back to a heuristic, a smaller request, or a template.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use readmeforge_core::config::PipelineSettings;
use readmeforge_core::message::ChatMessage;
use readmeforge_core::provider::Completer;
use readmeforge_core::retry::RequestOptions;

use super::files::read_file;
use super::prompts;

const SELECT_MAX_TOKENS: u32 = 800;
const BULK_MAX_TOKENS: u32 = 2500;
const SINGLE_MAX_TOKENS: u32 = 800;
const SINGLE_MAX_CHARS: usize = 2000;
const README_MAX_TOKENS: u32 = 4500;
const REDUCED_MAX_TOKENS: u32 = 2000;
const REDUCED_MAX_CHARS: usize = 3000;

/// Path fragments never worth showing to the model.
const NOISE_PATTERNS: &[&str] = &[
    ".git/", "node_modules/", "__pycache__/", ".venv/", "venv/", ".png", ".jpg", ".jpeg",
    ".gif", ".svg", ".ico", ".min.js", ".min.css", "dist/", "build/", ".cache/",
];

/// Name fragments that usually mark an important file.
const IMPORTANT_PATTERNS: &[&str] = &[
    "main", "index", "app", "server", "config", "package", "requirements", "setup",
    "dockerfile", "readme", ".env", "route",
];

static JSON_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[(.*?)\]").expect("static regex"));

/// Which generation path produced the README.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadmeSource {
    Full,
    Reduced,
    Template,
}

/// Why the model's file selection could not be used.
#[derive(Debug, PartialEq)]
pub enum SelectionError {
    InvalidJson(String),
}

fn user(prompt: String) -> Vec<ChatMessage> {
    vec![ChatMessage::user(&prompt)]
}

/// Drop obvious noise and cap the list shown to the model.
pub fn display_tree(tree: &[String], max_files: usize) -> Vec<String> {
    tree.iter()
        .filter(|path| {
            let lower = path.to_lowercase();
            !NOISE_PATTERNS.iter().any(|p| lower.contains(p))
        })
        .take(max_files)
        .cloned()
        .collect()
}

/// Parse the model's reply: the first `[...]` as a JSON string array, or
/// one path per line when no array is present.
pub fn parse_selection(raw: &str) -> Result<Vec<String>, SelectionError> {
    let raw = raw.trim();

    let selected = match JSON_ARRAY.captures(raw) {
        Some(caps) => {
            let json_like = format!("[{}]", &caps[1]);
            serde_json::from_str::<Vec<String>>(&json_like)
                .map_err(|e| SelectionError::InvalidJson(e.to_string()))?
        }
        None => raw
            .lines()
            .map(|line| {
                line.trim()
                    .trim_matches(|c: char| c == '"' || c == '\'' || c == ',')
                    .to_string()
            })
            .collect(),
    };

    Ok(selected
        .into_iter()
        .map(|s| s.trim().trim_start_matches("./").to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Name-based guess used when the model's selection is unusable.
pub fn heuristic_selection(display: &[String], max_files: usize) -> Vec<String> {
    let important: Vec<String> = display
        .iter()
        .filter(|path| {
            let lower = path.to_lowercase();
            IMPORTANT_PATTERNS.iter().any(|p| lower.contains(p))
        })
        .take(max_files)
        .cloned()
        .collect();

    if important.is_empty() {
        display.iter().take(max_files).cloned().collect()
    } else {
        important
    }
}

/// Stage 1: ask the model which files matter.
pub async fn select_files(
    completer: &dyn Completer,
    tree: &[String],
    settings: &PipelineSettings,
    options: RequestOptions,
) -> Vec<String> {
    let shown = display_tree(tree, settings.max_files_to_show);
    info!(
        "File selection: {} listed, {} shown to the model",
        tree.len(),
        shown.len()
    );

    let prompt = prompts::select_files_prompt(&shown);
    let options = options.with_max_tokens(SELECT_MAX_TOKENS);

    let raw = match completer.complete(&user(prompt), options).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("File selection request failed, using heuristic: {}", e);
            return heuristic_selection(&shown, settings.max_files_to_process);
        }
    };

    let selected = match parse_selection(&raw) {
        Ok(selected) => selected,
        Err(SelectionError::InvalidJson(e)) => {
            warn!("Parsing selection failed, using heuristic: {}", e);
            return heuristic_selection(&shown, settings.max_files_to_process);
        }
    };

    let known: Vec<String> = selected
        .into_iter()
        .filter(|path| tree.contains(path))
        .take(settings.max_files_to_process)
        .collect();

    if known.is_empty() {
        warn!("Model selected no known files, using heuristic");
        return heuristic_selection(&shown, settings.max_files_to_process);
    }

    info!("Selected {} files for detailed processing", known.len());
    known
}

/// Stage 2: summarize selected files in batches, falling back to one
/// request per file when a batch fails.
pub async fn summarize_files(
    completer: &dyn Completer,
    root: &Path,
    selected: &[String],
    settings: &PipelineSettings,
    options: RequestOptions,
) -> Vec<String> {
    let per_request = settings.files_per_request.max(1);
    let total_batches = selected.len().div_ceil(per_request);
    let mut summaries = Vec::new();

    info!(
        "Summarizing {} files, {} per request",
        selected.len(),
        per_request
    );

    for (i, batch) in selected.chunks(per_request).enumerate() {
        info!("Batch {}/{}: {} files", i + 1, total_batches, batch.len());

        let sections: Vec<String> = batch
            .iter()
            .map(|f| prompts::file_section(f, &read_file(root, f), settings.max_content_per_file))
            .collect();

        let prompt = prompts::bulk_summary_prompt(&sections);
        match completer
            .complete(&user(prompt), options.with_max_tokens(BULK_MAX_TOKENS))
            .await
        {
            Ok(text) if !text.trim().is_empty() => {
                summaries.push(text);
                continue;
            }
            Ok(_) => warn!("Batch {} came back empty, summarizing files one by one", i + 1),
            Err(e) => warn!("Batch {} failed, summarizing files one by one: {}", i + 1, e),
        }

        for filename in batch {
            summaries.push(summarize_single(completer, root, filename, options).await);
        }
    }

    summaries
}

async fn summarize_single(
    completer: &dyn Completer,
    root: &Path,
    filename: &str,
    options: RequestOptions,
) -> String {
    let content: String = read_file(root, filename)
        .chars()
        .take(SINGLE_MAX_CHARS)
        .collect();

    if content.trim().is_empty() {
        return format!("### {}\n(Empty file)", filename);
    }

    let prompt = prompts::summarize_prompt(filename, &content);
    match completer
        .complete(&user(prompt), options.with_max_tokens(SINGLE_MAX_TOKENS))
        .await
    {
        Ok(summary) => format!("### {}\n{}", filename, summary),
        Err(e) => format!("### {}\n(Processing failed: {})", filename, e),
    }
}

/// Stage 3: synthesize the README. Never fails; the template is the floor.
pub async fn generate_readme(
    completer: &dyn Completer,
    summaries: &[String],
    settings: &PipelineSettings,
    options: RequestOptions,
) -> (String, ReadmeSource) {
    let limited = &summaries[..summaries.len().min(settings.max_summaries)];
    let joined = limited.join("\n\n");

    info!("Generating README from {} summaries", limited.len());

    let prompt = prompts::generate_readme_prompt(&joined);
    match completer
        .complete(&user(prompt), options.with_max_tokens(README_MAX_TOKENS))
        .await
    {
        Ok(text) if !text.trim().is_empty() => return (text, ReadmeSource::Full),
        Ok(_) => warn!("README generation returned nothing, retrying with a reduced prompt"),
        Err(e) => warn!("README generation failed, retrying with a reduced prompt: {}", e),
    }

    let reduced: String = joined.chars().take(REDUCED_MAX_CHARS).collect();
    let prompt = prompts::reduced_readme_prompt(&reduced);
    match completer
        .complete(&user(prompt), options.with_max_tokens(REDUCED_MAX_TOKENS))
        .await
    {
        Ok(text) if !text.trim().is_empty() => return (text, ReadmeSource::Reduced),
        Ok(_) => warn!("Reduced README generation returned nothing"),
        Err(e) => warn!("Reduced README generation failed: {}", e),
    }

    warn!("Using template README due to API failures");
    (prompts::template_readme(limited), ReadmeSource::Template)
}
