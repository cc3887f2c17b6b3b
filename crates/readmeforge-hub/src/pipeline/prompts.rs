//! Prompt templates. Formatting is plain placeholder substitution.

pub const SELECT_FILES_PROMPT: &str = r#"You are an experienced software engineer reviewing a codebase to understand its structure.

Below is the file tree of the project:
{file_tree}

Return only the files that matter most for understanding the main functionality, application flow, configuration, routing, core business logic, and key utilities.
Skip tests, stylesheets, and images.

Output format (strict): a JSON array of file paths and nothing else. Example: ["index.html", "src/app.js"]"#;

pub const SUMMARIZE_PROMPT: &str = r#"You help developers document codebases.

Summarize the purpose and functionality of the file below in clear technical language:
- what the file does
- important functions, classes, or components
- how it fits into the larger application
- notable libraries, API routes, or handlers

Filename: {filename}

File content:
{content}

Reply with a short paragraph or a few bullet points."#;

pub const BULK_SUMMARY_PROMPT: &str = r#"You are analyzing {count} files from a software project. For each file, give a technical summary covering its purpose, key components, dependencies, core functionality, and how it integrates with the rest of the project.

{files}

Format each summary as:
### <file path>
**Purpose:** ...
**Key Components:** ...
**Dependencies:** ...
**Functionality:** ...
**Integration:** ..."#;

pub const GENERATE_README_PROMPT: &str = r#"You are an expert technical writer. Write a complete, well-formatted README.md for a repository based on the file summaries below.

Include, where the summaries allow:
1. Project title and description
2. Features
3. Tech stack
4. Installation
5. Usage
6. Project structure as a tree in a code block
7. Screenshots (heading only)
8. Contributing
9. License
10. Contact

Explain the project as a whole rather than describing each file. Use clean markdown with no broken sections.

File summaries:
{summaries}"#;

pub const REDUCED_README_PROMPT: &str = r#"Generate a professional README.md for this project based on the file summaries:

{summaries}

Include: project title, description, features, tech stack, installation, and usage.
Keep it concise but informative."#;

pub fn select_files_prompt(file_tree: &[String]) -> String {
    SELECT_FILES_PROMPT.replace("{file_tree}", &file_tree.join("\n"))
}

pub fn summarize_prompt(filename: &str, content: &str) -> String {
    SUMMARIZE_PROMPT
        .replace("{filename}", filename)
        .replace("{content}", content)
}

pub fn bulk_summary_prompt(sections: &[String]) -> String {
    BULK_SUMMARY_PROMPT
        .replace("{count}", &sections.len().to_string())
        .replace("{files}", &sections.join("\n"))
}

pub fn generate_readme_prompt(summaries: &str) -> String {
    GENERATE_README_PROMPT.replace("{summaries}", summaries)
}

pub fn reduced_readme_prompt(summaries: &str) -> String {
    REDUCED_README_PROMPT.replace("{summaries}", summaries)
}

/// One file's block inside a bulk summary prompt.
pub fn file_section(filename: &str, content: &str, max_chars: usize) -> String {
    if content.trim().is_empty() {
        return format!("=== FILE: {} ===\n(Empty file)\n", filename);
    }

    let total = content.chars().count();
    let shown: String = content.chars().take(max_chars).collect();
    let marker = if total > max_chars { "... (truncated)\n" } else { "" };

    format!(
        "=== FILE: {} ===\nContent Length: {} characters\nContent:\n{}\n{}",
        filename, total, shown, marker
    )
}

/// Last-resort README used when every generation request failed.
pub fn template_readme(summaries: &[String]) -> String {
    let components: Vec<String> = summaries
        .iter()
        .take(5)
        .map(|s| format!("- {}", s.lines().next().unwrap_or_default()))
        .collect();

    format!(
        "# Project README\n\n\
         ## Description\n\
         This project contains the following components:\n\n\
         {}\n\n\
         ## Installation\n\
         1. Clone this repository\n\
         2. Install dependencies\n\
         3. Run the application\n\n\
         ## Usage\n\
         Please refer to the source code and documentation for usage instructions.\n\n\
         ## Contributing\n\
         Contributions are welcome! Please feel free to submit a Pull Request.\n\n\
         ---\n\
         *This README was generated automatically when API limits were reached.*\n",
        components.join("\n")
    )
}
