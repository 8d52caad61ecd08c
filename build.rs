use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Only the crate's own source trees are policed. Vendored or reference material
// that happens to live next to the manifest is left alone.
const SOURCE_DIRS: [&str; 5] = ["glm", "loaders", "cli", "tests", "benches"];

/// The kinds of policy violations the scanner reports.
#[derive(Clone, Copy)]
enum Rule {
    UnderscoreBinding,
    ForbiddenCommentWord,
    StarsInComment,
    ShoutingComment,
    AllowDeadCode,
}

impl Rule {
    fn pattern(self) -> &'static str {
        match self {
            Rule::UnderscoreBinding => r"\b(_[a-zA-Z0-9_]+)\b",
            Rule::ForbiddenCommentWord => {
                r"(//|/\*).*(?:FIXED|CORRECTED|FIX|CHANGED|CHANGE|MODIFIED|MODIFY|UPDATED|UPDATE|NEW)"
            }
            Rule::StarsInComment => r"(//|/\*).*\*\*",
            Rule::ShoutingComment => r"(//|/\*).*",
            Rule::AllowDeadCode => r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
        }
    }

    fn explanation(self) -> &'static str {
        match self {
            Rule::UnderscoreBinding => {
                "Underscore-prefixed names are not allowed. Use the binding or remove it."
            }
            Rule::ForbiddenCommentWord => {
                "Comments narrating edits (FIXED, CHANGED, UPDATE, ...) are not allowed."
            }
            Rule::StarsInComment => "The '**' pattern is only allowed in doc comments.",
            Rule::ShoutingComment => "Comments written entirely in capitals are not allowed.",
            Rule::AllowDeadCode => "#[allow(dead_code)] is not allowed. Use the code or delete it.",
        }
    }
}

// Collects every matching line of a single file so the build error lists them all.
struct ViolationCollector {
    rule: Rule,
    violations: Vec<String>,
    file_path: PathBuf,
}

impl ViolationCollector {
    fn new(rule: Rule, file_path: &Path) -> Self {
        Self {
            rule,
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
        }
    }

    fn accepts(&self, line_text: &str) -> bool {
        let trimmed = line_text.trim_start();
        let is_comment = trimmed.starts_with("//") || line_text.contains("/*");
        match self.rule {
            Rule::UnderscoreBinding => {
                if is_comment {
                    return false;
                }
                // Matches that sit between quotes are string contents, not bindings.
                !line_text
                    .split('"')
                    .enumerate()
                    .any(|(i, part)| i % 2 == 1 && part.contains('_'))
            }
            Rule::ForbiddenCommentWord | Rule::AllowDeadCode => true,
            Rule::StarsInComment => is_comment && !trimmed.starts_with("///"),
            Rule::ShoutingComment => {
                if !is_comment {
                    return false;
                }
                let body = trimmed.trim_start_matches('/').trim();
                let letters: Vec<char> = body.chars().filter(|c| c.is_alphabetic()).collect();
                !letters.is_empty() && letters.iter().all(|c| c.is_uppercase())
            }
        }
    }

    fn error_message(&self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }
        let mut message = format!(
            "\n❌ ERROR: Found {} policy violations in {}:\n",
            self.violations.len(),
            self.file_path.display()
        );
        for violation in &self.violations {
            message.push_str(&format!("   {violation}\n"));
        }
        message.push_str(&format!("\n⚠️ {}\n", self.rule.explanation()));
        Some(message)
    }
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        if self.accepts(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn rust_sources() -> impl Iterator<Item = PathBuf> {
    SOURCE_DIRS.into_iter().flat_map(|dir| {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
            .map(|e| e.into_path())
    })
}

fn scan(rule: Rule) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(rule.pattern())?;
    let mut searcher = Searcher::new();
    for path in rust_sources() {
        let mut collector = ViolationCollector::new(rule, &path);
        searcher.search_path(&matcher, &path, &mut collector)?;
        if let Some(message) = collector.error_message() {
            return Err(message.into());
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for dir in SOURCE_DIRS {
        println!("cargo:rerun-if-changed={dir}");
    }

    let rules = [
        Rule::UnderscoreBinding,
        Rule::ForbiddenCommentWord,
        Rule::StarsInComment,
        Rule::ShoutingComment,
        Rule::AllowDeadCode,
    ];
    for rule in rules {
        if let Err(e) = scan(rule) {
            // eprintln! is what surfaces the message in cargo's output.
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
