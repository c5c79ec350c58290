//! Fixed instructional prompts for one-shot generation tasks.

/// Prompt for deriving a short chat title from the first message. The
/// reply is sanitized into a filesystem-safe slug afterwards, so the
/// exact formatting of the model output is not load-bearing.
pub const TITLE_PROMPT: &str = r"
Please create a short title that summarizes the following message.
The title must be 6 words or fewer, in the same language as the
message. Reply with the title only, without quotes or punctuation
around it.

### message
";

pub const COMMIT_PROMPT: &str = r"
Please make git commit messages for the following diff output.

Each commit message must be one line starting with one of the following words.

* feat: (new feature for the user, not a new feature for build script)
* fix: (bug fix for the user, not a fix to a build script)
* docs: (changes to the documentation)
* style: (formatting, missing semi colons, etc; no production code change)
* refactor: (refactoring production code, eg. renaming a variable)
* test: (adding missing tests, refactoring tests; no production code change)
* chore: (updating grunt tasks etc; no production code change)

### diff
";

/// Builds the full commit message prompt: the instruction block (or a
/// caller supplied replacement) followed by the diff.
pub fn commit_prompt(custom: Option<&str>, diff: &str) -> String {
    format!("{}\n\n{}", custom.unwrap_or(COMMIT_PROMPT), diff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_prompt_default_instructions() {
        let prompt = commit_prompt(None, "diff --git a/foo b/foo");
        assert!(prompt.starts_with(COMMIT_PROMPT));
        assert!(prompt.ends_with("diff --git a/foo b/foo"));
    }

    #[test]
    fn test_commit_prompt_custom_instructions() {
        let prompt = commit_prompt(Some("One line only."), "some diff");
        assert!(prompt.starts_with("One line only."));
        assert!(prompt.contains("some diff"));
        assert!(!prompt.contains("feat:"));
    }
}
