use std::fs;

use anyhow::Result;

use crate::core::AppConfig;

/// Prints stored chat titles, newest first. Titles start with a
/// millisecond timestamp so lexical order is chronological order.
pub async fn run(config: &AppConfig) -> Result<()> {
    let mut titles: Vec<String> = match fs::read_dir(&config.chat_dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "md") {
                    path.file_stem().map(|stem| stem.to_string_lossy().into_owned())
                } else {
                    None
                }
            })
            .collect(),
        Err(_) => Vec::new(),
    };

    titles.sort();
    titles.reverse();
    for title in titles {
        println!("{}", title);
    }

    Ok(())
}
