//! Line-addressable text surfaces a transcript can be written to.
use std::io::Write;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// A transcript display target: an ordered list of lines that can be
/// read, rewritten, and appended to. The streaming driver only talks
/// to this trait, so the same pipeline serves an in-memory buffer, a
/// console, or an editor buffer.
#[async_trait]
pub trait Surface: Send {
    async fn line_count(&self) -> Result<usize>;
    async fn get_line(&self, index: usize) -> Result<String>;
    async fn set_line(&mut self, index: usize, line: String) -> Result<()>;
    async fn append_lines(&mut self, lines: Vec<String>) -> Result<()>;
    async fn lines(&self) -> Result<Vec<String>>;
}

pub type SharedSurface = Arc<Mutex<dyn Surface>>;

/// In-memory surface. Starts with a single empty line, matching an
/// empty editor buffer.
pub struct TextSurface {
    lines: Vec<String>,
}

impl TextSurface {
    pub fn new() -> Self {
        Self {
            lines: vec![String::new()],
        }
    }

    pub fn with_lines(lines: Vec<String>) -> Self {
        let lines = if lines.is_empty() {
            vec![String::new()]
        } else {
            lines
        };
        Self { lines }
    }

    pub fn shared(self) -> SharedSurface {
        Arc::new(Mutex::new(self))
    }
}

impl Default for TextSurface {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Surface for TextSurface {
    async fn line_count(&self) -> Result<usize> {
        Ok(self.lines.len())
    }

    async fn get_line(&self, index: usize) -> Result<String> {
        match self.lines.get(index) {
            Some(line) => Ok(line.clone()),
            None => bail!("Line {} is out of range", index),
        }
    }

    async fn set_line(&mut self, index: usize, line: String) -> Result<()> {
        match self.lines.get_mut(index) {
            Some(slot) => {
                *slot = line;
                Ok(())
            }
            None => bail!("Line {} is out of range", index),
        }
    }

    async fn append_lines(&mut self, lines: Vec<String>) -> Result<()> {
        self.lines.extend(lines);
        Ok(())
    }

    async fn lines(&self) -> Result<Vec<String>> {
        Ok(self.lines.clone())
    }
}

/// Surface that mirrors every mutation to stdout so a terminal user
/// watches the reply stream in as it would in an editor buffer.
pub struct ConsoleSurface {
    inner: TextSurface,
}

impl ConsoleSurface {
    pub fn new() -> Self {
        Self {
            inner: TextSurface::new(),
        }
    }

    pub fn with_lines(lines: Vec<String>) -> Self {
        let inner = TextSurface::with_lines(lines);
        print!("{}", inner.lines.join("\n"));
        let _ = std::io::stdout().flush();
        Self { inner }
    }

    pub fn shared(self) -> SharedSurface {
        Arc::new(Mutex::new(self))
    }
}

impl Default for ConsoleSurface {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Surface for ConsoleSurface {
    async fn line_count(&self) -> Result<usize> {
        self.inner.line_count().await
    }

    async fn get_line(&self, index: usize) -> Result<String> {
        self.inner.get_line(index).await
    }

    async fn set_line(&mut self, index: usize, line: String) -> Result<()> {
        // Streaming extends the last line in place; echo only the new
        // suffix so the terminal output stays continuous
        let last = self.inner.lines.len() - 1;
        let current = self.inner.get_line(index).await?;
        if index == last {
            if let Some(suffix) = line.strip_prefix(current.as_str()) {
                print!("{}", suffix);
            } else {
                print!("\r{}", line);
            }
        }
        let _ = std::io::stdout().flush();
        self.inner.set_line(index, line).await
    }

    async fn append_lines(&mut self, lines: Vec<String>) -> Result<()> {
        for line in &lines {
            print!("\n{}", line);
        }
        let _ = std::io::stdout().flush();
        self.inner.append_lines(lines).await
    }

    async fn lines(&self) -> Result<Vec<String>> {
        self.inner.lines().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_text_surface_starts_with_one_empty_line() {
        let surface = TextSurface::new();
        assert_eq!(surface.line_count().await.unwrap(), 1);
        assert_eq!(surface.get_line(0).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_text_surface_set_and_append() {
        let mut surface = TextSurface::new();
        surface.set_line(0, "first".to_string()).await.unwrap();
        surface
            .append_lines(vec!["second".to_string(), "third".to_string()])
            .await
            .unwrap();

        assert_eq!(
            surface.lines().await.unwrap(),
            vec!["first", "second", "third"]
        );
    }

    #[tokio::test]
    async fn test_text_surface_out_of_range() {
        let mut surface = TextSurface::new();
        assert!(surface.get_line(5).await.is_err());
        assert!(surface.set_line(5, "nope".to_string()).await.is_err());
    }

    #[tokio::test]
    async fn test_with_lines_never_empty() {
        let surface = TextSurface::with_lines(Vec::new());
        assert_eq!(surface.line_count().await.unwrap(), 1);
    }
}
