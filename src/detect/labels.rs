use std::path::Path;

use anyhow::{anyhow, Context, Result};

/// Class names indexed by class id, one per line in a names file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassLabels {
    names: Vec<String>,
}

impl ClassLabels {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read class names from {}", path.display()))?;
        let labels = Self::parse(&raw);
        if labels.is_empty() {
            return Err(anyhow!("class names file {} is empty", path.display()));
        }
        Ok(labels)
    }

    /// Blank lines are kept so ids stay aligned with the model's outputs;
    /// only trailing blank lines are dropped.
    pub fn parse(raw: &str) -> Self {
        let mut names: Vec<String> = raw.lines().map(|line| line.trim().to_string()).collect();
        while names.last().is_some_and(|name| name.is_empty()) {
            names.pop();
        }
        Self { names }
    }

    pub fn name(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }

    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_keeps_ids_aligned() {
        let labels = ClassLabels::parse("person\nbicycle\r\n\ncar\n\n");
        assert_eq!(labels.len(), 4);
        assert_eq!(labels.name(0), Some("person"));
        assert_eq!(labels.name(1), Some("bicycle"));
        assert_eq!(labels.name(2), Some(""));
        assert_eq!(labels.id_of("car"), Some(3));
        assert_eq!(labels.name(4), None);
    }

    #[test]
    fn loads_from_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "person")?;
        writeln!(file, "dog")?;
        let labels = ClassLabels::from_path(file.path())?;
        assert_eq!(labels.id_of("dog"), Some(1));
        Ok(())
    }

    #[test]
    fn empty_file_is_rejected() -> Result<()> {
        let file = tempfile::NamedTempFile::new()?;
        assert!(ClassLabels::from_path(file.path()).is_err());
        Ok(())
    }
}
