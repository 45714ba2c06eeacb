use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ViewResult;
use crate::preprocessor::{DirectoryTemplateLoader, TemplateLoader};

/// Name of the template directory below a view root.
pub const TEMPLATES_DIR: &str = "templates";

/// Source of views and of the templates they invoke.
pub trait ViewLoader: Send + Sync + fmt::Debug {
    fn template_loader(&self) -> Arc<dyn TemplateLoader>;
}

/// Views stored as files under one root directory, templates under `<root>/templates`.
#[derive(Debug, Clone)]
pub struct DirectoryViewLoader {
    root: PathBuf,
}

impl DirectoryViewLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryViewLoader { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Opens `<root>/<name>`; a missing file yields `Ok(None)`.
    pub fn open_view(&self, name: &str) -> ViewResult<Option<File>> {
        let path = self.root.join(name);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(File::open(path)?))
    }
}

impl ViewLoader for DirectoryViewLoader {
    fn template_loader(&self) -> Arc<dyn TemplateLoader> {
        Arc::new(DirectoryTemplateLoader::new(self.root.join(TEMPLATES_DIR)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::path::PathBuf;

    fn fixtures() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
    }

    #[test]
    fn test_open_view() {
        let loader = DirectoryViewLoader::new(fixtures());
        let mut source = String::new();
        loader
            .open_view("legacy.crux.xml")
            .unwrap()
            .expect("fixture exists")
            .read_to_string(&mut source)
            .unwrap();
        assert!(source.contains("_type=\"screen\""));

        assert!(loader.open_view("missing.crux.xml").unwrap().is_none());
        assert!(loader.open_view(TEMPLATES_DIR).unwrap().is_none());
    }

    #[test]
    fn test_template_loader_reads_templates_dir() {
        let loader = DirectoryViewLoader::new(fixtures());
        let template = loader.template_loader().load_template("panel", "all").unwrap();
        assert!(template.is_some());
    }
}
