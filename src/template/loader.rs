//! Theme template and include sources.

use super::{IncludeScope, TemplateError};
use crate::config::SiteConfig;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Source of template and include markup.
pub trait ResourceLoader: Send + Sync {
    /// Markup of a theme template. Missing files yield [`TemplateError::NotFound`].
    fn load_template(&self, name: &str) -> Result<String, TemplateError>;

    /// Markup of an include in `scope`. Includes are optional: missing → `None`.
    fn load_include(&self, name: &str, scope: IncludeScope) -> Result<Option<String>, TemplateError>;
}

/// Loads templates from `<theme>/templates/` and includes from `include/`.
#[derive(Debug, Clone)]
pub struct FsLoader {
    templates: PathBuf,
    global_includes: PathBuf,
    theme_includes: PathBuf,
}

impl FsLoader {
    pub fn new(config: &SiteConfig) -> Self {
        let paths = config.paths();
        Self {
            templates: paths.templates_dir(),
            global_includes: paths.include_dir(IncludeScope::Global),
            theme_includes: paths.include_dir(IncludeScope::Theme),
        }
    }

    fn read(path: &Path, name: &str) -> Result<String, TemplateError> {
        fs::read_to_string(path).map_err(|source| TemplateError::Io {
            name: name.to_owned(),
            source,
        })
    }
}

impl ResourceLoader for FsLoader {
    fn load_template(&self, name: &str) -> Result<String, TemplateError> {
        let path = self.templates.join(name);
        if !path.is_file() {
            return Err(TemplateError::NotFound(name.to_owned()));
        }
        Self::read(&path, name)
    }

    fn load_include(&self, name: &str, scope: IncludeScope) -> Result<Option<String>, TemplateError> {
        let dir = match scope {
            IncludeScope::Global => &self.global_includes,
            IncludeScope::Theme => &self.theme_includes,
        };
        let path = dir.join(name);
        if !path.is_file() {
            return Ok(None);
        }
        Self::read(&path, name).map(Some)
    }
}

#[cfg(test)]
pub use memory::MemoryLoader;

#[cfg(test)]
mod memory {
    use super::*;
    use rustc_hash::FxHashMap;

    /// In-memory loader for tests.
    #[derive(Debug, Default, Clone)]
    pub struct MemoryLoader {
        templates: FxHashMap<String, String>,
        includes: FxHashMap<(IncludeScope, String), String>,
    }

    impl MemoryLoader {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn template(mut self, name: &str, markup: &str) -> Self {
            self.templates.insert(name.to_owned(), markup.to_owned());
            self
        }

        pub fn include(mut self, scope: IncludeScope, name: &str, markup: &str) -> Self {
            self.includes.insert((scope, name.to_owned()), markup.to_owned());
            self
        }
    }

    impl ResourceLoader for MemoryLoader {
        fn load_template(&self, name: &str) -> Result<String, TemplateError> {
            self.templates
                .get(name)
                .cloned()
                .ok_or_else(|| TemplateError::NotFound(name.to_owned()))
        }

        fn load_include(&self, name: &str, scope: IncludeScope) -> Result<Option<String>, TemplateError> {
            Ok(self.includes.get(&(scope, name.to_owned())).cloned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_loader_paths() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("themes/paper/templates")).unwrap();
        fs::create_dir_all(root.join("include/paper")).unwrap();
        fs::write(root.join("themes/paper/templates/post.html"), "POST").unwrap();
        fs::write(root.join("include/head.html"), "GLOBAL").unwrap();
        fs::write(root.join("include/paper/head.html"), "THEME").unwrap();

        let mut config = SiteConfig::default();
        config.set_root(root);
        config.site.theme = "themes/paper".into();
        let loader = FsLoader::new(&config);

        assert_eq!(loader.load_template("post.html").unwrap(), "POST");
        assert!(matches!(
            loader.load_template("missing.html"),
            Err(TemplateError::NotFound(name)) if name == "missing.html"
        ));
        assert_eq!(
            loader.load_include("head.html", IncludeScope::Global).unwrap().as_deref(),
            Some("GLOBAL")
        );
        assert_eq!(
            loader.load_include("head.html", IncludeScope::Theme).unwrap().as_deref(),
            Some("THEME")
        );
        assert_eq!(loader.load_include("nope.html", IncludeScope::Theme).unwrap(), None);
    }
}
