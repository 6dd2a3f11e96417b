//! Per-file and global configuration.
//!
//! Per-file configuration is read from the nearest `markmod.yaml` found by
//! walking up from the source file, unless the caller supplies one:
//!
//! ```yaml
//! match: ['\.(html|svg)$', 'i']
//! parsers: [./stages/markdown]
//! processors:
//!   - trim
//! pre: strip-comments
//! minify:
//!   collapse_whitespace: true
//!   remove_comments: true
//! live: nats://localhost:4222
//! remedy: true
//! ```

use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::stage::StageRef;

/// File name of the per-project manifest.
pub const MANIFEST_NAME: &str = "markmod.yaml";

/// Eligibility pattern used when the configuration does not set `match`.
pub const DEFAULT_MATCH: &str = r"\.(html|xhtml|svg)$";

/// Compiled `match` pattern with its flags.
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: String,
    flags: String,
    regex: Regex,
}

impl Matcher {
    /// Compile a pattern. Supported flags: `i`, `m`, `s`, `x`; `g`, `u` and
    /// `y` are accepted and ignored.
    pub fn new(pattern: &str, flags: &str) -> Result<Self, PipelineError> {
        let mut builder = RegexBuilder::new(pattern);
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'x' => {
                    builder.ignore_whitespace(true);
                }
                'g' | 'u' | 'y' => {}
                other => {
                    return Err(PipelineError::Config(format!(
                        "Unsupported match flag '{}' in '{}'",
                        other, flags
                    )))
                }
            }
        }

        let regex = builder
            .build()
            .map_err(|e| PipelineError::Config(format!("Invalid match pattern '{}': {}", pattern, e)))?;

        Ok(Self {
            pattern: pattern.to_string(),
            flags: flags.to_string(),
            regex,
        })
    }

    /// `\.(html|xhtml|svg)$`, case-insensitive.
    pub fn default_markup() -> Self {
        Self::new(DEFAULT_MATCH, "i").expect("default match pattern is valid")
    }

    pub fn is_match(&self, identity: &str) -> bool {
        self.regex.is_match(identity)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }
}

/// `match` as written in a manifest: a bare pattern or `[pattern, flags]`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MatchSpec {
    Pattern(String),
    WithFlags(Vec<String>),
}

impl MatchSpec {
    pub fn compile(&self) -> Result<Matcher, PipelineError> {
        match self {
            MatchSpec::Pattern(pattern) => Matcher::new(pattern, ""),
            MatchSpec::WithFlags(parts) => {
                let pattern = parts
                    .first()
                    .ok_or_else(|| PipelineError::Config("Empty match list".to_string()))?;
                let flags = parts.get(1).map(String::as_str).unwrap_or("");
                Matcher::new(pattern, flags)
            }
        }
    }
}

/// A single value or a list of values.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// Options passed to the minifier.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MinifyOptions {
    /// Collapse whitespace runs and drop whitespace between tags
    pub collapse_whitespace: bool,
    /// Drop `<!-- ... -->` comments
    pub remove_comments: bool,
}

impl Default for MinifyOptions {
    fn default() -> Self {
        Self {
            collapse_whitespace: true,
            remove_comments: false,
        }
    }
}

/// `minify` setting: a switch, or options (which imply enabled).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MinifySetting {
    Enabled(bool),
    Options(MinifyOptions),
}

impl MinifySetting {
    /// Options to minify with, or `None` when minification is disabled.
    pub fn options(&self) -> Option<MinifyOptions> {
        match self {
            MinifySetting::Enabled(true) => Some(MinifyOptions::default()),
            MinifySetting::Enabled(false) => None,
            MinifySetting::Options(opts) => Some(opts.clone()),
        }
    }
}

impl Default for MinifySetting {
    fn default() -> Self {
        MinifySetting::Enabled(false)
    }
}

impl From<bool> for MinifySetting {
    fn from(enabled: bool) -> Self {
        MinifySetting::Enabled(enabled)
    }
}

/// Session-wide configuration held by the registry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GlobalConfig {
    pub minify: MinifySetting,
    pub sourcemap: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            minify: MinifySetting::Enabled(false),
            sourcemap: true,
        }
    }
}

impl GlobalConfig {
    /// Shallow merge: every field present in `patch` replaces ours.
    pub fn merge(&mut self, patch: ConfigPatch) {
        if let Some(minify) = patch.minify {
            self.minify = minify;
        }
        if let Some(sourcemap) = patch.sourcemap {
            self.sourcemap = sourcemap;
        }
    }
}

/// Partial [`GlobalConfig`] for `set_config`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub minify: Option<MinifySetting>,
    pub sourcemap: Option<bool>,
}

impl ConfigPatch {
    pub fn minify(setting: impl Into<MinifySetting>) -> Self {
        Self {
            minify: Some(setting.into()),
            sourcemap: None,
        }
    }
}

/// Manifest file schema (`markmod.yaml`).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ManifestConfig {
    #[serde(rename = "match", default)]
    pub match_spec: Option<MatchSpec>,
    #[serde(default)]
    pub basedir: Option<PathBuf>,
    #[serde(default)]
    pub parsers: Option<OneOrMany<String>>,
    #[serde(default)]
    pub parser: Option<OneOrMany<String>>,
    #[serde(default)]
    pub processors: Option<OneOrMany<String>>,
    #[serde(default)]
    pub processor: Option<OneOrMany<String>>,
    #[serde(default)]
    pub pre: Option<OneOrMany<String>>,
    #[serde(default)]
    pub post: Option<OneOrMany<String>>,
    #[serde(default)]
    pub minify: Option<MinifySetting>,
    #[serde(default)]
    pub sourcemap: Option<bool>,
    #[serde(default)]
    pub live: Option<String>,
    #[serde(default)]
    pub remedy: Option<bool>,
    #[serde(default)]
    pub check_markup: Option<bool>,
}

fn named_refs(values: Option<OneOrMany<String>>) -> Vec<StageRef> {
    values
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .map(StageRef::Named)
        .collect()
}

/// Resolved configuration for one source file.
#[derive(Debug, Clone)]
pub struct FileConfig {
    /// Eligibility pattern; `None` means [`Matcher::default_markup`]
    pub matcher: Option<Matcher>,
    /// Base directory for path-like stage names; `None` means the session root
    pub basedir: Option<PathBuf>,
    pub parsers: Vec<StageRef>,
    pub processors: Vec<StageRef>,
    pub pre: Vec<StageRef>,
    pub post: Vec<StageRef>,
    pub minify: Option<MinifySetting>,
    pub sourcemap: Option<bool>,
    /// Push server reference (a NATS url for the bundled transport)
    pub live: Option<String>,
    pub remedy: bool,
    /// Only turn sources starting with `<` into modules
    pub check_markup: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            matcher: None,
            basedir: None,
            parsers: Vec::new(),
            processors: Vec::new(),
            pre: Vec::new(),
            post: Vec::new(),
            minify: None,
            sourcemap: None,
            live: None,
            remedy: false,
            check_markup: true,
        }
    }
}

impl FileConfig {
    /// Build from a parsed manifest. Relative `basedir` values are resolved
    /// against the manifest directory, which is also the default.
    pub fn from_manifest(
        manifest: ManifestConfig,
        manifest_dir: Option<&Path>,
    ) -> Result<Self, PipelineError> {
        let matcher = manifest.match_spec.as_ref().map(MatchSpec::compile).transpose()?;

        let basedir = match (manifest.basedir, manifest_dir) {
            (Some(dir), Some(base)) if dir.is_relative() => Some(base.join(dir)),
            (Some(dir), _) => Some(dir),
            (None, base) => base.map(Path::to_path_buf),
        };

        Ok(Self {
            matcher,
            basedir,
            parsers: named_refs(manifest.parsers.or(manifest.parser)),
            processors: named_refs(manifest.processors.or(manifest.processor)),
            pre: named_refs(manifest.pre),
            post: named_refs(manifest.post),
            minify: manifest.minify,
            sourcemap: manifest.sourcemap,
            live: manifest.live,
            remedy: manifest.remedy.unwrap_or(false),
            check_markup: manifest.check_markup.unwrap_or(true),
        })
    }

    pub fn from_yaml_str(contents: &str, manifest_dir: Option<&Path>) -> Result<Self, PipelineError> {
        let manifest: ManifestConfig = serde_yaml::from_str(contents)
            .map_err(|e| PipelineError::Config(format!("Failed to parse {}: {}", MANIFEST_NAME, e)))?;
        Self::from_manifest(manifest, manifest_dir)
    }

    /// Load a manifest file.
    pub async fn load(path: &Path) -> Result<Self, PipelineError> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            PipelineError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&contents, path.parent())
    }

    /// Find the nearest manifest above `file` and load it; defaults when none.
    pub async fn discover(file: &Path) -> Result<Self, PipelineError> {
        if let Some(dir) = file.parent() {
            for ancestor in dir.ancestors() {
                let candidate = ancestor.join(MANIFEST_NAME);
                if tokio::fs::try_exists(&candidate).await? {
                    tracing::debug!("Using manifest {} for {}", candidate.display(), file.display());
                    return Self::load(&candidate).await;
                }
            }
        }
        Ok(Self::default())
    }

    pub fn with_match(mut self, matcher: Matcher) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn with_basedir(mut self, basedir: impl Into<PathBuf>) -> Self {
        self.basedir = Some(basedir.into());
        self
    }

    pub fn with_parser(mut self, parser: impl Into<StageRef>) -> Self {
        self.parsers.push(parser.into());
        self
    }

    pub fn with_processor(mut self, processor: impl Into<StageRef>) -> Self {
        self.processors.push(processor.into());
        self
    }

    pub fn with_check_markup(mut self, check: bool) -> Self {
        self.check_markup = check;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matcher() {
        let matcher = Matcher::default_markup();
        assert!(matcher.is_match("a/b/source.html"));
        assert!(matcher.is_match("a/ICON.SVG"));
        assert!(!matcher.is_match("a/app.js"));
    }

    #[test]
    fn test_matcher_flags() {
        let plain = Matcher::new(r"\.myhtml$", "").unwrap();
        assert!(!plain.is_match("me.MYHTML"));

        let insensitive = Matcher::new(r"\.myhtml$", "i").unwrap();
        assert!(insensitive.is_match("me.MYHTML"));
        assert_eq!(insensitive.flags(), "i");

        assert!(Matcher::new(r"\.html$", "q").is_err());
        assert!(Matcher::new(r"(", "").is_err());
    }

    #[test]
    fn test_minify_setting_options() {
        assert_eq!(MinifySetting::Enabled(false).options(), None);
        assert_eq!(
            MinifySetting::Enabled(true).options(),
            Some(MinifyOptions::default())
        );
        let opts = MinifyOptions {
            collapse_whitespace: false,
            remove_comments: true,
        };
        assert_eq!(MinifySetting::Options(opts.clone()).options(), Some(opts));
    }

    #[test]
    fn test_global_config_merge_is_shallow() {
        let mut config = GlobalConfig::default();
        config.merge(ConfigPatch::minify(true));
        assert_eq!(config.minify, MinifySetting::Enabled(true));
        assert!(config.sourcemap);

        config.merge(ConfigPatch {
            minify: None,
            sourcemap: Some(false),
        });
        assert_eq!(config.minify, MinifySetting::Enabled(true));
        assert!(!config.sourcemap);
    }

    #[test]
    fn test_manifest_parsing() {
        let yaml = r#"
match: ['\.myhtml$', 'i']
parser: ./stages/md
processors:
  - trim
  - strip-comments
pre: strip-comments
minify:
  remove_comments: true
live: nats://localhost:4222
remedy: true
"#;
        let config = FileConfig::from_yaml_str(yaml, Some(Path::new("/proj"))).unwrap();

        let matcher = config.matcher.as_ref().unwrap();
        assert_eq!(matcher.pattern(), r"\.myhtml$");
        assert!(matcher.is_match("x.MYHTML"));
        assert_eq!(config.basedir, Some(PathBuf::from("/proj")));
        assert_eq!(config.parsers.len(), 1);
        assert_eq!(config.processors.len(), 2);
        assert_eq!(config.pre.len(), 1);
        assert!(config.post.is_empty());
        assert_eq!(
            config.minify.as_ref().and_then(MinifySetting::options),
            Some(MinifyOptions {
                collapse_whitespace: true,
                remove_comments: true,
            })
        );
        assert_eq!(config.live.as_deref(), Some("nats://localhost:4222"));
        assert!(config.remedy);
        assert!(config.check_markup);
    }

    #[test]
    fn test_plural_keys_win_over_singular() {
        let yaml = "parsers: [a, b]\nparser: c\n";
        let config = FileConfig::from_yaml_str(yaml, None).unwrap();
        match &config.parsers[..] {
            [StageRef::Named(a), StageRef::Named(b)] => {
                assert_eq!(a, "a");
                assert_eq!(b, "b");
            }
            other => panic!("unexpected parsers: {:?}", other),
        }
    }

    #[test]
    fn test_relative_basedir_resolved_against_manifest() {
        let yaml = "basedir: stages\n";
        let config = FileConfig::from_yaml_str(yaml, Some(Path::new("/proj"))).unwrap();
        assert_eq!(config.basedir, Some(PathBuf::from("/proj/stages")));
    }

    #[tokio::test]
    async fn test_discover_walks_up_to_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_NAME), "match: '\\.tpl$'\n").unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let config = FileConfig::discover(&nested.join("page.tpl")).await.unwrap();
        assert_eq!(config.matcher.unwrap().pattern(), r"\.tpl$");
        assert_eq!(config.basedir, Some(dir.path().to_path_buf()));
    }

    #[tokio::test]
    async fn test_discover_without_manifest_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig::discover(&dir.path().join("page.html")).await.unwrap();
        assert!(config.matcher.is_none());
        assert!(config.parsers.is_empty());
    }
}
