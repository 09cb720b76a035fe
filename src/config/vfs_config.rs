use std::borrow::Cow;
use std::path::{Path, PathBuf};

use compio::fs;
use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use tracing::{debug, info};

use crate::ext::BestEffortPathExt;

const CONFIG_FILE_NAME: &str = "snapcache.yaml";
const DEFAULT_EXCLUDES_KEY: &str = "defaultExcludes";

/// Entries skipped by every directory walk unless the config says otherwise.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    // Miscellaneous typical temporary files
    "*~",
    "#*#",
    ".#*",
    "%*%",
    "._*",
    // CVS
    "CVS",
    ".cvsignore",
    // Subversion
    ".svn",
    // Git
    ".git",
    ".gitattributes",
    ".gitignore",
    // Mercurial
    ".hg",
    ".hgignore",
    ".hgsub",
    ".hgsubstate",
    ".hgtags",
    // Bazaar
    ".bzr",
    ".bzrignore",
    // SCCS
    "SCCS",
    "vssver.scc",
    // Mac
    ".DS_Store",
];

fn get_config_file_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfsConfig {
    default_excludes: Vec<String>,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            default_excludes: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl VfsConfig {
    /// Reads `snapcache.yaml` from the project root, falling back to the
    /// defaults when the project does not have one.
    pub async fn read(root: &Path) -> Result<Self, VfsConfigError> {
        let path = get_config_file_path(root);
        match Self::from_path(&path).await {
            Err(VfsConfigError::ReadError { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                info!(
                    "No {} found in {}, using default excludes",
                    CONFIG_FILE_NAME,
                    root.best_effort_path_display()
                );
                Ok(Self::default())
            }
            result => result,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self, VfsConfigError> {
        debug!("Reading config file: {}", path.best_effort_path_display());
        let bytes = fs::read(path).await.context(ReadSnafu {
            file_path: path.best_effort_path_display(),
        })?;
        debug!("Successfully read config file: {} bytes", bytes.len());

        let contents = String::from_utf8(bytes).context(EncodingSnafu {
            file_path: path.best_effort_path_display(),
        })?;
        contents.as_str().try_into()
    }

    pub fn default_excludes(&self) -> &[String] {
        &self.default_excludes
    }

    fn parse_default_excludes(
        top_level: &LinkedHashMap<Yaml, Yaml>,
    ) -> Result<Option<Vec<String>>, VfsConfigError> {
        let Some(excludes) =
            top_level.get(&Yaml::Value(Scalar::String(Cow::Borrowed(DEFAULT_EXCLUDES_KEY))))
        else {
            return Ok(None);
        };

        let excludes = excludes
            .as_sequence()
            .ok_or(VfsConfigError::ExcludesNotSequence)?
            .iter()
            .filter_map(|item| {
                let pattern = item.as_str().map(|s| s.to_string());
                if pattern.is_none() {
                    debug!("Skipping non-string exclude entry: {:?}", item);
                }
                pattern
            })
            .collect();

        Ok(Some(excludes))
    }
}

impl TryFrom<&str> for VfsConfig {
    type Error = VfsConfigError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let contents_vec = Yaml::load_from_str(contents)
            .map_err(|e| VfsConfigError::ParseError { source: e })?;
        let contents = contents_vec
            .first()
            .ok_or(VfsConfigError::MalformedConfig)?;

        let top_level = contents
            .as_mapping()
            .ok_or(VfsConfigError::TopLevelNotMap)?;

        Ok(match Self::parse_default_excludes(top_level)? {
            Some(default_excludes) => VfsConfig { default_excludes },
            None => VfsConfig::default(),
        })
    }
}

#[derive(Debug, Snafu)]
pub enum VfsConfigError {
    #[snafu(display("Failed to read the config file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("The config file {} is not valid UTF-8", file_path))]
    EncodingError {
        file_path: String,
        source: std::string::FromUtf8Error,
    },
    #[snafu(display("Failed to parse the config file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Improperly formatted config file"))]
    MalformedConfig,
    #[snafu(display("Top level of config should be a map"))]
    TopLevelNotMap,
    #[snafu(display("{} should be a list of file name patterns", DEFAULT_EXCLUDES_KEY))]
    ExcludesNotSequence,
}
