use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::{AutoCutError, Result};

pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["wav", "mp3", "ogg", "flac"];
pub const SFX_TAG_PREFIX: &str = "sfx:";

/// Sound effect available to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SfxItem {
    pub name: String,
    pub path: PathBuf,
    /// Seconds; `0.0` when the file could not be probed.
    pub duration: f64,
    pub tags: Vec<String>,
}

impl SfxItem {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, duration: f64) -> Self {
        let name = name.into();
        Self {
            tags: tags_for_name(&name),
            name,
            path: path.into(),
            duration,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.tags.iter().any(|candidate| *candidate == tag)
    }
}

/// Lower-cased, deduplicated and sorted tokens of an underscore separated name.
pub fn tags_for_name(name: &str) -> Vec<String> {
    name.replace('_', " ")
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Reads the playback length of an audio file.
pub trait DurationProbe: Send + Sync {
    fn duration(&self, path: &Path) -> Result<f64>;
}

/// [`DurationProbe`] backed by the `ffprobe` binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfprobeDuration;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

impl DurationProbe for FfprobeDuration {
    fn duration(&self, path: &Path) -> Result<f64> {
        let output = Command::new("ffprobe")
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() {
            return Err(AutoCutError::analysis(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
        probe
            .format
            .duration
            .as_deref()
            .and_then(|raw| raw.parse::<f64>().ok())
            .ok_or_else(|| AutoCutError::analysis("ffprobe reported no duration"))
    }
}

type Index = BTreeMap<String, Arc<SfxItem>>;

/// Name indexed catalog of the sound effects found under a directory tree.
///
/// Readers take a snapshot of the current index; [`SfxCatalog::reload`]
/// builds a replacement off-lock and swaps it in, so a concurrent reader sees
/// either the old or the new index in full.
pub struct SfxCatalog {
    root: PathBuf,
    probe: Box<dyn DurationProbe>,
    index: RwLock<Arc<Index>>,
    rng: Mutex<StdRng>,
}

impl SfxCatalog {
    /// Opens the catalog rooted at `root` using `ffprobe` for durations and an
    /// entropy seeded random source.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with(root, FfprobeDuration, StdRng::from_entropy())
    }

    /// Like [`SfxCatalog::open`] but with a reproducible random source.
    pub fn with_seed(root: impl Into<PathBuf>, seed: u64) -> Result<Self> {
        Self::open_with(root, FfprobeDuration, StdRng::seed_from_u64(seed))
    }

    /// Opens the catalog with explicit collaborators. The root directory is
    /// created when missing.
    pub fn open_with<P>(root: impl Into<PathBuf>, probe: P, rng: StdRng) -> Result<Self>
    where
        P: DurationProbe + 'static,
    {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let catalog = Self {
            root,
            probe: Box::new(probe),
            index: RwLock::new(Arc::new(Index::new())),
            rng: Mutex::new(rng),
        };
        catalog.reload()?;
        Ok(catalog)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rescans the root directory and replaces the index. Returns the number
    /// of cataloged items.
    pub fn reload(&self) -> Result<usize> {
        let mut files = collect_audio_files(&self.root)?;
        files.sort();

        let mut index = Index::new();
        for path in files {
            let Some(name) = path.file_stem().map(|stem| stem.to_string_lossy().into_owned()) else {
                continue;
            };
            let duration = match self.probe.duration(&path) {
                Ok(duration) => duration,
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = %err, "failed to read sfx duration");
                    0.0
                }
            };
            index.insert(name.clone(), Arc::new(SfxItem::new(name, path, duration)));
        }

        let count = index.len();
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(index);
        tracing::info!(root = %self.root.display(), items = count, "reloaded sfx catalog");
        Ok(count)
    }

    fn snapshot(&self) -> Arc<Index> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// All items, sorted by name.
    pub fn list(&self) -> Vec<Arc<SfxItem>> {
        self.snapshot().values().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<SfxItem>> {
        self.snapshot().get(name).cloned()
    }

    /// Samples an item carrying `tag`, or any item when no tag is given or
    /// nothing carries it. `None` only for an empty catalog.
    pub fn get_random(&self, tag: Option<&str>) -> Option<Arc<SfxItem>> {
        let index = self.snapshot();
        if let Some(item) = tag.and_then(|tag| self.choose_tagged(&index, tag)) {
            return Some(item);
        }
        let all: Vec<&Arc<SfxItem>> = index.values().collect();
        self.choose(&all)
    }

    /// Resolves an `sfx:<name>` effect tag by exact name, then by sampling the
    /// items tagged `<name>`. Other tags resolve to nothing.
    pub fn resolve_effect_tag(&self, tag: &str) -> Option<Arc<SfxItem>> {
        let name = tag.strip_prefix(SFX_TAG_PREFIX)?;
        let index = self.snapshot();
        index
            .get(name)
            .cloned()
            .or_else(|| self.choose_tagged(&index, name))
    }

    /// Writes the catalog as `{"items": [...]}` pretty JSON.
    pub fn export(&self, output_path: impl AsRef<Path>) -> Result<()> {
        let output_path = output_path.as_ref();
        let items = self.list();
        let payload = CatalogExport {
            items: items.iter().map(|item| item.as_ref()).collect(),
        };
        std::fs::write(output_path, serde_json::to_string_pretty(&payload)?)?;
        tracing::info!(items = items.len(), path = %output_path.display(), "exported sfx catalog");
        Ok(())
    }

    fn choose_tagged(&self, index: &Index, tag: &str) -> Option<Arc<SfxItem>> {
        let matching: Vec<&Arc<SfxItem>> = index.values().filter(|item| item.has_tag(tag)).collect();
        self.choose(&matching)
    }

    fn choose(&self, candidates: &[&Arc<SfxItem>]) -> Option<Arc<SfxItem>> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        candidates.choose(&mut *rng).map(|item| Arc::clone(*item))
    }
}

impl fmt::Debug for SfxCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SfxCatalog")
            .field("root", &self.root)
            .field("items", &self.len())
            .finish()
    }
}

#[derive(Serialize)]
struct CatalogExport<'a> {
    items: Vec<&'a SfxItem>,
}

/// Supported audio files under `root`. Symlinked directories are not
/// descended into; only a failure to read `root` itself is an error.
fn collect_audio_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(std::io::Error::from(err).into()),
            Err(err) => {
                tracing::warn!(root = %root.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_dir() && entry.path().is_file() && is_supported(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}
