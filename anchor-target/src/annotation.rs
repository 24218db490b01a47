//! Raw per-image annotation records and the stores serving them.

use crate::common::*;

/// One labeled object as written in the annotation file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObject {
    /// The category name, e.g. `person` or `people`.
    #[serde(rename = "lbl")]
    pub label: String,
    /// The full box in `[x, y, w, h]` pixels. A field of any other shape
    /// is read as empty.
    #[serde(default, deserialize_with = "deserialize_numbers")]
    pub pos: Vec<f64>,
    #[serde(rename = "occl", default, deserialize_with = "deserialize_flag")]
    pub occluded: bool,
    /// The visible part of an occluded object.
    #[serde(rename = "posv", default)]
    pub visible: Option<VisibleRegion>,
}

impl RawObject {
    /// The full box, or `None` if the field does not hold four numbers.
    pub fn full_box(&self) -> Option<[f64; 4]> {
        <[f64; 4]>::try_from(self.pos.as_slice()).ok()
    }
}

/// The visible region of an object.
///
/// The annotation files store an integer in place of a box when the
/// visible part is unknown. Anything else is kept as `Invalid` so that one
/// bad record does not fail the whole file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VisibleRegion {
    Box([f64; 4]),
    Sentinel(i64),
    Invalid(serde_json::Value),
}

/// Identifies one frame by its set, sequence and frame number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct FrameId {
    pub set: usize,
    pub seq: usize,
    pub frame: usize,
}

impl FrameId {
    pub fn new(set: usize, seq: usize, frame: usize) -> Self {
        Self { set, seq, frame }
    }

    /// A relative path stem like `set01/V002.seq/30`.
    pub fn path_stem(&self) -> PathBuf {
        PathBuf::from(format!("set{:02}", self.set))
            .join(format!("V{:03}.seq", self.seq))
            .join(self.frame.to_string())
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "set{:02}/V{:03}/{}", self.set, self.seq, self.frame)
    }
}

/// Read-only source of per-frame annotations.
pub trait AnnotationStore {
    /// All annotated frames in ascending order.
    fn frames(&self) -> Vec<FrameId>;

    /// Objects of the frame. Unknown frames have no objects.
    fn objects(&self, frame: &FrameId) -> &[RawObject];
}

/// Annotations in the Caltech pedestrian JSON layout.
///
/// The file nests `set{:02}` → `V{:03}` → `frames` → frame number → objects.
#[derive(Debug, Clone, Default)]
pub struct CaltechAnnotations {
    frames: IndexMap<FrameId, Vec<RawObject>>,
}

#[derive(Debug, Deserialize)]
struct SequenceEntry {
    #[serde(default)]
    frames: HashMap<String, Vec<RawObject>>,
}

impl CaltechAnnotations {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let reader = BufReader::new(
            File::open(path)
                .with_context(|| format!("failed to open annotation file '{}'", path.display()))?,
        );
        let sets: HashMap<String, HashMap<String, SequenceEntry>> = serde_json::from_reader(reader)
            .with_context(|| format!("failed to parse annotation file '{}'", path.display()))?;
        let annotations = Self::from_sets(sets)?;
        info!(
            "loaded {} annotated frames from '{}'",
            annotations.frames.len(),
            path.display()
        );
        Ok(annotations)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let sets: HashMap<String, HashMap<String, SequenceEntry>> = serde_json::from_str(text)?;
        Self::from_sets(sets)
    }

    pub fn from_frames<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = (FrameId, Vec<RawObject>)>,
    {
        let mut frames: IndexMap<_, _> = frames.into_iter().collect();
        frames.sort_keys();
        Self { frames }
    }

    fn from_sets(sets: HashMap<String, HashMap<String, SequenceEntry>>) -> Result<Self> {
        let frames: Vec<_> = sets
            .into_iter()
            .map(|(set_key, sequences)| -> Result<_> {
                let set = parse_key(&set_key, "set")?;
                let frames: Vec<_> = sequences
                    .into_iter()
                    .map(|(seq_key, entry)| -> Result<_> {
                        let seq = parse_key(&seq_key, "V")?;
                        entry
                            .frames
                            .into_iter()
                            .map(|(frame_key, objects)| -> Result<_> {
                                let frame: usize = frame_key.parse().with_context(|| {
                                    format!("invalid frame number '{}'", frame_key)
                                })?;
                                Ok((FrameId { set, seq, frame }, objects))
                            })
                            .collect::<Result<Vec<_>>>()
                    })
                    .flatten_ok()
                    .collect::<Result<_>>()?;
                Ok(frames)
            })
            .flatten_ok()
            .collect::<Result<_>>()?;

        Ok(Self::from_frames(frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl AnnotationStore for CaltechAnnotations {
    fn frames(&self) -> Vec<FrameId> {
        self.frames.keys().cloned().collect()
    }

    fn objects(&self, frame: &FrameId) -> &[RawObject] {
        self.frames
            .get(frame)
            .map(|objects| objects.as_slice())
            .unwrap_or(&[])
    }
}

fn parse_key(key: &str, prefix: &str) -> Result<usize> {
    let number = key
        .strip_prefix(prefix)
        .ok_or_else(|| format_err!("expect a key starting with '{}', but get '{}'", prefix, key))?;
    let number = number
        .parse()
        .with_context(|| format!("invalid number in key '{}'", key))?;
    Ok(number)
}

fn deserialize_numbers<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Field {
        Numbers(Vec<f64>),
        Other(serde_json::Value),
    }

    Ok(match Field::deserialize(deserializer)? {
        Field::Numbers(numbers) => numbers,
        Field::Other(_) => vec![],
    })
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(flag) => flag,
        Flag::Int(value) => value != 0,
    })
}
