use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Global string interner for drawing ids and brush keys. Cheap copies,
/// O(1) comparisons, stable across the session.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Produce an id string that has never been interned before.
fn fresh_name(prefix: &str) -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    loop {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let candidate = format!("{prefix}_{n}");
        // Loaded projects carry arbitrary ids; skip any we have already seen.
        if INTERNER.get(&candidate).is_none() {
            return candidate;
        }
    }
}

/// Opaque identity of a drawing. Survives renames, resizes and reloads.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawingId(Spur);

impl DrawingId {
    /// Intern a string as a DrawingId, or return the existing one.
    pub fn intern(s: &str) -> Self {
        DrawingId(INTERNER.get_or_intern(s))
    }

    pub fn as_str(&self) -> &'static str {
        INTERNER.resolve(&self.0)
    }

    /// Generate an id no other drawing in this process uses.
    pub fn fresh() -> Self {
        Self::intern(&fresh_name("drawing"))
    }
}

/// Key of a palette-text brush in the project's brush table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BrushKey(Spur);

impl BrushKey {
    pub fn intern(s: &str) -> Self {
        BrushKey(INTERNER.get_or_intern(s))
    }

    pub fn as_str(&self) -> &'static str {
        INTERNER.resolve(&self.0)
    }
}

impl fmt::Debug for DrawingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for DrawingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Debug for BrushKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "brush:{}", self.as_str())
    }
}

impl Serialize for DrawingId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DrawingId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(DrawingId::intern(&s))
    }
}
