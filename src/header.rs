// Column-name storage for the header probe.
//
// Names are packed into one backing buffer. For columns whose escaped
// (as-written) and unescaped forms differ, both are kept so a later
// trimming policy can select either variant without re-scanning the source.

/// One column's entry: unescaped span, plus the raw span when it differs.
#[derive(Debug, Clone, Copy)]
struct NameEntry {
    unescaped: (usize, usize),
    raw: Option<(usize, usize)>,
}

/// Packed dual-encoding store of probed column names.
#[derive(Debug, Default)]
pub struct ColumnNames {
    data: Vec<u8>,
    entries: Vec<NameEntry>,
}

impl ColumnNames {
    pub fn new() -> Self {
        ColumnNames::default()
    }

    /// Append a column. `raw` is stored only when it differs from the
    /// unescaped text.
    pub fn push(&mut self, unescaped: &[u8], raw: &[u8]) {
        let u_start = self.data.len();
        self.data.extend_from_slice(unescaped);
        let raw_span = if raw != unescaped {
            let r_start = self.data.len();
            self.data.extend_from_slice(raw);
            Some((r_start, raw.len()))
        } else {
            None
        };
        self.entries.push(NameEntry {
            unescaped: (u_start, unescaped.len()),
            raw: raw_span,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unescaped name of column `index`.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.entries
            .get(index)
            .map(|e| &self.data[e.unescaped.0..e.unescaped.0 + e.unescaped.1])
    }

    /// Name as written in the source (quotes and escapes intact). Falls
    /// back to the unescaped text when both forms coincide.
    pub fn raw(&self, index: usize) -> Option<&[u8]> {
        self.entries.get(index).map(|e| match e.raw {
            Some((start, len)) => &self.data[start..start + len],
            None => &self.data[e.unescaped.0..e.unescaped.0 + e.unescaped.1],
        })
    }

    /// Ordinal lookup by unescaped name.
    pub fn index_of(&self, name: &[u8]) -> Option<usize> {
        (0..self.len()).find(|&i| self.get(i) == Some(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        (0..self.len()).map(move |i| self.get(i).unwrap_or(&[]))
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.entries.clear();
    }
}
