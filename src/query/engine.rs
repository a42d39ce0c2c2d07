//! Query execution against the tag inverted index.

use super::parser::ParsedQuery;
use super::rows::FileRow;
use crate::codec::{PolytaxisCodec, TagCodec};
use crate::error::{ApiError, StorageError};
use crate::store::IndexStore;
use crate::types::{NodeId, TagMap};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};
use std::collections::VecDeque;
use std::path::PathBuf;
use tracing::{debug, trace};

/// Rows fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Autocomplete matching mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TagSearch {
    /// Tags starting with the argument
    Prefix,
    /// Tags containing the argument
    Anywhere,
}

/// Read-side session over an [`IndexStore`].
pub struct QueryEngine<'a, C: TagCodec = PolytaxisCodec> {
    store: &'a IndexStore,
    codec: C,
    page_size: usize,
}

impl<'a> QueryEngine<'a, PolytaxisCodec> {
    pub fn new(store: &'a IndexStore) -> Self {
        Self::with_codec(store, PolytaxisCodec)
    }
}

impl<'a, C: TagCodec> QueryEngine<'a, C> {
    pub fn with_codec(store: &'a IndexStore, codec: C) -> Self {
        Self {
            store,
            codec,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Files matching the include and exclude sets of `query`, in id order.
    ///
    /// Comparison filters and sorting are post-passes left to the caller
    /// (see [`super::rows`]). Pages are fetched as the iterator advances.
    pub fn files(&self, query: &ParsedQuery) -> FileQuery<'_, 'a, C> {
        let (sql, params) = compile(query);
        debug!(%sql, terms = params.len(), "Compiled query");
        FileQuery {
            engine: self,
            pager: Pager::new(sql, params, self.page_size),
        }
    }

    /// Distinct tags matching `arg`, ascending.
    pub fn tags(&self, search: TagSearch, arg: &str) -> TagQuery<'_, 'a, C> {
        let escaped = escape_like(arg);
        let pattern = match search {
            TagSearch::Prefix => format!("{}%", escaped),
            TagSearch::Anywhere => format!("%{}%", escaped),
        };
        TagQuery {
            engine: self,
            pager: Pager::new(
                "SELECT DISTINCT tag FROM tags WHERE tag LIKE ? ESCAPE '\\' ORDER BY tag ASC"
                    .to_string(),
                vec![Value::Text(pattern)],
                self.page_size,
            ),
        }
    }

    /// Absolute path of an indexed node.
    pub fn path(&self, id: NodeId) -> Result<String, StorageError> {
        self.store.reconstruct_path(id)
    }

    fn row(&self, id: NodeId) -> Result<Option<FileRow>, ApiError> {
        let found: Option<(String, Option<String>)> = self
            .store
            .conn()
            .prepare_cached("SELECT segment, tags FROM files WHERE id = ?1")
            .map_err(StorageError::from)?
            .query_row(params![id], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()
            .map_err(StorageError::from)?;
        let Some((segment, blob)) = found else {
            // Removed between the page and this lookup.
            return Ok(None);
        };
        let tags = match blob {
            Some(blob) => self
                .codec
                .decode(&blob)
                .map_err(|source| ApiError::CodecError {
                    path: PathBuf::from(&segment),
                    source,
                })?,
            None => TagMap::new(),
        };
        Ok(Some(FileRow { id, segment, tags }))
    }
}

/// Build the set-algebra query for `query`. Every user string is a parameter.
fn compile(query: &ParsedQuery) -> (String, Vec<Value>) {
    if query.is_unrestricted() {
        return (
            "SELECT id FROM files WHERE tags IS NOT NULL ORDER BY id".to_string(),
            Vec::new(),
        );
    }

    let mut params = Vec::new();
    let mut fragment = |tag: &str| {
        params.push(Value::Text(tag.to_string()));
        if tag.contains('%') {
            "SELECT DISTINCT file FROM tags WHERE tag LIKE ?"
        } else {
            "SELECT DISTINCT file FROM tags WHERE tag = ?"
        }
    };

    let mut sql = if query.includes.is_empty() {
        "SELECT file FROM tags".to_string()
    } else {
        query
            .includes
            .iter()
            .map(|tag| fragment(tag))
            .collect::<Vec<_>>()
            .join(" INTERSECT ")
    };
    for tag in &query.excludes {
        sql.push_str(" EXCEPT ");
        sql.push_str(fragment(tag));
    }
    sql.push_str(" ORDER BY 1");
    (sql, params)
}

fn escape_like(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len());
    for c in arg.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Fixed-size LIMIT/OFFSET paging over a single-column query.
struct Pager<T> {
    sql: String,
    params: Vec<Value>,
    page_size: usize,
    offset: usize,
    buffer: VecDeque<T>,
    exhausted: bool,
    pages_fetched: usize,
}

impl<T: rusqlite::types::FromSql> Pager<T> {
    fn new(sql: String, params: Vec<Value>, page_size: usize) -> Self {
        Self {
            sql: format!("{} LIMIT ? OFFSET ?", sql),
            params,
            page_size,
            offset: 0,
            buffer: VecDeque::new(),
            exhausted: false,
            pages_fetched: 0,
        }
    }

    fn fetch(&mut self, store: &IndexStore) -> Result<(), StorageError> {
        let mut values = self.params.clone();
        values.push(Value::Integer(self.page_size as i64));
        values.push(Value::Integer(self.offset as i64));
        let mut stmt = store.conn().prepare_cached(&self.sql)?;
        let page = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<T>>>()?;
        self.pages_fetched += 1;
        self.offset += self.page_size;
        trace!(page = self.pages_fetched, rows = page.len(), "Fetched page");
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        self.buffer.extend(page);
        Ok(())
    }

    fn next(&mut self, store: &IndexStore) -> Option<Result<T, StorageError>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fetch(store) {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }
}

/// Lazy iterator over matching files.
pub struct FileQuery<'e, 'a, C: TagCodec> {
    engine: &'e QueryEngine<'a, C>,
    pager: Pager<NodeId>,
}

impl<C: TagCodec> FileQuery<'_, '_, C> {
    /// Pages requested from storage so far.
    pub fn pages_fetched(&self) -> usize {
        self.pager.pages_fetched
    }
}

impl<C: TagCodec> Iterator for FileQuery<'_, '_, C> {
    type Item = Result<FileRow, ApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = match self.pager.next(self.engine.store)? {
                Ok(id) => id,
                Err(e) => return Some(Err(e.into())),
            };
            match self.engine.row(id) {
                Ok(Some(row)) => return Some(Ok(row)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Lazy iterator over autocomplete results.
pub struct TagQuery<'e, 'a, C: TagCodec> {
    engine: &'e QueryEngine<'a, C>,
    pager: Pager<String>,
}

impl<C: TagCodec> TagQuery<'_, '_, C> {
    pub fn pages_fetched(&self) -> usize {
        self.pager.pages_fetched
    }
}

impl<C: TagCodec> Iterator for TagQuery<'_, '_, C> {
    type Item = Result<String, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pager.next(self.engine.store)
    }
}
