//! Ordered header catalogue.
//!
//! Matching tries codecs in registration order; the catch-all (raw payload by default)
//! is always tried last, whatever order the builder calls came in. A registry is
//! immutable once built.

use crate::header::{FieldKind, HeaderCodec, Probe};
use crate::headers;
use std::fmt;
use std::sync::Arc;

/// Describable metadata of one codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecSchema {
    pub id: &'static str,
    pub name: &'static str,
    pub nickname: &'static str,
    pub protocol: bool,
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub path: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

#[derive(Clone)]
pub struct HeaderRegistry {
    ordered: Vec<Arc<dyn HeaderCodec>>,
    catch_all: Option<Arc<dyn HeaderCodec>>,
}

impl fmt::Debug for HeaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter().map(|c| c.id())).finish()
    }
}

impl Default for HeaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl HeaderRegistry {
    /// Built-in catalogue with the raw payload as catch-all.
    pub fn with_defaults() -> Self {
        RegistryBuilder::with_defaults().build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Matching order: registered codecs, then the catch-all.
    pub fn iter(&self) -> impl Iterator<Item = &dyn HeaderCodec> + '_ {
        self.ordered
            .iter()
            .chain(self.catch_all.iter())
            .map(|c| c.as_ref())
    }

    pub fn len(&self) -> usize {
        self.ordered.len() + usize::from(self.catch_all.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find(&self, id: &str) -> Option<&dyn HeaderCodec> {
        self.iter().find(|c| c.id() == id)
    }

    pub fn catch_all(&self) -> Option<&dyn HeaderCodec> {
        self.catch_all.as_deref()
    }

    /// First codec accepting the probe.
    pub fn select(&self, probe: &Probe<'_>) -> Option<&dyn HeaderCodec> {
        self.iter().find(|c| c.matches(probe))
    }

    pub fn schemas(&self) -> Vec<CodecSchema> {
        self.iter()
            .map(|c| {
                let s = c.schema();
                CodecSchema {
                    id: s.id,
                    name: s.name,
                    nickname: s.nickname,
                    protocol: s.is_protocol,
                    fields: s
                        .fields
                        .iter()
                        .map(|f| FieldSchema {
                            path: f.path,
                            label: f.label,
                            kind: f.kind,
                        })
                        .collect(),
                }
            })
            .collect()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    ordered: Vec<Arc<dyn HeaderCodec>>,
    catch_all: Option<Arc<dyn HeaderCodec>>,
}

impl RegistryBuilder {
    /// Empty builder: no codecs, no catch-all.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut builder = Self::new();
        for codec in headers::default_codecs() {
            builder.ordered.push(codec);
        }
        builder.catch_all(headers::raw::RawData)
    }

    /// Append a codec to the matching order.
    pub fn register<C: HeaderCodec + 'static>(mut self, codec: C) -> Self {
        self.ordered.push(Arc::new(codec));
        self
    }

    /// Swap the codec with the same id in place, or append it when there is none.
    pub fn replace<C: HeaderCodec + 'static>(mut self, codec: C) -> Self {
        let codec: Arc<dyn HeaderCodec> = Arc::new(codec);
        match self.ordered.iter().position(|c| c.id() == codec.id()) {
            Some(i) => self.ordered[i] = codec,
            None => self.ordered.push(codec),
        }
        self
    }

    /// Drop the codec with this id, catch-all included.
    pub fn remove(mut self, id: &str) -> Self {
        self.ordered.retain(|c| c.id() != id);
        if self.catch_all.as_ref().is_some_and(|c| c.id() == id) {
            self.catch_all = None;
        }
        self
    }

    pub fn catch_all<C: HeaderCodec + 'static>(mut self, codec: C) -> Self {
        self.catch_all = Some(Arc::new(codec));
        self
    }

    pub fn build(self) -> HeaderRegistry {
        let mut ordered = self.ordered;
        if let Some(catch_all) = &self.catch_all {
            ordered.retain(|c| c.id() != catch_all.id());
        }
        HeaderRegistry {
            ordered,
            catch_all: self.catch_all,
        }
    }
}
