use {
    remoting_query::{Op, Predicate},
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// Anything other than a case-insensitive `DESC` sorts ascending.
    pub fn parse(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: Direction,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// A lazily-described set of records: an optional base scope, a filter,
/// an ordering, and an optional `(offset, size)` window.
///
/// Record stores interpret a collection when it is fetched or counted;
/// building one performs no I/O.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub scope: Option<Predicate>,
    pub filter: Predicate,
    pub order: Vec<SortSpec>,
    pub window: Option<(u64, u64)>,
}

impl Collection {
    /// Every record of the type.
    pub fn all() -> Self {
        Self {
            scope: None,
            filter: Predicate::True,
            order: Vec::new(),
            window: None,
        }
    }

    pub fn scoped(scope: Predicate) -> Self {
        Self {
            scope: Some(scope),
            ..Self::all()
        }
    }

    /// Records whose identity is one of `ids`. An empty list selects nothing.
    pub fn with_ids(id_field: &str, ids: Vec<Value>) -> Self {
        Self::scoped(Predicate::comparison(id_field, Op::In, Value::Array(ids)))
    }

    /// Narrow the collection; filters accumulate conjunctively.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        let current = std::mem::replace(&mut self.filter, Predicate::True);
        self.filter = Predicate::and([current, predicate]);
        self
    }

    pub fn order_by(mut self, order: Vec<SortSpec>) -> Self {
        self.order = order;
        self
    }

    pub fn page(mut self, offset: u64, size: u64) -> Self {
        self.window = Some((offset, size));
        self
    }

    /// Same selection without ordering or window; used for counting.
    pub fn unpaged(&self) -> Self {
        Self {
            scope: self.scope.clone(),
            filter: self.filter.clone(),
            order: Vec::new(),
            window: None,
        }
    }

    /// The full selection predicate, scope and filter combined.
    pub fn predicate(&self) -> Predicate {
        match &self.scope {
            Some(scope) => Predicate::and([scope.clone(), self.filter.clone()]),
            None => self.filter.clone(),
        }
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self::all()
    }
}
