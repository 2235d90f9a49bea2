//! Read-query shaping: sorting and paging woven into base pattern queries.
//!
//! Base queries bind nodes to `n`, relationships to `r` and paths to `p`.
//! Sort properties are written against the `$` placeholder, which is bound to
//! `n`, or to `r` when a relationship pattern's `r` is still in scope after
//! the woven clause (path queries and existing `WITH n` clauses).

use std::fmt;

use graphsync_core::{ResultShape, Statement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Ordered list of sort properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortOrder {
    clauses: Vec<(String, SortDirection)>,
}

impl SortOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sort ascending by each of `properties`.
    pub fn add<I, S>(self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_with(SortDirection::Asc, properties)
    }

    pub fn add_with<I, S>(mut self, direction: SortDirection, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clauses
            .extend(properties.into_iter().map(|p| (p.into(), direction)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Renders ` ORDER BY $.a,$.b DESC`, or nothing when empty.
impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return Ok(());
        }
        f.write_str(" ORDER BY ")?;
        for (i, (property, direction)) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "$.{property}")?;
            if *direction == SortDirection::Desc {
                f.write_str(" DESC")?;
            }
        }
        Ok(())
    }
}

/// Zero-based page of fixed size, or an explicit offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    offset: usize,
    limit: usize,
}

impl Pagination {
    pub fn new(page: usize, size: usize) -> Self {
        Self {
            offset: page * size,
            limit: size,
        }
    }

    pub fn with_offset(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }
}

impl fmt::Display for Pagination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " SKIP {} LIMIT {}", self.offset, self.limit)
    }
}

/// A parameterised read query with optional sorting and paging.
#[derive(Debug, Clone, PartialEq)]
pub struct CypherQuery {
    cypher: String,
    parameters: serde_json::Map<String, serde_json::Value>,
    sort: SortOrder,
    page: Option<Pagination>,
}

impl CypherQuery {
    pub fn new(
        cypher: impl Into<String>,
        parameters: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            cypher: cypher.into(),
            parameters,
            sort: SortOrder::default(),
            page: None,
        }
    }

    pub fn sorted(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn paged(mut self, page: Pagination) -> Self {
        self.page = Some(page);
        self
    }

    pub fn parameters(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.parameters
    }

    /// The query text with sorting and paging applied.
    pub fn statement(&self) -> String {
        let stmt = self.cypher.trim();
        let sorting = self.sort.to_string();
        let paging = self.page.map(|p| p.to_string()).unwrap_or_default();
        if sorting.is_empty() && paging.is_empty() {
            return stmt.to_string();
        }

        let relationship = stmt.contains(")-[r");
        let bind = |var: &str| sorting.replace('$', var);

        if let Some(start) = stmt.find("WITH n") {
            // The existing WITH clause runs up to the next MATCH or RETURN.
            let end = [" MATCH", " RETURN"]
                .iter()
                .filter_map(|clause| stmt[start..].find(clause))
                .min()
                .map_or(stmt.len(), |offset| start + offset);
            let with_clause = &stmt[start..end];
            let mut rewritten = with_clause.to_string();
            if relationship && !with_clause.contains(",r") {
                rewritten.push_str(",r");
            }
            let sorting = bind(if relationship { "r" } else { "n" });
            return stmt.replace(with_clause, &format!("{rewritten}{sorting}{paging}"));
        }

        // Only path queries carry `r` past the woven WITH clause.
        let (with_clause, sorting) = match (stmt.starts_with("MATCH p=("), relationship) {
            (true, true) => ("WITH p,r", bind("r")),
            (true, false) => ("WITH p", bind("n")),
            (false, _) => ("WITH n", bind("n")),
        };
        stmt.replace("RETURN ", &format!("{with_clause}{sorting}{paging} RETURN "))
    }

    /// Transactional-endpoint statement requesting row and graph results.
    pub fn to_statement(&self) -> Statement {
        Statement::new(self.statement(), self.parameters.clone())
            .with_result_shape(ResultShape::Row)
            .with_result_shape(ResultShape::Graph)
    }
}
